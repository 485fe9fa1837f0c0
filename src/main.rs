use std::{error::Error as _, process, sync::Arc};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use varstock::{
    application::{
        error::AppError, hooks::StockHooks, lookup::StockLookup, stock_sync::StockSync,
    },
    cache::{CacheConfig, KeyDeriver},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminToken, HttpState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let error = error_chain(error);
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

fn error_chain(error: &AppError) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(inner) = current {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        current = inner.source();
    }
    message
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Prime(_) => run_prime(settings).await,
        config::Command::Keys(args) => run_keys(&settings, &args),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings)?;

    if !state.hooks.config().is_enabled() {
        warn!("Cache autoload disabled; stock hook routes are not mounted");
    }
    if state.admin_token.is_none() {
        warn!("No admin token configured; maintenance routes are not mounted");
    }

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.addr, err))?;

    info!(addr = %settings.server.addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_prime(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let deriver = Arc::new(KeyDeriver::from_config(&CacheConfig::from(&settings.cache))?);
    let sync = StockSync::new(deriver, repositories.clone(), repositories);

    let summary = sync.prime_cache().await?;

    info!(
        target = "varstock::prime",
        parents = summary.parents,
        failed_parents = summary.failed_parents,
        variations = summary.variations,
        writes = summary.writes,
        "Stock cache primed"
    );

    if summary.failed_parents > 0 {
        return Err(AppError::unexpected(format!(
            "{} of {} parents failed to prime",
            summary.failed_parents, summary.parents
        )));
    }

    Ok(())
}

fn run_keys(settings: &config::Settings, args: &config::KeysArgs) -> Result<(), AppError> {
    let attributes = args.attribute_set();
    if attributes.is_empty() {
        return Err(AppError::validation(
            "keys requires at least one NAME=VALUE attribute",
        ));
    }

    let deriver = KeyDeriver::from_config(&CacheConfig::from(&settings.cache))?;
    for key in deriver.derive_keys(&attributes) {
        println!("{key}");
    }

    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::Connect)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::Migrate)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let deriver = Arc::new(KeyDeriver::from_config(&cache_config)?);

    let sync = Arc::new(StockSync::new(
        deriver.clone(),
        repositories.clone(),
        repositories.clone(),
    ));
    let hooks = Arc::new(StockHooks::new(
        cache_config,
        repositories.clone(),
        sync.clone(),
    ));
    let lookup = StockLookup::new(deriver, repositories.clone());

    Ok(HttpState {
        hooks,
        sync,
        lookup,
        health: repositories,
        admin_token: settings
            .admin
            .token
            .as_deref()
            .map(|token| Arc::new(AdminToken::new(token))),
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
