//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{CacheConfig, validate_prefix};
use crate::domain::attributes::AttributeSet;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "varstock";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Command-line arguments for the varstock binary.
#[derive(Debug, Parser)]
#[command(name = "varstock", version, about = "Variation stock cache service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VARSTOCK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Rebuild the stock cache for every variable product.
    Prime(PrimeArgs),
    /// Print the cache keys derived from an attribute set.
    Keys(KeysArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Toggle routing of stock hooks into the cache.
    #[arg(
        long = "cache-autoload",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_autoload: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PrimeArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct KeysArgs {
    /// Override the cache key prefix.
    #[arg(long = "cache-key-prefix", value_name = "PREFIX")]
    pub key_prefix: Option<String>,

    /// Attribute assignments such as `attribute_pa_size=M`.
    #[arg(value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub attributes: Vec<(String, String)>,
}

impl KeysArgs {
    pub fn attribute_set(&self) -> AttributeSet {
        self.attributes.iter().cloned().collect()
    }
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("attribute name missing in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub admin: AdminSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub key_prefix: String,
    pub autoload: bool,
    pub untracked_attributes: Vec<String>,
}

#[derive(Clone)]
pub struct AdminSettings {
    /// Bearer token for the maintenance routes; `None` leaves them unmounted.
    pub token: Option<String>,
}

impl std::fmt::Debug for AdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("VARSTOCK")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("cache.untracked_attributes")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Prime(args)) => raw.apply_database_override(&args.database),
        Some(Command::Keys(args)) => raw.apply_keys_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    admin: RawAdminSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(autoload) = overrides.cache_autoload {
            self.cache.autoload = Some(autoload);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }

    fn apply_keys_overrides(&mut self, args: &KeysArgs) {
        if let Some(prefix) = args.key_prefix.as_ref() {
            self.cache.key_prefix = Some(prefix.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            admin,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;
        let admin = build_admin_settings(admin);

        Ok(Self {
            server,
            logging,
            database,
            cache,
            admin,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_value).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let key_prefix = cache.key_prefix.unwrap_or(defaults.key_prefix);
    validate_prefix(&key_prefix)
        .map_err(|err| LoadError::invalid("cache.key_prefix", err.to_string()))?;

    let untracked_attributes = cache
        .untracked_attributes
        .unwrap_or_default()
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    Ok(CacheSettings {
        key_prefix,
        autoload: cache.autoload.unwrap_or(defaults.autoload),
        untracked_attributes,
    })
}

fn build_admin_settings(admin: RawAdminSettings) -> AdminSettings {
    let token = admin.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    AdminSettings { token }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    key_prefix: Option<String>,
    autoload: Option<bool>,
    untracked_attributes: Option<Vec<String>>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    token: Option<String>,
}

impl std::fmt::Debug for RawAdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawAdminSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MAX_PREFIX_LEN;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn cache_defaults_match_cache_config() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.cache.key_prefix, "_codelight_stock");
        assert!(settings.cache.autoload);
        assert!(settings.cache.untracked_attributes.is_empty());
        assert!(settings.admin.token.is_none());
    }

    #[test]
    fn cli_can_disable_autoload() {
        let mut raw = RawSettings::default();
        raw.apply_serve_overrides(&ServeOverrides {
            cache_autoload: Some(false),
            ..Default::default()
        });
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(!CacheConfig::from(&settings.cache).is_enabled());
    }

    #[test]
    fn empty_key_prefix_is_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.key_prefix = Some("  ".to_string());
        let err = Settings::from_raw(raw).expect_err("empty prefix");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "cache.key_prefix",
                ..
            }
        ));
    }

    #[test]
    fn key_prefix_must_leave_room_for_hashed_keys() {
        let mut raw = RawSettings::default();
        raw.cache.key_prefix = Some("p".repeat(MAX_PREFIX_LEN));
        assert!(Settings::from_raw(raw.clone()).is_ok());

        raw.cache.key_prefix = Some("p".repeat(MAX_PREFIX_LEN + 1));
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn untracked_names_are_trimmed() {
        let mut raw = RawSettings::default();
        raw.cache.untracked_attributes =
            Some(vec![" pa_brand ".to_string(), String::new()]);
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.cache.untracked_attributes, vec!["pa_brand"]);
    }

    #[test]
    fn blank_admin_token_leaves_admin_disabled() {
        let mut raw = RawSettings::default();
        raw.admin.token = Some("   ".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.admin.token.is_none());
    }

    #[test]
    fn admin_token_is_redacted_in_debug_output() {
        let mut raw = RawSettings::default();
        raw.admin.token = Some("hunter2".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.admin.token.as_deref(), Some("hunter2"));
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        raw.apply_serve_overrides(&ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        });
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["varstock"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_prime_arguments() {
        let args = CliArgs::parse_from([
            "varstock",
            "prime",
            "--database-url",
            "postgres://example",
        ]);

        match args.command.expect("prime command") {
            Command::Prime(prime) => assert_eq!(
                prime.database.database_url.as_deref(),
                Some("postgres://example")
            ),
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_keys_arguments() {
        let args = CliArgs::parse_from([
            "varstock",
            "keys",
            "--cache-key-prefix",
            "_stock",
            "attribute_pa_size=M",
            "pa_color=",
        ]);

        match args.command.expect("keys command") {
            Command::Keys(keys) => {
                assert_eq!(keys.key_prefix.as_deref(), Some("_stock"));
                let set = keys.attribute_set();
                assert_eq!(set.get("attribute_pa_size"), Some("M"));
                assert_eq!(set.get("pa_color"), Some(""));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn keys_rejects_malformed_assignments() {
        let err = CliArgs::try_parse_from(["varstock", "keys", "pa_size"]).expect_err("no `=`");
        assert!(err.to_string().contains("NAME=VALUE"));
        assert!(parse_assignment("=M").is_err());
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "varstock",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--cache-autoload",
            "off",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(serve.overrides.cache_autoload, Some(false));
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
