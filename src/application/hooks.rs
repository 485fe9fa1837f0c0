//! Stock status hooks.
//!
//! Entry point for platform notifications. Resolves the product a notification
//! names and hands it to the registered [`StockEventHandler`], unless the cache
//! is not autoloaded.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::repos::{ProductCatalog, RepoError};
use crate::application::stock_sync::{StockEventHandler, SyncError, SyncOutcome};
use crate::cache::CacheConfig;
use crate::domain::types::{ProductId, StockStatus};

#[derive(Debug, Error)]
pub enum HookError {
    #[error("product {0} not found")]
    UnknownProduct(ProductId),
    #[error("product lookup failed")]
    Catalog(#[source] RepoError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Which platform notification fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A product's stock status was set (parents fan out to their variations).
    ProductStatusSet,
    /// A variation's stock status was set.
    VariationStatusSet,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::ProductStatusSet => f.write_str("product_status_set"),
            EventKind::VariationStatusSet => f.write_str("variation_status_set"),
        }
    }
}

/// A stock status notification.
#[derive(Debug, Clone)]
pub struct StockEvent {
    /// Unique identifier for log correlation.
    pub id: Uuid,
    pub kind: EventKind,
    pub product_id: ProductId,
    pub status: StockStatus,
}

impl StockEvent {
    pub fn new(kind: EventKind, product_id: ProductId, status: StockStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            product_id,
            status,
        }
    }
}

/// How a hook invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Autoload is off; nothing was resolved or written.
    Disabled,
    Synced(SyncOutcome),
}

/// Routes stock status notifications to the cache.
///
/// # Usage
///
/// ```ignore
/// // After the platform persisted a variation's new status:
/// hooks.variation_status_set(variation_id, StockStatus::out_of_stock()).await?;
/// ```
pub struct StockHooks {
    config: CacheConfig,
    catalog: Arc<dyn ProductCatalog>,
    handler: Arc<dyn StockEventHandler>,
}

impl StockHooks {
    pub fn new(
        config: CacheConfig,
        catalog: Arc<dyn ProductCatalog>,
        handler: Arc<dyn StockEventHandler>,
    ) -> Self {
        Self {
            config,
            catalog,
            handler,
        }
    }

    /// Resolve the event's product and dispatch it to the handler.
    pub async fn trigger(&self, event: StockEvent) -> Result<HookOutcome, HookError> {
        if !self.config.is_enabled() {
            debug!(event_kind = %event.kind, "Stock hook skipped: autoload disabled");
            return Ok(HookOutcome::Disabled);
        }

        info!(
            event_id = %event.id,
            event_kind = %event.kind,
            product_id = %event.product_id,
            status = %event.status,
            "Stock event received"
        );

        let product = self
            .catalog
            .find_product(event.product_id)
            .await
            .map_err(HookError::Catalog)?
            .ok_or(HookError::UnknownProduct(event.product_id))?;

        debug!(
            event_id = %event.id,
            product_kind = product.kind.as_str(),
            "Stock event resolved"
        );

        let outcome = match event.kind {
            EventKind::ProductStatusSet => {
                self.handler
                    .on_parent_status_changed(event.product_id, &event.status, &product)
                    .await?
            }
            EventKind::VariationStatusSet => {
                self.handler
                    .on_variation_status_changed(event.product_id, &event.status, &product)
                    .await?
            }
        };

        info!(
            event_id = %event.id,
            variations = outcome.variations,
            writes = outcome.writes,
            "Stock event handled"
        );

        Ok(HookOutcome::Synced(outcome))
    }

    /// A product's stock status was set.
    pub async fn product_status_set(
        &self,
        product_id: ProductId,
        status: StockStatus,
    ) -> Result<HookOutcome, HookError> {
        self.trigger(StockEvent::new(
            EventKind::ProductStatusSet,
            product_id,
            status,
        ))
        .await
    }

    /// A variation's stock status was set.
    pub async fn variation_status_set(
        &self,
        variation_id: ProductId,
        status: StockStatus,
    ) -> Result<HookOutcome, HookError> {
        self.trigger(StockEvent::new(
            EventKind::VariationStatusSet,
            variation_id,
            status,
        ))
        .await
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
