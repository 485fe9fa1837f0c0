//! Write-through sync of variation stock status into parent meta.
//!
//! Every stock status change is expanded into one meta write per derived cache
//! key on the variation's parent. Entries are only ever created or overwritten;
//! the last write for a key wins.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::application::repos::{ProductCatalog, RepoError, StockMetaStore};
use crate::cache::KeyDeriver;
use crate::domain::entities::ProductRecord;
use crate::domain::types::{ProductId, StockStatus};

pub(crate) const METRIC_CACHE_WRITES: &str = "varstock_cache_writes_total";
pub(crate) const METRIC_CACHE_WRITE_FAILURES: &str = "varstock_cache_write_failures_total";
pub(crate) const METRIC_CACHE_SYNC_MS: &str = "varstock_cache_sync_ms";
pub(crate) const METRIC_CACHE_PRIME_MS: &str = "varstock_cache_prime_ms";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("catalog lookup failed")]
    Catalog(#[source] RepoError),
    #[error("{failed} of {total} stock cache writes failed")]
    Storage {
        failed: usize,
        total: usize,
        #[source]
        source: RepoError,
    },
}

/// What a single event handler did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Variations whose keys were written.
    pub variations: usize,
    /// Meta writes performed.
    pub writes: usize,
}

impl SyncOutcome {
    fn absorb(&mut self, other: SyncOutcome) {
        self.variations += other.variations;
        self.writes += other.writes;
    }
}

/// Result of a full-catalog rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrimeSummary {
    pub parents: usize,
    pub failed_parents: usize,
    pub variations: usize,
    pub writes: usize,
}

/// Stock status notifications the cache reacts to.
///
/// Adapters translate whatever the commerce platform emits into these calls.
#[async_trait]
pub trait StockEventHandler: Send + Sync {
    /// A parent (or simple) product's stock status changed.
    async fn on_parent_status_changed(
        &self,
        parent_id: ProductId,
        status: &StockStatus,
        product: &ProductRecord,
    ) -> Result<SyncOutcome, SyncError>;

    /// A single variation's stock status changed.
    async fn on_variation_status_changed(
        &self,
        variation_id: ProductId,
        status: &StockStatus,
        variation: &ProductRecord,
    ) -> Result<SyncOutcome, SyncError>;
}

/// Keeps parent meta in step with variation stock status.
pub struct StockSync {
    deriver: Arc<KeyDeriver>,
    catalog: Arc<dyn ProductCatalog>,
    store: Arc<dyn StockMetaStore>,
}

impl StockSync {
    pub fn new(
        deriver: Arc<KeyDeriver>,
        catalog: Arc<dyn ProductCatalog>,
        store: Arc<dyn StockMetaStore>,
    ) -> Self {
        Self {
            deriver,
            catalog,
            store,
        }
    }

    /// Write `status` under every key derived from the variation's attributes.
    ///
    /// Orphan variations and variations without trackable attributes are
    /// skipped. Every key is attempted; if any write fails the first error is
    /// returned after the remaining keys have been written.
    #[instrument(skip_all, fields(variation_id = %variation.id, status = %status))]
    pub async fn cache_stock_data(
        &self,
        variation: &ProductRecord,
        status: &StockStatus,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(parent_id) = variation.parent() else {
            debug!("Stock cache skipped: variation has no parent");
            return Ok(SyncOutcome::default());
        };

        let keys = self.deriver.derive_keys(&variation.attributes);
        if keys.is_empty() {
            debug!(%parent_id, "Stock cache skipped: no trackable attributes");
            return Ok(SyncOutcome::default());
        }

        let started_at = Instant::now();
        let total = keys.len();
        let mut written = 0usize;
        let mut failed = 0usize;
        let mut first_error: Option<RepoError> = None;

        for key in &keys {
            match self.store.write(parent_id, key, status).await {
                Ok(()) => written += 1,
                Err(err) => {
                    warn!(
                        %parent_id,
                        key = %key,
                        error = %err,
                        "Stock cache write failed"
                    );
                    failed += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        counter!(METRIC_CACHE_WRITES).increment(written as u64);
        histogram!(METRIC_CACHE_SYNC_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        if let Some(source) = first_error {
            counter!(METRIC_CACHE_WRITE_FAILURES).increment(failed as u64);
            return Err(SyncError::Storage {
                failed,
                total,
                source,
            });
        }

        debug!(%parent_id, writes = written, "Stock cache updated");

        Ok(SyncOutcome {
            variations: 1,
            writes: written,
        })
    }

    /// Rebuild the cache for every variable product.
    ///
    /// Each parent's own status is passed along as a placeholder; children still
    /// resolve their own status. A failing parent is logged and counted, and the
    /// rebuild moves on to the next one.
    #[instrument(skip(self))]
    pub async fn prime_cache(&self) -> Result<PrimeSummary, SyncError> {
        let started_at = Instant::now();
        let parents = self
            .catalog
            .list_variable_products()
            .await
            .map_err(SyncError::Catalog)?;

        info!(parents = parents.len(), "Stock cache priming starting");

        let mut summary = PrimeSummary {
            parents: parents.len(),
            ..Default::default()
        };

        for parent in &parents {
            debug!(
                parent_id = %parent.id,
                lifecycle = parent.lifecycle.as_str(),
                "Priming parent"
            );
            match self
                .on_parent_status_changed(parent.id, &parent.stock_status, parent)
                .await
            {
                Ok(outcome) => {
                    summary.variations += outcome.variations;
                    summary.writes += outcome.writes;
                }
                Err(err) => {
                    warn!(
                        parent_id = %parent.id,
                        error = %err,
                        "Stock cache priming failed for parent"
                    );
                    summary.failed_parents += 1;
                }
            }
        }

        histogram!(METRIC_CACHE_PRIME_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        info!(
            parents = summary.parents,
            failed_parents = summary.failed_parents,
            variations = summary.variations,
            writes = summary.writes,
            "Stock cache priming complete"
        );

        Ok(summary)
    }
}

#[async_trait]
impl StockEventHandler for StockSync {
    #[instrument(skip_all, fields(parent_id = %parent_id))]
    async fn on_parent_status_changed(
        &self,
        parent_id: ProductId,
        status: &StockStatus,
        _product: &ProductRecord,
    ) -> Result<SyncOutcome, SyncError> {
        let children = self
            .catalog
            .list_children(parent_id)
            .await
            .map_err(SyncError::Catalog)?;

        if children.is_empty() {
            debug!(parent_status = %status, "No variations to cache");
            return Ok(SyncOutcome::default());
        }

        let mut outcome = SyncOutcome::default();
        let mut storage_error: Option<SyncError> = None;

        for child_id in children {
            let variation = match self.catalog.find_product(child_id).await {
                Ok(Some(variation)) => variation,
                Ok(None) => {
                    debug!(%child_id, "Skipping unresolvable variation");
                    continue;
                }
                Err(err) => {
                    warn!(%child_id, error = %err, "Skipping variation after catalog error");
                    continue;
                }
            };

            // The parent's status says nothing about an individual variation.
            let child_status = variation.stock_status.clone();
            match self.cache_stock_data(&variation, &child_status).await {
                Ok(child) => outcome.absorb(child),
                Err(err) => {
                    storage_error.get_or_insert(err);
                }
            }
        }

        match storage_error {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    #[instrument(skip_all, fields(variation_id = %variation_id))]
    async fn on_variation_status_changed(
        &self,
        variation_id: ProductId,
        status: &StockStatus,
        variation: &ProductRecord,
    ) -> Result<SyncOutcome, SyncError> {
        self.cache_stock_data(variation, status).await
    }
}
