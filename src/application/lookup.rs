//! Storefront side of the stock cache: answer an attribute filter from parent meta.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::application::repos::{RepoError, StockMetaStore};
use crate::cache::{CacheKey, KeyDeriver};
use crate::domain::attributes::AttributeSet;
use crate::domain::types::{ProductId, StockStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLookupResult {
    /// Key the filter resolves to; `None` when the filter constrains nothing.
    pub key: Option<CacheKey>,
    /// Cached status; `None` when no variation has written the key yet.
    pub status: Option<StockStatus>,
}

#[derive(Clone)]
pub struct StockLookup {
    deriver: Arc<KeyDeriver>,
    store: Arc<dyn StockMetaStore>,
}

impl StockLookup {
    pub fn new(deriver: Arc<KeyDeriver>, store: Arc<dyn StockMetaStore>) -> Self {
        Self { deriver, store }
    }

    pub async fn status_for(
        &self,
        parent_id: ProductId,
        filter: &AttributeSet,
    ) -> Result<StockLookupResult, RepoError> {
        let Some(key) = self.deriver.lookup_key(filter) else {
            return Ok(StockLookupResult {
                key: None,
                status: None,
            });
        };

        let status = self.store.read(parent_id, &key).await?;
        debug!(%parent_id, key = %key, hit = status.is_some(), "Stock cache lookup");

        Ok(StockLookupResult {
            key: Some(key),
            status,
        })
    }
}
