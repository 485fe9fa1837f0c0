//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CacheKey;
use crate::domain::entities::ProductRecord;
use crate::domain::types::{ProductId, StockStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Product data provider.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Load a product with its parent id, current stock status and attributes.
    async fn find_product(&self, id: ProductId) -> Result<Option<ProductRecord>, RepoError>;

    /// Ids of the variations belonging to `parent_id`, in menu order.
    async fn list_children(&self, parent_id: ProductId) -> Result<Vec<ProductId>, RepoError>;

    /// Every variable (parent-type) product, whatever its lifecycle state.
    async fn list_variable_products(&self) -> Result<Vec<ProductRecord>, RepoError>;
}

/// Per-product key/value meta storage holding the cached stock entries.
#[async_trait]
pub trait StockMetaStore: Send + Sync {
    /// Create or overwrite `key` on `product_id`.
    async fn write(
        &self,
        product_id: ProductId,
        key: &CacheKey,
        status: &StockStatus,
    ) -> Result<(), RepoError>;

    async fn read(
        &self,
        product_id: ProductId,
        key: &CacheKey,
    ) -> Result<Option<StockStatus>, RepoError>;
}

/// Liveness check for the backing store.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
