//! Domain entities mirrored from persistent storage.

use serde::Serialize;

use crate::domain::attributes::AttributeSet;
use crate::domain::types::{ProductId, ProductKind, ProductLifecycle, StockStatus};

/// A product row as seen by the stock cache.
///
/// Variations carry their parent id and the attribute values that select them;
/// variable (parent) products carry the cache entries written on their behalf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub parent_id: Option<ProductId>,
    pub kind: ProductKind,
    pub lifecycle: ProductLifecycle,
    pub stock_status: StockStatus,
    pub attributes: AttributeSet,
}

impl ProductRecord {
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, ProductKind::Variable)
    }

    /// Parent id of a variation; `None` for orphans and top-level products.
    ///
    /// Platforms that store "no parent" as `0` are treated as parentless.
    pub fn parent(&self) -> Option<ProductId> {
        self.parent_id.filter(|id| id.get() > 0)
    }
}
