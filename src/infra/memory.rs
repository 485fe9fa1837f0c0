//! In-memory catalog and meta store.
//!
//! Used by the unit and router test suites. State lives for the process only.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::application::repos::{HealthCheck, ProductCatalog, RepoError, StockMetaStore};
use crate::cache::CacheKey;
use crate::domain::entities::ProductRecord;
use crate::domain::types::{ProductId, StockStatus};

use super::lock::{rw_read, rw_write};

const CATALOG: &str = "memory.catalog";
const META: &str = "memory.meta";

#[derive(Default)]
struct CatalogState {
    products: HashMap<ProductId, ProductRecord>,
    children: HashMap<ProductId, Vec<ProductId>>,
    insertion: Vec<ProductId>,
    failing_parents: HashSet<ProductId>,
}

#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `product`, registering it as a child of its parent when it has one.
    pub fn insert(&self, product: ProductRecord) {
        let mut state = rw_write(&self.state, CATALOG, "insert");
        let id = product.id;
        if let Some(parent) = product.parent() {
            let siblings = state.children.entry(parent).or_default();
            if !siblings.contains(&id) {
                siblings.push(id);
            }
        }
        if state.products.insert(id, product).is_none() {
            state.insertion.push(id);
        }
    }

    /// Register a child id under `parent` without storing a product for it.
    pub fn add_dangling_child(&self, parent: ProductId, child: ProductId) {
        let mut state = rw_write(&self.state, CATALOG, "add_dangling_child");
        state.children.entry(parent).or_default().push(child);
    }

    /// Make listing the children of `parent` fail with a persistence error.
    pub fn fail_children_of(&self, parent: ProductId) {
        rw_write(&self.state, CATALOG, "fail_children_of")
            .failing_parents
            .insert(parent);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn find_product(&self, id: ProductId) -> Result<Option<ProductRecord>, RepoError> {
        let state = rw_read(&self.state, CATALOG, "find_product");
        Ok(state.products.get(&id).cloned())
    }

    async fn list_children(&self, parent_id: ProductId) -> Result<Vec<ProductId>, RepoError> {
        let state = rw_read(&self.state, CATALOG, "list_children");
        if state.failing_parents.contains(&parent_id) {
            return Err(RepoError::from_persistence(format!(
                "children of product {parent_id} unavailable"
            )));
        }
        Ok(state.children.get(&parent_id).cloned().unwrap_or_default())
    }

    async fn list_variable_products(&self) -> Result<Vec<ProductRecord>, RepoError> {
        let state = rw_read(&self.state, CATALOG, "list_variable_products");
        Ok(state
            .insertion
            .iter()
            .filter_map(|id| state.products.get(id))
            .filter(|product| product.is_variable())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HealthCheck for InMemoryCatalog {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMetaStore {
    entries: RwLock<HashMap<ProductId, BTreeMap<String, StockStatus>>>,
    failing_keys: RwLock<HashSet<String>>,
    writes: AtomicUsize,
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of every cached entry stored on `product_id`.
    pub fn entries_for(&self, product_id: ProductId) -> BTreeMap<String, StockStatus> {
        rw_read(&self.entries, META, "entries_for")
            .get(&product_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every write to `key` fail with a persistence error.
    pub fn fail_on_key(&self, key: &str) {
        rw_write(&self.failing_keys, META, "fail_on_key").insert(key.to_string());
    }
}

#[async_trait]
impl StockMetaStore for InMemoryMetaStore {
    async fn write(
        &self,
        product_id: ProductId,
        key: &CacheKey,
        status: &StockStatus,
    ) -> Result<(), RepoError> {
        if rw_read(&self.failing_keys, META, "write").contains(key.as_str()) {
            return Err(RepoError::from_persistence(format!(
                "write rejected for key `{key}`"
            )));
        }

        rw_write(&self.entries, META, "write")
            .entry(product_id)
            .or_default()
            .insert(key.as_str().to_string(), status.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(
        &self,
        product_id: ProductId,
        key: &CacheKey,
    ) -> Result<Option<StockStatus>, RepoError> {
        Ok(rw_read(&self.entries, META, "read")
            .get(&product_id)
            .and_then(|entries| entries.get(key.as_str()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyDeriver;
    use crate::domain::attributes::AttributeSet;
    use crate::domain::types::{ProductKind, ProductLifecycle};

    fn variation(id: i64, parent: i64) -> ProductRecord {
        ProductRecord {
            id: ProductId::new(id),
            parent_id: Some(ProductId::new(parent)),
            kind: ProductKind::Variation,
            lifecycle: ProductLifecycle::Publish,
            stock_status: StockStatus::in_stock(),
            attributes: AttributeSet::new(),
        }
    }

    #[tokio::test]
    async fn children_keep_insertion_order() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(variation(12, 1));
        catalog.insert(variation(11, 1));
        catalog.add_dangling_child(ProductId::new(1), ProductId::new(99));

        let children = catalog
            .list_children(ProductId::new(1))
            .await
            .expect("list");
        assert_eq!(
            children,
            vec![ProductId::new(12), ProductId::new(11), ProductId::new(99)]
        );
        assert!(
            catalog
                .find_product(ProductId::new(99))
                .await
                .expect("find")
                .is_none()
        );
    }

    #[tokio::test]
    async fn writes_overwrite_and_failures_are_injected() {
        let store = InMemoryMetaStore::new();
        let key = KeyDeriver::new("_codelight_stock")
            .expect("valid prefix")
            .derive_key(&[("attribute_pa_size", "M")].into_iter().collect());
        let parent = ProductId::new(1);

        store
            .write(parent, &key, &StockStatus::in_stock())
            .await
            .expect("write");
        store
            .write(parent, &key, &StockStatus::out_of_stock())
            .await
            .expect("overwrite");
        assert_eq!(store.write_count(), 2);
        assert_eq!(
            store.read(parent, &key).await.expect("read"),
            Some(StockStatus::out_of_stock())
        );

        store.fail_on_key(key.as_str());
        let err = store
            .write(parent, &key, &StockStatus::in_stock())
            .await
            .expect_err("injected failure");
        assert!(matches!(err, RepoError::Persistence(_)));
        assert_eq!(store.write_count(), 2);
    }
}
