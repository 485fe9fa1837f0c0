use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    application::repos::{ProductCatalog, RepoError},
    domain::{
        attributes::AttributeSet,
        entities::ProductRecord,
        types::{ProductId, ProductKind, ProductLifecycle, StockStatus},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    parent_id: Option<ProductId>,
    kind: ProductKind,
    lifecycle: ProductLifecycle,
    stock_status: String,
}

#[derive(sqlx::FromRow)]
struct AttributeRow {
    product_id: ProductId,
    name: String,
    value: String,
}

impl ProductRow {
    fn into_record(self, attributes: AttributeSet) -> Result<ProductRecord, RepoError> {
        let stock_status =
            StockStatus::parse(self.stock_status).map_err(|err| RepoError::InvalidInput {
                message: format!("product {}: {err}", self.id),
            })?;

        Ok(ProductRecord {
            id: self.id,
            parent_id: self.parent_id,
            kind: self.kind,
            lifecycle: self.lifecycle,
            stock_status,
            attributes,
        })
    }
}

impl PostgresRepositories {
    async fn load_attributes(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<ProductId, AttributeSet>, RepoError> {
        let rows = sqlx::query_as::<_, AttributeRow>(
            r#"
            SELECT product_id, name, value
            FROM product_attributes
            WHERE product_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut grouped: HashMap<ProductId, AttributeSet> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.product_id)
                .or_default()
                .insert(row.name, row.value);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl ProductCatalog for PostgresRepositories {
    async fn find_product(&self, id: ProductId) -> Result<Option<ProductRecord>, RepoError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, parent_id, kind, lifecycle, stock_status
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut attributes = self.load_attributes(&[id.get()]).await?;
        let attributes = attributes.remove(&id).unwrap_or_default();
        row.into_record(attributes).map(Some)
    }

    async fn list_children(&self, parent_id: ProductId) -> Result<Vec<ProductId>, RepoError> {
        sqlx::query_scalar::<_, ProductId>(
            r#"
            SELECT id
            FROM products
            WHERE parent_id = $1
            ORDER BY menu_order ASC, id ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_variable_products(&self) -> Result<Vec<ProductRecord>, RepoError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, parent_id, kind, lifecycle, stock_status
            FROM products
            WHERE kind = 'variable'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id.get()).collect();
        let mut attributes = self.load_attributes(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let set = attributes.remove(&row.id).unwrap_or_default();
                row.into_record(set)
            })
            .collect()
    }
}
