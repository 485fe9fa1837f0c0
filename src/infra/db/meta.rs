use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, StockMetaStore},
    cache::CacheKey,
    domain::types::{ProductId, StockStatus},
};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl StockMetaStore for PostgresRepositories {
    async fn write(
        &self,
        product_id: ProductId,
        key: &CacheKey,
        status: &StockStatus,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO product_meta (product_id, meta_key, meta_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, meta_key)
            DO UPDATE SET meta_value = EXCLUDED.meta_value, updated_at = now()
            "#,
        )
        .bind(product_id)
        .bind(key.as_str())
        .bind(status.as_str())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn read(
        &self,
        product_id: ProductId,
        key: &CacheKey,
    ) -> Result<Option<StockStatus>, RepoError> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
            SELECT meta_value
            FROM product_meta
            WHERE product_id = $1 AND meta_key = $2
            "#,
        )
        .bind(product_id)
        .bind(key.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        value
            .map(StockStatus::parse)
            .transpose()
            .map_err(|err| RepoError::InvalidInput {
                message: format!("product {product_id} meta `{key}`: {err}"),
            })
    }
}
