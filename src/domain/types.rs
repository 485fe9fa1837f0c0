//! Shared domain enumerations and identifiers aligned with persisted database types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Identifier of a product row (parent, simple product or variation).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ProductId(i64);

impl ProductId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "product_kind", rename_all = "snake_case")]
pub enum ProductKind {
    Simple,
    Variable,
    Variation,
}

impl ProductKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductKind::Simple => "simple",
            ProductKind::Variable => "variable",
            ProductKind::Variation => "variation",
        }
    }
}

/// Publication state of a product. Priming walks every state, not only published ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "product_lifecycle", rename_all = "snake_case")]
pub enum ProductLifecycle {
    Draft,
    Pending,
    Private,
    Publish,
    Future,
    Trash,
}

impl ProductLifecycle {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductLifecycle::Draft => "draft",
            ProductLifecycle::Pending => "pending",
            ProductLifecycle::Private => "private",
            ProductLifecycle::Publish => "publish",
            ProductLifecycle::Future => "future",
            ProductLifecycle::Trash => "trash",
        }
    }
}

/// Opaque stock status token.
///
/// The well-known tokens are exposed as constructors, but any non-empty token a
/// platform reports is carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockStatus(String);

impl StockStatus {
    pub const IN_STOCK: &'static str = "instock";
    pub const OUT_OF_STOCK: &'static str = "outofstock";
    pub const ON_BACKORDER: &'static str = "onbackorder";

    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("stock status must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn in_stock() -> Self {
        Self(Self::IN_STOCK.to_string())
    }

    pub fn out_of_stock() -> Self {
        Self(Self::OUT_OF_STOCK.to_string())
    }

    pub fn on_backorder() -> Self {
        Self(Self::ON_BACKORDER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_status_trims_and_rejects_empty() {
        assert_eq!(
            StockStatus::parse(" instock ").expect("valid status").as_str(),
            "instock"
        );
        assert!(StockStatus::parse("   ").is_err());
        assert!(StockStatus::parse("").is_err());
    }

    #[test]
    fn unknown_status_tokens_are_preserved() {
        let status = StockStatus::parse("preorder").expect("custom token");
        assert_eq!(status.to_string(), "preorder");
    }

    #[test]
    fn stock_status_serializes_as_plain_string() {
        let json = serde_json::to_string(&StockStatus::out_of_stock()).expect("serialize");
        assert_eq!(json, "\"outofstock\"");
    }
}
