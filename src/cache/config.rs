//! Cache configuration.
//!
//! Controls key naming and which attributes participate in key derivation.

use serde::Deserialize;

pub(crate) const DEFAULT_KEY_PREFIX: &str = "_codelight_stock";

/// Cache configuration from `varstock.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix every derived meta key starts with.
    pub key_prefix: String,
    /// Route stock status hooks into the cache at all.
    pub autoload: bool,
    /// Attribute names excluded from key derivation.
    pub untracked_attributes: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            autoload: true,
            untracked_attributes: Vec::new(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            key_prefix: settings.key_prefix.clone(),
            autoload: settings.autoload,
            untracked_attributes: settings.untracked_attributes.clone(),
        }
    }
}

impl CacheConfig {
    /// Returns true if stock hooks should be wired to the cache.
    pub fn is_enabled(&self) -> bool {
        self.autoload
    }
}
