//! Variation stock cache keys.
//!
//! A variation's stock status is recorded on its parent product once per
//! non-empty subset of the variation's attributes, so a storefront filter on any
//! combination of attributes resolves to a single pre-computed entry:
//!
//! - `attribute_pa_size = M`, `attribute_pa_color = Red` on a variation yields
//!   `_codelight_stock_pa_size:m`, `_codelight_stock_pa_color:red` and
//!   `_codelight_stock_pa_color:red_pa_size:m` on its parent.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! key_prefix = "_codelight_stock"
//! autoload = true
//! untracked_attributes = ["pa_brand"]
//! ```

mod config;
mod keys;
mod tracked;

pub use config::CacheConfig;
pub use keys::{
    ATTRIBUTE_NAME_PREFIX, CacheKey, HASHED_SUFFIX_LEN, KeyDeriver, KeyError, MAX_KEY_LEN,
    MAX_PREFIX_LEN, validate_prefix,
};
pub use tracked::{AllAttributes, TrackedAttributes, UntrackedAttributes};
