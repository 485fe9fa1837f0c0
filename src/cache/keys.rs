//! Cache key derivation.
//!
//! Defines `CacheKey` and the `KeyDeriver` that expands a variation's attributes
//! into one key per non-empty attribute subset.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::trace;

use crate::domain::attributes::AttributeSet;

use super::config::CacheConfig;
use super::tracked::{AllAttributes, TrackedAttributes, UntrackedAttributes};

/// Longest key the meta storage column accepts, in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Namespacing token platforms put in front of attribute identifiers.
pub const ATTRIBUTE_NAME_PREFIX: &str = "attribute_";

const SEPARATOR: char = '_';

/// Bytes of the SHA-256 digest kept for the hashed fallback (128 bits).
const HASHED_DIGEST_BYTES: usize = 16;

/// What the hashed fallback appends to the prefix: separator plus hex digest.
pub const HASHED_SUFFIX_LEN: usize = 1 + HASHED_DIGEST_BYTES * 2;

/// Longest prefix that still keeps hashed keys within [`MAX_KEY_LEN`].
pub const MAX_PREFIX_LEN: usize = MAX_KEY_LEN - HASHED_SUFFIX_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key prefix must not be empty")]
    EmptyPrefix,
    #[error(
        "key prefix is {len} bytes, at most {max} leave room for hashed keys",
        max = MAX_PREFIX_LEN
    )]
    PrefixTooLong { len: usize },
}

/// Check that `prefix` can start every derived key, hashed ones included.
pub fn validate_prefix(prefix: &str) -> Result<(), KeyError> {
    if prefix.trim().is_empty() {
        return Err(KeyError::EmptyPrefix);
    }
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(KeyError::PrefixTooLong { len: prefix.len() });
    }
    Ok(())
}

/// Attribute name with one leading `attribute_` token removed.
///
/// Keys are ordered and spelled by this name, so `pa_size` and
/// `attribute_pa_size` land on the same key.
pub(crate) fn canonical_name(name: &str) -> &str {
    name.strip_prefix(ATTRIBUTE_NAME_PREFIX).unwrap_or(name)
}

/// A meta key under which one variation's stock status is stored on its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Turns attribute sets into cache keys.
///
/// Immutable once built; share it behind an `Arc` between the sync service and
/// the lookup side so both derive identical keys.
#[derive(Clone)]
pub struct KeyDeriver {
    prefix: String,
    tracked: Arc<dyn TrackedAttributes>,
}

impl fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDeriver")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl KeyDeriver {
    /// Create a deriver that tracks every attribute.
    ///
    /// Fails when the prefix is blank or too long for a hashed key to fit in
    /// [`MAX_KEY_LEN`].
    pub fn new(prefix: impl Into<String>) -> Result<Self, KeyError> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self {
            prefix,
            tracked: Arc::new(AllAttributes),
        })
    }

    /// Build a deriver from the cache configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self, KeyError> {
        let untracked = UntrackedAttributes::new(config.untracked_attributes.iter().cloned());
        let deriver = Self::new(config.key_prefix.clone())?;
        if untracked.is_empty() {
            Ok(deriver)
        } else {
            Ok(deriver.with_tracked_attributes(Arc::new(untracked)))
        }
    }

    /// Replace the attribute tracking hook.
    pub fn with_tracked_attributes(mut self, tracked: Arc<dyn TrackedAttributes>) -> Self {
        self.tracked = tracked;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive every key a variation with `attributes` must be cached under.
    ///
    /// Empty values are dropped, the tracking hook runs, and the remaining `n`
    /// attributes expand to `2^n - 1` keys. Returns an empty vector when nothing
    /// is left to key on.
    pub fn derive_keys(&self, attributes: &AttributeSet) -> Vec<CacheKey> {
        let attributes = self.trackable(attributes);
        if attributes.is_empty() {
            return Vec::new();
        }

        let keys: Vec<CacheKey> = power_set(&attributes)
            .iter()
            .map(|subset| self.derive_key(subset))
            .collect();

        trace!(
            attribute_count = attributes.len(),
            key_count = keys.len(),
            "Derived cache keys"
        );

        keys
    }

    /// Canonical key for exactly the given attribute subset.
    ///
    /// Names lose a leading `attribute_` token and are visited in byte order of
    /// what remains. Values are lower-cased. An empty subset yields the bare
    /// prefix.
    pub fn derive_key(&self, subset: &AttributeSet) -> CacheKey {
        let mut parts: Vec<(&str, String)> = subset
            .iter()
            .map(|(name, value)| (canonical_name(name), value.to_lowercase()))
            .collect();
        parts.sort();

        let mut key = self.prefix.clone();
        for (name, value) in parts {
            if !key.ends_with(SEPARATOR) {
                key.push(SEPARATOR);
            }
            key.push_str(name);
            key.push(':');
            key.push_str(&value);
        }

        if key.len() > MAX_KEY_LEN {
            return CacheKey(self.hashed_key(&key));
        }

        CacheKey(key)
    }

    /// Key answering a storefront filter on `filter`.
    ///
    /// Applies the same filtering as [`derive_keys`](Self::derive_keys), so the
    /// result is always one of the keys written for a matching variation.
    /// Returns `None` when the filter constrains nothing.
    ///
    /// Filter names may omit the `attribute_` token. They are namespaced before
    /// the tracking hook runs so the hook sees the same names it sees on writes.
    pub fn lookup_key(&self, filter: &AttributeSet) -> Option<CacheKey> {
        let filter: AttributeSet = filter
            .iter()
            .map(|(name, value)| {
                if name.starts_with(ATTRIBUTE_NAME_PREFIX) {
                    (name.to_string(), value.to_string())
                } else {
                    (format!("{ATTRIBUTE_NAME_PREFIX}{name}"), value.to_string())
                }
            })
            .collect();
        let filter = self.trackable(&filter);
        if filter.is_empty() {
            return None;
        }
        Some(self.derive_key(&filter))
    }

    fn trackable(&self, attributes: &AttributeSet) -> AttributeSet {
        self.tracked
            .tracked(attributes.clone().without_empty_values())
            .without_empty_values()
    }

    fn hashed_key(&self, full_key: &str) -> String {
        let digest = Sha256::digest(full_key.as_bytes());
        let hash = hex::encode(&digest.as_slice()[..HASHED_DIGEST_BYTES]);
        format!("{}{SEPARATOR}{hash}", self.prefix)
    }
}

/// All non-empty subsets of `attributes`, in a stable order.
///
/// Subsets are built by doubling: each entry is added to every subset produced
/// so far, so the order depends only on the (sorted) entry order.
fn power_set(attributes: &AttributeSet) -> Vec<AttributeSet> {
    let mut subsets: Vec<AttributeSet> = vec![AttributeSet::new()];

    for (name, value) in attributes {
        let extended: Vec<AttributeSet> = subsets
            .iter()
            .map(|subset| {
                let mut next = subset.clone();
                next.insert(name.clone(), value.clone());
                next
            })
            .collect();
        subsets.extend(extended);
    }

    subsets.remove(0);
    subsets
}
