//! Cache key and tag definitions.
//!
//! A `CacheKey` is derived from an operation identifier plus its ordered
//! arguments. A `Tag` names the data domain an entry depends on.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::KeyError;

/// Identifies a logical data domain for group invalidation.
///
/// Tags are plain labels such as `events` or `jobs`. They have no storage of
/// their own; they only exist as keys in the tag index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Cow<'static, str>);

impl Tag {
    /// Build a tag from a static label, usable in `const` items.
    pub const fn from_static(label: &'static str) -> Self {
        Self(Cow::Borrowed(label))
    }

    pub fn new(label: impl Into<String>) -> Self {
        Self(Cow::Owned(label.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Tag {
    fn from(label: &'static str) -> Self {
        Self::from_static(label)
    }
}

impl From<String> for Tag {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

/// Opaque identifier of one cached derived query.
///
/// Rendered as `<operation>:<sha256 hex>` so log lines stay attributable to
/// the read operation that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The operation identifier this key was derived from.
    pub fn operation(&self) -> &str {
        self.0
            .rsplit_once(':')
            .map(|(operation, _)| operation)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for `operation` called with `args`.
///
/// The pair is serialized with `serde_json`, whose structural encoding keeps
/// argument boundaries intact (`("a", "bc")` and `("ab", "c")` encode
/// differently), and then hashed with SHA-256. Arguments must serialize
/// deterministically: prefer ordered collections such as `BTreeMap` over
/// `HashMap`.
pub fn derive_key<A>(operation: &str, args: &A) -> Result<CacheKey, KeyError>
where
    A: Serialize + ?Sized,
{
    let encoded =
        serde_json::to_vec(&(operation, args)).map_err(|source| KeyError::Unserializable {
            operation: operation.to_string(),
            source,
        })?;

    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    let digest = hex::encode(hasher.finalize());

    Ok(CacheKey(Arc::from(format!("{operation}:{digest}"))))
}
