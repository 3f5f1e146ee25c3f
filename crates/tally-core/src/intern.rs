//! Shared string handles for account names and currency codes.
//!
//! Account names and currencies repeat on nearly every line of a ledger,
//! and they end up as keys of the account, currency and inventory maps.
//! [`InternedStr`] is a shared immutable handle so those keys clone as
//! pointer copies; [`StringInterner`] deduplicates the handles during a
//! load so equal names share one allocation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A shared immutable string: the key type for accounts and currencies.
///
/// Equality, ordering and hashing all follow the string content, so map
/// lookups behave the same whether or not two handles share an
/// allocation.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InternedStr(Arc<str>);

impl InternedStr {
    /// Wrap a string without deduplication; prefer
    /// [`StringInterner::intern`] when loading many names.
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    /// View as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two handles share one allocation. O(1).
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for InternedStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

/// Map keys must be findable by `&str`.
impl std::borrow::Borrow<str> for InternedStr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InternedStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InternedStr {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<&str> for InternedStr {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// Deduplicates [`InternedStr`] handles.
///
/// The loader runs one of these per load so every occurrence of an
/// account or currency in the directive stream shares a single
/// allocation.
#[derive(Debug, Default)]
pub struct StringInterner {
    seen: HashSet<InternedStr>,
}

impl StringInterner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared handle for `s`, allocating only on first sight.
    pub fn intern(&mut self, s: &str) -> InternedStr {
        match self.seen.get(s) {
            Some(existing) => existing.clone(),
            None => {
                let handle = InternedStr::new(s);
                self.seen.insert(handle.clone());
                handle
            }
        }
    }

    /// Number of unique strings seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
