//! Label sets and bounded display selection.
//!
//! A `LabelSet` is an immutable, shared snapshot of a node's labels. Sets are
//! ordered (lexicographically), so selecting the first `n` labels for display
//! is deterministic across polls and page renders.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(Arc<BTreeSet<String>>);

impl LabelSet {
    /// Split a whitespace-separated label string into a set of tokens.
    pub fn parse(label_string: &str) -> Self {
        label_string.split_whitespace().map(str::to_string).collect()
    }

    /// Labels present in either set.
    pub fn union(&self, other: &LabelSet) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        self.iter().chain(other.iter()).cloned().collect()
    }

    /// The display subset bounded by `max_count`.
    ///
    /// Negative counts select everything and share the underlying set.
    /// Otherwise the first `max_count` labels in iteration order are copied
    /// into a fresh set; iteration stops as soon as the count is reached.
    pub fn allowed(&self, max_count: i32) -> Self {
        match usize::try_from(max_count) {
            Err(_) => self.clone(),
            Ok(limit) if limit >= self.len() => self.clone(),
            Ok(limit) => self.iter().take(limit).cloned().collect(),
        }
    }

    /// The unrestricted view, regardless of any display bound.
    pub fn all(&self) -> Self {
        self.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<String> for LabelSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::fmt::Display for LabelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self.0.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        f.write_str(&joined)
    }
}
