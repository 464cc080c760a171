//! Move sequences as observed on the page, and their content fingerprints.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 64-bit hash over the ordered tokens of a [`MoveSequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Ordered move tokens, insertion order = play order.
///
/// Sequences are replaced wholesale on every observation, never edited in
/// place, so the fingerprint is computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveSequence(Vec<String>);

impl MoveSequence {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self, n: usize) -> &[String] {
        &self.0[self.0.len().saturating_sub(n)..]
    }

    /// Content fingerprint; the empty sequence has none.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        if self.0.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        Some(Fingerprint(hasher.finish()))
    }

    /// Numbered rendering, e.g. `1. e4 e5 2. Nf3`.
    pub fn to_numbered(&self) -> String {
        let mut formatted = String::new();
        for (i, san) in self.0.iter().enumerate() {
            if i % 2 == 0 {
                if !formatted.is_empty() {
                    formatted.push(' ');
                }
                formatted.push_str(&format!("{}. {}", i / 2 + 1, san));
            } else {
                formatted.push_str(&format!(" {san}"));
            }
        }
        formatted
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for MoveSequence {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}

impl From<&[&str]> for MoveSequence {
    fn from(tokens: &[&str]) -> Self {
        Self(tokens.iter().map(|s| s.to_string()).collect())
    }
}
