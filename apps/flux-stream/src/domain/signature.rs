//! Query Signatures and Generations
//!
//! A signature is the normalized identity of a logical query. Each time a
//! query is issued it receives the next generation for its signature, and the
//! pair forms the correlation ID the gateway echoes back in frame headers.

use std::collections::HashMap;
use std::fmt;

/// Normalized identity of a logical query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(String);

impl Signature {
    /// Wrap an already-normalized signature string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The signature text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Correlation ID for a given generation of this signature.
    #[must_use]
    pub fn correlation_id(&self, generation: u64) -> CorrelationId {
        CorrelationId(format!("{}-{generation}", self.0))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one request/response pair: `signature-generation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap a raw ID taken from a frame header.
    #[must_use]
    pub fn from_wire(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The ID text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for CorrelationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Upper-case and trim a symbol-like field.
#[must_use]
pub fn normalize(field: &str) -> String {
    field.trim().to_uppercase()
}

/// Normalize, sort and de-duplicate a list field, joined with commas.
#[must_use]
pub fn normalize_list<S: AsRef<str>>(items: &[S]) -> String {
    let mut normalized: Vec<String> = items.iter().map(|s| normalize(s.as_ref())).collect();
    normalized.sort();
    normalized.dedup();
    normalized.join(",")
}

/// Per-signature generation counters.
///
/// Generations for a signature strictly increase. `clear` forgets every
/// signature but raises a floor so that no correlation ID issued before the
/// clear can be issued again.
#[derive(Debug, Default)]
pub struct Generations {
    next: HashMap<Signature, u64>,
    floor: u64,
}

impl Generations {
    /// Create empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently issued generation for a signature, if any.
    #[must_use]
    pub fn last(&self, signature: &Signature) -> Option<u64> {
        self.next.get(signature).map(|next| next - 1)
    }

    /// Allocate the next generation for a signature.
    ///
    /// # Panics
    ///
    /// Panics on generation overflow, which is treated as fatal misuse.
    #[allow(clippy::expect_used)]
    pub fn issue(&mut self, signature: &Signature) -> u64 {
        let slot = self.next.entry(signature.clone()).or_insert(self.floor);
        let generation = *slot;
        *slot = generation.checked_add(1).expect("generation counter overflow");
        generation
    }

    /// Forget all signatures without allowing ID reuse.
    pub fn clear(&mut self) {
        if let Some(highest) = self.next.values().copied().max() {
            self.floor = self.floor.max(highest);
        }
        self.next.clear();
    }

    /// Number of signatures currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next.len()
    }

    /// Whether no signature has been issued since the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_format() {
        let sig = Signature::new("CHART#AAPL@DAY1:HOUR1");
        assert_eq!(sig.correlation_id(3).as_str(), "CHART#AAPL@DAY1:HOUR1-3");
    }

    #[test]
    fn generations_strictly_increase() {
        let mut generations = Generations::new();
        let sig = Signature::new("SEARCH#AAP@5");

        assert_eq!(generations.last(&sig), None);
        assert_eq!(generations.issue(&sig), 0);
        assert_eq!(generations.issue(&sig), 1);
        assert_eq!(generations.last(&sig), Some(1));
    }

    #[test]
    fn signatures_count_independently() {
        let mut generations = Generations::new();
        let a = Signature::new("A");
        let b = Signature::new("B");

        assert_eq!(generations.issue(&a), 0);
        assert_eq!(generations.issue(&a), 1);
        assert_eq!(generations.issue(&b), 0);
        assert_eq!(generations.len(), 2);
    }

    #[test]
    fn clear_never_reissues_an_id() {
        let mut generations = Generations::new();
        let sig = Signature::new("A");
        let other = Signature::new("B");
        generations.issue(&sig);
        generations.issue(&sig);
        generations.issue(&other);

        generations.clear();
        assert!(generations.is_empty());
        assert_eq!(generations.last(&sig), None);

        assert_eq!(generations.issue(&sig), 2);
        assert_eq!(generations.issue(&other), 2);
    }

    #[test]
    fn list_normalization_is_order_and_case_insensitive() {
        assert_eq!(normalize_list(&["msft", "AAPL", "aapl"]), "AAPL,MSFT");
        assert_eq!(normalize(" aapl "), "AAPL");
    }
}
