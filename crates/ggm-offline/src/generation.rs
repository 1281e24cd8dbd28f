//! Cache generations.
//!
//! A generation is a named epoch of cached entries (`ggm-cache-v4`). Advancing
//! the generation is the only eviction unit: activating one deletes all others.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default generation name prefix.
pub const DEFAULT_PREFIX: &str = "ggm-cache";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Generation {
    pub prefix: String,
    pub number: u64,
}

impl Generation {
    pub fn new(number: u64) -> Self {
        Self::with_prefix(DEFAULT_PREFIX, number)
    }

    pub fn with_prefix(prefix: impl Into<String>, number: u64) -> Self {
        Self {
            prefix: prefix.into(),
            number,
        }
    }

    /// Store name of this generation.
    pub fn name(&self) -> String {
        format!("{}-v{}", self.prefix, self.number)
    }

    /// Parse a store name produced by [`Generation::name`].
    pub fn parse(name: &str) -> Option<Self> {
        let (prefix, number) = name.rsplit_once("-v")?;
        if prefix.is_empty() {
            return None;
        }
        let number = number.parse().ok()?;
        Some(Self::with_prefix(prefix, number))
    }

    pub fn next(&self) -> Self {
        Self::with_prefix(self.prefix.clone(), self.number + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.prefix, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        let generation = Generation::new(4);
        assert_eq!(generation.name(), "ggm-cache-v4");
        assert_eq!(Generation::parse("ggm-cache-v4"), Some(generation));
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert_eq!(Generation::parse("ggm-cache"), None);
        assert_eq!(Generation::parse("-v3"), None);
        assert_eq!(Generation::parse("ggm-cache-vX"), None);
    }

    #[test]
    fn test_next() {
        assert_eq!(Generation::new(4).next().name(), "ggm-cache-v5");
    }
}
