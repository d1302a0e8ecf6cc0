//! Detected entities: typed spans of interest within a payload

use serde::{Deserialize, Serialize};

/// A span of interest detected by the extractor capability.
///
/// Offsets are character offsets into the original payload text.
/// Spans from a single detection pass are not guaranteed to be
/// non-overlapping; the risk assessor resolves overlaps before
/// masking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The matched text
    pub text: String,
    /// Broad category assigned by the extractor (e.g. "PHI")
    pub category: String,
    /// Specific entity type (e.g. "NAME", "EMAIL")
    pub entity_type: String,
    /// Extractor confidence in [0.0, 1.0]
    pub confidence: f64,
    /// Inclusive start offset (chars)
    pub begin_offset: usize,
    /// Exclusive end offset (chars)
    pub end_offset: usize,
}

impl Entity {
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
        entity_type: impl Into<String>,
        confidence: f64,
        begin_offset: usize,
        end_offset: usize,
    ) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            entity_type: entity_type.into(),
            confidence,
            begin_offset,
            end_offset,
        }
    }

    /// Span length in characters
    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.begin_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.end_offset <= self.begin_offset
    }

    /// Check whether the span fits within a payload of `payload_len` chars
    pub fn is_well_formed(&self, payload_len: usize) -> bool {
        self.begin_offset < self.end_offset && self.end_offset <= payload_len
    }

    /// Check whether two spans overlap
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.begin_offset < other.end_offset && other.begin_offset < self.end_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(begin: usize, end: usize) -> Entity {
        Entity::new("x", "PHI", "NAME", 0.9, begin, end)
    }

    #[test]
    fn test_well_formed() {
        assert!(span(0, 4).is_well_formed(10));
        assert!(span(6, 10).is_well_formed(10));
        assert!(!span(6, 11).is_well_formed(10));
        assert!(!span(4, 4).is_well_formed(10));
        assert!(!span(5, 3).is_well_formed(10));
    }

    #[test]
    fn test_overlaps() {
        assert!(span(0, 5).overlaps(&span(4, 8)));
        assert!(span(4, 8).overlaps(&span(0, 5)));
        assert!(span(2, 6).overlaps(&span(3, 4)));
        assert!(!span(0, 5).overlaps(&span(5, 8)));
        assert!(!span(5, 8).overlaps(&span(0, 5)));
    }

    #[test]
    fn test_len() {
        assert_eq!(span(3, 9).len(), 6);
        assert_eq!(span(9, 3).len(), 0);
    }
}
