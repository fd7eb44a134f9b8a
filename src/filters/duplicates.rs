use std::collections::HashSet;

/// Tracks identifiers seen during one filter pass.
///
/// The first occurrence of an identifier is never a duplicate; every later
/// occurrence is, and is remembered in the duplicate set.
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    seen: HashSet<String>,
    duplicates: HashSet<String>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence, returning true when the identifier was seen before
    pub fn observe(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            self.duplicates.insert(id.to_string());
            true
        } else {
            self.seen.insert(id.to_string());
            false
        }
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_occurrence_is_not_duplicate() {
        let mut tracker = DuplicateTracker::new();
        assert!(!tracker.observe("bbc1.uk"));
        assert_eq!(tracker.duplicate_count(), 0);
        assert!(tracker.observe("bbc1.uk"));
        assert!(tracker.observe("bbc1.uk"));
        assert!(!tracker.observe("itv1.uk"));

        assert_eq!(tracker.duplicate_count(), 1);
    }
}
