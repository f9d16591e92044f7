//! IMAP command tag generation.
//!
//! Tags are used to match commands with their completion lines.

use std::sync::atomic::{AtomicU32, Ordering};

/// Sequential tag source for one session.
///
/// Generates `A1`, `A2`, `A3`, and so on; a fresh sequence per connection.
#[derive(Debug)]
pub struct TagSequence {
    counter: AtomicU32,
}

impl TagSequence {
    /// Creates a new tag sequence starting at `A1`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("A{}", n + 1)
    }

    /// Returns how many tags have been issued.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for TagSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let tags = TagSequence::new();
        assert_eq!(tags.next(), "A1");
        assert_eq!(tags.next(), "A2");
        assert_eq!(tags.next(), "A3");
    }

    #[test]
    fn test_issued() {
        let tags = TagSequence::new();
        assert_eq!(tags.issued(), 0);
        let _ = tags.next();
        let _ = tags.next();
        assert_eq!(tags.issued(), 2);
    }

    #[test]
    fn test_uniqueness() {
        let tags = TagSequence::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(tags.next()), "duplicate tag generated");
        }
    }
}
