use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Monotonic set of "has this ever been true" flags.
///
/// Flags are only ever inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HysteresisSet<F: Eq + Hash> {
    flags: FxHashSet<F>,
}

impl<F: Copy + Eq + Hash> HysteresisSet<F> {
    pub fn new() -> Self {
        Self {
            flags: FxHashSet::default(),
        }
    }

    pub fn is_set(&self, flag: F) -> bool {
        self.flags.contains(&flag)
    }

    /// Set the flag. Returns true only the first time.
    pub fn set(&mut self, flag: F) -> bool {
        self.flags.insert(flag)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl<F: Copy + Eq + Hash> Default for HysteresisSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Flag {
        Seen,
        Heard,
    }

    #[test]
    fn set_once() {
        let mut set = HysteresisSet::new();
        assert!(set.is_empty());
        assert!(set.set(Flag::Seen));
        assert!(!set.set(Flag::Seen));
        assert!(set.is_set(Flag::Seen));
        assert!(!set.is_set(Flag::Heard));
        assert_eq!(set.len(), 1);
    }
}
