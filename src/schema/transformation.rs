use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Trigger condition attached to a transformation, kept for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Threshold {
    /// Fires when a tracked quantity crosses this value.
    Scalar(f64),
    /// Fires on a structural condition (a phase, a combination of flags).
    Structural(String),
}

/// One-shot, irreversible transformation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub fired: bool,
    /// 0..1, non-decreasing. Pinned to 1 once fired.
    pub progress: f64,
    pub threshold: Threshold,
}

impl Transformation {
    pub fn new(threshold: Threshold) -> Self {
        Self {
            fired: false,
            progress: 0.0,
            threshold,
        }
    }
}

/// Transformation states of a story, keyed by rule id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationTable<Id: Eq + Hash> {
    entries: FxHashMap<Id, Transformation>,
}

impl<Id: Copy + Eq + Hash> TransformationTable<Id> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    pub fn with(mut self, id: Id, threshold: Threshold) -> Self {
        self.entries.insert(id, Transformation::new(threshold));
        self
    }

    pub fn get(&self, id: Id) -> Option<&Transformation> {
        self.entries.get(&id)
    }

    pub fn fired(&self, id: Id) -> bool {
        self.entries.get(&id).is_some_and(|t| t.fired)
    }

    pub fn progress(&self, id: Id) -> f64 {
        self.entries.get(&id).map_or(0.0, |t| t.progress)
    }

    /// Raise progress toward `value`. Progress never decreases and is left
    /// alone once the transformation has fired.
    pub fn raise_progress(&mut self, id: Id, value: f64) {
        if let Some(t) = self.entries.get_mut(&id) {
            if !t.fired {
                t.progress = t.progress.max(value.clamp(0.0, 1.0));
            }
        }
    }

    /// Mark the transformation fired. Returns true only on the first call.
    pub fn fire(&mut self, id: Id) -> bool {
        match self.entries.get_mut(&id) {
            Some(t) if !t.fired => {
                t.fired = true;
                t.progress = 1.0;
                true
            }
            _ => false,
        }
    }

    pub fn fired_count(&self) -> usize {
        self.entries.values().filter(|t| t.fired).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, &Transformation)> {
        self.entries.iter()
    }
}

impl<Id: Copy + Eq + Hash> Default for TransformationTable<Id> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TransformationTable<u8> {
        TransformationTable::new()
            .with(1, Threshold::Scalar(0.6))
            .with(2, Threshold::Structural("phase:locked".to_string()))
    }

    #[test]
    fn fire_is_one_shot() {
        let mut t = table();
        assert!(t.fire(1));
        assert!(!t.fire(1));
        assert!(t.fired(1));
        assert_eq!(t.progress(1), 1.0);
        assert_eq!(t.fired_count(), 1);
    }

    #[test]
    fn progress_never_decreases() {
        let mut t = table();
        t.raise_progress(2, 0.4);
        t.raise_progress(2, 0.1);
        assert!((t.progress(2) - 0.4).abs() < f64::EPSILON);
        t.raise_progress(2, 7.0);
        assert_eq!(t.progress(2), 1.0);
    }

    #[test]
    fn progress_frozen_after_fire() {
        let mut t = table();
        t.fire(1);
        t.raise_progress(1, 0.2);
        assert_eq!(t.progress(1), 1.0);
    }

    #[test]
    fn unknown_id_is_inert() {
        let mut t = table();
        assert!(!t.fire(9));
        assert!(!t.fired(9));
        assert_eq!(t.progress(9), 0.0);
    }
}
