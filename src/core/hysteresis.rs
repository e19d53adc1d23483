//! Hysteresis tracker: latches flags the first time their trigger holds.

use std::hash::Hash;

use crate::schema::hysteresis::HysteresisSet;

/// State that carries a hysteresis flag set.
pub trait Tracked {
    type Flag: Copy + Eq + Hash + std::fmt::Debug;

    fn hysteresis(&self) -> &HysteresisSet<Self::Flag>;
    fn hysteresis_mut(&mut self) -> &mut HysteresisSet<Self::Flag>;
}

pub struct Trigger<S: Tracked> {
    pub flag: S::Flag,
    pub predicate: fn(&S) -> bool,
}

pub struct HysteresisTracker<S: Tracked> {
    triggers: Vec<Trigger<S>>,
}

impl<S: Tracked> HysteresisTracker<S> {
    pub fn new(triggers: Vec<Trigger<S>>) -> Self {
        Self { triggers }
    }

    /// Latch every flag whose predicate holds. Predicates of flags already
    /// set are not evaluated. Returns the flags latched by this call.
    pub fn update(&self, state: &mut S) -> Vec<S::Flag> {
        let latched: Vec<S::Flag> = self
            .triggers
            .iter()
            .filter(|t| !state.hysteresis().is_set(t.flag) && (t.predicate)(state))
            .map(|t| t.flag)
            .collect();
        for flag in &latched {
            state.hysteresis_mut().set(*flag);
            tracing::debug!(flag = ?flag, "hysteresis flag latched");
        }
        latched
    }
}
