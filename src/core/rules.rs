//! Ordered one-shot transformation rules.
//!
//! Each rule pairs a pure guard with an effect. Rules run in list order; a
//! rule that has already fired is skipped on its `fired` flag before its
//! guard is ever consulted, so effects apply at most once per session.

use rand::rngs::StdRng;
use std::fmt;
use std::hash::Hash;

use crate::schema::transformation::TransformationTable;

/// State that carries a transformation table.
pub trait RuleState {
    type RuleId: Copy + Eq + Hash + fmt::Debug;

    fn transformations(&self) -> &TransformationTable<Self::RuleId>;
    fn transformations_mut(&mut self) -> &mut TransformationTable<Self::RuleId>;
}

/// A single transformation rule over state `S` with read-only context `C`
/// (usually the story configuration).
pub struct Rule<S: RuleState, C> {
    pub id: S::RuleId,
    /// Presentation progress toward firing, if the rule tracks one.
    pub progress: fn(&S, &C) -> Option<f64>,
    pub guard: fn(&S, &C) -> bool,
    pub effect: fn(&mut S, &C, &mut StdRng),
}

/// Rule with no progress tracking.
pub fn no_progress<S, C>(_: &S, _: &C) -> Option<f64> {
    None
}

/// Rule that only flips its flag.
pub fn no_effect<S, C>(_: &mut S, _: &C, _: &mut StdRng) {}

/// Rules evaluated in a fixed order.
pub struct RuleSet<S: RuleState, C> {
    rules: Vec<Rule<S, C>>,
}

impl<S: RuleState, C> RuleSet<S, C> {
    pub fn new(rules: Vec<Rule<S, C>>) -> Self {
        Self { rules }
    }

    pub fn ids(&self) -> impl Iterator<Item = S::RuleId> + '_ {
        self.rules.iter().map(|r| r.id)
    }

    /// Evaluate every rule once against `state`, in order. Later rules see
    /// the effects of earlier ones. Returns the ids that fired on this pass.
    pub fn evaluate(&self, state: &mut S, context: &C, rng: &mut StdRng) -> Vec<S::RuleId> {
        let mut fired = Vec::new();
        for rule in &self.rules {
            if state.transformations().fired(rule.id) {
                continue;
            }
            if let Some(p) = (rule.progress)(state, context) {
                state.transformations_mut().raise_progress(rule.id, p);
            }
            if !(rule.guard)(state, context) {
                continue;
            }
            if state.transformations_mut().fire(rule.id) {
                (rule.effect)(state, context, rng);
                tracing::info!(rule = ?rule.id, "transformation fired");
                fired.push(rule.id);
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::transformation::Threshold;
    use rand::SeedableRng;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Id {
        Low,
        Echo,
    }

    struct Tank {
        level: f64,
        alarms: u32,
        table: TransformationTable<Id>,
    }

    impl RuleState for Tank {
        type RuleId = Id;

        fn transformations(&self) -> &TransformationTable<Id> {
            &self.table
        }

        fn transformations_mut(&mut self) -> &mut TransformationTable<Id> {
            &mut self.table
        }
    }

    fn rules() -> RuleSet<Tank, f64> {
        RuleSet::new(vec![
            Rule {
                id: Id::Low,
                progress: |s, limit| Some(1.0 - s.level / limit),
                guard: |s, limit| s.level < *limit / 2.0,
                effect: |s, _, _| s.alarms += 1,
            },
            Rule {
                id: Id::Echo,
                progress: no_progress,
                guard: |s, _| s.table.fired(Id::Low),
                effect: |s, _, _| s.alarms += 10,
            },
        ])
    }

    fn tank(level: f64) -> Tank {
        Tank {
            level,
            alarms: 0,
            table: TransformationTable::new()
                .with(Id::Low, Threshold::Scalar(0.5))
                .with(Id::Echo, Threshold::Structural("low fired".to_string())),
        }
    }

    #[test]
    fn later_rules_see_earlier_effects() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = tank(10.0);
        let fired = rules().evaluate(&mut t, &100.0, &mut rng);
        assert_eq!(fired, vec![Id::Low, Id::Echo]);
        assert_eq!(t.alarms, 11);
    }

    #[test]
    fn fired_rules_do_not_reapply() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = tank(10.0);
        let set = rules();
        set.evaluate(&mut t, &100.0, &mut rng);
        let again = set.evaluate(&mut t, &100.0, &mut rng);
        assert!(again.is_empty());
        assert_eq!(t.alarms, 11);
    }

    #[test]
    fn progress_updates_before_firing() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = tank(80.0);
        let fired = rules().evaluate(&mut t, &100.0, &mut rng);
        assert!(fired.is_empty());
        assert!((t.table.progress(Id::Low) - 0.2).abs() < 1e-12);
        assert_eq!(t.alarms, 0);
    }

    #[test]
    fn ids_in_order() {
        let ids: Vec<Id> = rules().ids().collect();
        assert_eq!(ids, vec![Id::Low, Id::Echo]);
    }
}
