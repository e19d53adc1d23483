//! STAVE transformations T1..T4, evaluated in that order every tick.

use crate::core::rules::{no_effect, no_progress, Rule, RuleSet};
use crate::schema::constraint::Phase;
use crate::stories::stave::config::StaveConfig;
use crate::stories::stave::state::{StaveRule, StaveState};

fn contradiction_progress(s: &StaveState, c: &StaveConfig) -> Option<f64> {
    let hull = s.constraints.hull.value;
    let onset = c.rules.contradiction_onset;
    (hull < onset).then(|| ((onset - hull) / c.rules.contradiction_span).min(1.0))
}

fn avalanche_ratio(s: &StaveState, c: &StaveConfig) -> Option<f64> {
    let total = s.pme.routes.len();
    (total > c.rules.avalanche_min_routes).then(|| s.pme.deprecated_count as f64 / total as f64)
}

pub fn rule_set() -> RuleSet<StaveState, StaveConfig> {
    RuleSet::new(vec![
        Rule {
            id: StaveRule::DirectiveContradiction,
            progress: contradiction_progress,
            guard: |s, c| contradiction_progress(s, c).is_some_and(|p| p >= c.rules.contradiction_fire),
            effect: |s, c, rng| {
                s.constraints.directive.escalate(Phase::Cascade);
                if s.system.compartments_open.len() > c.rules.contradiction_keep_open {
                    s.seal_random(rng);
                }
            },
        },
        Rule {
            id: StaveRule::FidelityLock,
            progress: |s, c| Some(s.counters.tasks_accepted as f64 / c.rules.lock_accepts as f64),
            guard: |s, c| s.counters.tasks_accepted >= c.rules.lock_accepts,
            effect: |s, _, _| {
                s.constraints.fidelity.escalate(Phase::Locked);
            },
        },
        Rule {
            id: StaveRule::RouteAvalanche,
            progress: avalanche_ratio,
            guard: |s, c| avalanche_ratio(s, c).is_some_and(|r| r >= c.rules.avalanche_ratio),
            effect: no_effect,
        },
        Rule {
            id: StaveRule::DirectiveShell,
            progress: no_progress,
            guard: |s, c| s.constraints.hull.value < c.rules.shell_hull,
            effect: |s, _, _| {
                s.constraints.directive.escalate(Phase::Shell);
            },
        },
    ])
}
