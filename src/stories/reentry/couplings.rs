//! Constraint couplings, re-run after every reentry transition.
//!
//! Order: displacement from scrub, field engagement, snare drift, rope
//! degradation, rules TR1..TR4, attractor proximity, terminal check, sync
//! point, hysteresis.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::rules::{no_effect, no_progress, Rule, RuleSet};
use crate::schema::constraint::Phase;
use crate::stories::reentry::state::{ConstraintKind, ReentryRule, ReentryState, SyncPoint};
use crate::stories::reentry::{Reentry, ReentryConfig};

/// Snare drift on the early part of the timeline.
pub fn chi_for_scrub(scrub: f64, config: &ReentryConfig) -> f64 {
    config.chi_base + (scrub / config.chi_track_below) * config.chi_span
}

pub fn rope_for_delta(delta_t: f64, config: &ReentryConfig) -> f64 {
    let degradation = (delta_t / config.max_delta_t).min(1.0);
    (config.rope_top - degradation * (config.rope_top - config.rope_floor)).max(config.rope_floor)
}

pub fn rule_set() -> RuleSet<ReentryState, ReentryConfig> {
    RuleSet::new(vec![
        Rule {
            id: ReentryRule::EscapeThreshold,
            progress: |s, c| Some((s.constraints.snare.chi / c.escape_chi).min(1.0)),
            guard: |s, c| s.constraints.snare.chi >= c.escape_chi,
            effect: |s, _, _| {
                s.ucz.visible = true;
                s.constraints.snare.escalate(Phase::Shifted);
            },
        },
        Rule {
            id: ReentryRule::ContractObsolescence,
            progress: |s, c| Some((s.ucz.delta_t / c.obsolete_delta_t).min(1.0)),
            guard: |s, c| s.ucz.delta_t >= c.obsolete_delta_t,
            effect: |s, _, _| {
                s.constraints.rope.escalate(Phase::Piton);
                s.constraints.rope_kind = ConstraintKind::Piton;
            },
        },
        Rule {
            id: ReentryRule::IndexMismatch,
            progress: no_progress,
            guard: |s, c| s.constraints.rope.phase == Phase::Piton && s.scrub >= c.mismatch_scrub,
            effect: no_effect,
        },
        Rule {
            id: ReentryRule::MisalignmentAsMobility,
            progress: no_progress,
            guard: |s, c| s.transformations.fired(ReentryRule::IndexMismatch) && s.scrub >= c.mobility_scrub,
            effect: no_effect,
        },
    ])
}

pub fn propagate(story: &Reentry, state: &mut ReentryState) {
    let config = story.config();
    let scrub = state.scrub;

    state.ucz.delta_t = scrub / 100.0 * state.ucz.max_delta_t;
    if scrub >= config.engage_scrub && !state.ucz.engaged {
        state.ucz.engaged = true;
        state.ucz.active = true;
    }

    if scrub < config.chi_track_below {
        let chi = (chi_for_scrub(scrub, config) + state.strain).min(1.0);
        state.constraints.snare.chi = chi;
        state.constraints.snare.set(chi);
    }

    let rope = rope_for_delta(state.ucz.delta_t, config);
    state.constraints.rope.set(rope);

    // Rule effects here are deterministic; the generator is never consulted.
    let mut rng = StdRng::seed_from_u64(0);
    story.rules().evaluate(state, config, &mut rng);

    let fired = state.transformations.fired_count();
    state.attractor_proximity = fired as f64 / ReentryRule::ALL.len() as f64;
    if fired == ReentryRule::ALL.len() && scrub >= config.terminal_scrub && !state.terminal {
        state.terminal = true;
        tracing::info!(scrub, "reentry reached its ending");
    }
    state.sync_point = SyncPoint::at(scrub);

    story.tracker().update(state);
}
