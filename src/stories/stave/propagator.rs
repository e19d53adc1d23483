//! Time-driven propagation for STAVE.
//!
//! One tick runs, in order: hull decay, PME dilation, subjective clock,
//! hull phase, couplings, transformation rules, the route generator, the
//! repair-task cadence, and finally the hysteresis tracker. Each step reads
//! the state the previous steps left behind.

use rand::rngs::StdRng;
use rand::Rng;

use crate::schema::constraint::Phase;
use crate::stories::stave::config::{DilationConfig, StaveConfig};
use crate::stories::stave::generator;
use crate::stories::stave::state::{StaveRule, StaveState, REPAIR_TASKS};
use crate::stories::stave::Stave;

/// PME cycle multiplier for a hull reading. Never below 1 for hull values
/// inside `[0, full_scale]`, and continuous at the breakpoint.
pub fn dilation_multiplier(hull: f64, curve: &DilationConfig) -> f64 {
    let mild = |h: f64| 1.0 + (1.0 - h / curve.full_scale) * curve.mild_slope;
    if hull < curve.breakpoint {
        let stress = 1.0 - hull / curve.breakpoint;
        mild(curve.breakpoint) + stress * curve.steep_slope
    } else {
        mild(hull)
    }
}

/// Hull decay per unit time under the transformations fired so far.
pub fn decay_rate(state: &StaveState, config: &StaveConfig) -> f64 {
    let mut rate = config.decay.base;
    if state.transformations.fired(StaveRule::DirectiveContradiction) {
        rate *= config.decay.cascade_multiplier;
    }
    if state.transformations.fired(StaveRule::FidelityLock) {
        rate *= config.decay.lock_multiplier;
    }
    rate
}

pub fn advance(stave: &Stave, state: &StaveState, dt: f64, rng: &mut StdRng) -> StaveState {
    if state.system.terminal {
        return state.clone();
    }
    if !(dt.is_finite() && dt > 0.0) {
        tracing::warn!(dt, "rejected non-positive time step");
        return state.clone();
    }
    let config = stave.config();
    let mut s = state.clone();

    s.system.elapsed += dt;
    s.system.tick_count += 1;

    let decay = decay_rate(&s, config) * dt;
    s.constraints.hull.nudge(-decay);
    s.pme.objective_seconds_left = (s.pme.objective_seconds_left - dt).max(0.0);

    let hull = s.constraints.hull.value;
    s.pme.dilation_multiplier = dilation_multiplier(hull, &config.dilation);
    s.pme.subjective_seconds_left = s.pme.objective_seconds_left * s.pme.dilation_multiplier;
    s.pme.cycle_count += 1;

    if hull <= s.constraints.hull.bounds.min {
        s.constraints.hull.escalate(Phase::Failed);
        s.system.terminal = true;
        s.system.terminal_timestamp = Some(s.system.elapsed);
    } else if hull < config.hull_critical {
        s.constraints.hull.escalate(Phase::Critical);
    }

    couple(&mut s, config, dt, rng);

    stave.rules().evaluate(&mut s, config, rng);

    generator::step(&mut s, config, rng);

    offer_task(&mut s, config);

    stave.tracker().update(&mut s);

    tracing::debug!(
        tick = s.system.tick_count,
        hull = s.constraints.hull.value,
        dilation = s.pme.dilation_multiplier,
        live_routes = s.live_route_count(),
        "stave tick"
    );
    s
}

/// Cross-constraint couplings: DIRECTIVE attrition, FIDELITY risk drift and
/// the cascade sealing cadence.
fn couple(s: &mut StaveState, config: &StaveConfig, dt: f64, rng: &mut StdRng) {
    let crew = &config.crew;
    if s.counters.directive_actions > crew.actions_before_loss
        && s.system.crew_viable > crew.protected_crew
        && rng.gen::<f64>() < crew.loss_rate * dt
    {
        s.system.crew_viable = (s.system.crew_viable - 1).max(crew.floor);
    }

    if s.counters.tasks_accepted > 0 {
        let shift = s.counters.tasks_accepted as f64 * config.risk.per_accept;
        let low = config.risk.nominal.0;
        s.system.risk_nominal = (low, (config.risk.nominal.1 + shift).min(config.risk.ceiling));
    }

    if s.constraints.directive.phase == Phase::Cascade
        && s.system.tick_count % config.sealing.period == 0
        && s.system.compartments_open.len() > config.sealing.keep_open
    {
        if let Some(sealed) = s.seal_random(rng) {
            tracing::debug!(compartment = %sealed, "directive sealed compartment");
        }
    }
}

fn offer_task(s: &mut StaveState, config: &StaveConfig) {
    if s.system.terminal
        || s.system.pending_task.is_some()
        || s.system.tick_count % config.tasks.offer_period != config.tasks.offer_phase
    {
        return;
    }
    if let Some(task) = REPAIR_TASKS.get(s.counters.tasks_offered as usize) {
        s.counters.tasks_offered += 1;
        s.system.pending_task = Some(task.clone());
        tracing::debug!(task = task.id, "repair task offered");
    }
}
