//! Ephemeral evacuation routes.
//!
//! The PME proposes a new route on a cadence that tightens as dilation
//! climbs, and retires routes as the objective clock runs past their
//! windows. Generation runs before expiry within a tick, so a slot freed by
//! expiry can only be filled on a later tick.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::schema::route::{Classification, Route, RouteId};
use crate::stories::stave::config::{GeneratorConfig, StaveConfig};
use crate::stories::stave::state::StaveState;

/// What one generator pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorPass {
    pub generated: Option<RouteId>,
    pub deprecated: Vec<RouteId>,
}

/// Ticks between generations at the given dilation.
pub fn interval(dilation: f64, config: &GeneratorConfig) -> u64 {
    (config.base_interval - config.interval_slope * dilation)
        .max(config.min_interval)
        .floor() as u64
}

/// Snapshot-in, snapshot-out generator pass.
pub fn maybe_generate(state: &StaveState, config: &StaveConfig, rng: &mut StdRng) -> StaveState {
    let mut next = state.clone();
    step(&mut next, config, rng);
    next
}

pub(crate) fn step(state: &mut StaveState, config: &StaveConfig, rng: &mut StdRng) -> GeneratorPass {
    let mut pass = GeneratorPass::default();
    let every = interval(state.pme.dilation_multiplier, &config.generator).max(1);
    if state.system.tick_count % every == 0 && state.live_route_count() < config.generator.ceiling {
        let route = build_route(state, &config.generator, rng);
        tracing::debug!(route = %route.id, "route generated");
        pass.generated = Some(route.id);
        state.pme.routes.push(route);
        state.pme.next_route_id += 1;
    }

    let objective = state.pme.objective_seconds_left;
    for route in state.pme.routes.iter_mut() {
        if route.expired_at(objective) && route.deprecate() {
            state.pme.deprecated_count += 1;
            pass.deprecated.push(route.id);
        }
    }
    if !pass.deprecated.is_empty() {
        tracing::debug!(count = pass.deprecated.len(), "routes deprecated");
    }
    pass
}

/// Routes seeded at boot, before the first tick.
pub fn seed_routes(state: &mut StaveState, config: &StaveConfig, rng: &mut StdRng) {
    for _ in 0..config.generator.initial_routes {
        let route = build_route(state, &config.generator, rng);
        state.pme.routes.push(route);
        state.pme.next_route_id += 1;
    }
}

/// Build the next route. Both expiry stamps are fixed here using the
/// dilation in force right now. Near the end of the clock the objective
/// stamp can land below zero; the clock floors at zero, so such a route
/// never expires.
fn build_route(state: &StaveState, config: &GeneratorConfig, rng: &mut StdRng) -> Route {
    let id = RouteId(state.pme.next_route_id);
    let candidates: Vec<&String> = state
        .system
        .compartments_open
        .iter()
        .filter(|_| rng.gen::<f64>() > config.compartment_skip)
        .collect();
    let steps = rng.gen_range(config.min_steps..=config.max_steps);
    let path: Vec<String> = (0..steps)
        .filter_map(|_| config.junctions.choose(rng).cloned())
        .collect();

    let subjective = state.pme.subjective_seconds_left;
    let minutes = (subjective / 60.0).floor();
    let window = (rng.gen::<f64>() * minutes * config.window_fraction)
        .floor()
        .max(0.0)
        + 1.0;
    let window = window.max(config.min_window_minutes);
    let viability = (rng.gen::<f64>() * config.viability_spread + config.viability_floor) * 100.0;
    let classification = Classification::ALL
        .choose(rng)
        .copied()
        .unwrap_or(Classification::Primary);

    Route {
        id,
        classification,
        path,
        through: candidates
            .first()
            .map(|c| c.to_string())
            .unwrap_or_else(|| config.fallback_compartment.clone()),
        viability: viability.round() as u8,
        generated_at: state.system.elapsed,
        expires_at_subjective: subjective - window * 60.0,
        expires_at_objective: state.pme.objective_seconds_left
            - window * 60.0 / state.pme.dilation_multiplier,
        deprecated: false,
        requires_valve: rng.gen::<f64>() > config.valve_threshold,
        requires_manual: rng.gen::<f64>() > config.manual_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn booted(seed: u64) -> (StaveState, StaveConfig, StdRng) {
        let config = StaveConfig::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = StaveState::from_config(&config);
        seed_routes(&mut state, &config, &mut rng);
        (state, config, rng)
    }

    #[test]
    fn interval_shrinks_with_dilation() {
        let g = GeneratorConfig::default();
        assert_eq!(interval(1.0, &g), 38);
        assert_eq!(interval(1.8, &g), 36);
        assert_eq!(interval(20.0, &g), 8);
    }

    #[test]
    fn boot_seeds_four_routes_with_sequential_ids() {
        let (state, _, _) = booted(5);
        let ids: Vec<u64> = state.pme.routes.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(state.pme.next_route_id, 5);
        assert_eq!(state.pme.routes[0].id.label(), "B1");
    }

    #[test]
    fn routes_are_well_formed() {
        for seed in 0..50 {
            let (state, config, _) = booted(seed);
            for route in &state.pme.routes {
                assert!((2..=4).contains(&route.path.len()));
                assert!((55..=95).contains(&route.viability));
                assert!(route.expires_at_subjective < state.pme.subjective_seconds_left);
                assert!(route.expires_at_objective < state.pme.objective_seconds_left);
                assert!(
                    config.compartments.contains(&route.through)
                        || route.through == config.generator.fallback_compartment
                );
                assert!(route.path.iter().all(|j| config.generator.junctions.contains(j)));
            }
        }
    }

    #[test]
    fn generation_waits_for_cadence() {
        let (mut state, config, mut rng) = booted(1);
        state.system.tick_count = 37;
        let pass = step(&mut state, &config, &mut rng);
        assert_eq!(pass.generated, None);
        state.system.tick_count = 38;
        let pass = step(&mut state, &config, &mut rng);
        assert_eq!(pass.generated, Some(RouteId(5)));
    }

    #[test]
    fn ceiling_blocks_generation_until_a_route_expires() {
        let (mut state, mut config, mut rng) = booted(3);
        config.generator.ceiling = 4;
        state.system.tick_count = 38;
        assert_eq!(step(&mut state, &config, &mut rng).generated, None);
        assert_eq!(state.pme.routes.len(), 4);

        // Run the objective clock past the first route's window. The
        // ceiling check sees the table before expiry on this pass.
        state.pme.objective_seconds_left = state.pme.routes[0].expires_at_objective - 1.0;
        let pass = step(&mut state, &config, &mut rng);
        assert_eq!(pass.generated, None);
        assert!(pass.deprecated.contains(&RouteId(1)));

        let pass = step(&mut state, &config, &mut rng);
        assert!(pass.generated.is_some());
    }

    #[test]
    fn deprecation_is_monotonic_and_counted_once() {
        let (mut state, config, mut rng) = booted(2);
        state.pme.objective_seconds_left = 0.0;
        state.system.tick_count = 1;
        step(&mut state, &config, &mut rng);
        let count = state.pme.deprecated_count;
        step(&mut state, &config, &mut rng);
        assert_eq!(state.pme.deprecated_count, count);
        assert_eq!(
            count as usize,
            state.pme.routes.iter().filter(|r| r.deprecated).count()
        );
    }

    #[test]
    fn expiry_stamp_frozen_at_creation() {
        let (mut state, config, mut rng) = booted(6);
        let stamp = state.pme.routes[0].expires_at_objective;
        state.pme.dilation_multiplier = 12.0;
        state.system.tick_count = 1;
        step(&mut state, &config, &mut rng);
        assert_eq!(state.pme.routes[0].expires_at_objective, stamp);
    }

    #[test]
    fn route_stamped_past_the_end_of_the_clock_stays_live() {
        let (mut state, config, mut rng) = booted(8);
        state.pme.objective_seconds_left = 30.0;
        state.pme.subjective_seconds_left = 30.0;
        state.system.tick_count = 38;
        let late = step(&mut state, &config, &mut rng).generated.unwrap();
        let route = state.pme.routes.iter().find(|r| r.id == late).unwrap();
        assert!(route.expires_at_objective < 0.0);

        state.pme.objective_seconds_left = 0.0;
        state.pme.subjective_seconds_left = 0.0;
        state.system.tick_count = 39;
        let pass = step(&mut state, &config, &mut rng);
        assert!(!pass.deprecated.contains(&late));
        assert!(pass.deprecated.contains(&RouteId(1)));
        assert!(state.pme.routes.iter().any(|r| r.id == late && r.is_live()));
    }

    #[test]
    fn maybe_generate_leaves_input_untouched() {
        let (mut state, config, mut rng) = booted(4);
        state.system.tick_count = 38;
        let before = state.clone();
        let next = maybe_generate(&state, &config, &mut rng);
        assert_eq!(state, before);
        assert_eq!(next.pme.routes.len(), 5);
    }
}
