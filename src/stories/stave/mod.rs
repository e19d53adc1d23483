//! STAVE: a deep-sea station whose automated systems narrate its failure.
//!
//! Hull integrity decays on objective time while the Predictive Modeling
//! Engine stretches the crew's subjective clock and keeps proposing
//! evacuation routes that expire before they can be used.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod generator;
pub mod propagator;
pub mod rules;
pub mod state;

use rand::rngs::StdRng;

use crate::core::command_text::CommandParseError;
use crate::core::config::{ConfigError, StoryConfig};
use crate::core::hysteresis::{HysteresisTracker, Trigger};
use crate::core::rules::RuleSet;
use crate::core::story::{check_bounds, InvariantViolation, Story, Transition};
use crate::schema::constraint::Phase;

pub use config::StaveConfig;
pub use dispatch::{StaveCommand, StaveNotice};
pub use events::StaveEvent;
pub use state::{StaveFlag, StaveRule, StaveState};

pub struct Stave {
    config: StaveConfig,
    rules: RuleSet<StaveState, StaveConfig>,
    tracker: HysteresisTracker<StaveState>,
}

impl Stave {
    pub fn new(config: StaveConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: StaveConfig) -> Self {
        Self {
            config,
            rules: rules::rule_set(),
            tracker: HysteresisTracker::new(vec![
                Trigger {
                    flag: StaveFlag::SeenObjectiveClock,
                    predicate: |s: &StaveState| {
                        s.system.diagnostic_unlocked && !s.system.in_diagnostic_mode
                    },
                },
                Trigger {
                    flag: StaveFlag::SeenDirectiveShell,
                    predicate: |s: &StaveState| s.constraints.directive.phase == Phase::Shell,
                },
                Trigger {
                    flag: StaveFlag::SeenFidelityLock,
                    predicate: |s: &StaveState| s.constraints.fidelity.phase == Phase::Locked,
                },
            ]),
        }
    }

    pub fn config(&self) -> &StaveConfig {
        &self.config
    }

    pub(crate) fn rules(&self) -> &RuleSet<StaveState, StaveConfig> {
        &self.rules
    }

    pub(crate) fn tracker(&self) -> &HysteresisTracker<StaveState> {
        &self.tracker
    }
}

impl Default for Stave {
    fn default() -> Self {
        Self::from_valid(StaveConfig::default())
    }
}

impl Story for Stave {
    type State = StaveState;
    type Command = StaveCommand;
    type Notice = StaveNotice;
    type Event = StaveEvent;

    const NAME: &'static str = "stave";

    fn initial(&self, rng: &mut StdRng) -> StaveState {
        let mut state = StaveState::from_config(&self.config);
        generator::seed_routes(&mut state, &self.config, rng);
        state
    }

    fn advance(&self, state: &StaveState, dt: f64, rng: &mut StdRng) -> StaveState {
        propagator::advance(self, state, dt, rng)
    }

    fn apply(&self, state: &StaveState, command: &StaveCommand) -> Transition<StaveState, StaveNotice> {
        dispatch::apply(self, state, command)
    }

    fn parse(&self, input: &str) -> Result<StaveCommand, CommandParseError> {
        dispatch::parse(input)
    }

    fn not_understood(&self, input: &str, _: &CommandParseError) -> StaveNotice {
        StaveNotice::NotUnderstood(input.to_string())
    }

    fn is_terminal(&self, state: &StaveState) -> bool {
        state.system.terminal
    }

    fn validate(&self, s: &StaveState) -> Result<(), InvariantViolation> {
        check_bounds("directive", &s.constraints.directive)?;
        check_bounds("fidelity", &s.constraints.fidelity)?;
        check_bounds("hull", &s.constraints.hull)?;
        if s.pme.dilation_multiplier.is_nan() || s.pme.dilation_multiplier < 1.0 {
            return Err(InvariantViolation::DilationBelowOne(s.pme.dilation_multiplier));
        }
        if s.pme.subjective_seconds_left < s.pme.objective_seconds_left {
            return Err(InvariantViolation::ClockOrder {
                subjective: s.pme.subjective_seconds_left,
                objective: s.pme.objective_seconds_left,
            });
        }
        let crew = &self.config.crew;
        if s.system.crew_viable < crew.floor || s.system.crew_viable > crew.total {
            return Err(InvariantViolation::Broken(format!(
                "crew_viable {} outside [{}, {}]",
                s.system.crew_viable, crew.floor, crew.total
            )));
        }
        let deprecated = s.pme.routes.iter().filter(|r| r.deprecated).count();
        if deprecated != s.pme.deprecated_count as usize {
            return Err(InvariantViolation::Broken(format!(
                "deprecated_count {} but {} routes deprecated",
                s.pme.deprecated_count, deprecated
            )));
        }
        if s.pme.routes.iter().any(|r| r.id.0 >= s.pme.next_route_id) {
            return Err(InvariantViolation::Broken("route id not below next_route_id".to_string()));
        }
        if s.system.terminal != s.system.terminal_timestamp.is_some() {
            return Err(InvariantViolation::Broken(
                "terminal flag and timestamp disagree".to_string(),
            ));
        }
        if s.system.risk_nominal.1 > self.config.risk.ceiling {
            return Err(InvariantViolation::Broken(format!(
                "risk band {:?} above ceiling",
                s.system.risk_nominal
            )));
        }
        Ok(())
    }

    fn events(&self, previous: &StaveState, next: &StaveState) -> Vec<StaveEvent> {
        events::diff(previous, next, self.config.crew.total)
    }
}
