//! The contract every story engine implements.
//!
//! A story is a pure state machine: `advance` for time, `apply` for
//! commands. Neither mutates its input; both return a fresh snapshot.

use rand::rngs::StdRng;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::core::command_text::CommandParseError;
use crate::schema::constraint::Constraint;

/// Internal consistency failure. Never a runtime condition: seeing one
/// means a transition rule is wrong.
#[derive(Debug, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("{name} = {value} outside [{min}, {max}]")]
    OutOfBounds {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("dilation multiplier {0} below 1")]
    DilationBelowOne(f64),
    #[error("subjective clock {subjective} behind objective clock {objective}")]
    ClockOrder { subjective: f64, objective: f64 },
    #[error("{0}")]
    Broken(String),
}

/// Check a constraint against its own bounds.
pub fn check_bounds(name: &'static str, constraint: &Constraint) -> Result<(), InvariantViolation> {
    check_range(name, constraint.value, constraint.bounds.min, constraint.bounds.max)
}

pub fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), InvariantViolation> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(InvariantViolation::OutOfBounds {
            name,
            value,
            min,
            max,
        })
    }
}

/// Result of a dispatched command: the next snapshot plus anything the
/// reader should be told about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, N> {
    pub state: S,
    pub notices: Vec<N>,
}

impl<S: Clone, N> Transition<S, N> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            notices: Vec::new(),
        }
    }

    /// State untouched, one notice.
    pub fn unchanged(state: &S, notice: N) -> Self {
        Self {
            state: state.clone(),
            notices: vec![notice],
        }
    }

    pub fn notice(mut self, notice: N) -> Self {
        self.notices.push(notice);
        self
    }
}

/// A narrative constraint simulation.
pub trait Story {
    type State: Clone + PartialEq + fmt::Debug + fmt::Display + Serialize;
    type Command: Clone + fmt::Debug;
    type Notice: Clone + fmt::Debug + fmt::Display + Serialize;
    type Event: Clone + fmt::Debug + fmt::Display + Serialize;

    const NAME: &'static str;

    /// Starting snapshot. The RNG covers boot-time generation only.
    fn initial(&self, rng: &mut StdRng) -> Self::State;

    /// Time-driven step. `dt` must be positive; a terminal state is returned
    /// unchanged.
    fn advance(&self, state: &Self::State, dt: f64, rng: &mut StdRng) -> Self::State;

    /// Command-driven step. Deterministic, no randomness.
    fn apply(&self, state: &Self::State, command: &Self::Command) -> Transition<Self::State, Self::Notice>;

    /// Map a line of reader input to a command.
    fn parse(&self, input: &str) -> Result<Self::Command, CommandParseError>;

    /// Notice shown when input does not parse.
    fn not_understood(&self, input: &str, error: &CommandParseError) -> Self::Notice;

    fn is_terminal(&self, state: &Self::State) -> bool;

    fn validate(&self, state: &Self::State) -> Result<(), InvariantViolation>;

    /// Presentation-facing differences between two consecutive snapshots.
    fn events(&self, previous: &Self::State, next: &Self::State) -> Vec<Self::Event>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::constraint::Bounds;

    #[test]
    fn bounds_check_reports_name() {
        let mut c = Constraint::new(1.0, Bounds::UNIT);
        assert!(check_bounds("unit", &c).is_ok());
        c.value = 1.5;
        let err = check_bounds("unit", &c).unwrap_err();
        assert_eq!(err.to_string(), "unit = 1.5 outside [0, 1]");
    }

    #[test]
    fn nan_is_out_of_range() {
        assert!(check_range("nan", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn transition_helpers() {
        let t: Transition<u32, &str> = Transition::unchanged(&7, "no-op");
        assert_eq!(t.state, 7);
        assert_eq!(t.notices, vec!["no-op"]);
        let t = Transition::<u32, &str>::new(8).notice("a").notice("b");
        assert_eq!(t.notices.len(), 2);
    }
}
