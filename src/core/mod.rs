pub mod command_text;
pub mod config;
pub mod hysteresis;
pub mod rules;
pub mod scheduler;
pub mod script;
pub mod session;
pub mod story;

/// Minimal story used by the session and scheduler tests.
#[cfg(test)]
pub(crate) mod testing {
    use rand::rngs::StdRng;
    use serde::Serialize;
    use std::fmt;

    use crate::core::command_text::{parse_u32, CommandLine, CommandParseError};
    use crate::core::story::{InvariantViolation, Story, Transition};

    pub struct Counter {
        limit: u64,
    }

    impl Counter {
        pub fn with_limit(limit: u64) -> Self {
            Self { limit }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct CounterState {
        pub ticks: u64,
        pub bumps: u32,
    }

    impl fmt::Display for CounterState {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "ticks={} bumps={}", self.ticks, self.bumps)
        }
    }

    #[derive(Debug, Clone)]
    pub enum CounterCommand {
        Bump(u32),
    }

    #[derive(Debug, Clone, Serialize)]
    pub enum CounterNotice {
        Bumped(u32),
        NotUnderstood(String),
    }

    impl fmt::Display for CounterNotice {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Bumped(n) => write!(f, "bumped by {}", n),
                Self::NotUnderstood(s) => write!(f, "not understood: {}", s),
            }
        }
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct Ticked(pub u64);

    impl fmt::Display for Ticked {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "tick {}", self.0)
        }
    }

    impl Story for Counter {
        type State = CounterState;
        type Command = CounterCommand;
        type Notice = CounterNotice;
        type Event = Ticked;

        const NAME: &'static str = "counter";

        fn initial(&self, _: &mut StdRng) -> CounterState {
            CounterState { ticks: 0, bumps: 0 }
        }

        fn advance(&self, state: &CounterState, _: f64, _: &mut StdRng) -> CounterState {
            let mut next = state.clone();
            next.ticks += 1;
            next
        }

        fn apply(&self, state: &CounterState, command: &CounterCommand) -> Transition<CounterState, CounterNotice> {
            let CounterCommand::Bump(n) = command;
            let mut next = state.clone();
            next.bumps += n;
            Transition::new(next).notice(CounterNotice::Bumped(*n))
        }

        fn parse(&self, input: &str) -> Result<CounterCommand, CommandParseError> {
            let line = CommandLine::split(input)?;
            match line.verb.as_str() {
                "bump" => Ok(CounterCommand::Bump(parse_u32(line.arg(0, "amount")?, "amount")?)),
                _ => Err(line.unknown()),
            }
        }

        fn not_understood(&self, input: &str, _: &CommandParseError) -> CounterNotice {
            CounterNotice::NotUnderstood(input.to_string())
        }

        fn is_terminal(&self, state: &CounterState) -> bool {
            state.ticks >= self.limit
        }

        fn validate(&self, state: &CounterState) -> Result<(), InvariantViolation> {
            if state.ticks > self.limit {
                return Err(InvariantViolation::Broken(format!("ticked past limit {}", self.limit)));
            }
            Ok(())
        }

        fn events(&self, previous: &CounterState, next: &CounterState) -> Vec<Ticked> {
            if next.ticks > previous.ticks {
                vec![Ticked(next.ticks)]
            } else {
                Vec::new()
            }
        }
    }
}
