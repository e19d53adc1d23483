//! A single narrative session: one story, one state, one RNG stream.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use crate::core::story::Story;

/// Outcome of one serialized transition, as handed to presentation.
pub struct Step<S: Story> {
    /// Read-only snapshot after the transition.
    pub snapshot: Arc<S::State>,
    pub notices: Vec<S::Notice>,
    pub events: Vec<S::Event>,
}

/// Owns the only mutable reference to a story's state. Every transition
/// takes `&mut self`, so ticks and commands are serialized by construction.
pub struct Session<S: Story> {
    story: S,
    seed: u64,
    rng: StdRng,
    state: Arc<S::State>,
}

impl<S: Story> Session<S> {
    pub fn new(story: S, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let state = Arc::new(story.initial(&mut rng));
        tracing::debug!(story = S::NAME, seed, "session started");
        Self {
            story,
            seed,
            rng,
            state,
        }
    }

    pub fn story(&self) -> &S {
        &self.story
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current read-only snapshot.
    pub fn snapshot(&self) -> Arc<S::State> {
        Arc::clone(&self.state)
    }

    pub fn is_terminal(&self) -> bool {
        self.story.is_terminal(&self.state)
    }

    /// Advance simulated time by `dt`. No-op once terminal.
    pub fn tick(&mut self, dt: f64) -> Step<S> {
        let previous = Arc::clone(&self.state);
        if self.story.is_terminal(&previous) {
            return self.unchanged(Vec::new());
        }
        let next = self.story.advance(&previous, dt, &mut self.rng);
        self.commit(&previous, next, Vec::new())
    }

    /// Apply a parsed command.
    pub fn command(&mut self, command: &S::Command) -> Step<S> {
        let previous = Arc::clone(&self.state);
        tracing::debug!(story = S::NAME, command = ?command, "applying command");
        let transition = self.story.apply(&previous, command);
        self.commit(&previous, transition.state, transition.notices)
    }

    /// Parse and apply a line of reader input. Unparseable input leaves the
    /// state alone and yields a "not understood" notice.
    pub fn submit(&mut self, input: &str) -> Step<S> {
        match self.story.parse(input) {
            Ok(command) => self.command(&command),
            Err(error) => {
                tracing::debug!(story = S::NAME, input, %error, "input not understood");
                let notice = self.story.not_understood(input, &error);
                self.unchanged(vec![notice])
            }
        }
    }

    /// Discard everything and restart from the initial snapshot with the
    /// original seed.
    pub fn reset(&mut self) -> Step<S> {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.state = Arc::new(self.story.initial(&mut self.rng));
        tracing::debug!(story = S::NAME, seed = self.seed, "session reset");
        self.unchanged(Vec::new())
    }

    fn unchanged(&self, notices: Vec<S::Notice>) -> Step<S> {
        Step {
            snapshot: Arc::clone(&self.state),
            notices,
            events: Vec::new(),
        }
    }

    fn commit(&mut self, previous: &S::State, next: S::State, notices: Vec<S::Notice>) -> Step<S> {
        if cfg!(debug_assertions) {
            if let Err(violation) = self.story.validate(&next) {
                panic!("{} invariant violated: {}", S::NAME, violation);
            }
        }
        let events = self.story.events(previous, &next);
        if !self.story.is_terminal(previous) && self.story.is_terminal(&next) {
            tracing::info!(story = S::NAME, state = %next, "session reached terminal state");
        }
        self.state = Arc::new(next);
        Step {
            snapshot: Arc::clone(&self.state),
            notices,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{Counter, CounterCommand, CounterNotice};

    #[test]
    fn tick_advances_and_reports_events() {
        let mut session = Session::new(Counter::with_limit(3), 1);
        let step = session.tick(1.0);
        assert_eq!(step.snapshot.ticks, 1);
        assert_eq!(step.events.len(), 1);
    }

    #[test]
    fn terminal_session_ignores_ticks() {
        let mut session = Session::new(Counter::with_limit(2), 1);
        session.tick(1.0);
        session.tick(1.0);
        assert!(session.is_terminal());
        let step = session.tick(1.0);
        assert_eq!(step.snapshot.ticks, 2);
        assert!(step.events.is_empty());
    }

    #[test]
    fn unparseable_input_is_a_notice() {
        let mut session = Session::new(Counter::with_limit(5), 1);
        let before = session.snapshot();
        let step = session.submit("jump");
        assert_eq!(*step.snapshot, *before);
        assert!(matches!(step.notices.as_slice(), [CounterNotice::NotUnderstood(s)] if s == "jump"));
    }

    #[test]
    fn commands_and_submit_agree() {
        let mut a = Session::new(Counter::with_limit(5), 1);
        let mut b = Session::new(Counter::with_limit(5), 1);
        a.command(&CounterCommand::Bump(2));
        b.submit("BUMP 2");
        assert_eq!(*a.snapshot(), *b.snapshot());
    }

    #[test]
    fn reset_restores_initial_snapshot() {
        let mut session = Session::new(Counter::with_limit(5), 9);
        let initial = session.snapshot();
        session.tick(1.0);
        session.submit("bump 4");
        session.reset();
        assert_eq!(*session.snapshot(), *initial);
    }

    #[test]
    fn earlier_snapshots_are_not_mutated() {
        let mut session = Session::new(Counter::with_limit(5), 1);
        let first = session.snapshot();
        session.tick(1.0);
        assert_eq!(first.ticks, 0);
    }
}
