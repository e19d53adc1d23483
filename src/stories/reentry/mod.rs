//! Twenty Years Away: Rip Van Winkle's sleep laid over a twenty-two year
//! sentence, driven by a temporal scrubber the reader drags (or lets drift).

pub mod couplings;
pub mod state;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::command_text::{parse_f64, parse_u32, CommandLine, CommandParseError};
use crate::core::config::{ensure, ensure_range, ConfigError, StoryConfig};
use crate::core::hysteresis::{HysteresisTracker, Trigger};
use crate::core::rules::RuleSet;
use crate::core::story::{check_bounds, check_range, InvariantViolation, Story, Transition};

pub use state::{ReentryFlag, ReentryRule, ReentryState, SyncPoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReentryConfig {
    /// Scrub advance per unit of idle time.
    pub drift: f64,
    /// Idle drift never carries the scrubber past this.
    pub drift_cap: f64,
    pub max_delta_t: f64,
    pub engage_scrub: f64,
    pub chi_base: f64,
    pub chi_span: f64,
    /// The snare follows the scrubber only below this position.
    pub chi_track_below: f64,
    pub strain_step: f64,
    pub rope_top: f64,
    pub rope_floor: f64,
    pub escape_chi: f64,
    pub obsolete_delta_t: f64,
    pub mismatch_scrub: f64,
    pub mobility_scrub: f64,
    pub terminal_scrub: f64,
}

impl Default for ReentryConfig {
    fn default() -> Self {
        Self {
            drift: 0.3,
            drift_cap: 98.0,
            max_delta_t: 22.0,
            engage_scrub: 30.0,
            chi_base: 0.3,
            chi_span: 0.55,
            chi_track_below: 30.0,
            strain_step: 0.05,
            rope_top: 0.85,
            rope_floor: 0.08,
            escape_chi: 0.80,
            obsolete_delta_t: 20.0,
            mismatch_scrub: 70.0,
            mobility_scrub: 88.0,
            terminal_scrub: 95.0,
        }
    }
}

impl StoryConfig for ReentryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.drift > 0.0, "drift must be positive")?;
        ensure_range("drift_cap", self.drift_cap, 0.0, 100.0)?;
        ensure(self.max_delta_t > 0.0, "max_delta_t must be positive")?;
        ensure(self.chi_track_below > 0.0, "chi_track_below must be positive")?;
        ensure_range("chi_base", self.chi_base, 0.0, 1.0)?;
        ensure(
            self.rope_floor >= 0.0 && self.rope_floor < self.rope_top && self.rope_top <= 1.0,
            "rope range must be a non-empty part of [0, 1]",
        )?;
        ensure_range("escape_chi", self.escape_chi, 0.0, 1.0)?;
        ensure_range("terminal_scrub", self.terminal_scrub, 0.0, 100.0)?;
        Ok(())
    }
}

pub const OMEGA_QUESTIONS: [&str; 3] = [
    "Rip's twenty years were experienced as a single night of dreamless rest. A twenty-two year sentence is experienced as twenty-two years. Does the felt quality of displacement change what is lost, or only how the loss is carried?",
    "Rip had no agency during his sleep. An incarcerated person reads, writes, learns, grieves, ages, adapts. Does agency within displacement slow the decay of the world outside, or only sharpen the recognition of how much has decayed?",
    "Rip returned to benign curiosity. A returning citizen faces active exclusion: background checks, housing denials, social suspicion. Is Rip's freedom through irrelevance available to someone whose irrelevance is enforced rather than granted?",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ReentryCommand {
    Scrub(f64),
    Strain,
    /// Zero-based omega index.
    Probe(usize),
    Status,
    Help,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReentryNotice {
    NotUnderstood(String),
    Help,
    Status {
        sync_point: SyncPoint,
        delta_t: f64,
        attractor_proximity: f64,
        message: &'static str,
    },
    Scrubbed(SyncPoint),
    Strained { chi: f64 },
    OmegaRevealed(usize),
    AlreadyRevealed(usize),
    Ended,
}

impl fmt::Display for ReentryNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUnderstood(input) => write!(f, "'{}' is not a way through. Type 'help'.", input.trim()),
            Self::Help => f.write_str("Commands: scrub <0-100>, strain, probe <1-3>, status, help"),
            Self::Status {
                sync_point,
                delta_t,
                attractor_proximity,
                message,
            } => {
                let (village, record) = sync_point.titles();
                write!(
                    f,
                    "{}: {} / {}. Displacement {:.1} years. Attractor {:.0}%.\n{}",
                    sync_point,
                    village,
                    record,
                    delta_t,
                    attractor_proximity * 100.0,
                    message
                )
            }
            Self::Scrubbed(sp) => {
                let (village, record) = sp.titles();
                write!(f, "{}: {} / {}", sp, village, record)
            }
            Self::Strained { chi } => write!(f, "Household tension: {:.2}", chi),
            Self::OmegaRevealed(i) => f.write_str(OMEGA_QUESTIONS.get(*i).copied().unwrap_or("")),
            Self::AlreadyRevealed(i) => write!(f, "Gap {} is already open.", i + 1),
            Self::Ended => f.write_str(
                "Both stories have ended the same way. The question of whether they are the same story remains open.",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReentryEvent {
    SyncPointReached(SyncPoint),
    FieldEngaged,
    TransformationFired(ReentryRule),
    Ended,
}

impl fmt::Display for ReentryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyncPointReached(sp) => write!(f, "Now at {}: {}.", sp, sp.titles().0),
            Self::FieldEngaged => f.write_str("The displacement field engages. Time has passed."),
            Self::TransformationFired(rule) => write!(f, "{}.", rule.label()),
            Self::Ended => f.write_str("The record keeps everything."),
        }
    }
}

/// The archival voice's current line.
pub fn system_message(s: &ReentryState) -> &'static str {
    let t = &s.transformations;
    if s.terminal {
        "Both stories have ended the same way."
    } else if s.probe_count > 0 {
        "You have found a gap between the panels. The gap is real."
    } else if t.fired(ReentryRule::ContractObsolescence) && !t.fired(ReentryRule::IndexMismatch) {
        "The village has continued without you."
    } else if t.fired(ReentryRule::EscapeThreshold) && !t.fired(ReentryRule::ContractObsolescence) {
        "This reference is no longer current."
    } else if s.idle_ticks > 2 {
        "The temporal scrubber advances on its own. Time passes whether you attend to it or not."
    } else if s.sync_point == SyncPoint::Sp2 {
        "You may return now, if you wish."
    } else {
        "I am a bridge between two stories that share a skeleton."
    }
}

/// Hysteresis thresholds.
const PERSPECTIVE_SHIFT_CHI: f64 = 0.80;
const PITON_AWARENESS_SCRUB: f64 = 75.0;
const TRUST_ERODED_SCRUB: f64 = 88.0;

pub struct Reentry {
    config: ReentryConfig,
    rules: RuleSet<ReentryState, ReentryConfig>,
    tracker: HysteresisTracker<ReentryState>,
}

impl Reentry {
    pub fn new(config: ReentryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: ReentryConfig) -> Self {
        Self {
            config,
            rules: couplings::rule_set(),
            tracker: HysteresisTracker::new(vec![
                Trigger {
                    flag: ReentryFlag::PerspectiveShift,
                    predicate: |s: &ReentryState| s.constraints.snare.chi >= PERSPECTIVE_SHIFT_CHI,
                },
                Trigger {
                    flag: ReentryFlag::PitonAwareness,
                    predicate: |s: &ReentryState| s.scrub >= PITON_AWARENESS_SCRUB,
                },
                Trigger {
                    flag: ReentryFlag::MetricTrustEroded,
                    predicate: |s: &ReentryState| s.scrub >= TRUST_ERODED_SCRUB,
                },
            ]),
        }
    }

    pub fn config(&self) -> &ReentryConfig {
        &self.config
    }

    pub(crate) fn rules(&self) -> &RuleSet<ReentryState, ReentryConfig> {
        &self.rules
    }

    pub(crate) fn tracker(&self) -> &HysteresisTracker<ReentryState> {
        &self.tracker
    }
}

impl Default for Reentry {
    fn default() -> Self {
        Self::from_valid(ReentryConfig::default())
    }
}

impl Story for Reentry {
    type State = ReentryState;
    type Command = ReentryCommand;
    type Notice = ReentryNotice;
    type Event = ReentryEvent;

    const NAME: &'static str = "reentry";

    fn initial(&self, _: &mut StdRng) -> ReentryState {
        ReentryState::from_config(&self.config)
    }

    fn advance(&self, state: &ReentryState, dt: f64, _: &mut StdRng) -> ReentryState {
        if state.terminal {
            return state.clone();
        }
        if !(dt.is_finite() && dt > 0.0) {
            tracing::warn!(dt, "rejected non-positive time step");
            return state.clone();
        }
        let mut s = state.clone();
        s.idle_ticks += 1;
        if s.scrub < self.config.drift_cap {
            s.scrub = (s.scrub + self.config.drift * dt).min(self.config.drift_cap);
        }
        couplings::propagate(self, &mut s);
        tracing::debug!(scrub = s.scrub, delta_t = s.ucz.delta_t, "reentry drift");
        s
    }

    fn apply(&self, state: &ReentryState, command: &ReentryCommand) -> Transition<ReentryState, ReentryNotice> {
        if state.terminal {
            return Transition::unchanged(state, ReentryNotice::Ended);
        }
        if let ReentryCommand::Scrub(position) = command {
            if !position.is_finite() {
                return Transition::unchanged(state, ReentryNotice::NotUnderstood(format!("scrub {}", position)));
            }
        }
        let mut s = state.clone();
        match command {
            ReentryCommand::Scrub(position) => s.scrub = position.clamp(0.0, 100.0),
            ReentryCommand::Strain => {
                s.strain += self.config.strain_step;
                let chi = (s.constraints.snare.chi + self.config.strain_step).min(1.0);
                s.constraints.snare.chi = chi;
                s.constraints.snare.set(chi);
            }
            ReentryCommand::Probe(index) => {
                match s.omega_revealed.get_mut(*index) {
                    Some(revealed) if !*revealed => {
                        *revealed = true;
                        s.probe_count += 1;
                    }
                    _ => {}
                }
            }
            ReentryCommand::Status | ReentryCommand::Help => {}
        }
        couplings::propagate(self, &mut s);
        let notice = match command {
            ReentryCommand::Scrub(_) => ReentryNotice::Scrubbed(s.sync_point),
            ReentryCommand::Strain => ReentryNotice::Strained {
                chi: s.constraints.snare.chi,
            },
            ReentryCommand::Probe(index) => match state.omega_revealed.get(*index) {
                Some(false) => ReentryNotice::OmegaRevealed(*index),
                Some(true) => ReentryNotice::AlreadyRevealed(*index),
                None => ReentryNotice::NotUnderstood(format!("probe {}", index + 1)),
            },
            ReentryCommand::Status => ReentryNotice::Status {
                sync_point: s.sync_point,
                delta_t: s.ucz.delta_t,
                attractor_proximity: s.attractor_proximity,
                message: system_message(&s),
            },
            ReentryCommand::Help => ReentryNotice::Help,
        };
        Transition::new(s).notice(notice)
    }

    fn parse(&self, input: &str) -> Result<ReentryCommand, CommandParseError> {
        let line = CommandLine::split(input)?;
        match line.verb.as_str() {
            "scrub" => {
                let raw = line.arg(0, "position")?;
                let position = parse_f64(raw, "scrub position")?;
                if !(0.0..=100.0).contains(&position) {
                    return Err(CommandParseError::InvalidChoice {
                        value: raw.to_string(),
                        context: "scrub position (0-100)",
                    });
                }
                Ok(ReentryCommand::Scrub(position))
            }
            "strain" => Ok(ReentryCommand::Strain),
            "probe" => {
                let raw = line.arg(0, "gap")?;
                match parse_u32(raw, "gap")? {
                    n @ 1..=3 => Ok(ReentryCommand::Probe(n as usize - 1)),
                    _ => Err(CommandParseError::InvalidChoice {
                        value: raw.to_string(),
                        context: "gap (1-3)",
                    }),
                }
            }
            "status" => Ok(ReentryCommand::Status),
            "help" => Ok(ReentryCommand::Help),
            _ => Err(line.unknown()),
        }
    }

    fn not_understood(&self, input: &str, _: &CommandParseError) -> ReentryNotice {
        ReentryNotice::NotUnderstood(input.to_string())
    }

    fn is_terminal(&self, state: &ReentryState) -> bool {
        state.terminal
    }

    fn validate(&self, s: &ReentryState) -> Result<(), InvariantViolation> {
        check_bounds("snare", &s.constraints.snare)?;
        check_bounds("mountain", &s.constraints.mountain)?;
        check_bounds("rope", &s.constraints.rope)?;
        check_range("scrub", s.scrub, 0.0, 100.0)?;
        check_range("delta_t", s.ucz.delta_t, 0.0, s.ucz.max_delta_t)?;
        check_range("attractor_proximity", s.attractor_proximity, 0.0, 1.0)?;
        if s.constraints.mountain.value != 1.0 {
            return Err(InvariantViolation::Broken("the mountain moved".to_string()));
        }
        let revealed = s.omega_revealed.iter().filter(|r| **r).count() as u32;
        if revealed != s.probe_count {
            return Err(InvariantViolation::Broken(format!(
                "probe_count {} but {} gaps open",
                s.probe_count, revealed
            )));
        }
        Ok(())
    }

    fn events(&self, previous: &ReentryState, next: &ReentryState) -> Vec<ReentryEvent> {
        let mut events = Vec::new();
        if next.sync_point != previous.sync_point {
            events.push(ReentryEvent::SyncPointReached(next.sync_point));
        }
        if next.ucz.engaged && !previous.ucz.engaged {
            events.push(ReentryEvent::FieldEngaged);
        }
        events.extend(
            ReentryRule::ALL
                .iter()
                .filter(|r| next.transformations.fired(**r) && !previous.transformations.fired(**r))
                .map(|r| ReentryEvent::TransformationFired(*r)),
        );
        if next.terminal && !previous.terminal {
            events.push(ReentryEvent::Ended);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn start() -> (Reentry, ReentryState, StdRng) {
        let story = Reentry::default();
        let mut rng = StdRng::seed_from_u64(1);
        let state = story.initial(&mut rng);
        (story, state, rng)
    }

    #[test]
    fn non_finite_scrub_leaves_state_alone() {
        let (story, state, _) = start();
        for position in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let t = story.apply(&state, &ReentryCommand::Scrub(position));
            assert_eq!(t.state, state);
            assert!(matches!(t.notices.as_slice(), [ReentryNotice::NotUnderstood(_)]));
            assert_eq!(story.validate(&t.state), Ok(()));
        }
    }

    #[test]
    fn parse_commands() {
        let story = Reentry::default();
        assert_eq!(story.parse("SCRUB 42.5"), Ok(ReentryCommand::Scrub(42.5)));
        assert_eq!(story.parse("probe 3"), Ok(ReentryCommand::Probe(2)));
        assert!(matches!(
            story.parse("probe 4"),
            Err(CommandParseError::InvalidChoice { .. })
        ));
        assert!(matches!(
            story.parse("scrub 140"),
            Err(CommandParseError::InvalidChoice { .. })
        ));
        assert!(matches!(
            story.parse("scrub far"),
            Err(CommandParseError::InvalidFloat { .. })
        ));
    }

    #[test]
    fn idle_drift_is_capped() {
        let (story, mut state, mut rng) = start();
        state.scrub = 97.9;
        let next = story.advance(&state, 1.0, &mut rng);
        assert_eq!(next.scrub, 98.0);
        assert_eq!(next.idle_ticks, 1);
        let again = story.advance(&next, 1.0, &mut rng);
        assert_eq!(again.scrub, 98.0);
    }

    #[test]
    fn strain_survives_scrub_tracking() {
        let (story, state, _) = start();
        let mut s = state;
        for _ in 0..12 {
            s = story.apply(&s, &ReentryCommand::Strain).state;
        }
        assert!(s.transformations.fired(ReentryRule::EscapeThreshold));
        let s = story.apply(&s, &ReentryCommand::Scrub(5.0)).state;
        assert!(s.constraints.snare.chi >= 0.8);
    }

    #[test]
    fn probes_reveal_once() {
        let (story, state, _) = start();
        let t = story.apply(&state, &ReentryCommand::Probe(1));
        assert_eq!(t.notices, vec![ReentryNotice::OmegaRevealed(1)]);
        assert_eq!(t.state.probe_count, 1);
        let t = story.apply(&t.state, &ReentryCommand::Probe(1));
        assert_eq!(t.notices, vec![ReentryNotice::AlreadyRevealed(1)]);
        assert_eq!(t.state.probe_count, 1);
    }

    #[test]
    fn full_timeline_reaches_the_ending_once() {
        let (story, state, mut rng) = start();
        let mut s = story.apply(&state, &ReentryCommand::Scrub(28.0)).state;
        s = story.apply(&s, &ReentryCommand::Scrub(95.0)).state;
        assert!(s.terminal);
        assert_eq!(s.attractor_proximity, 1.0);
        assert_eq!(story.validate(&s), Ok(()));

        let t = story.apply(&s, &ReentryCommand::Scrub(0.0));
        assert_eq!(t.state, s);
        assert_eq!(t.notices, vec![ReentryNotice::Ended]);
        assert_eq!(story.advance(&s, 1.0, &mut rng), s);
    }

    #[test]
    fn events_follow_the_timeline() {
        let (story, state, _) = start();
        let next = story.apply(&state, &ReentryCommand::Scrub(40.0)).state;
        let events = story.events(&state, &next);
        assert_eq!(
            events,
            vec![
                ReentryEvent::SyncPointReached(SyncPoint::Sp3),
                ReentryEvent::FieldEngaged
            ]
        );
    }

    #[test]
    fn hysteresis_survives_scrubbing_back() {
        let (story, state, _) = start();
        let late = story.apply(&state, &ReentryCommand::Scrub(92.0)).state;
        let early = story.apply(&late, &ReentryCommand::Scrub(10.0)).state;
        assert!(early.hysteresis.is_set(ReentryFlag::MetricTrustEroded));
        assert!(early.hysteresis.is_set(ReentryFlag::PitonAwareness));
        assert!(early.transformations.fired(ReentryRule::ContractObsolescence));
    }
}
