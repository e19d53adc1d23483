//! Ekspeditsiya 44: a 1963 research cruise told through three terminals,
//! with authorship quietly pulled away from the hydrographer who did the work.
//!
//! Time only drives the paragraph type-in. Chapters advance on `next`, and
//! each advance runs one step of the pressure couplings.

pub mod state;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::command_text::{CommandLine, CommandParseError};
use crate::core::config::{ensure, ensure_range, ConfigError, StoryConfig};
use crate::core::hysteresis::{HysteresisTracker, Trigger};
use crate::core::rules::{no_effect, no_progress, Rule, RuleSet};
use crate::core::story::{check_bounds, InvariantViolation, Story, Transition};

pub use state::{ExpeditionFlag, ExpeditionRule, ExpeditionState, Perspective, CHAPTERS, LAST_CHAPTER};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pressures {
    pub extraction: f64,
    pub suppression: f64,
    pub theater: f64,
    pub hope: f64,
    pub recipient: f64,
    pub exit: f64,
}

impl Default for Pressures {
    fn default() -> Self {
        Self {
            extraction: 0.22,
            suppression: 0.50,
            theater: 0.30,
            hope: 0.65,
            recipient: 0.35,
            exit: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CouplingConfig {
    /// Hope above this feeds extraction and damps exit.
    pub hope_active: f64,
    pub extraction_gain: f64,
    pub exit_relief: f64,
    /// Suppression above this stages theater and redirects credit.
    pub suppression_active: f64,
    pub theater_gain: f64,
    pub recipient_gain: f64,
    /// Redirected credit above this tightens suppression.
    pub recipient_active: f64,
    pub suppression_gain: f64,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            hope_active: 0.4,
            extraction_gain: 0.1,
            exit_relief: 0.05,
            suppression_active: 0.6,
            theater_gain: 0.15,
            recipient_gain: 0.1,
            recipient_active: 0.5,
            suppression_gain: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    pub extraction_above: f64,
    pub hope_below: f64,
    pub exit_above: f64,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            extraction_above: 0.75,
            hope_below: 0.2,
            exit_above: 0.6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpeditionConfig {
    pub initial: Pressures,
    pub reveal: RevealConfig,
    pub couplings: CouplingConfig,
    pub collapse: CollapseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Paragraphs per unit of time.
    pub rate: f64,
    /// Hope lost on every chapter advance.
    pub hope_decay: f64,
    pub hope_floor: f64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            hope_decay: 0.08,
            hope_floor: 0.1,
        }
    }
}

impl StoryConfig for ExpeditionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.initial;
        for (name, value) in [
            ("initial.extraction", p.extraction),
            ("initial.suppression", p.suppression),
            ("initial.theater", p.theater),
            ("initial.hope", p.hope),
            ("initial.recipient", p.recipient),
            ("initial.exit", p.exit),
        ] {
            ensure_range(name, value, 0.0, 1.0)?;
        }
        ensure(self.reveal.rate > 0.0, "reveal.rate must be positive")?;
        ensure_range("reveal.hope_decay", self.reveal.hope_decay, 0.0, 1.0)?;
        ensure_range("reveal.hope_floor", self.reveal.hope_floor, 0.0, 1.0)?;
        Ok(())
    }
}

fn rule_set() -> RuleSet<ExpeditionState, ExpeditionConfig> {
    RuleSet::new(vec![Rule {
        id: ExpeditionRule::Collapse,
        progress: no_progress,
        guard: |s, c| {
            let k = &s.constraints;
            k.extraction.value > c.collapse.extraction_above
                || k.hope.value < c.collapse.hope_below
                || k.exit.value > c.collapse.exit_above
        },
        effect: no_effect,
    }])
}

/// One coupling step. Each stage reads the values left by the one before.
fn couple(s: &mut ExpeditionState, c: &CouplingConfig) {
    let k = &mut s.constraints;
    let hope = k.hope.value;
    if hope > c.hope_active {
        k.extraction.nudge(c.extraction_gain * hope);
        k.exit.nudge(-c.exit_relief * hope);
    }
    let suppression = k.suppression.value;
    if suppression > c.suppression_active {
        k.theater.nudge(c.theater_gain * suppression);
        let theater = k.theater.value;
        k.recipient.nudge(c.recipient_gain * theater);
    }
    if k.recipient.value > c.recipient_active {
        k.suppression.nudge(c.suppression_gain);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpeditionCommand {
    Next,
    View(Perspective),
    Status,
    Help,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExpeditionNotice {
    NotUnderstood(String),
    Help,
    Status {
        chapter: usize,
        perspective: Perspective,
        revealed: u32,
        total: u32,
    },
    ChapterOpened(usize),
    StillRevealing { revealed: u32, total: u32 },
    FinalChapter,
    Viewing { perspective: Perspective, ghost: bool },
}

impl fmt::Display for ExpeditionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUnderstood(input) => write!(f, "KOMANDA NE RASPOZNANA: '{}'. Type 'help'.", input.trim()),
            Self::Help => f.write_str("Commands: next, view <galina|volkov|petrov>, status, help"),
            Self::Status {
                chapter,
                perspective,
                revealed,
                total,
            } => {
                let title = CHAPTERS.get(*chapter).map_or("", |c| c.title);
                write!(
                    f,
                    "Phase {}/{}: {}. {} ({}). Page {}/{}.",
                    chapter + 1,
                    CHAPTERS.len(),
                    title,
                    perspective.station(),
                    perspective,
                    revealed,
                    total
                )
            }
            Self::ChapterOpened(chapter) => {
                let title = CHAPTERS.get(*chapter).map_or("", |c| c.title);
                write!(f, "--- {} ---", title)
            }
            Self::StillRevealing { revealed, total } => {
                write!(f, "Printing... {}/{}", revealed, total)
            }
            Self::FinalChapter => f.write_str("KONETS ZAPISI. End of record."),
            Self::Viewing { perspective, ghost } => {
                write!(f, "{}: {}", perspective.station(), perspective)?;
                if *ghost {
                    f.write_str(" [author list: V.A. Volkov. G.P. Ryazanov. A.M. Fedorov.]")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExpeditionEvent {
    ParagraphsRevealed { from: u32, to: u32, total: u32 },
    ChapterOpened(usize),
    Collapsed,
    AuthorListSeen,
}

impl fmt::Display for ExpeditionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParagraphsRevealed { to, total, .. } => write!(f, "[{}/{}]", to, total),
            Self::ChapterOpened(chapter) => {
                let title = CHAPTERS.get(*chapter).map_or("", |c| c.title);
                write!(f, "Phase {}: {}", chapter + 1, title)
            }
            Self::Collapsed => f.write_str("The echo sounder keeps running."),
            Self::AuthorListSeen => f.write_str("V.A. Volkov. G.P. Ryazanov. A.M. Fedorov."),
        }
    }
}

pub struct Expedition {
    config: ExpeditionConfig,
    rules: RuleSet<ExpeditionState, ExpeditionConfig>,
    tracker: HysteresisTracker<ExpeditionState>,
}

impl Expedition {
    pub fn new(config: ExpeditionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: ExpeditionConfig) -> Self {
        Self {
            config,
            rules: rule_set(),
            tracker: HysteresisTracker::new(vec![Trigger {
                flag: ExpeditionFlag::AuthorListSeen,
                predicate: |s: &ExpeditionState| s.perspective == Perspective::Volkov && s.on_last_chapter(),
            }]),
        }
    }

    pub fn config(&self) -> &ExpeditionConfig {
        &self.config
    }

    fn next_chapter(&self, s: &mut ExpeditionState) {
        s.chapter += 1;
        s.restart_reveal();
        let reveal = &self.config.reveal;
        let hope = (s.constraints.hope.value - reveal.hope_decay).max(reveal.hope_floor);
        s.constraints.hope.set(hope);
        couple(s, &self.config.couplings);
        // Rule effects draw nothing.
        let mut rng = StdRng::seed_from_u64(0);
        self.rules.evaluate(s, &self.config, &mut rng);
    }
}

impl Default for Expedition {
    fn default() -> Self {
        Self::from_valid(ExpeditionConfig::default())
    }
}

impl Story for Expedition {
    type State = ExpeditionState;
    type Command = ExpeditionCommand;
    type Notice = ExpeditionNotice;
    type Event = ExpeditionEvent;

    const NAME: &'static str = "expedition";

    fn initial(&self, _: &mut StdRng) -> ExpeditionState {
        ExpeditionState::from_config(&self.config)
    }

    fn advance(&self, state: &ExpeditionState, dt: f64, _: &mut StdRng) -> ExpeditionState {
        if !(dt.is_finite() && dt > 0.0) {
            tracing::warn!(dt, "rejected non-positive time step");
            return state.clone();
        }
        let mut s = state.clone();
        let total = s.total_paragraphs();
        if s.revealed >= total {
            return s;
        }
        s.reveal_clock += dt * self.config.reveal.rate;
        let whole = s.reveal_clock.floor();
        s.reveal_clock -= whole;
        let shown = (s.revealed as f64 + whole).min(total as f64);
        s.revealed = shown as u32;
        if s.revealed == total {
            s.reveal_clock = 0.0;
        }
        s
    }

    fn apply(&self, state: &ExpeditionState, command: &ExpeditionCommand) -> Transition<ExpeditionState, ExpeditionNotice> {
        match command {
            ExpeditionCommand::Next if state.is_revealing() => Transition::unchanged(
                state,
                ExpeditionNotice::StillRevealing {
                    revealed: state.revealed,
                    total: state.total_paragraphs(),
                },
            ),
            ExpeditionCommand::Next if state.on_last_chapter() => {
                Transition::unchanged(state, ExpeditionNotice::FinalChapter)
            }
            ExpeditionCommand::Next => {
                let mut s = state.clone();
                self.next_chapter(&mut s);
                self.tracker.update(&mut s);
                tracing::debug!(chapter = s.chapter, hope = s.constraints.hope.value, "chapter advanced");
                let chapter = s.chapter;
                Transition::new(s).notice(ExpeditionNotice::ChapterOpened(chapter))
            }
            ExpeditionCommand::View(perspective) => {
                let mut s = state.clone();
                if s.perspective != *perspective {
                    s.perspective = *perspective;
                    s.restart_reveal();
                }
                self.tracker.update(&mut s);
                let ghost = *perspective == Perspective::Galina && s.hysteresis.is_set(ExpeditionFlag::AuthorListSeen);
                Transition::new(s).notice(ExpeditionNotice::Viewing {
                    perspective: *perspective,
                    ghost,
                })
            }
            ExpeditionCommand::Status => Transition::unchanged(
                state,
                ExpeditionNotice::Status {
                    chapter: state.chapter,
                    perspective: state.perspective,
                    revealed: state.revealed,
                    total: state.total_paragraphs(),
                },
            ),
            ExpeditionCommand::Help => Transition::unchanged(state, ExpeditionNotice::Help),
        }
    }

    fn parse(&self, input: &str) -> Result<ExpeditionCommand, CommandParseError> {
        let line = CommandLine::split(input)?;
        match line.verb.as_str() {
            "next" | "n" => Ok(ExpeditionCommand::Next),
            "view" => {
                let name = line.arg(0, "perspective")?.to_ascii_lowercase();
                Perspective::from_name(&name)
                    .map(ExpeditionCommand::View)
                    .ok_or(CommandParseError::InvalidChoice {
                        value: name,
                        context: "perspective",
                    })
            }
            "status" => Ok(ExpeditionCommand::Status),
            "help" => Ok(ExpeditionCommand::Help),
            _ => Err(line.unknown()),
        }
    }

    fn not_understood(&self, input: &str, _: &CommandParseError) -> ExpeditionNotice {
        ExpeditionNotice::NotUnderstood(input.to_string())
    }

    fn is_terminal(&self, _: &ExpeditionState) -> bool {
        false
    }

    fn validate(&self, s: &ExpeditionState) -> Result<(), InvariantViolation> {
        let k = &s.constraints;
        check_bounds("extraction", &k.extraction)?;
        check_bounds("suppression", &k.suppression)?;
        check_bounds("theater", &k.theater)?;
        check_bounds("hope", &k.hope)?;
        check_bounds("recipient", &k.recipient)?;
        check_bounds("exit", &k.exit)?;
        if s.chapter > LAST_CHAPTER {
            return Err(InvariantViolation::Broken(format!("chapter {} past the end", s.chapter)));
        }
        if s.revealed > s.total_paragraphs() {
            return Err(InvariantViolation::Broken(format!(
                "{} of {} paragraphs revealed",
                s.revealed,
                s.total_paragraphs()
            )));
        }
        if s.reveal_clock < 0.0 || s.reveal_clock >= 1.0 {
            return Err(InvariantViolation::Broken(format!(
                "reveal clock {} outside [0, 1)",
                s.reveal_clock
            )));
        }
        Ok(())
    }

    fn events(&self, previous: &ExpeditionState, next: &ExpeditionState) -> Vec<ExpeditionEvent> {
        let mut events = Vec::new();
        if next.chapter != previous.chapter {
            events.push(ExpeditionEvent::ChapterOpened(next.chapter));
        } else if next.perspective == previous.perspective && next.revealed > previous.revealed {
            events.push(ExpeditionEvent::ParagraphsRevealed {
                from: previous.revealed,
                to: next.revealed,
                total: next.total_paragraphs(),
            });
        }
        if next.collapsed() && !previous.collapsed() {
            events.push(ExpeditionEvent::Collapsed);
        }
        let seen = |s: &ExpeditionState| s.hysteresis.is_set(ExpeditionFlag::AuthorListSeen);
        if seen(next) && !seen(previous) {
            events.push(ExpeditionEvent::AuthorListSeen);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn read_through(story: &Expedition, state: &ExpeditionState, rng: &mut StdRng) -> ExpeditionState {
        story.advance(state, 20.0, rng)
    }

    #[test]
    fn reveal_accumulates_fractional_time() {
        let story = Expedition::default();
        let mut rng = StdRng::seed_from_u64(0);
        let s = story.initial(&mut rng);
        let s = story.advance(&s, 0.6, &mut rng);
        assert_eq!(s.revealed, 0);
        let s = story.advance(&s, 0.6, &mut rng);
        assert_eq!(s.revealed, 1);
        assert!(close(s.reveal_clock, 0.2));
        let s = story.advance(&s, 10.0, &mut rng);
        assert_eq!(s.revealed, 4);
        assert_eq!(s.reveal_clock, 0.0);
        assert_eq!(story.validate(&s), Ok(()));
    }

    #[test]
    fn next_is_blocked_while_revealing() {
        let story = Expedition::default();
        let s = story.initial(&mut StdRng::seed_from_u64(0));
        let t = story.apply(&s, &ExpeditionCommand::Next);
        assert_eq!(t.state, s);
        assert_eq!(t.notices, vec![ExpeditionNotice::StillRevealing { revealed: 0, total: 4 }]);
    }

    #[test]
    fn next_decays_hope_and_couples() {
        let story = Expedition::default();
        let mut rng = StdRng::seed_from_u64(0);
        let s = read_through(&story, &story.initial(&mut rng), &mut rng);
        let t = story.apply(&s, &ExpeditionCommand::Next);
        let k = &t.state.constraints;
        assert_eq!(t.state.chapter, 1);
        assert_eq!(t.state.revealed, 0);
        assert!(close(k.hope.value, 0.57));
        assert!(close(k.extraction.value, 0.22 + 0.057));
        assert!(close(k.exit.value, 0.1 - 0.0285));
        assert!(close(k.theater.value, 0.30));
        assert!(!t.state.collapsed());
    }

    #[test]
    fn last_chapter_stops_next() {
        let story = Expedition::default();
        let mut rng = StdRng::seed_from_u64(0);
        let mut s = story.initial(&mut rng);
        for _ in 0..LAST_CHAPTER {
            s = read_through(&story, &s, &mut rng);
            s = story.apply(&s, &ExpeditionCommand::Next).state;
        }
        assert!(s.on_last_chapter());
        assert!(close(s.constraints.hope.value, 0.33));
        s = read_through(&story, &s, &mut rng);
        let t = story.apply(&s, &ExpeditionCommand::Next);
        assert_eq!(t.notices, vec![ExpeditionNotice::FinalChapter]);
        assert_eq!(t.state, s);
        assert!(!story.is_terminal(&s));
    }

    #[test]
    fn hope_floor_triggers_collapse_once() {
        let mut config = ExpeditionConfig::default();
        config.initial.hope = 0.25;
        let story = Expedition::new(config).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let s = read_through(&story, &story.initial(&mut rng), &mut rng);
        let next = story.apply(&s, &ExpeditionCommand::Next).state;
        assert!(next.collapsed());
        assert_eq!(
            story.events(&s, &next),
            vec![ExpeditionEvent::ChapterOpened(1), ExpeditionEvent::Collapsed]
        );
    }

    #[test]
    fn suppression_stages_theater() {
        let mut config = ExpeditionConfig::default();
        config.initial.suppression = 0.7;
        let story = Expedition::new(config).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let s = read_through(&story, &story.initial(&mut rng), &mut rng);
        let k = story.apply(&s, &ExpeditionCommand::Next).state.constraints;
        assert!(close(k.theater.value, 0.30 + 0.105));
        assert!(close(k.recipient.value, 0.35 + 0.0405));
        assert!(close(k.suppression.value, 0.7));
    }

    #[test]
    fn volkov_on_final_chapter_latches_author_list() {
        let story = Expedition::default();
        let mut rng = StdRng::seed_from_u64(0);
        let mut s = story.initial(&mut rng);
        let early = story.apply(&s, &ExpeditionCommand::View(Perspective::Volkov)).state;
        assert!(!early.hysteresis.is_set(ExpeditionFlag::AuthorListSeen));

        for _ in 0..LAST_CHAPTER {
            s = read_through(&story, &s, &mut rng);
            s = story.apply(&s, &ExpeditionCommand::Next).state;
        }
        let t = story.apply(&s, &ExpeditionCommand::View(Perspective::Volkov));
        assert!(t.state.hysteresis.is_set(ExpeditionFlag::AuthorListSeen));
        assert_eq!(story.events(&s, &t.state), vec![ExpeditionEvent::AuthorListSeen]);

        let back = story.apply(&t.state, &ExpeditionCommand::View(Perspective::Galina));
        assert_eq!(
            back.notices,
            vec![ExpeditionNotice::Viewing {
                perspective: Perspective::Galina,
                ghost: true
            }]
        );
        assert_eq!(back.state.total_paragraphs(), 9);
    }

    #[test]
    fn switching_perspective_restarts_reveal() {
        let story = Expedition::default();
        let mut rng = StdRng::seed_from_u64(0);
        let s = story.advance(&story.initial(&mut rng), 2.0, &mut rng);
        assert_eq!(s.revealed, 2);
        let same = story.apply(&s, &ExpeditionCommand::View(Perspective::Galina)).state;
        assert_eq!(same.revealed, 2);
        let other = story.apply(&s, &ExpeditionCommand::View(Perspective::Petrov)).state;
        assert_eq!(other.revealed, 0);
    }

    #[test]
    fn parse_view() {
        let story = Expedition::default();
        assert_eq!(story.parse("VIEW Petrov"), Ok(ExpeditionCommand::View(Perspective::Petrov)));
        assert!(matches!(
            story.parse("view grigory"),
            Err(CommandParseError::InvalidChoice { .. })
        ));
        assert_eq!(story.parse("n"), Ok(ExpeditionCommand::Next));
    }
}
