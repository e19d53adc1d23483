use serde::Serialize;
use std::fmt;

use crate::core::hysteresis::Tracked;
use crate::core::rules::RuleState;
use crate::schema::constraint::{Bounds, Constraint};
use crate::schema::hysteresis::HysteresisSet;
use crate::schema::transformation::{Threshold, TransformationTable};
use crate::stories::expedition::ExpeditionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Perspective {
    Galina,
    Volkov,
    Petrov,
}

impl Perspective {
    pub const ALL: [Perspective; 3] = [Self::Galina, Self::Volkov, Self::Petrov];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "galina" | "kuznetsova" => Some(Self::Galina),
            "volkov" => Some(Self::Volkov),
            "petrov" => Some(Self::Petrov),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Galina => 0,
            Self::Volkov => 1,
            Self::Petrov => 2,
        }
    }

    /// Terminal tab heading.
    pub fn station(&self) -> &'static str {
        match self {
            Self::Galina => "Station Workstation",
            Self::Volkov => "Chief's Dossier",
            Self::Petrov => "Maintenance Oversight",
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Galina => "G.I. Kuznetsova, hydrographer",
            Self::Volkov => "V.A. Volkov, expedition chief",
            Self::Petrov => "M.Yu. Petrov, senior technician",
        })
    }
}

pub struct Chapter {
    pub id: &'static str,
    pub title: &'static str,
    /// Paragraph counts, indexed galina, volkov, petrov.
    pub paragraphs: [u32; 3],
}

pub const CHAPTERS: [Chapter; 5] = [
    Chapter {
        id: "embark",
        title: "September 1963, Sea of Okhotsk",
        paragraphs: [4, 4, 4],
    },
    Chapter {
        id: "routine",
        title: "October, Station 38",
        paragraphs: [5, 4, 4],
    },
    Chapter {
        id: "praise",
        title: "November, The Seminar Invitation",
        paragraphs: [6, 4, 5],
    },
    Chapter {
        id: "drift",
        title: "December, Return Transit",
        paragraphs: [6, 4, 4],
    },
    Chapter {
        id: "reveal",
        title: "January 1964, Leningrad",
        paragraphs: [9, 4, 7],
    },
];

pub const LAST_CHAPTER: usize = CHAPTERS.len() - 1;

pub fn paragraph_count(chapter: usize, perspective: Perspective) -> u32 {
    CHAPTERS
        .get(chapter)
        .map_or(0, |c| c.paragraphs[perspective.index()])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExpeditionRule {
    Collapse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExpeditionFlag {
    AuthorListSeen,
}

/// The six pressures of the research vessel, all on [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpeditionConstraints {
    /// E: labour drawn out of junior staff.
    pub extraction: Constraint,
    /// S: pressure to speak in the collective voice.
    pub suppression: Constraint,
    /// T: recognition staged without substance.
    pub theater: Constraint,
    /// H: hope of authorship.
    pub hope: Constraint,
    /// R: credit redirected to senior names.
    pub recipient: Constraint,
    /// X: readiness to leave.
    pub exit: Constraint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpeditionState {
    pub constraints: ExpeditionConstraints,
    pub transformations: TransformationTable<ExpeditionRule>,
    pub chapter: usize,
    pub perspective: Perspective,
    pub revealed: u32,
    /// Fractional reveal time carried between ticks.
    pub reveal_clock: f64,
    pub hysteresis: HysteresisSet<ExpeditionFlag>,
}

impl ExpeditionState {
    pub fn from_config(config: &ExpeditionConfig) -> Self {
        let start = &config.initial;
        let unit = |v: f64| Constraint::new(v, Bounds::UNIT);
        Self {
            constraints: ExpeditionConstraints {
                extraction: unit(start.extraction),
                suppression: unit(start.suppression),
                theater: unit(start.theater),
                hope: unit(start.hope),
                recipient: unit(start.recipient),
                exit: unit(start.exit),
            },
            transformations: TransformationTable::new().with(
                ExpeditionRule::Collapse,
                Threshold::Structural("extraction, hope or exit past its limit".to_string()),
            ),
            chapter: 0,
            perspective: Perspective::Galina,
            revealed: 0,
            reveal_clock: 0.0,
            hysteresis: HysteresisSet::new(),
        }
    }

    pub fn total_paragraphs(&self) -> u32 {
        paragraph_count(self.chapter, self.perspective)
    }

    pub fn is_revealing(&self) -> bool {
        self.revealed < self.total_paragraphs()
    }

    pub fn on_last_chapter(&self) -> bool {
        self.chapter >= LAST_CHAPTER
    }

    pub fn collapsed(&self) -> bool {
        self.transformations.fired(ExpeditionRule::Collapse)
    }

    pub(crate) fn restart_reveal(&mut self) {
        self.revealed = 0;
        self.reveal_clock = 0.0;
    }
}

impl RuleState for ExpeditionState {
    type RuleId = ExpeditionRule;

    fn transformations(&self) -> &TransformationTable<ExpeditionRule> {
        &self.transformations
    }

    fn transformations_mut(&mut self) -> &mut TransformationTable<ExpeditionRule> {
        &mut self.transformations
    }
}

impl Tracked for ExpeditionState {
    type Flag = ExpeditionFlag;

    fn hysteresis(&self) -> &HysteresisSet<ExpeditionFlag> {
        &self.hysteresis
    }

    fn hysteresis_mut(&mut self) -> &mut HysteresisSet<ExpeditionFlag> {
        &mut self.hysteresis
    }
}

impl fmt::Display for ExpeditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.constraints;
        let title = CHAPTERS.get(self.chapter).map_or("", |ch| ch.title);
        write!(
            f,
            "{} | {} | {}/{} | E {:.2} S {:.2} T {:.2} H {:.2} R {:.2} X {:.2}",
            title,
            self.perspective.station(),
            self.revealed,
            self.total_paragraphs(),
            c.extraction.value,
            c.suppression.value,
            c.theater.value,
            c.hope.value,
            c.recipient.value,
            c.exit.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_table() {
        assert_eq!(paragraph_count(0, Perspective::Galina), 4);
        assert_eq!(paragraph_count(2, Perspective::Petrov), 5);
        assert_eq!(paragraph_count(4, Perspective::Galina), 9);
        assert_eq!(paragraph_count(9, Perspective::Galina), 0);
    }

    #[test]
    fn initial_state_reveals_first_chapter() {
        let s = ExpeditionState::from_config(&ExpeditionConfig::default());
        assert!(s.is_revealing());
        assert!(!s.on_last_chapter());
        assert_eq!(s.constraints.hope.value, 0.65);
        assert!(!s.collapsed());
    }

    #[test]
    fn perspective_names() {
        assert_eq!(Perspective::from_name("volkov"), Some(Perspective::Volkov));
        assert_eq!(Perspective::from_name("grigory"), None);
    }
}
