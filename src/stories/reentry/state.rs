use serde::Serialize;
use std::fmt;

use crate::core::hysteresis::Tracked;
use crate::core::rules::RuleState;
use crate::schema::constraint::{Bounds, Constraint};
use crate::schema::hysteresis::HysteresisSet;
use crate::schema::transformation::{Threshold, TransformationTable};
use crate::stories::reentry::ReentryConfig;

/// Narrative role a constraint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    /// Tightens the harder you pull against it.
    Snare,
    /// Does not move.
    Mountain,
    /// Holds you to the community.
    Rope,
    /// A rope that no longer bears weight.
    Piton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SyncPoint {
    Sp1,
    Sp2,
    Sp3,
    Sp4,
    Sp5,
}

impl SyncPoint {
    pub fn at(scrub: f64) -> Self {
        if scrub < 15.0 {
            Self::Sp1
        } else if scrub < 30.0 {
            Self::Sp2
        } else if scrub < 70.0 {
            Self::Sp3
        } else if scrub < 88.0 {
            Self::Sp4
        } else {
            Self::Sp5
        }
    }

    /// Chapter titles of the two parallel stories.
    pub fn titles(&self) -> (&'static str, &'static str) {
        match self {
            Self::Sp1 => ("The Village Below", "Before"),
            Self::Sp2 => ("Into the Mountains", "Sentencing"),
            Self::Sp3 => ("The Long Sleep", "Years Served"),
            Self::Sp4 => ("The Changed Village", "Reentry Day"),
            Self::Sp5 => ("The Relic", "After"),
        }
    }
}

impl fmt::Display for SyncPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            Self::Sp1 => 1,
            Self::Sp2 => 2,
            Self::Sp3 => 3,
            Self::Sp4 => 4,
            Self::Sp5 => 5,
        };
        write!(f, "SP{}", n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReentryRule {
    /// TR1: pressure at home makes the mountains look like a way out.
    EscapeThreshold,
    /// TR2: the years away outlast the social contract.
    ContractObsolescence,
    /// TR3: the indices no longer describe the person they measure.
    IndexMismatch,
    /// TR4: being out of step becomes a kind of freedom.
    MisalignmentAsMobility,
}

impl ReentryRule {
    pub const ALL: [ReentryRule; 4] = [
        Self::EscapeThreshold,
        Self::ContractObsolescence,
        Self::IndexMismatch,
        Self::MisalignmentAsMobility,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::EscapeThreshold => "Escape threshold",
            Self::ContractObsolescence => "Social contract obsolescence",
            Self::IndexMismatch => "Index mismatch",
            Self::MisalignmentAsMobility => "Misalignment as mobility",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReentryFlag {
    PerspectiveShift,
    PitonAwareness,
    MetricTrustEroded,
}

/// The temporal displacement field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UczField {
    /// Years displaced.
    pub delta_t: f64,
    pub max_delta_t: f64,
    pub engaged: bool,
    pub active: bool,
    /// Once visible, stays visible.
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReentryConstraints {
    pub snare: Constraint,
    pub mountain: Constraint,
    pub rope: Constraint,
    pub rope_kind: ConstraintKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReentryState {
    pub constraints: ReentryConstraints,
    pub ucz: UczField,
    pub transformations: TransformationTable<ReentryRule>,
    /// 0..=100 position of the temporal scrubber.
    pub scrub: f64,
    /// Accumulated reader strain on the snare.
    pub strain: f64,
    pub sync_point: SyncPoint,
    pub omega_revealed: [bool; 3],
    pub probe_count: u32,
    pub idle_ticks: u64,
    /// Fraction of transformations fired.
    pub attractor_proximity: f64,
    pub terminal: bool,
    pub hysteresis: HysteresisSet<ReentryFlag>,
}

impl ReentryState {
    pub fn from_config(config: &ReentryConfig) -> Self {
        Self {
            constraints: ReentryConstraints {
                snare: Constraint::new(config.chi_base, Bounds::UNIT)
                    .with_epsilon(0.18)
                    .with_chi(config.chi_base)
                    .with_support(0.85),
                mountain: Constraint::new(1.0, Bounds::UNIT).with_support(0.95),
                rope: Constraint::new(config.rope_top, Bounds::new(config.rope_floor, config.rope_top))
                    .with_epsilon(0.05)
                    .with_chi(0.15)
                    .with_support(0.4),
                rope_kind: ConstraintKind::Rope,
            },
            ucz: UczField {
                delta_t: 0.0,
                max_delta_t: config.max_delta_t,
                engaged: false,
                active: false,
                visible: false,
            },
            transformations: TransformationTable::new()
                .with(ReentryRule::EscapeThreshold, Threshold::Scalar(config.escape_chi))
                .with(ReentryRule::ContractObsolescence, Threshold::Scalar(config.obsolete_delta_t))
                .with(
                    ReentryRule::IndexMismatch,
                    Threshold::Structural("rope is a piton after return".to_string()),
                )
                .with(
                    ReentryRule::MisalignmentAsMobility,
                    Threshold::Structural("index mismatch late in the timeline".to_string()),
                ),
            scrub: 0.0,
            strain: 0.0,
            sync_point: SyncPoint::Sp1,
            omega_revealed: [false; 3],
            probe_count: 0,
            idle_ticks: 0,
            attractor_proximity: 0.0,
            terminal: false,
            hysteresis: HysteresisSet::new(),
        }
    }
}

impl RuleState for ReentryState {
    type RuleId = ReentryRule;

    fn transformations(&self) -> &TransformationTable<ReentryRule> {
        &self.transformations
    }

    fn transformations_mut(&mut self) -> &mut TransformationTable<ReentryRule> {
        &mut self.transformations
    }
}

impl Tracked for ReentryState {
    type Flag = ReentryFlag;

    fn hysteresis(&self) -> &HysteresisSet<ReentryFlag> {
        &self.hysteresis
    }

    fn hysteresis_mut(&mut self) -> &mut HysteresisSet<ReentryFlag> {
        &mut self.hysteresis
    }
}

impl fmt::Display for ReentryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | scrub {:.1} | dT {:.1}y | chi {:.2} | rope {:.2} | attractor {:.2}",
            self.sync_point,
            self.scrub,
            self.ucz.delta_t,
            self.constraints.snare.chi,
            self.constraints.rope.value,
            self.attractor_proximity
        )?;
        if self.terminal {
            f.write_str(" | ended")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_point_boundaries() {
        assert_eq!(SyncPoint::at(0.0), SyncPoint::Sp1);
        assert_eq!(SyncPoint::at(14.9), SyncPoint::Sp1);
        assert_eq!(SyncPoint::at(15.0), SyncPoint::Sp2);
        assert_eq!(SyncPoint::at(30.0), SyncPoint::Sp3);
        assert_eq!(SyncPoint::at(87.9), SyncPoint::Sp4);
        assert_eq!(SyncPoint::at(88.0), SyncPoint::Sp5);
        assert_eq!(SyncPoint::Sp4.to_string(), "SP4");
    }
}
