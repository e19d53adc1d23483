use serde::{Deserialize, Serialize};

/// Discrete phase label attached to a constraint.
///
/// Phases are ordered by severity. A constraint only ever moves to a phase of
/// strictly higher severity; there is no path back short of a session reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Nominal operation ("stable", "nominal", "intact", "constant").
    Stable,
    /// The constraint has been pushed off its resting point (post-TR1 snare).
    Shifted,
    /// Automated sub-protocols are firing.
    Cascade,
    /// Override engaged; user preference no longer routes through.
    Locked,
    /// Approaching structural failure.
    Critical,
    /// Still active, but with nothing left to act on.
    Shell,
    /// Social contract hollowed out: present but no longer load-bearing.
    Piton,
    /// Structural failure.
    Failed,
}

impl Phase {
    /// Severity rank used to keep phase transitions monotonic.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Stable => 0,
            Self::Shifted => 1,
            Self::Cascade => 1,
            Self::Locked => 2,
            Self::Critical => 2,
            Self::Shell => 3,
            Self::Piton => 3,
            Self::Failed => 4,
        }
    }

    /// Label used by presentation and log output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Shifted => "shifted",
            Self::Cascade => "cascade",
            Self::Locked => "locked",
            Self::Critical => "critical",
            Self::Shell => "shell",
            Self::Piton => "piton",
            Self::Failed => "failed",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Stable
    }
}

/// Closed interval a constraint value must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const UNIT: Bounds = Bounds { min: 0.0, max: 1.0 };

    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A named, bounded scalar pressure in a narrative simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub value: f64,
    /// Auxiliary pressure scalar.
    #[serde(default)]
    pub epsilon: f64,
    /// Drift scalar; only some stories move it.
    #[serde(default)]
    pub chi: f64,
    /// Weight/confidence attached to the constraint.
    #[serde(default)]
    pub support: f64,
    #[serde(default)]
    pub phase: Phase,
    pub bounds: Bounds,
}

impl Constraint {
    pub fn new(value: f64, bounds: Bounds) -> Self {
        Self {
            value: bounds.clamp(value),
            epsilon: 0.0,
            chi: 0.0,
            support: 0.0,
            phase: Phase::Stable,
            bounds,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_chi(mut self, chi: f64) -> Self {
        self.chi = chi;
        self
    }

    pub fn with_support(mut self, support: f64) -> Self {
        self.support = support;
        self
    }

    /// Set the value, clamped into the constraint's bounds.
    pub fn set(&mut self, value: f64) {
        self.value = self.bounds.clamp(value);
    }

    /// Shift the value by `delta`, clamped into the constraint's bounds.
    pub fn nudge(&mut self, delta: f64) {
        self.set(self.value + delta);
    }

    /// Move to `phase` if it is more severe than the current phase.
    ///
    /// Returns true when the phase actually changed.
    pub fn escalate(&mut self, phase: Phase) -> bool {
        if phase.severity() > self.phase.severity() {
            self.phase = phase;
            true
        } else {
            false
        }
    }

    pub fn in_bounds(&self) -> bool {
        self.bounds.contains(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_into_bounds() {
        let mut c = Constraint::new(50.0, Bounds::new(0.0, 100.0));
        c.set(140.0);
        assert_eq!(c.value, 100.0);
        c.set(-3.0);
        assert_eq!(c.value, 0.0);
    }

    #[test]
    fn new_clamps_initial_value() {
        let c = Constraint::new(2.0, Bounds::UNIT);
        assert_eq!(c.value, 1.0);
        assert!(c.in_bounds());
    }

    #[test]
    fn nudge_respects_bounds() {
        let mut c = Constraint::new(0.95, Bounds::new(0.30, 0.98));
        c.nudge(0.06);
        assert!((c.value - 0.98).abs() < f64::EPSILON);
        c.nudge(-1.0);
        assert!((c.value - 0.30).abs() < f64::EPSILON);
    }

    #[test]
    fn escalate_is_monotonic() {
        let mut c = Constraint::new(82.0, Bounds::new(0.0, 100.0));
        assert!(c.escalate(Phase::Critical));
        assert!(!c.escalate(Phase::Cascade));
        assert_eq!(c.phase, Phase::Critical);
        assert!(!c.escalate(Phase::Critical));
        assert!(c.escalate(Phase::Failed));
        assert_eq!(c.phase, Phase::Failed);
    }

    #[test]
    fn phase_labels() {
        assert_eq!(Phase::Cascade.label(), "cascade");
        assert_eq!(Phase::Failed.label(), "failed");
        assert_eq!(Phase::default(), Phase::Stable);
    }
}
