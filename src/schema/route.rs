use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic route sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId(pub u64);

impl RouteId {
    /// Operator-facing label: a letter derived from the sequence number
    /// followed by the number itself (`B1`, `C2`, ... `A26`).
    pub fn label(&self) -> String {
        let letter = (b'A' + (self.0 % 26) as u8) as char;
        format!("{}{}", letter, self.0)
    }

    /// Match a user-typed label, case-insensitively.
    pub fn matches_label(&self, input: &str) -> bool {
        self.label().eq_ignore_ascii_case(input.trim())
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Route classification as reported by the modeling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Primary,
    Contingency,
    Emergency,
    Lateral,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Self::Primary,
        Self::Contingency,
        Self::Emergency,
        Self::Lateral,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::Contingency => "CONTINGENCY",
            Self::Emergency => "EMERGENCY",
            Self::Lateral => "LATERAL",
        }
    }
}

/// A generated, time-boxed evacuation option.
///
/// Routes carry two expiry stamps, one per clock. Both are fixed when the
/// route is generated; a route is never deleted, only flagged deprecated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub classification: Classification,
    /// Ordered waypoints.
    pub path: Vec<String>,
    /// Compartment the route passes through.
    pub through: String,
    /// Percent, 55..=95.
    pub viability: u8,
    /// Elapsed objective time at generation.
    pub generated_at: f64,
    pub expires_at_subjective: f64,
    pub expires_at_objective: f64,
    pub deprecated: bool,
    pub requires_valve: bool,
    pub requires_manual: bool,
}

impl Route {
    pub fn is_live(&self) -> bool {
        !self.deprecated
    }

    /// Whether the objective clock has run past this route's window.
    pub fn expired_at(&self, objective_seconds_left: f64) -> bool {
        objective_seconds_left < self.expires_at_objective
    }

    /// Flip to deprecated. Returns true only on the first call.
    pub fn deprecate(&mut self) -> bool {
        if self.deprecated {
            false
        } else {
            self.deprecated = true;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: u64, expires_at_objective: f64) -> Route {
        Route {
            id: RouteId(id),
            classification: Classification::Primary,
            path: vec!["Junction 4".to_string(), "Junction 9".to_string()],
            through: "2A".to_string(),
            viability: 80,
            generated_at: 0.0,
            expires_at_subjective: 300.0,
            expires_at_objective,
            deprecated: false,
            requires_valve: false,
            requires_manual: true,
        }
    }

    #[test]
    fn labels_follow_sequence() {
        assert_eq!(RouteId(1).label(), "B1");
        assert_eq!(RouteId(2).label(), "C2");
        assert_eq!(RouteId(26).label(), "A26");
        assert_eq!(RouteId(27).to_string(), "B27");
    }

    #[test]
    fn label_match_ignores_case() {
        assert!(RouteId(3).matches_label("d3"));
        assert!(RouteId(3).matches_label(" D3 "));
        assert!(!RouteId(3).matches_label("D4"));
    }

    #[test]
    fn deprecate_once() {
        let mut r = route(1, 400.0);
        assert!(r.is_live());
        assert!(r.deprecate());
        assert!(!r.deprecate());
        assert!(!r.is_live());
    }

    #[test]
    fn expiry_is_strict() {
        let r = route(1, 400.0);
        assert!(!r.expired_at(400.0));
        assert!(r.expired_at(399.5));
    }
}
