//! STAVE snapshot: a failing deep-sea station and the systems that narrate it.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use std::fmt;

use crate::core::hysteresis::Tracked;
use crate::core::rules::RuleState;
use crate::schema::constraint::{Constraint, Phase};
use crate::schema::hysteresis::HysteresisSet;
use crate::schema::route::{Route, RouteId};
use crate::schema::transformation::{Threshold, TransformationTable};
use crate::stories::stave::config::StaveConfig;

/// The four one-shot transformations, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StaveRule {
    /// T1: DIRECTIVE turns on the crew it was meant to protect.
    DirectiveContradiction,
    /// T2: FIDELITY stops routing self-preservation commands.
    FidelityLock,
    /// T3: most of the route table has expired.
    RouteAvalanche,
    /// T4: DIRECTIVE keeps running with nothing to act on.
    DirectiveShell,
}

impl StaveRule {
    pub const ALL: [StaveRule; 4] = [
        Self::DirectiveContradiction,
        Self::FidelityLock,
        Self::RouteAvalanche,
        Self::DirectiveShell,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::DirectiveContradiction => "T1",
            Self::FidelityLock => "T2",
            Self::RouteAvalanche => "T3",
            Self::DirectiveShell => "T4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StaveFlag {
    /// The reader has been in diagnostics and come back; dual clocks from now on.
    SeenObjectiveClock,
    SeenDirectiveShell,
    SeenFidelityLock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Risk {
    Elevated,
    High,
    Critical,
}

impl Risk {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// A repair assignment FIDELITY offers the crew.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairTask {
    pub id: u8,
    pub description: &'static str,
    pub risk: Risk,
}

/// Offered in this order, at most once each.
pub const REPAIR_TASKS: [RepairTask; 5] = [
    RepairTask {
        id: 1,
        description: "Manual valve release in Junction 12, compartment 3A pressure differential",
        risk: Risk::Elevated,
    },
    RepairTask {
        id: 2,
        description: "Thermal coupling realignment in Junction 9, atmospheric imbalance",
        risk: Risk::Elevated,
    },
    RepairTask {
        id: 3,
        description: "Emergency ballast override in Junction 14, trim correction",
        risk: Risk::High,
    },
    RepairTask {
        id: 4,
        description: "Manifold bypass in Junction 7, secondary coolant reroute",
        risk: Risk::High,
    },
    RepairTask {
        id: 5,
        description: "Hull patch verification in Junction 18, structural micro-fracture",
        risk: Risk::Critical,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaveConstraints {
    /// C1, mission-priority pressure.
    pub directive: Constraint,
    /// C2, crew compliance index.
    pub fidelity: Constraint,
    /// C3, hull integrity percent. The primary constraint.
    pub hull: Constraint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Counters {
    pub directive_actions: u32,
    pub tasks_accepted: u32,
    pub tasks_offered: u32,
}

/// Predictive Modeling Engine: the two clocks and the route table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pme {
    pub objective_seconds_left: f64,
    pub dilation_multiplier: f64,
    pub subjective_seconds_left: f64,
    pub cycle_count: u64,
    pub routes: Vec<Route>,
    pub next_route_id: u64,
    pub deprecated_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaveSystem {
    pub tick_count: u64,
    /// Simulated time since boot.
    pub elapsed: f64,
    pub terminal: bool,
    pub terminal_timestamp: Option<f64>,
    pub diagnostic_unlocked: bool,
    pub in_diagnostic_mode: bool,
    pub crew_viable: u32,
    pub risk_nominal: (f64, f64),
    pub compartments_open: Vec<String>,
    pub compartments_sealed: Vec<String>,
    pub valve_released: bool,
    pub pending_task: Option<RepairTask>,
    pub selected_route: Option<RouteId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaveState {
    pub constraints: StaveConstraints,
    pub counters: Counters,
    pub transformations: TransformationTable<StaveRule>,
    pub pme: Pme,
    pub system: StaveSystem,
    pub hysteresis: HysteresisSet<StaveFlag>,
}

impl StaveState {
    /// Boot snapshot before any routes are seeded.
    pub fn from_config(config: &StaveConfig) -> Self {
        let rules = &config.rules;
        Self {
            constraints: StaveConstraints {
                directive: config.directive.clone(),
                fidelity: config.fidelity.clone(),
                hull: config.hull.clone(),
            },
            counters: Counters::default(),
            transformations: TransformationTable::new()
                .with(StaveRule::DirectiveContradiction, Threshold::Scalar(rules.contradiction_fire))
                .with(StaveRule::FidelityLock, Threshold::Scalar(rules.lock_accepts as f64))
                .with(StaveRule::RouteAvalanche, Threshold::Scalar(rules.avalanche_ratio))
                .with(StaveRule::DirectiveShell, Threshold::Scalar(rules.shell_hull)),
            pme: Pme {
                objective_seconds_left: config.objective_seconds,
                dilation_multiplier: 1.0,
                subjective_seconds_left: config.objective_seconds,
                cycle_count: 0,
                routes: Vec::new(),
                next_route_id: 1,
                deprecated_count: 0,
            },
            system: StaveSystem {
                tick_count: 0,
                elapsed: 0.0,
                terminal: false,
                terminal_timestamp: None,
                diagnostic_unlocked: false,
                in_diagnostic_mode: false,
                crew_viable: config.crew.total,
                risk_nominal: config.risk.nominal,
                compartments_open: config.compartments.clone(),
                compartments_sealed: Vec::new(),
                valve_released: false,
                pending_task: None,
                selected_route: None,
            },
            hysteresis: HysteresisSet::new(),
        }
    }

    pub fn live_routes(&self) -> impl Iterator<Item = &Route> {
        self.pme.routes.iter().filter(|r| r.is_live())
    }

    pub fn live_route_count(&self) -> usize {
        self.live_routes().count()
    }

    /// Look a route up by its operator label.
    pub fn route(&self, label: &str) -> Option<&Route> {
        self.pme.routes.iter().find(|r| r.id.matches_label(label))
    }

    /// Seal the named compartment if it is open.
    pub fn seal(&mut self, compartment: &str) -> bool {
        match self
            .system
            .compartments_open
            .iter()
            .position(|c| c.eq_ignore_ascii_case(compartment))
        {
            Some(index) => {
                let sealed = self.system.compartments_open.remove(index);
                self.system.compartments_sealed.push(sealed);
                true
            }
            None => false,
        }
    }

    /// Seal a uniformly chosen open compartment and count it as a
    /// DIRECTIVE action.
    pub fn seal_random(&mut self, rng: &mut StdRng) -> Option<String> {
        if self.system.compartments_open.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.system.compartments_open.len());
        let sealed = self.system.compartments_open.remove(index);
        self.system.compartments_sealed.push(sealed.clone());
        self.counters.directive_actions += 1;
        Some(sealed)
    }

    pub fn fidelity_locked(&self) -> bool {
        self.constraints.fidelity.phase == Phase::Locked
    }
}

impl RuleState for StaveState {
    type RuleId = StaveRule;

    fn transformations(&self) -> &TransformationTable<StaveRule> {
        &self.transformations
    }

    fn transformations_mut(&mut self) -> &mut TransformationTable<StaveRule> {
        &mut self.transformations
    }
}

impl Tracked for StaveState {
    type Flag = StaveFlag;

    fn hysteresis(&self) -> &HysteresisSet<StaveFlag> {
        &self.hysteresis
    }

    fn hysteresis_mut(&mut self) -> &mut HysteresisSet<StaveFlag> {
        &mut self.hysteresis
    }
}

impl fmt::Display for StaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick {} | hull {:.1}% ({}) | directive {} | fidelity {:.2} ({}) | PME x{:.1} | routes {} live / {} deprecated | crew {}",
            self.system.tick_count,
            self.constraints.hull.value,
            self.constraints.hull.phase.label(),
            self.constraints.directive.phase.label(),
            self.constraints.fidelity.value,
            self.constraints.fidelity.phase.label(),
            self.pme.dilation_multiplier,
            self.live_route_count(),
            self.pme.deprecated_count,
            self.system.crew_viable,
        )?;
        if self.system.terminal {
            f.write_str(" | TERMINAL")?;
        }
        Ok(())
    }
}
