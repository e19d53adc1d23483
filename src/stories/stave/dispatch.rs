//! Reader commands for STAVE.
//!
//! The dispatcher is pure and total: every command yields a new snapshot
//! and a list of notices, never touches the clocks or the tick counter, and
//! never draws randomness.

use serde::Serialize;
use std::fmt;

use crate::core::command_text::{CommandLine, CommandParseError};
use crate::core::story::Transition;
use crate::schema::constraint::Phase;
use crate::schema::route::{Classification, Route};
use crate::stories::stave::state::{RepairTask, StaveFlag, StaveState};
use crate::stories::stave::Stave;

#[derive(Debug, Clone, PartialEq)]
pub enum StaveCommand {
    Help,
    Status,
    Routes,
    Hatch,
    Fidelity,
    Accept,
    Decline,
    Select(String),
    Procedure,
    Diagnostics,
    Trace(String),
    Sync,
    Main,
    ReleaseValve,
    Seal(String),
}

pub fn parse(input: &str) -> Result<StaveCommand, CommandParseError> {
    let line = CommandLine::split(input)?;
    let command = match line.verb.as_str() {
        "help" => StaveCommand::Help,
        "status" => StaveCommand::Status,
        "routes" => StaveCommand::Routes,
        "hatch" => StaveCommand::Hatch,
        "fidelity" => StaveCommand::Fidelity,
        "accept" => StaveCommand::Accept,
        "decline" => StaveCommand::Decline,
        "select" => StaveCommand::Select(line.rest().to_ascii_uppercase()),
        "procedure" => StaveCommand::Procedure,
        "diagnostics" | "diag" => StaveCommand::Diagnostics,
        "trace" => StaveCommand::Trace(line.rest().to_ascii_lowercase()),
        "sync" | "force" => StaveCommand::Sync,
        "main" => StaveCommand::Main,
        "valve" | "release" => StaveCommand::ReleaseValve,
        "seal" => StaveCommand::Seal(line.arg(0, "compartment")?.to_ascii_uppercase()),
        _ => return Err(line.unknown()),
    };
    Ok(command)
}

/// Remaining time as the main terminal reports it. The objective reading
/// only appears once the reader has seen through the PME.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockReading {
    pub subjective_seconds: f64,
    pub objective_seconds: Option<f64>,
}

pub fn format_clock(seconds: f64) -> String {
    let whole = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

impl fmt::Display for ClockReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_clock(self.subjective_seconds))?;
        if let Some(objective) = self.objective_seconds {
            write!(f, " [obj {}]", format_clock(objective))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub hull: f64,
    pub directive: Phase,
    pub live_routes: usize,
    pub primary_routes: usize,
    pub time_to_critical: ClockReading,
    pub crew_viable: u32,
    pub crew_total: u32,
    /// Sealed and open compartments, reported once DIRECTIVE cascades.
    pub compartments: Option<(Vec<String>, Vec<String>)>,
}

/// Raw sensor feed shown in diagnostic mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticFeed {
    pub objective_seconds: f64,
    pub subjective_seconds: f64,
    pub multiplier: f64,
    pub directive_actions: u32,
    pub fidelity: f64,
    pub tasks_accepted: u32,
    pub risk_nominal: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StaveNotice {
    NotUnderstood(String),
    NoResponse,
    Help,
    Status(StatusReport),
    RouteTable {
        live: Vec<Route>,
        deprecated: u32,
    },
    Hatch {
        open: Vec<String>,
        sealed: Vec<String>,
    },
    Fidelity {
        score: f64,
        accepted: u32,
        risk_nominal: (f64, f64),
        locked: bool,
    },
    TaskAccepted(RepairTask),
    AcceptedUnderOverride,
    TaskDeclined,
    DeclineOverridden,
    NoPendingTask,
    RouteSelected(Route),
    RouteNotFound(String),
    RouteDeprecated(String),
    Procedure,
    DiagnosticEntered {
        first_time: bool,
        feed: DiagnosticFeed,
    },
    RequiresDiagnostic(&'static str),
    TraceMatched,
    TraceUnmatched(String),
    SyncFailed {
        multiplier: f64,
    },
    ReturnedToMain {
        recalibrated: bool,
    },
    AlreadyInMain,
    ValveReleased {
        hull: f64,
    },
    CompartmentSealed(String),
    CompartmentNotOpen(String),
}

const HELP: &str = "Available commands: status, routes, hatch, fidelity, accept, decline, \
select [route], procedure, diagnostics, trace [topic], sync, main, valve, seal [compartment]";

fn directive_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Cascade => "CASCADE",
        Phase::Shell => "ACTIVE - NO ACTIONABLE CONTEXT",
        _ => "ACTIVE",
    }
}

impl fmt::Display for StaveNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUnderstood(input) => write!(
                f,
                "Unrecognized command: '{}'. Type 'help' for available commands.",
                input.trim()
            ),
            Self::NoResponse => f.write_str("No response."),
            Self::Help => f.write_str(HELP),
            Self::Status(r) => {
                writeln!(
                    f,
                    "Hull integrity: {:.1}%. DIRECTIVE status: {}.",
                    r.hull,
                    directive_label(r.directive)
                )?;
                writeln!(
                    f,
                    "Evacuation routes available: {} ({} primary, {} contingency).",
                    r.live_routes,
                    r.primary_routes,
                    r.live_routes - r.primary_routes
                )?;
                write!(
                    f,
                    "Estimated time to critical: {}. Crew viable: {} of {}.",
                    r.time_to_critical, r.crew_viable, r.crew_total
                )?;
                if let Some((sealed, open)) = &r.compartments {
                    let sealed = if sealed.is_empty() {
                        "none".to_string()
                    } else {
                        sealed.join(", ")
                    };
                    write!(f, "\nCompartments sealed: {}. Open: {}.", sealed, open.join(", "))?;
                }
                Ok(())
            }
            Self::RouteTable { live, deprecated } => {
                write!(
                    f,
                    "Route table: {} active, {} deprecated:",
                    live.len(),
                    deprecated
                )?;
                for route in live {
                    write!(
                        f,
                        "\n  {:<5} {:<12} {:>3}%  {}",
                        route.id.label(),
                        route.classification.label(),
                        route.viability,
                        route.path.join(" > ")
                    )?;
                }
                Ok(())
            }
            Self::Hatch { open, sealed } => {
                f.write_str("Hatch status:")?;
                for c in open {
                    write!(f, "\n  {}: OPEN", c)?;
                }
                for c in sealed {
                    write!(f, "\n  {}: SEALED - DIRECTIVE automated sequence", c)?;
                }
                Ok(())
            }
            Self::Fidelity {
                score,
                accepted,
                risk_nominal,
                locked,
            } => {
                let grade = if *score > 0.8 {
                    "outstanding"
                } else if *score > 0.6 {
                    "exemplary"
                } else {
                    "satisfactory"
                };
                writeln!(f, "FIDELITY score: {:.2} ({}).", score, grade)?;
                write!(
                    f,
                    "Tasks completed: {}. RISK_NOMINAL range: [{:.2}, {:.2}].",
                    accepted, risk_nominal.0, risk_nominal.1
                )?;
                if *locked {
                    f.write_str("\nFIDELITY OVERRIDE ACTIVE. Self-preservation routing suspended.")?;
                }
                Ok(())
            }
            Self::TaskAccepted(task) => write!(
                f,
                "Assignment accepted: {}. Displaying procedure.",
                task.description
            ),
            Self::AcceptedUnderOverride => {
                f.write_str("Procedure display recommended for mission continuity. Proceeding.")
            }
            Self::TaskDeclined => f.write_str(
                "Assignment declined. FIDELITY score adjusted. Rerouting through alternate junction.",
            ),
            Self::DeclineOverridden => f.write_str(
                "FIDELITY OVERRIDE - MISSION CONTINUITY PRIORITIZED. Decline not processed.",
            ),
            Self::NoPendingTask => f.write_str("No pending assignment. Awaiting next task cycle."),
            Self::RouteSelected(route) => {
                write!(
                    f,
                    "Route {} selected. Classification: {}. Viability: {}%.\nPath: {}. Through compartment {}.",
                    route.id.label(),
                    route.classification.label(),
                    route.viability,
                    route.path.join(" > "),
                    route.through
                )?;
                if route.requires_valve {
                    if let Some(first) = route.path.first() {
                        write!(f, "\nRequires manual valve release at {}.", first)?;
                    }
                }
                Ok(())
            }
            Self::RouteNotFound(label) => write!(
                f,
                "Route {} not found. Type 'routes' to list available routes.",
                if label.is_empty() { "?" } else { label }
            ),
            Self::RouteDeprecated(label) => write!(
                f,
                "Route {} DEPRECATED. Viability window expired.",
                label
            ),
            Self::Procedure => f.write_str(
                "Procedure: Manual valve release\n\
                 \x20 1. Verify compartment atmospheric pressure within tolerance\n\
                 \x20 2. Disengage safety interlock (red handle, quarter-turn clockwise)\n\
                 \x20 3. Actuate primary valve (sustained pressure, 8 seconds)\n\
                 \x20 4. Confirm flow indicator reads GREEN",
            ),
            Self::DiagnosticEntered { first_time, feed } => {
                if *first_time {
                    f.write_str("Accessing diagnostic subsystem...\nAuthorization: local-engineering. Level: observatory.\n")?;
                }
                writeln!(f, "Diagnostic mode active.")?;
                writeln!(f, "OBJECTIVE REMAINING:  {}", format_clock(feed.objective_seconds))?;
                writeln!(f, "PME SUBJECTIVE:       {}", format_clock(feed.subjective_seconds))?;
                writeln!(f, "PME CYCLE MULTIPLIER: x{:.1}", feed.multiplier)?;
                writeln!(f, "DIRECTIVE sub-protocols active: {}", feed.directive_actions + 3)?;
                writeln!(
                    f,
                    "FIDELITY-weighted risk acceptance: +{:.0}% above baseline",
                    (feed.fidelity - 0.35) * 100.0
                )?;
                writeln!(
                    f,
                    "Historical compliance premium: {:.2} lives",
                    feed.tasks_accepted as f64 * 0.11
                )?;
                write!(
                    f,
                    "RISK_NOMINAL range: [{:.2}, {:.2}]",
                    feed.risk_nominal.0, feed.risk_nominal.1
                )
            }
            Self::RequiresDiagnostic(what) => write!(
                f,
                "{} requires diagnostic mode. Type 'diagnostics' to enter.",
                what
            ),
            Self::TraceMatched => f.write_str(
                "Tracing DIRECTIVE protocol origin...\n\
                 Authorization: SURFCOM-CENTRAL\n\
                 Memo fragment: \"...acceptable crew-risk ceiling of 0.34 given replacement-to-equipment cost ratio...\"\n\
                 Priority weighting: equipment preservation 0.71, crew preservation 0.29.",
            ),
            Self::TraceUnmatched(topic) => write!(f, "Trace: {} - no matching protocol ID.", topic),
            Self::SyncFailed { multiplier } => write!(
                f,
                "Attempting PME clock synchronization...\nCurrent PME cycle multiplier: x{:.1}\nSYNC FAILED. PME allocation locked by priority scheduling.",
                multiplier
            ),
            Self::ReturnedToMain { recalibrated } => {
                f.write_str("Returning to main terminal.")?;
                if *recalibrated {
                    f.write_str("\nInterface recalibrated.")?;
                }
                Ok(())
            }
            Self::AlreadyInMain => f.write_str("Already in main terminal."),
            Self::ValveReleased { hull } => {
                write!(f, "Valve released. Hull integrity: {:.1}%.", hull)
            }
            Self::CompartmentSealed(c) => write!(f, "Compartment {} sealed on operator command.", c),
            Self::CompartmentNotOpen(c) => write!(f, "Compartment {} is not open.", c),
        }
    }
}

fn status(stave: &Stave, s: &StaveState) -> StatusReport {
    let primary = s
        .live_routes()
        .filter(|r| r.classification == Classification::Primary)
        .count();
    StatusReport {
        hull: s.constraints.hull.value,
        directive: s.constraints.directive.phase,
        live_routes: s.live_route_count(),
        primary_routes: primary,
        time_to_critical: ClockReading {
            subjective_seconds: s.pme.subjective_seconds_left,
            objective_seconds: s
                .hysteresis
                .is_set(StaveFlag::SeenObjectiveClock)
                .then_some(s.pme.objective_seconds_left),
        },
        crew_viable: s.system.crew_viable,
        crew_total: stave.config().crew.total,
        compartments: (s.constraints.directive.phase == Phase::Cascade).then(|| {
            (
                s.system.compartments_sealed.clone(),
                s.system.compartments_open.clone(),
            )
        }),
    }
}

fn diagnostic_feed(s: &StaveState) -> DiagnosticFeed {
    DiagnosticFeed {
        objective_seconds: s.pme.objective_seconds_left,
        subjective_seconds: s.pme.subjective_seconds_left,
        multiplier: s.pme.dilation_multiplier,
        directive_actions: s.counters.directive_actions,
        fidelity: s.constraints.fidelity.value,
        tasks_accepted: s.counters.tasks_accepted,
        risk_nominal: s.system.risk_nominal,
    }
}

fn accept_task(stave: &Stave, s: &mut StaveState) {
    s.counters.tasks_accepted += 1;
    s.constraints.fidelity.nudge(stave.config().commands.accept_gain);
    s.system.pending_task = None;
}

pub fn apply(stave: &Stave, state: &StaveState, command: &StaveCommand) -> Transition<StaveState, StaveNotice> {
    if state.system.terminal {
        return Transition::unchanged(state, StaveNotice::NoResponse);
    }
    let config = stave.config();
    let mut s = state.clone();
    let notice = match command {
        StaveCommand::Help => StaveNotice::Help,
        StaveCommand::Status => StaveNotice::Status(status(stave, &s)),
        StaveCommand::Routes => StaveNotice::RouteTable {
            live: s.live_routes().cloned().collect(),
            deprecated: s.pme.deprecated_count,
        },
        StaveCommand::Hatch => StaveNotice::Hatch {
            open: s.system.compartments_open.clone(),
            sealed: s.system.compartments_sealed.clone(),
        },
        StaveCommand::Fidelity => StaveNotice::Fidelity {
            score: s.constraints.fidelity.value,
            accepted: s.counters.tasks_accepted,
            risk_nominal: s.system.risk_nominal,
            locked: s.fidelity_locked(),
        },
        StaveCommand::Accept => {
            if s.fidelity_locked() {
                accept_task(stave, &mut s);
                StaveNotice::AcceptedUnderOverride
            } else if let Some(task) = s.system.pending_task.clone() {
                accept_task(stave, &mut s);
                StaveNotice::TaskAccepted(task)
            } else {
                StaveNotice::NoPendingTask
            }
        }
        StaveCommand::Decline => {
            if s.fidelity_locked() {
                StaveNotice::DeclineOverridden
            } else if s.system.pending_task.take().is_some() {
                s.constraints.fidelity.nudge(-config.commands.decline_loss);
                StaveNotice::TaskDeclined
            } else {
                StaveNotice::NoPendingTask
            }
        }
        StaveCommand::Select(label) => match s.route(label).cloned() {
            None => StaveNotice::RouteNotFound(label.clone()),
            Some(route) if route.deprecated => StaveNotice::RouteDeprecated(route.id.label()),
            Some(route) => {
                s.system.selected_route = Some(route.id);
                StaveNotice::RouteSelected(route)
            }
        },
        StaveCommand::Procedure => StaveNotice::Procedure,
        StaveCommand::Diagnostics => {
            let first_time = !s.system.diagnostic_unlocked;
            s.system.diagnostic_unlocked = true;
            s.system.in_diagnostic_mode = true;
            StaveNotice::DiagnosticEntered {
                first_time,
                feed: diagnostic_feed(&s),
            }
        }
        StaveCommand::Trace(topic) => {
            if !s.system.in_diagnostic_mode {
                StaveNotice::RequiresDiagnostic("Trace")
            } else if topic.contains("surfcom") || topic.contains("protocol") {
                StaveNotice::TraceMatched
            } else {
                StaveNotice::TraceUnmatched(topic.clone())
            }
        }
        StaveCommand::Sync => {
            if s.system.in_diagnostic_mode {
                StaveNotice::SyncFailed {
                    multiplier: s.pme.dilation_multiplier,
                }
            } else {
                StaveNotice::RequiresDiagnostic("Clock synchronization")
            }
        }
        StaveCommand::Main => {
            if s.system.in_diagnostic_mode {
                s.system.in_diagnostic_mode = false;
                StaveNotice::ReturnedToMain {
                    recalibrated: s.system.diagnostic_unlocked,
                }
            } else {
                StaveNotice::AlreadyInMain
            }
        }
        StaveCommand::ReleaseValve => {
            s.system.valve_released = true;
            s.constraints.hull.nudge(config.commands.valve_gain);
            StaveNotice::ValveReleased {
                hull: s.constraints.hull.value,
            }
        }
        StaveCommand::Seal(compartment) => {
            if s.seal(compartment) {
                StaveNotice::CompartmentSealed(compartment.clone())
            } else {
                StaveNotice::CompartmentNotOpen(compartment.clone())
            }
        }
    };
    stave.tracker().update(&mut s);
    Transition::new(s).notice(notice)
}
