//! Announcements derived by diffing consecutive STAVE snapshots.

use serde::Serialize;
use std::fmt;

use crate::schema::constraint::Phase;
use crate::schema::route::RouteId;
use crate::stories::stave::dispatch::format_clock;
use crate::stories::stave::state::{RepairTask, StaveRule, StaveState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StaveEvent {
    DirectiveCascade,
    FidelityLock,
    RouteAvalanche { deprecated: u32, total: usize },
    DirectiveShell,
    CompartmentSealed(String),
    CrewLost { remaining: u32, total: u32 },
    HullCritical,
    RouteGenerated(RouteId),
    RouteDeprecated(RouteId),
    TaskOffered(RepairTask),
    Terminal { timestamp: f64, objective_seconds: f64 },
}

impl fmt::Display for StaveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectiveCascade => f.write_str(
                "DIRECTIVE CASCADE: Multiple sub-protocols activated. EGRESS ROUTE STATUS: COMPROMISED.",
            ),
            Self::FidelityLock => f.write_str(
                "FIDELITY OVERRIDE - MISSION CONTINUITY PRIORITIZED. Self-preservation command routing suspended.",
            ),
            Self::RouteAvalanche { deprecated, total } => write!(
                f,
                "Route table: {} of {} routes deprecated. Regeneration rate elevated.",
                deprecated, total
            ),
            Self::DirectiveShell => f.write_str("DIRECTIVE STATUS: ACTIVE - NO ACTIONABLE CONTEXT."),
            Self::CompartmentSealed(c) => write!(
                f,
                "Compartment {} sealed. Power rerouted to mission-critical systems.",
                c
            ),
            Self::CrewLost { remaining, total } => write!(
                f,
                "CREW_VIABLE updated: {}/{}. Compartment isolation event.",
                remaining, total
            ),
            Self::HullCritical => f.write_str("HULL INTEGRITY CRITICAL. Structural failure imminent."),
            Self::RouteGenerated(id) => write!(f, "PME: route {} available.", id),
            Self::RouteDeprecated(id) => write!(f, "Route {} DEPRECATED.", id),
            Self::TaskOffered(task) => write!(
                f,
                "Route optimization requires: {}. Risk assessment: {}. Type 'accept' or 'decline'.",
                task.description,
                task.risk.label()
            ),
            Self::Terminal {
                timestamp,
                objective_seconds,
            } => write!(
                f,
                "HULL INTEGRITY: 0.0%. PME terminated at T+{} (objective remaining {}).",
                format_clock(*timestamp),
                format_clock(*objective_seconds)
            ),
        }
    }
}

fn rule_event(rule: StaveRule, next: &StaveState) -> StaveEvent {
    match rule {
        StaveRule::DirectiveContradiction => StaveEvent::DirectiveCascade,
        StaveRule::FidelityLock => StaveEvent::FidelityLock,
        StaveRule::RouteAvalanche => StaveEvent::RouteAvalanche {
            deprecated: next.pme.deprecated_count,
            total: next.pme.routes.len(),
        },
        StaveRule::DirectiveShell => StaveEvent::DirectiveShell,
    }
}

pub fn diff(prev: &StaveState, next: &StaveState, crew_total: u32) -> Vec<StaveEvent> {
    let mut events: Vec<StaveEvent> = StaveRule::ALL
        .iter()
        .filter(|r| next.transformations.fired(**r) && !prev.transformations.fired(**r))
        .map(|r| rule_event(*r, next))
        .collect();

    let already_sealed = prev.system.compartments_sealed.len();
    events.extend(
        next.system
            .compartments_sealed
            .iter()
            .skip(already_sealed)
            .cloned()
            .map(StaveEvent::CompartmentSealed),
    );

    if next.system.crew_viable < prev.system.crew_viable {
        events.push(StaveEvent::CrewLost {
            remaining: next.system.crew_viable,
            total: crew_total,
        });
    }

    if next.constraints.hull.phase == Phase::Critical && prev.constraints.hull.phase != Phase::Critical {
        events.push(StaveEvent::HullCritical);
    }

    for (index, route) in next.pme.routes.iter().enumerate() {
        match prev.pme.routes.get(index) {
            None => {
                events.push(StaveEvent::RouteGenerated(route.id));
                if route.deprecated {
                    events.push(StaveEvent::RouteDeprecated(route.id));
                }
            }
            Some(old) if route.deprecated && !old.deprecated => {
                events.push(StaveEvent::RouteDeprecated(route.id));
            }
            Some(_) => {}
        }
    }

    if next.counters.tasks_offered > prev.counters.tasks_offered {
        if let Some(task) = &next.system.pending_task {
            events.push(StaveEvent::TaskOffered(task.clone()));
        }
    }

    if next.system.terminal && !prev.system.terminal {
        events.push(StaveEvent::Terminal {
            timestamp: next.system.terminal_timestamp.unwrap_or(next.system.elapsed),
            objective_seconds: next.pme.objective_seconds_left,
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stories::stave::config::StaveConfig;
    use crate::stories::stave::state::REPAIR_TASKS;

    fn base() -> StaveState {
        StaveState::from_config(&StaveConfig::default())
    }

    #[test]
    fn identical_snapshots_have_no_events() {
        let s = base();
        assert!(diff(&s, &s, 4).is_empty());
    }

    #[test]
    fn cascade_reports_rule_then_seal() {
        let prev = base();
        let mut next = prev.clone();
        next.transformations.fire(StaveRule::DirectiveContradiction);
        next.seal("2B");
        assert_eq!(
            diff(&prev, &next, 4),
            vec![
                StaveEvent::DirectiveCascade,
                StaveEvent::CompartmentSealed("2B".to_string())
            ]
        );
    }

    #[test]
    fn crew_task_and_terminal() {
        let prev = base();
        let mut next = prev.clone();
        next.system.crew_viable = 3;
        next.counters.tasks_offered = 1;
        next.system.pending_task = Some(REPAIR_TASKS[0].clone());
        next.system.terminal = true;
        next.system.terminal_timestamp = Some(125.0);
        let events = diff(&prev, &next, 4);
        assert_eq!(events[0], StaveEvent::CrewLost { remaining: 3, total: 4 });
        assert_eq!(events[1], StaveEvent::TaskOffered(REPAIR_TASKS[0].clone()));
        assert!(matches!(events[2], StaveEvent::Terminal { timestamp, .. } if timestamp == 125.0));
        assert!(events[2].to_string().contains("T+02:05"));
    }
}
