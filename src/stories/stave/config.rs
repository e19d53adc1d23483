//! STAVE tuning. `Default` is the station as the story ships it.

use serde::{Deserialize, Serialize};

use crate::core::config::{ensure, ensure_range, ConfigError, StoryConfig};
use crate::schema::constraint::{Bounds, Constraint};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaveConfig {
    pub directive: Constraint,
    pub fidelity: Constraint,
    pub hull: Constraint,
    /// Objective seconds until the modeled deadline.
    pub objective_seconds: f64,
    pub compartments: Vec<String>,
    pub crew: CrewConfig,
    pub risk: RiskConfig,
    pub decay: DecayConfig,
    pub dilation: DilationConfig,
    pub hull_critical: f64,
    pub generator: GeneratorConfig,
    pub tasks: TaskConfig,
    pub sealing: SealingConfig,
    pub rules: RuleConfig,
    pub commands: CommandConfig,
}

impl Default for StaveConfig {
    fn default() -> Self {
        Self {
            directive: Constraint::new(420.0, Bounds::new(0.0, 1000.0))
                .with_epsilon(0.85)
                .with_support(0.80),
            fidelity: Constraint::new(0.72, Bounds::new(0.30, 0.98))
                .with_epsilon(0.60)
                .with_support(0.50),
            hull: Constraint::new(82.0, Bounds::new(0.0, 100.0))
                .with_epsilon(1.0)
                .with_support(1.0),
            objective_seconds: 480.0,
            compartments: ["1A", "1B", "2A", "2B", "3A", "3B", "4A", "4B"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            crew: CrewConfig::default(),
            risk: RiskConfig::default(),
            decay: DecayConfig::default(),
            dilation: DilationConfig::default(),
            hull_critical: 15.0,
            generator: GeneratorConfig::default(),
            tasks: TaskConfig::default(),
            sealing: SealingConfig::default(),
            rules: RuleConfig::default(),
            commands: CommandConfig::default(),
        }
    }
}

/// Crew attrition driven by DIRECTIVE actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    pub total: u32,
    pub floor: u32,
    /// Attrition starts once DIRECTIVE actions exceed this.
    pub actions_before_loss: u32,
    /// No attrition at or below this many crew.
    pub protected_crew: u32,
    /// Loss probability per unit time.
    pub loss_rate: f64,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            total: 4,
            floor: 1,
            actions_before_loss: 2,
            protected_crew: 2,
            loss_rate: 0.008,
        }
    }
}

/// FIDELITY widening the accepted risk band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub nominal: (f64, f64),
    pub per_accept: f64,
    pub ceiling: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            nominal: (0.12, 0.35),
            per_accept: 0.04,
            ceiling: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Hull percent lost per unit time.
    pub base: f64,
    pub cascade_multiplier: f64,
    pub lock_multiplier: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            base: 0.035,
            cascade_multiplier: 1.5,
            lock_multiplier: 1.8,
        }
    }
}

/// Piecewise PME curve. Above the breakpoint the multiplier grows by
/// `mild_slope` over the whole hull scale; below it, by `steep_slope` over
/// the breakpoint. Both pieces meet at the breakpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DilationConfig {
    pub breakpoint: f64,
    pub full_scale: f64,
    pub mild_slope: f64,
    pub steep_slope: f64,
}

impl Default for DilationConfig {
    fn default() -> Self {
        Self {
            breakpoint: 60.0,
            full_scale: 100.0,
            mild_slope: 2.0,
            steep_slope: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Ticks between generations at dilation zero.
    pub base_interval: f64,
    /// Ticks removed from the interval per unit of dilation.
    pub interval_slope: f64,
    pub min_interval: f64,
    /// Live-route ceiling.
    pub ceiling: usize,
    /// Routes seeded at boot.
    pub initial_routes: usize,
    pub junctions: Vec<String>,
    /// Compartment reported when every draw skips the open list.
    pub fallback_compartment: String,
    /// An open compartment is a candidate when its draw exceeds this.
    pub compartment_skip: f64,
    pub min_steps: usize,
    pub max_steps: usize,
    /// Share of the remaining subjective minutes a window may take.
    pub window_fraction: f64,
    pub min_window_minutes: f64,
    pub viability_floor: f64,
    pub viability_spread: f64,
    pub valve_threshold: f64,
    pub manual_threshold: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_interval: 40.0,
            interval_slope: 2.0,
            min_interval: 8.0,
            ceiling: 15,
            initial_routes: 4,
            junctions: [4, 7, 9, 12, 14, 18]
                .iter()
                .map(|n| format!("Junction {}", n))
                .collect(),
            fallback_compartment: "2A".to_string(),
            compartment_skip: 0.3,
            min_steps: 2,
            max_steps: 4,
            window_fraction: 0.6,
            min_window_minutes: 2.0,
            viability_floor: 0.55,
            viability_spread: 0.4,
            valve_threshold: 0.6,
            manual_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub offer_period: u64,
    pub offer_phase: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            offer_period: 60,
            offer_phase: 30,
        }
    }
}

/// Automated sealing while DIRECTIVE is in cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SealingConfig {
    pub period: u64,
    /// Sealing stops once this many compartments or fewer remain open.
    pub keep_open: usize,
}

impl Default for SealingConfig {
    fn default() -> Self {
        Self {
            period: 45,
            keep_open: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Hull percent below which T1 starts building.
    pub contradiction_onset: f64,
    pub contradiction_span: f64,
    pub contradiction_fire: f64,
    /// T1 seals a compartment only while more than this many are open.
    pub contradiction_keep_open: usize,
    pub lock_accepts: u32,
    /// T3 tracks progress only once the table holds more than this many routes.
    pub avalanche_min_routes: usize,
    pub avalanche_ratio: f64,
    pub shell_hull: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            contradiction_onset: 65.0,
            contradiction_span: 25.0,
            contradiction_fire: 0.6,
            contradiction_keep_open: 3,
            lock_accepts: 3,
            avalanche_min_routes: 3,
            avalanche_ratio: 0.7,
            shell_hull: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub accept_gain: f64,
    pub decline_loss: f64,
    pub valve_gain: f64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            accept_gain: 0.06,
            decline_loss: 0.08,
            valve_gain: 0.5,
        }
    }
}

fn ensure_constraint(name: &str, constraint: &Constraint) -> Result<(), ConfigError> {
    ensure(
        constraint.bounds.min < constraint.bounds.max,
        &format!("{} bounds are empty", name),
    )?;
    ensure_range(name, constraint.value, constraint.bounds.min, constraint.bounds.max)
}

impl StoryConfig for StaveConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_constraint("directive", &self.directive)?;
        ensure_constraint("fidelity", &self.fidelity)?;
        ensure_constraint("hull", &self.hull)?;
        ensure(self.objective_seconds > 0.0, "objective_seconds must be positive")?;
        ensure(!self.compartments.is_empty(), "at least one compartment is required")?;

        ensure(self.crew.floor >= 1, "crew floor must be at least 1")?;
        ensure(self.crew.floor <= self.crew.total, "crew floor exceeds crew total")?;
        ensure_range("crew.loss_rate", self.crew.loss_rate, 0.0, 1.0)?;

        let (low, high) = self.risk.nominal;
        ensure(low <= high, "risk band is inverted")?;
        ensure(high <= self.risk.ceiling, "risk band exceeds its ceiling")?;
        ensure_range("risk.ceiling", self.risk.ceiling, 0.0, 1.0)?;

        ensure(self.decay.base >= 0.0, "decay.base must be non-negative")?;
        ensure(self.decay.cascade_multiplier >= 1.0, "cascade multiplier below 1")?;
        ensure(self.decay.lock_multiplier >= 1.0, "lock multiplier below 1")?;

        let d = &self.dilation;
        ensure(d.full_scale >= self.hull.bounds.max, "dilation full_scale below hull maximum")?;
        ensure_range("dilation.breakpoint", d.breakpoint, f64::MIN_POSITIVE, self.hull.bounds.max)?;
        ensure(d.mild_slope >= 0.0 && d.steep_slope >= 0.0, "dilation slopes must be non-negative")?;
        ensure_range(
            "hull_critical",
            self.hull_critical,
            self.hull.bounds.min,
            self.hull.bounds.max,
        )?;

        let g = &self.generator;
        ensure(g.ceiling > 0, "route ceiling must be positive")?;
        ensure(g.min_interval >= 1.0, "generator min_interval must be at least 1")?;
        ensure(!g.junctions.is_empty(), "at least one junction is required")?;
        ensure(g.min_steps >= 1 && g.min_steps <= g.max_steps, "route step range is empty")?;
        ensure_range("generator.compartment_skip", g.compartment_skip, 0.0, 1.0)?;
        ensure_range("generator.window_fraction", g.window_fraction, 0.0, 1.0)?;
        ensure(g.min_window_minutes >= 1.0, "minimum route window must be at least a minute")?;
        ensure(
            g.viability_floor >= 0.0 && g.viability_floor + g.viability_spread <= 1.0,
            "viability range must stay inside [0, 1]",
        )?;

        ensure(self.tasks.offer_period > 0, "task offer_period must be positive")?;
        ensure(self.tasks.offer_phase < self.tasks.offer_period, "task offer_phase outside period")?;
        ensure(self.sealing.period > 0, "sealing period must be positive")?;

        let r = &self.rules;
        ensure(r.contradiction_span > 0.0, "contradiction span must be positive")?;
        ensure_range("rules.contradiction_fire", r.contradiction_fire, 0.0, 1.0)?;
        ensure(r.lock_accepts > 0, "lock_accepts must be positive")?;
        ensure_range("rules.avalanche_ratio", r.avalanche_ratio, 0.0, 1.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::parse_ron;

    #[test]
    fn defaults_validate() {
        assert!(StaveConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: StaveConfig = parse_ron("(generator: (ceiling: 3))").unwrap();
        assert_eq!(config.generator.ceiling, 3);
        assert_eq!(config.generator.initial_routes, 4);
        assert_eq!(config.hull.value, 82.0);
    }

    #[test]
    fn zero_ceiling_rejected() {
        let err = parse_ron::<StaveConfig>("(generator: (ceiling: 0))").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn breakpoint_outside_hull_rejected() {
        let err = parse_ron::<StaveConfig>("(dilation: (breakpoint: 140.0))").unwrap_err();
        assert!(err.to_string().contains("breakpoint"));
    }
}
