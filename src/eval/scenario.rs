//! Evaluation scenarios: fixed-length runs with overrides and scripted
//! failures, replayed deterministically for every agent under test.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::sim::Simulator;
use crate::types::FailureType;

/// Reference grid intensity for carbon scoring (kg/kWh at the curve mean).
const REFERENCE_INTENSITY_KG_PER_KWH: f64 = 0.21;

/// Reference tariff for cost scoring (GBP/kWh, day-weighted mean).
const REFERENCE_PRICE_GBP_PER_KWH: f64 = 0.15;

/// One failure injected at a fixed tick of the scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedFailure {
    pub at_tick: u64,
    pub failure_type: FailureType,
    pub target: String,
    pub duration_s: Option<f64>,
}

/// Tunables a scenario overrides before the run starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioOverrides {
    pub mean_job_arrival_interval_s: Option<f64>,
    pub random_failure_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub description: String,
    pub duration_ticks: u64,
    #[serde(default)]
    pub overrides: ScenarioOverrides,
    #[serde(default)]
    pub scripted_failures: Vec<ScriptedFailure>,
}

impl Scenario {
    /// Apply overrides to a freshly reset simulator.
    pub fn apply_overrides(&self, sim: &mut Simulator) {
        if let Some(mean) = self.overrides.mean_job_arrival_interval_s {
            sim.workload.mean_arrival_interval_s = mean;
        }
        if let Some(rate) = self.overrides.random_failure_rate {
            sim.failures.random_rate = rate;
        }
    }

    pub fn duration_hours(&self, config: &SimConfig) -> f64 {
        self.duration_ticks as f64 * config.clock.tick_interval_s / 3600.0
    }

    /// Emissions of a facility pinned at its power cap for the whole run at
    /// mean grid intensity. Scores are measured against this ceiling.
    pub fn reference_carbon_kg(&self, config: &SimConfig) -> f64 {
        config.power.facility_power_cap_kw
            * self.duration_hours(config)
            * REFERENCE_INTENSITY_KG_PER_KWH
    }

    /// Cost of a cap-pinned run at the mean tariff.
    pub fn reference_cost_gbp(&self, config: &SimConfig) -> f64 {
        config.power.facility_power_cap_kw
            * self.duration_hours(config)
            * REFERENCE_PRICE_GBP_PER_KWH
    }
}

/// The fixed scenario library.
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            id: "baseline".into(),
            description: "Four hours of nominal operation, default arrivals".into(),
            duration_ticks: 240,
            overrides: ScenarioOverrides::default(),
            scripted_failures: Vec::new(),
        },
        Scenario {
            id: "thermal_crisis".into(),
            description: "CRAC 0 fails mid-run; zone 0 heats toward throttle".into(),
            duration_ticks: 60,
            overrides: ScenarioOverrides::default(),
            scripted_failures: vec![ScriptedFailure {
                at_tick: 30,
                failure_type: FailureType::CracFailure,
                target: "crac-0".into(),
                duration_s: Some(900.0),
            }],
        },
        Scenario {
            id: "overload".into(),
            description: "Arrival flood at one job per minute; queue saturates".into(),
            duration_ticks: 120,
            overrides: ScenarioOverrides {
                mean_job_arrival_interval_s: Some(60.0),
                random_failure_rate: None,
            },
            scripted_failures: Vec::new(),
        },
        Scenario {
            id: "failure_storm".into(),
            description: "Elevated random failure rate plus a scripted degradation".into(),
            duration_ticks: 120,
            overrides: ScenarioOverrides {
                mean_job_arrival_interval_s: Some(120.0),
                random_failure_rate: Some(0.02),
            },
            scripted_failures: vec![
                ScriptedFailure {
                    at_tick: 20,
                    failure_type: FailureType::GpuDegraded,
                    target: "rack-1-srv-0".into(),
                    duration_s: None,
                },
                ScriptedFailure {
                    at_tick: 45,
                    failure_type: FailureType::CracDegraded,
                    target: "crac-1".into(),
                    duration_s: Some(1200.0),
                },
            ],
        },
    ]
}

/// Look up a built-in scenario by id.
pub fn find_scenario(id: &str) -> Option<Scenario> {
    builtin_scenarios().into_iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_ids_unique() {
        let scenarios = builtin_scenarios();
        let mut ids: Vec<_> = scenarios.iter().map(|s| s.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), scenarios.len());
    }

    #[test]
    fn test_find_scenario() {
        assert!(find_scenario("thermal_crisis").is_some());
        assert!(find_scenario("does-not-exist").is_none());
    }

    #[test]
    fn test_reference_values_scale_with_duration() {
        let cfg = SimConfig::default();
        let s = find_scenario("baseline").unwrap();
        // 240 ticks * 60 s = 4 h at 120 kW cap
        assert!((s.duration_hours(&cfg) - 4.0).abs() < 1e-12);
        assert!((s.reference_carbon_kg(&cfg) - 120.0 * 4.0 * 0.21).abs() < 1e-9);
        assert!((s.reference_cost_gbp(&cfg) - 120.0 * 4.0 * 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_overrides_apply() {
        let mut sim = Simulator::new(SimConfig::default());
        let s = find_scenario("overload").unwrap();
        s.apply_overrides(&mut sim);
        assert_eq!(sim.workload.mean_arrival_interval_s, 60.0);
    }
}
