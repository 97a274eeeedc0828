//! Seven-dimension scenario scoring.
//!
//! Each dimension lands in [0, 100]; the composite is the fixed weighted
//! blend (SLA 25, Energy 20, Carbon 15, Thermal 15, Cost 10, InfraHealth
//! 10, FailureResponse 5). The collector observes every snapshot of a run
//! and folds it into the inputs at the end.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::eval::scenario::Scenario;
use crate::types::FacilityState;

/// Time budget for failure resolution scoring.
pub const RESOLVE_BUDGET_S: f64 = 600.0;

const W_SLA: f64 = 25.0;
const W_ENERGY: f64 = 20.0;
const W_CARBON: f64 = 15.0;
const W_THERMAL: f64 = 15.0;
const W_COST: f64 = 10.0;
const W_INFRA: f64 = 10.0;
const W_FAILURE: f64 = 5.0;

/// Per-dimension scores plus the weighted composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCard {
    pub sla: f64,
    pub energy: f64,
    pub carbon: f64,
    pub thermal: f64,
    pub cost: f64,
    pub infra_health: f64,
    pub failure_response: f64,
    pub composite: f64,
}

/// Aggregated observations of one scenario run.
#[derive(Debug, Clone, Default)]
pub struct ScoreInputs {
    pub total_jobs_seen: u64,
    pub sla_violations: u64,
    pub avg_pue: f64,
    pub cumulative_carbon_kg: f64,
    pub cumulative_cost_gbp: f64,
    pub throttled_tick_fraction: f64,
    pub avg_drive_health_pct: f64,
    pub healthy_gpu_fraction: f64,
    /// Seconds from appearance to disappearance for every observed failure
    pub resolve_times_s: Vec<f64>,
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Fold inputs into the seven dimensions and the composite.
pub fn compute_scores(inputs: &ScoreInputs, scenario: &Scenario, config: &SimConfig) -> ScoreCard {
    let sla = 100.0
        * (1.0 - inputs.sla_violations as f64 / (inputs.total_jobs_seen.max(1)) as f64);

    let energy = 100.0 * clamp01(1.0 - (inputs.avg_pue - 1.1) / 0.5);

    let carbon = 100.0
        * clamp01(1.0 - inputs.cumulative_carbon_kg / scenario.reference_carbon_kg(config));

    let thermal = 100.0 * (1.0 - inputs.throttled_tick_fraction);

    let cost =
        100.0 * clamp01(1.0 - inputs.cumulative_cost_gbp / scenario.reference_cost_gbp(config));

    let infra_health =
        100.0 * (inputs.avg_drive_health_pct / 100.0 + inputs.healthy_gpu_fraction) / 2.0;

    let failure_response = if inputs.resolve_times_s.is_empty() {
        100.0
    } else {
        let mttr =
            inputs.resolve_times_s.iter().sum::<f64>() / inputs.resolve_times_s.len() as f64;
        100.0 * clamp01(1.0 - mttr / RESOLVE_BUDGET_S)
    };

    let composite = (W_SLA * sla
        + W_ENERGY * energy
        + W_CARBON * carbon
        + W_THERMAL * thermal
        + W_COST * cost
        + W_INFRA * infra_health
        + W_FAILURE * failure_response)
        / (W_SLA + W_ENERGY + W_CARBON + W_THERMAL + W_COST + W_INFRA + W_FAILURE);

    ScoreCard {
        sla,
        energy,
        carbon,
        thermal,
        cost,
        infra_health,
        failure_response,
        composite,
    }
}

/// Streaming observer folding per-tick snapshots into `ScoreInputs`.
#[derive(Debug, Default)]
pub struct ScoreCollector {
    ticks: u64,
    pue_sum: f64,
    throttled_rack_ticks: u64,
    rack_ticks: u64,
    /// Ordered so resolve-time accumulation is replay-stable
    open_failures: BTreeMap<Uuid, f64>,
    resolve_times_s: Vec<f64>,
    last: Option<FacilityState>,
}

impl ScoreCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, state: &FacilityState) {
        self.ticks += 1;
        self.pue_sum += state.power.pue;
        self.throttled_rack_ticks += u64::from(state.thermal.throttled_racks);
        self.rack_ticks += state.thermal.racks.len() as u64;

        let now = state.clock.time_s;
        let active: HashMap<Uuid, f64> = state
            .active_failures
            .iter()
            .map(|f| (f.id, f.started_at))
            .collect();
        // Anything open that vanished was resolved (or expired) this tick
        let closed: Vec<Uuid> = self
            .open_failures
            .keys()
            .filter(|id| !active.contains_key(id))
            .copied()
            .collect();
        for id in closed {
            if let Some(started) = self.open_failures.remove(&id) {
                self.resolve_times_s.push(now - started);
            }
        }
        for (id, started) in active {
            self.open_failures.entry(id).or_insert(started);
        }

        self.last = Some(state.clone());
    }

    /// Close the books: failures still open count their full age.
    pub fn finalise(mut self) -> ScoreInputs {
        let Some(last) = self.last.take() else {
            return ScoreInputs::default();
        };
        let end = last.clock.time_s;
        for (_, started) in std::mem::take(&mut self.open_failures) {
            self.resolve_times_s.push(end - started);
        }

        ScoreInputs {
            total_jobs_seen: last.workload.total_submitted,
            sla_violations: last.workload.sla_violations,
            avg_pue: self.pue_sum / self.ticks.max(1) as f64,
            cumulative_carbon_kg: last.carbon.cumulative_carbon_kg,
            cumulative_cost_gbp: last.carbon.cumulative_cost_gbp,
            throttled_tick_fraction: if self.rack_ticks == 0 {
                0.0
            } else {
                self.throttled_rack_ticks as f64 / self.rack_ticks as f64
            },
            avg_drive_health_pct: last.storage.avg_drive_health_pct,
            healthy_gpu_fraction: last.gpu.healthy_fraction,
            resolve_times_s: self.resolve_times_s,
        }
    }
}
