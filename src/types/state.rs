//! Per-tick facility snapshot — the immutable telemetry record.
//!
//! A `FacilityState` is assembled once per tick after all models have run,
//! pushed into the telemetry ring, and served verbatim over the API.
//! Everything here serialises to stable JSON; the determinism regression
//! compares these records byte-for-byte across a reset/replay.

use serde::{Deserialize, Serialize};

use super::failure::ActiveFailure;
use super::job::JobSummary;

// ============================================================================
// Clock
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockState {
    pub time_s: f64,
    pub tick: u64,
    /// Simulated hour of day in [0, 24)
    pub hour_of_day: f64,
}

// ============================================================================
// Thermal
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RackThermalState {
    pub rack_id: usize,
    pub zone: usize,
    pub inlet_c: f64,
    pub outlet_c: f64,
    pub humidity_pct: f64,
    pub heat_kw: f64,
    pub cooling_kw: f64,
    pub throttled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalState {
    pub ambient_c: f64,
    pub max_inlet_c: f64,
    pub throttled_racks: u32,
    pub racks: Vec<RackThermalState>,
}

// ============================================================================
// Power
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RackPowerState {
    pub rack_id: usize,
    pub power_kw: f64,
    pub pdu_utilisation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerState {
    pub it_load_kw: f64,
    pub total_facility_kw: f64,
    pub pue: f64,
    pub load_fraction: f64,
    pub headroom_kw: f64,
    pub power_cap_exceeded: bool,
    pub racks: Vec<RackPowerState>,
}

// ============================================================================
// GPU
// ============================================================================

/// Per-server GPU telemetry (GPUs aggregated; worst junction reported).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuServerState {
    pub server_id: String,
    pub rack_id: usize,
    pub utilisation: f64,
    pub max_junction_temp_c: f64,
    pub sm_clock_mhz: f64,
    pub mem_clock_mhz: f64,
    pub thermally_throttled: bool,
    pub degraded: bool,
    pub ecc_errors_total: u64,
    pub pcie_gbps: f64,
    pub nvlink_gbps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuState {
    pub avg_utilisation: f64,
    pub max_junction_temp_c: f64,
    pub thermally_throttled_servers: u32,
    pub ecc_errors_total: u64,
    /// Fraction of servers neither thermally throttled nor degraded
    pub healthy_fraction: f64,
    pub servers: Vec<GpuServerState>,
}

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RackNetworkState {
    pub rack_id: usize,
    pub tor_utilisation: f64,
    pub latency_ms: f64,
    pub packet_loss: f64,
    pub link_up: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpineLinkState {
    pub link_id: usize,
    pub utilisation: f64,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkState {
    pub avg_tor_utilisation: f64,
    pub max_latency_ms: f64,
    pub racks: Vec<RackNetworkState>,
    pub spine_links: Vec<SpineLinkState>,
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RackStorageState {
    pub rack_id: usize,
    pub iops: f64,
    pub queue_depth: f64,
    pub latency_ms: f64,
    pub capacity_tb: f64,
    pub used_tb: f64,
    pub drive_health_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageState {
    pub total_iops: f64,
    pub avg_latency_ms: f64,
    pub avg_drive_health_pct: f64,
    pub racks: Vec<RackStorageState>,
}

// ============================================================================
// Cooling
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CracUnitState {
    pub crac_id: usize,
    pub setpoint_c: f64,
    /// 0.0 failed, 0.5 degraded, 1.0 healthy
    pub health: f64,
    pub cooling_output_kw: f64,
    pub cop: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolingState {
    pub total_cooling_output_kw: f64,
    pub cooling_power_kw: f64,
    pub chw_supply_c: f64,
    pub chw_return_c: f64,
    pub tower_outlet_c: f64,
    pub units: Vec<CracUnitState>,
}

// ============================================================================
// Carbon / cost
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarbonState {
    pub intensity_g_per_kwh: f64,
    pub price_gbp_per_kwh: f64,
    pub cumulative_carbon_kg: f64,
    pub cumulative_cost_gbp: f64,
}

// ============================================================================
// Workload
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadCounts {
    pub queued: usize,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
    pub preempted: u64,
    pub total_submitted: u64,
    pub sla_violations: u64,
    pub gpus_allocated: u32,
    pub gpus_total: u32,
}

// ============================================================================
// Full snapshot
// ============================================================================

/// Immutable per-tick record of the entire facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityState {
    pub clock: ClockState,
    pub thermal: ThermalState,
    pub power: PowerState,
    pub gpu: GpuState,
    pub network: NetworkState,
    pub storage: StorageState,
    pub cooling: CoolingState,
    pub carbon: CarbonState,
    pub workload: WorkloadCounts,
    pub running_jobs: Vec<JobSummary>,
    pub pending_jobs: Vec<JobSummary>,
    pub active_failures: Vec<ActiveFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serialises_to_stable_json() {
        let state = FacilityState {
            clock: ClockState {
                time_s: 60.0,
                tick: 1,
                hour_of_day: 0.016,
            },
            thermal: ThermalState {
                ambient_c: 22.0,
                max_inlet_c: 22.0,
                throttled_racks: 0,
                racks: vec![],
            },
            power: PowerState {
                it_load_kw: 10.0,
                total_facility_kw: 19.0,
                pue: 1.9,
                load_fraction: 0.08,
                headroom_kw: 101.0,
                power_cap_exceeded: false,
                racks: vec![],
            },
            gpu: GpuState {
                avg_utilisation: 0.05,
                max_junction_temp_c: 31.0,
                thermally_throttled_servers: 0,
                ecc_errors_total: 0,
                healthy_fraction: 1.0,
                servers: vec![],
            },
            network: NetworkState {
                avg_tor_utilisation: 0.1,
                max_latency_ms: 0.3,
                racks: vec![],
                spine_links: vec![],
            },
            storage: StorageState {
                total_iops: 0.0,
                avg_latency_ms: 0.5,
                avg_drive_health_pct: 100.0,
                racks: vec![],
            },
            cooling: CoolingState {
                total_cooling_output_kw: 5.0,
                cooling_power_kw: 1.2,
                chw_supply_c: 7.0,
                chw_return_c: 12.0,
                tower_outlet_c: 26.0,
                units: vec![],
            },
            carbon: CarbonState {
                intensity_g_per_kwh: 200.0,
                price_gbp_per_kwh: 0.13,
                cumulative_carbon_kg: 0.1,
                cumulative_cost_gbp: 0.05,
            },
            workload: WorkloadCounts {
                queued: 0,
                running: 0,
                completed: 0,
                failed: 0,
                preempted: 0,
                total_submitted: 0,
                sla_violations: 0,
                gpus_allocated: 0,
                gpus_total: 128,
            },
            running_jobs: vec![],
            pending_jobs: vec![],
            active_failures: vec![],
        };

        let a = serde_json::to_string(&state).unwrap();
        let back: FacilityState = serde_json::from_str(&a).unwrap();
        let b = serde_json::to_string(&back).unwrap();
        assert_eq!(a, b);
    }
}
