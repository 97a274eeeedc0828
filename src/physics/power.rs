//! Electrical model: per-server draw, rack rollups, dynamic PUE.
//!
//! The GPU power curve is deliberately non-linear (`0.3u + 0.7u²` above the
//! idle floor): memory and interconnect draw scale roughly linearly while
//! core switching scales with the square of activity. PUE worsens at low
//! load and high ambient, matching measured facility behaviour.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::SimConfig;
use crate::sim::facility::Facility;
use crate::sim::failures::FailureEngine;

/// Idle fraction of TDP drawn by an unused GPU.
pub const GPU_IDLE_FRACTION: f64 = 0.05;

/// GPU power as a fraction of TDP at the given utilisation.
pub fn gpu_power_curve(util: f64) -> f64 {
    let u = util.clamp(0.0, 1.0);
    GPU_IDLE_FRACTION + (1.0 - GPU_IDLE_FRACTION) * (0.3 * u + 0.7 * u * u)
}

/// Electrical draw of one server at the given published utilisation.
pub fn server_power_w(util: f64, num_gpus: u32, config: &SimConfig) -> f64 {
    config.power.server_base_power_watts
        + f64::from(num_gpus) * gpu_power_curve(util) * config.power.gpu_tdp_watts
}

/// Facility-level electrical summary for the current tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PowerSummary {
    pub it_load_kw: f64,
    pub total_facility_kw: f64,
    pub pue: f64,
    pub load_fraction: f64,
    pub headroom_kw: f64,
    pub power_cap_exceeded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PowerModel {
    pub summary: PowerSummary,
}

impl PowerModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute server/rack/facility power from published utilisation.
    /// Writes `power_w` onto servers and `power_kw`/`pdu_utilisation`/
    /// `heat_kw` onto racks.
    pub fn update(
        &mut self,
        facility: &mut Facility,
        failures: &FailureEngine,
        config: &SimConfig,
        ambient_c: f64,
    ) {
        for server in &mut facility.servers {
            server.power_w = server_power_w(server.util, server.total_slots, config);
        }

        let mut it_kw: f64 = 0.0;
        for rack in &mut facility.racks {
            let rack_w: f64 = (rack.id * facility.servers_per_rack
                ..(rack.id + 1) * facility.servers_per_rack)
                .map(|i| facility.servers[i].power_w)
                .sum();
            let rack_kw = rack_w / 1000.0 * failures.pdu_multiplier(rack.id);
            rack.power_kw = rack_kw;
            // All IT power leaves the rack as heat
            rack.heat_kw = rack_kw;
            rack.pdu_utilisation = rack_kw / config.power.pdu_capacity_kw;
            it_kw += rack_kw;
        }

        let cap = config.power.facility_power_cap_kw;
        if !it_kw.is_finite() {
            error!("Non-finite IT load computed - clamping to the facility cap");
            it_kw = cap;
        }
        let load_fraction = (it_kw / cap).clamp(0.0, 1.0);
        let base = config.power.pue_overhead_factor;
        let pue = (base * (1.0 + 0.4 * (1.0 - load_fraction))
            + 0.005 * (ambient_c - 22.0).max(0.0))
        .clamp(base, base * 1.6);

        let total = it_kw * pue;
        self.summary = PowerSummary {
            it_load_kw: it_kw,
            total_facility_kw: total,
            pue,
            load_fraction,
            headroom_kw: cap - total,
            power_cap_exceeded: cap - total < 0.0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::sim::failures::FailureEngine;
    use crate::types::FailureType;

    #[test]
    fn test_power_curve_boundaries() {
        // Idle floor at u = 0
        assert!((gpu_power_curve(0.0) - GPU_IDLE_FRACTION).abs() < 1e-12);
        // Full TDP at u = 1
        assert!((gpu_power_curve(1.0) - 1.0).abs() < 1e-12);
        // Monotonic
        assert!(gpu_power_curve(0.5) > gpu_power_curve(0.2));
    }

    #[test]
    fn test_server_power_boundaries() {
        let cfg = SimConfig::default();
        // u = 0: base + gpus * idle_frac * tdp = 200 + 4 * 15 = 260
        assert!((server_power_w(0.0, 4, &cfg) - 260.0).abs() < 1e-9);
        // u = 1: base + gpus * tdp = 200 + 1200 = 1400
        assert!((server_power_w(1.0, 4, &cfg) - 1400.0).abs() < 1e-9);
    }

    #[test]
    fn test_pue_clamped_and_load_sensitive() {
        let cfg = SimConfig::default();
        let eng = FailureEngine::new(42);
        let mut facility = Facility::new(&cfg);
        let mut model = PowerModel::new();

        // Zero load: PUE at the high end (1.4 * 1.4 = 1.96)
        model.update(&mut facility, &eng, &cfg, 22.0);
        assert!((model.summary.pue - 1.96).abs() < 1e-9);
        assert!(model.summary.pue <= cfg.power.pue_overhead_factor * 1.6);

        // Full load: PUE approaches base
        for s in &mut facility.servers {
            s.util = 1.0;
        }
        model.update(&mut facility, &eng, &cfg, 22.0);
        assert!(model.summary.pue < 1.96);
        assert!(model.summary.pue >= cfg.power.pue_overhead_factor);
    }

    #[test]
    fn test_pdu_spike_multiplies_rack_power() {
        let cfg = SimConfig::default();
        let mut eng = FailureEngine::new(42);
        let mut facility = Facility::new(&cfg);
        let mut model = PowerModel::new();

        model.update(&mut facility, &eng, &cfg, 22.0);
        let baseline = facility.racks[0].power_kw;

        eng.inject(FailureType::PduSpike, "rack-0", None, 0.0, &cfg)
            .unwrap();
        model.update(&mut facility, &eng, &cfg, 22.0);
        assert!((facility.racks[0].power_kw - baseline * 1.2).abs() < 1e-9);
        assert!((facility.racks[1].power_kw - baseline).abs() < 1e-9);
    }

    #[test]
    fn test_headroom_sign() {
        let cfg = SimConfig::default();
        let eng = FailureEngine::new(42);
        let mut facility = Facility::new(&cfg);
        let mut model = PowerModel::new();

        model.update(&mut facility, &eng, &cfg, 22.0);
        assert!(!model.summary.power_cap_exceeded);
        assert!(model.summary.headroom_kw > 0.0);

        for s in &mut facility.servers {
            s.util = 1.0;
        }
        model.update(&mut facility, &eng, &cfg, 22.0);
        // 32 servers * 1.4 kW = 44.8 kW IT; * PUE < 120 kW cap, so still positive
        assert!(model.summary.headroom_kw > 0.0);
        let exceeded = model.summary.total_facility_kw > cfg.power.facility_power_cap_kw;
        assert_eq!(model.summary.power_cap_exceeded, exceeded);
    }
}
