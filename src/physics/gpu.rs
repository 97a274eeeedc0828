//! GPU telemetry: junction temperatures, clocks, ECC, bandwidths.
//!
//! Derived from rack inlet temperature and published server utilisation.
//! Read-only downstream of the feedback loop: nothing here influences the
//! next tick.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::config::SimConfig;
use crate::sim::facility::Facility;
use crate::types::{GpuServerState, GpuState};

/// Junction temperature above which a GPU thermally throttles.
pub const JUNCTION_THROTTLE_C: f64 = 83.0;

/// Junction temperature above which ECC error rates triple.
pub const ECC_HOT_THRESHOLD_C: f64 = 85.0;

/// Per-GPU probability of an ECC error per tick.
pub const ECC_BASE_RATE: f64 = 1e-7;

/// Clock reduction factor under thermal throttle.
pub const THROTTLE_CLOCK_FACTOR: f64 = 0.6;

const SM_CLOCK_MAX_MHZ: f64 = 1980.0;
const MEM_CLOCK_MHZ: f64 = 2619.0;
const PCIE_MAX_GBPS: f64 = 64.0;
const NVLINK_MAX_GBPS: f64 = 900.0;

/// Per-GPU cumulative ECC counters plus the latest per-server rollup.
#[derive(Debug, Clone)]
pub struct GpuModel {
    /// Rack-major, server-major, GPU index last
    ecc_errors: Vec<u64>,
    gpus_per_server: u32,
    pub state: GpuState,
}

impl GpuModel {
    pub fn new(config: &SimConfig) -> Self {
        let num_gpus = config.facility.total_gpus() as usize;
        Self {
            ecc_errors: vec![0; num_gpus],
            gpus_per_server: config.facility.gpus_per_server,
            state: GpuState {
                avg_utilisation: 0.0,
                max_junction_temp_c: 0.0,
                thermally_throttled_servers: 0,
                ecc_errors_total: 0,
                healthy_fraction: 1.0,
                servers: Vec::new(),
            },
        }
    }

    pub fn update(&mut self, facility: &Facility, rng: &mut StdRng) {
        let mut servers = Vec::with_capacity(facility.servers.len());
        let mut throttled_servers = 0u32;
        let mut healthy = 0usize;
        let mut max_junction = f64::MIN;
        let mut util_sum = 0.0;

        for (si, server) in facility.servers.iter().enumerate() {
            let inlet = facility.racks[server.rack].inlet_c;
            let mut server_max_junction = f64::MIN;
            let mut server_throttled = false;
            let mut server_ecc = 0u64;

            for gi in 0..self.gpus_per_server as usize {
                let noise: f64 = rng.sample(StandardNormal);
                let junction = inlet + 5.0 + 70.0 * server.util + noise;
                server_max_junction = server_max_junction.max(junction);
                if junction > JUNCTION_THROTTLE_C {
                    server_throttled = true;
                }

                let rate = if junction > ECC_HOT_THRESHOLD_C {
                    ECC_BASE_RATE * 3.0
                } else {
                    ECC_BASE_RATE
                };
                let idx = si * self.gpus_per_server as usize + gi;
                if rng.gen::<f64>() < rate {
                    self.ecc_errors[idx] += 1;
                }
                server_ecc += self.ecc_errors[idx];
            }

            let clock_factor = if server_throttled {
                THROTTLE_CLOCK_FACTOR
            } else {
                1.0
            };
            if server_throttled {
                throttled_servers += 1;
            }
            if !server_throttled && !server.degraded {
                healthy += 1;
            }
            max_junction = max_junction.max(server_max_junction);
            util_sum += server.util;

            servers.push(GpuServerState {
                server_id: server.id(),
                rack_id: server.rack,
                utilisation: server.util,
                max_junction_temp_c: server_max_junction,
                sm_clock_mhz: SM_CLOCK_MAX_MHZ * clock_factor,
                mem_clock_mhz: MEM_CLOCK_MHZ * clock_factor,
                thermally_throttled: server_throttled,
                degraded: server.degraded,
                ecc_errors_total: server_ecc,
                pcie_gbps: PCIE_MAX_GBPS * server.util,
                nvlink_gbps: NVLINK_MAX_GBPS * server.util,
            });
        }

        let n = facility.servers.len().max(1);
        self.state = GpuState {
            avg_utilisation: util_sum / n as f64,
            max_junction_temp_c: max_junction,
            thermally_throttled_servers: throttled_servers,
            ecc_errors_total: self.ecc_errors.iter().sum(),
            healthy_fraction: healthy as f64 / n as f64,
            servers,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn setup() -> (GpuModel, Facility, StdRng) {
        let cfg = SimConfig::default();
        (
            GpuModel::new(&cfg),
            Facility::new(&cfg),
            StdRng::seed_from_u64(42),
        )
    }

    #[test]
    fn test_idle_gpus_run_cool() {
        let (mut gpu, fac, mut rng) = setup();
        gpu.update(&fac, &mut rng);
        // inlet 22 + 5 + 70*0 + noise: nowhere near the throttle point
        assert_eq!(gpu.state.thermally_throttled_servers, 0);
        assert!((gpu.state.healthy_fraction - 1.0).abs() < 1e-12);
        assert!(gpu.state.max_junction_temp_c < 40.0);
        for s in &gpu.state.servers {
            assert!((s.sm_clock_mhz - SM_CLOCK_MAX_MHZ).abs() < 1e-9);
        }
    }

    #[test]
    fn test_hot_rack_throttles_and_degrades_clocks() {
        let (mut gpu, mut fac, mut rng) = setup();
        fac.racks[0].inlet_c = 45.0;
        for i in fac.rack_server_range(0) {
            fac.servers[i].util = 0.9;
        }
        gpu.update(&fac, &mut rng);

        // junction ~= 45 + 5 + 63 = 113
        let s0 = &gpu.state.servers[0];
        assert!(s0.thermally_throttled);
        assert!((s0.sm_clock_mhz - SM_CLOCK_MAX_MHZ * THROTTLE_CLOCK_FACTOR).abs() < 1e-9);
        assert!(gpu.state.thermally_throttled_servers >= 4);
        assert!(gpu.state.healthy_fraction < 1.0);
    }

    #[test]
    fn test_bandwidth_tracks_utilisation() {
        let (mut gpu, mut fac, mut rng) = setup();
        fac.servers[0].util = 0.5;
        gpu.update(&fac, &mut rng);
        let s0 = &gpu.state.servers[0];
        assert!((s0.pcie_gbps - 32.0).abs() < 1e-9);
        assert!((s0.nvlink_gbps - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_deterministic() {
        let cfg = SimConfig::default();
        let fac = Facility::new(&cfg);
        let mut a = GpuModel::new(&cfg);
        let mut b = GpuModel::new(&cfg);
        let mut ra = StdRng::seed_from_u64(7);
        let mut rb = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            a.update(&fac, &mut ra);
            b.update(&fac, &mut rb);
        }
        assert_eq!(a.state.max_junction_temp_c, b.state.max_junction_temp_c);
        assert_eq!(a.state.ecc_errors_total, b.state.ecc_errors_total);
    }
}
