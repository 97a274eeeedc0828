//! Network telemetry: ToR utilisation, M/M/1 latency, loss, spine links.
//!
//! ToR load tracks the rack's GPU activity; latency follows the single-queue
//! M/M/1 form `base / (1 - u)` and loss stays zero until 80% utilisation,
//! then grows quadratically. A rack under network partition reports its
//! link down for the tick the partition is active.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::sim::facility::Facility;
use crate::sim::failures::FailureEngine;
use crate::types::{NetworkState, RackNetworkState, SpineLinkState};

/// Unloaded ToR switch latency.
pub const TOR_BASE_LATENCY_MS: f64 = 0.2;

/// Unloaded spine hop latency.
pub const SPINE_BASE_LATENCY_MS: f64 = 0.4;

/// Fraction of ToR traffic crossing the spine.
pub const SPINE_OVERSUBSCRIPTION: f64 = 0.6;

/// Utilisation knee above which packet loss appears.
pub const LOSS_KNEE: f64 = 0.8;

/// M/M/1 latency at the given utilisation.
pub fn queue_latency_ms(base_ms: f64, util: f64) -> f64 {
    base_ms / (1.0 - util).max(0.01)
}

/// Quadratic loss above the knee, zero below it.
pub fn packet_loss(util: f64) -> f64 {
    if util < LOSS_KNEE {
        0.0
    } else {
        0.5 * ((util - LOSS_KNEE) / (1.0 - LOSS_KNEE)).powi(2)
    }
}

#[derive(Debug, Clone)]
pub struct NetworkModel {
    num_spine_links: usize,
    pub state: NetworkState,
}

impl NetworkModel {
    pub fn new(num_racks: usize) -> Self {
        Self {
            num_spine_links: (num_racks / 2).max(2),
            state: NetworkState {
                avg_tor_utilisation: 0.0,
                max_latency_ms: 0.0,
                racks: Vec::new(),
                spine_links: Vec::new(),
            },
        }
    }

    pub fn update(&mut self, facility: &Facility, failures: &FailureEngine, rng: &mut StdRng) {
        let partitioned = failures.partitioned_racks();
        let mut racks = Vec::with_capacity(facility.racks.len());
        let mut util_sum = 0.0;
        let mut max_latency: f64 = 0.0;

        for rack in &facility.racks {
            if partitioned.contains(&rack.id) {
                racks.push(RackNetworkState {
                    rack_id: rack.id,
                    tor_utilisation: 0.0,
                    latency_ms: 0.0,
                    packet_loss: 1.0,
                    link_up: false,
                });
                continue;
            }

            let noise: f64 = rng.sample::<f64, _>(StandardNormal) * 0.01;
            let util = (0.05 + 0.65 * facility.rack_avg_util(rack.id) + noise).clamp(0.0, 0.99);
            let latency = queue_latency_ms(TOR_BASE_LATENCY_MS, util);
            util_sum += util;
            max_latency = max_latency.max(latency);

            racks.push(RackNetworkState {
                rack_id: rack.id,
                tor_utilisation: util,
                latency_ms: latency,
                packet_loss: packet_loss(util),
                link_up: true,
            });
        }

        let up_racks = racks.iter().filter(|r| r.link_up).count().max(1);
        let avg_tor = util_sum / up_racks as f64;

        let spine_links = (0..self.num_spine_links)
            .map(|link_id| {
                let noise: f64 = rng.sample::<f64, _>(StandardNormal) * 0.005;
                let util = (avg_tor * SPINE_OVERSUBSCRIPTION + noise).clamp(0.0, 0.99);
                let latency = queue_latency_ms(SPINE_BASE_LATENCY_MS, util);
                max_latency = max_latency.max(latency);
                SpineLinkState {
                    link_id,
                    utilisation: util,
                    latency_ms: latency,
                }
            })
            .collect();

        self.state = NetworkState {
            avg_tor_utilisation: avg_tor,
            max_latency_ms: max_latency,
            racks,
            spine_links,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::types::FailureType;
    use rand::SeedableRng;

    #[test]
    fn test_latency_formula() {
        assert!((queue_latency_ms(0.2, 0.0) - 0.2).abs() < 1e-12);
        assert!((queue_latency_ms(0.2, 0.5) - 0.4).abs() < 1e-12);
        // Denominator floored at 0.01
        assert!((queue_latency_ms(0.2, 1.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_loss_zero_below_knee_quadratic_above() {
        assert_eq!(packet_loss(0.0), 0.0);
        assert_eq!(packet_loss(0.79), 0.0);
        assert!((packet_loss(0.9) - 0.125).abs() < 1e-12);
        assert!((packet_loss(1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_partitioned_rack_reports_link_down() {
        let cfg = SimConfig::default();
        let fac = Facility::new(&cfg);
        let mut eng = FailureEngine::new(42);
        let mut net = NetworkModel::new(cfg.facility.num_racks);
        let mut rng = StdRng::seed_from_u64(42);

        eng.inject(FailureType::NetworkPartition, "rack-3", None, 0.0, &cfg)
            .unwrap();
        net.update(&fac, &eng, &mut rng);

        let r3 = &net.state.racks[3];
        assert!(!r3.link_up);
        assert_eq!(r3.packet_loss, 1.0);
        assert!(net.state.racks[0].link_up);
    }

    #[test]
    fn test_busy_racks_raise_latency() {
        let cfg = SimConfig::default();
        let mut fac = Facility::new(&cfg);
        let eng = FailureEngine::new(42);
        let mut net = NetworkModel::new(cfg.facility.num_racks);
        let mut rng = StdRng::seed_from_u64(42);

        net.update(&fac, &eng, &mut rng);
        let idle_latency = net.state.racks[0].latency_ms;

        for s in &mut fac.servers {
            s.util = 1.0;
        }
        net.update(&fac, &eng, &mut rng);
        assert!(net.state.racks[0].latency_ms > idle_latency);
        assert!(net.state.avg_tor_utilisation > 0.5);
    }
}
