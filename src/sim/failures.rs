//! Failure engine: random injection, manual inject/resolve, expiry.
//!
//! Failures are scoped effects consumed by the other models each tick:
//! CRAC health multiplies cooling capacity, pdu_spike multiplies rack
//! power, gpu_degraded caps server utilisation, network_partition fails
//! every job on the rack exactly once. The active set is a `Vec` in
//! injection order so iteration is deterministic under replay.

use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::errors::SimError;
use crate::sim::ids;
use crate::types::{ActiveFailure, FailureTarget, FailureType};

/// Default per-rack random injection probability per tick.
pub const DEFAULT_RANDOM_RATE: f64 = 0.005;

/// Rack power multiplier carried by pdu_spike.
pub const PDU_SPIKE_MULTIPLIER: f64 = 1.2;

/// Utilisation cap imposed by gpu_degraded.
pub const GPU_DEGRADED_UTIL_CAP: f64 = 0.3;

/// Failure kinds eligible for random injection.
const RANDOM_KINDS: [FailureType; 3] = [
    FailureType::CracDegraded,
    FailureType::PduSpike,
    FailureType::NetworkPartition,
];

#[derive(Debug, Clone, Error)]
pub enum FailureError {
    #[error("invalid failure target: {0}")]
    InvalidTarget(String),

    #[error("unknown failure: {0}")]
    Unknown(String),

    #[error("duplicate active failure: {0} on {1}")]
    Duplicate(FailureType, FailureTarget),
}

impl From<FailureError> for SimError {
    fn from(e: FailureError) -> Self {
        match e {
            FailureError::InvalidTarget(_) => SimError::InvalidArgument(e.to_string()),
            FailureError::Unknown(_) => SimError::NotFound(e.to_string()),
            FailureError::Duplicate(..) => SimError::Conflict(e.to_string()),
        }
    }
}

/// Active failure set plus the stochastic injector.
#[derive(Debug, Clone)]
pub struct FailureEngine {
    active: Vec<ActiveFailure>,
    /// Per-rack random injection probability per tick
    pub random_rate: f64,
    seed: u64,
    manual_seq: u64,
}

impl FailureEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            active: Vec::new(),
            random_rate: DEFAULT_RANDOM_RATE,
            seed,
            manual_seq: 0,
        }
    }

    // ------------------------------------------------------------------
    // Per-tick processing
    // ------------------------------------------------------------------

    /// Expire timed-out failures, then roll for random injections.
    pub fn tick(&mut self, now: f64, config: &SimConfig, rng: &mut StdRng) {
        self.expire(now);
        self.inject_random(now, config, rng);
    }

    fn expire(&mut self, now: f64) {
        self.active.retain(|f| {
            let gone = match f.failure_type {
                // One-shot: lives exactly until the workload pass applied it
                FailureType::NetworkPartition => f.applied,
                _ => f.expires_at.is_some_and(|exp| exp <= now),
            };
            if gone {
                debug!(failure_id = %f.id, failure_type = %f.failure_type, target = %f.target, "Failure expired");
            }
            !gone
        });
    }

    fn inject_random(&mut self, now: f64, config: &SimConfig, rng: &mut StdRng) {
        for rack in 0..config.facility.num_racks {
            if rng.gen::<f64>() >= self.random_rate {
                continue;
            }
            let kind = RANDOM_KINDS[rng.gen_range(0..RANDOM_KINDS.len())];
            let target = match kind {
                FailureType::CracDegraded => FailureTarget::Crac(config.zone_of_rack(rack)),
                _ => FailureTarget::Rack(rack),
            };
            if self.is_active(kind, target) {
                continue;
            }
            let expires_at = match kind {
                FailureType::CracDegraded => Some(now + rng.gen_range(600.0..1800.0)),
                FailureType::PduSpike => Some(now + 300.0),
                FailureType::NetworkPartition => Some(now),
                // Not in RANDOM_KINDS
                FailureType::CracFailure | FailureType::GpuDegraded => None,
            };
            let id = ids::uuid_from_rng(rng);
            info!(failure_id = %id, failure_type = %kind, target = %target, "Random failure injected");
            self.active.push(ActiveFailure {
                id,
                failure_type: kind,
                target,
                started_at: now,
                expires_at,
                power_multiplier: (kind == FailureType::PduSpike).then_some(PDU_SPIKE_MULTIPLIER),
                applied: false,
            });
        }
    }

    // ------------------------------------------------------------------
    // Manual operations
    // ------------------------------------------------------------------

    /// Inject a failure deterministically. Unspecified durations use the
    /// per-type defaults (midpoint of the random ranges) rather than a
    /// random draw, so manual injection never perturbs the tick stream.
    pub fn inject(
        &mut self,
        kind: FailureType,
        target_str: &str,
        duration_s: Option<f64>,
        now: f64,
        config: &SimConfig,
    ) -> Result<Uuid, FailureError> {
        let target = FailureTarget::parse(target_str)
            .ok_or_else(|| FailureError::InvalidTarget(target_str.to_string()))?;
        self.check_target(kind, target, config)
            .map_err(|_| FailureError::InvalidTarget(target_str.to_string()))?;

        if self.is_active(kind, target) {
            return Err(FailureError::Duplicate(kind, target));
        }

        let expires_at = match kind {
            FailureType::NetworkPartition => Some(now),
            FailureType::GpuDegraded => duration_s.map(|d| now + d),
            FailureType::CracDegraded => Some(now + duration_s.unwrap_or(1200.0)),
            FailureType::CracFailure => Some(now + duration_s.unwrap_or(600.0)),
            FailureType::PduSpike => Some(now + duration_s.unwrap_or(300.0)),
        };

        let id = ids::uuid_from_seq(self.seed, self.manual_seq);
        self.manual_seq += 1;

        info!(failure_id = %id, failure_type = %kind, target = %target, "Failure injected");
        self.active.push(ActiveFailure {
            id,
            failure_type: kind,
            target,
            started_at: now,
            expires_at,
            power_multiplier: (kind == FailureType::PduSpike).then_some(PDU_SPIKE_MULTIPLIER),
            applied: false,
        });
        Ok(id)
    }

    /// Remove one failure by id.
    pub fn resolve(&mut self, id_str: &str) -> Result<ActiveFailure, FailureError> {
        let id =
            Uuid::parse_str(id_str).map_err(|_| FailureError::Unknown(id_str.to_string()))?;
        let pos = self
            .active
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| FailureError::Unknown(id_str.to_string()))?;
        let failure = self.active.remove(pos);
        info!(failure_id = %failure.id, failure_type = %failure.failure_type, "Failure resolved");
        Ok(failure)
    }

    fn check_target(
        &self,
        kind: FailureType,
        target: FailureTarget,
        config: &SimConfig,
    ) -> Result<(), ()> {
        let shape_ok = matches!(
            (kind, target),
            (FailureType::CracDegraded | FailureType::CracFailure, FailureTarget::Crac(_))
                | (FailureType::GpuDegraded, FailureTarget::Server { .. })
                | (
                    FailureType::PduSpike | FailureType::NetworkPartition,
                    FailureTarget::Rack(_)
                )
        );
        if !shape_ok {
            return Err(());
        }
        let bounds_ok = match target {
            FailureTarget::Rack(r) => r < config.facility.num_racks,
            FailureTarget::Crac(u) => u < config.thermal.crac_units,
            FailureTarget::Server { rack, srv } => {
                rack < config.facility.num_racks && srv < config.facility.servers_per_rack
            }
        };
        if bounds_ok {
            Ok(())
        } else {
            Err(())
        }
    }

    // ------------------------------------------------------------------
    // Effect queries
    // ------------------------------------------------------------------

    pub fn is_active(&self, kind: FailureType, target: FailureTarget) -> bool {
        self.active
            .iter()
            .any(|f| f.failure_type == kind && f.target == target)
    }

    /// CRAC capacity multiplier for a zone: 0.0 failed, 0.5 degraded, 1.0 healthy.
    pub fn crac_health(&self, zone: usize) -> f64 {
        let mut health: f64 = 1.0;
        for f in &self.active {
            if f.target == FailureTarget::Crac(zone) {
                let m = match f.failure_type {
                    FailureType::CracFailure => 0.0,
                    FailureType::CracDegraded => 0.5,
                    _ => 1.0,
                };
                health = health.min(m);
            }
        }
        health
    }

    /// Rack power multiplier from any active pdu_spike.
    pub fn pdu_multiplier(&self, rack: usize) -> f64 {
        self.active
            .iter()
            .find(|f| {
                f.failure_type == FailureType::PduSpike && f.target == FailureTarget::Rack(rack)
            })
            .and_then(|f| f.power_multiplier)
            .unwrap_or(1.0)
    }

    pub fn is_server_degraded(&self, rack: usize, srv: usize) -> bool {
        self.is_active(FailureType::GpuDegraded, FailureTarget::Server { rack, srv })
    }

    /// Racks with an active network_partition (applied or not).
    pub fn partitioned_racks(&self) -> Vec<usize> {
        self.active
            .iter()
            .filter(|f| f.failure_type == FailureType::NetworkPartition)
            .filter_map(|f| f.target.rack())
            .collect()
    }

    /// Racks whose partition has not yet failed its jobs; marks them applied.
    pub fn take_unapplied_partitions(&mut self) -> Vec<usize> {
        let mut racks = Vec::new();
        for f in &mut self.active {
            if f.failure_type == FailureType::NetworkPartition && !f.applied {
                f.applied = true;
                if let Some(rack) = f.target.rack() {
                    racks.push(rack);
                }
            }
        }
        racks
    }

    pub fn get_active(&self) -> Vec<ActiveFailure> {
        self.active.clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
