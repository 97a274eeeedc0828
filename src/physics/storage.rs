//! Storage telemetry: per-rack IOPS, queue-depth latency, capacity, wear.
//!
//! IOPS demand is derived from the jobs running on each rack's servers.
//! Queue depth follows Little's Law (`depth = arrival_rate * service_time`)
//! and latency grows with depth relative to the device ceiling. Writes
//! slowly consume capacity and drive health.

use crate::sim::facility::Facility;
use crate::sim::workload::WorkloadModel;
use crate::types::{JobType, RackStorageState, StorageState};

/// Raw flash capacity per rack.
pub const CAPACITY_TB_PER_RACK: f64 = 100.0;

/// Unloaded storage latency.
pub const BASE_LATENCY_MS: f64 = 0.5;

/// Queue depth ceiling of the device.
pub const MAX_QUEUE_DEPTH: f64 = 64.0;

/// Background IOPS per server (logs, metrics, OS).
pub const BASE_IOPS_PER_SERVER: f64 = 50.0;

/// Fraction of IOPS that are writes.
const WRITE_FRACTION: f64 = 0.2;

/// Mean IO size for capacity accounting (64 KiB in GB).
const IO_SIZE_GB: f64 = 65_536.0 / 1.0e9;

/// Drive health lost per written GB (percent).
const WEAR_PCT_PER_GB: f64 = 2.0e-5;

/// Storage IOPS one GPU of the given job type drives.
pub fn iops_per_gpu(job_type: JobType) -> f64 {
    match job_type {
        // Periodic checkpoint and shard reads
        JobType::Training => 600.0,
        // Many small model/feature fetches
        JobType::Inference => 2000.0,
        // Streaming scans
        JobType::Batch => 1200.0,
    }
}

#[derive(Debug, Clone)]
pub struct StorageModel {
    used_tb: Vec<f64>,
    health_pct: Vec<f64>,
    pub state: StorageState,
}

impl StorageModel {
    pub fn new(num_racks: usize) -> Self {
        Self {
            used_tb: vec![0.0; num_racks],
            health_pct: vec![100.0; num_racks],
            state: StorageState {
                total_iops: 0.0,
                avg_latency_ms: BASE_LATENCY_MS,
                avg_drive_health_pct: 100.0,
                racks: Vec::new(),
            },
        }
    }

    pub fn update(
        &mut self,
        facility: &Facility,
        workload: &WorkloadModel,
        tick_interval_s: f64,
    ) {
        // Demand per rack from running jobs' GPU placement
        let mut demand = vec![0.0f64; facility.racks.len()];
        for job in &workload.running {
            for a in &job.assigned {
                let rack = facility.servers[a.server].rack;
                demand[rack] += f64::from(a.gpus) * iops_per_gpu(job.job_type);
            }
        }

        let mut racks = Vec::with_capacity(facility.racks.len());
        let mut total_iops = 0.0;
        let mut latency_sum = 0.0;
        let mut health_sum = 0.0;

        for (rack_id, rack_demand) in demand.iter().enumerate() {
            let iops = rack_demand + BASE_IOPS_PER_SERVER * facility.servers_per_rack as f64;
            // Little's Law with the unloaded service time
            let queue_depth = (iops * BASE_LATENCY_MS / 1000.0).min(MAX_QUEUE_DEPTH);
            let latency = BASE_LATENCY_MS * (1.0 + 0.5 * queue_depth / MAX_QUEUE_DEPTH);

            let written_gb = iops * WRITE_FRACTION * IO_SIZE_GB * tick_interval_s;
            self.used_tb[rack_id] =
                (self.used_tb[rack_id] + written_gb / 1000.0).min(CAPACITY_TB_PER_RACK);
            self.health_pct[rack_id] =
                (self.health_pct[rack_id] - written_gb * WEAR_PCT_PER_GB).max(0.0);

            total_iops += iops;
            latency_sum += latency;
            health_sum += self.health_pct[rack_id];

            racks.push(RackStorageState {
                rack_id,
                iops,
                queue_depth,
                latency_ms: latency,
                capacity_tb: CAPACITY_TB_PER_RACK,
                used_tb: self.used_tb[rack_id],
                drive_health_pct: self.health_pct[rack_id],
            });
        }

        let n = facility.racks.len().max(1) as f64;
        self.state = StorageState {
            total_iops,
            avg_latency_ms: latency_sum / n,
            avg_drive_health_pct: health_sum / n,
            racks,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::sim::failures::FailureEngine;
    use crate::types::{JobSpec, JobType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn busy_setup() -> (StorageModel, Facility, WorkloadModel) {
        let cfg = SimConfig::default();
        let mut fac = Facility::new(&cfg);
        let mut wl = WorkloadModel::new(f64::INFINITY, 42);
        let mut eng = FailureEngine::new(42);
        let mut rng = StdRng::seed_from_u64(42);
        wl.submit(
            JobSpec {
                name: None,
                job_type: JobType::Inference,
                gpus_required: 4,
                priority: Some(5),
                duration_s: 7200.0,
                sla_deadline_s: None,
                target_util: None,
            },
            0.0,
        )
        .unwrap();
        wl.tick(60.0, 60.0, &mut fac, &mut eng, &mut rng);
        (StorageModel::new(cfg.facility.num_racks), fac, wl)
    }

    #[test]
    fn test_iops_follow_placement() {
        let (mut storage, fac, wl) = busy_setup();
        storage.update(&fac, &wl, 60.0);

        let r0 = &storage.state.racks[0];
        // 4 inference GPUs on rack 0 plus the per-server background floor
        assert!((r0.iops - (4.0 * 2000.0 + 200.0)).abs() < 1e-9);
        let r1 = &storage.state.racks[1];
        assert!((r1.iops - 200.0).abs() < 1e-9);
        assert!(r0.latency_ms > r1.latency_ms);
    }

    #[test]
    fn test_littles_law_queue_depth() {
        let (mut storage, fac, wl) = busy_setup();
        storage.update(&fac, &wl, 60.0);
        let r0 = &storage.state.racks[0];
        assert!((r0.queue_depth - r0.iops * BASE_LATENCY_MS / 1000.0).abs() < 1e-9);
        assert!(
            (r0.latency_ms
                - BASE_LATENCY_MS * (1.0 + 0.5 * r0.queue_depth / MAX_QUEUE_DEPTH))
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_wear_accumulates_monotonically() {
        let (mut storage, fac, wl) = busy_setup();
        storage.update(&fac, &wl, 60.0);
        let h1 = storage.state.racks[0].drive_health_pct;
        let u1 = storage.state.racks[0].used_tb;
        for _ in 0..100 {
            storage.update(&fac, &wl, 60.0);
        }
        let h2 = storage.state.racks[0].drive_health_pct;
        let u2 = storage.state.racks[0].used_tb;
        assert!(h2 < h1);
        assert!(h2 > 99.0, "wear must be slow: {h2}");
        assert!(u2 > u1);
        assert!(u2 <= CAPACITY_TB_PER_RACK);
    }
}
