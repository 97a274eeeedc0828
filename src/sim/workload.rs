//! Workload model: arrivals, first-fit priority scheduling, job lifecycle.
//!
//! Per tick, in order: Poisson arrivals, partition-failure application,
//! scheduling, duration-based completion, SLA bookkeeping, utilisation
//! publication. The pending queue keeps insertion order; priority is a
//! sort key applied at scheduling time only.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::SimError;
use crate::sim::facility::Facility;
use crate::sim::failures::{FailureEngine, GPU_DEGRADED_UTIL_CAP};
use crate::sim::ids;
use crate::types::{Job, JobSpec, JobStatus, JobSummary, JobType, ServerAssignment};

/// Baseline utilisation of an idle GPU slot.
pub const IDLE_FRACTION: f64 = 0.05;

/// Utilisation cap on servers in a thermally throttled rack.
pub const THROTTLE_UTIL_CAP: f64 = 0.5;

/// Completed-job ring retention.
pub const COMPLETED_RETENTION: usize = 1000;

#[derive(Debug, Clone, Error)]
pub enum WorkloadError {
    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("job {0} is not running")]
    JobNotRunning(String),

    #[error("insufficient capacity on rack {rack} for {gpus} GPUs")]
    InsufficientCapacity { rack: usize, gpus: u32 },

    #[error("invalid job spec: {0}")]
    InvalidSpec(String),
}

impl From<WorkloadError> for SimError {
    fn from(e: WorkloadError) -> Self {
        match e {
            WorkloadError::UnknownJob(_) => SimError::NotFound(e.to_string()),
            WorkloadError::JobNotRunning(_) | WorkloadError::InsufficientCapacity { .. } => {
                SimError::Conflict(e.to_string())
            }
            WorkloadError::InvalidSpec(_) => SimError::InvalidArgument(e.to_string()),
        }
    }
}

/// Job queues plus lifetime counters.
#[derive(Debug, Clone)]
pub struct WorkloadModel {
    pub pending: Vec<Job>,
    pub running: Vec<Job>,
    pub completed: VecDeque<Job>,
    /// Mean seconds between arrivals (scenario-overridable)
    pub mean_arrival_interval_s: f64,
    pub total_submitted: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_preempted: u64,
    pub sla_violations: u64,
    job_seq: u64,
    seed: u64,
    manual_seq: u64,
}

impl WorkloadModel {
    pub fn new(mean_arrival_interval_s: f64, seed: u64) -> Self {
        Self {
            pending: Vec::new(),
            running: Vec::new(),
            completed: VecDeque::with_capacity(COMPLETED_RETENTION),
            mean_arrival_interval_s,
            total_submitted: 0,
            total_completed: 0,
            total_failed: 0,
            total_preempted: 0,
            sla_violations: 0,
            job_seq: 0,
            seed,
            manual_seq: 0,
        }
    }

    // ------------------------------------------------------------------
    // Per-tick processing
    // ------------------------------------------------------------------

    pub fn tick(
        &mut self,
        now: f64,
        tick_interval_s: f64,
        facility: &mut Facility,
        failures: &mut FailureEngine,
        rng: &mut StdRng,
    ) {
        self.arrivals(now, tick_interval_s, rng);
        for rack in failures.take_unapplied_partitions() {
            self.fail_rack_jobs(rack, now, facility);
        }
        self.schedule(now, facility);
        self.complete(now, facility);
        self.check_sla(now);
        self.publish_utilisation(facility, failures);
    }

    fn arrivals(&mut self, now: f64, tick_interval_s: f64, rng: &mut StdRng) {
        let p_arrival = 1.0 - (-tick_interval_s / self.mean_arrival_interval_s).exp();
        if rng.gen::<f64>() >= p_arrival {
            return;
        }
        let job = self.sample_job(now, rng);
        debug!(job = %job.name, job_type = %job.job_type, gpus = job.gpus_required, "Job arrived");
        self.total_submitted += 1;
        self.pending.push(job);
    }

    /// Draw one job from the type-weighted arrival distribution.
    fn sample_job(&mut self, now: f64, rng: &mut StdRng) -> Job {
        let roll: f64 = rng.gen();
        let job_type = if roll < 0.5 {
            JobType::Inference
        } else if roll < 0.8 {
            JobType::Batch
        } else {
            JobType::Training
        };

        let (gpus, duration_s, priority, sla_deadline_s) = match job_type {
            JobType::Training => (
                rng.gen_range(4..=16u32),
                rng.gen_range(3600.0..14400.0),
                rng.gen_range(2..=4u8),
                rng.gen_range(1800.0..7200.0),
            ),
            JobType::Inference => (
                rng.gen_range(1..=2u32),
                rng.gen_range(60.0..600.0),
                rng.gen_range(4..=5u8),
                rng.gen_range(30.0..300.0),
            ),
            JobType::Batch => (
                rng.gen_range(2..=8u32),
                rng.gen_range(600.0..7200.0),
                rng.gen_range(1..=3u8),
                rng.gen_range(3600.0..14400.0),
            ),
        };

        self.job_seq += 1;
        Job {
            id: ids::uuid_from_rng(rng),
            name: format!("{}-{:05}", job_type.short_code(), self.job_seq),
            job_type,
            gpus_required: gpus,
            priority,
            duration_s,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            assigned: Vec::new(),
            target_util: job_type.target_util(),
            sla_deadline_s,
            sla_violated: false,
            status: JobStatus::Queued,
        }
    }

    /// Fail every running job holding slots on the given rack.
    fn fail_rack_jobs(&mut self, rack: usize, now: f64, facility: &mut Facility) {
        let range = facility.rack_server_range(rack);
        let mut kept = Vec::with_capacity(self.running.len());
        for mut job in self.running.drain(..) {
            if job.assigned.iter().any(|a| range.contains(&a.server)) {
                warn!(job = %job.name, rack, "Job failed by network partition");
                free_assignment(&mut job, facility);
                job.status = JobStatus::Failed;
                job.completed_at = Some(now);
                self.total_failed += 1;
                push_completed(&mut self.completed, job);
            } else {
                kept.push(job);
            }
        }
        self.running = kept;
    }

    /// Place pending jobs in priority order, first-fit over the server scan
    /// order (rack 0 srv 0, srv 1, ... rack 1, ...). A single server with
    /// enough free slots wins over a greedy spread.
    fn schedule(&mut self, now: f64, facility: &mut Facility) {
        let mut order: Vec<usize> = (0..self.pending.len()).collect();
        order.sort_by(|&a, &b| {
            let (ja, jb) = (&self.pending[a], &self.pending[b]);
            jb.priority
                .cmp(&ja.priority)
                .then(ja.submitted_at.total_cmp(&jb.submitted_at))
        });

        let mut placed = vec![false; self.pending.len()];
        for &i in &order {
            let req = self.pending[i].gpus_required;
            if let Some(assignment) = plan_placement(facility, req, None) {
                apply_placement(facility, &assignment);
                placed[i] = true;
                let job = &mut self.pending[i];
                job.assigned = assignment;
                job.started_at = Some(now);
                job.status = JobStatus::Running;
                info!(job = %job.name, gpus = req, wait_s = now - job.submitted_at, "Job scheduled");
            }
        }

        let mut idx = 0;
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for job in self.pending.drain(..) {
            if placed[idx] {
                self.running.push(job);
            } else {
                still_pending.push(job);
            }
            idx += 1;
        }
        self.pending = still_pending;
    }

    fn complete(&mut self, now: f64, facility: &mut Facility) {
        let mut kept = Vec::with_capacity(self.running.len());
        for mut job in self.running.drain(..) {
            let started = job.started_at.unwrap_or(job.submitted_at);
            if now - started >= job.duration_s {
                free_assignment(&mut job, facility);
                job.status = JobStatus::Completed;
                job.completed_at = Some(now);
                self.total_completed += 1;
                debug!(job = %job.name, "Job completed");
                push_completed(&mut self.completed, job);
            } else {
                kept.push(job);
            }
        }
        self.running = kept;
    }

    fn check_sla(&mut self, now: f64) {
        for job in &mut self.pending {
            if !job.sla_violated && now - job.submitted_at > job.sla_deadline_s {
                job.sla_violated = true;
                self.sla_violations += 1;
                warn!(job = %job.name, wait_s = now - job.submitted_at, "SLA deadline exceeded while queued");
            }
        }
    }

    /// Publish per-server utilisation for the power model, applying the
    /// throttle, degradation and operator power-cap ceilings.
    fn publish_utilisation(&self, facility: &mut Facility, failures: &FailureEngine) {
        let mut contrib = vec![0.0f64; facility.servers.len()];
        for job in &self.running {
            for a in &job.assigned {
                let total = f64::from(facility.servers[a.server].total_slots);
                contrib[a.server] += job.target_util * f64::from(a.gpus) / total;
            }
        }

        let throttled: Vec<bool> = facility.racks.iter().map(|r| r.throttled).collect();
        for (i, server) in facility.servers.iter_mut().enumerate() {
            server.degraded = failures.is_server_degraded(server.rack, server.index_in_rack);

            let mut util = contrib[i] + IDLE_FRACTION * (1.0 - server.allocated_fraction());
            if throttled[server.rack] {
                util = util.min(THROTTLE_UTIL_CAP);
            }
            if server.degraded {
                util = util.min(GPU_DEGRADED_UTIL_CAP);
            }
            if server.power_cap_frac < 1.0 {
                util = util.min(server.power_cap_frac);
            }
            server.util = util.clamp(0.0, 1.0);
        }
    }

    // ------------------------------------------------------------------
    // Operator operations
    // ------------------------------------------------------------------

    /// Admit an externally submitted job to the pending queue.
    pub fn submit(&mut self, spec: JobSpec, now: f64) -> Result<Uuid, WorkloadError> {
        if spec.gpus_required == 0 {
            return Err(WorkloadError::InvalidSpec("gpus_required must be >= 1".into()));
        }
        if spec.duration_s <= 0.0 {
            return Err(WorkloadError::InvalidSpec("duration_s must be > 0".into()));
        }
        let priority = spec.priority.unwrap_or(3);
        if !(1..=5).contains(&priority) {
            return Err(WorkloadError::InvalidSpec("priority must be in 1..=5".into()));
        }
        let target_util = spec.target_util.unwrap_or_else(|| spec.job_type.target_util());
        if !(0.0..=1.0).contains(&target_util) {
            return Err(WorkloadError::InvalidSpec("target_util must be in [0, 1]".into()));
        }

        self.job_seq += 1;
        let id = ids::uuid_from_seq(self.seed ^ 0x6a6f_6273, self.manual_seq);
        self.manual_seq += 1;
        let name = spec
            .name
            .unwrap_or_else(|| format!("{}-{:05}", spec.job_type.short_code(), self.job_seq));

        info!(job = %name, gpus = spec.gpus_required, "Job submitted");
        self.pending.push(Job {
            id,
            name,
            job_type: spec.job_type,
            gpus_required: spec.gpus_required,
            priority,
            duration_s: spec.duration_s,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            assigned: Vec::new(),
            target_util,
            sla_deadline_s: spec.sla_deadline_s.unwrap_or(3600.0),
            sla_violated: false,
            status: JobStatus::Queued,
        });
        self.total_submitted += 1;
        Ok(id)
    }

    /// Stop a running job and release its slots.
    pub fn preempt(
        &mut self,
        job_id: &str,
        now: f64,
        facility: &mut Facility,
    ) -> Result<(), WorkloadError> {
        let id = parse_job_id(job_id)?;
        let Some(pos) = self.running.iter().position(|j| j.id == id) else {
            return Err(self.not_running_error(id, job_id));
        };
        let mut job = self.running.remove(pos);
        free_assignment(&mut job, facility);
        job.status = JobStatus::Preempted;
        job.completed_at = Some(now);
        self.total_preempted += 1;
        info!(job = %job.name, "Job preempted");
        push_completed(&mut self.completed, job);
        Ok(())
    }

    /// Re-place a running job entirely onto one rack. Atomic: validated
    /// against capacity (counting slots the job already holds there)
    /// before anything is freed.
    pub fn migrate(
        &mut self,
        job_id: &str,
        target_rack: usize,
        facility: &mut Facility,
    ) -> Result<(), WorkloadError> {
        let id = parse_job_id(job_id)?;
        let Some(pos) = self.running.iter().position(|j| j.id == id) else {
            return Err(self.not_running_error(id, job_id));
        };

        let range = facility.rack_server_range(target_rack);
        let held_on_target: u32 = self.running[pos]
            .assigned
            .iter()
            .filter(|a| range.contains(&a.server))
            .map(|a| a.gpus)
            .sum();
        let req = self.running[pos].gpus_required;
        if facility.rack_free_slots(target_rack) + held_on_target < req {
            return Err(WorkloadError::InsufficientCapacity {
                rack: target_rack,
                gpus: req,
            });
        }

        let job = &mut self.running[pos];
        free_assignment(job, facility);
        let assignment = plan_placement(facility, req, Some(target_rack))
            .ok_or(WorkloadError::InsufficientCapacity {
                rack: target_rack,
                gpus: req,
            })?;
        apply_placement(facility, &assignment);
        job.assigned = assignment;
        info!(job = %job.name, target_rack, "Job migrated");
        Ok(())
    }

    fn not_running_error(&self, id: Uuid, raw: &str) -> WorkloadError {
        let known = self.pending.iter().any(|j| j.id == id)
            || self.completed.iter().any(|j| j.id == id);
        if known {
            WorkloadError::JobNotRunning(raw.to_string())
        } else {
            WorkloadError::UnknownJob(raw.to_string())
        }
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn gpus_allocated(&self) -> u32 {
        self.running
            .iter()
            .flat_map(|j| j.assigned.iter())
            .map(|a| a.gpus)
            .sum()
    }

    pub fn summaries(&self, jobs: &[Job], now: f64, facility: &Facility) -> Vec<JobSummary> {
        jobs.iter().map(|j| summarise(j, now, facility)).collect()
    }

    pub fn completed_summaries(&self, last_n: usize, now: f64, facility: &Facility) -> Vec<JobSummary> {
        self.completed
            .iter()
            .rev()
            .take(last_n)
            .map(|j| summarise(j, now, facility))
            .collect()
    }
}

fn summarise(job: &Job, now: f64, facility: &Facility) -> JobSummary {
    JobSummary {
        id: job.id,
        name: job.name.clone(),
        job_type: job.job_type,
        gpus_required: job.gpus_required,
        priority: job.priority,
        status: job.status,
        submitted_at: job.submitted_at,
        started_at: job.started_at,
        completed_at: job.completed_at,
        wait_s: job.wait_s(now),
        sla_violated: job.sla_violated,
        assigned_servers: job
            .assigned
            .iter()
            .map(|a| facility.servers[a.server].id())
            .collect(),
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, WorkloadError> {
    Uuid::parse_str(raw).map_err(|_| WorkloadError::UnknownJob(raw.to_string()))
}

fn push_completed(completed: &mut VecDeque<Job>, job: Job) {
    completed.push_back(job);
    while completed.len() > COMPLETED_RETENTION {
        completed.pop_front();
    }
}

/// Compute a placement without mutating anything. `rack` restricts the scan
/// to one rack (migration); `None` scans the whole fleet.
fn plan_placement(
    facility: &Facility,
    req: u32,
    rack: Option<usize>,
) -> Option<Vec<ServerAssignment>> {
    let indices: Vec<usize> = match rack {
        Some(r) => facility.rack_server_range(r).collect(),
        None => (0..facility.servers.len()).collect(),
    };

    // Single-server first-fit wins when any one server can hold the job
    if let Some(&i) = indices
        .iter()
        .find(|&&i| facility.servers[i].free_slots >= req)
    {
        return Some(vec![ServerAssignment {
            server: i,
            gpus: req,
        }]);
    }

    // Greedy spread across the scan order
    let mut remaining = req;
    let mut assignment = Vec::new();
    for &i in &indices {
        let take = facility.servers[i].free_slots.min(remaining);
        if take > 0 {
            assignment.push(ServerAssignment {
                server: i,
                gpus: take,
            });
            remaining -= take;
            if remaining == 0 {
                return Some(assignment);
            }
        }
    }
    None
}

fn apply_placement(facility: &mut Facility, assignment: &[ServerAssignment]) {
    for a in assignment {
        facility.servers[a.server].free_slots -= a.gpus;
    }
}

fn free_assignment(job: &mut Job, facility: &mut Facility) {
    for a in job.assigned.drain(..) {
        let server = &mut facility.servers[a.server];
        server.free_slots = (server.free_slots + a.gpus).min(server.total_slots);
    }
}
