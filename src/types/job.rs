//! Job model: identity, placement, and lifecycle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workload class of a job. Determines GPU demand, duration, priority and
/// SLA ranges at arrival time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Training,
    Inference,
    Batch,
}

impl JobType {
    /// Target GPU utilisation while the job runs.
    pub fn target_util(&self) -> f64 {
        match self {
            JobType::Training => 0.92,
            JobType::Inference => 0.60,
            JobType::Batch => 0.85,
        }
    }

    pub fn short_code(&self) -> &'static str {
        match self {
            JobType::Training => "trn",
            JobType::Inference => "inf",
            JobType::Batch => "bat",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Training => write!(f, "training"),
            JobType::Inference => write!(f, "inference"),
            JobType::Batch => write!(f, "batch"),
        }
    }
}

/// Lifecycle state. A job lives in exactly one of the pending / running /
/// completed collections; `Queued` ⇔ pending, `Running` ⇔ running, the
/// three terminal states ⇔ completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Preempted,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Preempted
        )
    }
}

/// GPU slots a job holds on one server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerAssignment {
    /// Arena index into `Facility::servers`
    pub server: usize,
    /// GPU slots allocated on that server
    pub gpus: u32,
}

/// A unit of GPU work moving through the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Human-readable name, e.g. `trn-00017`
    pub name: String,
    pub job_type: JobType,
    /// GPU slots required fleet-wide (>= 1)
    pub gpus_required: u32,
    /// 1-5, higher is more urgent
    pub priority: u8,
    /// Simulated runtime once started
    pub duration_s: f64,
    pub submitted_at: f64,
    pub started_at: Option<f64>,
    pub completed_at: Option<f64>,
    /// Empty iff status is not Running
    pub assigned: Vec<ServerAssignment>,
    /// GPU utilisation this job drives while running (type-dependent)
    pub target_util: f64,
    /// Maximum queue wait before the SLA flag trips
    pub sla_deadline_s: f64,
    /// Latched once queue wait exceeds the deadline; not a terminal state
    pub sla_violated: bool,
    pub status: JobStatus,
}

impl Job {
    /// Queue wait so far (or final wait once started).
    pub fn wait_s(&self, now: f64) -> f64 {
        match self.started_at {
            Some(started) => started - self.submitted_at,
            None => now - self.submitted_at,
        }
    }
}

/// Operator-submitted job description. Unset fields are filled from the
/// type-specific defaults at admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: Option<String>,
    pub job_type: JobType,
    pub gpus_required: u32,
    pub priority: Option<u8>,
    pub duration_s: f64,
    pub sla_deadline_s: Option<f64>,
    pub target_util: Option<f64>,
}

/// Flattened job view used in snapshots and the workload endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub name: String,
    pub job_type: JobType,
    pub gpus_required: u32,
    pub priority: u8,
    pub status: JobStatus,
    pub submitted_at: f64,
    pub started_at: Option<f64>,
    pub completed_at: Option<f64>,
    pub wait_s: f64,
    pub sla_violated: bool,
    /// Server identifiers, e.g. `rack-5-srv-0`
    pub assigned_servers: Vec<String>,
}
