//! Shared data structures for the data centre simulation
//!
//! This module defines the core types flowing between subsystems:
//! - Jobs and their lifecycle (queued → running → completed/failed/preempted)
//! - Failure events and their targets
//! - Operator actions (the tagged union agents return)
//! - Per-tick facility snapshots (the telemetry record)

mod action;
mod failure;
mod job;
mod state;

pub use action::Action;
pub use failure::{ActiveFailure, FailureTarget, FailureType};
pub use job::{Job, JobSpec, JobStatus, JobSummary, JobType, ServerAssignment};
pub use state::{
    CarbonState, ClockState, CoolingState, CracUnitState, FacilityState, GpuServerState, GpuState,
    NetworkState, PowerState, RackNetworkState, RackPowerState, RackStorageState,
    RackThermalState, SpineLinkState, StorageState, ThermalState, WorkloadCounts,
};
