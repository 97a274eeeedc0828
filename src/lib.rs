//! RackOps: GPU data centre operational simulator
//!
//! Discrete-time, physics-flavoured simulation of a GPU facility producing
//! coherent telemetry across nine coupled subsystems, exposed through a
//! read/write API so external agents can observe and intervene.
//!
//! ## Architecture
//!
//! - **Simulator**: deterministic tick orchestrator over clock, failures,
//!   workload, power, thermal, GPU, network, storage, cooling and carbon
//! - **Physics**: energy-balance thermal model with recirculation, a
//!   non-linear GPU power curve with dynamic PUE, queueing-theory latency
//! - **Failure engine**: probabilistic injection with scoped effects that
//!   cascade (cooling → thermal → throttling → SLA)
//! - **Evaluation harness**: deterministic scenario replay with an agent
//!   callback and seven-dimension scoring
//! - **API**: thin Axum layer over the core operations

pub mod api;
pub mod config;
pub mod errors;
pub mod eval;
pub mod physics;
pub mod sim;
pub mod types;

// Re-export the top-level handles
pub use config::SimConfig;
pub use errors::SimError;
pub use sim::Simulator;

// Re-export commonly used types
pub use types::{
    Action, ActiveFailure, FacilityState, FailureType, Job, JobSpec, JobStatus, JobType,
};

// Re-export the harness entry points
pub use eval::{create_agent, find_scenario, run_scenario, Agent, EvalReport, ScoreCard};
