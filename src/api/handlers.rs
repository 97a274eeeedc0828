//! Request handlers for the operator API.
//!
//! Reads are served from the most recent snapshot; writes take the
//! simulator's write lock, so every mutation is serialised with the tick
//! loop. The background auto-ticker is owned here: a cancellable task that
//! calls `tick()` under the same lock as synchronous actions.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::ApiError;
use crate::config::SimConfig;
use crate::eval::{self, builtin_scenarios};
use crate::sim::audit::AuditEntry;
use crate::sim::Simulator;
use crate::types::{
    ActiveFailure, CarbonState, CoolingState, FacilityState, FailureType, GpuServerState,
    GpuState, JobSpec, JobSummary, NetworkState, PowerState, RackNetworkState, RackPowerState,
    RackStorageState, RackThermalState, StorageState, ThermalState,
};

/// Default `last_n` for history-style endpoints.
const DEFAULT_LAST_N: usize = 100;

/// Default wall interval for the auto-ticker.
const DEFAULT_RUN_INTERVAL_S: f64 = 1.0;

/// Shared handle given to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub sim: Arc<RwLock<Simulator>>,
    ticker: Arc<Mutex<Option<CancellationToken>>>,
}

impl ApiState {
    pub fn new(config: SimConfig) -> Self {
        Self::with_simulator(Simulator::new(config))
    }

    pub fn with_simulator(sim: Simulator) -> Self {
        Self {
            sim: Arc::new(RwLock::new(sim)),
            ticker: Arc::new(Mutex::new(None)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LastNQuery {
    pub last_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TickQuery {
    pub n: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub tick_interval_s: Option<f64>,
}

// ============================================================================
// Read endpoints
// ============================================================================

pub async fn get_status(State(state): State<ApiState>) -> Json<FacilityState> {
    let sim = state.sim.read().await;
    Json(sim.latest().as_ref().clone())
}

pub async fn get_thermal(State(state): State<ApiState>) -> Json<ThermalState> {
    let sim = state.sim.read().await;
    Json(sim.latest().thermal.clone())
}

pub async fn get_thermal_rack(
    State(state): State<ApiState>,
    Path(rack_id): Path<usize>,
) -> Result<Json<RackThermalState>, ApiError> {
    let sim = state.sim.read().await;
    sim.latest()
        .thermal
        .racks
        .get(rack_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("rack-{rack_id}")))
}

pub async fn get_power(State(state): State<ApiState>) -> Json<PowerState> {
    let sim = state.sim.read().await;
    Json(sim.latest().power.clone())
}

pub async fn get_power_rack(
    State(state): State<ApiState>,
    Path(rack_id): Path<usize>,
) -> Result<Json<RackPowerState>, ApiError> {
    let sim = state.sim.read().await;
    sim.latest()
        .power
        .racks
        .get(rack_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("rack-{rack_id}")))
}

pub async fn get_gpu(State(state): State<ApiState>) -> Json<GpuState> {
    let sim = state.sim.read().await;
    Json(sim.latest().gpu.clone())
}

pub async fn get_gpu_server(
    State(state): State<ApiState>,
    Path(server_id): Path<String>,
) -> Result<Json<GpuServerState>, ApiError> {
    let sim = state.sim.read().await;
    sim.latest()
        .gpu
        .servers
        .iter()
        .find(|s| s.server_id == server_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("server {server_id}")))
}

pub async fn get_network(State(state): State<ApiState>) -> Json<NetworkState> {
    let sim = state.sim.read().await;
    Json(sim.latest().network.clone())
}

pub async fn get_network_rack(
    State(state): State<ApiState>,
    Path(rack_id): Path<usize>,
) -> Result<Json<RackNetworkState>, ApiError> {
    let sim = state.sim.read().await;
    sim.latest()
        .network
        .racks
        .get(rack_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("rack-{rack_id}")))
}

pub async fn get_storage(State(state): State<ApiState>) -> Json<StorageState> {
    let sim = state.sim.read().await;
    Json(sim.latest().storage.clone())
}

pub async fn get_storage_rack(
    State(state): State<ApiState>,
    Path(rack_id): Path<usize>,
) -> Result<Json<RackStorageState>, ApiError> {
    let sim = state.sim.read().await;
    sim.latest()
        .storage
        .racks
        .get(rack_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("rack-{rack_id}")))
}

pub async fn get_cooling(State(state): State<ApiState>) -> Json<CoolingState> {
    let sim = state.sim.read().await;
    Json(sim.latest().cooling.clone())
}

pub async fn get_carbon(State(state): State<ApiState>) -> Json<CarbonState> {
    let sim = state.sim.read().await;
    Json(sim.latest().carbon.clone())
}

// ============================================================================
// Workload endpoints
// ============================================================================

pub async fn get_workload_queue(State(state): State<ApiState>) -> Json<Vec<JobSummary>> {
    let sim = state.sim.read().await;
    Json(sim.latest().pending_jobs.clone())
}

pub async fn get_workload_running(State(state): State<ApiState>) -> Json<Vec<JobSummary>> {
    let sim = state.sim.read().await;
    Json(sim.latest().running_jobs.clone())
}

pub async fn get_workload_completed(
    State(state): State<ApiState>,
    Query(query): Query<LastNQuery>,
) -> Json<Vec<JobSummary>> {
    let sim = state.sim.read().await;
    let n = query.last_n.unwrap_or(DEFAULT_LAST_N);
    let now = sim.clock.current_time_s;
    Json(sim.workload.completed_summaries(n, now, &sim.facility))
}

#[derive(Debug, Serialize)]
pub struct SlaViolationsView {
    pub sla_violations: u64,
    pub violated_jobs: Vec<JobSummary>,
}

pub async fn get_sla_violations(State(state): State<ApiState>) -> Json<SlaViolationsView> {
    let sim = state.sim.read().await;
    let latest = sim.latest();
    let violated_jobs = latest
        .pending_jobs
        .iter()
        .chain(latest.running_jobs.iter())
        .filter(|j| j.sla_violated)
        .cloned()
        .collect();
    Json(SlaViolationsView {
        sla_violations: latest.workload.sla_violations,
        violated_jobs,
    })
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: uuid::Uuid,
}

pub async fn submit_job(
    State(state): State<ApiState>,
    Json(spec): Json<JobSpec>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let mut sim = state.sim.write().await;
    let job_id = sim.submit_job(spec, "operator")?;
    Ok(Json(SubmitResponse { job_id }))
}

// ============================================================================
// Failures, telemetry, audit
// ============================================================================

pub async fn get_active_failures(State(state): State<ApiState>) -> Json<Vec<ActiveFailure>> {
    let sim = state.sim.read().await;
    Json(sim.failures.get_active())
}

pub async fn get_telemetry_history(
    State(state): State<ApiState>,
    Query(query): Query<LastNQuery>,
) -> Json<Vec<FacilityState>> {
    let sim = state.sim.read().await;
    let n = query.last_n.unwrap_or(DEFAULT_LAST_N);
    Json(
        sim.telemetry
            .history(n)
            .iter()
            .map(|s| s.as_ref().clone())
            .collect(),
    )
}

pub async fn get_audit(
    State(state): State<ApiState>,
    Query(query): Query<LastNQuery>,
) -> Json<Vec<AuditEntry>> {
    let sim = state.sim.read().await;
    Json(sim.audit_tail(query.last_n.unwrap_or(DEFAULT_LAST_N)))
}

// ============================================================================
// Simulation control
// ============================================================================

pub async fn get_sim_config(State(state): State<ApiState>) -> Json<SimConfig> {
    let sim = state.sim.read().await;
    Json(sim.config.clone())
}

#[derive(Debug, Serialize)]
pub struct SimStatusView {
    pub running: bool,
    pub tick: u64,
    pub time_s: f64,
    pub tick_interval_s: f64,
    pub realtime_factor: f64,
    pub telemetry_buffered: usize,
    pub active_failures: usize,
}

pub async fn get_sim_status(State(state): State<ApiState>) -> Json<SimStatusView> {
    let sim = state.sim.read().await;
    Json(sim_status_view(&sim))
}

pub async fn get_scenarios(State(_state): State<ApiState>) -> Json<Vec<eval::Scenario>> {
    Json(builtin_scenarios())
}

pub async fn post_tick(
    State(state): State<ApiState>,
    Query(query): Query<TickQuery>,
) -> Json<FacilityState> {
    let mut sim = state.sim.write().await;
    let snapshot = sim.tick_n(query.n.unwrap_or(1));
    Json(snapshot.as_ref().clone())
}

pub async fn post_run(
    State(state): State<ApiState>,
    Query(query): Query<RunQuery>,
) -> Result<Json<SimStatusView>, ApiError> {
    let interval_s = query.tick_interval_s.unwrap_or(DEFAULT_RUN_INTERVAL_S);
    if !interval_s.is_finite() || interval_s <= 0.0 {
        return Err(ApiError::bad_request("tick_interval_s must be > 0"));
    }

    let mut ticker = state.ticker.lock().await;
    if ticker.is_some() {
        return Err(ApiError::conflict("simulation already running"));
    }

    let token = CancellationToken::new();
    *ticker = Some(token.clone());
    drop(ticker);

    state.sim.write().await.set_running(true);
    info!(interval_s, "Continuous simulation started");

    let sim = state.sim.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs_f64(interval_s));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = interval.tick() => {
                    sim.write().await.tick();
                }
            }
        }
        sim.write().await.set_running(false);
        info!("Continuous simulation stopped");
    });

    Ok(Json(sim_status_view(&*state.sim.read().await)))
}

pub async fn post_pause(State(state): State<ApiState>) -> Json<SimStatusView> {
    if let Some(token) = state.ticker.lock().await.take() {
        token.cancel();
    }
    // The ticker task never holds the lock across an await, so this write
    // waits out at most one in-flight tick
    let mut sim = state.sim.write().await;
    sim.set_running(false);
    Json(sim_status_view(&sim))
}

pub async fn post_reset(
    State(state): State<ApiState>,
) -> Result<Json<SimStatusView>, ApiError> {
    let mut sim = state.sim.write().await;
    sim.reset()?;
    Ok(Json(sim_status_view(&sim)))
}

fn sim_status_view(sim: &Simulator) -> SimStatusView {
    SimStatusView {
        running: sim.is_running(),
        tick: sim.clock.tick_count,
        time_s: sim.clock.current_time_s,
        tick_interval_s: sim.clock.tick_interval_s,
        realtime_factor: sim.clock.realtime_factor,
        telemetry_buffered: sim.telemetry.len(),
        active_failures: sim.failures.active_count(),
    }
}

#[derive(Debug, Deserialize)]
pub struct InjectFailureBody {
    #[serde(alias = "type")]
    pub failure_type: FailureType,
    pub target: String,
    pub duration_s: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct InjectFailureResponse {
    pub failure_id: uuid::Uuid,
}

pub async fn post_inject_failure(
    State(state): State<ApiState>,
    Json(body): Json<InjectFailureBody>,
) -> Result<Json<InjectFailureResponse>, ApiError> {
    let mut sim = state.sim.write().await;
    let failure_id =
        sim.inject_failure(body.failure_type, &body.target, body.duration_s, "operator")?;
    Ok(Json(InjectFailureResponse { failure_id }))
}

// ============================================================================
// Operator actions
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub result: &'static str,
}

const OK: ActionResponse = ActionResponse { result: "ok" };

#[derive(Debug, Deserialize)]
pub struct MigrateBody {
    pub job_id: String,
    pub target_rack: usize,
}

pub async fn action_migrate_workload(
    State(state): State<ApiState>,
    Json(body): Json<MigrateBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut sim = state.sim.write().await;
    sim.migrate_workload(&body.job_id, body.target_rack, "operator")?;
    Ok(Json(OK))
}

#[derive(Debug, Deserialize)]
pub struct AdjustCoolingBody {
    pub rack_id: usize,
    pub setpoint_c: f64,
}

pub async fn action_adjust_cooling(
    State(state): State<ApiState>,
    Json(body): Json<AdjustCoolingBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut sim = state.sim.write().await;
    sim.adjust_cooling(body.rack_id, body.setpoint_c, "operator")?;
    Ok(Json(OK))
}

#[derive(Debug, Deserialize)]
pub struct ThrottleGpuBody {
    pub server_id: String,
    pub power_cap_pct: f64,
}

pub async fn action_throttle_gpu(
    State(state): State<ApiState>,
    Json(body): Json<ThrottleGpuBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut sim = state.sim.write().await;
    sim.throttle_gpu(&body.server_id, body.power_cap_pct, "operator")?;
    Ok(Json(OK))
}

#[derive(Debug, Deserialize)]
pub struct PreemptBody {
    pub job_id: String,
}

pub async fn action_preempt_job(
    State(state): State<ApiState>,
    Json(body): Json<PreemptBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut sim = state.sim.write().await;
    sim.preempt_job(&body.job_id, "operator")?;
    Ok(Json(OK))
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub failure_id: String,
}

pub async fn action_resolve_failure(
    State(state): State<ApiState>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    let mut sim = state.sim.write().await;
    sim.resolve_failure(&body.failure_id, "operator")?;
    Ok(Json(OK))
}

// ============================================================================
// Evaluation harness
// ============================================================================

pub async fn get_agents(State(_state): State<ApiState>) -> Json<Vec<&'static str>> {
    Json(eval::agent_names())
}

#[derive(Debug, Deserialize)]
pub struct RunAgentBody {
    pub agent_name: String,
    pub scenario_id: String,
}

pub async fn post_run_agent(
    State(state): State<ApiState>,
    Json(body): Json<RunAgentBody>,
) -> Result<Json<eval::EvalReport>, ApiError> {
    let mut agent = eval::create_agent(&body.agent_name)
        .ok_or_else(|| ApiError::not_found(format!("agent {}", body.agent_name)))?;
    let scenario = eval::find_scenario(&body.scenario_id)
        .ok_or_else(|| ApiError::not_found(format!("scenario {}", body.scenario_id)))?;

    let mut sim = state.sim.write().await;
    let report = eval::run_scenario(&mut sim, agent.as_mut(), &scenario)?;
    Ok(Json(report))
}
