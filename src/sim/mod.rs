//! Simulation core
//!
//! The `Simulator` owns every component and advances them in a fixed order
//! each tick: clock → failures → workload → power → thermal → gpu →
//! network → storage → cooling → carbon → snapshot. Operator actions are
//! validated, applied atomically between ticks, and audited. `reset()`
//! rebuilds everything from the same config and seed, giving bit-identical
//! replays.

pub mod audit;
pub mod clock;
pub mod facility;
pub mod failures;
pub mod ids;
pub mod telemetry;
pub mod workload;

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::errors::SimError;
use crate::physics::{
    ambient_at, CarbonModel, CoolingModel, GpuModel, NetworkModel, PowerModel, StorageModel,
    ThermalModel,
};
use crate::types::{
    Action, ClockState, FacilityState, FailureType, JobSpec, PowerState, RackPowerState,
    RackThermalState, ThermalState, WorkloadCounts,
};

use audit::{AuditEntry, AuditLog};
use clock::Clock;
use facility::Facility;
use failures::FailureEngine;
use telemetry::TelemetryBuffer;
use workload::WorkloadModel;

/// Valid CRAC setpoint range accepted by `adjust_cooling`.
pub const SETPOINT_RANGE_C: std::ops::RangeInclusive<f64> = 10.0..=30.0;

/// The tick orchestrator.
pub struct Simulator {
    pub config: SimConfig,
    pub clock: Clock,
    rng: StdRng,
    pub facility: Facility,
    pub failures: FailureEngine,
    pub workload: WorkloadModel,
    pub power: PowerModel,
    pub thermal: ThermalModel,
    pub gpu: GpuModel,
    pub network: NetworkModel,
    pub storage: StorageModel,
    pub carbon: CarbonModel,
    pub cooling: CoolingModel,
    pub telemetry: TelemetryBuffer,
    pub audit: AuditLog,
    latest: Arc<FacilityState>,
    /// Auto-ticker active flag; guards `reset()`
    running: bool,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        Self::build(config, TelemetryBuffer::new())
    }

    /// Construct with a JSON-lines telemetry sink attached.
    pub fn with_telemetry_sink(config: SimConfig, path: &Path) -> std::io::Result<Self> {
        Ok(Self::build(config, TelemetryBuffer::with_sink(path)?))
    }

    fn build(config: SimConfig, telemetry: TelemetryBuffer) -> Self {
        let seed = config.rng_seed;
        let mut sim = Self {
            clock: Clock::new(config.clock.tick_interval_s, config.clock.realtime_factor),
            rng: StdRng::seed_from_u64(seed),
            facility: Facility::new(&config),
            failures: FailureEngine::new(seed),
            workload: WorkloadModel::new(config.workload.mean_job_arrival_interval_s, seed),
            power: PowerModel::new(),
            thermal: ThermalModel::new(&config),
            gpu: GpuModel::new(&config),
            network: NetworkModel::new(config.facility.num_racks),
            storage: StorageModel::new(config.facility.num_racks),
            carbon: CarbonModel::new(),
            cooling: CoolingModel::new(),
            telemetry,
            audit: AuditLog::new(),
            latest: Arc::new(placeholder_state(&config)),
            running: false,
            config,
        };
        sim.warm_start();
        sim
    }

    /// Run the derived models once at t = 0 so the first snapshot served
    /// over the API is fully populated. No time passes and nothing
    /// accumulates; the same draws happen after every reset.
    fn warm_start(&mut self) {
        let hour = self.clock.hour_of_day();
        let ambient = ambient_at(self.config.thermal.ambient_temp_c, hour);
        self.power
            .update(&mut self.facility, &self.failures, &self.config, ambient);
        self.thermal
            .update(&mut self.facility, &self.failures, &self.config, hour);
        self.gpu.update(&self.facility, &mut self.rng);
        self.network
            .update(&self.facility, &self.failures, &mut self.rng);
        self.storage.update(&self.facility, &self.workload, 0.0);
        self.cooling
            .update(&self.facility, &self.thermal, &self.failures, &self.config);
        self.carbon
            .update(self.power.summary.total_facility_kw, hour, 0.0, &mut self.rng);
        self.latest = Arc::new(self.snapshot());
    }

    // ------------------------------------------------------------------
    // Tick loop
    // ------------------------------------------------------------------

    /// Advance one tick and return the resulting snapshot.
    pub fn tick(&mut self) -> Arc<FacilityState> {
        self.clock.tick();
        let now = self.clock.current_time_s;
        let interval = self.clock.tick_interval_s;
        let hour = self.clock.hour_of_day();
        let ambient = ambient_at(self.config.thermal.ambient_temp_c, hour);

        self.failures.tick(now, &self.config, &mut self.rng);
        self.workload.tick(
            now,
            interval,
            &mut self.facility,
            &mut self.failures,
            &mut self.rng,
        );
        self.power
            .update(&mut self.facility, &self.failures, &self.config, ambient);
        self.thermal
            .update(&mut self.facility, &self.failures, &self.config, hour);
        self.gpu.update(&self.facility, &mut self.rng);
        self.network
            .update(&self.facility, &self.failures, &mut self.rng);
        self.storage
            .update(&self.facility, &self.workload, interval);
        self.cooling
            .update(&self.facility, &self.thermal, &self.failures, &self.config);
        self.carbon.update(
            self.power.summary.total_facility_kw,
            hour,
            interval,
            &mut self.rng,
        );

        let snapshot = Arc::new(self.snapshot());
        self.telemetry.push(snapshot.clone());
        self.latest = snapshot.clone();
        debug!(
            tick = self.clock.tick_count,
            running = self.workload.running.len(),
            queued = self.workload.pending.len(),
            it_kw = self.power.summary.it_load_kw,
            "Tick complete"
        );
        snapshot
    }

    /// Advance `n` ticks; returns the final snapshot.
    pub fn tick_n(&mut self, n: u64) -> Arc<FacilityState> {
        for _ in 0..n {
            self.tick();
        }
        self.latest()
    }

    /// Most recent snapshot (initial state before the first tick).
    pub fn latest(&self) -> Arc<FacilityState> {
        self.latest.clone()
    }

    /// Rebuild every component from the same config and seed.
    /// Requires the auto-ticker to be paused.
    pub fn reset(&mut self) -> Result<(), SimError> {
        if self.running {
            return Err(SimError::PreconditionFailed(
                "pause the simulation before reset".into(),
            ));
        }
        info!("Simulation reset");
        let sink = self.telemetry.take_sink();
        let mut fresh = Self::build(self.config.clone(), TelemetryBuffer::new());
        fresh.telemetry.set_sink(sink);
        *self = fresh;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    // ------------------------------------------------------------------
    // Operator actions (validated, audited)
    // ------------------------------------------------------------------

    pub fn apply_action(&mut self, action: &Action, source: &str) -> Result<(), SimError> {
        match action {
            Action::MigrateWorkload { job_id, target_rack } => {
                self.migrate_workload(job_id, *target_rack, source)
            }
            Action::AdjustCooling { rack_id, setpoint_c } => {
                self.adjust_cooling(*rack_id, *setpoint_c, source)
            }
            Action::ThrottleGpu {
                server_id,
                power_cap_pct,
            } => self.throttle_gpu(server_id, *power_cap_pct, source),
            Action::PreemptJob { job_id } => self.preempt_job(job_id, source),
            Action::ResolveFailure { failure_id } => self.resolve_failure(failure_id, source),
            Action::InjectFailure {
                failure_type,
                target,
                duration_s,
            } => self
                .inject_failure(*failure_type, target, *duration_s, source)
                .map(|_| ()),
        }
    }

    pub fn migrate_workload(
        &mut self,
        job_id: &str,
        target_rack: usize,
        source: &str,
    ) -> Result<(), SimError> {
        let result = if target_rack >= self.facility.num_racks() {
            Err(SimError::NotFound(format!("rack-{target_rack}")))
        } else {
            self.workload
                .migrate(job_id, target_rack, &mut self.facility)
                .map_err(SimError::from)
        };
        self.record(
            "migrate_workload",
            json!({"job_id": job_id, "target_rack": target_rack}),
            &result,
            source,
        );
        result
    }

    /// Persist a per-zone CRAC setpoint. Idempotent for a repeated value.
    pub fn adjust_cooling(
        &mut self,
        rack_id: usize,
        setpoint_c: f64,
        source: &str,
    ) -> Result<(), SimError> {
        let result = if rack_id >= self.facility.num_racks() {
            Err(SimError::NotFound(format!("rack-{rack_id}")))
        } else if !SETPOINT_RANGE_C.contains(&setpoint_c) {
            Err(SimError::InvalidArgument(format!(
                "setpoint {setpoint_c} outside {:?} C",
                SETPOINT_RANGE_C
            )))
        } else {
            let zone = self.config.zone_of_rack(rack_id);
            self.thermal.set_setpoint(zone, setpoint_c);
            Ok(())
        };
        self.record(
            "adjust_cooling",
            json!({"rack_id": rack_id, "setpoint_c": setpoint_c}),
            &result,
            source,
        );
        result
    }

    /// Cap a server's power (and thereby utilisation). Accepts the cap as
    /// either a fraction (0.0-1.0) or a percentage (0-100).
    pub fn throttle_gpu(
        &mut self,
        server_id: &str,
        power_cap_pct: f64,
        source: &str,
    ) -> Result<(), SimError> {
        let result = match normalise_cap(power_cap_pct) {
            None => Err(SimError::InvalidArgument(format!(
                "power_cap_pct {power_cap_pct} outside [0, 100]"
            ))),
            Some(frac) => match self.facility.resolve_server_id(server_id) {
                None => Err(SimError::NotFound(format!("server {server_id}"))),
                Some(idx) => {
                    self.facility.servers[idx].power_cap_frac = frac;
                    Ok(())
                }
            },
        };
        self.record(
            "throttle_gpu",
            json!({"server_id": server_id, "power_cap_pct": power_cap_pct}),
            &result,
            source,
        );
        result
    }

    pub fn preempt_job(&mut self, job_id: &str, source: &str) -> Result<(), SimError> {
        let now = self.clock.current_time_s;
        let result = self
            .workload
            .preempt(job_id, now, &mut self.facility)
            .map_err(SimError::from);
        self.record("preempt_job", json!({"job_id": job_id}), &result, source);
        result
    }

    pub fn resolve_failure(&mut self, failure_id: &str, source: &str) -> Result<(), SimError> {
        let result = self
            .failures
            .resolve(failure_id)
            .map(|_| ())
            .map_err(SimError::from);
        self.record(
            "resolve_failure",
            json!({"failure_id": failure_id}),
            &result,
            source,
        );
        result
    }

    pub fn inject_failure(
        &mut self,
        failure_type: FailureType,
        target: &str,
        duration_s: Option<f64>,
        source: &str,
    ) -> Result<Uuid, SimError> {
        let now = self.clock.current_time_s;
        let result = self
            .failures
            .inject(failure_type, target, duration_s, now, &self.config)
            .map_err(SimError::from);
        self.record(
            "inject_failure",
            json!({
                "failure_type": failure_type,
                "target": target,
                "duration_s": duration_s,
            }),
            &result.as_ref().map(|_| ()).map_err(Clone::clone),
            source,
        );
        result
    }

    /// Admit an operator-submitted job.
    pub fn submit_job(&mut self, spec: JobSpec, source: &str) -> Result<Uuid, SimError> {
        let now = self.clock.current_time_s;
        let params = serde_json::to_value(&spec).unwrap_or_default();
        let result = self.workload.submit(spec, now).map_err(SimError::from);
        self.record(
            "submit_job",
            params,
            &result.as_ref().map(|_| ()).map_err(Clone::clone),
            source,
        );
        result
    }

    fn record(
        &mut self,
        action: &str,
        params: serde_json::Value,
        result: &Result<(), SimError>,
        source: &str,
    ) {
        self.audit
            .record(self.clock.current_time_s, action, params, result, source);
    }

    pub fn audit_tail(&self, n: usize) -> Vec<AuditEntry> {
        self.audit.last_n(n)
    }

    // ------------------------------------------------------------------
    // Snapshot assembly
    // ------------------------------------------------------------------

    fn snapshot(&self) -> FacilityState {
        let now = self.clock.current_time_s;
        let racks_thermal: Vec<RackThermalState> = self
            .facility
            .racks
            .iter()
            .map(|r| RackThermalState {
                rack_id: r.id,
                zone: r.zone,
                inlet_c: r.inlet_c,
                outlet_c: r.outlet_c,
                humidity_pct: r.humidity_pct,
                heat_kw: r.heat_kw,
                cooling_kw: r.cooling_kw,
                throttled: r.throttled,
            })
            .collect();

        let racks_power: Vec<RackPowerState> = self
            .facility
            .racks
            .iter()
            .map(|r| RackPowerState {
                rack_id: r.id,
                power_kw: r.power_kw,
                pdu_utilisation: r.pdu_utilisation,
            })
            .collect();

        FacilityState {
            clock: ClockState {
                time_s: now,
                tick: self.clock.tick_count,
                hour_of_day: self.clock.hour_of_day(),
            },
            thermal: ThermalState {
                ambient_c: self.thermal.ambient_c,
                max_inlet_c: racks_thermal
                    .iter()
                    .map(|r| r.inlet_c)
                    .fold(f64::MIN, f64::max),
                throttled_racks: racks_thermal.iter().filter(|r| r.throttled).count() as u32,
                racks: racks_thermal,
            },
            power: PowerState {
                it_load_kw: self.power.summary.it_load_kw,
                total_facility_kw: self.power.summary.total_facility_kw,
                pue: self.power.summary.pue,
                load_fraction: self.power.summary.load_fraction,
                headroom_kw: self.power.summary.headroom_kw,
                power_cap_exceeded: self.power.summary.power_cap_exceeded,
                racks: racks_power,
            },
            gpu: self.gpu.state.clone(),
            network: self.network.state.clone(),
            storage: self.storage.state.clone(),
            cooling: self.cooling.state.clone(),
            carbon: self.carbon.state.clone(),
            workload: WorkloadCounts {
                queued: self.workload.pending.len(),
                running: self.workload.running.len(),
                completed: self.workload.total_completed,
                failed: self.workload.total_failed,
                preempted: self.workload.total_preempted,
                total_submitted: self.workload.total_submitted,
                sla_violations: self.workload.sla_violations,
                gpus_allocated: self.workload.gpus_allocated(),
                gpus_total: self.facility.total_slots(),
            },
            running_jobs: self
                .workload
                .summaries(&self.workload.running, now, &self.facility),
            pending_jobs: self
                .workload
                .summaries(&self.workload.pending, now, &self.facility),
            active_failures: self.failures.get_active(),
        }
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("tick", &self.clock.tick_count)
            .field("running", &self.running)
            .finish()
    }
}

/// Fraction in [0, 1] from a cap given as 0.0-1.0 or 0-100.
fn normalise_cap(cap: f64) -> Option<f64> {
    if !cap.is_finite() || cap < 0.0 || cap > 100.0 {
        None
    } else if cap <= 1.0 {
        Some(cap)
    } else {
        Some(cap / 100.0)
    }
}

/// Empty snapshot used only during construction, before `warm_start`.
fn placeholder_state(config: &SimConfig) -> FacilityState {
    FacilityState {
        clock: ClockState {
            time_s: 0.0,
            tick: 0,
            hour_of_day: 0.0,
        },
        thermal: ThermalState {
            ambient_c: config.thermal.ambient_temp_c,
            max_inlet_c: config.thermal.ambient_temp_c,
            throttled_racks: 0,
            racks: Vec::new(),
        },
        power: PowerState {
            it_load_kw: 0.0,
            total_facility_kw: 0.0,
            pue: config.power.pue_overhead_factor,
            load_fraction: 0.0,
            headroom_kw: config.power.facility_power_cap_kw,
            power_cap_exceeded: false,
            racks: Vec::new(),
        },
        gpu: crate::types::GpuState {
            avg_utilisation: 0.0,
            max_junction_temp_c: 0.0,
            thermally_throttled_servers: 0,
            ecc_errors_total: 0,
            healthy_fraction: 1.0,
            servers: Vec::new(),
        },
        network: crate::types::NetworkState {
            avg_tor_utilisation: 0.0,
            max_latency_ms: 0.0,
            racks: Vec::new(),
            spine_links: Vec::new(),
        },
        storage: crate::types::StorageState {
            total_iops: 0.0,
            avg_latency_ms: 0.0,
            avg_drive_health_pct: 100.0,
            racks: Vec::new(),
        },
        cooling: crate::types::CoolingState {
            total_cooling_output_kw: 0.0,
            cooling_power_kw: 0.0,
            chw_supply_c: 0.0,
            chw_return_c: 0.0,
            tower_outlet_c: 0.0,
            units: Vec::new(),
        },
        carbon: crate::types::CarbonState {
            intensity_g_per_kwh: 0.0,
            price_gbp_per_kwh: 0.0,
            cumulative_carbon_kg: 0.0,
            cumulative_cost_gbp: 0.0,
        },
        workload: WorkloadCounts {
            queued: 0,
            running: 0,
            completed: 0,
            failed: 0,
            preempted: 0,
            total_submitted: 0,
            sla_violations: 0,
            gpus_allocated: 0,
            gpus_total: config.facility.total_gpus(),
        },
        running_jobs: Vec::new(),
        pending_jobs: Vec::new(),
        active_failures: Vec::new(),
    }
}
