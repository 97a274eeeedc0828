//! Facility configuration - all simulation tunables as operator-editable YAML
//!
//! Every constant the physics models depend on is a field here, grouped by
//! subsystem. Each section implements `Default` with the reference facility
//! values, so the simulator runs identically with no config file present.
//!
//! ## Loading Order
//!
//! 1. `DC_SIM_CONFIG` environment variable (path to YAML file)
//! 2. `dcsim.yaml` in the current working directory
//! 3. Built-in defaults
//!
//! Unknown keys are rejected at load time rather than warned about: a typo
//! in a tunable silently reverting to a default would invalidate any
//! evaluation run made against that file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV_VAR: &str = "DC_SIM_CONFIG";

/// Fallback config file searched in the working directory.
pub const CONFIG_LOCAL_FILE: &str = "dcsim.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one simulated facility.
///
/// Immutable after startup; `Simulator::reset()` rebuilds every component
/// from the same `SimConfig` and seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Rack / server / GPU topology
    #[serde(default)]
    pub facility: FacilityConfig,

    /// Thermal envelope and CRAC parameters
    #[serde(default)]
    pub thermal: ThermalConfig,

    /// Electrical model parameters
    #[serde(default)]
    pub power: PowerConfig,

    /// Job arrival process
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// Simulated clock
    #[serde(default)]
    pub clock: ClockConfig,

    /// Seed for the single RNG stream shared by all stochastic models
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            facility: FacilityConfig::default(),
            thermal: ThermalConfig::default(),
            power: PowerConfig::default(),
            workload: WorkloadConfig::default(),
            clock: ClockConfig::default(),
            rng_seed: default_rng_seed(),
        }
    }
}

fn default_rng_seed() -> u64 {
    42
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacilityConfig {
    pub num_racks: usize,
    pub servers_per_rack: usize,
    pub gpus_per_server: u32,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            num_racks: 8,
            servers_per_rack: 4,
            gpus_per_server: 4,
        }
    }
}

impl FacilityConfig {
    /// Total GPU slots fleet-wide.
    pub fn total_gpus(&self) -> u32 {
        (self.num_racks * self.servers_per_rack) as u32 * self.gpus_per_server
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThermalConfig {
    pub ambient_temp_c: f64,
    pub crac_setpoint_c: f64,
    pub crac_cooling_capacity_kw: f64,
    pub thermal_mass_coefficient: f64,
    pub max_safe_inlet_temp_c: f64,
    pub critical_inlet_temp_c: f64,
    pub crac_units: usize,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            ambient_temp_c: 22.0,
            crac_setpoint_c: 18.0,
            crac_cooling_capacity_kw: 50.0,
            thermal_mass_coefficient: 0.3,
            max_safe_inlet_temp_c: 35.0,
            critical_inlet_temp_c: 40.0,
            crac_units: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerConfig {
    pub gpu_tdp_watts: f64,
    pub server_base_power_watts: f64,
    pub pdu_capacity_kw: f64,
    pub facility_power_cap_kw: f64,
    pub pue_overhead_factor: f64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            gpu_tdp_watts: 300.0,
            server_base_power_watts: 200.0,
            pdu_capacity_kw: 20.0,
            facility_power_cap_kw: 120.0,
            pue_overhead_factor: 1.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadConfig {
    pub mean_job_arrival_interval_s: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            mean_job_arrival_interval_s: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    pub tick_interval_s: f64,
    pub realtime_factor: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_s: 60.0,
            realtime_factor: 0.0,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl SimConfig {
    /// Load configuration using the standard search order:
    /// 1. `$DC_SIM_CONFIG` environment variable
    /// 2. `./dcsim.yaml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from DC_SIM_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from DC_SIM_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "DC_SIM_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(CONFIG_LOCAL_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{CONFIG_LOCAL_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{CONFIG_LOCAL_FILE}, using defaults");
                }
            }
        }

        info!("No {CONFIG_LOCAL_FILE} found - using built-in defaults");
        Self::default()
    }

    /// Load from a specific YAML file path. Unknown keys are an error.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check ranges that would make the tick loop degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.facility.num_racks == 0 {
            return Err(ConfigError::Invalid("facility.num_racks must be >= 1".into()));
        }
        if self.facility.servers_per_rack == 0 {
            return Err(ConfigError::Invalid(
                "facility.servers_per_rack must be >= 1".into(),
            ));
        }
        if self.facility.gpus_per_server == 0 {
            return Err(ConfigError::Invalid(
                "facility.gpus_per_server must be >= 1".into(),
            ));
        }
        if self.thermal.crac_units == 0 {
            return Err(ConfigError::Invalid("thermal.crac_units must be >= 1".into()));
        }
        if self.facility.num_racks % self.thermal.crac_units != 0 {
            return Err(ConfigError::Invalid(format!(
                "facility.num_racks ({}) must divide evenly into thermal.crac_units ({}) zones",
                self.facility.num_racks, self.thermal.crac_units
            )));
        }
        if self.thermal.critical_inlet_temp_c <= self.thermal.max_safe_inlet_temp_c {
            return Err(ConfigError::Invalid(
                "thermal.critical_inlet_temp_c must exceed max_safe_inlet_temp_c".into(),
            ));
        }
        if self.clock.tick_interval_s <= 0.0 {
            return Err(ConfigError::Invalid("clock.tick_interval_s must be > 0".into()));
        }
        if self.clock.realtime_factor < 0.0 {
            return Err(ConfigError::Invalid("clock.realtime_factor must be >= 0".into()));
        }
        if self.workload.mean_job_arrival_interval_s <= 0.0 {
            return Err(ConfigError::Invalid(
                "workload.mean_job_arrival_interval_s must be > 0".into(),
            ));
        }
        if self.power.facility_power_cap_kw <= 0.0 {
            return Err(ConfigError::Invalid(
                "power.facility_power_cap_kw must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Racks served by each CRAC unit.
    pub fn racks_per_zone(&self) -> usize {
        self.facility.num_racks / self.thermal.crac_units
    }

    /// CRAC zone serving the given rack.
    pub fn zone_of_rack(&self, rack_id: usize) -> usize {
        rack_id * self.thermal.crac_units / self.facility.num_racks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_facility() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.facility.num_racks, 8);
        assert_eq!(cfg.facility.servers_per_rack, 4);
        assert_eq!(cfg.facility.gpus_per_server, 4);
        assert_eq!(cfg.facility.total_gpus(), 128);
        assert_eq!(cfg.thermal.crac_units, 2);
        assert_eq!(cfg.rng_seed, 42);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zone_mapping_contiguous_halves() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.racks_per_zone(), 4);
        for rack in 0..4 {
            assert_eq!(cfg.zone_of_rack(rack), 0);
        }
        for rack in 4..8 {
            assert_eq!(cfg.zone_of_rack(rack), 1);
        }
    }

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = r#"
facility:
  num_racks: 4
  servers_per_rack: 2
  gpus_per_server: 8
thermal:
  ambient_temp_c: 25.0
  crac_setpoint_c: 18.0
  crac_cooling_capacity_kw: 40.0
  thermal_mass_coefficient: 0.3
  max_safe_inlet_temp_c: 35.0
  critical_inlet_temp_c: 40.0
  crac_units: 2
rng_seed: 7
"#;
        let cfg: SimConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.facility.num_racks, 4);
        assert_eq!(cfg.thermal.ambient_temp_c, 25.0);
        assert_eq!(cfg.rng_seed, 7);
        // Omitted sections fall back to defaults
        assert_eq!(cfg.power.gpu_tdp_watts, 300.0);
        assert_eq!(cfg.clock.tick_interval_s, 60.0);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let yaml = r#"
facility:
  num_racks: 8
  servers_per_rack: 4
  gpus_per_server: 4
  num_typo_field: 3
"#;
        assert!(serde_yaml::from_str::<SimConfig>(yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_uneven_zones() {
        let mut cfg = SimConfig::default();
        cfg.facility.num_racks = 7;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let mut cfg = SimConfig::default();
        cfg.clock.tick_interval_s = 0.0;
        assert!(cfg.validate().is_err());
    }
}
