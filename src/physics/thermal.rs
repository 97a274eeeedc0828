//! Thermal model: rack energy balance, recirculation, hysteretic throttling.
//!
//! Each rack exchanges heat with its CRAC zone; a fraction of every
//! neighbour's exhaust recirculates back into the cold aisle. The inlet
//! responds to the net balance scaled by the facility's thermal mass, so
//! temperature excursions build and decay over multiple ticks rather than
//! stepping instantaneously. The throttle flag is hysteretic and consumed
//! by the scheduler on the *next* tick — the one-tick lag is the damping
//! delay of the utilisation/heat feedback loop.

use tracing::error;

use crate::config::SimConfig;
use crate::sim::facility::Facility;
use crate::sim::failures::FailureEngine;

/// Fraction of same-zone neighbour exhaust recirculated into a rack.
pub const RECIRCULATION_FRACTION: f64 = 0.08;

/// Reference CRAC setpoint for the capacity multiplier.
pub const REFERENCE_SETPOINT_C: f64 = 18.0;

/// Hysteresis band below the critical inlet temperature.
pub const THROTTLE_CLEAR_BAND_C: f64 = 2.0;

/// Hard ceiling on modelled inlet temperature.
pub const MAX_INLET_C: f64 = 60.0;

/// Diurnal ambient temperature, peaking at 14:00.
pub fn ambient_at(base_c: f64, hour_of_day: f64) -> f64 {
    base_c + 4.0 * (2.0 * std::f64::consts::PI * (hour_of_day - 14.0) / 24.0).sin()
}

#[derive(Debug, Clone)]
pub struct ThermalModel {
    /// Operator setpoint per CRAC zone
    pub setpoints: Vec<f64>,
    pub ambient_c: f64,
}

impl ThermalModel {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            setpoints: vec![config.thermal.crac_setpoint_c; config.thermal.crac_units],
            ambient_c: config.thermal.ambient_temp_c,
        }
    }

    /// Capacity multiplier for a zone's operator setpoint: lowering the
    /// setpoint below the reference buys capacity, raising it sheds some.
    pub fn setpoint_multiplier(&self, zone: usize) -> f64 {
        let sp = self.setpoints.get(zone).copied().unwrap_or(REFERENCE_SETPOINT_C);
        (1.0 + 0.02 * (REFERENCE_SETPOINT_C - sp)).clamp(0.8, 1.2)
    }

    pub fn set_setpoint(&mut self, zone: usize, setpoint_c: f64) {
        if let Some(sp) = self.setpoints.get_mut(zone) {
            *sp = setpoint_c;
        }
    }

    /// Advance every rack's thermal state by one tick.
    pub fn update(
        &mut self,
        facility: &mut Facility,
        failures: &FailureEngine,
        config: &SimConfig,
        hour_of_day: f64,
    ) {
        let ambient = ambient_at(config.thermal.ambient_temp_c, hour_of_day);
        self.ambient_c = ambient;

        let racks_per_zone = config.racks_per_zone() as f64;
        let dt_minutes = config.clock.tick_interval_s / 60.0;
        let tmc = config.thermal.thermal_mass_coefficient;
        let critical = config.thermal.critical_inlet_temp_c;

        let heats: Vec<f64> = facility.racks.iter().map(|r| r.heat_kw).collect();
        let zones: Vec<usize> = facility.racks.iter().map(|r| r.zone).collect();
        let num_racks = facility.racks.len();

        for i in 0..num_racks {
            let rack = &facility.racks[i];
            let zone = rack.zone;
            let prev_inlet = rack.inlet_c;
            let humidity = rack.humidity_pct;

            let health = failures.crac_health(zone);
            let base_remove = config.thermal.crac_cooling_capacity_kw
                * health
                * self.setpoint_multiplier(zone)
                / racks_per_zone;

            let ambient_derating = (1.0 - 0.02 * (ambient - 22.0).max(0.0)).max(0.7);
            let humidity_derating = (1.0 - 0.01 * (humidity - 60.0).max(0.0)).max(0.8);
            let inlet_derating = (1.0 - 0.02 * (prev_inlet - 30.0).max(0.0)).max(0.7);
            let effective_remove =
                base_remove * ambient_derating * humidity_derating * inlet_derating;

            // Same-zone neighbours re-ingest a slice of each other's exhaust
            let mut recirc = 0.0;
            if i > 0 && zones[i - 1] == zone {
                recirc += RECIRCULATION_FRACTION * heats[i - 1];
            }
            if i + 1 < num_racks && zones[i + 1] == zone {
                recirc += RECIRCULATION_FRACTION * heats[i + 1];
            }

            let net = heats[i] + recirc - effective_remove;
            let delta = net * tmc * dt_minutes;
            let mut inlet = prev_inlet + delta;
            if !inlet.is_finite() {
                error!(rack = i, "Non-finite inlet temperature computed - clamping to ambient");
                inlet = ambient;
            }
            let inlet = inlet.clamp(ambient, MAX_INLET_C);

            let cooling_on = health * self.setpoint_multiplier(zone) > 0.0;

            let rack = &mut facility.racks[i];
            rack.inlet_c = inlet;
            rack.outlet_c = inlet + 5.0 * heats[i];
            let cooling_term = if cooling_on { 0.3 } else { 0.0 };
            rack.humidity_pct = (45.0 - 0.5 * heats[i] + cooling_term).clamp(10.0, 90.0);
            rack.cooling_kw = effective_remove.min(heats[i] + recirc).max(0.0);

            // Hysteresis: trip at critical, clear only below critical - 2
            if inlet >= critical {
                rack.throttled = true;
            } else if inlet <= critical - THROTTLE_CLEAR_BAND_C {
                rack.throttled = false;
            }
        }
    }
}
