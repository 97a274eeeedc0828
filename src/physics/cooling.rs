//! Cooling plant telemetry: CRAC units, chilled-water loop, tower, COP.
//!
//! Each CRAC absorbs the heat the thermal model removed from its zone's
//! racks. COP degrades in hot ambient and improves slightly in cool
//! ambient, clamped to the plant's physical envelope.

use crate::config::SimConfig;
use crate::physics::thermal::ThermalModel;
use crate::sim::facility::Facility;
use crate::sim::failures::FailureEngine;
use crate::types::{CoolingState, CracUnitState};

/// Design-point coefficient of performance.
pub const BASE_COP: f64 = 4.0;

/// Design chilled-water supply temperature.
pub const CHW_SUPPLY_C: f64 = 7.0;

/// Cooling-tower approach above ambient.
pub const TOWER_APPROACH_C: f64 = 4.0;

/// Plant COP at the given ambient temperature, clamped to [2, 6].
pub fn cop_at(ambient_c: f64) -> f64 {
    (BASE_COP * (1.0 - 0.02 * (ambient_c - 22.0).max(0.0))
        * (1.0 + 0.1 * (22.0 - ambient_c).max(0.0)))
    .clamp(2.0, 6.0)
}

#[derive(Debug, Clone)]
pub struct CoolingModel {
    pub state: CoolingState,
}

impl CoolingModel {
    pub fn new() -> Self {
        Self {
            state: CoolingState {
                total_cooling_output_kw: 0.0,
                cooling_power_kw: 0.0,
                chw_supply_c: CHW_SUPPLY_C,
                chw_return_c: CHW_SUPPLY_C,
                tower_outlet_c: 0.0,
                units: Vec::new(),
            },
        }
    }

    pub fn update(
        &mut self,
        facility: &Facility,
        thermal: &ThermalModel,
        failures: &FailureEngine,
        config: &SimConfig,
    ) {
        let ambient = thermal.ambient_c;
        let cop = cop_at(ambient);

        let mut units = Vec::with_capacity(config.thermal.crac_units);
        let mut total_output = 0.0;
        for crac_id in 0..config.thermal.crac_units {
            let output: f64 = facility.zone_racks(crac_id).map(|r| r.cooling_kw).sum();
            total_output += output;
            units.push(CracUnitState {
                crac_id,
                setpoint_c: thermal
                    .setpoints
                    .get(crac_id)
                    .copied()
                    .unwrap_or(config.thermal.crac_setpoint_c),
                health: failures.crac_health(crac_id),
                cooling_output_kw: output,
                cop,
            });
        }

        self.state = CoolingState {
            total_cooling_output_kw: total_output,
            cooling_power_kw: total_output / cop,
            chw_supply_c: CHW_SUPPLY_C,
            chw_return_c: CHW_SUPPLY_C + 0.02 * total_output,
            tower_outlet_c: ambient + TOWER_APPROACH_C,
            units,
        };
    }
}

impl Default for CoolingModel {
    fn default() -> Self {
        Self::new()
    }
}
