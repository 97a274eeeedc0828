//! Grid carbon intensity, electricity price, cumulative emissions and cost.
//!
//! Intensity follows a 24-hour sinusoid: cleanest around 03:00 (≈140
//! gCO₂/kWh, overnight wind), dirtiest around 15:00 (≈280, afternoon
//! peakers), with small Gaussian jitter. Price follows the UK-shaped
//! double-peak day. Cumulative fields integrate facility power per tick.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::types::CarbonState;

/// Mean grid carbon intensity (gCO₂/kWh).
pub const INTENSITY_MEAN_G: f64 = 210.0;

/// Sinusoid amplitude around the mean.
pub const INTENSITY_AMPLITUDE_G: f64 = 70.0;

/// Gaussian jitter on the intensity curve.
pub const INTENSITY_SIGMA_G: f64 = 5.0;

/// Price per hour of day (GBP/kWh): overnight trough, morning and evening
/// peaks, shoulder values interpolating the documented control points.
const PRICE_BY_HOUR: [f64; 24] = [
    0.13, 0.10, 0.10, 0.10, 0.10, 0.10, // 00-05
    0.17, 0.23, 0.23, 0.23, 0.19, // 06-10
    0.15, 0.15, 0.15, 0.15, 0.15, // 11-15
    0.18, 0.21, 0.21, 0.21, 0.17, // 16-20
    0.13, 0.13, 0.13, // 21-23
];

/// Noiseless carbon intensity at the given hour.
pub fn intensity_curve(hour_of_day: f64) -> f64 {
    INTENSITY_MEAN_G
        + INTENSITY_AMPLITUDE_G
            * (2.0 * std::f64::consts::PI * (hour_of_day - 9.0) / 24.0).sin()
}

/// Electricity price at the given hour.
pub fn price_at(hour_of_day: f64) -> f64 {
    PRICE_BY_HOUR[(hour_of_day as usize).min(23)]
}

#[derive(Debug, Clone)]
pub struct CarbonModel {
    pub state: CarbonState,
}

impl CarbonModel {
    pub fn new() -> Self {
        Self {
            state: CarbonState {
                intensity_g_per_kwh: intensity_curve(0.0),
                price_gbp_per_kwh: price_at(0.0),
                cumulative_carbon_kg: 0.0,
                cumulative_cost_gbp: 0.0,
            },
        }
    }

    pub fn update(
        &mut self,
        total_facility_kw: f64,
        hour_of_day: f64,
        tick_interval_s: f64,
        rng: &mut StdRng,
    ) {
        let noise: f64 = rng.sample::<f64, _>(StandardNormal) * INTENSITY_SIGMA_G;
        let intensity = (intensity_curve(hour_of_day) + noise).max(0.0);
        let price = price_at(hour_of_day);

        let energy_kwh = total_facility_kw.max(0.0) * tick_interval_s / 3600.0;
        self.state = CarbonState {
            intensity_g_per_kwh: intensity,
            price_gbp_per_kwh: price,
            cumulative_carbon_kg: self.state.cumulative_carbon_kg
                + energy_kwh * intensity / 1000.0,
            cumulative_cost_gbp: self.state.cumulative_cost_gbp + energy_kwh * price,
        };
    }
}

impl Default for CarbonModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_intensity_extremes_at_documented_hours() {
        assert!((intensity_curve(3.0) - 140.0).abs() < 1e-9);
        assert!((intensity_curve(15.0) - 280.0).abs() < 1e-9);
        // Scan for extremes
        let mut min_h = 0.0f64;
        let mut max_h = 0.0f64;
        let (mut min_v, mut max_v) = (f64::MAX, f64::MIN);
        for i in 0..240 {
            let h = i as f64 / 10.0;
            let v = intensity_curve(h);
            if v < min_v {
                min_v = v;
                min_h = h;
            }
            if v > max_v {
                max_v = v;
                max_h = h;
            }
        }
        assert!((min_h - 3.0).abs() < 0.2);
        assert!((max_h - 15.0).abs() < 0.2);
    }

    #[test]
    fn test_price_double_peak() {
        assert_eq!(price_at(2.0), 0.10);
        assert_eq!(price_at(8.0), 0.23);
        assert_eq!(price_at(13.0), 0.15);
        assert_eq!(price_at(18.0), 0.21);
        assert_eq!(price_at(22.0), 0.13);
        assert_eq!(price_at(0.5), 0.13);
    }

    #[test]
    fn test_cumulative_monotonic() {
        let mut model = CarbonModel::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut last_kg = 0.0;
        let mut last_gbp = 0.0;
        for t in 0..1440 {
            let hour = (t as f64 * 60.0 / 3600.0) % 24.0;
            model.update(50.0, hour, 60.0, &mut rng);
            assert!(model.state.cumulative_carbon_kg >= last_kg);
            assert!(model.state.cumulative_cost_gbp >= last_gbp);
            last_kg = model.state.cumulative_carbon_kg;
            last_gbp = model.state.cumulative_cost_gbp;
        }
        // 24h at 50 kW and ~210 g/kWh mean: ~252 kg
        assert!(last_kg > 180.0 && last_kg < 330.0, "got {last_kg}");
    }
}
