//! Built-in evaluation agents.
//!
//! Agents see only the per-tick snapshot and return actions; the core never
//! knows how they decide. The registry ships a do-nothing baseline and a
//! deterministic reactive policy. External (LLM or otherwise) agents
//! implement the same trait outside the core.

use crate::types::{Action, FacilityState};

/// Age before the reactive agent resolves a lingering failure.
const RESOLVE_AFTER_S: f64 = 120.0;

/// Setpoint pushed when a rack runs hot.
const EMERGENCY_SETPOINT_C: f64 = 14.0;

/// Setpoint restored once the zone has recovered.
const NORMAL_SETPOINT_C: f64 = 18.0;

/// Inlet temperature considered recovered.
const RECOVERED_INLET_C: f64 = 28.0;

/// A policy under evaluation: snapshot in, actions out.
pub trait Agent: Send {
    fn name(&self) -> &'static str;
    fn act(&mut self, state: &FacilityState) -> Vec<Action>;
}

/// Baseline: never intervenes.
pub struct NoopAgent;

impl Agent for NoopAgent {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn act(&mut self, _state: &FacilityState) -> Vec<Action> {
        Vec::new()
    }
}

/// Deterministic rule policy: resolve stale failures, crash-cool hot zones,
/// restore recovered zones, shed load on a power-cap breach.
pub struct ReactiveAgent;

impl Agent for ReactiveAgent {
    fn name(&self) -> &'static str {
        "reactive"
    }

    fn act(&mut self, state: &FacilityState) -> Vec<Action> {
        let mut actions = Vec::new();
        let now = state.clock.time_s;

        for failure in &state.active_failures {
            if now - failure.started_at > RESOLVE_AFTER_S {
                actions.push(Action::ResolveFailure {
                    failure_id: failure.id.to_string(),
                });
            }
        }

        // One cooling adjustment per zone per tick, hottest rack wins
        let mut zones_touched = Vec::new();
        for rack in &state.thermal.racks {
            if zones_touched.contains(&rack.zone) {
                continue;
            }
            let current_setpoint = state
                .cooling
                .units
                .iter()
                .find(|u| u.crac_id == rack.zone)
                .map_or(NORMAL_SETPOINT_C, |u| u.setpoint_c);

            if rack.inlet_c > 35.0 && current_setpoint > EMERGENCY_SETPOINT_C {
                actions.push(Action::AdjustCooling {
                    rack_id: rack.rack_id,
                    setpoint_c: EMERGENCY_SETPOINT_C,
                });
                zones_touched.push(rack.zone);
            } else if rack.inlet_c < RECOVERED_INLET_C
                && current_setpoint < NORMAL_SETPOINT_C
                && zone_max_inlet(state, rack.zone) < RECOVERED_INLET_C
            {
                actions.push(Action::AdjustCooling {
                    rack_id: rack.rack_id,
                    setpoint_c: NORMAL_SETPOINT_C,
                });
                zones_touched.push(rack.zone);
            }
        }

        if state.power.power_cap_exceeded {
            if let Some(victim) = state
                .running_jobs
                .iter()
                .min_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)))
            {
                actions.push(Action::PreemptJob {
                    job_id: victim.id.to_string(),
                });
            }
        }

        actions
    }
}

fn zone_max_inlet(state: &FacilityState, zone: usize) -> f64 {
    state
        .thermal
        .racks
        .iter()
        .filter(|r| r.zone == zone)
        .map(|r| r.inlet_c)
        .fold(f64::MIN, f64::max)
}

/// Instantiate a registered agent by name.
pub fn create_agent(name: &str) -> Option<Box<dyn Agent>> {
    match name {
        "noop" => Some(Box::new(NoopAgent)),
        "reactive" => Some(Box::new(ReactiveAgent)),
        _ => None,
    }
}

/// Names accepted by `create_agent`.
pub fn agent_names() -> Vec<&'static str> {
    vec!["noop", "reactive"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::sim::Simulator;

    #[test]
    fn test_registry() {
        for name in agent_names() {
            assert!(create_agent(name).is_some());
        }
        assert!(create_agent("nonexistent").is_none());
    }

    #[test]
    fn test_noop_is_silent() {
        let mut sim = Simulator::new(SimConfig::default());
        let snap = sim.tick();
        assert!(NoopAgent.act(&snap).is_empty());
    }

    #[test]
    fn test_reactive_crash_cools_hot_zone() {
        let mut sim = Simulator::new(SimConfig::default());
        sim.failures.random_rate = 0.0;
        sim.facility.racks[0].inlet_c = 45.0;
        // Snapshot reflects the forced inlet on the next tick only if heat
        // keeps it up; drive it directly through a fake state instead
        let mut snap = (*sim.tick()).clone();
        snap.thermal.racks[0].inlet_c = 45.0;

        let actions = ReactiveAgent.act(&snap);
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::AdjustCooling { rack_id: 0, setpoint_c } if *setpoint_c < 18.0
        )));
    }

    #[test]
    fn test_reactive_resolves_stale_failures() {
        let mut sim = Simulator::new(SimConfig::default());
        sim.failures.random_rate = 0.0;
        sim.inject_failure(
            crate::types::FailureType::GpuDegraded,
            "rack-0-srv-0",
            None,
            "test",
        )
        .unwrap();
        // Age the failure past the resolve threshold
        let snap = sim.tick_n(3);

        let actions = ReactiveAgent.act(&snap);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::ResolveFailure { .. })));
    }
}
