//! Evaluation harness
//!
//! Replays a scenario deterministically with an agent in the loop: reset,
//! apply overrides, then per tick inject any scripted failures, advance the
//! simulator, hand the snapshot to the agent, and apply whatever actions it
//! returns. Scoring folds every snapshot into seven dimensions at the end.

pub mod agents;
pub mod scenario;
pub mod scoring;

pub use agents::{agent_names, create_agent, Agent, NoopAgent, ReactiveAgent};
pub use scenario::{builtin_scenarios, find_scenario, Scenario, ScriptedFailure};
pub use scoring::{compute_scores, ScoreCard, ScoreCollector, ScoreInputs};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::SimError;
use crate::sim::Simulator;

/// Result of one agent/scenario evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub scenario_id: String,
    pub agent_name: String,
    pub duration_ticks: u64,
    pub scores: ScoreCard,
    pub actions_applied: u64,
    pub actions_rejected: u64,
}

/// Drive `agent` through `scenario` on `sim` and score the run.
///
/// The simulator is reset first, so the run is independent of prior state;
/// it is left paused at the scenario's final tick afterwards.
pub fn run_scenario(
    sim: &mut Simulator,
    agent: &mut dyn Agent,
    scenario: &Scenario,
) -> Result<EvalReport, SimError> {
    sim.reset()?;
    scenario.apply_overrides(sim);

    info!(scenario = %scenario.id, agent = agent.name(), ticks = scenario.duration_ticks, "Evaluation run starting");

    let mut collector = ScoreCollector::new();
    let mut actions_applied = 0u64;
    let mut actions_rejected = 0u64;

    for tick in 1..=scenario.duration_ticks {
        for scripted in scenario
            .scripted_failures
            .iter()
            .filter(|f| f.at_tick == tick)
        {
            // Scripted injections may collide with random ones; that is a
            // scenario authoring concern, not a run failure
            let _ = sim.inject_failure(
                scripted.failure_type,
                &scripted.target,
                scripted.duration_s,
                "scenario",
            );
        }

        let snapshot = sim.tick();
        collector.observe(&snapshot);

        for action in agent.act(&snapshot) {
            match sim.apply_action(&action, agent.name()) {
                Ok(()) => actions_applied += 1,
                Err(_) => actions_rejected += 1,
            }
        }
    }

    let inputs = collector.finalise();
    let scores = compute_scores(&inputs, scenario, &sim.config);
    info!(
        scenario = %scenario.id,
        agent = agent.name(),
        composite = scores.composite,
        "Evaluation run complete"
    );

    Ok(EvalReport {
        scenario_id: scenario.id.clone(),
        agent_name: agent.name().to_string(),
        duration_ticks: scenario.duration_ticks,
        scores,
        actions_applied,
        actions_rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    #[test]
    fn test_noop_run_produces_scores_in_range() {
        let mut sim = Simulator::new(SimConfig::default());
        let scenario = find_scenario("thermal_crisis").unwrap();
        let mut agent = NoopAgent;

        let report = run_scenario(&mut sim, &mut agent, &scenario).unwrap();
        assert_eq!(report.duration_ticks, 60);
        for s in [
            report.scores.sla,
            report.scores.energy,
            report.scores.carbon,
            report.scores.thermal,
            report.scores.cost,
            report.scores.infra_health,
            report.scores.failure_response,
            report.scores.composite,
        ] {
            assert!((0.0..=100.0).contains(&s), "score out of range: {s}");
        }
        assert_eq!(report.actions_applied + report.actions_rejected, 0);
    }

    #[test]
    fn test_run_is_deterministic_for_same_agent() {
        let mut sim = Simulator::new(SimConfig::default());
        let scenario = find_scenario("thermal_crisis").unwrap();

        let a = run_scenario(&mut sim, &mut NoopAgent, &scenario).unwrap();
        let b = run_scenario(&mut sim, &mut NoopAgent, &scenario).unwrap();
        assert_eq!(a.scores.composite, b.scores.composite);
        assert_eq!(a.scores.thermal, b.scores.thermal);
    }

    #[test]
    fn test_reactive_agent_takes_actions_under_failures() {
        let mut sim = Simulator::new(SimConfig::default());
        let scenario = find_scenario("failure_storm").unwrap();
        let mut agent = ReactiveAgent;

        let report = run_scenario(&mut sim, &mut agent, &scenario).unwrap();
        assert!(
            report.actions_applied > 0,
            "reactive agent should have resolved failures"
        );
    }
}
