//! Operator actions — the tagged union agents and API clients submit.

use serde::{Deserialize, Serialize};

use super::FailureType;

/// One intervention against the running simulation.
///
/// Wire shape is a tagged JSON object, e.g.
/// `{"action": "adjust_cooling", "rack_id": 2, "setpoint_c": 16.0}`.
/// Actions submitted during a tick take effect on the next tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    MigrateWorkload {
        job_id: String,
        target_rack: usize,
    },
    AdjustCooling {
        rack_id: usize,
        setpoint_c: f64,
    },
    ThrottleGpu {
        server_id: String,
        /// Accepted as either 0-100 or 0.0-1.0; normalised to a fraction
        power_cap_pct: f64,
    },
    PreemptJob {
        job_id: String,
    },
    ResolveFailure {
        failure_id: String,
    },
    InjectFailure {
        failure_type: FailureType,
        target: String,
        duration_s: Option<f64>,
    },
}

impl Action {
    /// Action name as recorded in the audit log.
    pub fn name(&self) -> &'static str {
        match self {
            Action::MigrateWorkload { .. } => "migrate_workload",
            Action::AdjustCooling { .. } => "adjust_cooling",
            Action::ThrottleGpu { .. } => "throttle_gpu",
            Action::PreemptJob { .. } => "preempt_job",
            Action::ResolveFailure { .. } => "resolve_failure",
            Action::InjectFailure { .. } => "inject_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_wire_shape() {
        let a = Action::AdjustCooling {
            rack_id: 2,
            setpoint_c: 16.0,
        };
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["action"], "adjust_cooling");
        assert_eq!(json["rack_id"], 2);

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_inject_failure_parses_optional_duration() {
        let a: Action = serde_json::from_str(
            r#"{"action": "inject_failure", "failure_type": "pdu_spike", "target": "rack-1"}"#,
        )
        .unwrap();
        match a {
            Action::InjectFailure {
                failure_type,
                target,
                duration_s,
            } => {
                assert_eq!(failure_type, FailureType::PduSpike);
                assert_eq!(target, "rack-1");
                assert!(duration_s.is_none());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
