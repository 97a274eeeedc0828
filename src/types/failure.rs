//! Failure events: types, targets, and the active-failure record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of infrastructure failure the engine can carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// CRAC effective cooling capacity halved
    CracDegraded,
    /// CRAC effective cooling capacity zeroed
    CracFailure,
    /// Server utilisation capped at 0.3 until resolved
    GpuDegraded,
    /// Rack power multiplied by the spike factor
    PduSpike,
    /// All jobs on the rack fail; one-shot
    NetworkPartition,
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureType::CracDegraded => write!(f, "crac_degraded"),
            FailureType::CracFailure => write!(f, "crac_failure"),
            FailureType::GpuDegraded => write!(f, "gpu_degraded"),
            FailureType::PduSpike => write!(f, "pdu_spike"),
            FailureType::NetworkPartition => write!(f, "network_partition"),
        }
    }
}

/// Parsed failure target. Serialises back to the wire string form
/// (`rack-3`, `crac-0`, `rack-2-srv-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureTarget {
    Rack(usize),
    Crac(usize),
    Server { rack: usize, srv: usize },
}

impl FailureTarget {
    /// Parse a wire target string. Returns `None` when the shape is wrong;
    /// bounds against the facility are checked by the failure engine.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        match parts.as_slice() {
            ["rack", r] => r.parse().ok().map(FailureTarget::Rack),
            ["crac", u] => u.parse().ok().map(FailureTarget::Crac),
            ["rack", r, "srv", s] => {
                let rack = r.parse().ok()?;
                let srv = s.parse().ok()?;
                Some(FailureTarget::Server { rack, srv })
            }
            _ => None,
        }
    }

    /// Rack touched by this target, if any (CRAC targets map to a zone,
    /// not a single rack).
    pub fn rack(&self) -> Option<usize> {
        match self {
            FailureTarget::Rack(r) => Some(*r),
            FailureTarget::Server { rack, .. } => Some(*rack),
            FailureTarget::Crac(_) => None,
        }
    }
}

impl std::fmt::Display for FailureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureTarget::Rack(r) => write!(f, "rack-{r}"),
            FailureTarget::Crac(u) => write!(f, "crac-{u}"),
            FailureTarget::Server { rack, srv } => write!(f, "rack-{rack}-srv-{srv}"),
        }
    }
}

impl Serialize for FailureTarget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FailureTarget {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FailureTarget::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("malformed failure target: {s}")))
    }
}

/// One live failure in the engine's active set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveFailure {
    pub id: Uuid,
    pub failure_type: FailureType,
    pub target: FailureTarget,
    pub started_at: f64,
    /// `None` means "until resolved"
    pub expires_at: Option<f64>,
    /// Rack power multiplier carried by `pdu_spike`
    pub power_multiplier: Option<f64>,
    /// Set once a one-shot failure (network_partition) has been applied
    #[serde(default)]
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_shapes() {
        assert_eq!(FailureTarget::parse("rack-3"), Some(FailureTarget::Rack(3)));
        assert_eq!(FailureTarget::parse("crac-0"), Some(FailureTarget::Crac(0)));
        assert_eq!(
            FailureTarget::parse("rack-2-srv-1"),
            Some(FailureTarget::Server { rack: 2, srv: 1 })
        );
        assert_eq!(FailureTarget::parse("rack-"), None);
        assert_eq!(FailureTarget::parse("server-1"), None);
        assert_eq!(FailureTarget::parse("rack-x"), None);
        assert_eq!(FailureTarget::parse(""), None);
    }

    #[test]
    fn test_target_display_roundtrip() {
        for s in ["rack-7", "crac-1", "rack-0-srv-3"] {
            let t = FailureTarget::parse(s).unwrap();
            assert_eq!(t.to_string(), s);
        }
    }

    #[test]
    fn test_failure_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&FailureType::CracDegraded).unwrap(),
            "\"crac_degraded\""
        );
        let t: FailureType = serde_json::from_str("\"network_partition\"").unwrap();
        assert_eq!(t, FailureType::NetworkPartition);
    }
}
