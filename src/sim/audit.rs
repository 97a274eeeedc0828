//! Append-only audit trail of operator actions and their outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SimError;

/// One recorded action, successful or rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Wall-clock time the action was received
    pub wall_time: DateTime<Utc>,
    /// Simulated time at that point
    pub sim_time_s: f64,
    pub action: String,
    pub params: serde_json::Value,
    /// `"ok"` or the error tag (`NOT_FOUND`, `CONFLICT`, ...)
    pub result: String,
    /// Short error detail when rejected
    pub detail: Option<String>,
    /// Who acted: `operator`, `scenario`, or an agent name
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        sim_time_s: f64,
        action: &str,
        params: serde_json::Value,
        outcome: &Result<(), SimError>,
        source: &str,
    ) {
        let (result, detail) = match outcome {
            Ok(()) => ("ok".to_string(), None),
            Err(e) => (e.tag().to_string(), Some(e.to_string())),
        };
        self.entries.push(AuditEntry {
            wall_time: Utc::now(),
            sim_time_s,
            action: action.to_string(),
            params,
            result,
            detail,
            source: source.to_string(),
        });
    }

    /// Last `n` entries, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<AuditEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries[skip..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }
}
