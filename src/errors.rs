//! Domain error kinds for operator actions.
//!
//! Every action method on the simulator returns `Result<_, SimError>`; the
//! HTTP boundary maps the four kinds onto status codes (404 / 400 / 409 /
//! 412). Errors never leave state half-applied: validation happens before
//! any mutation.

use thiserror::Error;

/// Category of a rejected operator action.
#[derive(Debug, Clone, Error)]
pub enum SimError {
    /// Unknown job, rack, server, or failure id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed id, out-of-range setpoint or cap fraction.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Job not in the required state, duplicate failure, insufficient capacity.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation requires the auto-ticker to be paused first.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
}

impl SimError {
    /// Short machine-readable tag recorded in the audit log.
    pub fn tag(&self) -> &'static str {
        match self {
            SimError::NotFound(_) => "NOT_FOUND",
            SimError::InvalidArgument(_) => "INVALID_ARGUMENT",
            SimError::Conflict(_) => "CONFLICT",
            SimError::PreconditionFailed(_) => "PRECONDITION_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(SimError::NotFound("x".into()).tag(), "NOT_FOUND");
        assert_eq!(SimError::InvalidArgument("x".into()).tag(), "INVALID_ARGUMENT");
        assert_eq!(SimError::Conflict("x".into()).tag(), "CONFLICT");
        assert_eq!(
            SimError::PreconditionFailed("x".into()).tag(),
            "PRECONDITION_FAILED"
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let e = SimError::NotFound("job abc".into());
        assert!(e.to_string().contains("job abc"));
    }
}
