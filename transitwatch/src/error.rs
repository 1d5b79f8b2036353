//! Error types for the synchronization engine.
//!
//! No error here is fatal. Each one degrades to "skip this cycle's update"
//! and is reported to observers as a [`CycleErrorKind`].

use thiserror::Error;

use crate::reconcile::ReconcileError;
use crate::scheduler::SessionId;
use crate::source::SourceError;

/// Errors raised while running a poll cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A backend entry failed validation and was skipped.
    #[error("invalid vehicle data for '{id}': {reason}")]
    InvalidData { id: String, reason: String },

    /// The vehicle exists but has not reported coordinates yet.
    #[error("vehicle '{id}' has no location yet")]
    PendingLocation { id: String },

    /// Fetch, transport, or payload failure.
    #[error("network error: {0}")]
    Network(#[from] SourceError),

    /// Results arrived for a session that is no longer active.
    #[error("results from superseded session {session} discarded")]
    SessionSuperseded { session: SessionId },
}

impl SyncError {
    /// Classify this error for observers.
    ///
    /// Returns `None` for internal signals that are never surfaced.
    pub fn kind(&self) -> Option<CycleErrorKind> {
        match self {
            SyncError::InvalidData { .. } => Some(CycleErrorKind::InvalidData),
            SyncError::PendingLocation { .. } => Some(CycleErrorKind::PendingLocation),
            SyncError::Network(SourceError::Malformed { .. }) => Some(CycleErrorKind::Malformed),
            SyncError::Network(_) => Some(CycleErrorKind::Network),
            SyncError::SessionSuperseded { .. } => None,
        }
    }
}

impl From<ReconcileError> for SyncError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::InvalidData { id, reason } => SyncError::InvalidData { id, reason },
            ReconcileError::PendingLocation { id } => SyncError::PendingLocation { id },
        }
    }
}

/// Errors from constructing a [`PollingScheduler`](crate::scheduler::PollingScheduler).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No tokio runtime was available to drive poll sessions.
    #[error("no tokio runtime available; build the scheduler inside a runtime or pass a handle")]
    NoRuntime,
}

/// Category of a non-fatal cycle failure, as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleErrorKind {
    /// Transport failure or non-success HTTP status.
    Network,
    /// Response body could not be parsed.
    Malformed,
    /// One or more backend entries were skipped.
    InvalidData,
    /// The followed vehicle has no location yet.
    PendingLocation,
}

impl CycleErrorKind {
    /// Short status text for display.
    pub fn display_status(&self) -> &'static str {
        match self {
            CycleErrorKind::Network => "Connection problem",
            CycleErrorKind::Malformed => "Unexpected response",
            CycleErrorKind::InvalidData => "Some vehicles skipped",
            CycleErrorKind::PendingLocation => "Waiting for location",
        }
    }
}

impl std::fmt::Display for CycleErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleErrorKind::Network => "network",
            CycleErrorKind::Malformed => "malformed",
            CycleErrorKind::InvalidData => "invalid-data",
            CycleErrorKind::PendingLocation => "pending-location",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_kinds() {
        let http = SyncError::from(SourceError::Http {
            status: 503,
            url: "http://x/api/vehicles".to_string(),
        });
        assert_eq!(http.kind(), Some(CycleErrorKind::Network));

        let malformed = SyncError::from(SourceError::Malformed {
            url: "http://x/api/vehicles".to_string(),
            reason: "expected value".to_string(),
        });
        assert_eq!(malformed.kind(), Some(CycleErrorKind::Malformed));
    }

    #[test]
    fn test_superseded_is_not_surfaced() {
        let err = SyncError::SessionSuperseded {
            session: SessionId::new(3),
        };
        assert!(err.kind().is_none());
        assert!(err.to_string().contains("session #3"));
    }

    #[test]
    fn test_from_reconcile_error() {
        let err: SyncError = ReconcileError::PendingLocation {
            id: "v1".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::PendingLocation { ref id } if id == "v1"));
        assert_eq!(err.kind(), Some(CycleErrorKind::PendingLocation));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CycleErrorKind::PendingLocation.to_string(), "pending-location");
        assert_eq!(CycleErrorKind::Network.display_status(), "Connection problem");
    }
}
