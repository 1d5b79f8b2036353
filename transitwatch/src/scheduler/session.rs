//! Poll session identity and mode.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Identity of one poll session.
///
/// Ids are unique per scheduler and increase monotonically; every cycle is
/// tagged with the id of the session that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a session polls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollMode {
    /// Every vehicle the backend reports.
    All,
    /// One vehicle by id.
    Single(String),
}

impl PollMode {
    /// The followed vehicle id in SINGLE mode.
    pub fn vehicle_id(&self) -> Option<&str> {
        match self {
            PollMode::All => None,
            PollMode::Single(id) => Some(id),
        }
    }
}

impl std::fmt::Display for PollMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollMode::All => f.write_str("all"),
            PollMode::Single(id) => write!(f, "single({})", id),
        }
    }
}

/// An active poll session.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSession {
    /// Session identity.
    pub id: SessionId,
    /// What the session polls for.
    pub mode: PollMode,
    /// Time between cycles.
    pub interval: Duration,
    /// When the session started.
    pub started_at: DateTime<Utc>,
}
