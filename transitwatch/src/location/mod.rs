//! User position supplied by an external geolocation collaborator.
//!
//! The core only ever reads the user position. It is set on the
//! collaborator's own schedule, not synchronized with poll cycles, so a cycle
//! may see a stale or absent value.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::geo::Position;

/// Source of the user's current position.
pub trait UserPositionProvider: Send + Sync {
    /// The latest known user position, if any.
    fn user_position(&self) -> Option<Position>;
}

/// Thread-safe user position shared between the geolocation collaborator
/// (writer) and the scheduler (reader).
///
/// # Example
///
/// ```
/// use transitwatch::geo::Position;
/// use transitwatch::location::{SharedUserPosition, UserPositionProvider};
///
/// let position = SharedUserPosition::new();
/// assert!(position.user_position().is_none());
///
/// position.set(Position::new(8.48, -13.22));
/// assert_eq!(position.user_position(), Some(Position::new(8.48, -13.22)));
/// ```
#[derive(Debug, Default, Clone)]
pub struct SharedUserPosition {
    inner: Arc<RwLock<Option<Position>>>,
}

impl SharedUserPosition {
    /// Create with no known position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with an initial position.
    pub fn with_position(position: Option<Position>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(position)),
        }
    }

    /// Update the position.
    ///
    /// Non-finite positions are ignored and return false.
    pub fn set(&self, position: Position) -> bool {
        if !position.is_finite() {
            tracing::warn!(%position, "Ignoring non-finite user position");
            return false;
        }
        *self.inner.write() = Some(position);
        true
    }

    /// Forget the position (e.g. geolocation permission revoked).
    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

impl UserPositionProvider for SharedUserPosition {
    fn user_position(&self) -> Option<Position> {
        *self.inner.read()
    }
}
