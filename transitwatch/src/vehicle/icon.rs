//! Mode → icon key resolution.
//!
//! The presentation layer owns the actual icons; the core only needs a stable
//! key per vehicle so markers can be chosen without re-deriving it.

use std::collections::HashSet;

/// Icon key used when a mode has no dedicated icon.
pub const DEFAULT_ICON_KEY: &str = "default";

/// Modes with a dedicated icon out of the box.
pub const DEFAULT_ICON_MODES: &[&str] = &["bus", "taxi", "keke", "okada", "poda-poda", "ferry"];

/// Resolves a transport mode to an icon key.
pub trait IconResolver: Send + Sync {
    /// Returns the icon key for `mode`.
    ///
    /// Matching is case-insensitive; unknown modes map to a default key.
    fn resolve(&self, mode: &str) -> String;
}

/// Icon resolver backed by a fixed set of known modes.
#[derive(Debug, Clone)]
pub struct KnownModeIcons {
    modes: HashSet<String>,
    fallback: String,
}

impl Default for KnownModeIcons {
    fn default() -> Self {
        Self::new(DEFAULT_ICON_MODES.iter().copied(), DEFAULT_ICON_KEY)
    }
}

impl KnownModeIcons {
    /// Create a resolver for the given modes and fallback key.
    pub fn new<I, S>(modes: I, fallback: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let modes = modes
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        Self {
            modes,
            fallback: fallback.into(),
        }
    }

    /// Number of modes with a dedicated icon.
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Returns true if no modes are configured.
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

impl IconResolver for KnownModeIcons {
    fn resolve(&self, mode: &str) -> String {
        let key = mode.trim().to_lowercase();
        if self.modes.contains(&key) {
            key
        } else {
            self.fallback.clone()
        }
    }
}
