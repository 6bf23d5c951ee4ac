//! Shared value types used across the session server workspace.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hex-encoded SHA-256 digest, validated at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Wraps an already-lowercased 64-char hex digest, validating its shape.
    pub fn from_hex(hex: impl Into<String>) -> Option<Self> {
        let hex = hex.into();
        if hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(hex.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// Returns the digest as a lowercase hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a provisioned container (VM domain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Domain is defined and starting, no IP acquired yet.
    Starting,
    /// Domain is running and reachable.
    Running,
    /// Domain was stopped (deliberately or detected dead by the reaper).
    Stopped,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// A freshly-generated UUIDv4 identifying a container/session.
#[must_use]
pub fn new_container_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Runtime snapshot returned by the `Stat` verb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeStats {
    /// Server version string.
    pub version: String,
    /// Seconds since the engine started accepting connections.
    pub uptime_secs: u64,
    /// Number of container slots currently in use.
    pub used_slots: u32,
    /// Total configured container slots, or `None` if the server is uncapped.
    pub total_slots: Option<u32>,
}

impl RuntimeStats {
    /// Number of slots still available for new `Create` requests, or `None`
    /// if the server has no configured cap.
    #[must_use]
    pub fn available_slots(&self) -> Option<u32> {
        self.total_slots
            .map(|total| total.saturating_sub(self.used_slots))
    }
}
