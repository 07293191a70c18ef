//! Adversarial manipulation state.
//!
//! The operator can simulate an attack on the physical source. The
//! sensor obeys the mode when producing cycles; the engine only uses
//! it to decide how the live health score is computed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejected attack mode literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid attack mode {0:?} (expected NONE, FREEZE, BRIGHTNESS or PATTERN)")]
pub struct AttackModeError(pub String);

/// Simulated manipulation of the motion source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackMode {
    /// Unmanipulated feed.
    #[default]
    None,
    /// Feed replaced by the last pre-attack frame.
    Freeze,
    /// Sensor saturated to full brightness.
    Brightness,
    /// Feed replaced by a predictable checkerboard.
    Pattern,
}

impl AttackMode {
    /// All modes in declaration order.
    pub const ALL: [AttackMode; 4] = [
        AttackMode::None,
        AttackMode::Freeze,
        AttackMode::Brightness,
        AttackMode::Pattern,
    ];

    /// Canonical upper-case literal.
    pub fn as_str(self) -> &'static str {
        match self {
            AttackMode::None => "NONE",
            AttackMode::Freeze => "FREEZE",
            AttackMode::Brightness => "BRIGHTNESS",
            AttackMode::Pattern => "PATTERN",
        }
    }

    /// Returns true for any mode other than `None`.
    pub fn is_active(self) -> bool {
        self != AttackMode::None
    }

    /// Stable numeric code used for the metrics gauge.
    pub fn code(self) -> i64 {
        match self {
            AttackMode::None => 0,
            AttackMode::Freeze => 1,
            AttackMode::Brightness => 2,
            AttackMode::Pattern => 3,
        }
    }
}

impl FromStr for AttackMode {
    type Err = AttackModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttackMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AttackModeError(s.to_string()))
    }
}

impl fmt::Display for AttackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-controlled adversary configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackState {
    /// Current manipulation mode.
    pub mode: AttackMode,
    /// Whether the DRBG fallback protects key generation.
    pub drbg_fallback: bool,
}

impl AttackState {
    /// True when an attack is active and no fallback protects the system.
    pub fn is_compromised(&self) -> bool {
        self.mode.is_active() && !self.drbg_fallback
    }
}
