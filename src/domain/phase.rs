//! Lifecycle phase of a stream instance.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Stage of a stream's lifecycle.
///
/// `Waiting -> Bootstrapping -> Active -> Ended` advance with time alone.
/// The settled phases are only reached through finalize, `Cancelled` only
/// through cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Bootstrapping,
    Active,
    Ended,
    SettledSuccess,
    SettledRefund,
    Cancelled,
}

impl Phase {
    /// Terminal phases never change again.
    pub fn is_terminal(&self) -> bool {
        match self {
            Phase::SettledSuccess | Phase::SettledRefund | Phase::Cancelled => true,
            Phase::Waiting | Phase::Bootstrapping | Phase::Active | Phase::Ended => false,
        }
    }

    /// Deposits and withdrawals are accepted.
    pub fn accepts_participation(&self) -> bool {
        matches!(self, Phase::Bootstrapping | Phase::Active)
    }

    /// Whether the threshold outcome is known, i.e. participants may exit.
    pub fn allows_exit(&self) -> bool {
        matches!(
            self,
            Phase::Ended | Phase::SettledSuccess | Phase::SettledRefund | Phase::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Bootstrapping => "bootstrapping",
            Phase::Active => "active",
            Phase::Ended => "ended",
            Phase::SettledSuccess => "settled_success",
            Phase::SettledRefund => "settled_refund",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown phase: {0}")]
pub struct PhaseParseError(pub String);

impl FromStr for Phase {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Phase::Waiting),
            "bootstrapping" => Ok(Phase::Bootstrapping),
            "active" => Ok(Phase::Active),
            "ended" => Ok(Phase::Ended),
            "settled_success" => Ok(Phase::SettledSuccess),
            "settled_refund" => Ok(Phase::SettledRefund),
            "cancelled" => Ok(Phase::Cancelled),
            other => Err(PhaseParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 7] = [
        Phase::Waiting,
        Phase::Bootstrapping,
        Phase::Active,
        Phase::Ended,
        Phase::SettledSuccess,
        Phase::SettledRefund,
        Phase::Cancelled,
    ];

    #[test]
    fn test_terminal_phases() {
        let terminal: Vec<Phase> = ALL.into_iter().filter(Phase::is_terminal).collect();
        assert_eq!(
            terminal,
            vec![Phase::SettledSuccess, Phase::SettledRefund, Phase::Cancelled]
        );
    }

    #[test]
    fn test_phase_string_roundtrip() {
        for phase in ALL {
            assert_eq!(Phase::from_str(phase.as_str()).unwrap(), phase);
        }
        assert!(Phase::from_str("paused").is_err());
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&Phase::SettledRefund).unwrap();
        assert_eq!(json, "\"settled_refund\"");
    }
}
