//! Message contract lifecycle
//!
//! ```text
//! Requested ──▶ InProgress ──▶ Provisioned (frozen)
//!     │             │               ▲
//!     └─────────────┴──▶ Failed ────┘
//!                          │
//!                          └──(retry)──▶ Requested
//! ```
//!
//! Transitions are computed by [`transition`] as a pure function of the
//! current status and the requested event; the contract aggregate applies
//! the outcome.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status of a message contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    Requested,
    #[serde(rename = "In Progress")]
    InProgress,
    Provisioned,
    Failed,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 4] = [
        ContractStatus::Requested,
        ContractStatus::InProgress,
        ContractStatus::Provisioned,
        ContractStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Requested => "Requested",
            ContractStatus::InProgress => "In Progress",
            ContractStatus::Provisioned => "Provisioned",
            ContractStatus::Failed => "Failed",
        }
    }

    /// Provisioned contracts never change again
    pub fn is_frozen(&self) -> bool {
        matches!(self, ContractStatus::Provisioned)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = crate::error::ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::error::ContractError::InvalidValue {
                kind: "message contract status",
                value: s.to_string(),
            })
    }
}

/// A requested lifecycle change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    MarkInProgress,
    MarkProvisioned,
    MarkFailed,
    Retry,
    /// Replace the stored record; checked by repositories
    Overwrite,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleEvent::MarkInProgress => "mark in progress",
            LifecycleEvent::MarkProvisioned => "mark provisioned",
            LifecycleEvent::MarkFailed => "mark failed",
            LifecycleEvent::Retry => "retry",
            LifecycleEvent::Overwrite => "be overwritten",
        };
        f.write_str(s)
    }
}

/// Outcome of a legal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to a new status
    Changed(ContractStatus),
    /// Repeated event, nothing to do
    Unchanged,
}

/// Lifecycle violations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("contract has been provisioned and cannot {event}")]
    ContractFrozen { event: LifecycleEvent },

    #[error("cannot {event} a contract that is {from}")]
    InvalidTransition {
        from: ContractStatus,
        event: LifecycleEvent,
    },
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::ContractFrozen { .. } => "ContractFrozen",
            LifecycleError::InvalidTransition { .. } => "InvalidTransition",
        }
    }
}

/// Compute the effect of `event` on a contract in `status`
pub fn transition(status: ContractStatus, event: LifecycleEvent) -> Result<Transition, LifecycleError> {
    use ContractStatus::*;
    use LifecycleEvent::*;

    match (status, event) {
        (Provisioned, MarkProvisioned) => Ok(Transition::Unchanged),
        (Provisioned, event) => Err(LifecycleError::ContractFrozen { event }),

        (Requested | InProgress | Failed, MarkProvisioned) => Ok(Transition::Changed(Provisioned)),

        (Requested, MarkInProgress) => Ok(Transition::Changed(InProgress)),
        (InProgress, MarkInProgress) => Ok(Transition::Unchanged),

        (Requested | InProgress, MarkFailed) => Ok(Transition::Changed(Failed)),
        (Failed, MarkFailed) => Ok(Transition::Unchanged),

        (Failed, Retry) => Ok(Transition::Changed(Requested)),

        (_, Overwrite) => Ok(Transition::Unchanged),

        (from, event) => Err(LifecycleError::InvalidTransition { from, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ContractStatus::*;
    use LifecycleEvent::*;

    #[test]
    fn test_happy_path() {
        assert_eq!(transition(Requested, MarkInProgress), Ok(Transition::Changed(InProgress)));
        assert_eq!(transition(InProgress, MarkProvisioned), Ok(Transition::Changed(Provisioned)));
    }

    #[test]
    fn test_provisioning_may_skip_in_progress() {
        assert_eq!(transition(Requested, MarkProvisioned), Ok(Transition::Changed(Provisioned)));
        assert_eq!(transition(Failed, MarkProvisioned), Ok(Transition::Changed(Provisioned)));
    }

    #[test]
    fn test_repeated_provisioning_is_a_no_op() {
        assert_eq!(transition(Provisioned, MarkProvisioned), Ok(Transition::Unchanged));
    }

    #[test]
    fn test_provisioned_is_frozen() {
        for event in [MarkInProgress, MarkFailed, Retry, Overwrite] {
            assert_eq!(
                transition(Provisioned, event),
                Err(LifecycleError::ContractFrozen { event })
            );
        }
    }

    #[test]
    fn test_failure_and_retry() {
        assert_eq!(transition(Requested, MarkFailed), Ok(Transition::Changed(Failed)));
        assert_eq!(transition(InProgress, MarkFailed), Ok(Transition::Changed(Failed)));
        assert_eq!(transition(Failed, MarkFailed), Ok(Transition::Unchanged));
        assert_eq!(transition(Failed, Retry), Ok(Transition::Changed(Requested)));
    }

    #[test]
    fn test_no_backward_moves() {
        assert!(matches!(
            transition(Failed, MarkInProgress),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(transition(Requested, Retry).is_err());
        assert!(transition(InProgress, Retry).is_err());
    }

    #[test]
    fn test_status_text() {
        assert_eq!(InProgress.to_string(), "In Progress");
        assert_eq!("in progress".parse::<ContractStatus>().unwrap(), InProgress);
        assert_eq!("PROVISIONED".parse::<ContractStatus>().unwrap(), Provisioned);
        assert!("InProgress".parse::<ContractStatus>().is_err());
        assert_eq!(serde_json::to_string(&InProgress).unwrap(), "\"In Progress\"");
    }
}
