//! Contract versioning utilities

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ContractError, Result};
use crate::lifecycle::ContractStatus;

/// Schema version of a message contract.
///
/// Versions of one (topic, message type) pair form a contiguous sequence
/// starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractVersion(u32);

impl ContractVersion {
    /// The version every new message type starts at
    pub const FIRST: ContractVersion = ContractVersion(1);

    /// Create from a raw number, rejecting anything below 1
    pub fn new(version: i64) -> Result<Self> {
        match u32::try_from(version) {
            Ok(v) if v >= 1 => Ok(Self(v)),
            _ => Err(ContractError::InvalidSchemaVersion(version)),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// The only legal successor of this version, if it is representable
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The most recent contract stored for a (topic, message type) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorContract {
    pub version: ContractVersion,
    pub status: ContractStatus,
}

/// Decides whether a proposed version may follow the latest stored contract
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractVersionSequencer;

impl ContractVersionSequencer {
    pub fn new() -> Self {
        Self
    }

    /// Accept `proposed` only as the direct successor of a provisioned predecessor
    pub fn check(&self, latest: Option<PriorContract>, proposed: ContractVersion) -> Result<()> {
        let expected = match latest {
            None => ContractVersion::FIRST,
            Some(prior) if prior.status == ContractStatus::Provisioned => prior
                .version
                .next()
                .ok_or(ContractError::VersionSequenceExhausted {
                    latest: prior.version,
                    proposed,
                })?,
            Some(prior) => {
                return Err(ContractError::PreviousContractNotProvisioned {
                    version: prior.version,
                    status: prior.status,
                })
            }
        };

        if proposed == expected {
            Ok(())
        } else {
            Err(ContractError::InvalidVersionSequence { expected, proposed })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: i64) -> ContractVersion {
        ContractVersion::new(n).unwrap()
    }

    fn provisioned(n: i64) -> Option<PriorContract> {
        Some(PriorContract {
            version: v(n),
            status: ContractStatus::Provisioned,
        })
    }

    #[test]
    fn test_version_bounds() {
        assert!(ContractVersion::new(1).is_ok());
        assert!(matches!(
            ContractVersion::new(0),
            Err(ContractError::InvalidSchemaVersion(0))
        ));
        assert!(ContractVersion::new(-4).is_err());
        assert!(ContractVersion::new(i64::from(u32::MAX) + 1).is_err());
        assert_eq!(v(3).next(), Some(v(4)));
        assert_eq!(v(i64::from(u32::MAX)).next(), None);
        assert_eq!(v(7).to_string(), "v7");
    }

    #[test]
    fn test_first_version_must_be_one() {
        let sequencer = ContractVersionSequencer::new();
        assert!(sequencer.check(None, v(1)).is_ok());
        assert!(matches!(
            sequencer.check(None, v(2)),
            Err(ContractError::InvalidVersionSequence { expected, proposed })
                if expected == v(1) && proposed == v(2)
        ));
    }

    #[test]
    fn test_gaps_are_rejected() {
        let sequencer = ContractVersionSequencer::new();
        assert!(sequencer.check(provisioned(2), v(3)).is_ok());
        assert!(sequencer.check(provisioned(2), v(4)).is_err());
        assert!(sequencer.check(provisioned(2), v(2)).is_err());
        assert!(sequencer.check(provisioned(2), v(1)).is_err());
    }

    #[test]
    fn test_last_representable_version_has_no_successor() {
        let sequencer = ContractVersionSequencer::new();
        let err = sequencer
            .check(provisioned(i64::from(u32::MAX)), v(1))
            .unwrap_err();
        assert!(matches!(
            err,
            ContractError::VersionSequenceExhausted { latest, .. } if latest.get() == u32::MAX
        ));
        assert_eq!(err.code(), "InvalidVersionSequence");
    }

    #[test]
    fn test_previous_must_be_provisioned() {
        let sequencer = ContractVersionSequencer::new();
        for status in [
            ContractStatus::Requested,
            ContractStatus::InProgress,
            ContractStatus::Failed,
        ] {
            let latest = Some(PriorContract {
                version: v(1),
                status,
            });
            match sequencer.check(latest, v(2)) {
                Err(ContractError::PreviousContractNotProvisioned { version, status: s }) => {
                    assert_eq!(version, v(1));
                    assert_eq!(s, status);
                }
                other => panic!("Expected PreviousContractNotProvisioned, got {:?}", other),
            }
        }
    }
}
