use poset_unit::UnitId;
use thiserror::Error;

/// §7 `CryptoError`: signature verification fails, bad public key, coin-share invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unit {0} signature does not verify under its creator's public key")]
    BadSignature(UnitId),
    #[error("creator id {0} is outside the committee range")]
    UnknownCreator(u16),
    #[error("unit {0} carries an invalid threshold-coin share")]
    BadCoinShare(UnitId),
}

/// §7 `ComplianceError`: any §4.4 rule violated other than the signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("unit {unit} references missing parent {parent}")]
    ParentMissing { unit: UnitId, parent: UnitId },
    #[error("unit {unit} has two parents from creator {creator}")]
    DuplicateParentCreator { unit: UnitId, creator: u16 },
    #[error("unit {unit} has no self-predecessor by creator {creator} at height {height}")]
    MissingSelfPredecessor { unit: UnitId, creator: u16, height: u64 },
    #[error("unit {unit} parent {parent_index} does not expand the visible prime set")]
    ExpandPrimesViolation { unit: UnitId, parent_index: usize },
    #[error("unit {unit} includes parent {parent} whose creator {creator} is muted as a forker in this unit's cone")]
    ForkerMuted { unit: UnitId, parent: UnitId, creator: u16 },
    #[error("unit {unit} is prime at level {level} but is missing a required threshold-coin share")]
    MissingCoinShare { unit: UnitId, level: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PosetError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Compliance(#[from] ComplianceError),
}
