//! The immutable unit value object: fields, canonical serialization, hash,
//! and the dealing-unit special case. Derived attributes (height, level,
//! floor, is-prime) are assigned on insertion and live in `poset-dag`, not
//! here — a `Unit` never changes after it is signed.

use poset_crypto::{CoinShare, PublicKey, SecretKey, Signature, Signer, Verifier};
use poset_hashes::{Hash, Hasher, UnitHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type UnitId = Hash;
pub type CreatorId = u16;

#[derive(Error, Debug)]
pub enum UnitError {
    #[error("signature does not verify")]
    BadSignature,
}

/// Immutable once signed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    creator: CreatorId,
    parents: Vec<UnitId>,
    transactions: Vec<Vec<u8>>,
    coin_share: Option<CoinShare>,
    signature: Signature,
}

impl Unit {
    /// Builds and signs a new unit. `parents` must already respect the
    /// self-predecessor convention (first parent is the creator's own
    /// previous unit) except for a dealing unit, which passes an empty list.
    pub fn sign(
        creator: CreatorId,
        parents: Vec<UnitId>,
        transactions: Vec<Vec<u8>>,
        coin_share: Option<CoinShare>,
        secret_key: &SecretKey,
    ) -> Unit {
        let preimage = Self::signing_preimage(creator, &parents, &transactions, &coin_share);
        let signature = secret_key.sign(&preimage);
        Unit { creator, parents, transactions, coin_share, signature }
    }

    pub fn dealing(creator: CreatorId, secret_key: &SecretKey) -> Unit {
        Self::sign(creator, Vec::new(), Vec::new(), None, secret_key)
    }

    pub fn creator(&self) -> CreatorId {
        self.creator
    }

    pub fn parents(&self) -> &[UnitId] {
        &self.parents
    }

    pub fn transactions(&self) -> &[Vec<u8>] {
        &self.transactions
    }

    pub fn coin_share(&self) -> Option<&CoinShare> {
        self.coin_share.as_ref()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_dealing(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn n_txs(&self) -> usize {
        self.transactions.len()
    }

    /// First parent is the self-predecessor by convention, for every unit
    /// except a dealing unit (which has none).
    pub fn self_predecessor(&self) -> Option<&UnitId> {
        self.parents.first()
    }

    /// The hash of the unit's full canonical serialization, signature
    /// included. Uniquely names the unit.
    pub fn hash(&self) -> UnitId {
        let bytes = bincode::serialize(self).expect("Unit serialization is infallible");
        UnitHash::hash(bytes)
    }

    pub fn short_name(&self) -> String {
        let hash = self.hash().to_string();
        format!("{}..{}", &hash[..6], self.creator)
    }

    pub fn verify_signature(&self, public_key: &PublicKey) -> Result<(), UnitError> {
        let preimage = Self::signing_preimage(self.creator, &self.parents, &self.transactions, &self.coin_share);
        public_key.verify(&preimage, &self.signature).map_err(|_| UnitError::BadSignature)
    }

    fn signing_preimage(
        creator: CreatorId,
        parents: &[UnitId],
        transactions: &[Vec<u8>],
        coin_share: &Option<CoinShare>,
    ) -> Vec<u8> {
        bincode::serialize(&(creator, parents, transactions, coin_share)).expect("tuple serialization is infallible")
    }
}

/// Encodes a `Unit` as the wire `UnitRecord` described in SPEC_FULL.md §4.7:
/// creator id, parent hashes, transaction blob, optional coin share,
/// signature — which is exactly `Unit`'s own derive(Serialize) layout, so
/// encoding is the identity function kept here for callers that want the
/// wire-format name rather than the value-object name.
pub fn encode(unit: &Unit) -> Vec<u8> {
    bincode::serialize(unit).expect("Unit serialization is infallible")
}

pub fn decode(bytes: &[u8]) -> bincode::Result<Unit> {
    bincode::deserialize(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_key(byte: u8) -> SecretKey {
        hex::encode([byte; 32]).parse().unwrap()
    }

    #[test]
    fn dealing_unit_has_no_parents_and_verifies() {
        let sk = secret_key(1);
        let unit = Unit::dealing(0, &sk);
        assert!(unit.is_dealing());
        assert!(unit.verify_signature(&sk.public_key()).is_ok());
    }

    #[test]
    fn tampering_with_transactions_breaks_the_signature() {
        let sk = secret_key(2);
        let mut unit = Unit::sign(1, vec![], vec![b"tx".to_vec()], None, &sk);
        unit.transactions.push(b"forged".to_vec());
        assert!(unit.verify_signature(&sk.public_key()).is_err());
    }

    #[test]
    fn serialize_then_deserialize_round_trips() {
        let sk = secret_key(3);
        let unit = Unit::sign(2, vec![UnitId::from_bytes([9u8; 32])], vec![b"a".to_vec(), b"b".to_vec()], None, &sk);
        let bytes = encode(&unit);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(unit, decoded);
        assert_eq!(unit.hash(), decoded.hash());
    }

    #[test]
    fn hash_is_stable_for_equal_units() {
        let sk = secret_key(4);
        let unit = Unit::dealing(3, &sk);
        assert_eq!(unit.hash(), unit.clone().hash());
    }
}
