use crate::{CryptoError, SecretKey, Signer};
use serde::{Deserialize, Serialize};

/// Opaque per-unit payload carrying this creator's contribution toward the
/// level's common coin. Internals of a genuine threshold scheme are outside
/// this crate's scope; only the combining rule is implemented here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinShare(pub Vec<u8>);

impl CoinShare {
    /// Derives this creator's share for `level` by signing a
    /// domain-separated, level-specific message. Unpredictable to anyone
    /// without the secret key, and reproducible by the same key for the
    /// same level, which is all [`FixedCommitteeCoin::combine`] needs from
    /// an individual contribution.
    pub fn generate(secret_key: &SecretKey, level: u64) -> CoinShare {
        let mut preimage = b"poset-coin-share".to_vec();
        preimage.extend_from_slice(&level.to_be_bytes());
        CoinShare(secret_key.sign(&preimage).to_bytes().to_vec())
    }
}

/// A level-indexed unpredictable bit produced by combining shares from a
/// super-majority of prime units at that level.
pub trait CommonCoin {
    /// Combines the shares carried by a super-majority of level-`level`
    /// prime units into the coin's outcome bit. Returns `None` if fewer
    /// than `threshold` shares are supplied.
    fn combine(&self, level: u64, shares: &[CoinShare], threshold: usize) -> Result<Option<bool>, CryptoError>;

    fn validate_share(&self, share: &CoinShare) -> Result<(), CryptoError>;
}

/// Stand-in common-coin for a fixed committee without an external
/// distributed key generation ceremony: the outcome is the parity of the
/// XOR of all combined shares. No single process can predict it ahead of
/// time because it requires `threshold` independently-produced shares, but
/// unlike a genuine threshold scheme it does not guarantee indistinguishability
/// from random to an adversary that controls many committee members; it is
/// documented as a simplification, not a production coin (see SPEC_FULL.md).
#[derive(Default)]
pub struct FixedCommitteeCoin;

impl CommonCoin for FixedCommitteeCoin {
    fn combine(&self, level: u64, shares: &[CoinShare], threshold: usize) -> Result<Option<bool>, CryptoError> {
        if shares.len() < threshold {
            return Ok(None);
        }
        let mut acc = level.to_be_bytes().to_vec();
        for share in shares {
            self.validate_share(share)?;
            for (i, byte) in share.0.iter().enumerate() {
                if i < acc.len() {
                    acc[i] ^= byte;
                } else {
                    acc.push(*byte);
                }
            }
        }
        let parity = acc.iter().fold(0u8, |a, b| a ^ b).count_ones() % 2;
        Ok(Some(parity == 1))
    }

    fn validate_share(&self, share: &CoinShare) -> Result<(), CryptoError> {
        if share.0.is_empty() {
            return Err(CryptoError::BadCoinShare);
        }
        Ok(())
    }
}
