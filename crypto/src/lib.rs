//! Crypto façade treated as an opaque collaborator by the rest of the
//! crate family: a signer/verifier pair over Ed25519, the deterministic
//! common random permutation used by compliance and creator logic, and a
//! common-coin oracle stand-in for committees without an external DKG.

mod coin;
mod crp;
mod signer;

pub use coin::{CoinShare, CommonCoin, FixedCommitteeCoin};
pub use crp::Crp;
pub use signer::{PublicKey, SecretKey, Signature, Signer, Verifier};

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("signature did not verify")]
    BadSignature,
    #[error("malformed public key: {0}")]
    BadPublicKey(String),
    #[error("malformed secret key: {0}")]
    BadSecretKey(String),
    #[error("malformed coin share")]
    BadCoinShare,
}
