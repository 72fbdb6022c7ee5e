use crate::CryptoError;
use ed25519_dalek::{Signer as _, Verifier as _};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Opaque Ed25519 secret key, read from the hex-encoded `signing_keys` file.
#[derive(Clone)]
pub struct SecretKey(ed25519_dalek::SigningKey);

/// Opaque Ed25519 public key. Sorted lexicographically by its hex form to
/// fix committee process-id assignment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl SecretKey {
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }
}

impl FromStr for SecretKey {
    type Err = CryptoError;

    fn from_str(hex_str: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(hex_str).map_err(|e| CryptoError::BadSecretKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::BadSecretKey("expected 32 bytes".into()))?;
        Ok(SecretKey(ed25519_dalek::SigningKey::from_bytes(&bytes)))
    }
}

impl PublicKey {
    pub fn to_hex(self) -> String {
        hex::encode(self.0.as_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        self.0.verify(message, &signature.0).map_err(|_| CryptoError::BadSignature)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(hex_str: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(hex_str).map_err(|e| CryptoError::BadPublicKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::BadPublicKey("expected 32 bytes".into()))?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes).map(PublicKey).map_err(|e| CryptoError::BadPublicKey(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}…)", &self.to_hex()[..8])
    }
}

impl Signature {
    pub fn to_bytes(self) -> [u8; 64] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Signature(ed25519_dalek::Signature::from_bytes(bytes))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}…)", &hex::encode(self.0.to_bytes())[..8])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| D::Error::custom("expected 64-byte signature"))?;
        Ok(Signature::from_bytes(&bytes))
    }
}

/// Signs canonical unit bytes. Implemented by `SecretKey`; named so call
/// sites read `signer.sign(bytes)` without caring it is Ed25519 underneath.
pub trait Signer {
    fn sign(&self, message: &[u8]) -> Signature;
}

impl Signer for SecretKey {
    fn sign(&self, message: &[u8]) -> Signature {
        SecretKey::sign(self, message)
    }
}

/// Verifies a signature against a public key. Implemented by `PublicKey`.
pub trait Verifier {
    fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError>;
}

impl Verifier for PublicKey {
    fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        PublicKey::verify(self, message, signature)
    }
}
