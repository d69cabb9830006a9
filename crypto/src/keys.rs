//! Keypairs, public keys, signatures and address derivation.
//!
//! Signing keys never implement `Clone` or `Debug`: the data model requires
//! that "private-key material is held only inside Account instances; copies
//! are forbidden elsewhere" (§4.1). A [`SigningKey`] can only be moved, never
//! duplicated, and printing one is a compile error rather than a leak.

use ed25519_dalek::{Keypair, PublicKey as DalekPublicKey, SecretKey, Signature as DalekSignature, Signer, Verifier};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{hash_bytes, CryptoError, Result};

/// An account's public key, stored as the raw 32-byte Ed25519 encoding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "hex_bytes")] Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        DalekPublicKey::from_bytes(bytes).map_err(|_| CryptoError::MalformedPublicKey)?;
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Derives the address this key controls: the hex-encoded hash of the
    /// raw public key bytes. Kept as a standalone function so
    /// [`SigningKey::address`] and verifiers (which only ever see the
    /// embedded pubkey, not the keypair) derive the same value.
    pub fn to_address(&self) -> Address {
        Address(hex::encode(hash_bytes(&self.0)))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0))
    }
}

/// An Ed25519 signature, stored as the raw 64-byte encoding.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex_bytes")] Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        DalekSignature::from_bytes(bytes).map_err(|_| CryptoError::MalformedSignature)?;
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0))
    }
}

/// An account address: the hex-encoded hash of its public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

/// A signing keypair. Never `Clone`, never `Debug`: see module docs.
pub struct SigningKey(Keypair);

impl SigningKey {
    /// Generates a fresh keypair using a caller-supplied CSPRNG (tests use
    /// a seeded RNG for determinism; production callers use `rand::rngs::OsRng`).
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(Keypair::generate(rng))
    }

    /// Reconstructs a keypair from a raw 32-byte Ed25519 secret scalar.
    /// Used to rehydrate an account's key from secure storage.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_bytes(bytes).map_err(|_| CryptoError::MalformedPrivateKey)?;
        let public = DalekPublicKey::from(&secret);
        Ok(Self(Keypair { secret, public }))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public.as_bytes().to_vec())
    }

    pub fn address(&self) -> Address {
        self.public_key().to_address()
    }

    /// Signs a message synchronously. The key never leaves this call frame.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.0.sign(message);
        Signature(sig.to_bytes().to_vec())
    }
}

/// Verifies `signature` over `message` against `public_key`.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> Result<()> {
    let pk = DalekPublicKey::from_bytes(public_key.as_bytes()).map_err(|_| CryptoError::MalformedPublicKey)?;
    let sig = DalekSignature::from_bytes(signature.as_bytes()).map_err(|_| CryptoError::MalformedSignature)?;
    pk.verify(message, &sig).map_err(|_| CryptoError::BadSignature)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn deterministic_key(seed: u64) -> SigningKey {
        let mut rng = StdRng::seed_from_u64(seed);
        SigningKey::generate(&mut rng)
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let key = deterministic_key(1);
        let msg = b"hello ezchain";
        let sig = key.sign(msg);
        assert!(verify(&key.public_key(), msg, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let key = deterministic_key(2);
        let sig = key.sign(b"original");
        assert!(verify(&key.public_key(), b"tampered", &sig).is_err());
    }

    #[test]
    fn address_is_deterministic_from_pubkey() {
        let key = deterministic_key(3);
        assert_eq!(key.address(), key.public_key().to_address());
    }

    #[test]
    fn different_keys_yield_different_addresses() {
        let a = deterministic_key(4);
        let b = deterministic_key(5);
        assert_ne!(a.address(), b.address());
    }
}
