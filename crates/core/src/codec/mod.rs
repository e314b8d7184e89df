//! Ciphertext codec: the capability boundary over the encryption scheme
//!
//! Everything above this module (gateway, ledger, disclosure) works with
//! opaque byte strings and the `CiphertextCodec` trait, never with a
//! concrete scheme. `ElGamalCodec` is the production adapter over the
//! exponential ElGamal primitives in `crate::crypto`; tests can substitute
//! any other implementation.

use ark_bn254::Fr;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{
    self, elgamal, AdmissionProof, AmountBounds, Ciphertext, CryptoError, PublicKey, SecretKey,
};

/// Errors surfaced by codec operations
#[derive(Error, Debug)]
pub enum CodecError {
    /// Plaintext outside the scheme's supported range; reject, never retry
    #[error("plaintext {0} exceeds the supported 32-bit range")]
    Encoding(u64),

    /// Wrong key or out-of-range value; surfaced to the caller, no retry
    #[error("decryption failed: incompatible key or value out of range")]
    Decryption,

    /// Source key cannot validate the ciphertext's origin
    #[error("key mismatch: source key does not open this ciphertext")]
    KeyMismatch,

    /// Malformed bytes for a key, ciphertext, or proof
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<CryptoError> for CodecError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::PlaintextOutOfRange(v) => CodecError::Encoding(v),
            CryptoError::DecryptionFailed => CodecError::Decryption,
            CryptoError::KeyMismatch => CodecError::KeyMismatch,
            CryptoError::InvalidBounds(min, max) => {
                CodecError::Serialization(format!("invalid bounds: {min} > {max}"))
            }
            CryptoError::Serialization(msg) => CodecError::Serialization(msg),
        }
    }
}

/// Opaque ciphertext bytes as stored on the ledger
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBytes(pub Vec<u8>);

/// Opaque admission proof bytes
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBytes(pub Vec<u8>);

/// Serialized context/viewer public key
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyBytes(pub Vec<u8>);

/// Serialized context secret key (never stored on the ledger)
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKeyBytes(pub Vec<u8>);

impl std::fmt::Debug for CiphertextBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CiphertextBytes({} bytes)", self.0.len())
    }
}

impl std::fmt::Debug for ProofBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProofBytes({} bytes)", self.0.len())
    }
}

impl std::fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKeyBytes({})", hex::encode(&self.0))
    }
}

impl std::fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKeyBytes").finish_non_exhaustive()
    }
}

/// Encryption randomness held transiently by the prover; required for
/// admission-proof generation, never persisted or transmitted
#[derive(Clone)]
pub struct EncryptionWitness(Vec<u8>);

impl std::fmt::Debug for EncryptionWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionWitness").finish_non_exhaustive()
    }
}

/// A ciphertext together with its proving witness
pub struct Encrypted {
    pub ciphertext: CiphertextBytes,
    pub witness: EncryptionWitness,
}

/// Capability interface over the homomorphic encryption scheme.
///
/// Stateless per call; `verify` is an admission gate and must return
/// `false` rather than erroring on malformed input.
pub trait CiphertextCodec: Send + Sync {
    /// Encrypt a plaintext under a context public key
    fn encrypt(&self, plaintext: u64, public_key: &PublicKeyBytes) -> Result<Encrypted, CodecError>;

    /// Encryption of zero, used to seed per-project accumulators
    fn encrypt_zero(&self, public_key: &PublicKeyBytes) -> Result<CiphertextBytes, CodecError>;

    /// Prove the ciphertext well-formed and its plaintext inside `bounds`
    fn prove_well_formed(
        &self,
        plaintext: u64,
        witness: &EncryptionWitness,
        ciphertext: &CiphertextBytes,
        bounds: AmountBounds,
        public_key: &PublicKeyBytes,
    ) -> Result<ProofBytes, CodecError>;

    /// Admission check; `false` on any malformed or non-verifying input
    fn verify(
        &self,
        ciphertext: &CiphertextBytes,
        proof: &ProofBytes,
        bounds: AmountBounds,
        public_key: &PublicKeyBytes,
    ) -> bool;

    /// Decrypt with the context secret key
    fn decrypt(
        &self,
        ciphertext: &CiphertextBytes,
        secret_key: &SecretKeyBytes,
    ) -> Result<u64, CodecError>;

    /// Key-switch a ciphertext to a viewer key; produces a new ciphertext,
    /// never mutates the input
    fn reencrypt(
        &self,
        ciphertext: &CiphertextBytes,
        source_key: &SecretKeyBytes,
        target_key: &PublicKeyBytes,
    ) -> Result<CiphertextBytes, CodecError>;

    /// Homomorphic addition of two ciphertexts under the same context key
    fn homomorphic_add(
        &self,
        a: &CiphertextBytes,
        b: &CiphertextBytes,
    ) -> Result<CiphertextBytes, CodecError>;
}

/// Production adapter over exponential ElGamal (BN254)
#[derive(Clone, Copy, Debug, Default)]
pub struct ElGamalCodec;

impl ElGamalCodec {
    pub fn new() -> Self {
        Self
    }

    fn parse_public(key: &PublicKeyBytes) -> Result<PublicKey, CodecError> {
        Ok(PublicKey::from_bytes(&key.0)?)
    }

    fn parse_secret(key: &SecretKeyBytes) -> Result<SecretKey, CodecError> {
        Ok(SecretKey::from_bytes(&key.0)?)
    }

    fn parse_ciphertext(bytes: &CiphertextBytes) -> Result<Ciphertext, CodecError> {
        Ok(Ciphertext::from_bytes(&bytes.0)?)
    }
}

impl CiphertextCodec for ElGamalCodec {
    fn encrypt(&self, plaintext: u64, public_key: &PublicKeyBytes) -> Result<Encrypted, CodecError> {
        let pk = Self::parse_public(public_key)?;
        let (ciphertext, randomness) = elgamal::encrypt(plaintext, &pk, &mut OsRng)?;
        let mut witness = Vec::new();
        randomness
            .serialize_compressed(&mut witness)
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        Ok(Encrypted {
            ciphertext: CiphertextBytes(ciphertext.to_bytes()?),
            witness: EncryptionWitness(witness),
        })
    }

    fn encrypt_zero(&self, public_key: &PublicKeyBytes) -> Result<CiphertextBytes, CodecError> {
        Ok(self.encrypt(0, public_key)?.ciphertext)
    }

    fn prove_well_formed(
        &self,
        plaintext: u64,
        witness: &EncryptionWitness,
        ciphertext: &CiphertextBytes,
        bounds: AmountBounds,
        public_key: &PublicKeyBytes,
    ) -> Result<ProofBytes, CodecError> {
        let pk = Self::parse_public(public_key)?;
        let ct = Self::parse_ciphertext(ciphertext)?;
        let randomness = Fr::deserialize_compressed(witness.0.as_slice())
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        let proof =
            crypto::prove_admission(plaintext, &randomness, &ct, bounds, &pk, &mut OsRng)?;
        Ok(ProofBytes(proof.to_bytes()?))
    }

    fn verify(
        &self,
        ciphertext: &CiphertextBytes,
        proof: &ProofBytes,
        bounds: AmountBounds,
        public_key: &PublicKeyBytes,
    ) -> bool {
        // Reject on any parse failure; the gate never throws
        let Ok(pk) = Self::parse_public(public_key) else {
            return false;
        };
        let Ok(ct) = Self::parse_ciphertext(ciphertext) else {
            return false;
        };
        let Ok(parsed) = AdmissionProof::from_bytes(&proof.0) else {
            return false;
        };
        crypto::verify_admission(&ct, &parsed, bounds, &pk)
    }

    fn decrypt(
        &self,
        ciphertext: &CiphertextBytes,
        secret_key: &SecretKeyBytes,
    ) -> Result<u64, CodecError> {
        let sk = Self::parse_secret(secret_key)?;
        let ct = Self::parse_ciphertext(ciphertext)?;
        Ok(elgamal::decrypt(&ct, &sk)?)
    }

    fn reencrypt(
        &self,
        ciphertext: &CiphertextBytes,
        source_key: &SecretKeyBytes,
        target_key: &PublicKeyBytes,
    ) -> Result<CiphertextBytes, CodecError> {
        let sk = Self::parse_secret(source_key)?;
        let pk = Self::parse_public(target_key)?;
        let ct = Self::parse_ciphertext(ciphertext)?;
        let switched = elgamal::reencrypt(&ct, &sk, &pk, &mut OsRng)?;
        Ok(CiphertextBytes(switched.to_bytes()?))
    }

    fn homomorphic_add(
        &self,
        a: &CiphertextBytes,
        b: &CiphertextBytes,
    ) -> Result<CiphertextBytes, CodecError> {
        let lhs = Self::parse_ciphertext(a)?;
        let rhs = Self::parse_ciphertext(b)?;
        Ok(CiphertextBytes(
            elgamal::homomorphic_add(&lhs, &rhs).to_bytes()?,
        ))
    }
}

/// Serialize a context keypair into codec byte types
pub fn keypair_bytes(
    keys: &crate::crypto::ContextKeypair,
) -> Result<(PublicKeyBytes, SecretKeyBytes), CodecError> {
    Ok((
        PublicKeyBytes(keys.public.to_bytes()?),
        SecretKeyBytes(keys.secret.to_bytes()?),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ContextKeypair;
    use rand::rngs::OsRng;

    fn context() -> (PublicKeyBytes, SecretKeyBytes) {
        let keys = ContextKeypair::generate(&mut OsRng);
        keypair_bytes(&keys).unwrap()
    }

    #[test]
    fn test_encrypt_prove_verify_decrypt() {
        let codec = ElGamalCodec::new();
        let (pk, sk) = context();
        let bounds = AmountBounds::new(100, 10000);

        let enc = codec.encrypt(5000, &pk).unwrap();
        let proof = codec
            .prove_well_formed(5000, &enc.witness, &enc.ciphertext, bounds, &pk)
            .unwrap();

        assert!(codec.verify(&enc.ciphertext, &proof, bounds, &pk));
        assert_eq!(codec.decrypt(&enc.ciphertext, &sk).unwrap(), 5000);
    }

    #[test]
    fn test_verify_rejects_out_of_window_plaintext() {
        let codec = ElGamalCodec::new();
        let (pk, _) = context();
        let bounds = AmountBounds::new(100, 10000);

        let enc = codec.encrypt(50, &pk).unwrap();
        let proof = codec
            .prove_well_formed(50, &enc.witness, &enc.ciphertext, bounds, &pk)
            .unwrap();

        assert!(!codec.verify(&enc.ciphertext, &proof, bounds, &pk));
    }

    #[test]
    fn test_verify_rejects_garbage_without_panicking() {
        let codec = ElGamalCodec::new();
        let (pk, _) = context();
        let bounds = AmountBounds::new(0, 100);

        assert!(!codec.verify(
            &CiphertextBytes(vec![1, 2, 3]),
            &ProofBytes(vec![4, 5, 6]),
            bounds,
            &pk,
        ));
        assert!(!codec.verify(
            &CiphertextBytes(vec![]),
            &ProofBytes(vec![]),
            bounds,
            &PublicKeyBytes(vec![0xFF; 7]),
        ));
    }

    #[test]
    fn test_encoding_error_on_oversized_plaintext() {
        let codec = ElGamalCodec::new();
        let (pk, _) = context();
        let result = codec.encrypt(u64::from(u32::MAX) + 1, &pk);
        assert!(matches!(result, Err(CodecError::Encoding(_))));
    }

    #[test]
    fn test_accumulator_seed_decrypts_to_zero() {
        let codec = ElGamalCodec::new();
        let (pk, sk) = context();
        let zero = codec.encrypt_zero(&pk).unwrap();
        assert_eq!(codec.decrypt(&zero, &sk).unwrap(), 0);
    }

    #[test]
    fn test_homomorphic_accumulation_through_bytes() {
        let codec = ElGamalCodec::new();
        let (pk, sk) = context();

        let mut total = codec.encrypt_zero(&pk).unwrap();
        for amount in [5000u64, 3000, 2000] {
            let enc = codec.encrypt(amount, &pk).unwrap();
            total = codec.homomorphic_add(&total, &enc.ciphertext).unwrap();
        }
        assert_eq!(codec.decrypt(&total, &sk).unwrap(), 10000);
    }

    #[test]
    fn test_reencrypt_for_viewer() {
        let codec = ElGamalCodec::new();
        let (pk, sk) = context();
        let viewer = ContextKeypair::generate(&mut OsRng);
        let (viewer_pk, viewer_sk) = keypair_bytes(&viewer).unwrap();

        let enc = codec.encrypt(777, &pk).unwrap();
        let switched = codec.reencrypt(&enc.ciphertext, &sk, &viewer_pk).unwrap();

        assert_eq!(codec.decrypt(&switched, &viewer_sk).unwrap(), 777);
        // The stored ciphertext is untouched and still under the context key
        assert_eq!(codec.decrypt(&enc.ciphertext, &sk).unwrap(), 777);
    }

    #[test]
    fn test_reencrypt_with_wrong_source_key() {
        let codec = ElGamalCodec::new();
        let (pk, _) = context();
        let (_, wrong_sk) = context();
        let (viewer_pk, _) = context();

        let enc = codec.encrypt(9, &pk).unwrap();
        let result = codec.reencrypt(&enc.ciphertext, &wrong_sk, &viewer_pk);
        assert!(matches!(result, Err(CodecError::KeyMismatch)));
    }

    #[test]
    fn test_decrypt_with_wrong_key_is_an_error_not_a_default() {
        let codec = ElGamalCodec::new();
        let (pk, _) = context();
        let (_, wrong_sk) = context();

        let enc = codec.encrypt(123, &pk).unwrap();
        // Must surface Decryption, never fall back to a fabricated value
        assert!(matches!(
            codec.decrypt(&enc.ciphertext, &wrong_sk),
            Err(CodecError::Decryption)
        ));
    }
}
