//! Exponential ElGamal encryption over BN254 G1
//!
//! Ciphertexts encrypt a 32-bit plaintext `m` as:
//!
//! `(C1, C2) = (r * G, m * H + r * pk)`
//!
//! where G is the standard BN254 generator and H is a second generator
//! derived with a nothing-up-my-sleeve construction. The scheme is
//! additively homomorphic: component-wise addition of two ciphertexts
//! encrypts the sum of their plaintexts.
//!
//! Decryption recovers `m * H = C2 - sk * C1` and solves the discrete log
//! over the 32-bit plaintext range with a baby-step/giant-step table.
//! Key-switching (re-encryption for a viewer) is performed by the holder of
//! the source secret key: the source layer is stripped, the plaintext point
//! validated against the supported range, and the value freshly encrypted
//! under the target public key.

use std::collections::HashMap;

use ark_bn254::{Fr, G1Affine, G1Projective as G1};
use ark_ec::{CurveGroup, Group};
use ark_ff::{PrimeField, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use once_cell::sync::Lazy;
use rand::{CryptoRng, RngCore};
use thiserror::Error;

/// Width of the supported plaintext range in bits
pub const PLAINTEXT_BITS: u32 = 32;

/// Largest encryptable plaintext
pub(crate) const MAX_PLAINTEXT: u64 = u32::MAX as u64;

/// Baby-step table size (2^16 entries covers the 32-bit range when paired
/// with 2^16 giant steps)
const BABY_COUNT: u64 = 1 << 16;
const GIANT_COUNT: u64 = 1 << 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("plaintext {0} exceeds the 32-bit plaintext range")]
    PlaintextOutOfRange(u64),
    #[error("decryption failed: wrong key or value outside the plaintext range")]
    DecryptionFailed,
    #[error("key mismatch: source key does not open this ciphertext")]
    KeyMismatch,
    #[error("invalid bounds: min {0} exceeds max {1}")]
    InvalidBounds(u64, u64),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Second generator H, derived by hashing a domain separator to a scalar
/// (discrete log of H relative to G stays unknown).
static GENERATOR_H: Lazy<G1> = Lazy::new(|| {
    let domain = b"REELVAULT_ELGAMAL_H_V1";
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    let hash = hasher.finalize();
    let scalar = Fr::from_le_bytes_mod_order(hash.as_bytes());
    G1::generator() * scalar
});

/// Baby-step lookup table: compressed `j * H` for `j` in `0..2^16`
static BABY_TABLE: Lazy<HashMap<[u8; 32], u32>> = Lazy::new(|| {
    let h = *GENERATOR_H;
    let mut points = Vec::with_capacity(BABY_COUNT as usize);
    let mut acc = G1::zero();
    for _ in 0..BABY_COUNT {
        points.push(acc);
        acc += h;
    }
    let affine = G1::normalize_batch(&points);
    affine
        .iter()
        .enumerate()
        .map(|(j, point)| (compress_point(point), j as u32))
        .collect()
});

/// Giant step: `2^16 * H`
static GIANT_STEP: Lazy<G1> = Lazy::new(|| *GENERATOR_H * Fr::from(BABY_COUNT));

/// Get the second generator H used for plaintext encoding
pub fn generator_h() -> G1 {
    *GENERATOR_H
}

/// Compress an affine point to its 32-byte canonical form
fn compress_point(point: &G1Affine) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    point
        .serialize_compressed(&mut bytes[..])
        .expect("BN254 G1 compresses to 32 bytes");
    bytes
}

/// Solve `target = m * H` for `m` in the 32-bit range.
///
/// Returns `None` when no solution exists (wrong key or overflowed
/// accumulator); the scan is bounded, so failure is bounded-time too.
fn discrete_log(target: G1) -> Option<u64> {
    let table = &*BABY_TABLE;
    let step = *GIANT_STEP;
    let mut cursor = target;
    for i in 0..GIANT_COUNT {
        let key = compress_point(&cursor.into_affine());
        if let Some(&j) = table.get(&key) {
            return Some(i * BABY_COUNT + u64::from(j));
        }
        cursor -= step;
    }
    None
}

/// Decryption key for a contract context (held by the disclosure authority,
/// never by the ledger)
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(pub(crate) Fr);

/// Encryption key for a contract context (published)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub(crate) G1);

impl SecretKey {
    /// Serialize to 32 bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = Vec::new();
        self.0
            .serialize_compressed(&mut bytes)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let scalar = Fr::deserialize_compressed(bytes)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(Self(scalar))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the scalar
        f.debug_struct("SecretKey").finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Serialize to compressed bytes (32 bytes)
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = Vec::new();
        self.0
            .into_affine()
            .serialize_compressed(&mut bytes)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from compressed bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let affine = G1Affine::deserialize_compressed(bytes)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(Self(G1::from(affine)))
    }

    /// Short identifier for logging and cache keys
    pub fn id(&self) -> [u8; 32] {
        let bytes = self.to_bytes().unwrap_or_default();
        let mut hasher = blake3::Hasher::new();
        hasher.update(&bytes);
        *hasher.finalize().as_bytes()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("id", &hex::encode(&self.id()[..8]))
            .finish()
    }
}

/// Encryption keypair for a contract context
#[derive(Clone, Debug)]
pub struct ContextKeypair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl ContextKeypair {
    /// Generate a fresh keypair
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = Fr::rand(rng);
        let public = G1::generator() * secret;
        Self {
            secret: SecretKey(secret),
            public: PublicKey(public),
        }
    }

    /// Derive a keypair from a 32-byte seed (deterministic, for tests and
    /// key recovery)
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let secret = Fr::from_le_bytes_mod_order(seed);
        let public = G1::generator() * secret;
        Self {
            secret: SecretKey(secret),
            public: PublicKey(public),
        }
    }
}

/// An exponential ElGamal ciphertext
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ciphertext {
    pub(crate) c1: G1,
    pub(crate) c2: G1,
}

impl Ciphertext {
    /// Serialize to compressed bytes (64 bytes: C1 || C2)
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = Vec::with_capacity(64);
        self.c1
            .into_affine()
            .serialize_compressed(&mut bytes)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        self.c2
            .into_affine()
            .serialize_compressed(&mut bytes)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from compressed bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut reader = bytes;
        let c1 = G1Affine::deserialize_compressed(&mut reader)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        let c2 = G1Affine::deserialize_compressed(&mut reader)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(Self {
            c1: G1::from(c1),
            c2: G1::from(c2),
        })
    }
}

impl std::fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Opaque on purpose; curve points in logs invite correlation
        f.debug_struct("Ciphertext").finish_non_exhaustive()
    }
}

/// Encrypt a plaintext under a context public key.
///
/// Returns the ciphertext and the encryption randomness; the randomness is
/// the witness needed to prove well-formedness and must not be persisted.
pub fn encrypt<R: RngCore + CryptoRng>(
    plaintext: u64,
    public_key: &PublicKey,
    rng: &mut R,
) -> Result<(Ciphertext, Fr), CryptoError> {
    if plaintext > MAX_PLAINTEXT {
        return Err(CryptoError::PlaintextOutOfRange(plaintext));
    }
    let randomness = Fr::rand(rng);
    Ok((
        encrypt_with_randomness(plaintext, &randomness, public_key),
        randomness,
    ))
}

/// Deterministic encryption given explicit randomness (proof generation and
/// verification both reconstruct ciphertexts through this path)
pub(crate) fn encrypt_with_randomness(
    plaintext: u64,
    randomness: &Fr,
    public_key: &PublicKey,
) -> Ciphertext {
    let c1 = G1::generator() * randomness;
    let c2 = *GENERATOR_H * Fr::from(plaintext) + public_key.0 * randomness;
    Ciphertext { c1, c2 }
}

/// Decrypt a ciphertext with the context secret key
pub fn decrypt(ciphertext: &Ciphertext, secret_key: &SecretKey) -> Result<u64, CryptoError> {
    let plaintext_point = ciphertext.c2 - ciphertext.c1 * secret_key.0;
    discrete_log(plaintext_point).ok_or(CryptoError::DecryptionFailed)
}

/// Homomorphic addition: `Enc(a) + Enc(b) = Enc(a + b)`.
///
/// Commutative and associative up to ciphertext equivalence; the result
/// carries the combined randomness, not fresh randomness.
pub fn homomorphic_add(a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
    Ciphertext {
        c1: a.c1 + b.c1,
        c2: a.c2 + b.c2,
    }
}

/// Key-switch a ciphertext to a viewer's public key.
///
/// The source secret key must open the ciphertext; otherwise this fails
/// with `KeyMismatch` and nothing is produced. The output is a fresh
/// encryption of the same plaintext under `target`, so the stored
/// ciphertext is never mutated.
pub fn reencrypt<R: RngCore + CryptoRng>(
    ciphertext: &Ciphertext,
    source_key: &SecretKey,
    target: &PublicKey,
    rng: &mut R,
) -> Result<Ciphertext, CryptoError> {
    let plaintext_point = ciphertext.c2 - ciphertext.c1 * source_key.0;
    let plaintext = discrete_log(plaintext_point).ok_or(CryptoError::KeyMismatch)?;
    let (switched, _) = encrypt(plaintext, target, rng)?;
    Ok(switched)
}
