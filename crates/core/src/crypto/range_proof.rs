//! Admission proofs: ciphertext well-formedness plus range attestation
//!
//! An admission proof convinces the ledger that a submitted ciphertext
//! `(C1, C2)` is a well-formed encryption under the context key of a
//! plaintext `m` with `min <= m <= max`, without revealing `m`.
//!
//! Construction (Fiat-Shamir over SHA-256 transcripts):
//! 1. Pedersen bit commitments `B_i = v_i * H + s_i * G` to the bits of
//!    `v = m - min`, and `D_i` to the bits of `w = max - m`, each carried
//!    by a Chaum-Pedersen OR proof that the committed bit is 0 or 1.
//! 2. A Schnorr sum proof that `v + w = max - min`, which together with
//!    the 32-bit decompositions pins `m` inside the window over the
//!    integers (no modular wrap is possible below the group order).
//! 3. A linking Schnorr AND-proof tying the aggregated bit commitment to
//!    the ElGamal ciphertext under the same plaintext and randomness.
//!
//! Verification is a pure admission gate: it never panics and returns
//! `false` on any malformed input.

use ark_bn254::{Fr, G1Affine, G1Projective as G1};
use ark_ec::{CurveGroup, Group};
use ark_ff::{UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::challenge_scalar;
use super::elgamal::{generator_h, Ciphertext, CryptoError, PublicKey, MAX_PLAINTEXT};

/// Bits in the committed range decomposition (matches the 32-bit plaintext
/// domain)
pub const RANGE_BITS: usize = 32;

/// Public investment window attested by an admission proof
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBounds {
    pub min: u64,
    pub max: u64,
}

impl AmountBounds {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Bounds must be ordered and fit the plaintext domain
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.min > self.max {
            return Err(CryptoError::InvalidBounds(self.min, self.max));
        }
        if self.max > MAX_PLAINTEXT {
            return Err(CryptoError::PlaintextOutOfRange(self.max));
        }
        Ok(())
    }

    pub fn contains(&self, value: u64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// OR proof that a Pedersen commitment opens to 0 or 1
#[derive(Clone, Debug)]
struct BitProof {
    t0: G1Affine,
    t1: G1Affine,
    c0: Fr,
    c1: Fr,
    z0: Fr,
    z1: Fr,
}

/// Well-formedness + range proof for one encrypted investment
#[derive(Clone, Debug)]
pub struct AdmissionProof {
    /// Commitments to the bits of `m - min`
    lo_bits: Vec<G1Affine>,
    /// Commitments to the bits of `max - m`
    hi_bits: Vec<G1Affine>,
    lo_proofs: Vec<BitProof>,
    hi_proofs: Vec<BitProof>,
    /// Schnorr proof for `v + w = max - min`
    sum_t: G1Affine,
    sum_z: Fr,
    /// Linking proof tying bit commitments to the ciphertext
    link_t1: G1Affine,
    link_t2: G1Affine,
    link_t3: G1Affine,
    link_zm: Fr,
    link_zr: Fr,
    link_zs: Fr,
}

/// Serialize a point or scalar to bytes (infallible for valid elements)
fn ser<T: CanonicalSerialize>(value: &T) -> Vec<u8> {
    let mut bytes = Vec::new();
    value
        .serialize_compressed(&mut bytes)
        .expect("serialization failed");
    bytes
}

/// Statement prefix binding the proof to its public inputs
fn statement_bytes(
    ciphertext: &Ciphertext,
    bounds: AmountBounds,
    public_key: &PublicKey,
) -> Result<Vec<u8>, CryptoError> {
    let mut out = public_key.to_bytes()?;
    out.extend(ciphertext.to_bytes()?);
    out.extend(bounds.min.to_le_bytes());
    out.extend(bounds.max.to_le_bytes());
    Ok(out)
}

/// Horner fold of bit commitments: `sum 2^i * points[i]`
fn fold_bits(points: &[G1Affine]) -> G1 {
    let mut acc = G1::zero();
    for point in points.iter().rev() {
        acc.double_in_place();
        acc += G1::from(*point);
    }
    acc
}

/// Prove one bit commitment `B = bit * H + blinding * G` opens to 0 or 1
fn prove_bit<R: RngCore + CryptoRng>(
    label: &'static [u8],
    statement: &[u8],
    index: usize,
    commitment: &G1,
    bit: bool,
    blinding: &Fr,
    rng: &mut R,
) -> BitProof {
    let g = G1::generator();
    let h = generator_h();

    // Branch 0: B = s*G, branch 1: B - H = s*G
    let p0 = *commitment;
    let p1 = *commitment - h;
    let p_fake = if bit { p0 } else { p1 };

    // Simulate the branch we have no witness for
    let c_fake = Fr::rand(rng);
    let z_fake = Fr::rand(rng);
    let t_fake = g * z_fake - p_fake * c_fake;

    // Commit honestly on the real branch
    let k = Fr::rand(rng);
    let t_real = g * k;

    let (t0, t1) = if bit {
        (t_fake, t_real)
    } else {
        (t_real, t_fake)
    };

    let c = challenge_scalar(
        label,
        &[
            statement,
            &(index as u64).to_le_bytes(),
            &ser(&commitment.into_affine()),
            &ser(&t0.into_affine()),
            &ser(&t1.into_affine()),
        ],
    );
    let c_real = c - c_fake;
    let z_real = k + c_real * blinding;

    let (c0, c1, z0, z1) = if bit {
        (c_fake, c_real, z_fake, z_real)
    } else {
        (c_real, c_fake, z_real, z_fake)
    };

    BitProof {
        t0: t0.into_affine(),
        t1: t1.into_affine(),
        c0,
        c1,
        z0,
        z1,
    }
}

/// Verify one bit OR proof
fn verify_bit(
    label: &'static [u8],
    statement: &[u8],
    index: usize,
    commitment: &G1,
    proof: &BitProof,
) -> bool {
    let g = G1::generator();
    let h = generator_h();
    let p0 = *commitment;
    let p1 = *commitment - h;

    let c = challenge_scalar(
        label,
        &[
            statement,
            &(index as u64).to_le_bytes(),
            &ser(&commitment.into_affine()),
            &ser(&proof.t0),
            &ser(&proof.t1),
        ],
    );
    if proof.c0 + proof.c1 != c {
        return false;
    }
    if g * proof.z0 != G1::from(proof.t0) + p0 * proof.c0 {
        return false;
    }
    if g * proof.z1 != G1::from(proof.t1) + p1 * proof.c1 {
        return false;
    }
    true
}

/// Generate an admission proof for `plaintext` under `bounds`.
///
/// `randomness` is the encryption witness returned alongside the
/// ciphertext. Proof generation succeeds for any encodable plaintext; a
/// proof generated for an out-of-window plaintext simply never verifies,
/// which is what makes the ledger's admission gate sound.
pub fn prove_admission<R: RngCore + CryptoRng>(
    plaintext: u64,
    randomness: &Fr,
    ciphertext: &Ciphertext,
    bounds: AmountBounds,
    public_key: &PublicKey,
    rng: &mut R,
) -> Result<AdmissionProof, CryptoError> {
    bounds.validate()?;
    if plaintext > MAX_PLAINTEXT {
        return Err(CryptoError::PlaintextOutOfRange(plaintext));
    }

    let g = G1::generator();
    let h = generator_h();
    let statement = statement_bytes(ciphertext, bounds, public_key)?;

    // Honest decomposition modulo 2^32; out-of-window plaintexts produce
    // decompositions the linking/sum checks reject.
    let v = plaintext.wrapping_sub(bounds.min) as u32;
    let w = bounds.max.wrapping_sub(plaintext) as u32;

    let mut lo_bits = Vec::with_capacity(RANGE_BITS);
    let mut hi_bits = Vec::with_capacity(RANGE_BITS);
    let mut lo_proofs = Vec::with_capacity(RANGE_BITS);
    let mut hi_proofs = Vec::with_capacity(RANGE_BITS);
    let mut s_total = Fr::zero();
    let mut t_total = Fr::zero();

    for i in 0..RANGE_BITS {
        let weight = Fr::from(1u64 << i);

        let v_bit = (v >> i) & 1 == 1;
        let s_i = Fr::rand(rng);
        let b_i = if v_bit { h + g * s_i } else { g * s_i };
        s_total += weight * s_i;
        lo_proofs.push(prove_bit(b"lo-bit", &statement, i, &b_i, v_bit, &s_i, rng));
        lo_bits.push(b_i.into_affine());

        let w_bit = (w >> i) & 1 == 1;
        let t_i = Fr::rand(rng);
        let d_i = if w_bit { h + g * t_i } else { g * t_i };
        t_total += weight * t_i;
        hi_proofs.push(prove_bit(b"hi-bit", &statement, i, &d_i, w_bit, &t_i, rng));
        hi_bits.push(d_i.into_affine());
    }

    let v_commit = fold_bits(&lo_bits);
    let w_commit = fold_bits(&hi_bits);

    // Sum proof: V + W - (max - min)*H lies in span(G)
    let k = Fr::rand(rng);
    let sum_t = g * k;
    let sum_c = challenge_scalar(
        b"sum",
        &[
            &statement,
            &ser(&v_commit.into_affine()),
            &ser(&w_commit.into_affine()),
            &ser(&sum_t.into_affine()),
        ],
    );
    let sum_z = k + sum_c * (s_total + t_total);

    // Linking proof: same m in the ciphertext and in V + min*H
    let m_scalar = Fr::from(plaintext);
    let rho_m = Fr::rand(rng);
    let rho_r = Fr::rand(rng);
    let rho_s = Fr::rand(rng);
    let link_t1 = g * rho_r;
    let link_t2 = h * rho_m + public_key.0 * rho_r;
    let link_t3 = h * rho_m + g * rho_s;
    let link_c = challenge_scalar(
        b"link",
        &[
            &statement,
            &ser(&v_commit.into_affine()),
            &ser(&link_t1.into_affine()),
            &ser(&link_t2.into_affine()),
            &ser(&link_t3.into_affine()),
        ],
    );
    let link_zm = rho_m + link_c * m_scalar;
    let link_zr = rho_r + link_c * randomness;
    let link_zs = rho_s + link_c * s_total;

    Ok(AdmissionProof {
        lo_bits,
        hi_bits,
        lo_proofs,
        hi_proofs,
        sum_t: sum_t.into_affine(),
        sum_z,
        link_t1: link_t1.into_affine(),
        link_t2: link_t2.into_affine(),
        link_t3: link_t3.into_affine(),
        link_zm,
        link_zr,
        link_zs,
    })
}

/// Verify an admission proof against its public inputs.
///
/// Returns `false` on any inconsistency; never panics and never errs on
/// the side of acceptance.
pub fn verify_admission(
    ciphertext: &Ciphertext,
    proof: &AdmissionProof,
    bounds: AmountBounds,
    public_key: &PublicKey,
) -> bool {
    if bounds.validate().is_err() {
        return false;
    }
    if proof.lo_bits.len() != RANGE_BITS
        || proof.hi_bits.len() != RANGE_BITS
        || proof.lo_proofs.len() != RANGE_BITS
        || proof.hi_proofs.len() != RANGE_BITS
    {
        return false;
    }
    let statement = match statement_bytes(ciphertext, bounds, public_key) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let g = G1::generator();
    let h = generator_h();

    for i in 0..RANGE_BITS {
        let b_i = G1::from(proof.lo_bits[i]);
        if !verify_bit(b"lo-bit", &statement, i, &b_i, &proof.lo_proofs[i]) {
            return false;
        }
        let d_i = G1::from(proof.hi_bits[i]);
        if !verify_bit(b"hi-bit", &statement, i, &d_i, &proof.hi_proofs[i]) {
            return false;
        }
    }

    let v_commit = fold_bits(&proof.lo_bits);
    let w_commit = fold_bits(&proof.hi_bits);

    // Sum check
    let delta = Fr::from(bounds.max - bounds.min);
    let sum_point = v_commit + w_commit - h * delta;
    let sum_c = challenge_scalar(
        b"sum",
        &[
            &statement,
            &ser(&v_commit.into_affine()),
            &ser(&w_commit.into_affine()),
            &ser(&proof.sum_t),
        ],
    );
    if g * proof.sum_z != G1::from(proof.sum_t) + sum_point * sum_c {
        return false;
    }

    // Linking check
    let link_c = challenge_scalar(
        b"link",
        &[
            &statement,
            &ser(&v_commit.into_affine()),
            &ser(&proof.link_t1),
            &ser(&proof.link_t2),
            &ser(&proof.link_t3),
        ],
    );
    let v_m = v_commit + h * Fr::from(bounds.min);
    if g * proof.link_zr != G1::from(proof.link_t1) + ciphertext.c1 * link_c {
        return false;
    }
    if h * proof.link_zm + public_key.0 * proof.link_zr
        != G1::from(proof.link_t2) + ciphertext.c2 * link_c
    {
        return false;
    }
    if h * proof.link_zm + g * proof.link_zs != G1::from(proof.link_t3) + v_m * link_c {
        return false;
    }

    true
}

impl AdmissionProof {
    /// Serialize to compressed bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let mut out = Vec::new();

        fn put<T: CanonicalSerialize>(out: &mut Vec<u8>, value: &T) -> Result<(), CryptoError> {
            value
                .serialize_compressed(&mut *out)
                .map_err(|e| CryptoError::Serialization(e.to_string()))
        }

        for point in self.lo_bits.iter().chain(self.hi_bits.iter()) {
            put(&mut out, point)?;
        }
        for proof in self.lo_proofs.iter().chain(self.hi_proofs.iter()) {
            put(&mut out, &proof.t0)?;
            put(&mut out, &proof.t1)?;
            put(&mut out, &proof.c0)?;
            put(&mut out, &proof.c1)?;
            put(&mut out, &proof.z0)?;
            put(&mut out, &proof.z1)?;
        }
        put(&mut out, &self.sum_t)?;
        put(&mut out, &self.sum_z)?;
        put(&mut out, &self.link_t1)?;
        put(&mut out, &self.link_t2)?;
        put(&mut out, &self.link_t3)?;
        put(&mut out, &self.link_zm)?;
        put(&mut out, &self.link_zr)?;
        put(&mut out, &self.link_zs)?;
        Ok(out)
    }

    /// Deserialize from bytes; trailing data is rejected
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut reader = bytes;

        fn take_point(reader: &mut &[u8]) -> Result<G1Affine, CryptoError> {
            G1Affine::deserialize_compressed(&mut *reader)
                .map_err(|e| CryptoError::Serialization(e.to_string()))
        }
        fn take_scalar(reader: &mut &[u8]) -> Result<Fr, CryptoError> {
            Fr::deserialize_compressed(&mut *reader)
                .map_err(|e| CryptoError::Serialization(e.to_string()))
        }
        fn take_bit_proof(reader: &mut &[u8]) -> Result<BitProof, CryptoError> {
            Ok(BitProof {
                t0: take_point(reader)?,
                t1: take_point(reader)?,
                c0: take_scalar(reader)?,
                c1: take_scalar(reader)?,
                z0: take_scalar(reader)?,
                z1: take_scalar(reader)?,
            })
        }

        let mut lo_bits = Vec::with_capacity(RANGE_BITS);
        for _ in 0..RANGE_BITS {
            lo_bits.push(take_point(&mut reader)?);
        }
        let mut hi_bits = Vec::with_capacity(RANGE_BITS);
        for _ in 0..RANGE_BITS {
            hi_bits.push(take_point(&mut reader)?);
        }
        let mut lo_proofs = Vec::with_capacity(RANGE_BITS);
        for _ in 0..RANGE_BITS {
            lo_proofs.push(take_bit_proof(&mut reader)?);
        }
        let mut hi_proofs = Vec::with_capacity(RANGE_BITS);
        for _ in 0..RANGE_BITS {
            hi_proofs.push(take_bit_proof(&mut reader)?);
        }

        let proof = Self {
            lo_bits,
            hi_bits,
            lo_proofs,
            hi_proofs,
            sum_t: take_point(&mut reader)?,
            sum_z: take_scalar(&mut reader)?,
            link_t1: take_point(&mut reader)?,
            link_t2: take_point(&mut reader)?,
            link_t3: take_point(&mut reader)?,
            link_zm: take_scalar(&mut reader)?,
            link_zr: take_scalar(&mut reader)?,
            link_zs: take_scalar(&mut reader)?,
        };
        if !reader.is_empty() {
            return Err(CryptoError::Serialization(
                "trailing bytes after proof".to_string(),
            ));
        }
        Ok(proof)
    }
}
