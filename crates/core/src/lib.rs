//! ReelVault - Confidential Investment Core
//!
//! Client-side cryptography for confidential film investments: amounts are
//! encrypted before they ever reach a chain, accompanied by an admission
//! proof that the hidden value sits inside the project's public investment
//! window, and later selectively disclosed by decryption or key-switching.
//!
//! # Modules
//! - `crypto`: exponential ElGamal over BN254 and sigma-protocol admission
//!   proofs
//! - `codec`: the `CiphertextCodec` capability trait and the ElGamal
//!   adapter; everything above it sees opaque bytes only
//! - `gateway`: key retrieval/caching and encrypt-and-prove orchestration
//! - `error`: unified error hierarchy

pub mod codec;
pub mod crypto;
pub mod error;
pub mod gateway;

// Re-export common types
pub use codec::{
    keypair_bytes, CiphertextBytes, CiphertextCodec, CodecError, Encrypted, EncryptionWitness,
    ElGamalCodec, ProofBytes, PublicKeyBytes, SecretKeyBytes,
};
pub use crypto::{AmountBounds, ContextKeypair, CryptoError, PLAINTEXT_BITS};
pub use error::{CoreError, CoreResult};
pub use gateway::{
    ContextId, EncryptedInput, GatewayConfig, GatewayError, KeyGateway, KeyProvider,
    StaticKeyProvider,
};
