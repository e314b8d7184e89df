//! Key/Proof Gateway
//!
//! Client-side orchestration in front of the codec: fetches and caches the
//! active public key for a contract context, encrypts a plaintext amount,
//! and emits a ciphertext + admission proof pair ready for chain
//! submission. The gateway performs no authorization; disclosure decisions
//! live with the disclosure service.
//!
//! Key retrieval may hit a remote key service, so fetches are retried a
//! bounded number of times with exponential backoff on transient failures.
//! Cached keys are scoped strictly per context and dropped on rotation via
//! `invalidate`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{CiphertextBytes, CiphertextCodec, CodecError, ProofBytes, PublicKeyBytes};
use crate::crypto::AmountBounds;

/// Identifies a contract context (deployment) whose key encrypts inputs
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub String);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Remote key service unavailable; eligible for bounded retry
    #[error("transient key service failure: {0}")]
    Transient(String),

    /// Retries exhausted without a successful fetch
    #[error("key fetch for context {context} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        last: String,
    },

    /// No key registered for the requested context
    #[error("unknown contract context: {0}")]
    UnknownContext(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Gateway tunables; passed in at construction, never read from the
/// environment inside core logic
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Additional attempts after the first transient fetch failure
    pub max_key_retries: u32,
    /// Base delay for exponential backoff between retries
    pub retry_base_delay: Duration,
    /// Cache fetched keys per context
    pub cache_keys: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_key_retries: 3,
            retry_base_delay: Duration::from_millis(50),
            cache_keys: true,
        }
    }
}

/// Source of active context public keys (local registry, remote key
/// service, ...)
pub trait KeyProvider: Send + Sync {
    fn fetch_public_key(&self, context: &ContextId) -> Result<PublicKeyBytes, GatewayError>;
}

/// In-process key registry for local development and tests
#[derive(Default)]
pub struct StaticKeyProvider {
    keys: RwLock<HashMap<ContextId, PublicKeyBytes>>,
}

impl StaticKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, context: ContextId, key: PublicKeyBytes) {
        self.keys.write().insert(context, key);
    }
}

impl KeyProvider for StaticKeyProvider {
    fn fetch_public_key(&self, context: &ContextId) -> Result<PublicKeyBytes, GatewayError> {
        self.keys
            .read()
            .get(context)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownContext(context.0.clone()))
    }
}

/// Ciphertext + proof pair ready for submission
#[derive(Clone, Debug)]
pub struct EncryptedInput {
    pub ciphertext: CiphertextBytes,
    pub proof: ProofBytes,
}

/// Orchestrates codec calls per request
pub struct KeyGateway {
    codec: Arc<dyn CiphertextCodec>,
    provider: Arc<dyn KeyProvider>,
    cache: RwLock<HashMap<ContextId, PublicKeyBytes>>,
    config: GatewayConfig,
}

impl KeyGateway {
    pub fn new(
        codec: Arc<dyn CiphertextCodec>,
        provider: Arc<dyn KeyProvider>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            codec,
            provider,
            cache: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Active public key for a context, from cache or the provider.
    ///
    /// Only transient provider failures are retried; an unknown context is
    /// surfaced immediately.
    pub fn public_key(&self, context: &ContextId) -> Result<PublicKeyBytes, GatewayError> {
        if self.config.cache_keys {
            if let Some(key) = self.cache.read().get(context) {
                debug!(context = %context, "key cache hit");
                return Ok(key.clone());
            }
        }

        let key = self.fetch_with_retry(context)?;
        if self.config.cache_keys {
            self.cache.write().insert(context.clone(), key.clone());
        }
        Ok(key)
    }

    /// Drop a cached key after rotation; the next request re-fetches
    pub fn invalidate(&self, context: &ContextId) {
        self.cache.write().remove(context);
        debug!(context = %context, "cached key invalidated");
    }

    /// Encrypt an amount and prove it admissible for the given window
    pub fn encrypt_and_prove(
        &self,
        plaintext: u64,
        bounds: AmountBounds,
        context: &ContextId,
    ) -> Result<EncryptedInput, GatewayError> {
        let key = self.public_key(context)?;
        let encrypted = self.codec.encrypt(plaintext, &key)?;
        let proof = self.codec.prove_well_formed(
            plaintext,
            &encrypted.witness,
            &encrypted.ciphertext,
            bounds,
            &key,
        )?;
        Ok(EncryptedInput {
            ciphertext: encrypted.ciphertext,
            proof,
        })
    }

    /// Validate a submitted input against the context key
    pub fn verify_input(
        &self,
        input: &EncryptedInput,
        bounds: AmountBounds,
        context: &ContextId,
    ) -> Result<bool, GatewayError> {
        let key = self.public_key(context)?;
        Ok(self
            .codec
            .verify(&input.ciphertext, &input.proof, bounds, &key))
    }

    fn fetch_with_retry(&self, context: &ContextId) -> Result<PublicKeyBytes, GatewayError> {
        let attempts = self.config.max_key_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry_base_delay * 2u32.saturating_pow(attempt - 1);
                warn!(
                    context = %context,
                    attempt,
                    ?delay,
                    "transient key fetch failure, backing off"
                );
                std::thread::sleep(delay);
            }
            match self.provider.fetch_public_key(context) {
                Ok(key) => return Ok(key),
                Err(GatewayError::Transient(msg)) => last_error = msg,
                Err(other) => return Err(other),
            }
        }

        Err(GatewayError::RetriesExhausted {
            context: context.0.clone(),
            attempts,
            last: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{keypair_bytes, ElGamalCodec, SecretKeyBytes};
    use crate::crypto::ContextKeypair;
    use rand::rngs::OsRng;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn gateway_with_context() -> (KeyGateway, ContextId, SecretKeyBytes) {
        let keys = ContextKeypair::generate(&mut OsRng);
        let (pk, sk) = keypair_bytes(&keys).unwrap();
        let context = ContextId::from("0xreelvault");

        let provider = StaticKeyProvider::new();
        provider.register(context.clone(), pk);

        let gateway = KeyGateway::new(
            Arc::new(ElGamalCodec::new()),
            Arc::new(provider),
            GatewayConfig::default(),
        );
        (gateway, context, sk)
    }

    #[test]
    fn test_encrypt_and_prove_roundtrip() {
        let (gateway, context, sk) = gateway_with_context();
        let bounds = AmountBounds::new(100, 10000);

        let input = gateway.encrypt_and_prove(5000, bounds, &context).unwrap();
        assert!(gateway.verify_input(&input, bounds, &context).unwrap());

        let codec = ElGamalCodec::new();
        assert_eq!(codec.decrypt(&input.ciphertext, &sk).unwrap(), 5000);
    }

    #[test]
    fn test_out_of_window_input_fails_verification() {
        let (gateway, context, _) = gateway_with_context();
        let bounds = AmountBounds::new(100, 10000);

        let input = gateway.encrypt_and_prove(50, bounds, &context).unwrap();
        assert!(!gateway.verify_input(&input, bounds, &context).unwrap());
    }

    #[test]
    fn test_unknown_context_is_not_retried() {
        let (gateway, _, _) = gateway_with_context();
        let result = gateway.public_key(&ContextId::from("0xmissing"));
        assert!(matches!(result, Err(GatewayError::UnknownContext(_))));
    }

    struct FlakyProvider {
        calls: AtomicU32,
        succeed_after: u32,
        key: PublicKeyBytes,
    }

    impl KeyProvider for FlakyProvider {
        fn fetch_public_key(&self, _context: &ContextId) -> Result<PublicKeyBytes, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.succeed_after {
                Err(GatewayError::Transient("key service unreachable".into()))
            } else {
                Ok(self.key.clone())
            }
        }
    }

    fn flaky_gateway(succeed_after: u32, max_retries: u32) -> (KeyGateway, Arc<FlakyProvider>) {
        let keys = ContextKeypair::generate(&mut OsRng);
        let (pk, _) = keypair_bytes(&keys).unwrap();
        let provider = Arc::new(FlakyProvider {
            calls: AtomicU32::new(0),
            succeed_after,
            key: pk,
        });
        let gateway = KeyGateway::new(
            Arc::new(ElGamalCodec::new()),
            provider.clone(),
            GatewayConfig {
                max_key_retries: max_retries,
                retry_base_delay: Duration::from_millis(1),
                cache_keys: true,
            },
        );
        (gateway, provider)
    }

    #[test]
    fn test_transient_failures_are_retried_with_bound() {
        let (gateway, provider) = flaky_gateway(2, 3);
        let context = ContextId::from("0xflaky");

        assert!(gateway.public_key(&context).is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retries_exhausted_surfaces_failure() {
        let (gateway, provider) = flaky_gateway(u32::MAX, 2);
        let context = ContextId::from("0xflaky");

        let result = gateway.public_key(&context);
        assert!(matches!(
            result,
            Err(GatewayError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cache_serves_repeat_requests() {
        let (gateway, provider) = flaky_gateway(0, 0);
        let context = ContextId::from("0xcached");

        gateway.public_key(&context).unwrap();
        gateway.public_key(&context).unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let (gateway, provider) = flaky_gateway(0, 0);
        let context = ContextId::from("0xrotated");

        gateway.public_key(&context).unwrap();
        gateway.invalidate(&context);
        gateway.public_key(&context).unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_keys_are_not_shared_across_contexts() {
        let a_keys = ContextKeypair::generate(&mut OsRng);
        let b_keys = ContextKeypair::generate(&mut OsRng);
        let (a_pk, _) = keypair_bytes(&a_keys).unwrap();
        let (b_pk, _) = keypair_bytes(&b_keys).unwrap();

        let provider = StaticKeyProvider::new();
        provider.register(ContextId::from("0xa"), a_pk.clone());
        provider.register(ContextId::from("0xb"), b_pk.clone());

        let gateway = KeyGateway::new(
            Arc::new(ElGamalCodec::new()),
            Arc::new(provider),
            GatewayConfig::default(),
        );

        assert_eq!(gateway.public_key(&ContextId::from("0xa")).unwrap(), a_pk);
        assert_eq!(gateway.public_key(&ContextId::from("0xb")).unwrap(), b_pk);
        assert_ne!(a_pk, b_pk);
    }
}
