//! Chain bridge
//!
//! Async submission path between a client and the ledger. The bridge
//! wraps a `ChainClient` transport with per-call timeouts and a bounded
//! exponential-backoff retry loop. Only transient transport failures
//! are retried; a rejection (bad proof, closed project, bad caller) is
//! final on the first response and is returned unchanged, never
//! replaced with a fabricated success.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{debug, warn};

use reelvault_core::codec::{CiphertextBytes, ProofBytes};

use crate::error::BridgeError;
use crate::ledger::Ledger;
use crate::state::{
    Address, InvestmentId, InvestmentPublicInfo, ProjectId, ProjectParams, ProjectPublicInfo,
};

/// Bridge tuning knobs
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Chain endpoint, informational for transports that need one
    pub endpoint: String,
    /// Per-attempt deadline; an elapsed deadline counts as transient
    pub request_timeout: Duration,
    /// Extra attempts after the first, transient failures only
    pub max_retries: u32,
    /// First backoff delay; doubles per retry
    pub retry_base_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8545".to_string(),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
        }
    }
}

/// Project creation call as it crosses the wire
#[derive(Clone, Debug)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
    pub genre: String,
    pub creator: Address,
    pub target_amount: u64,
    /// Funding window length from submission time
    pub duration_secs: u64,
    pub min_investment: u64,
    pub max_investment: u64,
}

/// Investment submission as it crosses the wire
#[derive(Clone, Debug)]
pub struct InvestmentRequest {
    pub project_id: ProjectId,
    pub investor: Address,
    /// Amount under the context key
    pub amount: CiphertextBytes,
    /// Admission proof covering the ciphertext and project bounds
    pub proof: ProofBytes,
    /// Public escrow value posted alongside
    pub escrow_value: u64,
    pub public_at_release: bool,
}

/// Transport to whatever holds the ledger
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn create_project(&self, req: CreateProjectRequest) -> Result<ProjectId, BridgeError>;

    async fn submit_investment(&self, req: InvestmentRequest)
        -> Result<InvestmentId, BridgeError>;

    async fn close_project(&self, project: ProjectId, caller: Address) -> Result<(), BridgeError>;

    async fn release_project(&self, project: ProjectId, caller: Address)
        -> Result<(), BridgeError>;

    async fn project_info(&self, project: ProjectId) -> Result<ProjectPublicInfo, BridgeError>;

    async fn investment_info(
        &self,
        investment: InvestmentId,
    ) -> Result<InvestmentPublicInfo, BridgeError>;
}

/// Retry/timeout wrapper over a `ChainClient`
pub struct ChainBridge {
    client: Arc<dyn ChainClient>,
    config: BridgeConfig,
}

impl ChainBridge {
    pub fn new(client: Arc<dyn ChainClient>, config: BridgeConfig) -> Self {
        Self { client, config }
    }

    pub async fn create_project(
        &self,
        req: CreateProjectRequest,
    ) -> Result<ProjectId, BridgeError> {
        let client = Arc::clone(&self.client);
        self.call("create_project", move || {
            let client = Arc::clone(&client);
            let req = req.clone();
            async move { client.create_project(req).await }
        })
        .await
    }

    pub async fn submit_investment(
        &self,
        req: InvestmentRequest,
    ) -> Result<InvestmentId, BridgeError> {
        let client = Arc::clone(&self.client);
        self.call("submit_investment", move || {
            let client = Arc::clone(&client);
            let req = req.clone();
            async move { client.submit_investment(req).await }
        })
        .await
    }

    pub async fn close_project(
        &self,
        project: ProjectId,
        caller: Address,
    ) -> Result<(), BridgeError> {
        let client = Arc::clone(&self.client);
        self.call("close_project", move || {
            let client = Arc::clone(&client);
            async move { client.close_project(project, caller).await }
        })
        .await
    }

    pub async fn release_project(
        &self,
        project: ProjectId,
        caller: Address,
    ) -> Result<(), BridgeError> {
        let client = Arc::clone(&self.client);
        self.call("release_project", move || {
            let client = Arc::clone(&client);
            async move { client.release_project(project, caller).await }
        })
        .await
    }

    pub async fn project_info(&self, project: ProjectId) -> Result<ProjectPublicInfo, BridgeError> {
        let client = Arc::clone(&self.client);
        self.call("project_info", move || {
            let client = Arc::clone(&client);
            async move { client.project_info(project).await }
        })
        .await
    }

    pub async fn investment_info(
        &self,
        investment: InvestmentId,
    ) -> Result<InvestmentPublicInfo, BridgeError> {
        let client = Arc::clone(&self.client);
        self.call("investment_info", move || {
            let client = Arc::clone(&client);
            async move { client.investment_info(investment).await }
        })
        .await
    }

    /// Runs one chain call under the timeout/retry policy
    async fn call<T, F, Fut>(&self, label: &str, mut attempt_fn: F) -> Result<T, BridgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.retry_base_delay * 2u32.saturating_pow(attempt - 1);
                warn!(call = label, attempt, delay_ms = delay.as_millis() as u64, "retrying chain call");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.config.request_timeout, attempt_fn()).await {
                Err(_) => {
                    last = format!("timed out after {:?}", self.config.request_timeout);
                }
                Ok(Ok(value)) => {
                    debug!(call = label, attempt, "chain call succeeded");
                    return Ok(value);
                }
                Ok(Err(BridgeError::Transient(msg))) => {
                    last = msg;
                }
                // Rejections are final; retrying a refused proof or an
                // illegal transition cannot change the outcome.
                Ok(Err(err)) => return Err(err),
            }
        }

        Err(BridgeError::RetriesExhausted { attempts, last })
    }
}

impl std::fmt::Debug for ChainBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainBridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Wall-clock seconds since the unix epoch
pub fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Direct in-process transport over a shared `Ledger`
///
/// The chain analogue for tests and local deployments. Ledger refusals
/// map to `BridgeError::Rejected` and carry the original reason.
pub struct InMemoryChain {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Fn() -> u64 + Send + Sync>,
}

impl InMemoryChain {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self::with_clock(ledger, Arc::new(system_clock))
    }

    /// Injectable clock for deterministic tests
    pub fn with_clock(ledger: Arc<Ledger>, clock: Arc<dyn Fn() -> u64 + Send + Sync>) -> Self {
        Self { ledger, clock }
    }
}

#[async_trait]
impl ChainClient for InMemoryChain {
    async fn create_project(&self, req: CreateProjectRequest) -> Result<ProjectId, BridgeError> {
        let now = (self.clock)();
        let params = ProjectParams {
            title: req.title,
            description: req.description,
            genre: req.genre,
            creator: req.creator,
            target_amount: req.target_amount,
            start_time: now,
            end_time: now.saturating_add(req.duration_secs),
            min_investment: req.min_investment,
            max_investment: req.max_investment,
        };
        Ok(self.ledger.create_project(params, now)?)
    }

    async fn submit_investment(
        &self,
        req: InvestmentRequest,
    ) -> Result<InvestmentId, BridgeError> {
        let now = (self.clock)();
        Ok(self.ledger.submit_investment(
            req.project_id,
            req.investor,
            req.amount,
            req.proof,
            req.escrow_value,
            req.public_at_release,
            now,
        )?)
    }

    async fn close_project(&self, project: ProjectId, caller: Address) -> Result<(), BridgeError> {
        Ok(self.ledger.close_project(project, caller, (self.clock)())?)
    }

    async fn release_project(
        &self,
        project: ProjectId,
        caller: Address,
    ) -> Result<(), BridgeError> {
        Ok(self.ledger.release_project(project, caller, (self.clock)())?)
    }

    async fn project_info(&self, project: ProjectId) -> Result<ProjectPublicInfo, BridgeError> {
        Ok(self.ledger.project_info(project)?)
    }

    async fn investment_info(
        &self,
        investment: InvestmentId,
    ) -> Result<InvestmentPublicInfo, BridgeError> {
        Ok(self.ledger.investment_info(investment)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::LedgerError;
    use crate::state::ProjectStatus;

    /// Client that fails transiently a fixed number of times
    struct FlakyClient {
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyClient {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }

        fn next(&self) -> Result<(), BridgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                Err(BridgeError::Transient("connection reset".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ChainClient for FlakyClient {
        async fn create_project(&self, _: CreateProjectRequest) -> Result<ProjectId, BridgeError> {
            self.next().map(|_| 1)
        }

        async fn submit_investment(
            &self,
            _: InvestmentRequest,
        ) -> Result<InvestmentId, BridgeError> {
            self.next().map(|_| 1)
        }

        async fn close_project(&self, project: ProjectId, _: Address) -> Result<(), BridgeError> {
            // Stand-in for a permanent refusal
            Err(BridgeError::Rejected(LedgerError::ProjectClosed(project)))
        }

        async fn release_project(&self, _: ProjectId, _: Address) -> Result<(), BridgeError> {
            self.next()
        }

        async fn project_info(&self, _: ProjectId) -> Result<ProjectPublicInfo, BridgeError> {
            Err(BridgeError::Transient("unreachable host".into()))
        }

        async fn investment_info(
            &self,
            _: InvestmentId,
        ) -> Result<InvestmentPublicInfo, BridgeError> {
            Err(BridgeError::Transient("unreachable host".into()))
        }
    }

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            request_timeout: Duration::from_secs(1),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(10),
            ..BridgeConfig::default()
        }
    }

    fn creator() -> Address {
        Address::new([7; 20])
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_until_success() {
        let client = Arc::new(FlakyClient::new(2));
        let bridge = ChainBridge::new(Arc::clone(&client) as Arc<dyn ChainClient>, fast_config());

        let id = bridge.release_project(1, creator()).await;
        assert!(id.is_ok());
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausts() {
        let client = Arc::new(FlakyClient::new(100));
        let bridge = ChainBridge::new(Arc::clone(&client) as Arc<dyn ChainClient>, fast_config());

        let err = bridge.release_project(1, creator()).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::RetriesExhausted { attempts: 4, .. }
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    /// Client whose first `slow_calls` responses outlast any deadline
    struct SlowClient {
        slow_calls: AtomicU32,
        calls: AtomicU32,
        delay: Duration,
    }

    impl SlowClient {
        fn new(slow_calls: u32, delay: Duration) -> Self {
            Self {
                slow_calls: AtomicU32::new(slow_calls),
                calls: AtomicU32::new(0),
                delay,
            }
        }

        async fn next(&self) -> Result<(), BridgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.slow_calls.load(Ordering::SeqCst);
            if remaining > 0 {
                self.slow_calls.store(remaining - 1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChainClient for SlowClient {
        async fn create_project(&self, _: CreateProjectRequest) -> Result<ProjectId, BridgeError> {
            self.next().await.map(|_| 1)
        }

        async fn submit_investment(
            &self,
            _: InvestmentRequest,
        ) -> Result<InvestmentId, BridgeError> {
            self.next().await.map(|_| 1)
        }

        async fn close_project(&self, _: ProjectId, _: Address) -> Result<(), BridgeError> {
            self.next().await
        }

        async fn release_project(&self, _: ProjectId, _: Address) -> Result<(), BridgeError> {
            self.next().await
        }

        async fn project_info(&self, _: ProjectId) -> Result<ProjectPublicInfo, BridgeError> {
            Err(BridgeError::Transient("unreachable host".into()))
        }

        async fn investment_info(
            &self,
            _: InvestmentId,
        ) -> Result<InvestmentPublicInfo, BridgeError> {
            Err(BridgeError::Transient("unreachable host".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_is_retried() {
        // First two attempts outlast the deadline, third responds in time
        let client = Arc::new(SlowClient::new(2, Duration::from_secs(30)));
        let bridge = ChainBridge::new(Arc::clone(&client) as Arc<dyn ChainClient>, fast_config());

        bridge.release_project(1, creator()).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_timeouts_exhaust_retries() {
        let client = Arc::new(SlowClient::new(u32::MAX, Duration::from_secs(30)));
        let bridge = ChainBridge::new(Arc::clone(&client) as Arc<dyn ChainClient>, fast_config());

        let err = bridge.release_project(1, creator()).await.unwrap_err();
        match err {
            BridgeError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert!(last.contains("timed out"));
            }
            other => panic!("expected retries exhausted, got {other}"),
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_never_retried() {
        let client = Arc::new(FlakyClient::new(0));
        let bridge = ChainBridge::new(Arc::clone(&client) as Arc<dyn ChainClient>, fast_config());

        let err = bridge.close_project(9, creator()).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Rejected(LedgerError::ProjectClosed(9))
        ));
        // close_project never increments calls in FlakyClient, so check
        // no extra attempts leaked through release_project's counter.
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_in_memory_chain_round_trip() {
        use rand::rngs::OsRng;
        use reelvault_core::codec::{keypair_bytes, CiphertextCodec, ElGamalCodec};
        use reelvault_core::crypto::{AmountBounds, ContextKeypair};

        let keys = ContextKeypair::generate(&mut OsRng);
        let (pk, _) = keypair_bytes(&keys).unwrap();
        let codec: Arc<dyn CiphertextCodec> = Arc::new(ElGamalCodec::new());
        let ledger = Arc::new(Ledger::new(Arc::clone(&codec), pk.clone(), None));
        let chain = Arc::new(InMemoryChain::with_clock(
            Arc::clone(&ledger),
            Arc::new(|| 1_000),
        ));
        let bridge = ChainBridge::new(chain as Arc<dyn ChainClient>, fast_config());

        let project = bridge
            .create_project(CreateProjectRequest {
                title: "Midnight Reel".into(),
                description: "indie noir feature".into(),
                genre: "thriller".into(),
                creator: creator(),
                target_amount: 1_000_000,
                duration_secs: 3_600,
                min_investment: 100,
                max_investment: 10_000,
            })
            .await
            .unwrap();

        let enc = codec.encrypt(5_000, &pk).unwrap();
        let proof = codec
            .prove_well_formed(
                5_000,
                &enc.witness,
                &enc.ciphertext,
                AmountBounds::new(100, 10_000),
                &pk,
            )
            .unwrap();
        let investment = bridge
            .submit_investment(InvestmentRequest {
                project_id: project,
                investor: Address::new([3; 20]),
                amount: enc.ciphertext,
                proof,
                escrow_value: 5_000,
                public_at_release: false,
            })
            .await
            .unwrap();

        let info = bridge.investment_info(investment).await.unwrap();
        assert_eq!(info.project_id, project);

        bridge.close_project(project, creator()).await.unwrap();
        bridge.release_project(project, creator()).await.unwrap();
        let info = bridge.project_info(project).await.unwrap();
        assert_eq!(info.status, ProjectStatus::Released);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_proof_rejected_through_bridge() {
        use rand::rngs::OsRng;
        use reelvault_core::codec::{keypair_bytes, CiphertextCodec, ElGamalCodec};
        use reelvault_core::crypto::{AmountBounds, ContextKeypair};

        let keys = ContextKeypair::generate(&mut OsRng);
        let (pk, _) = keypair_bytes(&keys).unwrap();
        let codec: Arc<dyn CiphertextCodec> = Arc::new(ElGamalCodec::new());
        let ledger = Arc::new(Ledger::new(Arc::clone(&codec), pk.clone(), None));
        let chain = Arc::new(InMemoryChain::with_clock(
            Arc::clone(&ledger),
            Arc::new(|| 1_000),
        ));
        let bridge = ChainBridge::new(chain as Arc<dyn ChainClient>, fast_config());

        let project = bridge
            .create_project(CreateProjectRequest {
                title: "t".into(),
                description: "d".into(),
                genre: "g".into(),
                creator: creator(),
                target_amount: 1_000,
                duration_secs: 3_600,
                min_investment: 100,
                max_investment: 10_000,
            })
            .await
            .unwrap();

        // Amount below the window: honest proof fails verification
        let enc = codec.encrypt(50, &pk).unwrap();
        let proof = codec
            .prove_well_formed(
                50,
                &enc.witness,
                &enc.ciphertext,
                AmountBounds::new(100, 10_000),
                &pk,
            )
            .unwrap();
        let err = bridge
            .submit_investment(InvestmentRequest {
                project_id: project,
                investor: Address::new([3; 20]),
                amount: enc.ciphertext,
                proof,
                escrow_value: 50,
                public_at_release: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Rejected(LedgerError::ProofRejected(_))
        ));
    }
}
