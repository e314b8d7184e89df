//! ReelVault - Confidential Funding Ledger
//!
//! On-chain-style state machine for film funding projects with
//! encrypted investment amounts. Projects carry public metadata, a
//! public investment window and bounds, and a homomorphic accumulator
//! of everything admitted. Amounts enter the ledger only as ciphertexts
//! with a verified admission proof and leave it only through the
//! disclosure service.
//!
//! # Modules
//! - `state`: addresses, project/investment records, public views
//! - `ledger`: the state machine; proof gate, accumulator, lifecycle
//! - `disclosure`: policy-gated decryption and key-switching
//! - `bridge`: async chain transport with timeout and bounded retry
//! - `error`: error types per layer

pub mod bridge;
pub mod disclosure;
pub mod error;
pub mod ledger;
pub mod state;

// Re-export common types
pub use bridge::{
    system_clock, BridgeConfig, ChainBridge, ChainClient, CreateProjectRequest, InMemoryChain,
    InvestmentRequest,
};
pub use disclosure::{DisclosureDecision, DisclosureService, DisclosureTarget};
pub use error::{BridgeError, DisclosureError, LedgerError, LedgerResult};
pub use ledger::{InvestmentView, Ledger, TotalRaisedView};
pub use state::{
    Address, AddressParseError, Investment, InvestmentId, InvestmentPublicInfo, Project,
    ProjectId, ProjectParams, ProjectPublicInfo, ProjectStatus,
};
