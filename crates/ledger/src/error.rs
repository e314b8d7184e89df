//! Error types for the ledger crate
//!
//! Reason codes are deliberately specific so callers can distinguish a
//! rejected proof from a closed project or a timing failure. A failed
//! proof check always surfaces as `ProofRejected`; it is never silently
//! downgraded or replaced with a default value.

use thiserror::Error;

use reelvault_core::codec::CodecError;

use crate::state::{InvestmentId, ProjectId, ProjectStatus};

/// State-machine operation failure
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Funding window is empty or inverted
    #[error("invalid funding window: end {end} must be after start {start}")]
    InvalidWindow { start: u64, end: u64 },

    /// Investment bounds are inverted
    #[error("invalid investment bounds: min {min} exceeds max {max}")]
    InvalidBounds { min: u64, max: u64 },

    /// Submission arrived before the funding window opened
    #[error("funding window for project {project} is not open at {now}")]
    OutOfWindow { project: ProjectId, now: u64 },

    /// Project no longer accepts investments
    #[error("project {0} is not accepting investments")]
    ProjectClosed(ProjectId),

    /// Admission proof failed verification against the project bounds
    #[error("admission proof rejected for project {0}")]
    ProofRejected(ProjectId),

    /// Caller lacks the required role for this operation
    #[error("caller is not authorized for this operation")]
    Unauthorized,

    /// Requested status change is not a legal transition
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },

    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("investment {0} not found")]
    InvestmentNotFound(InvestmentId),

    /// Underlying ciphertext operation failed
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Disclosure request failure
#[derive(Error, Debug)]
pub enum DisclosureError {
    /// Policy denied the request; no cryptographic work was performed
    #[error("requester is not authorized to view this value")]
    NotAuthorized,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Chain bridge failure
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Transport-level failure worth retrying (timeout, connection loss)
    #[error("transient chain failure: {0}")]
    Transient(String),

    /// The chain evaluated the call and refused it; retrying cannot help
    #[error("submission rejected: {0}")]
    Rejected(#[from] LedgerError),

    /// Retry budget spent without a successful attempt
    #[error("chain call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

pub type LedgerResult<T> = Result<T, LedgerError>;
