//! Unified error types for the ReelVault core
//!
//! Each module defines its own error enum; this umbrella exists for
//! callers that cross module boundaries (the ledger crate and binaries).

use thiserror::Error;

use crate::codec::CodecError;
use crate::crypto::CryptoError;
use crate::gateway::GatewayError;

/// Top-level error type for the core crate
#[derive(Error, Debug)]
pub enum CoreError {
    /// Raw scheme operation failure
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Codec adapter failure
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Gateway orchestration failure
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Result alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
