//! Ledger state model
//!
//! Plain records for projects and investments plus the public views the
//! read API hands out. Encrypted amounts never appear in a public view;
//! they only leave the ledger through the disclosure service.

use serde::{Deserialize, Serialize};

use reelvault_core::codec::{CiphertextBytes, ProofBytes};
use reelvault_core::crypto::AmountBounds;

/// Monotonic project identifier assigned by the ledger
pub type ProjectId = u64;

/// Monotonic investment identifier assigned by the ledger
pub type InvestmentId = u64;

/// 20-byte account address, displayed as 0x-prefixed hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const LEN: usize = 20;

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parses a hex address, with or without the 0x prefix
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(stripped).map_err(|_| AddressParseError(s.to_string()))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl std::str::FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Malformed address string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct AddressParseError(pub String);

/// Lifecycle of a funding project
///
/// Transitions are one-way: Funding -> Closed -> Released. A project
/// closes either explicitly or when its window expires; release is
/// always explicit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Accepting investments inside the funding window
    Funding,
    /// Window over or closed by the creator; no further investments
    Closed,
    /// Funds released; aggregate total becomes publicly disclosable
    Released,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Funding => write!(f, "funding"),
            ProjectStatus::Closed => write!(f, "closed"),
            ProjectStatus::Released => write!(f, "released"),
        }
    }
}

/// Parameters for creating a project
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectParams {
    pub title: String,
    pub description: String,
    pub genre: String,
    pub creator: Address,
    /// Public funding goal, in base units
    pub target_amount: u64,
    /// Funding window opens at this unix timestamp (inclusive)
    pub start_time: u64,
    /// Funding window closes at this unix timestamp (exclusive)
    pub end_time: u64,
    /// Smallest admissible investment amount (inclusive)
    pub min_investment: u64,
    /// Largest admissible investment amount (inclusive)
    pub max_investment: u64,
}

/// Full project record as held by the ledger
#[derive(Clone, Debug)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub creator: Address,
    pub target_amount: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub min_investment: u64,
    pub max_investment: u64,
    pub status: ProjectStatus,
    /// Running homomorphic sum of all accepted amounts, under the
    /// context key. Starts as an encryption of zero.
    pub total_raised: CiphertextBytes,
    /// Public escrow counter; escrow values are not confidential
    pub escrow_total: u64,
    pub investments: Vec<Investment>,
}

impl Project {
    /// Admissible amount window for this project
    pub fn bounds(&self) -> AmountBounds {
        AmountBounds::new(self.min_investment, self.max_investment)
    }

    pub fn public_info(&self) -> ProjectPublicInfo {
        ProjectPublicInfo {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            genre: self.genre.clone(),
            creator: self.creator,
            target_amount: self.target_amount,
            start_time: self.start_time,
            end_time: self.end_time,
            min_investment: self.min_investment,
            max_investment: self.max_investment,
            status: self.status,
            escrow_total: self.escrow_total,
            investment_count: self.investments.len() as u64,
        }
    }
}

/// Accepted investment record
#[derive(Clone, Debug)]
pub struct Investment {
    pub id: InvestmentId,
    pub project_id: ProjectId,
    pub investor: Address,
    /// Amount under the context key; opaque to everyone but the
    /// disclosure service
    pub amount: CiphertextBytes,
    /// Admission proof as submitted, retained for audit
    pub proof: ProofBytes,
    /// Public escrow value posted alongside the ciphertext
    pub escrow_value: u64,
    pub timestamp: u64,
    /// Investor opt-in: amount becomes publicly disclosable once the
    /// project is released
    pub public_at_release: bool,
}

impl Investment {
    pub fn public_info(&self) -> InvestmentPublicInfo {
        InvestmentPublicInfo {
            id: self.id,
            project_id: self.project_id,
            investor: self.investor,
            escrow_value: self.escrow_value,
            timestamp: self.timestamp,
            public_at_release: self.public_at_release,
        }
    }
}

/// Project fields visible to any caller
///
/// Deliberately excludes `total_raised`; the encrypted aggregate is only
/// reachable through the disclosure service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPublicInfo {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub creator: Address,
    pub target_amount: u64,
    pub start_time: u64,
    pub end_time: u64,
    pub min_investment: u64,
    pub max_investment: u64,
    pub status: ProjectStatus,
    pub escrow_total: u64,
    pub investment_count: u64,
}

/// Investment fields visible to any caller; the amount ciphertext is not
/// among them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentPublicInfo {
    pub id: InvestmentId,
    pub project_id: ProjectId,
    pub investor: Address,
    pub escrow_value: u64,
    pub timestamp: u64,
    pub public_at_release: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address::new([0xab; 20]);
        let s = addr.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(Address::from_hex(&s).unwrap(), addr);
        // Prefix is optional on parse
        assert_eq!(Address::from_hex(&s[2..]).unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("not hex at all").is_err());
        assert!(Address::from_hex(&"ff".repeat(21)).is_err());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProjectStatus::Funding.to_string(), "funding");
        assert_eq!(ProjectStatus::Released.to_string(), "released");
    }

    #[test]
    fn test_public_info_excludes_ciphertexts() {
        // Serialized public views must never leak ciphertext bytes
        let info = ProjectPublicInfo {
            id: 1,
            title: "Midnight Reel".into(),
            description: "indie noir".into(),
            genre: "thriller".into(),
            creator: Address::new([1; 20]),
            target_amount: 1_000_000,
            start_time: 100,
            end_time: 200,
            min_investment: 100,
            max_investment: 10_000,
            status: ProjectStatus::Funding,
            escrow_total: 0,
            investment_count: 0,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("total_raised"));
        assert!(!json.contains("ciphertext"));
    }
}
