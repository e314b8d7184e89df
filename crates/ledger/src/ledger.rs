//! Project/investment state machine
//!
//! The ledger is the single writer over project state. It verifies
//! admission proofs at the gate, folds accepted ciphertexts into the
//! per-project homomorphic accumulator, and enforces the one-way status
//! lifecycle. Submission is all-or-nothing: a rejected proof mutates
//! nothing.
//!
//! Concurrency: projects live in a `DashMap` keyed by id, each behind
//! its own `parking_lot::RwLock`, so submissions to different projects
//! never contend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{info, warn};

use reelvault_core::codec::{CiphertextBytes, CiphertextCodec, ProofBytes, PublicKeyBytes};

use crate::error::LedgerError;
use crate::state::{
    Address, Investment, InvestmentId, InvestmentPublicInfo, Project, ProjectId, ProjectParams,
    ProjectPublicInfo, ProjectStatus,
};

/// Read-only view handed to the disclosure service for a single
/// investment
#[derive(Clone, Debug)]
pub struct InvestmentView {
    pub project_id: ProjectId,
    pub project_status: ProjectStatus,
    pub investor: Address,
    pub amount: CiphertextBytes,
    pub public_at_release: bool,
}

/// Read-only view handed to the disclosure service for a project
/// aggregate
#[derive(Clone, Debug)]
pub struct TotalRaisedView {
    pub status: ProjectStatus,
    pub total_raised: CiphertextBytes,
}

/// In-memory confidential funding ledger
pub struct Ledger {
    codec: Arc<dyn CiphertextCodec>,
    /// Context public key; every accumulator and submitted amount is
    /// encrypted under it
    context_key: PublicKeyBytes,
    /// Optional operator allowed to close/release any project
    admin: Option<Address>,
    projects: DashMap<ProjectId, RwLock<Project>>,
    /// Investment id -> owning project
    investment_index: DashMap<InvestmentId, ProjectId>,
    /// Investor -> investment ids, in submission order
    investor_index: DashMap<Address, Vec<InvestmentId>>,
    next_project_id: AtomicU64,
    next_investment_id: AtomicU64,
}

impl Ledger {
    pub fn new(
        codec: Arc<dyn CiphertextCodec>,
        context_key: PublicKeyBytes,
        admin: Option<Address>,
    ) -> Self {
        Self {
            codec,
            context_key,
            admin,
            projects: DashMap::new(),
            investment_index: DashMap::new(),
            investor_index: DashMap::new(),
            next_project_id: AtomicU64::new(1),
            next_investment_id: AtomicU64::new(1),
        }
    }

    /// Public key investments must be encrypted under
    pub fn context_key(&self) -> &PublicKeyBytes {
        &self.context_key
    }

    /// Registers a new project with an empty encrypted accumulator
    pub fn create_project(
        &self,
        params: ProjectParams,
        now: u64,
    ) -> Result<ProjectId, LedgerError> {
        if params.end_time <= params.start_time || params.end_time <= now {
            return Err(LedgerError::InvalidWindow {
                start: params.start_time,
                end: params.end_time,
            });
        }
        if params.min_investment > params.max_investment {
            return Err(LedgerError::InvalidBounds {
                min: params.min_investment,
                max: params.max_investment,
            });
        }

        // Accumulator starts as a real encryption of zero so the first
        // homomorphic add needs no special case.
        let total_raised = self.codec.encrypt_zero(&self.context_key)?;

        let id = self.next_project_id.fetch_add(1, Ordering::Relaxed);
        let project = Project {
            id,
            title: params.title,
            description: params.description,
            genre: params.genre,
            creator: params.creator,
            target_amount: params.target_amount,
            start_time: params.start_time,
            end_time: params.end_time,
            min_investment: params.min_investment,
            max_investment: params.max_investment,
            status: ProjectStatus::Funding,
            total_raised,
            escrow_total: 0,
            investments: Vec::new(),
        };

        info!(
            project = id,
            creator = %project.creator,
            target = project.target_amount,
            "project created"
        );
        self.projects.insert(id, RwLock::new(project));
        Ok(id)
    }

    /// Admits an encrypted investment into a project
    ///
    /// The proof is verified against the project's public bounds before
    /// any state changes. On success the ciphertext is folded into the
    /// accumulator and the investment recorded atomically.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_investment(
        &self,
        project_id: ProjectId,
        investor: Address,
        amount: CiphertextBytes,
        proof: ProofBytes,
        escrow_value: u64,
        public_at_release: bool,
        now: u64,
    ) -> Result<InvestmentId, LedgerError> {
        let entry = self
            .projects
            .get(&project_id)
            .ok_or(LedgerError::ProjectNotFound(project_id))?;

        // Admission checks under a short write lock; bounds are immutable
        // after creation, so verification can run without holding it and
        // disclosure reads stay unblocked.
        let bounds = {
            let mut project = entry.write();

            // Lazy close on window expiry
            if project.status == ProjectStatus::Funding && now >= project.end_time {
                project.status = ProjectStatus::Closed;
                info!(project = project_id, "funding window expired, project closed");
            }
            if project.status != ProjectStatus::Funding {
                return Err(LedgerError::ProjectClosed(project_id));
            }
            if now < project.start_time {
                return Err(LedgerError::OutOfWindow {
                    project: project_id,
                    now,
                });
            }
            project.bounds()
        };

        if !self
            .codec
            .verify(&amount, &proof, bounds, &self.context_key)
        {
            warn!(
                project = project_id,
                investor = %investor,
                "admission proof rejected"
            );
            return Err(LedgerError::ProofRejected(project_id));
        }

        let mut project = entry.write();
        // Status may have moved while the lock was released
        if project.status != ProjectStatus::Funding {
            return Err(LedgerError::ProjectClosed(project_id));
        }

        // Compute the new accumulator before touching any record so a
        // codec failure leaves the project untouched.
        let total_raised = self.codec.homomorphic_add(&project.total_raised, &amount)?;

        let id = self.next_investment_id.fetch_add(1, Ordering::Relaxed);
        project.total_raised = total_raised;
        project.escrow_total = project.escrow_total.saturating_add(escrow_value);
        project.investments.push(Investment {
            id,
            project_id,
            investor,
            amount,
            proof,
            escrow_value,
            timestamp: now,
            public_at_release,
        });

        self.investment_index.insert(id, project_id);
        self.investor_index.entry(investor).or_default().push(id);

        info!(
            project = project_id,
            investment = id,
            investor = %investor,
            "investment admitted"
        );
        Ok(id)
    }

    /// Closes a funding project; creator or admin only
    pub fn close_project(
        &self,
        project_id: ProjectId,
        caller: Address,
        now: u64,
    ) -> Result<(), LedgerError> {
        let entry = self
            .projects
            .get(&project_id)
            .ok_or(LedgerError::ProjectNotFound(project_id))?;
        let mut project = entry.write();

        self.check_operator(&project, caller)?;
        if project.status == ProjectStatus::Funding && now >= project.end_time {
            project.status = ProjectStatus::Closed;
            info!(project = project_id, "funding window expired, project closed");
            return Ok(());
        }
        if project.status != ProjectStatus::Funding {
            return Err(LedgerError::InvalidTransition {
                from: project.status,
                to: ProjectStatus::Closed,
            });
        }
        project.status = ProjectStatus::Closed;
        info!(project = project_id, caller = %caller, "project closed");
        Ok(())
    }

    /// Releases a closed project, unlocking public disclosure of the
    /// aggregate; creator or admin only
    pub fn release_project(
        &self,
        project_id: ProjectId,
        caller: Address,
        now: u64,
    ) -> Result<(), LedgerError> {
        let entry = self
            .projects
            .get(&project_id)
            .ok_or(LedgerError::ProjectNotFound(project_id))?;
        let mut project = entry.write();

        self.check_operator(&project, caller)?;
        // An expired Funding project may be released directly; the close
        // is implied by the window.
        if project.status == ProjectStatus::Funding && now >= project.end_time {
            project.status = ProjectStatus::Closed;
        }
        if project.status != ProjectStatus::Closed {
            return Err(LedgerError::InvalidTransition {
                from: project.status,
                to: ProjectStatus::Released,
            });
        }
        project.status = ProjectStatus::Released;
        info!(project = project_id, caller = %caller, "project released");
        Ok(())
    }

    /// Investor opt-in to public disclosure of their amount after
    /// release; idempotent
    pub fn set_public_disclosure(
        &self,
        investment_id: InvestmentId,
        caller: Address,
    ) -> Result<(), LedgerError> {
        let project_id = *self
            .investment_index
            .get(&investment_id)
            .ok_or(LedgerError::InvestmentNotFound(investment_id))?;
        let entry = self
            .projects
            .get(&project_id)
            .ok_or(LedgerError::ProjectNotFound(project_id))?;
        let mut project = entry.write();

        let investment = project
            .investments
            .iter_mut()
            .find(|inv| inv.id == investment_id)
            .ok_or(LedgerError::InvestmentNotFound(investment_id))?;
        if investment.investor != caller {
            return Err(LedgerError::Unauthorized);
        }
        investment.public_at_release = true;
        info!(investment = investment_id, "public disclosure opt-in");
        Ok(())
    }

    /// Public project view; never includes ciphertexts
    pub fn project_info(&self, project_id: ProjectId) -> Result<ProjectPublicInfo, LedgerError> {
        let entry = self
            .projects
            .get(&project_id)
            .ok_or(LedgerError::ProjectNotFound(project_id))?;
        let project = entry.read();
        Ok(project.public_info())
    }

    /// Public investment view; never includes the amount ciphertext
    pub fn investment_info(
        &self,
        investment_id: InvestmentId,
    ) -> Result<InvestmentPublicInfo, LedgerError> {
        self.with_investment(investment_id, |inv| inv.public_info())
    }

    /// All project ids, ascending
    pub fn project_ids(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self.projects.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Investment ids submitted by an investor, in submission order
    pub fn investments_of(&self, investor: Address) -> Vec<InvestmentId> {
        self.investor_index
            .get(&investor)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Snapshot for the disclosure service
    pub fn investment_view(
        &self,
        investment_id: InvestmentId,
    ) -> Result<InvestmentView, LedgerError> {
        let project_id = *self
            .investment_index
            .get(&investment_id)
            .ok_or(LedgerError::InvestmentNotFound(investment_id))?;
        let entry = self
            .projects
            .get(&project_id)
            .ok_or(LedgerError::ProjectNotFound(project_id))?;
        let project = entry.read();
        let investment = project
            .investments
            .iter()
            .find(|inv| inv.id == investment_id)
            .ok_or(LedgerError::InvestmentNotFound(investment_id))?;
        Ok(InvestmentView {
            project_id,
            project_status: project.status,
            investor: investment.investor,
            amount: investment.amount.clone(),
            public_at_release: investment.public_at_release,
        })
    }

    /// Snapshot of the encrypted aggregate for the disclosure service
    pub fn total_raised_view(
        &self,
        project_id: ProjectId,
    ) -> Result<TotalRaisedView, LedgerError> {
        let entry = self
            .projects
            .get(&project_id)
            .ok_or(LedgerError::ProjectNotFound(project_id))?;
        let project = entry.read();
        Ok(TotalRaisedView {
            status: project.status,
            total_raised: project.total_raised.clone(),
        })
    }

    fn check_operator(&self, project: &Project, caller: Address) -> Result<(), LedgerError> {
        if caller == project.creator || self.admin == Some(caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }

    fn with_investment<T>(
        &self,
        investment_id: InvestmentId,
        f: impl FnOnce(&Investment) -> T,
    ) -> Result<T, LedgerError> {
        let project_id = *self
            .investment_index
            .get(&investment_id)
            .ok_or(LedgerError::InvestmentNotFound(investment_id))?;
        let entry = self
            .projects
            .get(&project_id)
            .ok_or(LedgerError::ProjectNotFound(project_id))?;
        let project = entry.read();
        let investment = project
            .investments
            .iter()
            .find(|inv| inv.id == investment_id)
            .ok_or(LedgerError::InvestmentNotFound(investment_id))?;
        Ok(f(investment))
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("projects", &self.projects.len())
            .field("investments", &self.investment_index.len())
            .finish_non_exhaustive()
    }
}
