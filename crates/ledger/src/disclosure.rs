//! Selective disclosure service
//!
//! Holds the context secret key and answers decryption and
//! re-encryption requests against the ledger. Every request is
//! authorized first; no codec operation runs for a denied request, so a
//! policy bug cannot leak plaintext as a side effect.
//!
//! Policy:
//! - an investor may always open their own investment amount
//! - a project's aggregate opens to anyone once the project is released
//! - an individual amount opens to anyone after release only if the
//!   investor opted in via `set_public_disclosure`

use std::sync::Arc;

use tracing::{debug, warn};

use reelvault_core::codec::{CiphertextBytes, CiphertextCodec, PublicKeyBytes, SecretKeyBytes};

use crate::error::DisclosureError;
use crate::ledger::Ledger;
use crate::state::{Address, InvestmentId, ProjectId, ProjectStatus};

/// What a requester wants opened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisclosureTarget {
    Investment(InvestmentId),
    ProjectTotal(ProjectId),
}

/// Outcome of the authorization check
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisclosureDecision {
    /// Policy forbids the request
    Deny,
    /// Requester may receive the plaintext
    DecryptAllowed,
    /// Requester may receive the ciphertext switched to this key
    ReencryptAllowed(PublicKeyBytes),
}

/// Disclosure endpoint over a shared ledger
pub struct DisclosureService {
    ledger: Arc<Ledger>,
    codec: Arc<dyn CiphertextCodec>,
    /// Context secret key; the only copy outside key generation
    context_secret: SecretKeyBytes,
}

impl DisclosureService {
    pub fn new(
        ledger: Arc<Ledger>,
        codec: Arc<dyn CiphertextCodec>,
        context_secret: SecretKeyBytes,
    ) -> Self {
        Self {
            ledger,
            codec,
            context_secret,
        }
    }

    /// Evaluates the disclosure policy for a request
    ///
    /// Lookup failures (unknown ids) surface as errors; a well-formed
    /// request that policy forbids yields `Deny`, not an error.
    pub fn authorize(
        &self,
        target: DisclosureTarget,
        requester: Address,
        reencrypt_to: Option<&PublicKeyBytes>,
    ) -> Result<DisclosureDecision, DisclosureError> {
        let allowed = match target {
            DisclosureTarget::Investment(id) => {
                let view = self.ledger.investment_view(id)?;
                view.investor == requester
                    || (view.project_status == ProjectStatus::Released && view.public_at_release)
            }
            DisclosureTarget::ProjectTotal(id) => {
                let view = self.ledger.total_raised_view(id)?;
                view.status == ProjectStatus::Released
            }
        };

        if !allowed {
            debug!(?target, requester = %requester, "disclosure denied");
            return Ok(DisclosureDecision::Deny);
        }
        Ok(match reencrypt_to {
            Some(key) => DisclosureDecision::ReencryptAllowed(key.clone()),
            None => DisclosureDecision::DecryptAllowed,
        })
    }

    /// Opens the target value as plaintext
    pub fn request_decryption(
        &self,
        target: DisclosureTarget,
        requester: Address,
    ) -> Result<u64, DisclosureError> {
        match self.authorize(target, requester, None)? {
            DisclosureDecision::DecryptAllowed => {
                let ciphertext = self.target_ciphertext(target)?;
                Ok(self.codec.decrypt(&ciphertext, &self.context_secret)?)
            }
            _ => {
                warn!(?target, requester = %requester, "decryption request denied");
                Err(DisclosureError::NotAuthorized)
            }
        }
    }

    /// Switches the target ciphertext to the requester's own key so
    /// they can decrypt locally; the context secret never leaves the
    /// service
    pub fn request_reencryption(
        &self,
        target: DisclosureTarget,
        requester: Address,
        viewer_key: &PublicKeyBytes,
    ) -> Result<CiphertextBytes, DisclosureError> {
        match self.authorize(target, requester, Some(viewer_key))? {
            DisclosureDecision::ReencryptAllowed(key) => {
                let ciphertext = self.target_ciphertext(target)?;
                Ok(self
                    .codec
                    .reencrypt(&ciphertext, &self.context_secret, &key)?)
            }
            _ => {
                warn!(?target, requester = %requester, "re-encryption request denied");
                Err(DisclosureError::NotAuthorized)
            }
        }
    }

    fn target_ciphertext(
        &self,
        target: DisclosureTarget,
    ) -> Result<CiphertextBytes, DisclosureError> {
        Ok(match target {
            DisclosureTarget::Investment(id) => self.ledger.investment_view(id)?.amount,
            DisclosureTarget::ProjectTotal(id) => self.ledger.total_raised_view(id)?.total_raised,
        })
    }
}

impl std::fmt::Debug for DisclosureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the context secret
        f.debug_struct("DisclosureService").finish_non_exhaustive()
    }
}
