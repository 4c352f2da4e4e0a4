//! Ceremony orchestration
//!
//! [`CeremonyOrchestrator`] drives registration and authentication end to end:
//! it issues challenges into its [`ChallengeLedger`], binds each ceremony to a
//! user (or resolves the user from a discoverable credential), delegates
//! cryptographic checks to a [`WebAuthnVerifier`] and persists the result
//! through a [`CredentialRepository`].
//!
//! Each ceremony is `Begun -> Verified | Rejected`. A challenge is consumed
//! only when its ceremony verifies; on any other outcome it is put back with
//! its original expiry, so the client may retry until the challenge expires.

mod authentication;
mod management;
mod registration;

pub use authentication::{AuthenticatedUser, AuthenticationScope, AuthenticationStart};

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

use crate::config::WebAuthnConfig;
use crate::error::CeremonyFailure;
use crate::ledger::{CeremonyKey, ChallengeLedger, IssuedChallenge};
use crate::repository::CredentialRepository;
use crate::verifier::{ExpectedCeremony, WebAuthnVerifier};

/// Bytes of randomness in every challenge
pub const CHALLENGE_BYTES: usize = 32;

/// Result of a ceremony-ending operation.
///
/// Unverified outcomes are ordinary values; only faults (storage or
/// verifier unavailable) are returned as `Err` by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeremonyOutcome<T> {
    Verified(T),
    Failed(CeremonyFailure),
}

impl<T> CeremonyOutcome<T> {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    pub fn failure(&self) -> Option<&CeremonyFailure> {
        match self {
            Self::Verified(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// Human-readable error, if the ceremony did not verify
    pub fn error_message(&self) -> Option<String> {
        self.failure().map(ToString::to_string)
    }

    pub fn into_result(self) -> Result<T, CeremonyFailure> {
        match self {
            Self::Verified(value) => Ok(value),
            Self::Failed(failure) => Err(failure),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CeremonyOutcome<U> {
        match self {
            Self::Verified(value) => CeremonyOutcome::Verified(f(value)),
            Self::Failed(failure) => CeremonyOutcome::Failed(failure),
        }
    }
}

/// Coordinates challenge ledger, verifier and repository
pub struct CeremonyOrchestrator {
    config: WebAuthnConfig,
    ledger: Arc<ChallengeLedger>,
    repository: Arc<dyn CredentialRepository>,
    verifier: Arc<dyn WebAuthnVerifier>,
}

impl CeremonyOrchestrator {
    /// Create an orchestrator owning a fresh challenge ledger
    pub fn new(
        config: WebAuthnConfig,
        repository: Arc<dyn CredentialRepository>,
        verifier: Arc<dyn WebAuthnVerifier>,
    ) -> Self {
        Self::with_ledger(config, Arc::new(ChallengeLedger::new()), repository, verifier)
    }

    /// Create an orchestrator on an existing ledger
    pub fn with_ledger(
        config: WebAuthnConfig,
        ledger: Arc<ChallengeLedger>,
        repository: Arc<dyn CredentialRepository>,
        verifier: Arc<dyn WebAuthnVerifier>,
    ) -> Self {
        Self {
            config,
            ledger,
            repository,
            verifier,
        }
    }

    pub fn config(&self) -> &WebAuthnConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<ChallengeLedger> {
        &self.ledger
    }

    pub fn repository(&self) -> &Arc<dyn CredentialRepository> {
        &self.repository
    }

    fn expected(&self, challenge: &IssuedChallenge) -> ExpectedCeremony {
        let rp = &self.config.relying_party;
        ExpectedCeremony {
            challenge: challenge.value.clone(),
            origin: rp.origin.as_str().trim_end_matches('/').to_string(),
            rp_id: rp.id.clone(),
            require_user_verification: self.config.require_user_verification(),
        }
    }

    fn issue(&self, key: &CeremonyKey, challenge: &str) {
        self.ledger
            .issue(key, challenge, self.config.challenge_ttl);
    }

    /// Put the challenge back unless the ceremony verified
    fn settle<T, E>(
        &self,
        key: &CeremonyKey,
        challenge: IssuedChallenge,
        outcome: &Result<CeremonyOutcome<T>, E>,
    ) {
        if !matches!(outcome, Ok(CeremonyOutcome::Verified(_))) && !self.ledger.restore(key, challenge)
        {
            tracing::debug!(key = %key, "Challenge not restored (expired or superseded)");
        }
    }
}

impl std::fmt::Debug for CeremonyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CeremonyOrchestrator")
            .field("rp_id", &self.config.relying_party.id)
            .field("ledger", &self.ledger)
            .finish()
    }
}

/// Fresh high-entropy challenge, base64url without padding
pub fn generate_challenge() -> String {
    let mut bytes = [0u8; CHALLENGE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
