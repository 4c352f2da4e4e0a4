use thiserror::Error;

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use crate::verifier::VerifierError;

/// Why a ceremony ended unverified.
///
/// These are expected outcomes, not faults: they travel inside a
/// [`CeremonyOutcome`](crate::CeremonyOutcome) rather than an `Err`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CeremonyFailure {
    #[error("Challenge expired or missing; restart the ceremony")]
    ChallengeExpiredOrMissing,

    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),
}

impl CeremonyFailure {
    /// Stable code for programmatic handling by callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChallengeExpiredOrMissing => "CHALLENGE_EXPIRED_OR_MISSING",
            Self::RegistrationRejected(_) => "REGISTRATION_REJECTED",
            Self::AuthenticationRejected(_) => "AUTHENTICATION_REJECTED",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::CredentialNotFound(_) => "CREDENTIAL_NOT_FOUND",
        }
    }
}

/// Faults that end an orchestrator call.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Username already registered to another user: {0}")]
    UsernameTaken(String),

    #[error("Operation not supported by the credential repository: {0}")]
    UnsupportedOperation(&'static str),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
