//! Passkey Core - WebAuthn ceremony orchestration
//!
//! This crate manages the trust decisions around WebAuthn registration and
//! authentication, while cryptographic verification is delegated to an
//! external [`WebAuthnVerifier`].
//!
//! # Components
//!
//! - [`ChallengeLedger`]: single-use, time-bounded challenges keyed by ceremony
//! - [`CredentialRepository`]: pluggable storage of users and credentials
//! - [`WebAuthnVerifier`]: external verifier contract and option builders
//! - [`CeremonyOrchestrator`]: drives both ceremonies end to end, enforcing
//!   challenge freshness, user binding and counter integrity
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use passkey_core::{CeremonyOrchestrator, MemoryRepository, WebAuthnConfig, WebAuthnVerifier};
//!
//! # async fn example(verifier: Arc<dyn WebAuthnVerifier>) -> passkey_core::Result<()> {
//! let config = WebAuthnConfig::from_env()?;
//! let orchestrator =
//!     CeremonyOrchestrator::new(config, Arc::new(MemoryRepository::new()), verifier);
//!
//! // Relay these to navigator.credentials.create
//! let options = orchestrator.begin_registration("u1", "alice", "Alice A").await?;
//! # let _ = options;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod options;
pub mod orchestrator;
pub mod repository;
pub mod verifier;

pub use config::{ConfigError, CounterPolicy, RelyingParty, WebAuthnConfig};
pub use error::{CeremonyFailure, Error, Result};
pub use ledger::{CeremonyKey, ChallengeLedger, IssuedChallenge, LedgerStats, SweeperHandle};
pub use model::{Credential, CredentialMetadata, DeviceType, User};
pub use options::{
    AuthenticationOptions, AuthenticationResponse, RegistrationOptions, RegistrationResponse,
    UserVerification,
};
pub use orchestrator::{
    generate_challenge, AuthenticatedUser, AuthenticationScope, AuthenticationStart,
    CeremonyOrchestrator, CeremonyOutcome,
};
pub use repository::{CredentialRemoval, CredentialRepository, MemoryRepository, RepositoryError};
pub use verifier::{
    ExpectedCeremony, Verification, VerifiedAuthentication, VerifiedRegistration,
    VerifierError, WebAuthnVerifier,
};
