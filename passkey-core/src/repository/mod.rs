//! Credential repository contract
//!
//! The orchestrator persists users and credentials through
//! [`CredentialRepository`]. Removal is an optional capability: a backend
//! advertises it by returning `Some` from [`CredentialRepository::removal`],
//! so an append-only backend is a typed, checkable case rather than a
//! missing method.

mod memory;

pub use memory::MemoryRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Credential, User};

/// Repository errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Credential id already registered: {0}")]
    DuplicateCredential(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Durable store of users and their credentials
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Insert a new user
    async fn create_user(&self, user: User) -> Result<User, RepositoryError>;

    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, RepositoryError>;

    async fn get_user_by_username(&self, username: &str)
        -> Result<Option<User>, RepositoryError>;

    /// Resolve the owner of a credential id across all users
    async fn find_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<(User, Credential)>, RepositoryError>;

    /// Replace the stored user record (including its credential set)
    async fn update_user(&self, user: &User) -> Result<(), RepositoryError>;

    /// Record a verified use of one credential.
    ///
    /// Sets the stored counter to `max(stored, counter)` and refreshes
    /// `last_used_at` in a single step against the current record, so
    /// concurrent ceremonies never lower the counter or drop credentials
    /// bound in the meantime. Returns the updated user and credential, or
    /// `None` when either is unknown.
    async fn record_credential_usage(
        &self,
        user_id: &str,
        credential_id: &str,
        counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<Option<(User, Credential)>, RepositoryError>;

    /// Set the display name of one credential; `false` when unknown
    async fn rename_credential(
        &self,
        user_id: &str,
        credential_id: &str,
        name: String,
    ) -> Result<bool, RepositoryError>;

    /// Bind a new credential to an existing user
    async fn add_credential(
        &self,
        user_id: &str,
        credential: Credential,
    ) -> Result<(), RepositoryError>;

    /// Removal capability, if this backend supports it
    fn removal(&self) -> Option<&dyn CredentialRemoval> {
        None
    }
}

/// Optional capability: deleting credentials
#[async_trait]
pub trait CredentialRemoval: Send + Sync {
    /// Returns whether a credential was removed
    async fn remove_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<bool, RepositoryError>;
}
