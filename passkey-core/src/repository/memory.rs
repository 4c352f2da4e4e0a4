//! In-memory credential repository
//!
//! Thread-safe storage for development and tests. Each instance owns its own
//! maps, so several orchestrators can coexist in one process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{CredentialRemoval, CredentialRepository, RepositoryError};
use crate::model::{Credential, User};

/// DashMap-backed repository with a global credential-id index
pub struct MemoryRepository {
    /// user_id -> user
    users: DashMap<String, User>,
    /// username -> user_id
    usernames: DashMap<String, String>,
    /// credential_id -> user_id
    credential_index: DashMap<String, String>,
    allow_removal: bool,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Repository supporting credential removal
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            usernames: DashMap::new(),
            credential_index: DashMap::new(),
            allow_removal: true,
        }
    }

    /// Repository that never deletes credentials
    pub fn append_only() -> Self {
        Self {
            allow_removal: false,
            ..Self::new()
        }
    }

    pub fn credential_count(&self) -> usize {
        self.credential_index.len()
    }

    fn check_credentials_unclaimed(&self, user: &User) -> Result<(), RepositoryError> {
        for credential in &user.credentials {
            if let Some(owner) = self.credential_index.get(&credential.id) {
                if *owner != user.id {
                    return Err(RepositoryError::DuplicateCredential(credential.id.clone()));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for MemoryRepository {
    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        self.check_credentials_unclaimed(&user)?;

        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => return Err(RepositoryError::UserExists(user.username)),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }

        match self.users.entry(user.id.clone()) {
            Entry::Occupied(_) => {
                self.usernames.remove(&user.username);
                Err(RepositoryError::UserExists(user.id))
            }
            Entry::Vacant(slot) => {
                for credential in &user.credentials {
                    self.credential_index
                        .insert(credential.id.clone(), user.id.clone());
                }
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let Some(user_id) = self.usernames.get(username).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        self.get_user_by_id(&user_id).await
    }

    async fn find_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<(User, Credential)>, RepositoryError> {
        let Some(user_id) = self
            .credential_index
            .get(credential_id)
            .map(|id| id.value().clone())
        else {
            return Ok(None);
        };

        Ok(self.users.get(&user_id).and_then(|user| {
            user.credential(credential_id)
                .cloned()
                .map(|credential| (user.value().clone(), credential))
        }))
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        self.check_credentials_unclaimed(user)?;

        let mut stored = self
            .users
            .get_mut(&user.id)
            .ok_or_else(|| RepositoryError::UserNotFound(user.id.clone()))?;

        if stored.username != user.username {
            match self.usernames.entry(user.username.clone()) {
                Entry::Occupied(_) => {
                    return Err(RepositoryError::UserExists(user.username.clone()))
                }
                Entry::Vacant(slot) => {
                    slot.insert(user.id.clone());
                }
            }
            self.usernames.remove(&stored.username);
        }

        for old in &stored.credentials {
            if user.credential(&old.id).is_none() {
                self.credential_index.remove(&old.id);
            }
        }
        for credential in &user.credentials {
            self.credential_index
                .insert(credential.id.clone(), user.id.clone());
        }

        *stored = user.clone();
        Ok(())
    }

    async fn record_credential_usage(
        &self,
        user_id: &str,
        credential_id: &str,
        counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<Option<(User, Credential)>, RepositoryError> {
        let Some(mut user) = self.users.get_mut(user_id) else {
            return Ok(None);
        };
        let Some(credential) = user.credential_mut(credential_id) else {
            return Ok(None);
        };
        credential.counter = credential.counter.max(counter);
        credential.last_used_at = Some(used_at);
        let credential = credential.clone();

        Ok(Some((user.value().clone(), credential)))
    }

    async fn rename_credential(
        &self,
        user_id: &str,
        credential_id: &str,
        name: String,
    ) -> Result<bool, RepositoryError> {
        let Some(mut user) = self.users.get_mut(user_id) else {
            return Ok(false);
        };
        match user.credential_mut(credential_id) {
            Some(credential) => {
                credential.name = Some(name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_credential(
        &self,
        user_id: &str,
        credential: Credential,
    ) -> Result<(), RepositoryError> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| RepositoryError::UserNotFound(user_id.to_string()))?;

        match self.credential_index.entry(credential.id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::DuplicateCredential(credential.id)),
            Entry::Vacant(slot) => {
                slot.insert(user_id.to_string());
                user.credentials.push(credential);
                Ok(())
            }
        }
    }

    fn removal(&self) -> Option<&dyn CredentialRemoval> {
        if self.allow_removal {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl CredentialRemoval for MemoryRepository {
    async fn remove_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<bool, RepositoryError> {
        let Some(mut user) = self.users.get_mut(user_id) else {
            return Ok(false);
        };
        let before = user.credentials.len();
        user.credentials.retain(|c| c.id != credential_id);
        let removed = user.credentials.len() < before;
        if removed {
            self.credential_index.remove(credential_id);
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for MemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("users", &self.users.len())
            .field("credentials", &self.credential_index.len())
            .field("allow_removal", &self.allow_removal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceType;

    fn credential(id: &str) -> Credential {
        Credential {
            id: id.to_string(),
            public_key: vec![1, 2, 3],
            counter: 0,
            device_type: DeviceType::SingleDevice,
            backed_up: false,
            transports: None,
            name: None,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let repo = MemoryRepository::new();
        repo.create_user(User::new("u1", "alice", "Alice A"))
            .await
            .unwrap();

        assert_eq!(repo.get_user_by_id("u1").await.unwrap().unwrap().username, "alice");
        assert_eq!(repo.get_user_by_username("alice").await.unwrap().unwrap().id, "u1");
        assert!(repo.get_user_by_username("Alice").await.unwrap().is_none());
        assert!(repo.get_user_by_id("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let repo = MemoryRepository::new();
        repo.create_user(User::new("u1", "alice", "Alice")).await.unwrap();

        let same_id = repo.create_user(User::new("u1", "bob", "Bob")).await;
        assert_eq!(same_id, Err(RepositoryError::UserExists("u1".into())));
        // The failed insert must not leave bob's username reserved
        assert!(repo.get_user_by_username("bob").await.unwrap().is_none());

        let same_name = repo.create_user(User::new("u2", "alice", "Other")).await;
        assert_eq!(same_name, Err(RepositoryError::UserExists("alice".into())));
    }

    #[tokio::test]
    async fn test_credential_ids_are_globally_unique() {
        let repo = MemoryRepository::new();
        repo.create_user(User::new("u1", "alice", "Alice")).await.unwrap();
        repo.create_user(User::new("u2", "bob", "Bob")).await.unwrap();

        repo.add_credential("u1", credential("c1")).await.unwrap();
        let result = repo.add_credential("u2", credential("c1")).await;
        assert_eq!(result, Err(RepositoryError::DuplicateCredential("c1".into())));

        let (owner, found) = repo.find_by_credential_id("c1").await.unwrap().unwrap();
        assert_eq!(owner.id, "u1");
        assert_eq!(found.id, "c1");
    }

    #[tokio::test]
    async fn test_add_credential_unknown_user() {
        let repo = MemoryRepository::new();
        let result = repo.add_credential("ghost", credential("c1")).await;
        assert_eq!(result, Err(RepositoryError::UserNotFound("ghost".into())));
        assert!(repo.find_by_credential_id("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_reindexes_credentials() {
        let repo = MemoryRepository::new();
        repo.create_user(User::new("u1", "alice", "Alice")).await.unwrap();
        repo.add_credential("u1", credential("c1")).await.unwrap();

        let mut user = repo.get_user_by_id("u1").await.unwrap().unwrap();
        user.credentials.clear();
        user.credentials.push(credential("c2"));
        repo.update_user(&user).await.unwrap();

        assert!(repo.find_by_credential_id("c1").await.unwrap().is_none());
        assert!(repo.find_by_credential_id("c2").await.unwrap().is_some());
        assert_eq!(repo.credential_count(), 1);
    }

    #[tokio::test]
    async fn test_record_usage_never_lowers_counter() {
        let repo = MemoryRepository::new();
        repo.create_user(User::new("u1", "alice", "Alice")).await.unwrap();
        repo.add_credential("u1", credential("c1")).await.unwrap();

        let used_at = Utc::now();
        let (_, updated) = repo
            .record_credential_usage("u1", "c1", 7, used_at)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.counter, 7);
        assert_eq!(updated.last_used_at, Some(used_at));

        let (user, updated) = repo
            .record_credential_usage("u1", "c1", 6, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.counter, 7);
        assert_eq!(user.credential("c1").unwrap().counter, 7);

        assert!(repo
            .record_credential_usage("u1", "c2", 1, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .record_credential_usage("ghost", "c1", 1, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rename_credential_keeps_counter() {
        let repo = MemoryRepository::new();
        repo.create_user(User::new("u1", "alice", "Alice")).await.unwrap();
        repo.add_credential("u1", credential("c1")).await.unwrap();
        repo.record_credential_usage("u1", "c1", 4, Utc::now())
            .await
            .unwrap();

        assert!(repo.rename_credential("u1", "c1", "Laptop".into()).await.unwrap());
        assert!(!repo.rename_credential("u1", "c2", "Phone".into()).await.unwrap());
        assert!(!repo.rename_credential("ghost", "c1", "Phone".into()).await.unwrap());

        let (_, stored) = repo.find_by_credential_id("c1").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Laptop"));
        assert_eq!(stored.counter, 4);
    }

    #[tokio::test]
    async fn test_removal_capability() {
        let repo = MemoryRepository::new();
        repo.create_user(User::new("u1", "alice", "Alice")).await.unwrap();
        repo.add_credential("u1", credential("c1")).await.unwrap();

        let removal = repo.removal().expect("removal supported");
        assert!(removal.remove_credential("u1", "c1").await.unwrap());
        assert!(!removal.remove_credential("u1", "c1").await.unwrap());
        assert!(!removal.remove_credential("ghost", "c1").await.unwrap());
        assert!(repo.find_by_credential_id("c1").await.unwrap().is_none());

        assert!(MemoryRepository::append_only().removal().is_none());
    }
}
