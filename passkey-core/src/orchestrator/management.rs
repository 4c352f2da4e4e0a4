//! Credential management operations

use super::CeremonyOrchestrator;
use crate::error::{Error, Result};
use crate::model::{Credential, CredentialMetadata, User};

impl CeremonyOrchestrator {
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.repository.get_user_by_id(user_id).await?)
    }

    /// Credentials of `user_id`; empty for an unknown user
    pub async fn list_credentials(&self, user_id: &str) -> Result<Vec<Credential>> {
        Ok(self
            .repository
            .get_user_by_id(user_id)
            .await?
            .map(|user| user.credentials)
            .unwrap_or_default())
    }

    pub async fn get_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<Option<Credential>> {
        Ok(self
            .repository
            .get_user_by_id(user_id)
            .await?
            .and_then(|user| user.credential(credential_id).cloned()))
    }

    /// Delete a credential.
    ///
    /// Fails with [`Error::UnsupportedOperation`] when the repository has no
    /// removal capability. Repository failures are logged and reported as
    /// `false`.
    pub async fn remove_credential(&self, user_id: &str, credential_id: &str) -> Result<bool> {
        let removal = self
            .repository
            .removal()
            .ok_or(Error::UnsupportedOperation("remove_credential"))?;

        match removal.remove_credential(user_id, credential_id).await {
            Ok(removed) => {
                if removed {
                    tracing::info!(
                        user_id = %user_id,
                        credential_id = %credential_id,
                        "Credential removed"
                    );
                }
                Ok(removed)
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    credential_id = %credential_id,
                    error = %e,
                    "Credential removal failed"
                );
                Ok(false)
            }
        }
    }

    /// Update operator-editable fields. Key material and counter are never
    /// touched. Returns `false` when the user or credential is unknown.
    pub async fn update_credential_metadata(
        &self,
        user_id: &str,
        credential_id: &str,
        metadata: CredentialMetadata,
    ) -> Result<bool> {
        match metadata.name {
            Some(name) => Ok(self
                .repository
                .rename_credential(user_id, credential_id, name)
                .await?),
            None => Ok(self.get_credential(user_id, credential_id).await?.is_some()),
        }
    }
}
