//! Registration ceremony

use chrono::Utc;

use super::{generate_challenge, CeremonyOrchestrator, CeremonyOutcome};
use crate::error::{CeremonyFailure, Error, Result};
use crate::ledger::CeremonyKey;
use crate::model::{Credential, User};
use crate::options::{RegistrationOptions, RegistrationResponse};
use crate::repository::RepositoryError;
use crate::verifier::{ExpectedCeremony, RegistrationParams, Verification};

impl CeremonyOrchestrator {
    /// Start registering a new authenticator for `user_id`.
    ///
    /// Creates the user on first use. A new `user_id` may not claim a
    /// username that already belongs to someone else. For an existing user
    /// the stored username and display name are kept.
    pub async fn begin_registration(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<RegistrationOptions> {
        let user = match self.repository.get_user_by_id(user_id).await? {
            Some(user) => user,
            None => self.create_user(user_id, username, display_name).await?,
        };

        let challenge = generate_challenge();
        let options = self
            .verifier
            .build_registration_options(RegistrationParams {
                relying_party: &self.config.relying_party,
                user: &user,
                challenge: &challenge,
                timeout: self.config.timeout,
                user_verification: self.config.user_verification,
                attestation: self.config.attestation,
            });

        self.issue(&CeremonyKey::registration(user_id), &challenge);

        tracing::info!(
            user_id = %user_id,
            excluded = options.exclude_credentials.len(),
            "Registration started"
        );

        Ok(options)
    }

    async fn create_user(&self, user_id: &str, username: &str, display_name: &str) -> Result<User> {
        if self.repository.get_user_by_username(username).await?.is_some() {
            tracing::warn!(user_id = %user_id, username = %username, "Username already taken");
            return Err(Error::UsernameTaken(username.to_string()));
        }

        let user = self
            .repository
            .create_user(User::new(user_id, username, display_name))
            .await
            .map_err(|e| match e {
                RepositoryError::UserExists(name) if name == username => {
                    Error::UsernameTaken(name)
                }
                other => Error::Repository(other),
            })?;

        tracing::info!(user_id = %user_id, username = %username, "User created");
        Ok(user)
    }

    /// Complete registration with the authenticator's response
    pub async fn finish_registration(
        &self,
        user_id: &str,
        response: &RegistrationResponse,
    ) -> Result<CeremonyOutcome<Credential>> {
        let key = CeremonyKey::registration(user_id);
        let Some(challenge) = self.ledger.take(&key) else {
            tracing::warn!(user_id = %user_id, "Registration finish without a live challenge");
            return Ok(CeremonyOutcome::Failed(
                CeremonyFailure::ChallengeExpiredOrMissing,
            ));
        };

        let expected = self.expected(&challenge);
        let outcome = self.complete_registration(user_id, response, &expected).await;
        self.settle(&key, challenge, &outcome);
        outcome
    }

    async fn complete_registration(
        &self,
        user_id: &str,
        response: &RegistrationResponse,
        expected: &ExpectedCeremony,
    ) -> Result<CeremonyOutcome<Credential>> {
        let registration = match self.verifier.verify_registration(response, expected).await? {
            Verification::Verified(registration) => registration,
            Verification::Rejected(reason) => {
                tracing::warn!(user_id = %user_id, reason = %reason, "Registration rejected");
                return Ok(CeremonyOutcome::Failed(
                    CeremonyFailure::RegistrationRejected(reason),
                ));
            }
        };

        let now = Utc::now();
        let credential = Credential {
            id: registration.credential_id,
            public_key: registration.public_key,
            counter: registration.counter,
            device_type: registration.device_type,
            backed_up: registration.backed_up,
            transports: response.response.transports.clone(),
            name: None,
            created_at: now,
            last_used_at: Some(now),
        };

        match self
            .repository
            .add_credential(user_id, credential.clone())
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::UserNotFound(id)) => {
                return Ok(CeremonyOutcome::Failed(CeremonyFailure::UserNotFound(id)));
            }
            Err(RepositoryError::DuplicateCredential(id)) => {
                tracing::warn!(user_id = %user_id, credential_id = %id, "Credential already registered");
                return Ok(CeremonyOutcome::Failed(
                    CeremonyFailure::RegistrationRejected(format!(
                        "credential {id} is already registered"
                    )),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            user_id = %user_id,
            credential_id = %credential.id,
            device_type = ?credential.device_type,
            "Registration completed"
        );

        Ok(CeremonyOutcome::Verified(credential))
    }
}
