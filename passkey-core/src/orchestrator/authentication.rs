//! Authentication ceremony and signature-counter reconciliation

use chrono::Utc;
use serde::Serialize;

use super::{generate_challenge, CeremonyOrchestrator, CeremonyOutcome};
use crate::config::CounterPolicy;
use crate::error::{CeremonyFailure, Result};
use crate::ledger::CeremonyKey;
use crate::model::{Credential, User};
use crate::options::{AuthenticationOptions, AuthenticationResponse};
use crate::verifier::{AuthenticationParams, ExpectedCeremony, Verification};

/// Options to relay to the client, plus the ceremony id the client must
/// echo back when finishing a discoverable ceremony
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationStart {
    pub options: AuthenticationOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceremony_id: Option<String>,
}

/// Which ceremony a finishing authentication belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationScope<'a> {
    /// The caller named the user when the ceremony began
    User(&'a str),
    /// Discoverable flow; the authenticator names the user
    Discoverable { ceremony_id: &'a str },
}

impl AuthenticationScope<'_> {
    fn key(&self) -> CeremonyKey {
        match self {
            Self::User(user_id) => CeremonyKey::authentication(user_id),
            Self::Discoverable { ceremony_id } => CeremonyKey::discoverable(ceremony_id),
        }
    }
}

/// A verified authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub user: User,
    pub credential: Credential,
}

/// How a reported signature counter relates to the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CounterCheck {
    Advanced,
    /// Authenticator reports 0: counters unsupported, never a downgrade
    Unsupported,
    /// Non-zero counter that did not move past the stored value
    NotAdvanced,
}

pub(crate) fn check_counter(stored: u32, reported: u32) -> CounterCheck {
    if reported > stored {
        CounterCheck::Advanced
    } else if reported == 0 {
        CounterCheck::Unsupported
    } else {
        CounterCheck::NotAdvanced
    }
}

impl CeremonyOrchestrator {
    /// Start an authentication ceremony.
    ///
    /// With a known user that has credentials, the options carry an
    /// allow-list of that user's credential ids. Otherwise the allow-list is
    /// omitted and any discoverable credential on the device may answer.
    /// Without a user id the challenge is filed under a fresh ceremony id
    /// returned in [`AuthenticationStart::ceremony_id`].
    pub async fn begin_authentication(&self, user_id: Option<&str>) -> Result<AuthenticationStart> {
        let user = match user_id {
            Some(id) => self.repository.get_user_by_id(id).await?,
            None => None,
        };
        let allow_credentials = user
            .as_ref()
            .filter(|user| !user.credentials.is_empty())
            .map(|user| user.credentials.as_slice());

        let challenge = generate_challenge();
        let options = self
            .verifier
            .build_authentication_options(AuthenticationParams {
                rp_id: &self.config.relying_party.id,
                challenge: &challenge,
                timeout: self.config.timeout,
                user_verification: self.config.user_verification,
                allow_credentials,
            });

        let (key, ceremony_id) = match user_id {
            Some(id) => (CeremonyKey::authentication(id), None),
            None => {
                let ceremony_id = uuid::Uuid::new_v4().to_string();
                (CeremonyKey::discoverable(&ceremony_id), Some(ceremony_id))
            }
        };
        self.issue(&key, &challenge);

        tracing::info!(
            user_id = user_id.unwrap_or("-"),
            discoverable = options.allow_credentials.is_none(),
            "Authentication started"
        );

        Ok(AuthenticationStart {
            options,
            ceremony_id,
        })
    }

    /// Complete an authentication ceremony
    pub async fn finish_authentication(
        &self,
        response: &AuthenticationResponse,
        scope: AuthenticationScope<'_>,
    ) -> Result<CeremonyOutcome<AuthenticatedUser>> {
        let (user, credential) = match scope {
            AuthenticationScope::User(user_id) => {
                let Some(user) = self.repository.get_user_by_id(user_id).await? else {
                    return Ok(CeremonyOutcome::Failed(CeremonyFailure::UserNotFound(
                        user_id.to_string(),
                    )));
                };
                let Some(credential) = user.credential(&response.id).cloned() else {
                    return Ok(CeremonyOutcome::Failed(
                        CeremonyFailure::CredentialNotFound(response.id.clone()),
                    ));
                };
                (user, credential)
            }
            AuthenticationScope::Discoverable { .. } => {
                match self.repository.find_by_credential_id(&response.id).await? {
                    Some(found) => found,
                    None => {
                        return Ok(CeremonyOutcome::Failed(
                            CeremonyFailure::CredentialNotFound(response.id.clone()),
                        ))
                    }
                }
            }
        };

        let key = scope.key();
        let Some(challenge) = self.ledger.take(&key) else {
            tracing::warn!(key = %key, "Authentication finish without a live challenge");
            return Ok(CeremonyOutcome::Failed(
                CeremonyFailure::ChallengeExpiredOrMissing,
            ));
        };

        let expected = self.expected(&challenge);
        let outcome = self
            .complete_authentication(response, &expected, user, credential)
            .await;
        self.settle(&key, challenge, &outcome);
        outcome
    }

    async fn complete_authentication(
        &self,
        response: &AuthenticationResponse,
        expected: &ExpectedCeremony,
        user: User,
        credential: Credential,
    ) -> Result<CeremonyOutcome<AuthenticatedUser>> {
        let verified = match self
            .verifier
            .verify_authentication(response, expected, &credential)
            .await?
        {
            Verification::Verified(verified) => verified,
            Verification::Rejected(reason) => {
                tracing::warn!(
                    user_id = %user.id,
                    credential_id = %credential.id,
                    reason = %reason,
                    "Authentication rejected"
                );
                return Ok(CeremonyOutcome::Failed(
                    CeremonyFailure::AuthenticationRejected(reason),
                ));
            }
        };

        if check_counter(credential.counter, verified.new_counter) == CounterCheck::NotAdvanced {
            tracing::warn!(
                user_id = %user.id,
                credential_id = %credential.id,
                stored = credential.counter,
                reported = verified.new_counter,
                "Signature counter did not advance; possible cloned authenticator"
            );
            if self.config.counter_policy == CounterPolicy::Reject {
                return Ok(CeremonyOutcome::Failed(
                    CeremonyFailure::AuthenticationRejected(
                        "signature counter did not advance".to_string(),
                    ),
                ));
            }
        }

        let Some((user, credential)) = self
            .repository
            .record_credential_usage(&user.id, &credential.id, verified.new_counter, Utc::now())
            .await?
        else {
            return Ok(CeremonyOutcome::Failed(
                CeremonyFailure::CredentialNotFound(credential.id),
            ));
        };

        tracing::info!(
            user_id = %user.id,
            credential_id = %credential.id,
            counter = credential.counter,
            "Authentication completed"
        );

        Ok(CeremonyOutcome::Verified(AuthenticatedUser { user, credential }))
    }
}
