//! WebAuthn verifier contract
//!
//! Cryptographic verification (attestation parsing, COSE keys, signature
//! checks) lives outside this crate. The orchestrator hands the verifier the
//! client response plus the parameters it expects, and receives either the
//! parsed ceremony result or a rejection.
//!
//! Option payloads are plain data, so the trait provides default builders
//! that implementations rarely need to override.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::config::RelyingParty;
use crate::model::{Credential, DeviceType, User};
use crate::options::{
    AttestationPreference, AuthenticationOptions, AuthenticationResponse, AuthenticatorAttachment,
    AuthenticatorSelection, CredentialDescriptor, PubKeyCredParam, RegistrationOptions,
    RegistrationResponse, RelyingPartyEntity, ResidentKeyRequirement, UserEntity,
    UserVerification, PUBLIC_KEY_TYPE, SUPPORTED_ALGORITHMS,
};

/// Verifier faults (transport, malformed replies). A declined ceremony is
/// not a fault; it is reported as [`Verification::Rejected`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifierError {
    #[error("Verifier transport error: {0}")]
    Transport(String),

    #[error("Verifier returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Verifier unavailable: {0}")]
    Unavailable(String),
}

/// Verifier decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification<T> {
    Verified(T),
    Rejected(String),
}

/// Parameters every verification is checked against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedCeremony {
    pub challenge: String,
    pub origin: String,
    pub rp_id: String,
    pub require_user_verification: bool,
}

/// Parsed output of a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedRegistration {
    pub credential_id: String,
    #[serde(with = "crate::model::base64url")]
    pub public_key: Vec<u8>,
    pub counter: u32,
    pub device_type: DeviceType,
    pub backed_up: bool,
}

/// Parsed output of a successful authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedAuthentication {
    /// Signature counter reported by the authenticator
    pub new_counter: u32,
    #[serde(default)]
    pub user_verified: bool,
}

/// Inputs for a registration options payload
#[derive(Debug, Clone)]
pub struct RegistrationParams<'a> {
    pub relying_party: &'a RelyingParty,
    pub user: &'a User,
    pub challenge: &'a str,
    pub timeout: Duration,
    pub user_verification: UserVerification,
    pub attestation: AttestationPreference,
}

/// Inputs for an authentication options payload
#[derive(Debug, Clone)]
pub struct AuthenticationParams<'a> {
    pub rp_id: &'a str,
    pub challenge: &'a str,
    pub timeout: Duration,
    pub user_verification: UserVerification,
    /// `None` for the discoverable flow
    pub allow_credentials: Option<&'a [Credential]>,
}

/// External WebAuthn ceremony verifier
#[async_trait]
pub trait WebAuthnVerifier: Send + Sync {
    fn build_registration_options(&self, params: RegistrationParams<'_>) -> RegistrationOptions {
        default_registration_options(params)
    }

    fn build_authentication_options(
        &self,
        params: AuthenticationParams<'_>,
    ) -> AuthenticationOptions {
        default_authentication_options(params)
    }

    async fn verify_registration(
        &self,
        response: &RegistrationResponse,
        expected: &ExpectedCeremony,
    ) -> Result<Verification<VerifiedRegistration>, VerifierError>;

    async fn verify_authentication(
        &self,
        response: &AuthenticationResponse,
        expected: &ExpectedCeremony,
        credential: &Credential,
    ) -> Result<Verification<VerifiedAuthentication>, VerifierError>;
}

fn descriptor(credential: &Credential) -> CredentialDescriptor {
    CredentialDescriptor::public_key(credential.id.clone(), credential.transports.clone())
}

/// Standard `navigator.credentials.create` payload: resident key preferred,
/// platform attachment, existing credentials excluded.
pub fn default_registration_options(params: RegistrationParams<'_>) -> RegistrationOptions {
    RegistrationOptions {
        rp: RelyingPartyEntity {
            name: params.relying_party.name.clone(),
            id: params.relying_party.id.clone(),
        },
        user: UserEntity {
            id: URL_SAFE_NO_PAD.encode(params.user.id.as_bytes()),
            name: params.user.username.clone(),
            display_name: params.user.display_name.clone(),
        },
        challenge: params.challenge.to_string(),
        pub_key_cred_params: SUPPORTED_ALGORITHMS
            .iter()
            .map(|&alg| PubKeyCredParam {
                kind: PUBLIC_KEY_TYPE.to_string(),
                alg,
            })
            .collect(),
        timeout: params.timeout.as_millis() as u64,
        exclude_credentials: params.user.credentials.iter().map(descriptor).collect(),
        authenticator_selection: AuthenticatorSelection {
            resident_key: ResidentKeyRequirement::Preferred,
            require_resident_key: false,
            user_verification: params.user_verification,
            authenticator_attachment: Some(AuthenticatorAttachment::Platform),
        },
        attestation: params.attestation,
    }
}

/// Standard `navigator.credentials.get` payload
pub fn default_authentication_options(params: AuthenticationParams<'_>) -> AuthenticationOptions {
    AuthenticationOptions {
        challenge: params.challenge.to_string(),
        timeout: params.timeout.as_millis() as u64,
        rp_id: params.rp_id.to_string(),
        allow_credentials: params
            .allow_credentials
            .map(|credentials| credentials.iter().map(descriptor).collect()),
        user_verification: params.user_verification,
    }
}
