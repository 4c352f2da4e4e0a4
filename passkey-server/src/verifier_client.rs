//! HTTP client for a remote WebAuthn verification service.
//!
//! The service receives the client response together with the expected
//! challenge, origin and relying party id, and answers with its decision:
//!
//! - `POST <base>/verify/registration` `{response, expected}`
//! - `POST <base>/verify/authentication` `{response, expected, credential}`
//!
//! Both reply `{verified, result?, reason?}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use passkey_core::{
    AuthenticationResponse, Credential, ExpectedCeremony, RegistrationResponse, Verification,
    VerifiedAuthentication, VerifiedRegistration, VerifierError, WebAuthnVerifier,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Default timeout for verification requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RegistrationRequest<'a> {
    response: &'a RegistrationResponse,
    expected: &'a ExpectedCeremony,
}

#[derive(Debug, Serialize)]
struct AuthenticationRequest<'a> {
    response: &'a AuthenticationResponse,
    expected: &'a ExpectedCeremony,
    credential: &'a Credential,
}

/// Decision returned by the verification service.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct VerifierReply<T> {
    verified: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    reason: Option<String>,
}

impl<T> VerifierReply<T> {
    fn into_verification(self) -> Result<Verification<T>, VerifierError> {
        match (self.verified, self.result) {
            (true, Some(result)) => Ok(Verification::Verified(result)),
            (true, None) => Err(VerifierError::InvalidResponse(
                "verified reply without a result".to_string(),
            )),
            (false, _) => Ok(Verification::Rejected(
                self.reason
                    .unwrap_or_else(|| "verification failed".to_string()),
            )),
        }
    }
}

/// [`WebAuthnVerifier`] backed by a remote verification service.
pub struct HttpVerifier {
    client: Client,
    registration_url: Url,
    authentication_url: Url,
}

impl HttpVerifier {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, VerifierError> {
        let mut base = Url::parse(base_url).map_err(|e| {
            VerifierError::Transport(format!("Invalid verifier URL {base_url}: {e}"))
        })?;
        // Keep any path prefix when joining
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let join = |path: &str| {
            base.join(path)
                .map_err(|e| VerifierError::Transport(format!("Invalid verifier URL: {e}")))
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerifierError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            registration_url: join("verify/registration")?,
            authentication_url: join("verify/authentication")?,
            client,
        })
    }

    async fn post<B, T>(&self, url: &Url, body: &B) -> Result<Verification<T>, VerifierError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let start = Instant::now();

        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let latency_ms = start.elapsed().as_millis() as u64;
                warn!(error = %e, latency_ms, url = %url, "Verifier request failed");
                if is_transient_error(&e) {
                    VerifierError::Unavailable(e.to_string())
                } else {
                    VerifierError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        debug!(status = %status, url = %url, "Received verifier response");

        if !status.is_success() {
            let message = format!("verifier returned status: {status}");
            return Err(if is_transient_status(status) {
                VerifierError::Unavailable(message)
            } else {
                VerifierError::Transport(message)
            });
        }

        let reply: VerifierReply<T> = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse verifier response");
            VerifierError::InvalidResponse(e.to_string())
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            verified = reply.verified,
            "Verifier call completed"
        );

        reply.into_verification()
    }
}

impl std::fmt::Debug for HttpVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVerifier")
            .field("registration_url", &self.registration_url.as_str())
            .field("authentication_url", &self.authentication_url.as_str())
            .finish()
    }
}

#[async_trait]
impl WebAuthnVerifier for HttpVerifier {
    async fn verify_registration(
        &self,
        response: &RegistrationResponse,
        expected: &ExpectedCeremony,
    ) -> Result<Verification<VerifiedRegistration>, VerifierError> {
        self.post(
            &self.registration_url,
            &RegistrationRequest { response, expected },
        )
        .await
    }

    async fn verify_authentication(
        &self,
        response: &AuthenticationResponse,
        expected: &ExpectedCeremony,
        credential: &Credential,
    ) -> Result<Verification<VerifiedAuthentication>, VerifierError> {
        self.post(
            &self.authentication_url,
            &AuthenticationRequest {
                response,
                expected,
                credential,
            },
        )
        .await
    }
}

/// Check if a reqwest error is transient.
fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Check if an HTTP status code indicates a transient error.
fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
