//! Passkey authentication handlers
//!
//! Handles POST /authenticate/begin and POST /authenticate/finish, for both
//! user-scoped and discoverable ceremonies.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use passkey_core::{AuthenticationResponse, AuthenticationScope, AuthenticationStart};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::views::{CredentialView, UserSummary};
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{json_body, require};

/// Request to start authentication
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BeginAuthenticationRequest {
    /// Omit for the discoverable flow
    #[serde(default)]
    #[schema(example = "u1")]
    pub user_id: Option<String>,
}

/// Request to complete authentication
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishAuthenticationRequest {
    /// JSON-encoded result of `navigator.credentials.get`
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub response: Option<AuthenticationResponse>,
    /// Required for a user-scoped ceremony
    #[serde(default)]
    #[schema(example = "u1")]
    pub user_id: Option<String>,
    /// Required for a discoverable ceremony; returned by /authenticate/begin
    #[serde(default)]
    pub ceremony_id: Option<String>,
}

impl FinishAuthenticationRequest {
    fn scope(&self) -> Result<AuthenticationScope<'_>, ApiError> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }

        if let Some(user_id) = present(&self.user_id) {
            Ok(AuthenticationScope::User(user_id))
        } else if let Some(ceremony_id) = present(&self.ceremony_id) {
            Ok(AuthenticationScope::Discoverable { ceremony_id })
        } else {
            Err(ApiError::bad_request(
                "Missing required field: userId or ceremonyId",
            ))
        }
    }
}

/// Successful authentication
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthenticationResult {
    #[schema(example = true)]
    pub verified: bool,
    pub user: UserSummary,
    pub credential: CredentialView,
}

/// Start authentication
///
/// With a known `userId` the options carry an allow-list of that user's
/// credentials. Without one, the options omit the allow-list and the
/// response carries a `ceremonyId` to echo back on finish.
#[utoipa::path(
    post,
    path = "/authenticate/begin",
    tag = "Authentication",
    request_body = BeginAuthenticationRequest,
    responses(
        (status = 200, description = "Request options (PublicKeyCredentialRequestOptions JSON) and optional ceremonyId"),
        (status = 400, description = "Malformed body")
    )
)]
pub async fn begin_authentication(
    State(state): State<AppState>,
    payload: Result<Json<BeginAuthenticationRequest>, JsonRejection>,
) -> Result<Json<AuthenticationStart>, ApiError> {
    let request = json_body(payload)?;
    let user_id = request.user_id.as_deref().filter(|s| !s.trim().is_empty());

    let start = state.orchestrator.begin_authentication(user_id).await?;

    Ok(Json(start))
}

/// Complete authentication
///
/// Verifies the assertion, reconciles the signature counter and returns the
/// authenticated user. Any unverified outcome answers 401 with
/// `{verified: false, error}`.
#[utoipa::path(
    post,
    path = "/authenticate/finish",
    tag = "Authentication",
    request_body = FinishAuthenticationRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthenticationResult),
        (status = 400, description = "Missing response, userId or ceremonyId"),
        (status = 401, description = "Authentication failed"),
        (status = 503, description = "Verification service unavailable")
    )
)]
pub async fn finish_authentication(
    State(state): State<AppState>,
    payload: Result<Json<FinishAuthenticationRequest>, JsonRejection>,
) -> Result<Json<AuthenticationResult>, ApiError> {
    let request = json_body(payload)?;
    let scope = request.scope()?;
    let response = require(request.response.as_ref(), "response")?;

    let authenticated = state
        .orchestrator
        .finish_authentication(response, scope)
        .await?
        .into_result()
        .map_err(ApiError::Authentication)?;

    Ok(Json(AuthenticationResult {
        verified: true,
        user: UserSummary::from(&authenticated.user),
        credential: authenticated.credential.into(),
    }))
}
