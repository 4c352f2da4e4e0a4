//! Passkey registration handlers
//!
//! Handles POST /register/begin and POST /register/finish.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use passkey_core::{RegistrationOptions, RegistrationResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::views::CredentialView;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{json_body, require, require_text};

/// Request to start registering a passkey
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BeginRegistrationRequest {
    /// Stable user id; the user is created on first registration
    #[serde(default)]
    #[schema(example = "u1")]
    pub user_id: Option<String>,
    #[serde(default)]
    #[schema(example = "alice")]
    pub username: Option<String>,
    #[serde(default)]
    #[schema(example = "Alice A")]
    pub display_name: Option<String>,
}

/// Request to complete a registration
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishRegistrationRequest {
    #[serde(default)]
    #[schema(example = "u1")]
    pub user_id: Option<String>,
    /// JSON-encoded result of `navigator.credentials.create`
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub response: Option<RegistrationResponse>,
}

/// Successful registration
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationResult {
    #[schema(example = true)]
    pub verified: bool,
    pub credential: CredentialView,
}

/// Start registering a passkey
///
/// Returns the options to pass to `navigator.credentials.create`. The
/// exclusion list names every credential the user already has.
#[utoipa::path(
    post,
    path = "/register/begin",
    tag = "Registration",
    request_body = BeginRegistrationRequest,
    responses(
        (status = 200, description = "Credential creation options (PublicKeyCredentialCreationOptions JSON)"),
        (status = 400, description = "Missing userId, username or displayName"),
        (status = 409, description = "Username belongs to another user")
    )
)]
pub async fn begin_registration(
    State(state): State<AppState>,
    payload: Result<Json<BeginRegistrationRequest>, JsonRejection>,
) -> Result<Json<RegistrationOptions>, ApiError> {
    let request = json_body(payload)?;
    let user_id = require_text(request.user_id, "userId")?;
    let username = require_text(request.username, "username")?;
    let display_name = require_text(request.display_name, "displayName")?;

    let options = state
        .orchestrator
        .begin_registration(&user_id, &username, &display_name)
        .await?;

    Ok(Json(options))
}

/// Complete a registration
///
/// On success the credential is bound to the user and the challenge is
/// spent. A rejected or expired ceremony answers `{verified: false, error}`.
#[utoipa::path(
    post,
    path = "/register/finish",
    tag = "Registration",
    request_body = FinishRegistrationRequest,
    responses(
        (status = 200, description = "Credential registered", body = RegistrationResult),
        (status = 400, description = "Missing fields, expired challenge or rejected attestation"),
        (status = 404, description = "User not found"),
        (status = 503, description = "Verification service unavailable")
    )
)]
pub async fn finish_registration(
    State(state): State<AppState>,
    payload: Result<Json<FinishRegistrationRequest>, JsonRejection>,
) -> Result<Json<RegistrationResult>, ApiError> {
    let request = json_body(payload)?;
    let user_id = require_text(request.user_id, "userId")?;
    let response = require(request.response, "response")?;

    let credential = state
        .orchestrator
        .finish_registration(&user_id, &response)
        .await?
        .into_result()
        .map_err(ApiError::Registration)?;

    Ok(Json(RegistrationResult {
        verified: true,
        credential: credential.into(),
    }))
}
