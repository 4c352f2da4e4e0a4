//! Credential management handlers
//!
//! List, inspect, rename and remove the credentials bound to a user.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use passkey_core::CredentialMetadata;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::views::CredentialView;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::json_body;

/// Editable credential fields; absent fields are left unchanged
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCredentialRequest {
    #[serde(default)]
    #[schema(example = "Work laptop")]
    pub name: Option<String>,
}

/// Result of a removal
#[derive(Debug, Serialize, ToSchema)]
pub struct RemoveCredentialResponse {
    #[schema(example = true)]
    pub removed: bool,
}

/// List a user's credentials
///
/// An unknown user has no credentials, so this answers with an empty list.
#[utoipa::path(
    get,
    path = "/users/{user_id}/credentials",
    tag = "Credentials",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Credentials of the user", body = [CredentialView])
    )
)]
pub async fn list_credentials(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<CredentialView>>, ApiError> {
    let credentials = state.orchestrator.list_credentials(&user_id).await?;

    Ok(Json(credentials.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/credentials/{credential_id}",
    tag = "Credentials",
    params(
        ("user_id" = String, Path, description = "User id"),
        ("credential_id" = String, Path, description = "Base64url credential id")
    ),
    responses(
        (status = 200, description = "Credential found", body = CredentialView),
        (status = 404, description = "User or credential not found")
    )
)]
pub async fn get_credential(
    State(state): State<AppState>,
    Path((user_id, credential_id)): Path<(String, String)>,
) -> Result<Json<CredentialView>, ApiError> {
    let credential = state
        .orchestrator
        .get_credential(&user_id, &credential_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Credential {credential_id}")))?;

    Ok(Json(credential.into()))
}

/// Remove a credential
///
/// Answers 501 when the credential store is append-only. A store failure
/// during removal is logged by the core and reported as 404.
#[utoipa::path(
    delete,
    path = "/users/{user_id}/credentials/{credential_id}",
    tag = "Credentials",
    params(
        ("user_id" = String, Path, description = "User id"),
        ("credential_id" = String, Path, description = "Base64url credential id")
    ),
    responses(
        (status = 200, description = "Credential removed", body = RemoveCredentialResponse),
        (status = 404, description = "User or credential not found, or the credential store failed to remove it"),
        (status = 501, description = "Credential store does not support removal")
    )
)]
pub async fn remove_credential(
    State(state): State<AppState>,
    Path((user_id, credential_id)): Path<(String, String)>,
) -> Result<Json<RemoveCredentialResponse>, ApiError> {
    let removed = state
        .orchestrator
        .remove_credential(&user_id, &credential_id)
        .await?;

    if !removed {
        return Err(ApiError::not_found(format!("Credential {credential_id}")));
    }

    Ok(Json(RemoveCredentialResponse { removed }))
}

/// Rename a credential
///
/// Key material and the signature counter are never modified.
#[utoipa::path(
    patch,
    path = "/users/{user_id}/credentials/{credential_id}",
    tag = "Credentials",
    params(
        ("user_id" = String, Path, description = "User id"),
        ("credential_id" = String, Path, description = "Base64url credential id")
    ),
    request_body = UpdateCredentialRequest,
    responses(
        (status = 200, description = "Updated credential", body = CredentialView),
        (status = 400, description = "Malformed body"),
        (status = 404, description = "User or credential not found")
    )
)]
pub async fn update_credential(
    State(state): State<AppState>,
    Path((user_id, credential_id)): Path<(String, String)>,
    payload: Result<Json<UpdateCredentialRequest>, JsonRejection>,
) -> Result<Json<CredentialView>, ApiError> {
    let request = json_body(payload)?;
    let not_found = || ApiError::not_found(format!("Credential {credential_id}"));

    let updated = state
        .orchestrator
        .update_credential_metadata(
            &user_id,
            &credential_id,
            CredentialMetadata { name: request.name },
        )
        .await?;
    if !updated {
        return Err(not_found());
    }

    let credential = state
        .orchestrator
        .get_credential(&user_id, &credential_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(credential.into()))
}
