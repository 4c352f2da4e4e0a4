//! User lookup handler

use axum::{
    extract::{Path, State},
    Json,
};

use super::views::UserView;
use crate::error::ApiError;
use crate::state::AppState;

/// Get a user and their credentials
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserView),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    let user = state
        .orchestrator
        .get_user(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User {user_id}")))?;

    Ok(Json(user.into()))
}
