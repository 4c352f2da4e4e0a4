//! Response views of stored users and credentials
//!
//! Key material never leaves the server through these views.

use chrono::{DateTime, Utc};
use passkey_core::{Credential, DeviceType, User};
use serde::Serialize;
use utoipa::ToSchema;

/// A registered credential as exposed by the API
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    /// Base64url credential id
    #[schema(example = "3q2-7w")]
    pub id: String,
    /// Highest signature counter accepted so far
    #[schema(example = 4)]
    pub counter: u32,
    /// "singleDevice" or "multiDevice"
    #[schema(value_type = String, example = "multiDevice")]
    pub device_type: DeviceType,
    pub backed_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = json!(["internal", "hybrid"]))]
    pub transports: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Work laptop")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<Credential> for CredentialView {
    fn from(credential: Credential) -> Self {
        Self {
            id: credential.id,
            counter: credential.counter,
            device_type: credential.device_type,
            backed_up: credential.backed_up,
            transports: credential.transports,
            name: credential.name,
            created_at: credential.created_at,
            last_used_at: credential.last_used_at,
        }
    }
}

/// Identity fields of a user
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[schema(example = "u1")]
    pub id: String,
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "Alice A")]
    pub display_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

/// A user with their credentials
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub user: UserSummary,
    pub credentials: Vec<CredentialView>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            user: UserSummary::from(&user),
            credentials: user.credentials.into_iter().map(Into::into).collect(),
        }
    }
}
