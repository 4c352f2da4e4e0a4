//! Users and the credentials bound to them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a credential is bound to one authenticator or synced across devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    #[default]
    SingleDevice,
    MultiDevice,
}

/// One bound authenticator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Base64url credential id, unique across all users
    pub id: String,
    /// Opaque verification key material, never modified after registration
    #[serde(with = "base64url")]
    pub public_key: Vec<u8>,
    /// Highest signature counter accepted so far
    pub counter: u32,
    pub device_type: DeviceType,
    pub backed_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Operator-editable credential fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMetadata {
    pub name: Option<String>,
}

/// Identity record owning a set of credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: display_name.into(),
            credentials: Vec::new(),
        }
    }

    pub fn credential(&self, credential_id: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == credential_id)
    }

    pub fn credential_mut(&mut self, credential_id: &str) -> Option<&mut Credential> {
        self.credentials.iter_mut().find(|c| c.id == credential_id)
    }

    pub fn credential_ids(&self) -> impl Iterator<Item = &str> {
        self.credentials.iter().map(|c| c.id.as_str())
    }
}

/// Serde adapter encoding bytes as unpadded base64url
pub(crate) mod base64url {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(serde::de::Error::custom)
    }
}
