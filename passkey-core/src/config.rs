//! Relying Party and ceremony configuration
//!
//! Loaded from environment variables with development defaults.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::options::{AttestationPreference, UserVerification};

/// Default ceremony timeout relayed to the authenticator (60 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default lifetime of an issued challenge (5 minutes)
pub const DEFAULT_CHALLENGE_TTL_MS: u64 = 300_000;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid origin URL: {0}")]
    InvalidOrigin(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Relying Party identity every ceremony is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    /// Human-readable name shown by the authenticator
    pub name: String,
    /// RP ID, the registrable domain
    pub id: String,
    /// Full origin the browser reports in client data
    pub origin: Url,
}

/// How an authentication reporting a non-advancing counter is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CounterPolicy {
    /// Accept the assertion and keep the highest counter seen.
    #[default]
    Persist,
    /// Reject the assertion as a possible cloned authenticator.
    Reject,
}

impl FromStr for CounterPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "persist" => Ok(Self::Persist),
            "reject" => Ok(Self::Reject),
            _ => Err(ConfigError::InvalidValue {
                key: "WEBAUTHN_COUNTER_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

/// WebAuthn ceremony configuration
#[derive(Debug, Clone)]
pub struct WebAuthnConfig {
    pub relying_party: RelyingParty,
    /// Timeout placed in the options payload
    pub timeout: Duration,
    pub user_verification: UserVerification,
    pub attestation: AttestationPreference,
    /// How long an issued challenge stays redeemable
    pub challenge_ttl: Duration,
    pub counter_policy: CounterPolicy,
}

impl WebAuthnConfig {
    /// Create a configuration with default ceremony settings
    ///
    /// # Arguments
    ///
    /// * `rp_id` - Relying Party ID (typically the domain name)
    /// * `rp_origin` - Relying Party origin URL
    /// * `rp_name` - Human-readable name for the Relying Party
    pub fn new(rp_id: &str, rp_origin: &Url, rp_name: &str) -> Self {
        Self {
            relying_party: RelyingParty {
                name: rp_name.to_string(),
                id: rp_id.to_string(),
                origin: rp_origin.clone(),
            },
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_verification: UserVerification::default(),
            attestation: AttestationPreference::default(),
            challenge_ttl: Duration::from_millis(DEFAULT_CHALLENGE_TTL_MS),
            counter_policy: CounterPolicy::default(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `WEBAUTHN_RP_ID` - Relying Party ID (default: "localhost")
    /// - `WEBAUTHN_RP_ORIGIN` - RP origin URL (default: "http://localhost:3000")
    /// - `WEBAUTHN_RP_NAME` - RP display name (default: "Passkey Demo")
    /// - `WEBAUTHN_TIMEOUT_MS` - ceremony timeout (default: 60000)
    /// - `WEBAUTHN_USER_VERIFICATION` - required | preferred | discouraged (default: preferred)
    /// - `WEBAUTHN_CHALLENGE_TTL_MS` - challenge lifetime (default: 300000)
    /// - `WEBAUTHN_COUNTER_POLICY` - persist | reject (default: persist)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rp_id = lookup("WEBAUTHN_RP_ID").unwrap_or_else(|| "localhost".to_string());
        let rp_origin = lookup("WEBAUTHN_RP_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        let rp_name = lookup("WEBAUTHN_RP_NAME").unwrap_or_else(|| "Passkey Demo".to_string());

        let origin =
            Url::parse(&rp_origin).map_err(|e| ConfigError::InvalidOrigin(format!("{}", e)))?;

        let mut config = Self::new(&rp_id, &origin, &rp_name);

        if let Some(ms) = lookup("WEBAUTHN_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse_millis("WEBAUTHN_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("WEBAUTHN_CHALLENGE_TTL_MS") {
            config.challenge_ttl =
                Duration::from_millis(parse_millis("WEBAUTHN_CHALLENGE_TTL_MS", &ms)?);
        }
        if let Some(uv) = lookup("WEBAUTHN_USER_VERIFICATION") {
            config.user_verification = uv.parse()?;
        }
        if let Some(policy) = lookup("WEBAUTHN_COUNTER_POLICY") {
            config.counter_policy = policy.parse()?;
        }

        Ok(config)
    }

    /// Whether verifiers must insist on the UV flag
    pub fn require_user_verification(&self) -> bool {
        self.user_verification == UserVerification::Required
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
