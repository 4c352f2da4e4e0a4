//! HTTP request handlers
//!
//! Each handler is a thin pass-through to the ceremony orchestrator that
//! translates outcomes to status codes.

pub mod authentication;
pub mod credentials;
pub mod health;
pub mod registration;
pub mod users;
pub mod views;

pub use crate::state::AppState;
pub use authentication::{
    begin_authentication, finish_authentication, AuthenticationResult,
    BeginAuthenticationRequest, FinishAuthenticationRequest,
};
pub use credentials::{
    get_credential, list_credentials, remove_credential, update_credential,
    RemoveCredentialResponse, UpdateCredentialRequest,
};
pub use health::{health, HealthResponse};
pub use registration::{
    begin_registration, finish_registration, BeginRegistrationRequest,
    FinishRegistrationRequest, RegistrationResult,
};
pub use users::get_user;
pub use views::{CredentialView, UserSummary, UserView};
