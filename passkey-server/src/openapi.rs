//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served under `/swagger-ui`.

use utoipa::OpenApi;

use crate::handlers::{
    AuthenticationResult, BeginAuthenticationRequest, BeginRegistrationRequest, CredentialView,
    FinishAuthenticationRequest, FinishRegistrationRequest, HealthResponse, RegistrationResult,
    RemoveCredentialResponse, UpdateCredentialRequest, UserSummary, UserView,
};

/// Passkey API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Passkey API",
        version = "0.1.0",
        description = r#"
## Passwordless authentication with WebAuthn passkeys

The server runs both WebAuthn ceremonies and manages the credentials bound
to each user. Cryptographic checks are delegated to a verification service.

### Registration

1. `POST /register/begin` returns options for `navigator.credentials.create`
2. `POST /register/finish` with the authenticator's response binds the credential

### Authentication

1. `POST /authenticate/begin` with a `userId`, or without one for the
   discoverable flow (the response then carries a `ceremonyId`)
2. `POST /authenticate/finish` with the assertion and the `userId` or `ceremonyId`

Every challenge is single-use and expires. A failed finish can be retried
with the same challenge until it expires.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Registration", description = "Bind a new passkey to a user"),
        (name = "Authentication", description = "Prove possession of a registered passkey"),
        (name = "Users", description = "User lookup"),
        (name = "Credentials", description = "List, rename and remove registered passkeys"),
        (name = "Health", description = "Service health")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::registration::begin_registration,
        crate::handlers::registration::finish_registration,
        crate::handlers::authentication::begin_authentication,
        crate::handlers::authentication::finish_authentication,
        crate::handlers::users::get_user,
        crate::handlers::credentials::list_credentials,
        crate::handlers::credentials::get_credential,
        crate::handlers::credentials::remove_credential,
        crate::handlers::credentials::update_credential,
    ),
    components(
        schemas(
            HealthResponse,
            BeginRegistrationRequest,
            FinishRegistrationRequest,
            RegistrationResult,
            BeginAuthenticationRequest,
            FinishAuthenticationRequest,
            AuthenticationResult,
            UserSummary,
            UserView,
            CredentialView,
            UpdateCredentialRequest,
            RemoveCredentialResponse,
        )
    )
)]
pub struct ApiDoc;
