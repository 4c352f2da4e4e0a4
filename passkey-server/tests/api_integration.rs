//! API integration tests for passkey-server.
//!
//! These tests drive both ceremonies and credential management through the
//! REST endpoints, with a stub verifier in place of the verification service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use passkey_core::{
    AuthenticationResponse, CeremonyOrchestrator, Credential, DeviceType, ExpectedCeremony,
    MemoryRepository, RegistrationResponse, Verification, VerifiedAuthentication,
    VerifiedRegistration, VerifierError, WebAuthnConfig, WebAuthnVerifier,
};
use passkey_server::{create_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

/// Accepts every registration; accepts assertions while `approve` is set,
/// advancing the counter by one
struct StubVerifier {
    approve: AtomicBool,
}

impl Default for StubVerifier {
    fn default() -> Self {
        Self {
            approve: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl WebAuthnVerifier for StubVerifier {
    async fn verify_registration(
        &self,
        response: &RegistrationResponse,
        _expected: &ExpectedCeremony,
    ) -> Result<Verification<VerifiedRegistration>, VerifierError> {
        Ok(Verification::Verified(VerifiedRegistration {
            credential_id: response.id.clone(),
            public_key: vec![7; 32],
            counter: 0,
            device_type: DeviceType::MultiDevice,
            backed_up: true,
        }))
    }

    async fn verify_authentication(
        &self,
        _response: &AuthenticationResponse,
        _expected: &ExpectedCeremony,
        credential: &Credential,
    ) -> Result<Verification<VerifiedAuthentication>, VerifierError> {
        if self.approve.load(Ordering::SeqCst) {
            Ok(Verification::Verified(VerifiedAuthentication {
                new_counter: credential.counter + 1,
                user_verified: true,
            }))
        } else {
            Ok(Verification::Rejected("bad signature".into()))
        }
    }
}

fn create_test_app_with(repository: MemoryRepository) -> (Router, Arc<StubVerifier>) {
    let origin = Url::parse("http://localhost:3000").unwrap();
    let verifier = Arc::new(StubVerifier::default());
    let orchestrator = CeremonyOrchestrator::new(
        WebAuthnConfig::new("localhost", &origin, "Test"),
        Arc::new(repository),
        verifier.clone(),
    );
    (create_router(AppState::new(orchestrator)), verifier)
}

/// Build the test router using the library's create_router function
fn create_test_app() -> (Router, Arc<StubVerifier>) {
    create_test_app_with(MemoryRepository::new())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body)).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

fn attestation(id: &str) -> Value {
    json!({
        "id": id,
        "rawId": id,
        "type": "public-key",
        "response": {
            "clientDataJSON": "eyJ0eXBlIjoid2ViYXV0aG4uY3JlYXRlIn0",
            "attestationObject": "o2NmbXRkbm9uZQ",
            "transports": ["internal"]
        }
    })
}

fn assertion(id: &str) -> Value {
    json!({
        "id": id,
        "rawId": id,
        "type": "public-key",
        "response": {
            "clientDataJSON": "eyJ0eXBlIjoid2ViYXV0aG4uZ2V0In0",
            "authenticatorData": "SZYN5YgO",
            "signature": "MEUCIQ"
        }
    })
}

async fn register(app: &Router, user_id: &str, username: &str, credential_id: &str) {
    let (status, _) = post(
        app,
        "/register/begin",
        json!({"userId": user_id, "username": username, "displayName": username}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        app,
        "/register/finish",
        json!({"userId": user_id, "response": attestation(credential_id)}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

// ============================================================================
// Health & Docs
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let (app, _) = create_test_app();

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "passkey-server");
    assert_eq!(json["pending_challenges"], 0);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _) = create_test_app();

    let (status, json) = get(&app, "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/register/begin"].is_object());
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_begin_returns_creation_options() {
    let (app, _) = create_test_app();

    let (status, json) = post(
        &app,
        "/register/begin",
        json!({"userId": "u1", "username": "alice", "displayName": "Alice A"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rp"]["id"], "localhost");
    assert_eq!(json["user"]["name"], "alice");
    assert_eq!(json["user"]["displayName"], "Alice A");
    assert_eq!(json["challenge"].as_str().unwrap().len(), 43);
    assert!(json["excludeCredentials"].as_array().unwrap().is_empty());

    let (_, health) = get(&app, "/health").await;
    assert_eq!(health["pending_challenges"], 1);
}

#[tokio::test]
async fn test_register_begin_missing_fields() {
    let (app, _) = create_test_app();

    let (status, json) = post(&app, "/register/begin", json!({"userId": "u1"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
    assert!(json["error"].as_str().unwrap().contains("username"));
}

#[tokio::test]
async fn test_register_begin_malformed_json() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register/begin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_finish_without_begin() {
    let (app, _) = create_test_app();

    let (status, json) = post(
        &app,
        "/register/finish",
        json!({"userId": "u1", "response": attestation("c1")}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["verified"], false);
    assert_eq!(json["code"], "CHALLENGE_EXPIRED_OR_MISSING");
}

#[tokio::test]
async fn test_register_finish_missing_response() {
    let (app, _) = create_test_app();

    let (status, json) = post(&app, "/register/finish", json!({"userId": "u1"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("response"));
}

#[tokio::test]
async fn test_username_taken_is_conflict() {
    let (app, _) = create_test_app();
    register(&app, "u1", "alice", "c1").await;

    let (status, json) = post(
        &app,
        "/register/begin",
        json!({"userId": "u2", "username": "alice", "displayName": "Impostor"}),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "USERNAME_TAKEN");
}

#[tokio::test]
async fn test_second_registration_excludes_first_credential() {
    let (app, _) = create_test_app();
    register(&app, "u1", "alice", "cred-A").await;

    let (_, json) = post(
        &app,
        "/register/begin",
        json!({"userId": "u1", "username": "alice", "displayName": "Alice A"}),
    )
    .await;

    let excluded: Vec<_> = json["excludeCredentials"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(excluded, vec!["cred-A"]);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_full_passkey_flow() {
    let (app, _) = create_test_app();

    let (status, _) = post(
        &app,
        "/register/begin",
        json!({"userId": "u1", "username": "alice", "displayName": "Alice A"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, registered) = post(
        &app,
        "/register/finish",
        json!({"userId": "u1", "response": attestation("c1")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["verified"], true);
    assert_eq!(registered["credential"]["id"], "c1");
    assert_eq!(registered["credential"]["counter"], 0);
    assert!(registered["credential"].get("publicKey").is_none());

    let (status, credentials) = get(&app, "/users/u1/credentials").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(credentials.as_array().unwrap().len(), 1);

    let (status, start) = post(&app, "/authenticate/begin", json!({"userId": "u1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(start["options"]["allowCredentials"][0]["id"], "c1");
    assert!(start.get("ceremonyId").is_none());

    let (status, authenticated) = post(
        &app,
        "/authenticate/finish",
        json!({"userId": "u1", "response": assertion("c1")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(authenticated["verified"], true);
    assert_eq!(authenticated["user"]["username"], "alice");
    assert_eq!(authenticated["credential"]["counter"], 1);

    // The challenge is spent
    let (status, replay) = post(
        &app,
        "/authenticate/finish",
        json!({"userId": "u1", "response": assertion("c1")}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay["code"], "CHALLENGE_EXPIRED_OR_MISSING");
}

#[tokio::test]
async fn test_rejected_assertion_is_unauthorized_and_retryable() {
    let (app, verifier) = create_test_app();
    register(&app, "u1", "alice", "c1").await;
    post(&app, "/authenticate/begin", json!({"userId": "u1"})).await;

    verifier.approve.store(false, Ordering::SeqCst);
    let (status, json) = post(
        &app,
        "/authenticate/finish",
        json!({"userId": "u1", "response": assertion("c1")}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["verified"], false);
    assert_eq!(json["code"], "AUTHENTICATION_REJECTED");

    verifier.approve.store(true, Ordering::SeqCst);
    let (status, _) = post(
        &app,
        "/authenticate/finish",
        json!({"userId": "u1", "response": assertion("c1")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_discoverable_flow() {
    let (app, _) = create_test_app();
    register(&app, "u1", "alice", "c1").await;

    let (status, start) = post(&app, "/authenticate/begin", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(start["options"].get("allowCredentials").is_none());
    let ceremony_id = start["ceremonyId"].as_str().unwrap().to_string();

    let (status, json) = post(
        &app,
        "/authenticate/finish",
        json!({"ceremonyId": ceremony_id, "response": assertion("c1")}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["id"], "u1");
}

#[tokio::test]
async fn test_authenticate_finish_requires_scope() {
    let (app, _) = create_test_app();

    let (status, json) = post(
        &app,
        "/authenticate/finish",
        json!({"response": assertion("c1")}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("ceremonyId"));
}

#[tokio::test]
async fn test_authenticate_unknown_credential() {
    let (app, _) = create_test_app();
    register(&app, "u1", "alice", "c1").await;
    post(&app, "/authenticate/begin", json!({"userId": "u1"})).await;

    let (status, json) = post(
        &app,
        "/authenticate/finish",
        json!({"userId": "u1", "response": assertion("other")}),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "CREDENTIAL_NOT_FOUND");
}

// ============================================================================
// Users & Credentials
// ============================================================================

#[tokio::test]
async fn test_get_user() {
    let (app, _) = create_test_app();
    register(&app, "u1", "alice", "c1").await;

    let (status, json) = get(&app, "/users/u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "u1");
    assert_eq!(json["username"], "alice");
    assert_eq!(json["credentials"][0]["id"], "c1");

    let (status, json) = get(&app, "/users/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_credentials_unknown_user_is_empty() {
    let (app, _) = create_test_app();

    let (status, json) = get(&app, "/users/ghost/credentials").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rename_then_remove_credential() {
    let (app, _) = create_test_app();
    register(&app, "u1", "alice", "c1").await;

    let (status, json) = send(
        &app,
        Method::PATCH,
        "/users/u1/credentials/c1",
        Some(json!({"name": "Work laptop"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Work laptop");
    assert_eq!(json["counter"], 0);

    let (status, json) = get(&app, "/users/u1/credentials/c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Work laptop");

    let (status, json) = send(&app, Method::DELETE, "/users/u1/credentials/c1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);

    let (status, _) = get(&app, "/users/u1/credentials/c1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, "/users/u1/credentials/c1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rename_unknown_credential() {
    let (app, _) = create_test_app();

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/users/u1/credentials/nope",
        Some(json!({"name": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_on_append_only_store_is_not_implemented() {
    let (app, _) = create_test_app_with(MemoryRepository::append_only());
    register(&app, "u1", "alice", "c1").await;

    let (status, json) = send(&app, Method::DELETE, "/users/u1/credentials/c1", None).await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json["code"], "UNSUPPORTED_OPERATION");

    let (_, credentials) = get(&app, "/users/u1/credentials").await;
    assert_eq!(credentials.as_array().unwrap().len(), 1);
}
