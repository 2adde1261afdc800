//! Router-level tests: the real router over in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use settle::api_auth::{
    AuthGate, CHALLENGE_HEADER, ChallengeCodec, MemoryReplayLedger, SkipList, default_skip_rules,
    encode_address,
};
use settle::db::StoreError;
use settle::gateway::{self, state::AppState};
use settle::mint::{MemoryMintStore, MintStore, MintTx, MintUser};
use settle::register::{MemoryRegisterStore, ProvisionError, RegisterUser, UserProvisioner};

const AUTHORITY: &str = "mint.test";

struct Harness {
    app: Router,
    state: Arc<AppState>,
    register: MemoryRegisterStore,
    fatal_rx: mpsc::UnboundedReceiver<ProvisionError>,
}

fn harness_with_mint(mint: Arc<dyn MintStore>) -> Harness {
    let register = MemoryRegisterStore::new();
    let gate = AuthGate::new(
        ChallengeCodec::new(AUTHORITY, Duration::from_secs(3600), Duration::from_secs(30)),
        Arc::new(MemoryReplayLedger::new()),
        SkipList::compile(&default_skip_rules()).unwrap(),
        false,
        true,
    );
    let provisioner = UserProvisioner::new(Arc::new(register.clone()), mint, AUTHORITY);
    let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
    let state = Arc::new(AppState::new(
        Arc::new(gate),
        Arc::new(provisioner),
        3,
        false,
        fatal_tx,
    ));
    Harness {
        app: gateway::router(state.clone()),
        state,
        register,
        fatal_rx,
    }
}

fn harness() -> Harness {
    harness_with_mint(Arc::new(MemoryMintStore::new()))
}

struct Caller {
    key: SigningKey,
    address: String,
}

impl Caller {
    fn new() -> Self {
        let key = SigningKey::generate(&mut OsRng);
        let address = encode_address(&key.verifying_key());
        Self { key, address }
    }

    fn request(&self, uri: &str, challenge: &str) -> Request<Body> {
        let signature = STANDARD.encode(self.key.sign(challenge.as_bytes()).to_bytes());
        let basic = STANDARD.encode(format!("{}:{}", self.address, signature));
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Basic {}", basic))
            .header(CHALLENGE_HEADER, challenge)
            .body(Body::empty())
            .unwrap()
    }
}

fn anonymous(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn fresh_challenge(h: &Harness) -> String {
    h.state.gate.codec().issue().to_string()
}

#[tokio::test]
async fn test_challenges_are_public() {
    let h = harness();
    let (status, body) = send(&h.app, anonymous("/challenges")).await;

    assert_eq!(status, StatusCode::OK);
    let challenges = body["challenges"].as_array().unwrap();
    assert_eq!(challenges.len(), 3);
    for c in challenges {
        let c = c.as_str().unwrap();
        assert!(c.starts_with("mint.test."));
        assert!(h.state.gate.codec().validate(c).is_ok());
    }
}

#[tokio::test]
async fn test_authentication_requires_credentials() {
    let h = harness();
    let (status, body) = send(&h.app, anonymous("/authentication")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["code"], "challenge_invalid");
}

#[tokio::test]
async fn test_signed_request_then_replay() {
    let h = harness();
    let caller = Caller::new();
    let challenge = fresh_challenge(&h);

    let (status, body) = send(&h.app, caller.request("/authentication", &challenge)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["address"], caller.address.as_str());

    let (status, body) = send(&h.app, caller.request("/authentication", &challenge)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "challenge_already_used");
}

#[tokio::test]
async fn test_replay_rejected_on_public_route() {
    let h = harness();
    let caller = Caller::new();
    let challenge = fresh_challenge(&h);

    let (status, _) = send(&h.app, caller.request("/authentication", &challenge)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&h.app, caller.request("/challenges", &challenge)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "challenge_already_used");
}

#[tokio::test]
async fn test_bad_signature_fails_private_route() {
    let h = harness();
    let signer = Caller::new();
    let impostor = Caller::new();
    let challenge = fresh_challenge(&h);

    // Signed by one key, claimed by another address
    let mut request = signer.request("/authentication", &challenge);
    let signature = STANDARD.encode(signer.key.sign(challenge.as_bytes()).to_bytes());
    let basic = STANDARD.encode(format!("{}:{}", impostor.address, signature));
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Basic {}", basic).parse().unwrap(),
    );

    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "signature_invalid");
}

#[tokio::test]
async fn test_retrieve_user_provisions() {
    let h = harness();
    let user = RegisterUser::new("alice", "alice@example.com");
    h.register.insert(user.clone());

    let uri = format!("/users/alice?secret={}", user.secret);
    let (status, body) = send(&h.app, anonymous(&uri)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["id"], user.token.as_str());
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["status"], "verified");
    assert!(body["user"].get("secret").is_none());
    assert_eq!(body["credentials"]["address"], "alice@mint.test");
    assert_eq!(body["credentials"]["password"], user.password.as_str());

    assert!(h.register.get("alice").unwrap().mint_token.is_some());
}

#[tokio::test]
async fn test_retrieve_user_wrong_secret() {
    let h = harness();
    h.register.insert(RegisterUser::new("bob", "bob@example.com"));

    let (status, body) = send(&h.app, anonymous("/users/bob?secret=nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "user_not_found");

    let (status, body) = send(&h.app, anonymous("/users/nobody?secret=nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "user_not_found");
}

#[tokio::test]
async fn test_invalid_username_rejected() {
    let h = harness();
    let caller = Caller::new();
    let challenge = fresh_challenge(&h);

    // Not skip-listed, so it needs a valid signature to reach the handler
    let (status, body) = send(
        &h.app,
        caller.request("/users/bad-name?secret=x", &challenge),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "username_invalid");
}

/// Mint store whose user creation always fails.
struct BrokenMint;

struct BrokenMintTx;

#[async_trait]
impl MintStore for BrokenMint {
    async fn begin(&self) -> Result<Box<dyn MintTx>, StoreError> {
        Ok(Box::new(BrokenMintTx))
    }
}

#[async_trait]
impl MintTx for BrokenMintTx {
    async fn load_user_by_username(&mut self, _: &str) -> Result<Option<MintUser>, StoreError> {
        Ok(None)
    }

    async fn save_user(&mut self, _: &MintUser) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_user(&mut self, _: &MintUser) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_mint_creation_failure_reaches_fatal_channel() {
    let mut h = harness_with_mint(Arc::new(BrokenMint));
    let user = RegisterUser::new("carol", "carol@example.com");
    h.register.insert(user.clone());

    let uri = format!("/users/carol?secret={}", user.secret);
    let (status, body) = send(&h.app, anonymous(&uri)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal_error");
    assert!(!body["message"].as_str().unwrap().contains("disk full"));

    let fatal = h.fatal_rx.try_recv().unwrap();
    assert!(fatal.is_unrecoverable());

    // Nothing committed on the register side
    let stored = h.register.get("carol").unwrap();
    assert!(!stored.is_verified());
    assert!(stored.mint_token.is_none());
}
