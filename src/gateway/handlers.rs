//! HTTP handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::error;
use utoipa::IntoParams;

use super::state::AppState;
use super::types::{AuthenticationResponse, ChallengesResponse, ErrorBody};
use crate::api_auth::Authentication;
use crate::register::{ProvisionError, RetrievedUser, Username};

/// Issue a batch of fresh challenges
#[utoipa::path(
    get,
    path = "/challenges",
    responses(
        (status = 200, description = "Fresh challenges", body = ChallengesResponse)
    ),
    tag = "Authentication"
)]
pub async fn get_challenges(
    State(state): State<Arc<AppState>>,
    _auth: Authentication,
) -> Json<ChallengesResponse> {
    let codec = state.gate.codec();
    let challenges = (0..state.challenge_batch_size)
        .map(|_| codec.issue().to_string())
        .collect();
    Json(ChallengesResponse { challenges })
}

/// Report how the gate resolved the caller
#[utoipa::path(
    get,
    path = "/authentication",
    responses(
        (status = 200, description = "Authentication outcome", body = AuthenticationResponse),
        (status = 400, description = "Authentication failed", body = ErrorBody)
    ),
    security(("basic_challenge" = [])),
    tag = "Authentication"
)]
pub async fn get_authentication(
    State(state): State<Arc<AppState>>,
    auth: Authentication,
) -> Json<AuthenticationResponse> {
    let address = auth.is_authenticated().then_some(auth.address);
    Json(AuthenticationResponse {
        status: auth.status,
        address,
        livemode: state.livemode,
    })
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RetrieveUserQuery {
    /// Secret sent to the user at registration
    #[serde(default)]
    pub secret: String,
}

/// Retrieve a user, provisioning its mint account on first retrieval
#[utoipa::path(
    get,
    path = "/users/{username}",
    params(
        ("username" = String, Path, description = "Register username"),
        RetrieveUserQuery
    ),
    responses(
        (status = 201, description = "User and one-time credentials", body = RetrievedUser),
        (status = 400, description = "Unknown username/secret pair", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
    tag = "Users"
)]
pub async fn retrieve_user(
    State(state): State<Arc<AppState>>,
    _auth: Authentication,
    Path(username): Path<String>,
    Query(query): Query<RetrieveUserQuery>,
) -> Response {
    match retrieve(&state, &username, &query.secret).await {
        Ok(retrieved) => (StatusCode::CREATED, Json(retrieved)).into_response(),
        Err(err) => {
            if err.is_unrecoverable() {
                let response = err.clone().into_response();
                state.report_fatal(err);
                return response;
            }
            if err.http_status().is_server_error() {
                error!(username = %username, error = %err, "User retrieval failed");
            }
            err.into_response()
        }
    }
}

async fn retrieve(
    state: &AppState,
    username: &str,
    secret: &str,
) -> Result<RetrievedUser, ProvisionError> {
    let username = Username::new(username)?;
    state.provisioner.retrieve(&username, secret).await
}
