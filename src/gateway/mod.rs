pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{Router, middleware::from_fn_with_state, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::api_auth::auth_middleware;
use state::AppState;

/// Build the router. Every route, including the fallback, runs behind the
/// authentication gate.
pub fn router(state: Arc<AppState>) -> Router {
    let gate = state.gate.clone();

    Router::new()
        .route("/challenges", get(handlers::get_challenges))
        .route("/authentication", get(handlers::get_authentication))
        .route("/users/{username}", get(handlers::retrieve_user))
        .layer(from_fn_with_state(gate, auth_middleware))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Gateway listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
