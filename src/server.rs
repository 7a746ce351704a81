//! HTTP status endpoint for the dashboard.
//!
//! `GET /api/status` returns the engine's [`StatusSnapshot`] as of the last
//! completed tick. CORS is open to any origin so a browser dashboard served
//! elsewhere can poll it.

use crate::metrics::StatusSnapshot;
use crate::simulation::SharedEngine;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("serve error: {0}")]
    Serve(#[from] std::io::Error),
}

pub fn router(engine: SharedEngine) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/status", get(status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn status(State(engine): State<SharedEngine>) -> Json<StatusSnapshot> {
    let snapshot = engine.lock().status();
    Json(snapshot)
}

/// Serves `router` on `listener` until `cancel` fires.
pub async fn serve(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<(), ServerError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("Status server stopped");
    Ok(())
}
