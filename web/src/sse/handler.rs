use axum::extract::State;
use axum::response::Response;
use log::*;
use service::AppState;

/// SSE handler that establishes a long-lived connection receiving every
/// emitted event plus periodic heartbeats.
pub(crate) async fn sse_handler(State(app_state): State<AppState>) -> Response {
    debug!("Establishing SSE connection");

    app_state.sse_controller.subscribe()
}
