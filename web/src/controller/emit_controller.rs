use crate::error::{Error, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use events::Event;
use log::*;
use service::AppState;

/// POST an event to every connected client.
///
/// A body sent as `application/json` is decoded as `{id?, event?, data, retry?}`;
/// any other body becomes the `data` of an unnamed event.
pub async fn emit(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let event = if is_json(&headers) {
        serde_json::from_slice::<Event>(&body)?
    } else {
        Event::new(String::from_utf8_lossy(&body))
    };

    if !event.has_data() {
        debug!("Rejecting emit without data");
        return Err(Error::empty_data());
    }

    app_state.sse_controller.emit(event).await;

    Ok(StatusCode::OK)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .is_some_and(|content_type| content_type == "application/json")
}
