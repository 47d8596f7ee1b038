use crate::controller::{emit_controller, health_check_controller};
use crate::sse::handler::sse_handler;
use axum::{
    http::{Method, StatusCode, Uri},
    routing::{get, post},
    Router,
};
use log::*;
use service::AppState;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(sse_routes(app_state.clone()))
        .merge(emit_routes(app_state))
        .merge(health_routes())
        .fallback(unmapped)
}

/// Routes always start with a `/`, whatever was configured.
pub(crate) fn normalize_route(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

fn sse_routes(app_state: AppState) -> Router {
    let path = normalize_route(&app_state.options.sse_url);
    Router::new()
        .route(&path, get(sse_handler))
        .with_state(app_state)
}

fn emit_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/emit", post(emit_controller::emit))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

async fn unmapped(method: Method, uri: Uri) -> StatusCode {
    info!("[Unmapped]: {method} - {uri}");
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use service::ServerOptions;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(ServerOptions::default())
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("sse"), "/sse");
        assert_eq!(normalize_route("/sse"), "/sse");
        assert_eq!(normalize_route("//events"), "/events");
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = define_routes(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "healthy");
    }

    #[tokio::test]
    async fn test_unmapped_route_is_not_found() {
        let response = define_routes(test_state())
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_emit_rejects_empty_raw_body() {
        let response = define_routes(test_state())
            .oneshot(Request::post("/emit").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_string(response).await,
            "failed: data should not be empty"
        );
    }

    #[tokio::test]
    async fn test_emit_rejects_json_without_data() {
        let request = Request::post("/emit")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"event":"Custom","data":""}"#))
            .unwrap();

        let response = define_routes(test_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_string(response).await,
            "failed: data should not be empty"
        );
    }

    #[tokio::test]
    async fn test_emit_rejects_malformed_json() {
        let request = Request::post("/emit")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = define_routes(test_state()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.starts_with("failed: "));
    }

    #[tokio::test]
    async fn test_emit_accepts_raw_text_without_subscribers() {
        let response = define_routes(test_state())
            .oneshot(Request::post("/emit").body(Body::from("hello")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sse_route_streams_event_stream() {
        let state = test_state();
        let response = define_routes(state.clone())
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        state.sse_controller.shutdown();
    }
}
