//! Webhook HTTP server.
//!
//! Requests are validated synchronously; accepted events are handed to a
//! background task so Todoist gets its answer before any remote call runs.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::error::{Error, JsonError, Result};
use crate::sync::Syncer;
use crate::webhook::{verify_signature, Accepted, WebhookEnvelope, SIGNATURE_HEADER};

/// Shared state accessible from handlers.
#[derive(Clone)]
pub struct AppState {
    pub syncer: Arc<Syncer>,
    /// Webhook client secret; signatures are only checked when set.
    pub client_secret: Option<String>,
}

impl AppState {
    pub fn new(syncer: Arc<Syncer>, client_secret: &str) -> Self {
        let client_secret = Some(client_secret.trim())
            .filter(|secret| !secret.is_empty())
            .map(str::to_string);
        Self {
            syncer,
            client_secret,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/todoist", post(todoist_webhook))
        .route("/todoist/", post(todoist_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle returned by [`start`]; dropping it leaves the server running.
pub struct ServerHandle {
    pub port: u16,
    pub task: tokio::task::JoinHandle<()>,
}

/// Bind `addr` and serve in a background task.
pub async fn start(state: AppState, addr: &str) -> Result<ServerHandle> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(port = local_addr.port(), "webhook server started");

    let router = build_router(state);
    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::error!(error = %err, "webhook server stopped");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        task,
    })
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    bound_tasks: usize,
}

/// GET /
async fn index() -> &'static str {
    "exsync"
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        bound_tasks: state.syncer.store().all().len(),
    })
}

/// POST /todoist
async fn todoist_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match accept(&state, &headers, &body) {
        Ok(Accepted::Process(event)) => {
            tracing::info!(kind = %event.kind(), task_id = event.task_id(), "accepted event");
            let syncer = Arc::clone(&state.syncer);
            tokio::spawn(async move {
                if let Err(err) = syncer.run_event(event).await {
                    tracing::error!(error = ?err, "event failed");
                }
            });
            (StatusCode::OK, "ok").into_response()
        }
        Ok(Accepted::Ignored { kind, reason }) => {
            tracing::warn!(%kind, reason = %reason, "ignoring event");
            (StatusCode::OK, "ignored").into_response()
        }
        Err((status, err)) => {
            tracing::warn!(status = status.as_u16(), error = %err, "rejected webhook");
            (status, Json(JsonError::from(&err))).into_response()
        }
    }
}

fn accept(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> std::result::Result<Accepted, (StatusCode, Error)> {
    if let Some(secret) = state.client_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, Error::InvalidSignature))?;
        verify_signature(secret, body, signature).map_err(|err| match err {
            Error::InvalidSignature => (StatusCode::UNAUTHORIZED, err),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other),
        })?;
    }

    let envelope =
        WebhookEnvelope::parse(body).map_err(|err| (StatusCode::BAD_REQUEST, err))?;
    envelope
        .validate()
        .map_err(|err| (StatusCode::NOT_ACCEPTABLE, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::clients::{Comment, TaskClient, TrackingClient};
    use crate::config::SyncConfig;
    use crate::store::TagStore;
    use crate::webhook::sign;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    struct NoopClient;

    #[async_trait]
    impl TrackingClient for NoopClient {
        async fn values(
            &self,
            _attribute: &str,
            _date_min: NaiveDate,
            _date_max: NaiveDate,
        ) -> Result<BTreeMap<NaiveDate, i64>> {
            Ok(BTreeMap::new())
        }
        async fn acquire(&self, _names: &[String]) -> Result<()> {
            Ok(())
        }
        async fn release(&self, _names: &[String]) -> Result<()> {
            Ok(())
        }
        async fn create(&self, _names: &[String]) -> Result<()> {
            Ok(())
        }
        async fn update(&self, _values: &[crate::clients::AttributeValue]) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl TaskClient for NoopClient {
        async fn comments(&self, _task_id: &str) -> Result<Vec<Comment>> {
            Ok(Vec::new())
        }
        async fn add_comment(&self, task_id: &str, content: &str) -> Result<Comment> {
            Ok(Comment {
                id: "1".to_string(),
                task_id: Some(task_id.to_string()),
                content: content.to_string(),
            })
        }
        async fn update_comment(&self, comment_id: &str, content: &str) -> Result<Comment> {
            Ok(Comment {
                id: comment_id.to_string(),
                task_id: None,
                content: content.to_string(),
            })
        }
        async fn delete_comment(&self, _comment_id: &str) -> Result<()> {
            Ok(())
        }
        async fn update_description(&self, _task_id: &str, _description: &str) -> Result<()> {
            Ok(())
        }
    }

    fn app(secret: &str) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TagStore::load(dir.path().join("data.txt")).unwrap());
        let syncer = Syncer::new(
            store,
            Arc::new(NoopClient),
            Arc::new(NoopClient),
            SyncConfig::default(),
        );
        (build_router(AppState::new(Arc::new(syncer), secret)), dir)
    }

    fn payload(event_name: &str, initiator: &str) -> String {
        serde_json::json!({
            "event_name": event_name,
            "user_id": "42",
            "event_data": { "id": "7", "user_id": "42", "content": "Walk" },
            "initiator": { "id": initiator },
            "version": "9"
        })
        .to_string()
    }

    fn webhook(body: String, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/todoist")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (app, _dir) = app("");
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let parsed: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["bound_tasks"], 0);
    }

    #[tokio::test]
    async fn accepts_owner_event() {
        let (app, _dir) = app("");
        let resp = app
            .oneshot(webhook(payload("item:completed", "42"), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }

    #[tokio::test]
    async fn foreign_initiator_is_ignored() {
        let (app, _dir) = app("");
        let resp = app
            .oneshot(webhook(payload("item:completed", "99"), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ignored");
    }

    #[tokio::test]
    async fn rejects_unknown_event_and_bad_json() {
        let (app, _dir) = app("");
        let resp = app
            .clone()
            .oneshot(webhook(payload("project:added", "42"), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);

        let resp = app
            .oneshot(webhook("{oops".to_string(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checks_signature_when_secret_set() {
        let (app, _dir) = app("s3cret");
        let body = payload("item:completed", "42");

        let resp = app.clone().oneshot(webhook(body.clone(), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .clone()
            .oneshot(webhook(body.clone(), Some("bm9wZQ==")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let signature = sign("s3cret", body.as_bytes()).unwrap();
        let resp = app.oneshot(webhook(body, Some(&signature))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
