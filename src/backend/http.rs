//! reqwest-based client for the CMS posts API.
//!
//! - `POST {base}/{kind}` creates a resource and returns its identifier
//! - `PUT {base}/{kind}/{id}` overwrites it
//!
//! Non-2xx responses are returned as [`BackendError::Status`] so the engine
//! can classify them; nothing here decides what a status means.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;
use tracing::debug;

use super::{BackendError, BackendResult, PersistenceBackend, ServerId};
use crate::config::{BackendConfig, ConfigError};
use crate::draft::ResourceKind;
use crate::payload::PostPayload;

/// Error bodies longer than this are cut before being logged or surfaced
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP implementation of [`PersistenceBackend`]
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "http client",
                value: e.to_string(),
            })?;

        let invalid = || ConfigError::Invalid {
            key: "AUTOSAVE_API_URL",
            value: config.base_url.clone(),
        };
        let base_url = Url::parse(config.base_url.trim()).map_err(|_| invalid())?;
        if base_url.cannot_be_a_base() {
            return Err(invalid());
        }

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token,
        })
    }

    /// `{base}/{kind}` or `{base}/{kind}/{id}`, with the id escaped as one segment
    fn endpoint(&self, kind: ResourceKind, id: Option<&ServerId>) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                BackendError::Transport(format!("{} cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty().push(kind.path());
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.chars().count() > MAX_ERROR_BODY_CHARS {
            body = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        }
        Err(BackendError::status(status.as_u16(), body))
    }
}

#[async_trait]
impl PersistenceBackend for HttpBackend {
    async fn create(&self, kind: ResourceKind, payload: &PostPayload) -> BackendResult<ServerId> {
        let url = self.endpoint(kind, None)?;
        debug!("POST {}", url);

        let response = self.send(self.client.post(url).json(payload)).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        extract_id(&body).ok_or_else(|| {
            BackendError::MalformedResponse("create response carries no identifier".to_string())
        })
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &ServerId,
        payload: &PostPayload,
    ) -> BackendResult<()> {
        let url = self.endpoint(kind, Some(id))?;
        debug!("PUT {}", url);

        self.send(self.client.put(url).json(payload)).await?;
        Ok(())
    }
}

/// Pull the identifier out of a create response.
///
/// Accepts `id` / `_id` at the top level or under `data`, as string or number.
fn extract_id(body: &Value) -> Option<ServerId> {
    let candidates = [
        body.get("id"),
        body.get("_id"),
        body.get("data").and_then(|d| d.get("id")),
        body.get("data").and_then(|d| d.get("_id")),
    ];

    candidates.into_iter().flatten().find_map(|value| match value {
        Value::String(s) if !s.trim().is_empty() => Some(ServerId::new(s.trim())),
        Value::Number(n) => Some(ServerId::new(n.to_string())),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftStatus;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{post, put},
        Json, Router,
    };
    use serde_json::json;
    use std::time::Duration;

    fn payload() -> PostPayload {
        PostPayload {
            title: "Trip to Kyoto".into(),
            slug: "trip-to-kyoto".into(),
            content: "Great city".into(),
            excerpt: String::new(),
            tags: vec![],
            categories: vec![],
            featured_image: None,
            blocks: vec![],
            seo: None,
            status: DraftStatus::Draft,
        }
    }

    async fn create_post(headers: HeaderMap, Json(body): Json<PostPayload>) -> (StatusCode, Json<Value>) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer secret") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
        }
        if body.slug == "trip-to-kyoto" {
            (StatusCode::CREATED, Json(json!({"data": {"_id": "abc123"}})))
        } else {
            (StatusCode::CREATED, Json(json!({"ok": true})))
        }
    }

    async fn update_post(Path(id): Path<String>) -> (StatusCode, String) {
        match id.as_str() {
            "gone" => (StatusCode::NOT_FOUND, "Post not found".to_string()),
            "huge" => (StatusCode::PAYLOAD_TOO_LARGE, "x".repeat(2048)),
            // Echo ids that only reach this route when escaped as one segment
            odd if odd.contains(['/', '?', '#']) => (StatusCode::CONFLICT, odd.to_string()),
            _ => (StatusCode::OK, "{}".to_string()),
        }
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/api/posts", post(create_post))
            .route("/api/posts/:id", put(update_post));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/", addr)
    }

    fn backend(base_url: &str) -> HttpBackend {
        HttpBackend::new(
            BackendConfig::new(base_url)
                .with_token("secret")
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_id_shapes() {
        assert_eq!(extract_id(&json!({"id": "a1"})), Some(ServerId::new("a1")));
        assert_eq!(extract_id(&json!({"_id": "b2"})), Some(ServerId::new("b2")));
        assert_eq!(
            extract_id(&json!({"data": {"_id": "c3"}})),
            Some(ServerId::new("c3"))
        );
        assert_eq!(extract_id(&json!({"id": 42})), Some(ServerId::new("42")));
        assert_eq!(extract_id(&json!({"id": ""})), None);
        assert_eq!(extract_id(&json!({"ok": true})), None);
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpBackend::new(BackendConfig::new("localhost:4000")).is_err());
    }

    #[tokio::test]
    async fn test_create_returns_id() {
        let base = serve().await;
        let id = backend(&base)
            .create(ResourceKind::Post, &payload())
            .await
            .unwrap();
        assert_eq!(id, ServerId::new("abc123"));
    }

    #[tokio::test]
    async fn test_create_without_id_is_malformed() {
        let base = serve().await;
        let mut body = payload();
        body.slug = "other".into();

        let err = backend(&base)
            .create(ResourceKind::Post, &body)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_status_surfaces() {
        let base = serve().await;
        let anonymous = HttpBackend::new(BackendConfig::new(base.as_str())).unwrap();

        let err = anonymous
            .create(ResourceKind::Post, &payload())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(401));
    }

    #[tokio::test]
    async fn test_update_statuses() {
        let base = serve().await;
        let client = backend(&base);

        client
            .update(ResourceKind::Post, &ServerId::new("abc123"), &payload())
            .await
            .unwrap();

        let err = client
            .update(ResourceKind::Post, &ServerId::new("gone"), &payload())
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::status(404, "Post not found"));

        let err = client
            .update(ResourceKind::Post, &ServerId::new("huge"), &payload())
            .await
            .unwrap_err();
        match err {
            BackendError::Status { status, body } => {
                assert_eq!(status, 413);
                assert_eq!(body.len(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_escapes_identifier() {
        let base = serve().await;
        let err = backend(&base)
            .update(ResourceKind::Post, &ServerId::new("drafts/a?b#c"), &payload())
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::status(409, "drafts/a?b#c"));
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = backend("http://localhost:4000/api");
        assert_eq!(
            client.endpoint(ResourceKind::SimplePost, None).unwrap().as_str(),
            "http://localhost:4000/api/simple-posts"
        );

        let client = backend("http://localhost:4000/api/");
        assert_eq!(
            client
                .endpoint(ResourceKind::Post, Some(&ServerId::new("a b")))
                .unwrap()
                .as_str(),
            "http://localhost:4000/api/posts/a%20b"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let base = serve().await;
        let err = backend(&base)
            .create(ResourceKind::SimplePost, &payload())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = backend(&format!("http://{}", addr))
            .create(ResourceKind::Post, &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
