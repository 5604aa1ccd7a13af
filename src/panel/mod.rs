//! Client for the remote game-server panel.
//!
//! [Panel] is the seam the template resolver talks through, [PanelServer] is the
//! http implementation. Every call is authenticated with a cached
//! [AccessToken](token::AccessToken); a `403` drops the token and the request is
//! retried exactly once with a fresh one.

#[cfg(test)]
pub(crate) mod mock;
mod server;
mod token;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use tracing::instrument;

use crate::error::PanelError;
pub use server::LogPattern;
pub use server::ServerConfig;
pub use server::ServerEntry;
pub use server::TemplateSource;
pub use token::TokenCache;

/// A JSON object as returned by the panel.
pub type JsonMap = Map<String, Value>;

/// Operations the template resolver needs from a panel.
#[async_trait]
pub trait Panel: Send + Sync {
    /// The server this panel handle talks to.
    fn config(&self) -> &ServerConfig;

    /// `GET /api/servers/{id}`, the inner `server` object.
    async fn server(&self) -> Result<JsonMap, PanelError>;

    /// `GET /daemon/server/{id}/data`, the inner `data` object.
    async fn settings(&self) -> Result<JsonMap, PanelError>;

    /// `POST /daemon/server/{id}/console` with the raw command as body.
    async fn send_command(&self, command: &str) -> Result<(), PanelError>;

    /// `GET /daemon/server/{id}/console?time={epoch}`, the console text since `epoch`.
    async fn logs_since(&self, epoch: i64) -> Result<String, PanelError>;
}

/// `{ "server": { ... } }`
#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct ServerEnvelope {
    server: JsonMap,
}

/// `{ "data": { ... } }`
#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct DataEnvelope {
    data: JsonMap,
}

/// `{ "logs": "..." }`
#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct ConsoleLogs {
    #[serde(default)]
    logs: String,
}

/// `{ "error": { "code": ..., "msg": ..., "metadata": { "scope": ... } } }`
#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    metadata: Option<ErrorMetadata>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct ErrorMetadata {
    #[serde(default)]
    scope: Option<String>,
}

/// A configured server together with its token and an http client.
#[derive(Debug)]
pub struct PanelServer {
    #[allow(clippy::missing_docs_in_private_items)]
    config: ServerConfig,
    #[allow(clippy::missing_docs_in_private_items)]
    token: TokenCache,
    /// Cheap to clone, shared between all servers.
    http: reqwest::Client,
    /// Applied to every request.
    timeout: Duration,
}

impl PanelServer {
    /// A server without a token yet.
    pub fn new(config: ServerConfig, http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            config,
            token: TokenCache::default(),
            http,
            timeout,
        }
    }

    /// The token cache of this server.
    #[cfg(test)]
    pub fn token(&self) -> &TokenCache {
        &self.token
    }

    /// Send an authenticated request built by `build`.
    ///
    /// On `403` the token is dropped, reacquired, and the request is sent once more.
    /// Any non-success response after that is turned into a [PanelError].
    async fn send<F>(&self, build: F) -> Result<Response, PanelError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let response = self.send_once(&build).await?;

        let response = if response.status() == StatusCode::FORBIDDEN {
            tracing::warn!(
                server = %self.config.id,
                "Panel rejected the access token, reacquiring and retrying."
            );
            self.token.invalidate().await;
            self.send_once(&build).await?
        } else {
            response
        };

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Send a request with the current token, without any retry.
    async fn send_once<F>(&self, build: &F) -> Result<Response, PanelError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
    {
        let token = self
            .token
            .get_or_acquire(&self.http, &self.config, self.timeout)
            .await?;
        let response = build(&self.http)
            .header(AUTHORIZATION, token.authorization())
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(response)
    }
}

/// Normalize a non-success response.
/// Uses the panel's error body if there is one, otherwise the raw status and text.
async fn error_from_response(response: Response) -> PanelError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { error }) => PanelError::Http {
            status: status.as_u16(),
            code: error.code,
            msg: error.msg,
            scope: error.metadata.and_then(|m| m.scope),
        },
        Err(_) => PanelError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        },
    }
}

#[async_trait]
impl Panel for PanelServer {
    fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[instrument(skip_all, fields(server = %self.config.id))]
    async fn server(&self) -> Result<JsonMap, PanelError> {
        let url = self.config.endpoint(&format!("/api/servers/{}", self.config.id));
        let envelope: ServerEnvelope = self.send(|http| http.get(&url)).await?.json().await?;
        Ok(envelope.server)
    }

    #[instrument(skip_all, fields(server = %self.config.id))]
    async fn settings(&self) -> Result<JsonMap, PanelError> {
        let url = self
            .config
            .endpoint(&format!("/daemon/server/{}/data", self.config.id));
        let envelope: DataEnvelope = self.send(|http| http.get(&url)).await?.json().await?;
        Ok(envelope.data)
    }

    #[instrument(skip(self), fields(server = %self.config.id))]
    async fn send_command(&self, command: &str) -> Result<(), PanelError> {
        let url = self
            .config
            .endpoint(&format!("/daemon/server/{}/console", self.config.id));
        self.send(|http| http.post(&url).body(command.to_string()))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(server = %self.config.id))]
    async fn logs_since(&self, epoch: i64) -> Result<String, PanelError> {
        let url = self
            .config
            .endpoint(&format!("/daemon/server/{}/console", self.config.id));
        let logs: ConsoleLogs = self
            .send(|http| http.get(&url).query(&[("time", epoch)]))
            .await?
            .json()
            .await?;
        Ok(logs.logs)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use axum::extract::Query;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::routing::post;
    use axum::Json;
    use axum::Router;
    use serde_json::json;

    use super::*;

    /// How the fake panel treats bearer tokens.
    #[derive(Clone, Copy, PartialEq)]
    enum Gate {
        /// Every token is accepted.
        Open,
        /// Only the second issued token is accepted.
        SecondToken,
        /// Every token is rejected.
        Closed,
    }

    #[derive(Clone)]
    struct FakePanel {
        gate: Gate,
        tokens_issued: Arc<AtomicUsize>,
        requests: Arc<AtomicUsize>,
        commands: Arc<std::sync::Mutex<Vec<String>>>,
        /// Held before answering `/api/servers/{id}`.
        delay: Duration,
    }

    impl FakePanel {
        fn new(gate: Gate) -> Self {
            Self {
                gate,
                tokens_issued: Arc::default(),
                requests: Arc::default(),
                commands: Arc::default(),
                delay: Duration::ZERO,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn authorized(&self, headers: &HeaderMap) -> bool {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            match self.gate {
                Gate::Open => auth.starts_with("Bearer token-"),
                Gate::SecondToken => auth == "Bearer token-2",
                Gate::Closed => false,
            }
        }
    }

    fn forbidden() -> axum::response::Response {
        (
            AxumStatus::FORBIDDEN,
            Json(json!({"error": {"code": "ErrPermissionDenied", "msg": "invalid token", "metadata": {"scope": "servers.view"}}})),
        )
            .into_response()
    }

    async fn token(
        State(panel): State<FakePanel>,
        body: String,
    ) -> axum::response::Response {
        if body.contains("client_secret=rejected") {
            return (AxumStatus::UNAUTHORIZED, "Unauthorized").into_response();
        }
        if !body.contains("client_secret=secret") {
            return Json(json!({"error": "invalid_client"})).into_response();
        }
        let n = panel.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({
            "access_token": format!("token-{n}"),
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "servers.view"
        }))
        .into_response()
    }

    async fn server(State(panel): State<FakePanel>, headers: HeaderMap) -> axum::response::Response {
        if !panel.authorized(&headers) {
            return forbidden();
        }
        tokio::time::sleep(panel.delay).await;
        Json(json!({"server": {"id": "abc123", "name": "Box", "node": {"name": "node-1"}}}))
            .into_response()
    }

    async fn data(State(panel): State<FakePanel>, headers: HeaderMap) -> axum::response::Response {
        if !panel.authorized(&headers) {
            return forbidden();
        }
        (AxumStatus::INTERNAL_SERVER_ERROR, "daemon exploded").into_response()
    }

    async fn console_post(
        State(panel): State<FakePanel>,
        headers: HeaderMap,
        body: String,
    ) -> axum::response::Response {
        if !panel.authorized(&headers) {
            return forbidden();
        }
        panel.commands.lock().unwrap().push(body);
        AxumStatus::NO_CONTENT.into_response()
    }

    async fn console_get(
        State(panel): State<FakePanel>,
        headers: HeaderMap,
        Query(query): Query<BTreeMap<String, String>>,
    ) -> axum::response::Response {
        if !panel.authorized(&headers) {
            return forbidden();
        }
        let time = query.get("time").cloned().unwrap_or_default();
        Json(json!({"logs": format!("since {time}\nHP: 10\n")})).into_response()
    }

    /// Serve a fake panel on a random local port, returns the base url.
    async fn serve(panel: FakePanel) -> String {
        let app = Router::new()
            .route("/oauth2/token", post(token))
            .route("/api/servers/{id}", get(server))
            .route("/daemon/server/{id}/data", get(data))
            .route("/daemon/server/{id}/console", post(console_post).get(console_get))
            .with_state(panel);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    pub(crate) fn test_config(root: &str, secret: &str) -> ServerConfig {
        ServerConfig::try_from(ServerEntry {
            server_url: format!("{root}/server/abc123"),
            client_id: "client".to_string(),
            client_secret: secret.to_string(),
            command: Some("status".to_string()),
            regex: BTreeMap::new(),
            embed_template: TemplateSource::Inline(JsonMap::new()),
        })
        .unwrap()
    }

    async fn panel_server(gate: Gate, secret: &str) -> (FakePanel, PanelServer) {
        let fake = FakePanel::new(gate);
        let server = serve_with(fake.clone(), secret, Duration::from_secs(5)).await;
        (fake, server)
    }

    async fn serve_with(fake: FakePanel, secret: &str, timeout: Duration) -> PanelServer {
        let root = serve(fake).await;
        let mut config = test_config(&root, secret);
        config.template =
            TemplateSource::Inline(json!({"title": "${server.name}"}).as_object().cloned().unwrap());
        PanelServer::new(config, reqwest::Client::new(), timeout)
    }

    #[tokio::test]
    async fn token_is_acquired_once_and_reused() {
        let (fake, server) = panel_server(Gate::Open, "secret").await;

        let first = server.server().await.unwrap();
        let second = server.server().await.unwrap();

        assert_eq!(first["name"], "Box");
        assert_eq!(first, second);
        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 1);
        assert_eq!(fake.requests.load(Ordering::SeqCst), 2);
        assert_eq!(
            server.token().current().await.map(|t| t.access_token),
            Some("token-1".to_string())
        );
    }

    #[tokio::test]
    async fn forbidden_reacquires_and_retries_once() {
        let (fake, server) = panel_server(Gate::SecondToken, "secret").await;

        let metadata = server.server().await.unwrap();

        assert_eq!(metadata["node"]["name"], "node-1");
        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 2);
        assert_eq!(fake.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_forbidden_is_surfaced() {
        let (fake, server) = panel_server(Gate::Closed, "secret").await;

        let error = server.server().await.unwrap_err();

        match error {
            PanelError::Http {
                status, code, scope, ..
            } => {
                assert_eq!(status, 403);
                assert_eq!(code, "ErrPermissionDenied");
                assert_eq!(scope.as_deref(), Some("servers.view"));
            }
            other => panic!("expected an http error, got {other:?}"),
        }
        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 2);
        assert_eq!(fake.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_error_is_auth_failure() {
        let (fake, server) = panel_server(Gate::Open, "wrong").await;

        let error = server.server().await.unwrap_err();

        assert!(matches!(error, PanelError::Auth { ref reason } if reason == "invalid_client"));
        assert_eq!(fake.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unstructured_error_is_synthesized() {
        let (_fake, server) = panel_server(Gate::Open, "secret").await;

        let error = server.settings().await.unwrap_err();

        match error {
            PanelError::Status {
                status,
                reason,
                body,
            } => {
                assert_eq!(status, 500);
                assert_eq!(reason, "Internal Server Error");
                assert_eq!(body, "daemon exploded");
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn command_then_logs() {
        let (fake, server) = panel_server(Gate::Open, "secret").await;

        server.send_command("list players").await.unwrap();
        let logs = server.logs_since(1_700_000_000).await.unwrap();

        assert_eq!(*fake.commands.lock().unwrap(), vec!["list players".to_string()]);
        assert_eq!(logs, "since 1700000000\nHP: 10\n");
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_failure() {
        let (fake, server) = panel_server(Gate::Open, "rejected").await;

        let error = server.server().await.unwrap_err();

        match error {
            PanelError::Auth { reason } => {
                assert!(reason.contains("401"), "{reason}");
                assert!(reason.contains("Unauthorized"), "{reason}");
            }
            other => panic!("expected an auth error, got {other:?}"),
        }
        assert_eq!(fake.requests.load(Ordering::SeqCst), 0);
        assert!(server.token().current().await.is_none());
    }

    #[tokio::test]
    async fn slow_panel_times_out() {
        let fake = FakePanel::new(Gate::Open).slow(Duration::from_secs(3));
        let server = serve_with(fake, "secret", Duration::from_millis(300)).await;

        let started = std::time::Instant::now();
        let error = server.server().await.unwrap_err();

        assert!(
            matches!(error, PanelError::Request(ref e) if e.is_timeout()),
            "{error:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn timed_out_server_does_not_stop_the_others() {
        let timeout = Duration::from_millis(300);
        let servers = vec![
            serve_with(FakePanel::new(Gate::Open), "secret", timeout).await,
            serve_with(
                FakePanel::new(Gate::Open).slow(Duration::from_secs(3)),
                "secret",
                timeout,
            )
            .await,
            serve_with(FakePanel::new(Gate::Open), "secret", timeout).await,
        ];

        let started = std::time::Instant::now();
        let documents = crate::status::render_all(&servers).await;

        assert_eq!(documents, vec![json!({"title": "Box"}), json!({"title": "Box"})]);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
