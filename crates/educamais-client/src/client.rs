//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use educamais_store::{SessionStore, create_memory_store};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use url::Url;

use crate::api::{AuthApi, PostsApi};
use crate::error::{Error, ErrorResponse, Result};
use crate::middleware::{BearerAuth, SessionPurge, SharedMiddleware};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path prefix under the server origin.
const API_PREFIX: &str = "api/";

/// EducaMais API client.
///
/// One client is shared by every service. Each request runs through the
/// middleware stages (bearer token, 401 purge) before and after it is sent.
///
/// # Example
///
/// ```no_run
/// use educamais_client::ApiClient;
///
/// # async fn example() -> educamais_client::Result<()> {
/// let client = ApiClient::builder()
///     .base_url("http://localhost:3333")
///     .build()?;
///
/// let page = client.posts().list(1, 10, None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    sessions: SessionStore,
    middleware: Vec<SharedMiddleware>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .field("middleware", &self.inner.middleware)
            .finish()
    }
}

impl ApiClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the server origin.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The session store consulted on every request.
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access the posts API.
    pub fn posts(&self) -> PostsApi {
        PostsApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner
            .base_url
            .join(&format!("{}{}", API_PREFIX, path))
            .map_err(Error::from)
    }

    /// Make a GET request.
    pub(crate) async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, |r| r).await?;
        decode(response).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let response = self.send(Method::GET, path, |r| r.query(query)).await?;
        decode(response).await
    }

    /// Make a POST request.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let response = self.send(Method::POST, path, |r| r.json(body)).await?;
        decode(response).await
    }

    /// Make a POST request without a body, ignoring the response body.
    pub(crate) async fn post_empty(&self, path: &str) -> Result<()> {
        self.send(Method::POST, path, |r| r).await?;
        Ok(())
    }

    /// Make a PUT request.
    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let response = self.send(Method::PUT, path, |r| r.json(body)).await?;
        decode(response).await
    }

    /// Make a DELETE request.
    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, |r| r).await?;
        Ok(())
    }

    /// Run a request through the middleware pipeline.
    ///
    /// Returns the response on a success status, the normalised error
    /// otherwise.
    async fn send<F>(&self, method: Method, path: &str, build: F) -> Result<reqwest::Response>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = self.url(path)?;
        tracing::trace!(%method, %url, "Sending request");

        let mut request = build(
            self.inner
                .http
                .request(method, url)
                .timeout(self.inner.timeout),
        );
        for stage in &self.inner.middleware {
            request = stage.before_request(request).await;
        }

        let response = request.send().await?;
        let status = response.status();
        for stage in &self.inner.middleware {
            stage.after_response(status).await;
        }

        if status.is_success() {
            Ok(response)
        } else {
            Err(extract_error(response).await)
        }
    }
}

/// Decode a successful response body.
async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    Ok(response.json().await?)
}

/// Extract an error from a failed response.
async fn extract_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response.json::<ErrorResponse>().await.ok();
    Error::from_status(status, body)
}

/// Builder for creating an ApiClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    sessions: Option<SessionStore>,
    middleware: Vec<SharedMiddleware>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            sessions: None,
            middleware: Vec::new(),
        }
    }

    /// Set the server origin (`/api` is appended).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use `sessions` for token attachment and sign-in persistence.
    ///
    /// Defaults to an in-memory store.
    pub fn session_store(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Append a middleware stage after the built-in session stages.
    pub fn middleware(mut self, stage: SharedMiddleware) -> Self {
        self.middleware.push(stage);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url =
            Url::parse(&base_url).map_err(|e| Error::Config(format!("invalid base_url: {}", e)))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("educamais-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let sessions = self
            .sessions
            .unwrap_or_else(|| SessionStore::new(create_memory_store()));

        let mut middleware: Vec<SharedMiddleware> = vec![
            Arc::new(BearerAuth::new(sessions.clone())),
            Arc::new(SessionPurge::new(sessions.clone())),
        ];
        middleware.extend(self.middleware);

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                sessions,
                middleware,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
