//! Shared REST plumbing for every adapter.
//!
//! `RestClient` owns one pooled `reqwest::Client` (or a Unix socket path), a
//! base URL and the auth scheme. Adapters build requests with the `Call`
//! builder and shape the `Reply` themselves, since each vendor reports empty
//! and non-JSON bodies differently.

#[cfg(unix)]
mod unix;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::{AdapterError, Result};

/// Default upstream timeout. Overridden by `HTTP_TIMEOUT_SECS`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("devops-mcp/", env!("CARGO_PKG_VERSION"));

// ── Auth ────────────────────────────────────────────────────────────────────

/// How a client authenticates against its upstream.
#[derive(Debug, Clone)]
pub enum Auth {
    None,
    Bearer(String),
    Basic {
        username: String,
        password: Option<String>,
    },
    /// Vendor-specific headers, e.g. `DD-API-KEY` or `PRIVATE-TOKEN`.
    Headers(Vec<(String, String)>),
    /// Literal `Authorization` value, e.g. `ApiKey <token>`.
    Raw(String),
}

// ── Client ──────────────────────────────────────────────────────────────────

pub struct RestClientBuilder {
    service: &'static str,
    base_url: String,
    auth: Auth,
    timeout: Duration,
    accept_invalid_certs: bool,
    follow_redirects: bool,
    socket: Option<PathBuf>,
}

impl RestClientBuilder {
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Off when the caller needs to read `Location` from a 3xx itself.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Send every request over this Unix socket. The base URL then only
    /// supplies the path prefix.
    pub fn unix_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket = Some(path.into());
        self
    }

    pub fn build(self) -> Result<RestClient> {
        let base = self.base_url.trim_end_matches('/').to_string();
        // Validate early so a bad env value fails at start-up, not on first call.
        Url::parse(&base)?;

        let transport = match self.socket {
            Some(path) => Transport::unix(path)?,
            None => {
                let http = reqwest::Client::builder()
                    .timeout(self.timeout)
                    .connect_timeout(CONNECT_TIMEOUT)
                    .user_agent(USER_AGENT)
                    .danger_accept_invalid_certs(self.accept_invalid_certs);
                let http = if self.follow_redirects {
                    http
                } else {
                    http.redirect(reqwest::redirect::Policy::none())
                }
                .build()?;
                Transport::Tcp(http)
            }
        };

        Ok(RestClient {
            service: self.service,
            base,
            auth: self.auth,
            timeout: self.timeout,
            transport,
        })
    }
}

#[derive(Debug, Clone)]
enum Transport {
    Tcp(reqwest::Client),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Transport {
    #[cfg(unix)]
    fn unix(path: PathBuf) -> Result<Self> {
        Ok(Transport::Unix(path))
    }

    #[cfg(not(unix))]
    fn unix(path: PathBuf) -> Result<Self> {
        Err(AdapterError::Unsupported(format!(
            "Unix socket {} is not available on this platform",
            path.display()
        )))
    }
}

/// Thin HTTP client bound to one upstream service.
#[derive(Debug, Clone)]
pub struct RestClient {
    service: &'static str,
    base: String,
    auth: Auth,
    timeout: Duration,
    transport: Transport,
}

impl RestClient {
    pub fn builder(service: &'static str, base_url: impl Into<String>) -> RestClientBuilder {
        RestClientBuilder {
            service,
            base_url: base_url.into(),
            auth: Auth::None,
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
            follow_redirects: true,
            socket: None,
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn socket_path(&self) -> Option<&std::path::Path> {
        match &self.transport {
            #[cfg(unix)]
            Transport::Unix(path) => Some(path),
            Transport::Tcp(_) => None,
        }
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through untouched.
    pub fn url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Ok(Url::parse(&format!("{}/", self.base))?);
        }
        Ok(Url::parse(&format!("{}/{}", self.base, path))?)
    }

    pub fn request(&self, method: Method, path: impl Into<String>) -> Call<'_> {
        Call {
            client: self,
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
            bearer: None,
        }
    }

    pub fn get(&self, path: impl Into<String>) -> Call<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: impl Into<String>) -> Call<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: impl Into<String>) -> Call<'_> {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: impl Into<String>) -> Call<'_> {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: impl Into<String>) -> Call<'_> {
        self.request(Method::DELETE, path)
    }
}

impl RestClient {
    /// Headers that carry the client's credentials, or `bearer` instead when set.
    fn auth_headers(&self, bearer: Option<&str>) -> Vec<(String, String)> {
        let authorization = |value: String| vec![(AUTHORIZATION.to_string(), value)];
        match (bearer, &self.auth) {
            (Some(token), _) => authorization(format!("Bearer {}", token)),
            (None, Auth::None) => Vec::new(),
            (None, Auth::Bearer(token)) => authorization(format!("Bearer {}", token)),
            (None, Auth::Basic { username, password }) => {
                let pair = format!("{}:{}", username, password.as_deref().unwrap_or(""));
                authorization(format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(pair)))
            }
            (None, Auth::Headers(headers)) => headers.clone(),
            (None, Auth::Raw(value)) => authorization(value.clone()),
        }
    }

    #[cfg(unix)]
    async fn send_unix(
        &self,
        socket: &std::path::Path,
        method: Method,
        url: &Url,
        headers: Vec<(String, String)>,
        body: Option<(String, Vec<u8>)>,
    ) -> Result<unix::RawReply> {
        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let mut request = hyper::Request::builder()
            .method(method)
            .uri(target)
            .header(reqwest::header::HOST, url.host_str().unwrap_or("localhost"))
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let data = match body {
            Some((content_type, data)) => {
                request = request.header(CONTENT_TYPE, content_type);
                data
            }
            None => Vec::new(),
        };
        let request = request.body(http_body_util::Full::new(hyper::body::Bytes::from(data)))?;
        unix::send(socket, request, self.timeout).await
    }
}

// ── Request builder ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(Value),
    Raw { content_type: String, data: Vec<u8> },
}

/// One upstream request under construction.
#[must_use = "a Call does nothing until `send` is awaited"]
#[derive(Clone)]
pub struct Call<'a> {
    client: &'a RestClient,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Body,
    bearer: Option<String>,
}

impl<'a> Call<'a> {
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Repeat `key` once per value, e.g. `match[]=a&match[]=b`.
    pub fn query_all<T: ToString>(mut self, key: &str, values: &[T]) -> Self {
        for v in values {
            self.query.push((key.to_string(), v.to_string()));
        }
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Bearer token for this call only, overriding the client's auth.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    pub fn text(mut self, content_type: &str, body: impl Into<String>) -> Self {
        self.body = Body::Raw {
            content_type: content_type.to_string(),
            data: body.into().into_bytes(),
        };
        self
    }

    pub fn bytes(mut self, content_type: &str, data: Vec<u8>) -> Self {
        self.body = Body::Raw {
            content_type: content_type.to_string(),
            data,
        };
        self
    }

    /// Send and fail with `AdapterError::Status` on any non-2xx reply.
    pub async fn send(self) -> Result<Reply> {
        let service = self.client.service;
        let reply = self.send_unchecked().await?;
        if !reply.status.is_success() {
            return Err(AdapterError::status(service, reply.status.as_u16(), &reply.text()));
        }
        Ok(reply)
    }

    /// Send and return the reply whatever its status.
    pub async fn send_unchecked(self) -> Result<Reply> {
        let client = self.client;
        let mut url = client.url(&self.path)?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
        }

        tracing::debug!(
            service = client.service,
            method = %self.method,
            url = %url,
            "upstream request"
        );

        let mut headers = client.auth_headers(self.bearer.as_deref());
        headers.extend(self.headers);
        let body = match self.body {
            Body::Empty => None,
            Body::Json(v) => Some(("application/json".to_string(), serde_json::to_vec(&v)?)),
            Body::Raw { content_type, data } => Some((content_type, data)),
        };

        let (status, headers, body) = match &client.transport {
            Transport::Tcp(http) => {
                let mut req = http.request(self.method, url);
                for (name, value) in &headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                if let Some((content_type, data)) = body {
                    req = req.header(CONTENT_TYPE, content_type).body(data);
                }
                let response = req.send().await?;
                let status = response.status();
                let headers = response.headers().clone();
                (status, headers, response.bytes().await?.to_vec())
            }
            #[cfg(unix)]
            Transport::Unix(socket) => {
                let raw = client.send_unix(socket, self.method, &url, headers, body).await?;
                (raw.status, raw.headers, raw.body)
            }
        };

        tracing::debug!(
            service = client.service,
            status = status.as_u16(),
            bytes = body.len(),
            "upstream reply"
        );

        Ok(Reply {
            status,
            headers,
            body,
        })
    }
}

// ── Reply ───────────────────────────────────────────────────────────────────

/// Buffered upstream reply.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: Vec<u8>,
}

/// What an upstream body turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    Text(String),
}

impl Reply {
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("json"))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON, failing if it is not.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Classify the body without failing.
    pub fn payload(&self) -> Payload {
        if self.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Payload::Empty;
        }
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(v) => Payload::Json(v),
            Err(_) => Payload::Text(self.text()),
        }
    }
}

// ── Fallback chains ─────────────────────────────────────────────────────────

/// Await each candidate in order and return the first success.
///
/// Candidates are lazy futures, so nothing past the first success is sent.
/// When every candidate fails the last error is returned.
pub async fn first_success<T, I, F>(candidates: I) -> Result<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for (attempt, candidate) in candidates.into_iter().enumerate() {
        match candidate.await {
            Ok(v) => return Ok(v),
            Err(e) => {
                tracing::debug!(attempt = attempt + 1, error = %e, "fallback candidate failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| AdapterError::Unsupported("no endpoint candidates to try".to_string())))
}

// ── Formatting helpers ──────────────────────────────────────────────────────

/// Indented JSON, two spaces, the way every adapter returns results.
pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Cut `s` to at most `max_len` bytes without splitting a UTF-8 character.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut boundary = max_len;
    while !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &s[..boundary]
}

/// Percent-encode one path segment (slashes included).
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
