//! HTTP client shared by the classifier, search and LLM integrations.
//!
//! Every upstream VeriSight talks to is a JSON API behind a bearer token, so
//! the client only does that: JSON or raw-byte request bodies (image uploads
//! carry their own content type), optional bearer auth, a retry budget for
//! 429/5xx and transport faults, and one flattened error message per failure
//! whatever envelope the provider used.
//!
//! ```no_run
//! # async fn demo() -> Result<(), verisight_http::HttpError> {
//! use verisight_http::{HttpClient, RequestOpts};
//!
//! let client = HttpClient::new("http://localhost:11434/")?;
//! let tags: serde_json::Value = client.get_json("api/tags", RequestOpts::default()).await?;
//! # Ok(()) }
//! ```
//!
//! Logging: `http.request.start`, `http.response`, `http.retrying` and
//! `http.error` events carry a per-call request id. Tokens are never logged.
//! With `VERISIGHT_HTTP_RAW=1` request and response bodies are also logged
//! (target `http.raw`), binary bodies as a byte count only.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "VERISIGHT_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RATE_LIMIT_FLOOR: Duration = Duration::from_millis(1100);

fn raw_enabled() -> bool {
    matches!(
        std::env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// HTTP status for `Api` errors, `None` for everything else.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Per-call overrides; unset fields fall back to the client defaults.
///
/// ```
/// use verisight_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     bearer: Some("hf_demo"),
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    /// Sent as `Authorization: Bearer <token>` after sanitizing.
    pub bearer: Option<&'a str>,
}

enum Body<'b> {
    Empty,
    Json(Vec<u8>),
    Raw {
        bytes: &'b [u8],
        content_type: &'b str,
    },
}

impl Body<'_> {
    fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Json(bytes) => bytes.len(),
            Body::Raw { bytes, .. } => bytes.len(),
        }
    }

    fn apply(&self, rb: RequestBuilder) -> RequestBuilder {
        match self {
            Body::Empty => rb,
            Body::Json(bytes) => rb
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.clone()),
            Body::Raw {
                bytes,
                content_type,
            } => rb.header(CONTENT_TYPE, *content_type).body(bytes.to_vec()),
        }
    }

    fn preview(&self) -> String {
        match self {
            Body::Empty => String::new(),
            Body::Json(bytes) => raw_preview(bytes),
            Body::Raw { bytes, .. } => raw_preview(bytes),
        }
    }
}

/// Status, headers and body of one completed exchange.
struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    elapsed: Duration,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Client anchored to `base`; relative paths are joined onto it, so keep
    /// the trailing slash when the base has a path.
    ///
    /// ```no_run
    /// use verisight_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.tavily.com/")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.execute(Method::GET, path, Body::Empty, opts).await
    }

    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        self.execute(Method::POST, path, Body::Json(bytes), opts)
            .await
    }

    /// POST an opaque byte body (e.g. an image) and decode a JSON response.
    pub async fn post_bytes_opts<T>(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let body = Body::Raw {
            bytes,
            content_type,
        };
        self.execute(Method::POST, path, body, opts).await
    }

    async fn execute<T>(
        &self,
        method: Method,
        path: &str,
        body: Body<'_>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;
        let bearer = opts.bearer.map(sanitize_token).transpose()?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let budget = opts.retries.unwrap_or(self.max_retries);
        let req_id = uuid::Uuid::new_v4().simple().to_string();

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            tracing::debug!(
                %req_id,
                attempt,
                budget,
                %method,
                host_path = %format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                timeout_ms = timeout.as_millis() as u64,
                bearer = bearer.is_some(),
                body_len = body.len(),
                "http.request.start"
            );
            if raw_enabled() {
                tracing::debug!(target: "http.raw", %req_id, %method, url = %url.path(), body = %body.preview(), "request");
            }

            let mut rb = self.inner.request(method.clone(), url.clone()).timeout(timeout);
            rb = body.apply(rb);
            if let Some(token) = &bearer {
                rb = rb.bearer_auth(token);
            }

            let exchange = match send(rb).await {
                Ok(exchange) => exchange,
                Err(err) => {
                    let message = err.to_string();
                    if attempt <= budget {
                        let delay = backoff(attempt);
                        tracing::warn!(
                            %req_id,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            message = %message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        %req_id,
                        attempt,
                        timed_out = err.is_timeout(),
                        message = %message,
                        "http.network_error"
                    );
                    return Err(HttpError::Network(message));
                }
            };

            let upstream_id = upstream_request_id(&exchange.headers);
            tracing::debug!(
                %req_id,
                status = %exchange.status,
                duration_ms = exchange.elapsed.as_millis() as u64,
                body_len = exchange.body.len(),
                x_request_id = %upstream_id,
                "http.response"
            );
            if raw_enabled() {
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status = %exchange.status,
                    headers = ?visible_headers(&exchange.headers),
                    body = %raw_preview(&exchange.body),
                    "response"
                );
            }

            if exchange.status.is_success() {
                return serde_json::from_slice::<T>(&exchange.body).map_err(|e| {
                    let snippet = snip_body(&exchange.body);
                    tracing::warn!(%req_id, serde_err = %e, body_snippet = %snippet, "http.decode_error");
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&exchange.body);
            if attempt <= budget {
                if let Some(delay) = retry_delay(exchange.status, &exchange.headers, attempt) {
                    tracing::warn!(
                        %req_id,
                        status = %exchange.status,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        message = %message,
                        "http.retrying"
                    );
                    sleep(delay).await;
                    continue;
                }
            }

            tracing::warn!(
                %req_id,
                status = %exchange.status,
                message = %message,
                x_request_id = %upstream_id,
                "http.error"
            );
            return Err(HttpError::Api {
                status: exchange.status,
                message,
                request_id: upstream_id,
            });
        }
    }
}

async fn send(rb: RequestBuilder) -> Result<Exchange, reqwest::Error> {
    let started = Instant::now();
    let resp = rb.send().await?;
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.bytes().await?.to_vec();
    Ok(Exchange {
        status,
        headers,
        body,
        elapsed: started.elapsed(),
    })
}

/// Delay before retrying a failed status, or `None` when it is not retryable.
fn retry_delay(status: StatusCode, headers: &HeaderMap, attempt: usize) -> Option<Duration> {
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS;
    if !rate_limited && !status.is_server_error() {
        return None;
    }
    let hinted = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    Some(match hinted {
        Some(delay) => delay,
        None if rate_limited => backoff(attempt).max(RATE_LIMIT_FLOOR),
        None => backoff(attempt),
    })
}

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(200u64.saturating_mul(1u64 << shift))
}

fn upstream_request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .or_else(|| headers.get("x-correlation-id"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

/// Response headers minus anything credential-shaped.
fn visible_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| {
            !matches!(
                name.as_str(),
                "authorization" | "set-cookie" | "cookie" | "x-api-key"
            )
        })
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}

fn raw_preview(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if text.len() <= RAW_MAX_BODY => text.to_string(),
        Ok(text) => {
            let cut = text
                .char_indices()
                .map(|(i, _)| i)
                .take_while(|i| *i <= RAW_MAX_BODY)
                .last()
                .unwrap_or(0);
            format!("{}... ({} bytes)", &text[..cut], bytes.len())
        }
        Err(_) => format!("<{} bytes binary>", bytes.len()),
    }
}

/// Flatten the error envelopes our providers use into one message.
///
/// OpenAI/Groq nest it (`{"error":{"message":..}}`); Hugging Face, Tavily and
/// Ollama put a string under `error`, `detail` or `message`.
fn extract_error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorField {
        Text(String),
        Nested { message: String },
    }

    #[derive(Deserialize)]
    struct Envelope {
        #[serde(default)]
        error: Option<ErrorField>,
        #[serde(default)]
        detail: Option<String>,
        #[serde(default)]
        message: Option<String>,
    }

    if let Ok(env) = serde_json::from_slice::<Envelope>(body) {
        let from_error = env.error.map(|e| match e {
            ErrorField::Text(text) => text,
            ErrorField::Nested { message } => message,
        });
        if let Some(found) = [from_error, env.message, env.detail]
            .into_iter()
            .flatten()
            .find(|m| !m.is_empty())
        {
            return found;
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(SNIPPET_MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}

/// Tokens pasted from dashboards often carry quotes or stray whitespace.
fn sanitize_token(raw: &str) -> Result<String, HttpError> {
    let mut token = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    token.retain(|ch| !ch.is_ascii_whitespace());

    if token.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !token.is_ascii() || token.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "bearer token contains non-printable or non-ASCII characters".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_trimmed_and_checked() {
        assert_eq!(sanitize_token(" \"hf_abc\n\" ").unwrap(), "hf_abc");
        assert!(sanitize_token("clé").is_err());
        assert!(sanitize_token("  ").is_err());
    }

    #[test]
    fn error_message_handles_provider_envelopes() {
        let openai = br#"{"error":{"message":"invalid api key","type":"auth"}}"#;
        assert_eq!(extract_error_message(openai), "invalid api key");

        let hf = br#"{"error":"Model is currently loading","estimated_time":20.0}"#;
        assert_eq!(extract_error_message(hf), "Model is currently loading");

        let tavily = br#"{"detail":{"error":"Unauthorized"}}"#;
        assert_eq!(extract_error_message(tavily), r#"{"detail":{"error":"Unauthorized"}}"#);

        assert_eq!(extract_error_message(br#"{"detail":"quota"}"#), "quota");
        assert_eq!(extract_error_message(b"Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn snippet_is_bounded() {
        let long = "x".repeat(SNIPPET_MAX + 10);
        let snip = snip_body(long.as_bytes());
        assert_eq!(snip.len(), SNIPPET_MAX + 3);
        assert!(snip.ends_with("..."));
    }

    #[test]
    fn only_429_and_5xx_are_retryable() {
        let none = HeaderMap::new();
        assert_eq!(
            retry_delay(StatusCode::SERVICE_UNAVAILABLE, &none, 2),
            Some(Duration::from_millis(400))
        );
        assert_eq!(
            retry_delay(StatusCode::TOO_MANY_REQUESTS, &none, 1),
            Some(RATE_LIMIT_FLOOR)
        );
        assert_eq!(retry_delay(StatusCode::UNAUTHORIZED, &none, 1), None);

        let mut hinted = HeaderMap::new();
        hinted.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(
            retry_delay(StatusCode::TOO_MANY_REQUESTS, &hinted, 1),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn raw_logging_hides_binary_and_credentials() {
        assert_eq!(raw_preview(&[0xFF, 0xD8, 0xFF]), "<3 bytes binary>");
        assert_eq!(raw_preview(br#"{"q":1}"#), r#"{"q":1}"#);

        let mut headers = HeaderMap::new();
        headers.insert("set-cookie", HeaderValue::from_static("session=abc"));
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        let shown = visible_headers(&headers);
        assert_eq!(shown, vec![("x-request-id".to_string(), "req-1".to_string())]);
    }

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }
}
