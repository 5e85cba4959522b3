// API client module: the blocking HTTP transport that talks to the
// fitness platform. Everything above this layer only sees `Reply` values
// and `EngineError`s, never reqwest types.

use crate::config::Config;
use crate::error::{EngineError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// HTTP verbs used by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// A successful platform answer: its human-readable message and payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    pub message: String,
    pub data: Value,
}

impl Reply {
    pub fn new(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }

    /// Deserialize the `data` payload into a typed record.
    pub fn parse<T: for<'de> Deserialize<'de>>(&self, what: &str) -> Result<T> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| EngineError::Transport(format!("Malformed {what} payload: {e}")))
    }
}

/// The single seam between the engine and the network.
///
/// `token` is attached as a bearer credential when present; its presence
/// also decides whether an HTTP 401 means bad credentials or an expired
/// session.
pub trait Transport {
    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        payload: Option<&Value>,
    ) -> Result<Reply>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        payload: Option<&Value>,
    ) -> Result<Reply> {
        (**self).request(method, path, token, payload)
    }
}

/// Platform response envelope: `code == 0` means success.
#[derive(Deserialize, Debug)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Blocking API client holding a reqwest client and the platform root.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create an ApiClient with the configured base URL and request timeout.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(ApiClient {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Build the Authorization header map when a token is given.
    fn auth_headers(token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(t) = token {
            let val = HeaderValue::from_str(&format!("Bearer {}", t))
                .map_err(|_| EngineError::Authentication("Unusable session token".to_string()))?;
            headers.insert(AUTHORIZATION, val);
        }
        Ok(headers)
    }

    fn read_reply(res: Response, authenticated: bool) -> Result<Reply> {
        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(unauthorized(authenticated, "HTTP 401"));
        }
        // Overload and timeouts may clear up; any other 4xx will not.
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            let txt = res.text().unwrap_or_default();
            return Err(EngineError::Transport(format!("HTTP {}: {}", status, txt)));
        }
        if !status.is_success() {
            return Err(EngineError::Http {
                status: status.as_u16(),
                detail: res.text().unwrap_or_default(),
            });
        }

        let envelope: Envelope = res
            .json()
            .map_err(|e| EngineError::Transport(format!("Malformed response: {e}")))?;
        envelope_to_reply(envelope, authenticated)
    }
}

fn unauthorized(authenticated: bool, detail: &str) -> EngineError {
    if authenticated {
        EngineError::SessionExpired
    } else {
        EngineError::Authentication(detail.to_string())
    }
}

fn envelope_to_reply(envelope: Envelope, authenticated: bool) -> Result<Reply> {
    let message = envelope.message.unwrap_or_default();
    match envelope.code {
        0 => Ok(Reply::new(message, envelope.data)),
        401 => Err(unauthorized(authenticated, &message)),
        code if message.is_empty() => Err(EngineError::Rejected(format!("code {code}"))),
        _ => Err(EngineError::Rejected(message)),
    }
}

fn map_send_error(err: reqwest::Error) -> EngineError {
    if err.is_connect() {
        EngineError::Unreachable(err.to_string())
    } else if err.is_timeout() {
        EngineError::Transport(format!("Request timed out: {err}"))
    } else {
        EngineError::Transport(err.to_string())
    }
}

impl Transport for ApiClient {
    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        payload: Option<&Value>,
    ) -> Result<Reply> {
        let url = format!("{}{}", &self.base_url, path);
        let mut req = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
        };
        req = req.headers(Self::auth_headers(token)?);
        if let Some(body) = payload {
            req = req.json(body);
        }

        tracing::debug!(?method, path, "Platform request");
        let res = req.send().map_err(map_send_error)?;
        Self::read_reply(res, token.is_some())
    }
}
