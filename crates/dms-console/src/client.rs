//! REST client for the DMS backend.
//!
//! # Design
//! - One network round trip per call; no retries, no backoff.
//! - The bearer token is passed per call so the client itself stays stateless;
//!   the console owns the session and reacts to [`ApiError::Unauthorized`].
//! - Bodies are negotiated by content type: JSON when the response says so,
//!   raw text otherwise.

use std::path::Path;
use std::time::Duration;

use dms_api_models::TokenResponse;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{ApiError, ApiResult, GENERIC_ERROR_MESSAGE};

/// Path prefix every backend route lives under.
pub const API_PREFIX: &str = "/api";
/// Header used to correlate console runs with backend logs.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

const LOGIN_ENDPOINT: &str = "/auth/login";

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    /// The response declared `application/json`.
    Json(Value),
    /// Any other content type.
    Text(String),
}

impl ApiBody {
    /// Decode a JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Fails when the body is text or does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self, endpoint: &str) -> ApiResult<T> {
        match self {
            Self::Json(value) => serde_json::from_value(value).map_err(|source| ApiError::Decode {
                endpoint: endpoint.to_string(),
                source,
            }),
            Self::Text(_) => Err(ApiError::NotJson {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}

/// Body attached to an outgoing request.
#[derive(Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON document.
    Json(Value),
    /// Multipart upload.
    Multipart(Form),
}

/// A single REST call description.
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl ApiRequest {
    /// Build a request for `endpoint`, relative to [`API_PREFIX`].
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// `GET` request.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// `POST` request.
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// `PUT` request.
    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    /// `DELETE` request.
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a query parameter when a value is present.
    #[must_use]
    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Fails when `body` cannot be serialised.
    pub fn json<B: Serialize>(mut self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body).map_err(|source| ApiError::Encode {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Attach a multipart body.
    #[must_use]
    pub fn multipart(mut self, form: Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Endpoint relative to the API prefix.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// HTTP client bound to one backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    /// Build a client with an optional request timeout and correlation id.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(
        base_url: Url,
        timeout: Option<Duration>,
        request_id: Option<&str>,
    ) -> ApiResult<Self> {
        let mut default_headers = HeaderMap::new();
        if let Some(value) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
            default_headers.insert(HEADER_REQUEST_ID, value);
        }
        let mut builder = Client::builder().default_headers(default_headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|source| ApiError::Transport {
            endpoint: base_url.to_string(),
            source,
        })?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing HTTP client.
    #[must_use]
    pub const fn with_client(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Backend base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue a request and parse the body by content type.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] on 401, [`ApiError::Status`] with the
    /// extracted message on any other non-2xx, or a transport/decoding error.
    pub async fn call(&self, token: Option<&str>, request: ApiRequest) -> ApiResult<ApiBody> {
        let endpoint = request.endpoint.clone();
        let response = self.execute(token, request).await?;
        let is_json = is_json_response(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        if !is_json {
            return Ok(ApiBody::Text(String::from_utf8_lossy(&bytes).into_owned()));
        }
        if bytes.is_empty() {
            return Ok(ApiBody::Json(Value::Null));
        }
        serde_json::from_slice(&bytes)
            .map(ApiBody::Json)
            .map_err(|source| ApiError::Decode { endpoint, source })
    }

    /// Issue a request and decode the JSON response into `T`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call`]; additionally fails when the body is not `T`.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        token: Option<&str>,
        request: ApiRequest,
    ) -> ApiResult<T> {
        let endpoint = request.endpoint.clone();
        self.call(token, request).await?.into_json(&endpoint)
    }

    /// Exchange credentials for a bearer token.
    ///
    /// A rejected login never goes through the unauthorized path; any non-2xx
    /// answer is reported as [`ApiError::InvalidCredentials`].
    ///
    /// # Errors
    ///
    /// Fails on rejected credentials, transport errors, or malformed tokens.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<TokenResponse> {
        let url = self.endpoint_url(LOGIN_ENDPOINT, &[])?;
        let response = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: LOGIN_ENDPOINT.to_string(),
                source,
            })?;
        let status = response.status();
        tracing::debug!(endpoint = LOGIN_ENDPOINT, status = status.as_u16(), "login attempt");
        if !status.is_success() {
            return Err(ApiError::InvalidCredentials);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: LOGIN_ENDPOINT.to_string(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            endpoint: LOGIN_ENDPOINT.to_string(),
            source,
        })
    }

    /// Stream a binary response to `destination`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Fails with the usual status classification, or when writing fails.
    pub async fn download(
        &self,
        token: Option<&str>,
        request: ApiRequest,
        destination: &Path,
    ) -> ApiResult<u64> {
        let endpoint = request.endpoint.clone();
        let response = self.execute(token, request).await?;
        let io_error = |source| ApiError::Io {
            path: destination.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(io_error)?;
        let mut written = 0_u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| ApiError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;
        Ok(written)
    }

    async fn execute(&self, token: Option<&str>, request: ApiRequest) -> ApiResult<Response> {
        let ApiRequest {
            method,
            endpoint,
            query,
            body,
        } = request;
        let url = self.endpoint_url(&endpoint, &query)?;
        let mut builder = self.http.request(method.clone(), url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        let status = response.status();
        tracing::debug!(
            method = %method,
            endpoint = %endpoint,
            status = status.as_u16(),
            "api call completed"
        );

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if status.is_success() {
            return Ok(response);
        }

        let is_json = is_json_response(&response);
        let bytes = response.bytes().await.unwrap_or_default();
        Err(ApiError::Status {
            status,
            message: extract_error_message(is_json, &bytes),
        })
    }

    fn endpoint_url(&self, endpoint: &str, query: &[(String, String)]) -> ApiResult<Url> {
        let raw = format!(
            "{}{API_PREFIX}{endpoint}",
            self.base_url.as_str().trim_end_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|source| ApiError::Endpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

fn is_json_response(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"))
}

/// Extract the operator-facing message from a failed response body.
///
/// Preference order: a string `detail`, a serialised non-empty `detail`,
/// `message`, the raw text of a non-JSON body, then a generic fallback.
#[must_use]
pub fn extract_error_message(is_json: bool, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if !is_json {
        return if text.is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            text.into_owned()
        };
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => message_from_json(&value),
        Err(_) if !text.trim().is_empty() => text.into_owned(),
        Err(_) => GENERIC_ERROR_MESSAGE.to_string(),
    }
}

fn message_from_json(value: &Value) -> String {
    if let Some(detail) = value.get("detail") {
        if let Value::String(detail) = detail {
            return detail.clone();
        }
        if is_truthy(detail) {
            return detail.to_string();
        }
    }
    match value.get("message") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        Some(message) if is_truthy(message) => message.to_string(),
        _ => GENERIC_ERROR_MESSAGE.to_string(),
    }
}

/// Loose truthiness used when picking human-readable fields from payloads.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
