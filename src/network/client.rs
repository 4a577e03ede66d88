//! HTTP client wrapper - executes requests and formats responses

use async_trait::async_trait;
use base64::Engine;
use std::time::{Duration, Instant};

use crate::errors::NetworkError;
use crate::messages::NetworkResponse;
use crate::models::{AuthType, Environment, HttpMethod, Request};
use crate::runner::substitute::substitute_request;
use crate::runner::{millis, HttpResponse, HttpSender};

/// Build a reqwest request from an already resolved `Request`
fn build_request(client: &reqwest::Client, request: &Request) -> reqwest::RequestBuilder {
    let url = request.url.as_str();
    let mut req_builder = match request.method {
        HttpMethod::GET => client.get(url),
        HttpMethod::POST => client.post(url),
        HttpMethod::PUT => client.put(url),
        HttpMethod::PATCH => client.patch(url),
        HttpMethod::DELETE => client.delete(url),
        HttpMethod::HEAD => client.head(url),
        HttpMethod::OPTIONS => client.request(reqwest::Method::OPTIONS, url),
    };

    for header in request.headers.iter().filter(|h| h.enabled) {
        req_builder = req_builder.header(&header.key, &header.value);
    }

    match &request.auth {
        AuthType::Bearer(token) => {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", token));
        }
        AuthType::Basic { username, password } => {
            let credentials = format!("{}:{}", username, password);
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            req_builder = req_builder.header("Authorization", format!("Basic {}", encoded));
        }
        AuthType::None => {}
    }

    if request.method.has_body() && !request.body.is_empty() {
        req_builder = req_builder.body(request.body.clone());
    }

    req_builder
}

/// Maps a reqwest failure, classifying timeouts from reqwest itself.
/// The URL is stripped from the text and the source chain appended.
fn network_error(e: reqwest::Error) -> NetworkError {
    let timed_out = e.is_timeout();
    let connect = e.is_connect();
    let e = e.without_url();

    let mut detail = e.to_string();
    let mut source = std::error::Error::source(&e);
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }

    if timed_out {
        NetworkError::timeout(format!("Request timed out: {}", detail))
    } else if connect {
        NetworkError::transport(format!("Connection failed: {}", detail))
    } else {
        NetworkError::transport(format!("Request failed: {}", detail))
    }
}

/// Sends `request` as-is and buffers the whole response
pub async fn send_request(
    client: &reqwest::Client,
    request: &Request,
) -> Result<HttpResponse, NetworkError> {
    let start = Instant::now();
    let resp = build_request(client, request)
        .send()
        .await
        .map_err(network_error)?;

    let status = resp.status();
    let headers = resp
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect();
    let body = resp
        .text()
        .await
        .map_err(network_error)?;

    Ok(HttpResponse {
        status_code: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
        time_ms: millis(start.elapsed()),
    })
}

/// Transport used by collection runs
#[derive(Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestSender { client }
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: &Request) -> Result<HttpResponse, NetworkError> {
        send_request(&self.client, request).await
    }
}

/// Execute a single request from the editor and return the response (buffered)
pub async fn execute_request(
    client: &reqwest::Client,
    request: Request,
    environment: Option<Environment>,
    request_id: u64,
) -> NetworkResponse {
    let vars = environment
        .as_ref()
        .map(Environment::active_variables)
        .unwrap_or_default();
    let resolved = substitute_request(&request, &vars);

    let start = Instant::now();
    match send_request(client, &resolved).await {
        Ok(resp) => NetworkResponse::Success {
            id: request_id,
            status: resp.status_code,
            body: pretty_body(resp.body),
            time_ms: resp.time_ms,
        },
        Err(e) => NetworkResponse::Error {
            id: request_id,
            message: e.message,
            time_ms: millis(start.elapsed()),
        },
    }
}

/// Pretty-prints JSON bodies, leaving anything else untouched
pub fn pretty_body(body: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(body),
        Err(_) => body,
    }
}

/// Create an HTTP client with the given transport timeout
pub fn create_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
