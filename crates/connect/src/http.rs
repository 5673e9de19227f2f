//! Shared reqwest plumbing: client construction, response decoding and the
//! mapping of transport failures onto [`GatewayError`].

use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use pocketbook_core::errors::{Error, GatewayError, Result};
use pocketbook_core::gateway::GatewayResult;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Longest body excerpt carried in an error message.
const ERROR_BODY_EXCERPT: usize = 200;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pocketbook/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Unexpected(format!("Failed to initialize HTTP client: {}", e)))
}

pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::timeout(service)
    } else if err.is_decode() {
        GatewayError::decode(service, err.to_string())
    } else {
        GatewayError::network(service, err.to_string())
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(ERROR_BODY_EXCERPT).collect()
}

/// Classifies a non-success HTTP status.
pub(crate) fn status_error(service: &str, status: StatusCode, body: &str) -> GatewayError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited {
            service: service.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::MissingCredentials {
            service: service.to_string(),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GatewayError::timeout(service),
        s if s.is_server_error() => GatewayError::network(service, format!("HTTP {}: {}", s, excerpt(body))),
        s => GatewayError::remote(service, format!("HTTP {}: {}", s, excerpt(body))),
    }
}

/// Sends the request and decodes a JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &str,
    request: reqwest::RequestBuilder,
) -> GatewayResult<T> {
    let response = request.send().await.map_err(|e| transport_error(service, e))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| transport_error(service, e))?;

    if !status.is_success() {
        warn!("[{}] request failed with {}", service, status);
        return Err(status_error(service, status, &body));
    }

    debug!("[{}] {} bytes received", service, body.len());
    serde_json::from_str(&body)
        .map_err(|e| GatewayError::decode(service, format!("{} - {}", e, excerpt(&body))))
}
