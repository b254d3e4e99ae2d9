use reqwest::blocking::{Client, Response};
use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::{IrrigoError, Result};

/// Blocking client shared by the provider gateways.
/// Timeouts live here; the gateways themselves never retry.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| IrrigoError::Configuration(format!("failed to create HTTP client: {}", e)))
}

/// Turn a non-success status into an upstream failure carrying the body
pub fn check_status(provider: &'static str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    Err(IrrigoError::upstream(
        provider,
        format!("HTTP {}: {}", status, truncate(&body, 500)),
    ))
}

pub fn send_error(provider: &'static str, error: reqwest::Error) -> IrrigoError {
    IrrigoError::upstream(provider, format!("request failed: {}", error))
}

fn truncate(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}
