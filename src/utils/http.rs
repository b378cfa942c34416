use anyhow::{anyhow, Result};
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Shared HTTP client. `timeout` bounds each whole request, so a stalled
/// connection surfaces as an error instead of hanging the run.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().gzip(true).timeout(timeout).build()?)
}

/// GETs `url` with the contact user agent EDGAR requires and returns the body.
/// Non-success statuses are errors.
pub async fn fetch_bytes(
    client: &Client,
    url: &Url,
    user_agent: &str,
    accept: &str,
) -> Result<Bytes> {
    log::debug!("Fetching URL: {}", url);

    let response = client
        .get(url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .header(reqwest::header::ACCEPT, accept)
        .send()
        .await?;

    log::debug!("Response status: {}", response.status());

    if !response.status().is_success() {
        return Err(anyhow!(
            "HTTP request failed with status: {}",
            response.status()
        ));
    }

    if let Some(length) = response.content_length() {
        log::debug!("Expected content length: {}", length);
    }

    let content = response.bytes().await?;
    log::debug!("Received content length: {}", content.len());

    Ok(content)
}
