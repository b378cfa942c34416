use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::PackageSource;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::types::{Entity, FilingDescriptor};
use crate::utils::http::fetch_bytes;

/// Downloads XBRL zip packages from the EDGAR archive.
pub struct ArchiveFetcher {
    client: Client,
    archives_url: String,
    user_agent: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ArchiveFetcher {
    pub fn new(
        client: Client,
        archives_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            archives_url: archives_url.into(),
            user_agent: user_agent.into(),
            max_retries: 3,
            retry_delay: Duration::from_millis(50),
        }
    }

    /// Total download attempts per filing. Zero is treated as one.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// `<archives>/<cik>/<accession without hyphens>/<accession>-xbrl.zip`
    pub fn package_url(&self, entity: &Entity, filing: &FilingDescriptor) -> PipelineResult<Url> {
        let raw = format!(
            "{}/{}/{}/{}-xbrl.zip",
            self.archives_url.trim_end_matches('/'),
            entity.id,
            filing.accession_dir(),
            filing.accession_number
        );
        Url::parse(&raw).map_err(|e| PipelineError::FetchExhausted {
            accession_number: filing.accession_number.clone(),
            attempts: 0,
            last_error: e.to_string(),
        })
    }
}

#[async_trait]
impl PackageSource for ArchiveFetcher {
    async fn fetch(&self, entity: &Entity, filing: &FilingDescriptor) -> PipelineResult<Bytes> {
        let url = self.package_url(entity, filing)?;
        let attempts = self.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!("EDGAR package request {}/{}: {}", attempt, attempts, url);
            match fetch_bytes(&self.client, &url, &self.user_agent, "application/zip").await {
                Ok(content) => {
                    info!(
                        "Downloaded {} filing: {} ({} bytes)",
                        filing.form_type,
                        filing.accession_number,
                        content.len()
                    );
                    return Ok(content);
                }
                Err(e) => {
                    last_error = format!("{:#}", e);
                    if attempt < attempts {
                        warn!(
                            "Failed to download {} filing: {} ({}), retrying...",
                            filing.form_type, filing.accession_number, last_error
                        );
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(PipelineError::FetchExhausted {
            accession_number: filing.accession_number.clone(),
            attempts,
            last_error,
        })
    }
}
