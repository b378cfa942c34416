use async_trait::async_trait;
use chrono::NaiveDate;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use super::rate_limiter::RateLimiter;
use super::report::FormType;
use super::FilingCatalog;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::types::{Entity, FilingDescriptor};
use crate::utils::http::fetch_bytes;

/// Columnar `filings.recent` block of the submissions API: entry `i` of every
/// array describes the same filing.
#[derive(Debug, Clone, Deserialize)]
pub struct FilingEntry {
    #[serde(rename = "accessionNumber")]
    pub accession_number: Vec<String>,
    #[serde(rename = "reportDate")]
    pub report_date: Vec<String>,
    pub form: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilingsData {
    pub recent: FilingEntry,
}

#[derive(Debug, Deserialize)]
pub struct CompanyFilings {
    #[serde(default)]
    pub cik: String,
    #[serde(default)]
    pub name: String,
    pub filings: FilingsData,
}

pub struct FilingCatalogClient {
    client: Client,
    limiter: Arc<RateLimiter>,
    data_url: String,
    user_agent: String,
}

impl FilingCatalogClient {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        data_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            limiter,
            data_url: data_url.into(),
            user_agent: user_agent.into(),
        }
    }

    pub fn catalog_url(&self, entity: &Entity) -> PipelineResult<Url> {
        let raw = format!(
            "{}/submissions/CIK{}.json",
            self.data_url.trim_end_matches('/'),
            entity.padded_id()
        );
        Url::parse(&raw).map_err(|e| PipelineError::catalog(&entity.id, e))
    }
}

#[async_trait]
impl FilingCatalog for FilingCatalogClient {
    async fn list_filings(&self, entity: &Entity) -> PipelineResult<Vec<FilingDescriptor>> {
        let url = self.catalog_url(entity)?;
        info!("Fetching filing catalog for {}", entity);
        log::debug!("EDGAR API Request URL: {}", url);

        let body = self
            .limiter
            .throttle(fetch_bytes(&self.client, &url, &self.user_agent, "application/json"))
            .await
            .map_err(|e| PipelineError::catalog(&entity.id, format!("{:#}", e)))?;

        let filings = parse_filings(&entity.id, &body)?;
        info!(
            "Catalog for {} lists {} eligible filing(s)",
            entity,
            filings.len()
        );
        Ok(filings)
    }
}

/// Parses a submissions response body into the eligible filings, in catalog order.
pub fn parse_filings(entity_id: &str, body: &[u8]) -> PipelineResult<Vec<FilingDescriptor>> {
    let response: CompanyFilings = serde_json::from_slice(body).map_err(|e| {
        log::error!("Failed to parse submissions JSON for CIK {}: {}", entity_id, e);
        PipelineError::catalog(entity_id, format!("malformed submissions JSON: {}", e))
    })?;
    select_filings(entity_id, &response.filings.recent)
}

pub fn select_filings(
    entity_id: &str,
    entry: &FilingEntry,
) -> PipelineResult<Vec<FilingDescriptor>> {
    let rows = entry.accession_number.len();
    if entry.form.len() != rows || entry.report_date.len() != rows {
        return Err(PipelineError::catalog(
            entity_id,
            format!(
                "column length mismatch: {} accession numbers, {} forms, {} report dates",
                rows,
                entry.form.len(),
                entry.report_date.len()
            ),
        ));
    }

    let mut filings = Vec::new();
    for i in 0..rows {
        let Ok(form_type) = entry.form[i].parse::<FormType>() else {
            continue;
        };
        let accession_number = &entry.accession_number[i];
        let report_date = match NaiveDate::parse_from_str(entry.report_date[i].trim(), "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                warn!(
                    "Skipping {} filing {}: unusable report date '{}'",
                    form_type, accession_number, entry.report_date[i]
                );
                continue;
            }
        };
        filings.push(FilingDescriptor {
            entity_id: entity_id.to_string(),
            form_type,
            report_date,
            accession_number: accession_number.clone(),
        });
    }

    Ok(filings)
}
