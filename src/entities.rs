use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::core::types::Entity;

/// A row of the SEC `company_tickers` export. Extra columns (e.g. `title`)
/// are ignored.
#[derive(Debug, Deserialize)]
struct CompanyRow {
    ticker: String,
    #[serde(alias = "cik")]
    cik_str: String,
}

pub fn load_entities(path: &Path) -> Result<Vec<Entity>> {
    let file = File::open(path).with_context(|| format!("Failed to open entity list {:?}", path))?;
    read_entities(file).with_context(|| format!("Failed to read entity list {:?}", path))
}

/// Reads `ticker,cik_str` rows in file order. CIKs stay text so their
/// leading zeros survive.
pub fn read_entities<R: Read>(reader: R) -> Result<Vec<Entity>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entities = Vec::new();
    for (line, row) in csv_reader.deserialize::<CompanyRow>().enumerate() {
        let row = row.with_context(|| format!("Malformed entity row {}", line + 2))?;
        if row.ticker.is_empty() || row.cik_str.is_empty() {
            log::warn!("Skipping entity row {} with missing ticker or CIK", line + 2);
            continue;
        }
        entities.push(Entity::new(row.ticker, row.cik_str));
    }

    log::debug!("Loaded {} entities", entities.len());
    Ok(entities)
}
