use chrono::NaiveDate;
use std::fmt;

use crate::edgar::report::FormType;

/// A reporting organization: its ticker and CIK.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    pub ticker: String,
    pub id: String,
}

impl Entity {
    pub fn new(ticker: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            id: id.into(),
        }
    }

    /// CIK left-padded with zeros to the 10 digits the submissions API expects.
    pub fn padded_id(&self) -> String {
        format!("{:0>10}", self.id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (CIK: {})", self.ticker, self.id)
    }
}

/// One filing eligible for download, as listed by the submissions catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingDescriptor {
    pub entity_id: String,
    pub form_type: FormType,
    pub report_date: NaiveDate,
    pub accession_number: String,
}

impl FilingDescriptor {
    /// Accession number as it appears in archive directory names.
    pub fn accession_dir(&self) -> String {
        self.accession_number.replace('-', "")
    }
}

/// A row of the download ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub ticker: String,
    pub entity_id: String,
    pub form_type: String,
    pub report_date: String,
    pub accession_number: String,
    pub file_path: String,
}

impl LedgerRecord {
    pub fn new(entity: &Entity, filing: &FilingDescriptor, file_path: impl Into<String>) -> Self {
        Self {
            ticker: entity.ticker.clone(),
            entity_id: entity.id.clone(),
            form_type: filing.form_type.dir_name(),
            report_date: filing.report_date.format("%Y-%m-%d").to_string(),
            accession_number: filing.accession_number.clone(),
            file_path: file_path.into(),
        }
    }
}
