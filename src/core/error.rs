use thiserror::Error;

/// How far a failure reaches: one filing, or the rest of an entity's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Filing,
    Entity,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("filing catalog unavailable for CIK {entity_id}: {reason}")]
    CatalogUnavailable { entity_id: String, reason: String },

    #[error("download of {accession_number} failed after {attempts} attempt(s): {last_error}")]
    FetchExhausted {
        accession_number: String,
        attempts: u32,
        last_error: String,
    },

    #[error("could not extract package {accession_number}: {reason}")]
    Extraction {
        accession_number: String,
        reason: String,
    },

    #[error("ledger write failed: {0}")]
    LedgerWrite(#[source] sqlx::Error),

    #[error("ledger read failed: {0}")]
    LedgerRead(#[source] sqlx::Error),
}

impl PipelineError {
    pub fn scope(&self) -> ErrorScope {
        match self {
            PipelineError::FetchExhausted { .. } | PipelineError::Extraction { .. } => {
                ErrorScope::Filing
            }
            PipelineError::CatalogUnavailable { .. }
            | PipelineError::LedgerWrite(_)
            | PipelineError::LedgerRead(_) => ErrorScope::Entity,
        }
    }

    pub(crate) fn catalog(entity_id: &str, reason: impl ToString) -> Self {
        PipelineError::CatalogUnavailable {
            entity_id: entity_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn extraction(accession_number: &str, reason: impl ToString) -> Self {
        PipelineError::Extraction {
            accession_number: accession_number.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
