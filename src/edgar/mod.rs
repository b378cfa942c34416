pub mod archive;
pub mod filing;
pub mod rate_limiter;
pub mod report;

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::error::PipelineResult;
use crate::core::types::{Entity, FilingDescriptor};

pub use archive::ArchiveFetcher;
pub use filing::FilingCatalogClient;
pub use rate_limiter::{RateLimitGuard, RateLimiter};
pub use report::FormType;

/// Lists the filings of an entity that are eligible for download.
#[async_trait]
pub trait FilingCatalog: Send + Sync {
    async fn list_filings(&self, entity: &Entity) -> PipelineResult<Vec<FilingDescriptor>>;
}

/// Supplies the raw package bytes of one filing.
#[async_trait]
pub trait PackageSource: Send + Sync {
    async fn fetch(&self, entity: &Entity, filing: &FilingDescriptor) -> PipelineResult<Bytes>;
}
