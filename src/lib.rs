pub mod core;
pub mod edgar;
pub mod entities;
pub mod extract;
pub mod ledger;
pub mod pipeline;
pub mod utils;

// Re-exports
pub use self::core::config::HarvestConfig;
pub use self::core::error::{ErrorScope, PipelineError, PipelineResult};
pub use self::core::types::{Entity, FilingDescriptor, LedgerRecord};
pub use extract::PackageExtractor;
pub use ledger::Ledger;
pub use pipeline::{Orchestrator, RunSummary};
pub use utils::progress::ProgressTracker;
