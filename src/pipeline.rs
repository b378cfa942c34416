use log::{debug, error, info, warn};
use std::path::PathBuf;

use crate::core::error::{ErrorScope, PipelineResult};
use crate::core::types::{Entity, FilingDescriptor, LedgerRecord};
use crate::edgar::{FilingCatalog, PackageSource};
use crate::extract::PackageExtractor;
use crate::ledger::{EntityBatch, Ledger};
use crate::utils::progress::ProgressTracker;

/// Counters for one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub entities_attempted: usize,
    pub entities_failed: usize,
    pub filings_fetched: usize,
    pub filings_skipped: usize,
    pub filings_failed: usize,
}

enum FilingOutcome {
    AlreadyDownloaded,
    Recorded(PathBuf),
}

/// Drives entities through catalog lookup, dedup, download, extraction and
/// ledger commit. A failing filing never stops its entity and a failing
/// entity never stops the run.
pub struct Orchestrator<C, S> {
    catalog: C,
    source: S,
    extractor: PackageExtractor,
    ledger: Ledger,
    progress: ProgressTracker,
}

impl<C, S> Orchestrator<C, S>
where
    C: FilingCatalog,
    S: PackageSource,
{
    pub fn new(catalog: C, source: S, extractor: PackageExtractor, ledger: Ledger) -> Self {
        Self {
            catalog,
            source,
            extractor,
            ledger,
            progress: ProgressTracker::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    /// Processes `entities` in order, starting at the resume cursor if the
    /// ledger has one. Only a failure to read the cursor ends the run early.
    pub async fn run(&self, entities: &[Entity]) -> PipelineResult<RunSummary> {
        let cursor = self.ledger.last_processed_entity().await?;
        let start = resume_index(entities, cursor.as_ref());
        if let Some(cursor) = &cursor {
            info!(
                "Resuming at {} (entity {} of {})",
                cursor,
                start + 1,
                entities.len()
            );
        }
        self.progress.set_position(start as u64);

        let mut summary = RunSummary::default();
        for entity in entities.iter().skip(start) {
            self.progress.update_message(&entity.ticker);
            summary.entities_attempted += 1;
            self.process_entity(entity, &mut summary).await;
            self.progress.increment(1);
        }
        self.progress.finish();

        info!(
            "Run complete: {} entities ({} failed), {} filings fetched, {} skipped, {} failed",
            summary.entities_attempted,
            summary.entities_failed,
            summary.filings_fetched,
            summary.filings_skipped,
            summary.filings_failed
        );
        Ok(summary)
    }

    async fn process_entity(&self, entity: &Entity, summary: &mut RunSummary) {
        info!("Processing {}", entity);

        let mut batch = match self.ledger.begin_entity().await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Error processing {}: {}", entity, e);
                summary.entities_failed += 1;
                return;
            }
        };

        let outcome = self.harvest_entity(entity, &mut batch, summary).await;
        if let Err(e) = &outcome {
            error!("Error processing {}: {}", entity, e);
            summary.entities_failed += 1;
        }

        let recorded = batch.recorded();
        match batch.commit().await {
            Ok(()) => debug!("Committed {} new record(s) for {}", recorded, entity),
            Err(e) => {
                warn!(
                    "Ledger commit failed for {}; its {} new record(s) may be missing: {}",
                    entity, recorded, e
                );
                if outcome.is_ok() {
                    summary.entities_failed += 1;
                }
            }
        }
    }

    async fn harvest_entity(
        &self,
        entity: &Entity,
        batch: &mut EntityBatch,
        summary: &mut RunSummary,
    ) -> PipelineResult<()> {
        let filings = self.catalog.list_filings(entity).await?;

        for filing in &filings {
            match self.process_filing(entity, filing, batch).await {
                Ok(FilingOutcome::AlreadyDownloaded) => summary.filings_skipped += 1,
                Ok(FilingOutcome::Recorded(path)) => {
                    debug!("Recorded {} at {:?}", filing.accession_number, path);
                    summary.filings_fetched += 1;
                }
                Err(e) if e.scope() == ErrorScope::Filing => {
                    warn!(
                        "Skipping {} filing {}: {}",
                        filing.form_type, filing.accession_number, e
                    );
                    summary.filings_failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    async fn process_filing(
        &self,
        entity: &Entity,
        filing: &FilingDescriptor,
        batch: &mut EntityBatch,
    ) -> PipelineResult<FilingOutcome> {
        if batch.already_downloaded(&filing.accession_number).await? {
            info!(
                "Filing {} already downloaded, skipping...",
                filing.accession_number
            );
            return Ok(FilingOutcome::AlreadyDownloaded);
        }

        let package = self.source.fetch(entity, filing).await?;
        let path = self.extractor.extract(&package, entity, filing)?;
        batch
            .record(&LedgerRecord::new(entity, filing, path.to_string_lossy()))
            .await?;

        Ok(FilingOutcome::Recorded(path))
    }
}

/// Index of the entity a run should start at: the cursor entity itself, so
/// that its unfinished filings are picked up, or the first entity when there is
/// no cursor or it is not in the input.
pub fn resume_index(entities: &[Entity], cursor: Option<&Entity>) -> usize {
    let Some(cursor) = cursor else {
        return 0;
    };
    entities
        .iter()
        .position(|e| e.ticker == cursor.ticker)
        .or_else(|| entities.iter().position(|e| e.id == cursor.id))
        .unwrap_or_else(|| {
            warn!(
                "Last processed entity {} is not in the input, starting from the beginning",
                cursor
            );
            0
        })
}
