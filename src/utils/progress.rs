use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Entity-level progress bar for a harvest run. A hidden tracker does nothing,
/// which keeps library callers and tests quiet.
#[derive(Clone)]
pub struct ProgressTracker {
    progress_bar: Option<ProgressBar>,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        Self {
            progress_bar: Some(pb),
        }
    }

    pub fn hidden() -> Self {
        Self { progress_bar: None }
    }

    pub fn update_message(&self, message: &str) {
        if let Some(pb) = &self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    pub fn set_position(&self, position: u64) {
        if let Some(pb) = &self.progress_bar {
            pb.set_position(position);
        }
    }

    pub fn increment(&self, delta: u64) {
        if let Some(pb) = &self.progress_bar {
            pb.inc(delta);
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.progress_bar {
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.finish_with_message("Complete");
        }
    }
}
