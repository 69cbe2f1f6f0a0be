//! The page loop and the retry pass.

use std::time::Duration;

use tracing::{info, instrument, warn};

use super::ControllerConfig;
use super::state::{ResumePoint, RunEnd};
use super::status::StatusBoard;
use crate::download::ResilientFetcher;
use crate::ledger::{AttemptRecord, RunLedger};
use crate::normalize::DomainNormalizer;
use crate::signal::{Interrupt, RunSignal};
use crate::source::{DownloadDescriptor, PageSource};

/// Everything a run owns exclusively. Held behind the controller's session lock.
pub(crate) struct Session {
    pub(crate) source: Box<dyn PageSource>,
    pub(crate) fetcher: ResilientFetcher,
    pub(crate) normalizer: DomainNormalizer,
    pub(crate) ledger: RunLedger,
    pub(crate) config: ControllerConfig,
}

/// Counts of one retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RetryCounts {
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
}

impl Session {
    /// Walks pages until the listing ends or the signal fires.
    ///
    /// Check points: before each descriptor, before asking for the next page,
    /// and after the inter-page delay.
    #[instrument(skip_all, fields(resume = ?resume))]
    pub(crate) async fn run_pages(
        &mut self,
        signal: &RunSignal,
        board: &StatusBoard,
        resume: Option<ResumePoint>,
    ) -> RunEnd {
        let (mut page, mut skip) = match resume {
            Some(point) => (point.page, point.next_index),
            None => {
                if let Err(e) = self.source.rewind().await {
                    return RunEnd::Failed(e.to_string());
                }
                (1, 0)
            }
        };

        loop {
            if let Some(interrupt) = signal.requested() {
                return Self::interrupted(interrupt, board, page, skip);
            }
            board.enter_page(page);
            info!(page, "processing page");

            let descriptors = match self.source.current_page_descriptors().await {
                Ok(descriptors) => descriptors,
                Err(e) => return RunEnd::Failed(e.to_string()),
            };
            let count = descriptors.len();

            for (index, descriptor) in descriptors.iter().enumerate().skip(skip) {
                if let Some(interrupt) = signal.requested() {
                    return Self::interrupted(interrupt, board, page, index);
                }
                let record = self.attempt(descriptor, signal, board).await;
                self.ledger.record(record);
                if index + 1 < count {
                    signal.sleep(self.config.inter_item_delay).await;
                }
            }
            skip = 0;

            if let Some(interrupt) = signal.requested() {
                return Self::interrupted(interrupt, board, page, count);
            }

            match self.source.has_next_page().await {
                Ok(true) => {}
                Ok(false) => return RunEnd::Completed,
                Err(e) => return RunEnd::Failed(e.to_string()),
            }
            match self.source.advance_page().await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(page, "next page reported but navigation did not happen");
                    return RunEnd::NavigationEnded;
                }
                Err(e) => {
                    warn!(page, error = %e, "navigation failed, ending run");
                    return RunEnd::NavigationEnded;
                }
            }

            page += 1;
            signal.sleep(self.config.inter_page_delay).await;
        }
    }

    /// Re-attempts every failed descriptor once, in ledger order.
    ///
    /// Each earlier failure leaves the ledger only when its new outcome is
    /// recorded, so a pass dropped part-way keeps the failures it never reached.
    #[instrument(skip_all, fields(count = descriptors.len()))]
    pub(crate) async fn retry(
        &mut self,
        descriptors: Vec<DownloadDescriptor>,
        board: &StatusBoard,
    ) -> RetryCounts {
        let signal = RunSignal::new();
        let mut counts = RetryCounts::default();
        let total = descriptors.len();
        for (index, descriptor) in descriptors.iter().enumerate() {
            let record = self.attempt(descriptor, &signal, board).await;
            if record.is_success() {
                counts.succeeded += 1;
            } else {
                counts.failed += 1;
            }
            self.ledger.replace_failure(record);
            if index + 1 < total {
                sleep(self.config.inter_item_delay).await;
            }
        }
        counts
    }

    /// Normalizes and fetches one descriptor and publishes its outcome.
    async fn attempt(
        &self,
        descriptor: &DownloadDescriptor,
        signal: &RunSignal,
        board: &StatusBoard,
    ) -> AttemptRecord {
        let normalized = self.normalizer.normalize(&descriptor.locator);
        if let Some(diagnostic) = &normalized.diagnostic {
            warn!(%diagnostic, "locator not normalized");
        }
        board.item_started(&descriptor.target_name);

        let outcome = self
            .fetcher
            .fetch(
                &normalized.locator,
                &descriptor.target_name,
                self.config.max_attempts,
                signal,
            )
            .await;
        let record = AttemptRecord::from_fetch(descriptor, normalized.locator, outcome);
        board.record_outcome(&record);
        record
    }

    fn interrupted(
        interrupt: Interrupt,
        board: &StatusBoard,
        page: u64,
        next_index: usize,
    ) -> RunEnd {
        match interrupt {
            Interrupt::Pause => {
                info!(page, next_index, "pause observed");
                board.set_resume(ResumePoint { page, next_index });
                RunEnd::Paused
            }
            Interrupt::Stop => {
                info!(page, next_index, "stop observed");
                RunEnd::Stopped
            }
        }
    }
}

async fn sleep(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
