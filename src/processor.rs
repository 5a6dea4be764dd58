//! Sequential row loop: one search + download per description.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::FetchError;
use crate::fetcher::FetchImage;
use crate::job::JobEvent;
use crate::table::{Row, Table};

/// Characters of the description echoed into the "searching" log line.
const QUERY_PREVIEW_CHARS: usize = 60;

/// What happened to a single row.
#[derive(Debug)]
pub enum RowOutcome {
    Saved(String),
    /// Blank description; no request was made.
    Skipped,
    NoMatch,
    Failed(FetchError),
    /// The run was stopped before this row was reached.
    Cancelled,
}

impl RowOutcome {
    /// Value written to the row's `image` column.
    pub fn image_value(&self) -> &str {
        match self {
            RowOutcome::Saved(name) => name,
            _ => "",
        }
    }

    /// Whether the row made a request to the search provider.
    pub fn reached_network(&self) -> bool {
        matches!(
            self,
            RowOutcome::Saved(_) | RowOutcome::NoMatch | RowOutcome::Failed(_)
        )
    }

    /// User-facing log line; `row_number` is 1-based.
    pub fn log_line(&self, row_number: usize) -> String {
        match self {
            RowOutcome::Saved(name) => format!("✅ Row {row_number}: saved as {name}"),
            RowOutcome::Skipped => format!("⚠️ Row {row_number}: empty description – skipped"),
            RowOutcome::NoMatch => format!("⚠️ Row {row_number}: no image found"),
            RowOutcome::Failed(e) => format!("❌ Row {row_number}: error – {e}"),
            RowOutcome::Cancelled => format!("⏹️ Row {row_number}: cancelled"),
        }
    }
}

/// Tallies of one run. The counts always add up to the number of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub saved: usize,
    pub skipped: usize,
    pub no_match: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl RunSummary {
    fn count(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Saved(_) => self.saved += 1,
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::NoMatch => self.no_match += 1,
            RowOutcome::Failed(_) => self.failed += 1,
            RowOutcome::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.saved + self.skipped + self.no_match + self.failed + self.cancelled
    }
}

/// Shared stop switch for a running batch, checked between rows.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Random pause between requests to the search provider.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min: min.min(max),
            max,
        }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Uniformly distributed in `[min, max]`.
    pub fn next_pause(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rand::rng().random_range(self.min..=self.max)
    }

    pub async fn pause(&self) {
        let pause = self.next_pause();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

pub struct RowProcessor {
    fetcher: Arc<dyn FetchImage>,
    pacer: Pacer,
}

impl RowProcessor {
    pub fn new(fetcher: Arc<dyn FetchImage>, pacer: Pacer) -> Self {
        Self { fetcher, pacer }
    }

    /// Resolves one row. Fetch failures are returned as [`RowOutcome::Failed`],
    /// never as an error.
    pub async fn process_row(&self, row: &Row, dir: &Path) -> RowOutcome {
        let query = row.description().trim();
        if query.is_empty() {
            return RowOutcome::Skipped;
        }
        match self.fetcher.fetch(query, dir).await {
            Ok(Some(name)) if !name.is_empty() => RowOutcome::Saved(name),
            Ok(_) => RowOutcome::NoMatch,
            Err(e) => RowOutcome::Failed(e),
        }
    }

    /// Visits every row in order, writing its `image` column and reporting
    /// progress on `events`.
    ///
    /// Once `cancel` is raised the remaining rows are marked cancelled
    /// without touching the network.
    pub async fn run(
        &self,
        table: &mut Table,
        dir: &Path,
        events: &mpsc::Sender<JobEvent>,
        cancel: &CancelFlag,
    ) -> RunSummary {
        let total = table.len();
        let mut summary = RunSummary::default();
        let _ = events.send(JobEvent::Log("🚀 Starting download…".to_string())).await;

        for (index, row) in table.rows.iter_mut().enumerate() {
            let row_number = index + 1;
            let query = row.description().trim().to_string();

            let outcome = if cancel.is_cancelled() {
                RowOutcome::Cancelled
            } else {
                if !query.is_empty() {
                    let preview: String = query.chars().take(QUERY_PREVIEW_CHARS).collect();
                    let _ = events
                        .send(JobEvent::Log(format!(
                            "📥 Row {row_number}: searching image for '{preview}…'"
                        )))
                        .await;
                }
                self.process_row(row, dir).await
            };

            match &outcome {
                RowOutcome::Failed(e) => {
                    warn!(row = row_number, query = %query, error = %e, "row failed")
                }
                RowOutcome::Cancelled => {}
                other => info!(row = row_number, image = other.image_value(), "row done"),
            }

            row.set_image(outcome.image_value());
            summary.count(&outcome);
            let _ = events.send(JobEvent::Log(outcome.log_line(row_number))).await;
            let _ = events
                .send(JobEvent::Row {
                    index,
                    image: outcome.image_value().to_string(),
                    completed: row_number,
                    total,
                })
                .await;

            if outcome.reached_network() {
                self.pacer.pause().await;
            }
        }

        info!(?summary, "all rows processed");
        let _ = events
            .send(JobEvent::Log(format!(
                "🏁 Done: {} saved, {} not found, {} failed, {} skipped, {} cancelled",
                summary.saved, summary.no_match, summary.failed, summary.skipped, summary.cancelled
            )))
            .await;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacer_stays_in_range() {
        let pacer = Pacer::new(Duration::from_secs(1), Duration::from_secs(3));
        for _ in 0..100 {
            let pause = pacer.next_pause();
            assert!(pause >= Duration::from_secs(1) && pause <= Duration::from_secs(3));
        }
        assert_eq!(Pacer::none().next_pause(), Duration::ZERO);
    }

    #[test]
    fn outcomes_map_to_image_values_and_log_lines() {
        let saved = RowOutcome::Saved("red apple.jpg".into());
        assert_eq!(saved.image_value(), "red apple.jpg");
        assert_eq!(saved.log_line(1), "✅ Row 1: saved as red apple.jpg");

        let failed = RowOutcome::Failed(FetchError::Search("blocked".into()));
        assert_eq!(failed.image_value(), "");
        assert!(failed.log_line(4).starts_with("❌ Row 4: error – "));
        assert!(failed.reached_network());

        assert_eq!(RowOutcome::Skipped.image_value(), "");
        assert!(!RowOutcome::Skipped.reached_network());
        assert_eq!(RowOutcome::NoMatch.log_line(2), "⚠️ Row 2: no image found");
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
