//! One processing run: row loop, then archive, reported back over a channel.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::archive::build_archive;
use crate::error::JobError;
use crate::processor::{CancelFlag, RowProcessor, RunSummary};
use crate::table::Table;

/// Messages from a running job to the UI thread.
#[derive(Debug)]
pub enum JobEvent {
    /// Line for the user-visible run log.
    Log(String),
    /// Row `index` was resolved; `completed` of `total` rows are done.
    Row {
        index: usize,
        image: String,
        completed: usize,
        total: usize,
    },
    /// Archive built. `table` carries every row's final `image` value.
    Finished {
        table: Table,
        archive: Vec<u8>,
        summary: RunSummary,
    },
    /// The run ended without an archive.
    Failed { table: Table, error: JobError },
}

/// Runs the whole batch to completion: makes sure `output_dir` exists,
/// processes every row, then zips the results.
///
/// Returns the terminal event instead of sending it so callers and tests
/// can await it directly.
pub async fn run_job(
    mut table: Table,
    output_dir: PathBuf,
    processor: Arc<RowProcessor>,
    events: mpsc::Sender<JobEvent>,
    cancel: CancelFlag,
) -> JobEvent {
    if let Err(source) = tokio::fs::create_dir_all(&output_dir).await {
        let error = JobError::OutputDir {
            path: output_dir,
            source,
        };
        error!(%error, "cannot start run");
        return JobEvent::Failed { table, error };
    }

    let summary = processor
        .run(&mut table, &output_dir, &events, &cancel)
        .await;

    let _ = events
        .send(JobEvent::Log("📦 Building results.zip…".to_string()))
        .await;

    // Zipping touches the filesystem synchronously; keep it off the runtime workers.
    let archive_table = table.clone();
    let dir = output_dir.clone();
    let built = tokio::task::spawn_blocking(move || build_archive(&archive_table, &dir)).await;

    match built {
        Ok(Ok(archive)) => {
            info!(bytes = archive.len(), dir = %output_dir.display(), "archive ready");
            JobEvent::Finished {
                table,
                archive,
                summary,
            }
        }
        Ok(Err(e)) => {
            error!(error = %e, "archive failed");
            JobEvent::Failed {
                table,
                error: JobError::Archive(e),
            }
        }
        Err(join) => {
            error!(error = %join, "archive task panicked");
            JobEvent::Failed {
                table,
                error: JobError::Aborted(join.to_string()),
            }
        }
    }
}

/// Spawns [`run_job`] on the ambient tokio runtime and forwards its
/// terminal event onto `events`.
pub fn spawn_job(
    table: Table,
    output_dir: PathBuf,
    processor: Arc<RowProcessor>,
    events: mpsc::Sender<JobEvent>,
    cancel: CancelFlag,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let done = run_job(table, output_dir, processor, events.clone(), cancel).await;
        let _ = events.send(done).await;
    })
}
