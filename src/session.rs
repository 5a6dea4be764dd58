//! Per-session state and the Empty → Loaded → Processing → Ready lifecycle.

use crate::table::Table;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing uploaded yet.
    Empty,
    /// Rows parsed, waiting for "Start Processing".
    Loaded,
    /// The batch is running.
    Processing,
    /// Archive built and ready to save.
    Ready,
}

/// Append-only run log. Only the tail is shown on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// The last `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> &[String] {
        &self.lines[self.lines.len().saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completed share in `0.0..=1.0`; an empty batch counts as done.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f32 / self.total as f32
        }
    }
}

/// Everything one interactive session knows about its upload and run.
#[derive(Debug, Default)]
pub struct Session {
    upload_name: Option<String>,
    table: Option<Table>,
    log: RunLog,
    progress: Progress,
    archive: Option<Vec<u8>>,
    processing: bool,
    last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        match (&self.table, &self.archive, self.processing) {
            (None, _, _) => Phase::Empty,
            (Some(_), _, true) => Phase::Processing,
            (Some(_), Some(_), false) => Phase::Ready,
            (Some(_), None, false) => Phase::Loaded,
        }
    }

    pub fn upload_name(&self) -> Option<&str> {
        self.upload_name.as_deref()
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// Column names of the upload, empty before ingestion.
    pub fn columns(&self) -> &[String] {
        self.table.as_ref().map(|t| t.columns.as_slice()).unwrap_or_default()
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn archive(&self) -> Option<&[u8]> {
        self.archive.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Stores a freshly ingested upload. Only valid from [`Phase::Empty`].
    pub fn load(&mut self, upload_name: impl Into<String>, table: Table) -> bool {
        if self.phase() != Phase::Empty {
            return false;
        }
        self.progress = Progress {
            completed: 0,
            total: table.len(),
        };
        self.upload_name = Some(upload_name.into());
        self.table = Some(table);
        self.last_error = None;
        true
    }

    /// Records a rejected upload without touching anything else.
    pub fn reject(&mut self, error: impl ToString) {
        self.last_error = Some(error.to_string());
    }

    /// Hands the table to a processing run. Only valid from [`Phase::Loaded`].
    pub fn begin(&mut self) -> Option<Table> {
        if self.phase() != Phase::Loaded {
            return None;
        }
        let table = self.table.clone()?;
        self.processing = true;
        self.last_error = None;
        self.progress = Progress {
            completed: 0,
            total: table.len(),
        };
        Some(table)
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line);
    }

    /// Mirrors one processed row into the session copy of the table.
    pub fn record_row(&mut self, index: usize, image: &str, completed: usize) {
        if let Some(row) = self.table.as_mut().and_then(|t| t.rows.get_mut(index)) {
            row.set_image(image);
        }
        self.progress.completed = completed.min(self.progress.total);
    }

    /// Stores the final table and archive; the session becomes [`Phase::Ready`].
    pub fn finish(&mut self, table: Table, archive: Vec<u8>) {
        self.progress.completed = self.progress.total;
        self.table = Some(table);
        self.archive = Some(archive);
        self.processing = false;
    }

    /// Ends a run that produced no archive. Rows keep their annotations and
    /// the session drops back to [`Phase::Loaded`].
    pub fn fail(&mut self, table: Table, error: impl ToString) {
        self.table = Some(table);
        self.processing = false;
        self.last_error = Some(error.to_string());
    }

    /// Returns every field to its initial value.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
