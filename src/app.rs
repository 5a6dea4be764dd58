//! Desktop front end: upload, run, watch the log, save `results.zip`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Color32, RichText, Ui};
use egui_extras::{Column, TableBuilder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::archive::ARCHIVE_NAME;
use crate::config::AppConfig;
use crate::job::{spawn_job, JobEvent};
use crate::processor::{CancelFlag, RowProcessor};
use crate::session::{Phase, Session};
use crate::table::{Table, DESCRIPTION_COLUMN};

pub struct CsvPixApp {
    config: AppConfig,
    session: Session,
    /// Text field contents; becomes the run's output folder on start.
    output_dir: String,
    processor: Arc<RowProcessor>,
    cancel: CancelFlag,
    job: Option<JoinHandle<()>>,
    event_tx: mpsc::Sender<JobEvent>,
    event_rx: mpsc::Receiver<JobEvent>,
    /// Result of the last save attempt.
    notice: Option<(bool, String)>,
}

impl CsvPixApp {
    pub fn new(config: AppConfig, processor: Arc<RowProcessor>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(100);
        Self {
            output_dir: config.output_dir.display().to_string(),
            config,
            session: Session::new(),
            processor,
            cancel: CancelFlag::new(),
            job: None,
            event_tx,
            event_rx,
            notice: None,
        }
    }

    /// Parses an upload; on failure the session is left untouched apart from the error.
    fn ingest(&mut self, name: &str, bytes: &[u8]) {
        match Table::parse(bytes) {
            Ok(table) => {
                info!(file = name, rows = table.len(), "csv loaded");
                self.session.load(name, table);
            }
            Err(e) => {
                warn!(file = name, error = %e, "csv rejected");
                self.session.reject(e);
            }
        }
    }

    fn ingest_path(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match fs::read(path) {
            Ok(bytes) => self.ingest(&name, &bytes),
            Err(e) => self
                .session
                .reject(format!("Could not read '{}': {e}", path.display())),
        }
    }

    fn open_csv_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Choose CSV file")
            .add_filter("CSV", &["csv"])
            .pick_file()
        {
            self.ingest_path(&path);
        }
    }

    /// Accepts the first `.csv` dropped onto the window while nothing is loaded.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        if self.session.phase() != Phase::Empty {
            return;
        }
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.into_iter().find(|f| {
            let name = f
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| f.name.clone());
            name.to_ascii_lowercase().ends_with(".csv")
        }) else {
            return;
        };

        if let Some(bytes) = &file.bytes {
            let name = if file.name.is_empty() { "dropped.csv" } else { file.name.as_str() };
            self.ingest(name, bytes);
        } else if let Some(path) = &file.path {
            self.ingest_path(path);
        }
    }

    fn start_processing(&mut self) {
        let dir = self.output_dir.trim();
        if dir.is_empty() {
            self.session.reject("Output folder cannot be empty.");
            return;
        }
        let output_dir = PathBuf::from(dir);
        let Some(table) = self.session.begin() else {
            return;
        };
        info!(rows = table.len(), dir = %output_dir.display(), "starting run");
        self.cancel = CancelFlag::new();
        self.notice = None;
        self.job = Some(spawn_job(
            table,
            output_dir,
            Arc::clone(&self.processor),
            self.event_tx.clone(),
            self.cancel.clone(),
        ));
    }

    fn save_archive(&mut self) {
        let Some(bytes) = self.session.archive() else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .set_title("Save results")
            .set_file_name(ARCHIVE_NAME)
            .add_filter("ZIP", &["zip"])
            .save_file()
        else {
            return;
        };
        let result = fs::write(&path, bytes);
        self.notice = Some(match result {
            Ok(()) => {
                info!(path = %path.display(), "archive saved");
                (true, format!("Saved {}", path.display()))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "archive save failed");
                (false, format!("Could not save {}: {e}", path.display()))
            }
        });
    }

    fn reset(&mut self) {
        if let Some(job) = self.job.take() {
            job.abort();
        }
        // Anything still queued belongs to the finished run.
        while self.event_rx.try_recv().is_ok() {}
        self.session.clear();
        self.cancel = CancelFlag::new();
        self.notice = None;
        self.output_dir = self.config.output_dir.display().to_string();
    }

    /// Drains job events into the session.
    fn poll_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                JobEvent::Log(line) => self.session.push_log(line),
                JobEvent::Row {
                    index,
                    image,
                    completed,
                    ..
                } => self.session.record_row(index, &image, completed),
                JobEvent::Finished { table, archive, .. } => {
                    self.session.finish(table, archive);
                    self.job = None;
                }
                JobEvent::Failed { table, error } => {
                    self.session.push_log(format!("❌ Run failed – {error}"));
                    self.session.fail(table, error);
                    self.job = None;
                }
            }
            ctx.request_repaint();
        }
        if self.session.phase() == Phase::Processing {
            // Keep polling while the worker is busy.
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn ui_upload(&mut self, ui: &mut Ui) {
        if let Some(error) = self.session.last_error() {
            ui.colored_label(Color32::RED, error);
            ui.add_space(8.0);
        }
        ui.label(format!(
            "Pick a CSV with a '{DESCRIPTION_COLUMN}' column. One image is fetched per row."
        ));
        ui.add_space(8.0);
        if ui.button("Choose CSV file").clicked() {
            self.open_csv_dialog();
        }
        ui.label(RichText::new("…or drop a .csv file onto this window").weak());
    }

    fn ui_loaded_banner(&self, ui: &mut Ui) {
        let name = self.session.upload_name().unwrap_or("upload");
        let rows = self.session.table().map(Table::len).unwrap_or(0);
        ui.horizontal(|ui| {
            ui.label("Loaded CSV:");
            ui.strong(name);
            ui.label(format!("— {rows} rows"));
        });
    }

    fn ui_start(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label("Output folder:");
            let width = ui.available_width() * 0.7;
            ui.add(egui::TextEdit::singleline(&mut self.output_dir).desired_width(width));
        });
        if let Some(error) = self.session.last_error() {
            ui.colored_label(Color32::RED, error);
        }
        ui.add_space(8.0);
        if ui.button(RichText::new("Start Processing").strong()).clicked() {
            self.start_processing();
        }
    }

    fn ui_progress(&mut self, ui: &mut Ui) {
        let progress = self.session.progress();
        ui.add(
            egui::ProgressBar::new(progress.fraction())
                .text(format!("{} / {}", progress.completed, progress.total)),
        );
        ui.horizontal(|ui| {
            ui.spinner();
            let stopping = self.cancel.is_cancelled();
            ui.label(if stopping { "Stopping after the current row…" } else { "Processing…" });
            if ui.add_enabled(!stopping, egui::Button::new("Stop")).clicked() {
                self.cancel.cancel();
            }
        });
    }

    fn ui_ready(&mut self, ui: &mut Ui) {
        ui.colored_label(Color32::from_rgb(60, 160, 60), "Processing finished!");
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("📁 Download Results (ZIP)").clicked() {
                self.save_archive();
            }
            if ui.button("Find New Images").clicked() {
                self.reset();
            }
        });
        if let Some((ok, text)) = &self.notice {
            let color = if *ok { Color32::GRAY } else { Color32::RED };
            ui.colored_label(color, text);
        }
    }

    fn ui_log(&self, ui: &mut Ui) {
        let log = self.session.log();
        if log.is_empty() {
            return;
        }
        let text = log.tail(self.config.log_tail).join("\n");
        egui::ScrollArea::vertical()
            .id_source("run_log")
            .max_height(220.0)
            .stick_to_bottom(true)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                ui.add(egui::Label::new(RichText::new(text).monospace()).wrap(true));
            });
    }

    /// Description and image of every row; image is blank until the row is done.
    fn ui_rows_table(&self, ui: &mut Ui) {
        let Some(table) = self.session.table() else {
            return;
        };
        let text_height = egui::TextStyle::Body.resolve(ui.style()).size;
        let row_height = text_height * 1.5;

        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::exact(48.0))
            .column(Column::remainder().at_least(200.0))
            .column(Column::initial(220.0).at_least(120.0))
            .min_scrolled_height(160.0)
            .header(20.0, |mut header| {
                header.col(|ui| { ui.strong("#"); });
                header.col(|ui| { ui.strong("Description"); });
                header.col(|ui| { ui.strong("Image"); });
            })
            .body(|mut body| {
                for (i, row_data) in table.rows.iter().enumerate() {
                    body.row(row_height, |mut row| {
                        row.col(|ui| { ui.label((i + 1).to_string()); });
                        row.col(|ui| { ui.label(row_data.description()); });
                        row.col(|ui| {
                            match row_data.image() {
                                None => ui.label(RichText::new("pending").weak()),
                                Some("") => ui.label(RichText::new("none").weak()),
                                Some(name) => ui.label(name),
                            };
                        });
                    });
                }
            });
    }

    fn apply_styling(&self, ctx: &egui::Context) {
        ctx.style_mut(|style| {
            style.spacing.item_spacing = egui::vec2(8.0, 6.0);
            style.spacing.button_padding = egui::vec2(12.0, 6.0);
            style.visuals.widgets.inactive.rounding = egui::Rounding::from(4.0);
        });
    }
}

impl eframe::App for CsvPixApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events(ctx);
        self.handle_dropped_files(ctx);
        self.apply_styling(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("📸 CSV Image Downloader");
            ui.add_space(12.0);

            let phase = self.session.phase();
            if phase == Phase::Empty {
                self.ui_upload(ui);
                return;
            }

            self.ui_loaded_banner(ui);
            ui.add_space(8.0);
            match phase {
                Phase::Loaded => self.ui_start(ui),
                Phase::Processing => self.ui_progress(ui),
                Phase::Ready => self.ui_ready(ui),
                Phase::Empty => {}
            }
            ui.add_space(8.0);
            self.ui_log(ui);
            ui.separator();
            self.ui_rows_table(ui);
        });
    }
}
