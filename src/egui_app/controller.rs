//! Maintains app state and bridges backend calls to the egui UI.

mod jobs;

use egui::Color32;
use rfd::FileDialog;
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::api::PredictRequest;
use crate::config::{self, AppConfig};
use crate::egui_app::state::{PredictOutcome, UiState};
use crate::egui_app::view_model;
use crate::records::{self, ResultSet};
use jobs::{BatchResult, ControllerJobs, DetailResult, ExportResult, JobMessage, PredictResult};

/// Owns the result set, the chart model, and all in-flight requests.
///
/// All mutation happens on the UI thread: background threads only send
/// messages, applied here once per frame via [`AppController::poll_background_jobs`].
pub struct AppController {
    pub ui: UiState,
    results: ResultSet,
    jobs: ControllerJobs,
    config: AppConfig,
}

impl AppController {
    pub fn new() -> Self {
        Self {
            ui: UiState::default(),
            results: ResultSet::default(),
            jobs: ControllerJobs::new(),
            config: AppConfig::default(),
        }
    }

    /// Load persisted config (backend base URL).
    pub fn load_configuration(&mut self) -> Result<(), config::ConfigError> {
        self.config = config::load_or_default()?;
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Drain finished background jobs and fold them into UI state.
    pub fn poll_background_jobs(&mut self) {
        loop {
            match self.jobs.try_recv_message() {
                Ok(JobMessage::Predicted(message)) => self.apply_predict_result(message),
                Ok(JobMessage::BatchFinished(message)) => self.apply_batch_result(message),
                Ok(JobMessage::DetailFetched(message)) => self.apply_detail_result(message),
                Ok(JobMessage::ExportFinished(message)) => self.apply_export_result(message),
                Err(_) => break,
            }
        }
    }

    /// Submit the single-record form. Unparseable fields pass through as
    /// `null`; the backend owns validation.
    pub fn submit_prediction(&mut self) {
        if self.jobs.predict_in_progress() {
            return;
        }
        let form = &self.ui.form;
        let request = PredictRequest {
            diem_tb: form.diem_tb.trim().parse().ok(),
            tin_chi_rot: form.tin_chi_rot.trim().parse().ok(),
            so_mon_hoc_lai: form.so_mon_hoc_lai.trim().parse().ok(),
        };
        self.ui.form.outcome = None;
        self.ui.form.in_flight = true;
        self.jobs
            .begin_predict(self.config.base_url.clone(), request);
        self.set_status("Requesting prediction", StatusTone::Busy);
    }

    pub fn predict_in_flight(&self) -> bool {
        self.jobs.predict_in_progress()
    }

    /// Pick the batch file via the native dialog.
    pub fn choose_batch_file(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Spreadsheets", &["xlsx", "xls", "csv"])
            .pick_file()
        else {
            return;
        };
        self.ui.upload.error = None;
        self.ui.upload.selected_file = Some(path);
    }

    /// Upload the chosen file for batch prediction.
    pub fn begin_upload(&mut self) {
        let Some(file) = self.ui.upload.selected_file.clone() else {
            return;
        };
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());
        self.ui.upload.error = None;
        self.ui.upload.in_flight = true;
        self.jobs.begin_batch(self.config.base_url.clone(), file);
        self.set_status(format!("Uploading {name}"), StatusTone::Busy);
    }

    pub fn show_more(&mut self) {
        self.results.show_more();
        self.refresh_results_ui();
    }

    pub fn show_less(&mut self) {
        self.results.show_less();
        self.refresh_results_ui();
    }

    /// Fetch one student's detail; the modal opens only on success.
    pub fn open_detail(&mut self, masv: &str) {
        if self.jobs.detail_in_progress() {
            return;
        }
        self.ui.detail.loading_for = Some(masv.to_string());
        self.jobs
            .begin_detail(self.config.base_url.clone(), masv.to_string());
        self.set_status(format!("Loading detail for {masv}"), StatusTone::Busy);
    }

    pub fn close_detail(&mut self) {
        self.ui.detail.open = false;
        self.ui.detail.view = None;
    }

    /// Export the full result set as a spreadsheet via a save dialog.
    ///
    /// Short-circuits with an alert when there is nothing to export; no
    /// request is made in that case.
    pub fn export_results(&mut self) {
        if self.results.is_empty() {
            self.raise_alert("No data to export");
            return;
        }
        if self.jobs.export_in_progress() {
            return;
        }
        let Some(path) = FileDialog::new()
            .add_filter("Excel workbook", &["xlsx"])
            .set_file_name(export_file_name(now_local_or_utc()))
            .save_file()
        else {
            return;
        };
        self.jobs.begin_export(
            self.config.base_url.clone(),
            self.results.records().to_vec(),
            path,
        );
        self.set_status("Exporting spreadsheet", StatusTone::Busy);
    }

    fn apply_predict_result(&mut self, message: PredictResult) {
        self.jobs.clear_predict();
        self.ui.form.in_flight = false;
        match message.result {
            Ok(response) => {
                self.ui.form.outcome = Some(PredictOutcome::Verdict {
                    verdict: records::verdict(response.prediction).to_string(),
                    probability: view_model::format_percent(response.dropout_probability),
                    at_risk: response.prediction == 1,
                });
                self.set_status("Prediction received", StatusTone::Info);
            }
            Err(err) => {
                self.ui.form.outcome = Some(PredictOutcome::Error(err.to_string()));
                self.set_status("Prediction failed", StatusTone::Error);
            }
        }
    }

    fn apply_batch_result(&mut self, message: BatchResult) {
        if message.token != self.jobs.latest_batch_token() {
            tracing::debug!(token = message.token, "Discarding stale batch response");
            return;
        }
        self.jobs.clear_batch();
        self.ui.upload.in_flight = false;
        match message.result {
            Ok(batch) => {
                let count = batch.len();
                self.results.replace(batch);
                self.refresh_results_ui();
                self.set_status(format!("{count} records loaded"), StatusTone::Info);
            }
            Err(error) => {
                // Prior results stay on screen untouched.
                self.ui.upload.error = Some(error);
                self.set_status("Batch prediction failed", StatusTone::Error);
            }
        }
    }

    fn apply_detail_result(&mut self, message: DetailResult) {
        self.jobs.clear_detail();
        self.ui.detail.loading_for = None;
        match message.result {
            Ok(detail) => {
                self.ui.detail.view = Some(view_model::detail_view(&detail));
                self.ui.detail.open = true;
                self.set_status(format!("Detail loaded for {}", message.masv), StatusTone::Info);
            }
            Err(err) => {
                tracing::error!(masv = %message.masv, "Failed to load student detail: {err}");
                self.raise_alert(format!("Could not load student detail: {err}"));
                self.set_status("Detail fetch failed", StatusTone::Error);
            }
        }
    }

    fn apply_export_result(&mut self, message: ExportResult) {
        self.jobs.clear_export();
        match message.result {
            Ok(()) => self.set_status(
                format!("Spreadsheet saved to {}", message.path.display()),
                StatusTone::Info,
            ),
            Err(error) => {
                tracing::error!("Spreadsheet export failed: {error}");
                self.raise_alert(format!("Spreadsheet export failed: {error}"));
                self.set_status("Export failed", StatusTone::Error);
            }
        }
    }

    /// Rebuild statistics, visible rows, pagination affordances, and the
    /// chart model from the current result set. The previous chart model is
    /// dropped wholesale; nothing accumulates across uploads.
    fn refresh_results_ui(&mut self) {
        let records = self.results.records();
        self.ui.results.stats = Some(view_model::stats_view(&records::statistics(records)));
        self.ui.results.rows = self
            .results
            .visible()
            .iter()
            .map(view_model::record_row)
            .collect();
        self.ui.results.show_more_visible = self.results.can_show_more();
        self.ui.results.show_less_visible = self.results.can_show_less();
        self.ui.results.chart = Some(view_model::chart_view(&records::class_dropout_rates(
            records,
        )));
    }

    fn raise_alert(&mut self, message: impl Into<String>) {
        self.ui.pending_alert = Some(message.into());
    }

    fn set_status(&mut self, text: impl Into<String>, tone: StatusTone) {
        let (label, color) = status_badge(tone);
        self.ui.status.text = text.into();
        self.ui.status.badge_label = label;
        self.ui.status.badge_color = color;
    }
}

impl Default for AppController {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum StatusTone {
    Idle,
    Busy,
    Info,
    Error,
}

fn status_badge(tone: StatusTone) -> (String, Color32) {
    match tone {
        StatusTone::Idle => ("Idle".into(), Color32::from_rgb(42, 42, 42)),
        StatusTone::Busy => ("Working".into(), Color32::from_rgb(31, 139, 255)),
        StatusTone::Info => ("Info".into(), Color32::from_rgb(64, 140, 112)),
        StatusTone::Error => ("Error".into(), Color32::from_rgb(192, 57, 43)),
    }
}

/// Default export filename: compact local timestamp to the second.
fn export_file_name(now: OffsetDateTime) -> String {
    const STAMP_FORMAT: &[FormatItem<'_>] =
        format_description!("[year][month][day]_[hour][minute][second]");
    match now.format(STAMP_FORMAT) {
        Ok(stamp) => format!("du_doan_{stamp}.xlsx"),
        Err(_) => "du_doan_export.xlsx".to_string(),
    }
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
