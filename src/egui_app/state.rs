//! Shared state types for the egui UI.

use egui::Color32;
use std::path::PathBuf;

/// Top-level UI model consumed by the egui renderer.
#[derive(Clone, Debug, Default)]
pub struct UiState {
    pub status: StatusBarState,
    pub form: PredictFormState,
    pub upload: UploadPanelState,
    pub results: ResultsPanelState,
    pub detail: DetailModalState,
    /// Message for a blocking alert the renderer must show this frame.
    pub pending_alert: Option<String>,
}

/// Status badge + text shown in the footer.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusBarState {
    pub text: String,
    pub badge_label: String,
    pub badge_color: Color32,
}

impl Default for StatusBarState {
    fn default() -> Self {
        Self {
            text: "Upload a results file or predict a single record to get started".into(),
            badge_label: "Idle".into(),
            badge_color: Color32::from_rgb(42, 42, 42),
        }
    }
}

/// Single-record prediction form: raw field text plus the last outcome.
#[derive(Clone, Debug, Default)]
pub struct PredictFormState {
    pub diem_tb: String,
    pub tin_chi_rot: String,
    pub so_mon_hoc_lai: String,
    pub in_flight: bool,
    pub outcome: Option<PredictOutcome>,
}

/// Inline result rendered under the prediction form.
#[derive(Clone, Debug, PartialEq)]
pub enum PredictOutcome {
    /// Two-line verdict: binary label plus formatted percentage.
    Verdict {
        verdict: String,
        probability: String,
        at_risk: bool,
    },
    Error(String),
}

/// Batch upload panel: chosen file and the last inline error.
#[derive(Clone, Debug, Default)]
pub struct UploadPanelState {
    pub selected_file: Option<PathBuf>,
    pub in_flight: bool,
    /// Inline error; prior results stay on screen when set.
    pub error: Option<String>,
}

/// Statistics, table rows, pagination affordances, and the chart model.
#[derive(Clone, Debug, Default)]
pub struct ResultsPanelState {
    pub stats: Option<StatsView>,
    pub rows: Vec<RecordRowView>,
    pub show_more_visible: bool,
    pub show_less_visible: bool,
    pub chart: Option<ChartView>,
}

/// Formatted summary statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct StatsView {
    pub total: String,
    pub mean_score: String,
    pub dropout_rate: String,
}

/// Render-friendly table row.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordRowView {
    pub stt: String,
    pub masv: String,
    pub hoten: String,
    pub lop: String,
    pub diem_tb: String,
    pub verdict: String,
    pub at_risk: bool,
    pub probability: String,
}

/// Chart model rebuilt wholesale on every new result set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartView {
    pub bars: Vec<ChartBarView>,
}

/// One bar of the per-class dropout chart.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartBarView {
    pub label: String,
    /// Percentage in `[0, 100]`.
    pub rate: f64,
    pub rate_label: String,
}

/// Detail modal: open only after a successful fetch.
#[derive(Clone, Debug, Default)]
pub struct DetailModalState {
    pub open: bool,
    /// Identifier of an in-flight detail fetch.
    pub loading_for: Option<String>,
    pub view: Option<DetailView>,
}

/// Fully formatted detail content; discarded when the modal closes.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailView {
    pub title: String,
    /// Fixed identity fields: label → value.
    pub basic: Vec<(&'static str, String)>,
    /// Fixed prediction fields: label → value.
    pub outcome: Vec<(&'static str, String)>,
    pub assessment: String,
    pub assessment_at_risk: bool,
    /// Schema-tolerant remainder: humanized key → value, sorted.
    pub fallback: Vec<(String, String)>,
}
