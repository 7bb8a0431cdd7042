//! Helpers to convert domain data into egui-facing view structs.

use crate::egui_app::state::{ChartBarView, ChartView, DetailView, RecordRowView, StatsView};
use crate::records::{
    ClassDropoutBar, PredictionRecord, Statistics, StudentDetail, verdict,
};

/// Format a percentage with two decimals, e.g. `73.25%`.
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Format a score with two decimals.
pub fn format_score(value: f64) -> String {
    format!("{value:.2}")
}

/// Convert one prediction record into a table row.
pub fn record_row(record: &PredictionRecord) -> RecordRowView {
    RecordRowView {
        stt: record.stt.to_string(),
        masv: record.masv.clone(),
        hoten: record.hoten.clone(),
        lop: record.lop.clone().unwrap_or_else(|| "N/A".to_string()),
        diem_tb: format_score(record.diem_tb),
        verdict: verdict(record.prediction).to_string(),
        at_risk: record.at_risk(),
        probability: format_percent(record.dropout_probability),
    }
}

/// Format summary statistics for the header strip.
pub fn stats_view(stats: &Statistics) -> StatsView {
    StatsView {
        total: stats.total.to_string(),
        mean_score: format_score(stats.mean_score),
        dropout_rate: format_percent(stats.dropout_rate),
    }
}

/// Build the chart model from per-class aggregates.
pub fn chart_view(bars: &[ClassDropoutBar]) -> ChartView {
    ChartView {
        bars: bars
            .iter()
            .map(|bar| ChartBarView {
                label: bar.label.clone(),
                rate: bar.dropout_rate,
                rate_label: format_percent(bar.dropout_rate),
            })
            .collect(),
    }
}

/// Build the modal content for a fetched student detail.
pub fn detail_view(detail: &StudentDetail) -> DetailView {
    let missing = || "Not available".to_string();
    let masv = detail.display("masv").unwrap_or_else(missing);
    let at_risk = detail.prediction() == Some(1);
    DetailView {
        title: format!("Student {masv}"),
        basic: vec![
            ("Student ID", masv),
            ("Full name", detail.display("hoten").unwrap_or_else(missing)),
            ("Class", detail.display("lop").unwrap_or_else(missing)),
            ("Department", detail.display("khoa").unwrap_or_else(missing)),
        ],
        outcome: vec![
            ("Average score", detail.display("diem_tb").unwrap_or_else(|| "0".to_string())),
            (
                "Failed credits",
                detail.display("tin_chi_rot").unwrap_or_else(|| "0".to_string()),
            ),
            (
                "Retaken courses",
                detail
                    .display("so_mon_hoc_lai")
                    .unwrap_or_else(|| "0".to_string()),
            ),
            (
                "Dropout rate",
                detail
                    .display("ty_le_bo_hoc_so")
                    .unwrap_or_else(|| "0%".to_string()),
            ),
        ],
        assessment: detail
            .display("ty_le_bo_hoc_chu")
            .unwrap_or_else(|| "Undetermined".to_string()),
        assessment_at_risk: at_risk,
        fallback: detail.fallback_rows(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_formatting_uses_two_decimals() {
        assert_eq!(format_percent(85.5), "85.50%");
        assert_eq!(format_percent(0.0), "0.00%");
    }

    #[test]
    fn record_row_substitutes_missing_class() {
        let record = PredictionRecord {
            stt: 3,
            masv: "SV003".to_string(),
            hoten: "Tran Thi B".to_string(),
            lop: None,
            diem_tb: 6.456,
            tin_chi_rot: 1,
            so_mon_hoc_lai: 0,
            prediction: 0,
            dropout_probability: 12.3,
        };
        let row = record_row(&record);
        assert_eq!(row.lop, "N/A");
        assert_eq!(row.diem_tb, "6.46");
        assert_eq!(row.verdict, "Not at risk of dropping out");
        assert_eq!(row.probability, "12.30%");
    }

    #[test]
    fn detail_view_fills_defaults_for_absent_fields() {
        let detail: StudentDetail =
            serde_json::from_str(r#"{"masv": "SV009", "prediction": 1}"#).unwrap();
        let view = detail_view(&detail);
        assert_eq!(view.title, "Student SV009");
        assert!(view.assessment_at_risk);
        assert_eq!(view.assessment, "Undetermined");
        let dropout = view
            .outcome
            .iter()
            .find(|(label, _)| *label == "Dropout rate")
            .unwrap();
        assert_eq!(dropout.1, "0%");
    }
}
