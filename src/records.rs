//! Domain model for prediction results.
//!
//! Pure data and computation: the result set with its display cursor,
//! summary statistics, per-class chart aggregation, and the schema-tolerant
//! student detail view. Nothing here touches the network or the UI, so the
//! whole module is unit-testable without a running backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rows shown when a fresh result set arrives.
pub const DEFAULT_DISPLAY_LIMIT: usize = 10;
/// Rows revealed per "show more" request.
pub const DISPLAY_INCREMENT: usize = 5;

/// Class label used for records the backend returned without a class.
pub const UNKNOWN_CLASS_LABEL: &str = "Unknown Class";

/// One row of a batch prediction result.
///
/// Field names follow the backend wire contract; the struct round-trips
/// through JSON because the export endpoint receives these records back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(default)]
    pub stt: u32,
    pub masv: String,
    #[serde(default)]
    pub hoten: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lop: Option<String>,
    /// Average score. A missing value deserializes as zero, which also makes
    /// it count as zero in the mean below; that is the documented backend
    /// contract, preserved as-is.
    #[serde(rename = "DiemTB", default)]
    pub diem_tb: f64,
    #[serde(default)]
    pub tin_chi_rot: i64,
    #[serde(default)]
    pub so_mon_hoc_lai: i64,
    /// Binary dropout label: 1 means at risk.
    #[serde(default)]
    pub prediction: u8,
    /// Dropout probability as a percentage in `[0, 100]`.
    #[serde(default)]
    pub dropout_probability: f64,
}

impl PredictionRecord {
    /// Whether the record carries a positive dropout label.
    pub fn at_risk(&self) -> bool {
        self.prediction == 1
    }

    /// Class label with the backend's fallback for missing classes.
    pub fn class_label(&self) -> &str {
        self.lop.as_deref().unwrap_or(UNKNOWN_CLASS_LABEL)
    }
}

/// Verdict string for a binary prediction label.
pub fn verdict(prediction: u8) -> &'static str {
    if prediction == 1 {
        "At risk of dropping out"
    } else {
        "Not at risk of dropping out"
    }
}

/// The latest batch result set plus the display cursor for pagination.
///
/// Replaced wholesale on every successful upload; the cursor resets to its
/// default on replacement.
#[derive(Clone, Debug)]
pub struct ResultSet {
    records: Vec<PredictionRecord>,
    display_limit: usize,
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ResultSet {
    pub fn new(records: Vec<PredictionRecord>) -> Self {
        Self {
            records,
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }

    /// Replace all records and reset the display cursor.
    pub fn replace(&mut self, records: Vec<PredictionRecord>) {
        self.records = records;
        self.display_limit = DEFAULT_DISPLAY_LIMIT;
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn display_limit(&self) -> usize {
        self.display_limit
    }

    /// The currently revealed slice: the first `min(limit, len)` records.
    pub fn visible(&self) -> &[PredictionRecord] {
        let end = self.display_limit.min(self.records.len());
        &self.records[..end]
    }

    /// More records remain beyond the cursor.
    pub fn can_show_more(&self) -> bool {
        self.records.len() > self.display_limit
    }

    /// The cursor has been advanced past its default.
    pub fn can_show_less(&self) -> bool {
        self.display_limit > DEFAULT_DISPLAY_LIMIT
    }

    pub fn show_more(&mut self) {
        self.display_limit += DISPLAY_INCREMENT;
    }

    pub fn show_less(&mut self) {
        self.display_limit = DEFAULT_DISPLAY_LIMIT;
    }
}

/// Summary statistics over a full result set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Statistics {
    pub total: usize,
    /// Mean average-score; missing scores count as zero.
    pub mean_score: f64,
    /// Percentage of records with a positive label, zero for an empty set.
    pub dropout_rate: f64,
}

/// Compute summary statistics. Pure: same records, same output.
pub fn statistics(records: &[PredictionRecord]) -> Statistics {
    let total = records.len();
    if total == 0 {
        return Statistics {
            total: 0,
            mean_score: 0.0,
            dropout_rate: 0.0,
        };
    }
    let score_sum: f64 = records.iter().map(|record| record.diem_tb).sum();
    let at_risk = records.iter().filter(|record| record.at_risk()).count();
    Statistics {
        total,
        mean_score: score_sum / total as f64,
        dropout_rate: at_risk as f64 / total as f64 * 100.0,
    }
}

/// One bar of the per-class dropout chart.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDropoutBar {
    pub label: String,
    /// Dropout rate within the class, percentage rounded to two decimals.
    pub dropout_rate: f64,
}

/// Aggregate the full (unpaginated) result set into one bar per class,
/// sorted lexicographically by class label.
pub fn class_dropout_rates(records: &[PredictionRecord]) -> Vec<ClassDropoutBar> {
    let mut labels: Vec<&str> = records.iter().map(|record| record.class_label()).collect();
    labels.sort_unstable();
    labels.dedup();

    labels
        .into_iter()
        .map(|label| {
            let mut size = 0usize;
            let mut at_risk = 0usize;
            for record in records.iter().filter(|record| record.class_label() == label) {
                size += 1;
                if record.at_risk() {
                    at_risk += 1;
                }
            }
            let rate = if size > 0 {
                at_risk as f64 / size as f64 * 100.0
            } else {
                0.0
            };
            ClassDropoutBar {
                label: label.to_string(),
                dropout_rate: round_two(rate),
            }
        })
        .collect()
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Detail record fetched per identifier; loosely typed on purpose so new
/// backend fields show up without a client change.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StudentDetail(pub serde_json::Map<String, Value>);

/// Keys rendered by the fixed portion of the detail view.
pub const KNOWN_DETAIL_KEYS: &[&str] = &[
    "masv",
    "hoten",
    "lop",
    "khoa",
    "diem_tb",
    "tin_chi_rot",
    "so_mon_hoc_lai",
    "ty_le_bo_hoc_so",
    "ty_le_bo_hoc_chu",
];

impl StudentDetail {
    /// Display text for a field, `None` when absent or empty.
    pub fn display(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(value_display)
    }

    /// Binary prediction label when present.
    pub fn prediction(&self) -> Option<u8> {
        self.0
            .get("prediction")
            .and_then(Value::as_u64)
            .map(|value| value as u8)
    }

    /// Every non-empty field except the raw model outputs, as humanized
    /// `(key, value)` pairs sorted lexicographically by original key.
    pub fn fallback_rows(&self) -> Vec<(String, String)> {
        let mut keys: Vec<&String> = self
            .0
            .keys()
            .filter(|key| key.as_str() != "prediction" && key.as_str() != "dropout_probability")
            .collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| {
                value_display(self.0.get(key)?).map(|value| (humanize_key(key), value))
            })
            .collect()
    }
}

/// Humanize a wire field name: underscores become spaces, upper-cased.
pub fn humanize_key(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}

fn value_display(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(masv: &str, lop: Option<&str>, score: f64, prediction: u8) -> PredictionRecord {
        PredictionRecord {
            stt: 0,
            masv: masv.to_string(),
            hoten: format!("Student {masv}"),
            lop: lop.map(str::to_string),
            diem_tb: score,
            tin_chi_rot: 0,
            so_mon_hoc_lai: 0,
            prediction,
            dropout_probability: f64::from(prediction) * 100.0,
        }
    }

    fn set_of(n: usize) -> ResultSet {
        ResultSet::new(
            (0..n)
                .map(|i| record(&format!("SV{i:03}"), Some("A"), 5.0, 0))
                .collect(),
        )
    }

    #[test]
    fn visible_rows_are_min_of_limit_and_len() {
        for n in [0usize, 3, 10, 11, 25] {
            let set = set_of(n);
            assert_eq!(set.visible().len(), n.min(DEFAULT_DISPLAY_LIMIT));
        }
    }

    #[test]
    fn show_more_absent_iff_all_rows_visible() {
        let set = set_of(10);
        assert!(!set.can_show_more());
        let set = set_of(11);
        assert!(set.can_show_more());
    }

    #[test]
    fn show_less_absent_only_at_default_limit() {
        let mut set = set_of(25);
        assert!(!set.can_show_less());
        set.show_more();
        assert!(set.can_show_less());
        set.show_less();
        assert!(!set.can_show_less());
        assert_eq!(set.display_limit(), DEFAULT_DISPLAY_LIMIT);
    }

    #[test]
    fn two_show_more_clicks_reach_twenty() {
        let mut set = set_of(25);
        set.show_more();
        set.show_more();
        assert_eq!(set.display_limit(), 20);
        assert_eq!(set.visible().len(), 20);
        assert!(set.can_show_less());
    }

    #[test]
    fn replacement_resets_cursor() {
        let mut set = set_of(25);
        set.show_more();
        set.replace(vec![record("SV000", Some("B"), 4.0, 1)]);
        assert_eq!(set.display_limit(), DEFAULT_DISPLAY_LIMIT);
        assert_eq!(set.visible().len(), 1);
    }

    #[test]
    fn statistics_are_pure_and_handle_empty_sets() {
        assert_eq!(
            statistics(&[]),
            Statistics {
                total: 0,
                mean_score: 0.0,
                dropout_rate: 0.0
            }
        );
        let records = vec![
            record("SV001", Some("A"), 8.0, 0),
            record("SV002", Some("A"), 4.0, 1),
        ];
        let first = statistics(&records);
        let second = statistics(&records);
        assert_eq!(first, second);
        assert_eq!(first.total, 2);
        assert!((first.mean_score - 6.0).abs() < 1e-9);
        assert!((first.dropout_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn missing_scores_count_as_zero_in_the_mean() {
        // Deserialized records without DiemTB default to zero.
        let records = vec![
            record("SV001", Some("A"), 8.0, 0),
            record("SV002", Some("A"), 0.0, 0),
        ];
        let stats = statistics(&records);
        assert!((stats.mean_score - 4.0).abs() < 1e-9);
    }

    #[test]
    fn chart_bars_sorted_by_class_with_rounded_rates() {
        let records = vec![
            record("SV001", Some("B"), 5.0, 0),
            record("SV002", Some("A"), 5.0, 1),
            record("SV003", Some("B"), 5.0, 0),
            record("SV004", Some("A"), 5.0, 0),
            record("SV005", Some("B"), 5.0, 0),
        ];
        let bars = class_dropout_rates(&records);
        assert_eq!(
            bars,
            vec![
                ClassDropoutBar {
                    label: "A".to_string(),
                    dropout_rate: 50.0
                },
                ClassDropoutBar {
                    label: "B".to_string(),
                    dropout_rate: 0.0
                },
            ]
        );
    }

    #[test]
    fn records_without_class_group_under_fallback_label() {
        let records = vec![record("SV001", None, 5.0, 1)];
        let bars = class_dropout_rates(&records);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].label, UNKNOWN_CLASS_LABEL);
        assert!((bars[0].dropout_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn record_deserializes_with_backend_field_names() {
        let raw = r#"{
            "stt": 1,
            "masv": "SV001",
            "hoten": "Nguyen Van A",
            "lop": "CNTT1",
            "DiemTB": 6.5,
            "tin_chi_rot": 2,
            "so_mon_hoc_lai": 1,
            "prediction": 1,
            "dropout_probability": 73.25
        }"#;
        let record: PredictionRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.masv, "SV001");
        assert!((record.diem_tb - 6.5).abs() < 1e-9);
        assert!(record.at_risk());

        let round_trip = serde_json::to_value(&record).unwrap();
        assert!((round_trip["DiemTB"].as_f64().unwrap() - 6.5).abs() < 1e-9);
    }

    #[test]
    fn missing_score_field_defaults_to_zero() {
        let raw = r#"{"masv": "SV002", "prediction": 0}"#;
        let record: PredictionRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.diem_tb, 0.0);
    }

    #[test]
    fn fallback_rows_skip_model_outputs_and_empty_values() {
        let raw = r#"{
            "masv": "SV001",
            "hoten": "Nguyen Van A",
            "ghi_chu": "",
            "que_quan": "Ha Noi",
            "prediction": 1,
            "dropout_probability": 73.25
        }"#;
        let detail: StudentDetail = serde_json::from_str(raw).unwrap();
        let rows = detail.fallback_rows();
        assert_eq!(
            rows,
            vec![
                ("HOTEN".to_string(), "Nguyen Van A".to_string()),
                ("MASV".to_string(), "SV001".to_string()),
                ("QUE QUAN".to_string(), "Ha Noi".to_string()),
            ]
        );
    }

    #[test]
    fn humanize_replaces_underscores_and_uppercases() {
        assert_eq!(humanize_key("ty_le_bo_hoc_so"), "TY LE BO HOC SO");
    }

    #[test]
    fn verdict_strings_are_fixed() {
        assert_eq!(verdict(1), "At risk of dropping out");
        assert_eq!(verdict(0), "Not at risk of dropping out");
    }
}
