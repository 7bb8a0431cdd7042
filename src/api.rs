//! Client for the dropout-prediction backend.
//!
//! Four endpoints, plain HTTP: single prediction, batch upload, per-student
//! detail, and spreadsheet export. Responses are JSON except the export,
//! which streams opaque spreadsheet bytes. Application failures arrive as an
//! `error` field in the body (sometimes with a 2xx status), so every JSON
//! path checks for it before deserializing the payload.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::http_client;
use crate::records::{PredictionRecord, StudentDetail};

const MAX_JSON_RESPONSE_BYTES: usize = 8 * 1024 * 1024;
const MAX_SPREADSHEET_BYTES: usize = 64 * 1024 * 1024;

/// Multipart field name the batch endpoint expects.
const UPLOAD_FIELD_NAME: &str = "file";

/// Body of a single-record prediction request.
///
/// Fields are optional so unparseable form input passes through as `null`
/// instead of being rejected client-side; the backend owns validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PredictRequest {
    pub diem_tb: Option<f64>,
    pub tin_chi_rot: Option<i64>,
    pub so_mon_hoc_lai: Option<i64>,
}

/// Verdict returned for a single-record prediction.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PredictResponse {
    pub prediction: u8,
    pub dropout_probability: f64,
}

#[derive(Serialize)]
struct ExportRequest<'a> {
    results: &'a [PredictionRecord],
}

#[derive(Deserialize)]
struct BatchResponse {
    results: Vec<PredictionRecord>,
}

/// Errors surfaced by backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network unreachable or the transport failed mid-request.
    #[error("Connection error: {0}")]
    Transport(String),
    /// Non-2xx status without a usable `error` body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Application-level failure; the message is shown verbatim.
    #[error("{0}")]
    Api(String),
    /// Body was not the JSON we expected.
    #[error("Invalid response: {0}")]
    Json(String),
    /// The configured base URL cannot be combined with an endpoint path.
    #[error("Invalid backend URL: {0}")]
    BadUrl(String),
    /// Failed to write the downloaded spreadsheet.
    #[error("Failed to save spreadsheet: {0}")]
    Download(String),
}

/// Request a single prediction.
pub fn predict(base_url: &str, request: &PredictRequest) -> Result<PredictResponse, ApiError> {
    let url = endpoint(base_url, &["predict"])?;
    let result = http_client::agent()
        .post(&url)
        .set("Accept", "application/json")
        .send_json(request);
    let body = handle_response(result)?;
    parse_json_body(&body)
}

/// Submit a file for batch prediction, returning the new result rows.
pub fn upload_predict(
    base_url: &str,
    file_name: &str,
    contents: &[u8],
) -> Result<Vec<PredictionRecord>, ApiError> {
    let url = endpoint(base_url, &["upload_predict"])?;
    let boundary = multipart_boundary();
    let body = encode_multipart(&boundary, UPLOAD_FIELD_NAME, file_name, contents);
    let result = http_client::agent()
        .post(&url)
        .set(
            "Content-Type",
            &format!("multipart/form-data; boundary={boundary}"),
        )
        .set("Accept", "application/json")
        .send_bytes(&body);
    let body = handle_response(result)?;
    let parsed: BatchResponse = parse_json_body(&body)?;
    Ok(parsed.results)
}

/// Fetch the full detail record for one student identifier.
pub fn student_detail(base_url: &str, masv: &str) -> Result<StudentDetail, ApiError> {
    let url = endpoint(base_url, &["api", "student", masv])?;
    let result = http_client::agent()
        .get(&url)
        .set("Accept", "application/json")
        .call();
    let body = handle_response(result)?;
    parse_json_body(&body)
}

/// Post the full result set back to the server and stream the spreadsheet
/// bytes into `writer`.
pub fn download_spreadsheet(
    base_url: &str,
    records: &[PredictionRecord],
    writer: &mut impl Write,
) -> Result<(), ApiError> {
    let url = endpoint(base_url, &["download_excel"])?;
    let result = http_client::agent()
        .post(&url)
        .send_json(ExportRequest { results: records });
    let response = match result {
        Ok(response) => response,
        Err(error) => return Err(map_request_error(error)),
    };
    http_client::copy_response_to_writer(response, writer, MAX_SPREADSHEET_BYTES)
        .map_err(|err| ApiError::Download(err.to_string()))
}

/// Join endpoint path segments onto the base URL, percent-encoding each
/// segment (identifiers may contain anything the spreadsheet held).
fn endpoint(base_url: &str, segments: &[&str]) -> Result<String, ApiError> {
    let mut url =
        url::Url::parse(base_url).map_err(|err| ApiError::BadUrl(err.to_string()))?;
    {
        let mut parts = url
            .path_segments_mut()
            .map_err(|_| ApiError::BadUrl(format!("Not a base URL: {base_url}")))?;
        parts.pop_if_empty();
        for segment in segments {
            parts.push(segment);
        }
    }
    Ok(url.into())
}

fn handle_response(result: Result<ureq::Response, ureq::Error>) -> Result<String, ApiError> {
    match result {
        Ok(response) => read_body(response),
        Err(error) => Err(map_request_error(error)),
    }
}

fn map_request_error(error: ureq::Error) -> ApiError {
    match error {
        ureq::Error::Status(status, response) => {
            let body = read_body(response).unwrap_or_else(|err| err.to_string());
            match extract_error_field(&body) {
                Some(message) => ApiError::Api(message),
                None => ApiError::Status { status, body },
            }
        }
        ureq::Error::Transport(err) => ApiError::Transport(err.to_string()),
    }
}

fn read_body(response: ureq::Response) -> Result<String, ApiError> {
    let bytes = http_client::read_response_bytes(response, MAX_JSON_RESPONSE_BYTES)
        .map_err(|err| ApiError::Transport(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ApiError::Json(err.to_string()))
}

/// Deserialize a JSON body after checking for an application `error` field.
fn parse_json_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Json("Empty response body".to_string()));
    }
    let value: Value =
        serde_json::from_str(trimmed).map_err(|err| ApiError::Json(format!("{err}: {trimmed}")))?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(ApiError::Api(message.to_string()));
    }
    serde_json::from_value(value).map_err(|err| ApiError::Json(err.to_string()))
}

fn extract_error_field(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body.trim()).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("----riskview-{nanos:032x}")
}

/// Encode a single file field as a multipart/form-data body.
fn encode_multipart(boundary: &str, field: &str, file_name: &str, contents: &[u8]) -> Vec<u8> {
    // Quotes and backslashes would break the Content-Disposition quoting.
    let safe_name: String = file_name
        .chars()
        .map(|ch| if ch == '"' || ch == '\\' { '_' } else { ch })
        .collect();
    let mut body = Vec::with_capacity(contents.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{safe_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_percent_encodes_identifier_segments() {
        let url = endpoint("http://127.0.0.1:5000", &["api", "student", "SV 01/đ"]).unwrap();
        assert!(url.starts_with("http://127.0.0.1:5000/api/student/"));
        assert!(!url.contains(' '));
        assert!(!url.contains("/đ"));
        assert!(url.contains("SV%2001%2F"));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash_in_base() {
        let url = endpoint("http://backend.example/", &["predict"]).unwrap();
        assert_eq!(url, "http://backend.example/predict");
    }

    #[test]
    fn parse_json_body_prefers_error_field() {
        let err = parse_json_body::<PredictResponse>(r#"{"error": "not found"}"#).unwrap_err();
        match err {
            ApiError::Api(message) => assert_eq!(message, "not found"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn parse_json_body_reads_prediction_payload() {
        let parsed: PredictResponse =
            parse_json_body(r#"{"prediction": 1, "dropout_probability": 85.5}"#).unwrap();
        assert_eq!(parsed.prediction, 1);
        assert!((parsed.dropout_probability - 85.5).abs() < 1e-9);
    }

    #[test]
    fn parse_json_body_rejects_empty_bodies() {
        let err = parse_json_body::<PredictResponse>("  ").unwrap_err();
        assert!(matches!(err, ApiError::Json(_)));
    }

    #[test]
    fn predict_request_serializes_missing_fields_as_null() {
        let request = PredictRequest {
            diem_tb: Some(2.5),
            tin_chi_rot: None,
            so_mon_hoc_lai: Some(2),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"diem_tb":2.5,"tin_chi_rot":null,"so_mon_hoc_lai":2}"#
        );
    }

    #[test]
    fn multipart_body_has_boundary_discipline() {
        let body = encode_multipart("XYZ", "file", "scores.xlsx", b"abc");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--XYZ\r\n"));
        assert!(text.contains(
            "Content-Disposition: form-data; name=\"file\"; filename=\"scores.xlsx\"\r\n"
        ));
        assert!(text.contains("\r\n\r\nabc\r\n"));
        assert!(text.ends_with("--XYZ--\r\n"));
    }

    #[test]
    fn multipart_sanitizes_hostile_filenames() {
        let body = encode_multipart("XYZ", "file", "a\"b\\c.xlsx", b"");
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("filename=\"a_b_c.xlsx\""));
    }
}
