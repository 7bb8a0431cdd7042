//! Background request plumbing for the controller.
//!
//! Each backend call runs on its own thread and reports back over a single
//! message channel the controller drains once per frame. One `in_progress`
//! flag per request kind stops double submission; batch uploads additionally
//! carry a monotonic token so a stale response can never overwrite a newer
//! result set.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread;

use crate::api::{self, ApiError, PredictRequest, PredictResponse};
use crate::records::{PredictionRecord, StudentDetail};

pub(crate) enum JobMessage {
    Predicted(PredictResult),
    BatchFinished(BatchResult),
    DetailFetched(DetailResult),
    ExportFinished(ExportResult),
}

pub(crate) struct PredictResult {
    pub(crate) result: Result<PredictResponse, ApiError>,
}

pub(crate) struct BatchResult {
    /// Token issued when the upload started; stale tokens are discarded.
    pub(crate) token: u64,
    pub(crate) result: Result<Vec<PredictionRecord>, String>,
}

pub(crate) struct DetailResult {
    pub(crate) masv: String,
    pub(crate) result: Result<StudentDetail, ApiError>,
}

pub(crate) struct ExportResult {
    pub(crate) path: PathBuf,
    pub(crate) result: Result<(), String>,
}

pub(crate) struct ControllerJobs {
    message_tx: Sender<JobMessage>,
    message_rx: Receiver<JobMessage>,
    predict_in_progress: bool,
    batch_in_progress: bool,
    detail_in_progress: bool,
    export_in_progress: bool,
    next_batch_token: u64,
    latest_batch_token: u64,
}

impl ControllerJobs {
    pub(crate) fn new() -> Self {
        let (message_tx, message_rx) = channel::<JobMessage>();
        Self {
            message_tx,
            message_rx,
            predict_in_progress: false,
            batch_in_progress: false,
            detail_in_progress: false,
            export_in_progress: false,
            next_batch_token: 1,
            latest_batch_token: 0,
        }
    }

    pub(crate) fn try_recv_message(&self) -> Result<JobMessage, TryRecvError> {
        self.message_rx.try_recv()
    }

    pub(crate) fn predict_in_progress(&self) -> bool {
        self.predict_in_progress
    }

    pub(crate) fn batch_in_progress(&self) -> bool {
        self.batch_in_progress
    }

    pub(crate) fn detail_in_progress(&self) -> bool {
        self.detail_in_progress
    }

    pub(crate) fn export_in_progress(&self) -> bool {
        self.export_in_progress
    }

    /// Token of the most recently issued batch upload.
    pub(crate) fn latest_batch_token(&self) -> u64 {
        self.latest_batch_token
    }

    pub(crate) fn begin_predict(&mut self, base_url: String, request: PredictRequest) {
        if self.predict_in_progress {
            return;
        }
        self.predict_in_progress = true;
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = api::predict(&base_url, &request);
            let _ = tx.send(JobMessage::Predicted(PredictResult { result }));
        });
    }

    pub(crate) fn clear_predict(&mut self) {
        self.predict_in_progress = false;
    }

    /// Start a batch upload and return its token.
    ///
    /// Overlapping uploads are allowed; starting a new one supersedes any
    /// pending request, whose late response will fail the token check.
    pub(crate) fn begin_batch(&mut self, base_url: String, file: PathBuf) -> u64 {
        self.batch_in_progress = true;
        let token = self.next_batch_token;
        self.next_batch_token += 1;
        self.latest_batch_token = token;
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = run_batch_upload(&base_url, &file);
            let _ = tx.send(JobMessage::BatchFinished(BatchResult { token, result }));
        });
        token
    }

    pub(crate) fn clear_batch(&mut self) {
        self.batch_in_progress = false;
    }

    pub(crate) fn begin_detail(&mut self, base_url: String, masv: String) {
        if self.detail_in_progress {
            return;
        }
        self.detail_in_progress = true;
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = api::student_detail(&base_url, &masv);
            let _ = tx.send(JobMessage::DetailFetched(DetailResult { masv, result }));
        });
    }

    pub(crate) fn clear_detail(&mut self) {
        self.detail_in_progress = false;
    }

    pub(crate) fn begin_export(
        &mut self,
        base_url: String,
        records: Vec<PredictionRecord>,
        path: PathBuf,
    ) {
        if self.export_in_progress {
            return;
        }
        self.export_in_progress = true;
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let result = run_export(&base_url, &records, &path);
            let _ = tx.send(JobMessage::ExportFinished(ExportResult { path, result }));
        });
    }

    pub(crate) fn clear_export(&mut self) {
        self.export_in_progress = false;
    }
}

fn run_batch_upload(base_url: &str, file: &Path) -> Result<Vec<PredictionRecord>, String> {
    let contents = fs::read(file).map_err(|err| {
        format!("Failed to read {}: {err}", file.display())
    })?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.xlsx");
    api::upload_predict(base_url, file_name, &contents).map_err(|err| err.to_string())
}

/// Download the spreadsheet into `path`, removing the partial file on any
/// failed path so a broken export never leaves junk behind.
fn run_export(base_url: &str, records: &[PredictionRecord], path: &Path) -> Result<(), String> {
    let mut file = fs::File::create(path)
        .map_err(|err| format!("Failed to create {}: {err}", path.display()))?;
    match api::download_spreadsheet(base_url, records, &mut file) {
        Ok(()) => Ok(()),
        Err(err) => {
            drop(file);
            let _ = fs::remove_file(path);
            Err(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_tokens_increase_monotonically() {
        let mut jobs = ControllerJobs::new();
        let first = jobs.begin_batch("http://127.0.0.1:1".into(), PathBuf::from("missing"));
        jobs.clear_batch();
        let second = jobs.begin_batch("http://127.0.0.1:1".into(), PathBuf::from("missing"));
        assert!(second > first);
        assert_eq!(jobs.latest_batch_token(), second);
    }

    #[test]
    fn overlapping_upload_supersedes_pending_token() {
        let mut jobs = ControllerJobs::new();
        let first = jobs.begin_batch("http://127.0.0.1:1".into(), PathBuf::from("missing"));
        let second = jobs.begin_batch("http://127.0.0.1:1".into(), PathBuf::from("missing"));
        assert!(jobs.batch_in_progress());
        assert_ne!(first, second);
        assert_eq!(jobs.latest_batch_token(), second);
    }

    #[test]
    fn failed_export_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        // Unroutable backend: the download fails after the file was created.
        let err = run_export("http://127.0.0.1:1", &[], &path).unwrap_err();
        assert!(!err.is_empty());
        assert!(!path.exists());
    }
}
