use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::diff::diff_fields;
use crate::hmi::HmiVector;

pub enum MessageLogMode {
    Full,
    Diffed,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_report: Option<HmiVector>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_report: None,
        })
    }

    pub fn log_request(&mut self, hmi: &HmiVector, write: bool) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "upd": write,
            "hmi": hmi.encode(),
        });
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, write: bool, error: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "fail",
            "upd": write,
            "error": error,
        });
        self.write_line(&entry);
    }

    /// `dir` is `"resp"` for exchange replies and `"push"` for heartbeats.
    pub fn log_report(&mut self, dir: &str, hmi: &HmiVector) {
        let entry = match (&self.mode, &self.previous_report) {
            (MessageLogMode::Diffed, Some(prev)) => {
                let mut changes = Vec::new();
                diff_fields(prev, hmi, &mut changes);

                let change_entries: Vec<Value> = changes
                    .iter()
                    .map(|(i, old, new)| {
                        json!({ "field": i, "old": old.to_string(), "new": new.to_string() })
                    })
                    .collect();

                json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": dir,
                    "changes": change_entries,
                })
            }
            (MessageLogMode::Diffed, None) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": dir,
                "full": true,
                "hmi": hmi.encode(),
            }),
            (MessageLogMode::Full, _) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": dir,
                "hmi": hmi.encode(),
            }),
        };
        self.write_line(&entry);
        self.previous_report = Some(hmi.clone());
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn read_lines(path: &str) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request(&HmiVector::idle().with_field(0, 240).unwrap(), true);

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["upd"], true);
        assert!(lines[0]["hmi"].as_str().unwrap().starts_with("240,N"));
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn diffed_mode_logs_full_first_then_changes() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        logger.log_report("resp", &HmiVector::decode_lenient("200,180,1"));
        logger.log_report("push", &HmiVector::decode_lenient("200,185,1"));

        let lines = read_lines(path);
        assert_eq!(lines[0]["full"], true);
        assert_eq!(lines[1]["dir"], "push");
        let changes = lines[1]["changes"].as_array().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0]["field"], 1);
        assert_eq!(changes[0]["old"], "180");
        assert_eq!(changes[0]["new"], "185");
    }

    #[test]
    fn diffed_mode_no_changes_logs_empty_array() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Diffed, path).unwrap();

        let hmi = HmiVector::decode_lenient("200,180,1");
        logger.log_report("resp", &hmi);
        logger.log_report("resp", &hmi);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["changes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn log_failure_records_error() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_failure(false, "timed out");

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "fail");
        assert_eq!(lines[0]["upd"], false);
        assert_eq!(lines[0]["error"], "timed out");
    }
}
