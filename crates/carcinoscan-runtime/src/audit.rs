//! Append-only audit log.
//!
//! One record per top-level request, written after the pipeline completes.
//! A failed write is logged and dropped; it never fails the request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::AuditConfig;

/// Errors from audit sinks.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Failed to write audit log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One audited request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,

    /// The caller's input as received
    pub input: String,

    /// Serialized response, absent on failure
    pub result_json: Option<String>,

    pub error: Option<String>,
}

/// Append-only storage for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError>;

    fn name(&self) -> &str;
}

/// JSON Lines file sink. Writers are serialized so lines never interleave.
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> AuditError {
        AuditError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// In-memory sink, used when no audit path is configured.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Fire-and-forget front end over a sink.
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// JSONL file when a path is configured, memory otherwise.
    pub fn from_config(config: &AuditConfig) -> Self {
        match &config.path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Audit records appended to JSONL file");
                Self::new(Arc::new(JsonlAuditSink::new(path)))
            }
            None => {
                tracing::warn!(
                    "No audit.path configured; audit records are kept in memory and lost at exit"
                );
                Self::new(Arc::new(MemoryAuditSink::new()))
            }
        }
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Record one request outcome. Write failures are logged and swallowed.
    pub async fn append(&self, input: &str, result: Option<&JsonValue>, error: Option<&str>) {
        let record = AuditRecord {
            timestamp: Utc::now(),
            input: input.to_string(),
            result_json: result.map(JsonValue::to_string),
            error: error.map(str::to_string),
        };

        if let Err(e) = self.sink.write(&record).await {
            tracing::warn!(sink = self.sink.name(), error = %e, "Audit write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn write(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Io {
                path: PathBuf::from("/dev/full"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = Arc::new(MemoryAuditSink::new());
        let log = AuditLog::new(sink.clone());

        log.append("bacon", Some(&serde_json::json!({"cached": false})), None)
            .await;
        log.append("[1, 2]", None, Some("Invalid request format"))
            .await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].result_json.as_deref(), Some(r#"{"cached":false}"#));
        assert!(records[0].error.is_none());
        assert!(records[1].result_json.is_none());
        assert_eq!(records[1].error.as_deref(), Some("Invalid request format"));
    }

    #[test]
    fn test_sink_follows_configured_path() {
        assert_eq!(AuditLog::from_config(&AuditConfig { path: None }).sink_name(), "memory");
        let log = AuditLog::from_config(&AuditConfig {
            path: Some(PathBuf::from("audit.jsonl")),
        });
        assert_eq!(log.sink_name(), "jsonl");
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let log = AuditLog::new(Arc::new(BrokenSink));
        log.append("bacon", None, None).await;
        assert_eq!(log.sink_name(), "broken");
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!(
            "carcinoscan-audit-{}-{}.jsonl",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let log = AuditLog::from_config(&AuditConfig {
            path: Some(path.clone()),
        });

        log.append("bacon", None, None).await;
        log.append("lettuce", None, Some("boom")).await;

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<AuditRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].input, "bacon");
        assert_eq!(records[1].error.as_deref(), Some("boom"));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
