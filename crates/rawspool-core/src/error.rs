// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for rawspool.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::{JobReport, JobStage};

/// Opaque OS-level failure reported by a printer backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", code_suffix(.code))]
pub struct BackendError {
    /// Native error code, when the platform exposes one.
    pub code: Option<i32>,
    pub message: String,
}

fn code_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (code {c})")).unwrap_or_default()
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self {
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }
}

/// Top-level error type for all rawspool operations.
#[derive(Debug, Error)]
pub enum RawSpoolError {
    // -- Directory --
    #[error("no local printer matches {selector}")]
    NotFound { selector: String },

    #[error("printer enumeration failed: {0}")]
    Enumeration(BackendError),

    // -- Job lifecycle --
    #[error("could not open printer {printer}: {source}")]
    Open {
        printer: String,
        source: BackendError,
    },

    /// Begin-document or end-document failed on the forward path.
    #[error("{stage} failed: {source}")]
    Document {
        stage: JobStage,
        source: BackendError,
    },

    /// Begin-page or end-page failed on the forward path.
    #[error("{stage} failed: {source}")]
    Page {
        stage: JobStage,
        source: BackendError,
    },

    #[error("write failed after {bytes_written} bytes: {source}")]
    Write {
        bytes_written: u64,
        source: BackendError,
    },

    /// A reverse transition failed.  Secondary to the primary error unless
    /// every earlier stage succeeded.
    #[error("cleanup {stage} failed: {source}")]
    Cleanup {
        stage: JobStage,
        source: BackendError,
    },

    #[error("print job did not finish within {after:?}")]
    TimedOut { after: Duration },

    // -- Environment --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("printer backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("print task aborted: {0}")]
    TaskAborted(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RawSpoolError {
    /// The job transition this error originated from, if any.
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            Self::Open { .. } => Some(JobStage::Open),
            Self::Document { stage, .. } | Self::Page { stage, .. } | Self::Cleanup { stage, .. } => {
                Some(*stage)
            }
            Self::Write { .. } => Some(JobStage::Write),
            _ => None,
        }
    }

    /// Whether the spooler may hold a partial job because of this failure.
    ///
    /// Anything after a successful begin-document can leave a partial or
    /// empty job behind.
    pub fn may_leave_partial_job(&self) -> bool {
        matches!(
            self.stage(),
            Some(JobStage::BeginPage | JobStage::Write | JobStage::EndPage | JobStage::EndDocument)
        )
    }
}

/// A failed job: the primary cause plus every cleanup failure that followed,
/// in the order the reverse transitions ran.
#[derive(Debug)]
pub struct JobFailure {
    pub primary: RawSpoolError,
    pub cleanup: Vec<RawSpoolError>,
}

impl JobFailure {
    pub fn new(primary: RawSpoolError) -> Self {
        Self {
            primary,
            cleanup: Vec::new(),
        }
    }
}

impl From<RawSpoolError> for JobFailure {
    fn from(primary: RawSpoolError) -> Self {
        Self::new(primary)
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if !self.cleanup.is_empty() {
            write!(f, " (and {} cleanup failure(s):", self.cleanup.len())?;
            for err in &self.cleanup {
                write!(f, " {err};")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for JobFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RawSpoolError>;

/// Outcome of one raw print job.
pub type JobResult = std::result::Result<JobReport, JobFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display_includes_code() {
        assert_eq!(BackendError::new("offline").to_string(), "offline");
        assert_eq!(
            BackendError::with_code(5, "access denied").to_string(),
            "access denied (code 5)"
        );
    }

    #[test]
    fn stage_is_exposed_for_lifecycle_errors() {
        let err = RawSpoolError::Page {
            stage: JobStage::BeginPage,
            source: BackendError::new("x"),
        };
        assert_eq!(err.stage(), Some(JobStage::BeginPage));
        assert!(err.may_leave_partial_job());

        let err = RawSpoolError::NotFound {
            selector: "ZDesigner".into(),
        };
        assert_eq!(err.stage(), None);
        assert!(!err.may_leave_partial_job());
    }

    #[test]
    fn document_begin_failure_enqueues_nothing() {
        let err = RawSpoolError::Document {
            stage: JobStage::BeginDocument,
            source: BackendError::new("spooler stopped"),
        };
        assert!(!err.may_leave_partial_job());
    }

    #[test]
    fn failure_display_lists_cleanup_errors() {
        let failure = JobFailure {
            primary: RawSpoolError::Write {
                bytes_written: 12,
                source: BackendError::new("pipe closed"),
            },
            cleanup: vec![RawSpoolError::Cleanup {
                stage: JobStage::Close,
                source: BackendError::new("handle invalid"),
            }],
        };
        let text = failure.to_string();
        assert!(text.starts_with("write failed after 12 bytes: pipe closed"));
        assert!(text.contains("cleanup close failed: handle invalid"));
    }
}
