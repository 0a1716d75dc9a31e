// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing error messages and process exit codes.
//
// Every technical error maps to a one-line summary plus a concrete next step
// for whoever is standing at the label printer.

use crate::error::{BackendError, JobFailure, RawSpoolError};
use crate::types::JobStage;

/// Job completed.
pub const EXIT_SUCCESS: i32 = 0;
/// Bad arguments, unreadable config, or backend not usable on this host.
pub const EXIT_USAGE: i32 = 1;
/// No local printer matched the selector.
pub const EXIT_NOT_FOUND: i32 = 2;
/// The job failed after the spooler accepted the document; it may hold a
/// partial job.
pub const EXIT_JOB_FAILED: i32 = 3;
/// The caller-level timeout elapsed before the job finished.
pub const EXIT_TIMED_OUT: i32 = 4;
/// Open or begin-document failed; nothing was enqueued and running again is
/// safe.
pub const EXIT_NOT_SENT: i32 = 5;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Busy or briefly unreachable; trying again may work.
    Transient,
    /// Operator must do something, such as powering the printer on.
    ActionRequired,
    /// Retrying will not help without changing the request.
    Permanent,
}

/// A human-readable error with a plain summary and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    /// Whether re-running the same command may succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `RawSpoolError` into something an operator can act on.
pub fn humanize_error(err: &RawSpoolError) -> HumanError {
    match err {
        RawSpoolError::NotFound { selector } => HumanError {
            message: format!("No installed printer matches {selector}."),
            suggestion: "Check the printer is installed on this machine (`rawspool list`), or pass a more accurate --printer selector.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        RawSpoolError::Enumeration(detail) => HumanError {
            message: "The list of installed printers could not be read.".into(),
            suggestion: format!("Make sure the print spooler service is running. ({detail})"),
            retriable: true,
            severity: Severity::Transient,
        },

        RawSpoolError::Open { printer, source } => humanize_open(printer, source),

        RawSpoolError::Document { stage, source } => HumanError {
            message: format!("The spooler refused the print job ({stage})."),
            suggestion: format!(
                "Check the print queue is enabled and accepting jobs, then try again. ({source})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        RawSpoolError::Page { stage, source } => HumanError {
            message: format!("The printer rejected the page ({stage})."),
            suggestion: format!(
                "A partial job may be sitting in the queue; cancel it before retrying. ({source})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        RawSpoolError::Write {
            bytes_written,
            source,
        } => HumanError {
            message: format!("Sending label data stopped after {bytes_written} bytes."),
            suggestion: format!(
                "Check the printer is on and connected. A partial job may need cancelling in the queue. ({source})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        RawSpoolError::Cleanup { stage, source } => HumanError {
            message: format!("The printer connection was not released cleanly ({stage})."),
            suggestion: format!(
                "The label data may still have printed. Check the queue for a stuck job. ({source})"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        RawSpoolError::TimedOut { after } => HumanError {
            message: format!("The printer did not finish within {}s.", after.as_secs()),
            suggestion: "The job is still being cleaned up in the background. Check the printer is awake before trying again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        RawSpoolError::Config(detail) => HumanError {
            message: "The rawspool configuration is invalid.".into(),
            suggestion: format!("Fix the config file and run the command again. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        RawSpoolError::BackendUnavailable(detail) => HumanError {
            message: "The selected printer backend is not available on this machine.".into(),
            suggestion: format!("Install the printing tools or choose another --backend. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        RawSpoolError::TaskAborted(detail) => HumanError {
            message: "The print job stopped unexpectedly.".into(),
            suggestion: format!("Check the print queue for a stuck job, then try again. ({detail})"),
            retriable: true,
            severity: Severity::Transient,
        },

        RawSpoolError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The label file couldn't be found.".into(),
                    suggestion: "Check the path and try again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Permission denied while reading the label file.".into(),
                    suggestion: "Check the file permissions.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading a file.".into(),
                    suggestion: format!("Try again. ({io_err})"),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        RawSpoolError::Serialization(detail) => HumanError {
            message: "The config file is not valid JSON.".into(),
            suggestion: format!("Fix the syntax error and try again. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

/// Opening is where most physical problems show up first.
fn humanize_open(printer: &str, source: &BackendError) -> HumanError {
    let lower = source.message.to_ascii_lowercase();

    if lower.contains("permission") || lower.contains("access denied") || lower.contains("forbidden") {
        HumanError {
            message: format!("Not allowed to print to {printer}."),
            suggestion: "Ask an administrator to grant this account access to the printer.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("offline") || lower.contains("refused") || lower.contains("unreachable") {
        HumanError {
            message: format!("{printer} is offline."),
            suggestion: "Turn the printer on and check its cable or network connection, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else {
        HumanError {
            message: format!("{printer} could not be opened."),
            suggestion: format!("Check the printer driver is installed correctly. (Detail: {source})"),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}

/// Process exit code for a failure outside the job itself.
pub fn exit_code(err: &RawSpoolError) -> i32 {
    match err {
        RawSpoolError::NotFound { .. } => EXIT_NOT_FOUND,
        RawSpoolError::TimedOut { .. } => EXIT_TIMED_OUT,
        RawSpoolError::Open { .. }
        | RawSpoolError::Document {
            stage: JobStage::BeginDocument,
            ..
        } => EXIT_NOT_SENT,
        RawSpoolError::Document { .. }
        | RawSpoolError::Page { .. }
        | RawSpoolError::Write { .. }
        | RawSpoolError::Cleanup { .. }
        | RawSpoolError::TaskAborted(_) => EXIT_JOB_FAILED,
        RawSpoolError::Enumeration(_)
        | RawSpoolError::Config(_)
        | RawSpoolError::BackendUnavailable(_)
        | RawSpoolError::Io(_)
        | RawSpoolError::Serialization(_) => EXIT_USAGE,
    }
}

/// Process exit code for a failed job; follows the primary error.
pub fn job_exit_code(failure: &JobFailure) -> i32 {
    exit_code(&failure.primary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn not_found_is_action_required() {
        let err = RawSpoolError::NotFound {
            selector: "contains \"ZDesigner\"".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
        assert_eq!(exit_code(&err), EXIT_NOT_FOUND);
    }

    #[test]
    fn access_denied_on_open_needs_an_admin() {
        let err = RawSpoolError::Open {
            printer: "ZDesigner GK420t".into(),
            source: BackendError::with_code(5, "Access denied"),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert_eq!(exit_code(&err), EXIT_NOT_SENT);
    }

    #[test]
    fn nothing_enqueued_is_told_apart_from_a_partial_job() {
        let begin = RawSpoolError::Document {
            stage: JobStage::BeginDocument,
            source: BackendError::new("spooler busy"),
        };
        assert!(!begin.may_leave_partial_job());
        assert_eq!(exit_code(&begin), EXIT_NOT_SENT);

        let end = RawSpoolError::Document {
            stage: JobStage::EndDocument,
            source: BackendError::new("lp: exit status 1"),
        };
        assert!(end.may_leave_partial_job());
        assert_eq!(exit_code(&end), EXIT_JOB_FAILED);

        let write = RawSpoolError::Write {
            bytes_written: 512,
            source: BackendError::new("broken pipe"),
        };
        assert_eq!(exit_code(&write), EXIT_JOB_FAILED);
    }

    #[test]
    fn offline_printer_is_transient() {
        let err = RawSpoolError::Open {
            printer: "ZDesigner GK420t".into(),
            source: BackendError::new("connection refused"),
        };
        assert_eq!(humanize_error(&err).severity, Severity::Transient);
    }

    #[test]
    fn cleanup_failure_points_at_the_queue() {
        let err = RawSpoolError::Cleanup {
            stage: JobStage::Close,
            source: BackendError::new("invalid handle"),
        };
        let human = humanize_error(&err);
        assert!(human.suggestion.contains("queue"));
        assert!(!human.retriable);
    }

    #[test]
    fn timeout_has_its_own_exit_code() {
        let err = RawSpoolError::TimedOut {
            after: Duration::from_secs(30),
        };
        assert_eq!(exit_code(&err), EXIT_TIMED_OUT);
        assert!(humanize_error(&err).message.contains("30s"));
    }

    #[test]
    fn job_exit_code_follows_primary() {
        let failure = JobFailure {
            primary: RawSpoolError::Page {
                stage: JobStage::BeginPage,
                source: BackendError::new("x"),
            },
            cleanup: vec![RawSpoolError::Cleanup {
                stage: JobStage::Close,
                source: BackendError::new("y"),
            }],
        };
        assert_eq!(job_exit_code(&failure), EXIT_JOB_FAILED);
    }
}
