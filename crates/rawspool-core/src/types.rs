// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for raw print dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Datatype passed to "begin document" when the payload must bypass the
/// driver entirely.
pub const RAW_DATATYPE: &str = "RAW";

/// Job name used when the caller does not supply one.
pub const DEFAULT_JOB_NAME: &str = "ZPLII data from ArcMap";

/// Unique identifier for one `submit` call, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier the spooler assigned to a document (the OS job number).
pub type SpoolJobId = u32;

/// Attribute bits reported by printer enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PrinterFlags(pub u32);

impl PrinterFlags {
    pub const NONE: Self = Self(0);
    /// Queue is installed on this host.
    pub const LOCAL: Self = Self(1 << 0);
    /// Queue forwards to a network device.
    pub const NETWORK: Self = Self(1 << 1);
    /// Queue is shared with other hosts.
    pub const SHARED: Self = Self(1 << 2);
    /// Queue accepts pre-formatted data without driver rendering.
    pub const RAW_CAPABLE: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_local(self) -> bool {
        self.contains(Self::LOCAL)
    }
}

impl std::ops::BitOr for PrinterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One record as returned by the printer enumeration capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterRecord {
    pub flags: PrinterFlags,
    pub description: String,
    pub name: String,
    pub comment: String,
}

impl PrinterRecord {
    /// A local record with empty description and comment.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            flags: PrinterFlags::LOCAL | PrinterFlags::RAW_CAPABLE,
            description: String::new(),
            name: name.into(),
            comment: String::new(),
        }
    }

    pub fn descriptor(&self) -> PrinterDescriptor {
        PrinterDescriptor {
            name: self.name.clone(),
            is_local: self.flags.is_local(),
        }
    }
}

/// A resolved printer, ready to be handed to a raw print job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrinterDescriptor {
    pub name: String,
    pub is_local: bool,
}

impl std::fmt::Display for PrinterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Parameters of the "begin document" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub job_name: String,
    /// Spooler datatype; `RAW` sends the payload verbatim.
    pub datatype: String,
    /// Redirect the job to a file instead of the device, if the backend supports it.
    pub output_file: Option<String>,
}

impl DocumentInfo {
    pub fn raw(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            datatype: RAW_DATATYPE.to_owned(),
            output_file: None,
        }
    }
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self::raw(DEFAULT_JOB_NAME)
    }
}

/// Transitions of the raw print job state machine, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStage {
    Open,
    BeginDocument,
    BeginPage,
    Write,
    EndPage,
    EndDocument,
    Close,
}

impl JobStage {
    /// Every stage in the order a successful job walks them.
    pub const ALL: [JobStage; 7] = [
        JobStage::Open,
        JobStage::BeginDocument,
        JobStage::BeginPage,
        JobStage::Write,
        JobStage::EndPage,
        JobStage::EndDocument,
        JobStage::Close,
    ];

    /// Whether this stage releases a previously acquired resource.
    pub fn is_cleanup(self) -> bool {
        matches!(self, Self::EndPage | Self::EndDocument | Self::Close)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::BeginDocument => "begin-document",
            Self::BeginPage => "begin-page",
            Self::Write => "write",
            Self::EndPage => "end-page",
            Self::EndDocument => "end-document",
            Self::Close => "close",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of errors for caller-side retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Busy or briefly unreachable printer; safe to retry.
    Transient,
    /// Operator must act first, e.g. install the printer.
    UserAction,
    /// Retrying cannot help.
    Permanent,
}

/// Outcome of a successful raw print job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub printer: String,
    pub job_name: String,
    /// Spooler job number, when the backend reports one.
    pub spool_job_id: Option<SpoolJobId>,
    pub bytes_written: u64,
    /// SHA-256 of the payload, hex encoded.
    pub payload_sha256: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
