// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw print job: one document, one page, verbatim bytes.
//
//   CLOSED -open-> OPEN -beginDoc-> DOC_OPEN -beginPage-> PAGE_OPEN
//     -write-> PAGE_OPEN -endPage-> DOC_OPEN -endDoc-> OPEN -close-> CLOSED
//
// Every acquired resource is pushed onto a cleanup ledger.  Whatever happens
// on the forward path, the ledger is unwound LIFO and each release runs
// exactly once.  The first failure is the primary error; releases that fail
// after it are attached as cleanup errors and never replace it.
//
// Known partial-failure outcome: once begin-document has succeeded, a failure
// in a later stage can leave a partial or empty job in the spooler.

use std::fmt;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use rawspool_core::error::{BackendError, JobFailure, JobResult, RawSpoolError};
use rawspool_core::types::{
    DocumentInfo, JobId, JobReport, JobStage, PrinterDescriptor, SpoolJobId,
};

use crate::backend::{BackendResult, PrinterIo};

/// Default number of bytes handed to the backend per write call.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Position in the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Closed,
    Open,
    DocOpen,
    PageOpen,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::DocOpen => "DOC_OPEN",
            Self::PageOpen => "PAGE_OPEN",
        })
    }
}

/// A resource whose release the job owes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Acquired {
    Printer,
    Document,
    Page,
}

impl Acquired {
    fn release_stage(self) -> JobStage {
        match self {
            Self::Printer => JobStage::Close,
            Self::Document => JobStage::EndDocument,
            Self::Page => JobStage::EndPage,
        }
    }
}

/// Acquired resources in acquisition order.  The printer is always at the
/// bottom, so it is always released last.
#[derive(Debug)]
struct CleanupLedger {
    acquired: Vec<Acquired>,
}

impl CleanupLedger {
    fn opened() -> Self {
        Self {
            acquired: vec![Acquired::Printer],
        }
    }

    fn push(&mut self, resource: Acquired) {
        self.acquired.push(resource);
    }

    fn pop(&mut self) -> Option<Acquired> {
        self.acquired.pop()
    }

    fn state(&self) -> JobState {
        match self.acquired.last() {
            None => JobState::Closed,
            Some(Acquired::Printer) => JobState::Open,
            Some(Acquired::Document) => JobState::DocOpen,
            Some(Acquired::Page) => JobState::PageOpen,
        }
    }
}

/// Forward-path bookkeeping that ends up in the report or the error.
#[derive(Debug, Default)]
struct Progress {
    spool_job_id: Option<SpoolJobId>,
    bytes_written: u64,
}

/// Errors collected while the ledger unwinds.
#[derive(Debug, Default)]
struct Unwind {
    primary: Option<RawSpoolError>,
    cleanup: Vec<RawSpoolError>,
}

impl Unwind {
    fn record(&mut self, stage: JobStage, result: BackendResult<()>) {
        let Err(source) = result else {
            debug!(%stage, "released");
            return;
        };
        if self.primary.is_some() {
            warn!(%stage, error = %source, "cleanup failed after an earlier error");
            self.cleanup.push(RawSpoolError::Cleanup { stage, source });
        } else {
            warn!(%stage, error = %source, "release failed");
            self.primary = Some(release_error(stage, source));
        }
    }

    fn into_failure(self) -> Option<JobFailure> {
        self.primary.map(|primary| JobFailure {
            primary,
            cleanup: self.cleanup,
        })
    }
}

/// A release failing on an otherwise clean path is that stage's own error.
fn release_error(stage: JobStage, source: BackendError) -> RawSpoolError {
    match stage {
        JobStage::EndPage => RawSpoolError::Page { stage, source },
        JobStage::EndDocument => RawSpoolError::Document { stage, source },
        _ => RawSpoolError::Cleanup { stage, source },
    }
}

/// One raw document bound for one resolved printer.
pub struct RawPrintJob<'a, B: PrinterIo + ?Sized> {
    backend: &'a B,
    descriptor: PrinterDescriptor,
    doc: DocumentInfo,
    chunk_size: usize,
}

impl<'a, B: PrinterIo + ?Sized> RawPrintJob<'a, B> {
    pub fn new(backend: &'a B, descriptor: PrinterDescriptor, doc: DocumentInfo) -> Self {
        Self {
            backend,
            descriptor,
            doc,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Bytes offered to the backend per write call (minimum 1).
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn descriptor(&self) -> &PrinterDescriptor {
        &self.descriptor
    }

    /// Run the whole lifecycle once.  No retries; the caller decides.
    #[instrument(skip_all, fields(printer = %self.descriptor.name, job = %self.doc.job_name, bytes = payload.len()))]
    pub fn submit(&self, payload: &[u8]) -> JobResult {
        let job_id = JobId::new();
        let started_at = Utc::now();
        let payload_sha256 = hex::encode(Sha256::digest(payload));

        let mut printer = self.backend.open(&self.descriptor.name).map_err(|source| {
            warn!(error = %source, "open failed");
            JobFailure::new(RawSpoolError::Open {
                printer: self.descriptor.name.clone(),
                source,
            })
        })?;
        let mut ledger = CleanupLedger::opened();
        debug!(%job_id, state = %ledger.state(), "printer opened");

        let mut progress = Progress::default();
        let mut outcome = Unwind::default();
        if let Err(err) = self.forward(&mut printer, &mut ledger, payload, &mut progress) {
            warn!(state = %ledger.state(), error = %err, "job failed, unwinding");
            outcome.primary = Some(err);
        }
        self.unwind(printer, ledger, &mut progress, &mut outcome);

        if let Some(failure) = outcome.into_failure() {
            if failure.primary.may_leave_partial_job() {
                warn!(
                    bytes_written = progress.bytes_written,
                    "spooler may hold a partial job"
                );
            }
            return Err(failure);
        }

        info!(
            %job_id,
            spool_job_id = ?progress.spool_job_id,
            bytes = progress.bytes_written,
            "raw print job sent successfully"
        );
        Ok(JobReport {
            job_id,
            printer: self.descriptor.name.clone(),
            job_name: self.doc.job_name.clone(),
            spool_job_id: progress.spool_job_id,
            bytes_written: progress.bytes_written,
            payload_sha256,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// OPEN → PAGE_OPEN plus the payload.  Returns at the first failure,
    /// leaving everything acquired so far on the ledger.
    fn forward(
        &self,
        printer: &mut B::Printer,
        ledger: &mut CleanupLedger,
        payload: &[u8],
        progress: &mut Progress,
    ) -> Result<(), RawSpoolError> {
        progress.spool_job_id = self
            .backend
            .start_document(printer, &self.doc)
            .map_err(|source| RawSpoolError::Document {
                stage: JobStage::BeginDocument,
                source,
            })?;
        ledger.push(Acquired::Document);
        debug!(state = %ledger.state(), spool_job_id = ?progress.spool_job_id, "document started");

        self.backend
            .start_page(printer)
            .map_err(|source| RawSpoolError::Page {
                stage: JobStage::BeginPage,
                source,
            })?;
        ledger.push(Acquired::Page);
        debug!(state = %ledger.state(), "page started");

        self.write_payload(printer, payload, progress)
    }

    fn write_payload(
        &self,
        printer: &mut B::Printer,
        payload: &[u8],
        progress: &mut Progress,
    ) -> Result<(), RawSpoolError> {
        for chunk in payload.chunks(self.chunk_size) {
            let mut rest = chunk;
            while !rest.is_empty() {
                let accepted = self.backend.write(printer, rest).map_err(|source| {
                    RawSpoolError::Write {
                        bytes_written: progress.bytes_written,
                        source,
                    }
                })?;
                if accepted == 0 {
                    return Err(RawSpoolError::Write {
                        bytes_written: progress.bytes_written,
                        source: BackendError::new("printer accepted no bytes"),
                    });
                }
                let accepted = accepted.min(rest.len());
                rest = &rest[accepted..];
                progress.bytes_written += accepted as u64;
            }
            debug!(
                sent = progress.bytes_written,
                total = payload.len(),
                "raw write progress"
            );
        }
        Ok(())
    }

    /// Release everything on the ledger, newest first.
    fn unwind(
        &self,
        mut printer: B::Printer,
        mut ledger: CleanupLedger,
        progress: &mut Progress,
        outcome: &mut Unwind,
    ) {
        while let Some(resource) = ledger.pop() {
            let stage = resource.release_stage();
            let result = match resource {
                Acquired::Page => self.backend.end_page(&mut printer),
                Acquired::Document => self.backend.end_document(&mut printer),
                Acquired::Printer => {
                    if progress.spool_job_id.is_none() {
                        progress.spool_job_id = self.backend.spool_job_id(&printer);
                    }
                    outcome.record(stage, self.backend.close(printer));
                    debug!(state = %ledger.state(), "printer closed");
                    return;
                }
            };
            outcome.record(stage, result);
        }
    }
}

/// Send `payload` to `descriptor` as a raw document named `job_name`.
pub fn submit<B: PrinterIo + ?Sized>(
    backend: &B,
    descriptor: &PrinterDescriptor,
    payload: &[u8],
    job_name: &str,
) -> JobResult {
    RawPrintJob::new(backend, descriptor.clone(), DocumentInfo::raw(job_name)).submit(payload)
}
