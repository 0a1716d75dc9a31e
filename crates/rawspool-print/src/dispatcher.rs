// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async front-end for raw print jobs.
//
// Backend calls block, so every job runs on tokio's blocking pool.  Jobs for
// the same printer are serialised by a per-printer lock; jobs for different
// printers run side by side.  A timeout covers the whole call, including the
// wait for the printer lock.  It only stops the caller from waiting: a job
// that already started cannot be cancelled mid-flight, keeps its printer
// lock, and runs its full cleanup chain on the blocking thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use rawspool_core::error::{JobFailure, JobResult, RawSpoolError, Result};
use rawspool_core::types::{DocumentInfo, PrinterDescriptor, PrinterRecord};

use crate::backend::PrinterBackend;
use crate::directory::{PrinterDirectory, Selector};
use crate::job::{DEFAULT_CHUNK_SIZE, RawPrintJob};

/// How jobs the caller stopped waiting for eventually ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbandonedJobs {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct AbandonedCounters {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// Shared dispatcher; clone the `Arc` it lives in to submit from many tasks.
pub struct Dispatcher<B: PrinterBackend + 'static> {
    backend: Arc<B>,
    /// One lock per printer name, created on first use.
    printer_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    chunk_size: usize,
    timeout: Option<Duration>,
    abandoned: Arc<AbandonedCounters>,
}

impl<B: PrinterBackend + 'static> Dispatcher<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            printer_locks: Mutex::new(HashMap::new()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: None,
            abandoned: Arc::default(),
        }
    }

    /// Stop waiting for a job after `timeout`, lock wait included.  Cleanup
    /// still completes.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Outcomes of timed-out jobs that have since finished.
    pub fn abandoned_jobs(&self) -> AbandonedJobs {
        AbandonedJobs {
            completed: self.abandoned.completed.load(Ordering::Acquire),
            failed: self.abandoned.failed.load(Ordering::Acquire),
        }
    }

    /// Enumerate printers on the blocking pool.
    pub async fn records(&self) -> Result<Vec<PrinterRecord>> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || PrinterDirectory::new(backend.as_ref()).records())
            .await
            .map_err(|e| RawSpoolError::TaskAborted(format!("enumeration task: {e}")))?
    }

    /// Resolve `selector` on the blocking pool.
    pub async fn resolve(&self, selector: Selector) -> Result<PrinterDescriptor> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || PrinterDirectory::new(backend.as_ref()).resolve(&selector))
            .await
            .map_err(|e| RawSpoolError::TaskAborted(format!("enumeration task: {e}")))?
    }

    /// Run one raw print job, waiting for any earlier job on the same printer.
    pub async fn submit(
        &self,
        descriptor: PrinterDescriptor,
        payload: Vec<u8>,
        doc: DocumentInfo,
    ) -> JobResult {
        let deadline = self.timeout.map(|after| (after, Instant::now() + after));

        let printer_lock = self.printer_lock(&descriptor.name).lock_owned();
        let guard = match deadline {
            Some((after, at)) => match tokio::time::timeout_at(at, printer_lock).await {
                Ok(guard) => guard,
                Err(_) => {
                    warn!(printer = %descriptor.name, ?after, "timed out waiting for the printer");
                    return Err(JobFailure::new(RawSpoolError::TimedOut { after }));
                }
            },
            None => printer_lock.await,
        };
        debug!(printer = %descriptor.name, backend = self.backend.name(), "printer lock acquired");

        let backend = Arc::clone(&self.backend);
        let chunk_size = self.chunk_size;
        let gave_up = Arc::new(AtomicBool::new(false));
        let caller_gave_up = Arc::clone(&gave_up);
        let abandoned = Arc::clone(&self.abandoned);
        let task = tokio::task::spawn_blocking(move || {
            // Released only after close has run.
            let _guard = guard;
            let printer = descriptor.name.clone();
            let result = RawPrintJob::new(backend.as_ref(), descriptor, doc)
                .chunk_size(chunk_size)
                .submit(&payload);
            if caller_gave_up.load(Ordering::Acquire) {
                record_abandoned(&abandoned, &printer, &result);
            }
            result
        });

        let joined = match deadline {
            Some((after, at)) => match tokio::time::timeout_at(at, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    gave_up.store(true, Ordering::Release);
                    warn!(?after, "print job timed out; cleanup continues in the background");
                    return Err(JobFailure::new(RawSpoolError::TimedOut { after }));
                }
            },
            None => task.await,
        };

        joined.map_err(|e| JobFailure::new(RawSpoolError::TaskAborted(format!("print task: {e}"))))?
    }

    fn printer_lock(&self, printer: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .printer_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(printer.to_owned()).or_default())
    }
}

fn record_abandoned(counters: &AbandonedCounters, printer: &str, result: &JobResult) {
    match result {
        Ok(report) => {
            counters.completed.fetch_add(1, Ordering::AcqRel);
            info!(
                printer,
                bytes = report.bytes_written,
                spool_job_id = ?report.spool_job_id,
                "timed-out job finished after the caller stopped waiting"
            );
        }
        Err(failure) => {
            counters.failed.fetch_add(1, Ordering::AcqRel);
            warn!(printer, error = %failure, "timed-out job failed after the caller stopped waiting");
        }
    }
}
