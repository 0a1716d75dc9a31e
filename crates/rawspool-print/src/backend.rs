// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the spooler.
//
// Enumeration and job I/O are separate capabilities: the printer directory
// only ever needs the former, the raw print job only the latter.

use rawspool_core::error::BackendError;
use rawspool_core::types::{DocumentInfo, PrinterRecord, SpoolJobId};

/// Result of a single backend call.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Unified backend grouping every spooler capability the crate uses.
pub trait PrinterBackend: PrinterEnumerator + PrinterIo + Send + Sync {
    /// Short backend name for logs (e.g. "cups", "socket").
    fn name(&self) -> &str;
}

/// Query-only access to the installed printers.
pub trait PrinterEnumerator {
    /// Snapshot of local printers in OS-defined order.
    fn enumerate_local(&self) -> BackendResult<Vec<PrinterRecord>>;
}

/// Blocking document I/O against one open printer.
///
/// `Printer` is the open OS resource.  `close` consumes it, so a released
/// printer cannot be touched again.  Callers pair every successful `start_*`
/// with its `end_*` and every successful `open` with `close`.
pub trait PrinterIo {
    type Printer: Send;

    fn open(&self, name: &str) -> BackendResult<Self::Printer>;

    fn start_document(
        &self,
        printer: &mut Self::Printer,
        doc: &DocumentInfo,
    ) -> BackendResult<Option<SpoolJobId>>;

    fn start_page(&self, printer: &mut Self::Printer) -> BackendResult<()>;

    /// Hand bytes to the spooler.  Returns how many were accepted, which may
    /// be fewer than offered.
    fn write(&self, printer: &mut Self::Printer, bytes: &[u8]) -> BackendResult<usize>;

    fn end_page(&self, printer: &mut Self::Printer) -> BackendResult<()>;

    fn end_document(&self, printer: &mut Self::Printer) -> BackendResult<()>;

    fn close(&self, printer: Self::Printer) -> BackendResult<()>;

    /// Job number learned after `start_document`, for spoolers that only
    /// report it once the document is complete.
    fn spool_job_id(&self, _printer: &Self::Printer) -> Option<SpoolJobId> {
        None
    }
}
