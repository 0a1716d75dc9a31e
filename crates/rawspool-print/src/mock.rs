// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted in-memory backend with fault injection.
//
// Records every I/O call in order, counts open printer handles, and flags any
// call that breaks the begin/end pairing rules.  Used by the test suites and
// benchmarks; never selected by configuration.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rawspool_core::error::BackendError;
use rawspool_core::types::{DocumentInfo, JobStage, PrinterRecord, SpoolJobId};

use crate::backend::{BackendResult, PrinterBackend, PrinterEnumerator, PrinterIo};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    StartDocument(String),
    StartPage,
    Write(usize),
    EndPage,
    EndDocument,
    Close(String),
}

impl Call {
    pub fn stage(&self) -> JobStage {
        match self {
            Self::Open(_) => JobStage::Open,
            Self::StartDocument(_) => JobStage::BeginDocument,
            Self::StartPage => JobStage::BeginPage,
            Self::Write(_) => JobStage::Write,
            Self::EndPage => JobStage::EndPage,
            Self::EndDocument => JobStage::EndDocument,
            Self::Close(_) => JobStage::Close,
        }
    }
}

#[derive(Debug, Clone)]
struct Fault {
    error: BackendError,
    /// `None` fails every time.
    remaining: Option<u32>,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    faults: HashMap<JobStage, Fault>,
    enumeration_fault: Option<BackendError>,
    open_handles: usize,
    peak_open_handles: usize,
    open_by_printer: HashMap<String, usize>,
    max_concurrent_per_printer: usize,
    violations: Vec<String>,
    printed: Vec<(String, Vec<u8>)>,
    next_job_id: SpoolJobId,
}

/// An open scripted printer.
#[derive(Debug)]
pub struct ScriptedPrinter {
    name: String,
    document: Option<SpoolJobId>,
    page_open: bool,
    buffer: Vec<u8>,
}

/// In-memory printer backend.
#[derive(Default)]
pub struct ScriptedBackend {
    printers: Vec<PrinterRecord>,
    /// Upper bound on bytes accepted per write call.
    max_write: Option<usize>,
    /// Sleep inside every write call.
    write_delay: Option<Duration>,
    state: Mutex<State>,
}

impl ScriptedBackend {
    pub fn with_printers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_records(names.into_iter().map(PrinterRecord::local).collect())
    }

    pub fn with_records(printers: Vec<PrinterRecord>) -> Self {
        Self {
            printers,
            ..Default::default()
        }
    }

    /// Accept at most `n` bytes per write call.
    pub fn max_write(mut self, n: usize) -> Self {
        self.max_write = Some(n);
        self
    }

    /// Block for `delay` inside every write call.
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Make every call for `stage` fail.
    pub fn fail_at(&self, stage: JobStage) {
        self.set_fault(stage, None);
    }

    /// Make every release call for a reverse `stage` fail.
    pub fn fail_cleanup(&self, stage: JobStage) {
        debug_assert!(stage.is_cleanup(), "{stage} is not a release stage");
        self.set_fault(stage, None);
    }

    /// Make the next `times` calls for `stage` fail, then succeed again.
    pub fn fail_times(&self, stage: JobStage, times: u32) {
        self.set_fault(stage, Some(times));
    }

    pub fn fail_enumeration(&self, message: &str) {
        self.lock().enumeration_fault = Some(BackendError::new(message));
    }

    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.faults.clear();
        state.enumeration_fault = None;
    }

    /// Every I/O call so far, in order.
    pub fn io_calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Stages of every I/O call so far, in order.
    pub fn stages(&self) -> Vec<JobStage> {
        self.lock().calls.iter().map(Call::stage).collect()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Printers opened and not yet passed to `close`.
    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }

    /// Highest number of simultaneously open handles across all printers.
    pub fn peak_open_handles(&self) -> usize {
        self.lock().peak_open_handles
    }

    /// Highest number of simultaneously open handles seen on one printer.
    pub fn max_concurrent_per_printer(&self) -> usize {
        self.lock().max_concurrent_per_printer
    }

    /// Pairing-rule breaches, e.g. `end_page` without an open page.
    pub fn violations(&self) -> Vec<String> {
        self.lock().violations.clone()
    }

    /// `(printer, bytes)` of every document that reached `end_document`.
    pub fn printed(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().printed.clone()
    }

    fn set_fault(&self, stage: JobStage, remaining: Option<u32>) {
        let error = BackendError::with_code(
            31,
            format!("injected {stage} failure"),
        );
        self.lock()
            .faults
            .insert(stage, Fault { error, remaining });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and return the injected fault for its stage, if any.
    fn enter(&self, state: &mut State, call: Call) -> BackendResult<()> {
        let stage = call.stage();
        state.calls.push(call);
        let Some(fault) = state.faults.get_mut(&stage) else {
            return Ok(());
        };
        let error = fault.error.clone();
        match fault.remaining.as_mut() {
            None => Err(error),
            Some(0) => Ok(()),
            Some(n) => {
                *n -= 1;
                Err(error)
            }
        }
    }
}

impl PrinterBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }
}

impl PrinterEnumerator for ScriptedBackend {
    fn enumerate_local(&self) -> BackendResult<Vec<PrinterRecord>> {
        if let Some(err) = self.lock().enumeration_fault.clone() {
            return Err(err);
        }
        Ok(self.printers.clone())
    }
}

impl PrinterIo for ScriptedBackend {
    type Printer = ScriptedPrinter;

    fn open(&self, name: &str) -> BackendResult<ScriptedPrinter> {
        let mut state = self.lock();
        self.enter(&mut state, Call::Open(name.to_owned()))?;
        if !self.printers.iter().any(|p| p.name == name) {
            return Err(BackendError::with_code(1801, "invalid printer name"));
        }
        state.open_handles += 1;
        state.peak_open_handles = state.peak_open_handles.max(state.open_handles);
        let per_printer = state.open_by_printer.entry(name.to_owned()).or_default();
        *per_printer += 1;
        let current = *per_printer;
        state.max_concurrent_per_printer = state.max_concurrent_per_printer.max(current);
        Ok(ScriptedPrinter {
            name: name.to_owned(),
            document: None,
            page_open: false,
            buffer: Vec::new(),
        })
    }

    fn start_document(
        &self,
        printer: &mut ScriptedPrinter,
        doc: &DocumentInfo,
    ) -> BackendResult<Option<SpoolJobId>> {
        let mut state = self.lock();
        if printer.document.is_some() {
            state.violations.push("start_document while a document is open".into());
        }
        self.enter(&mut state, Call::StartDocument(doc.job_name.clone()))?;
        state.next_job_id += 1;
        let id = state.next_job_id;
        printer.document = Some(id);
        printer.buffer.clear();
        Ok(Some(id))
    }

    fn start_page(&self, printer: &mut ScriptedPrinter) -> BackendResult<()> {
        let mut state = self.lock();
        if printer.document.is_none() || printer.page_open {
            state.violations.push("start_page outside an open document".into());
        }
        self.enter(&mut state, Call::StartPage)?;
        printer.page_open = true;
        Ok(())
    }

    fn write(&self, printer: &mut ScriptedPrinter, bytes: &[u8]) -> BackendResult<usize> {
        if let Some(delay) = self.write_delay {
            std::thread::sleep(delay);
        }
        let mut state = self.lock();
        if !printer.page_open {
            state.violations.push("write without an open page".into());
        }
        self.enter(&mut state, Call::Write(bytes.len()))?;
        let accepted = self.max_write.map_or(bytes.len(), |max| bytes.len().min(max));
        printer.buffer.extend_from_slice(&bytes[..accepted]);
        Ok(accepted)
    }

    fn end_page(&self, printer: &mut ScriptedPrinter) -> BackendResult<()> {
        let mut state = self.lock();
        if !printer.page_open {
            state.violations.push("end_page without an open page".into());
        }
        printer.page_open = false;
        self.enter(&mut state, Call::EndPage)
    }

    fn end_document(&self, printer: &mut ScriptedPrinter) -> BackendResult<()> {
        let mut state = self.lock();
        if printer.document.is_none() {
            state.violations.push("end_document without an open document".into());
        }
        if printer.page_open {
            state.violations.push("end_document with a page still open".into());
        }
        printer.document = None;
        self.enter(&mut state, Call::EndDocument)?;
        let bytes = std::mem::take(&mut printer.buffer);
        state.printed.push((printer.name.clone(), bytes));
        Ok(())
    }

    fn close(&self, printer: ScriptedPrinter) -> BackendResult<()> {
        let mut state = self.lock();
        if printer.document.is_some() {
            state.violations.push("close with a document still open".into());
        }
        // The handle is consumed whether or not close reports an error.
        state.open_handles = state.open_handles.saturating_sub(1);
        if let Some(count) = state.open_by_printer.get_mut(&printer.name) {
            *count = count.saturating_sub(1);
        }
        self.enter(&mut state, Call::Close(printer.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_times_recovers() {
        let backend = ScriptedBackend::with_printers(["P"]);
        backend.fail_times(JobStage::Open, 1);
        assert!(backend.open("P").is_err());
        let printer = backend.open("P").expect("second open succeeds");
        backend.close(printer).expect("close");
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn unknown_printer_cannot_be_opened() {
        let backend = ScriptedBackend::with_printers(["P"]);
        assert!(backend.open("Q").is_err());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn pairing_breaches_are_recorded() {
        let backend = ScriptedBackend::with_printers(["P"]);
        let mut printer = backend.open("P").expect("open");
        backend.end_page(&mut printer).expect("end page");
        assert_eq!(backend.violations().len(), 1);
        backend.close(printer).expect("close");
    }
}
