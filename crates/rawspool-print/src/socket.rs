// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP backend (JetDirect, port 9100).
//
// Printers come from configuration rather than the OS.  Opening a printer
// only resolves its address; the connection is made at begin-document and
// torn down at end-document, so one open printer can carry several
// documents.  There is no page concept on the wire.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use rawspool_core::config::SocketPrinter;
use rawspool_core::error::BackendError;
use rawspool_core::types::{DocumentInfo, PrinterFlags, PrinterRecord, SpoolJobId};

use crate::backend::{BackendResult, PrinterBackend, PrinterEnumerator, PrinterIo};

/// Write timeout on an established connection.
const WRITE_TIMEOUT_SECS: u64 = 60;

pub struct SocketBackend {
    printers: Vec<SocketPrinter>,
    connect_timeout: Duration,
}

impl SocketBackend {
    pub fn new(printers: Vec<SocketPrinter>, connect_timeout: Duration) -> Self {
        Self {
            printers,
            connect_timeout,
        }
    }
}

/// A resolved socket printer and, while a document is open, its connection.
#[derive(Debug)]
pub struct SocketConnection {
    name: String,
    addrs: Vec<SocketAddr>,
    stream: Option<TcpStream>,
}

impl SocketConnection {
    fn stream(&mut self) -> BackendResult<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| BackendError::new("no document is open"))
    }
}

impl PrinterBackend for SocketBackend {
    fn name(&self) -> &str {
        "socket"
    }
}

impl PrinterEnumerator for SocketBackend {
    fn enumerate_local(&self) -> BackendResult<Vec<PrinterRecord>> {
        Ok(self
            .printers
            .iter()
            .map(|p| PrinterRecord {
                flags: PrinterFlags::LOCAL | PrinterFlags::NETWORK | PrinterFlags::RAW_CAPABLE,
                description: p.description.clone(),
                name: p.name.clone(),
                comment: format!("{}:{}", p.host, p.port),
            })
            .collect())
    }
}

impl PrinterIo for SocketBackend {
    type Printer = SocketConnection;

    fn open(&self, name: &str) -> BackendResult<SocketConnection> {
        let printer = self
            .printers
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| BackendError::new(format!("invalid printer name {name}")))?;
        let addrs: Vec<SocketAddr> = (printer.host.as_str(), printer.port)
            .to_socket_addrs()
            .map_err(|e| {
                BackendError::new(format!("cannot resolve {}:{}: {e}", printer.host, printer.port))
            })?
            .collect();
        if addrs.is_empty() {
            return Err(BackendError::new(format!(
                "{} resolved to no addresses",
                printer.host
            )));
        }
        debug!(printer = name, ?addrs, "socket printer resolved");
        Ok(SocketConnection {
            name: name.to_owned(),
            addrs,
            stream: None,
        })
    }

    fn start_document(
        &self,
        printer: &mut SocketConnection,
        doc: &DocumentInfo,
    ) -> BackendResult<Option<SpoolJobId>> {
        if printer.stream.is_some() {
            return Err(BackendError::new("a document is already open"));
        }
        if doc.output_file.is_some() {
            return Err(BackendError::new(
                "the socket backend cannot redirect jobs to a file",
            ));
        }

        let mut last_error = None;
        for addr in &printer.addrs {
            match TcpStream::connect_timeout(addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(Duration::from_secs(WRITE_TIMEOUT_SECS)))?;
                    info!(printer = %printer.name, %addr, job = %doc.job_name, "raw TCP connected");
                    printer.stream = Some(stream);
                    return Ok(None);
                }
                Err(e) => {
                    debug!(%addr, error = %e, "raw TCP connect failed");
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) => BackendError::new(format!("connect to {}: {e}", printer.name)),
            None => BackendError::new(format!("{} has no addresses", printer.name)),
        })
    }

    fn start_page(&self, printer: &mut SocketConnection) -> BackendResult<()> {
        printer.stream().map(|_| ())
    }

    fn write(&self, printer: &mut SocketConnection, bytes: &[u8]) -> BackendResult<usize> {
        Ok(printer.stream()?.write(bytes)?)
    }

    fn end_page(&self, printer: &mut SocketConnection) -> BackendResult<()> {
        Ok(printer.stream()?.flush()?)
    }

    fn end_document(&self, printer: &mut SocketConnection) -> BackendResult<()> {
        let stream = printer.stream()?;
        stream.flush()?;
        stream.shutdown(Shutdown::Write)?;
        printer.stream = None;
        debug!(printer = %printer.name, "raw TCP document finished");
        Ok(())
    }

    fn close(&self, printer: SocketConnection) -> BackendResult<()> {
        // Dropping the connection releases it; there is nothing to report.
        drop(printer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{PrinterDirectory, Selector};
    use crate::job::RawPrintJob;
    use rawspool_core::error::RawSpoolError;
    use rawspool_core::types::JobStage;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn printer(name: &str, port: u16) -> SocketPrinter {
        SocketPrinter {
            name: name.into(),
            host: "127.0.0.1".into(),
            port,
            description: "test label printer".into(),
        }
    }

    /// Accept one connection and return everything written to it.
    fn capture_one() -> (u16, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = thread::spawn(move || {
            let (mut conn, _) = listener.accept().expect("accept");
            let mut received = Vec::new();
            conn.read_to_end(&mut received).expect("read");
            received
        });
        (port, handle)
    }

    #[test]
    fn lists_configured_printers_as_local() {
        let backend = SocketBackend::new(
            vec![printer("Front desk", 9100), printer("ZDesigner ZT410", 9101)],
            Duration::from_secs(1),
        );
        let listed = PrinterDirectory::new(&backend).list().expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|p| p.is_local));
        let records = backend.enumerate_local().expect("records");
        assert_eq!(records[1].comment, "127.0.0.1:9101");
    }

    #[test]
    fn streams_payload_over_tcp() {
        let (port, server) = capture_one();
        let backend = SocketBackend::new(
            vec![printer("Front desk", 1), printer("ZDesigner ZT410", port)],
            Duration::from_secs(2),
        );

        let target = PrinterDirectory::new(&backend)
            .resolve(&Selector::Contains("ZDesigner".into()))
            .expect("resolve");
        let payload = b"^XA^FO20,20^A0N,40,40^FDShip to: Dock 4^FS^XZ".repeat(300);
        let report = RawPrintJob::new(&backend, target, DocumentInfo::default())
            .chunk_size(1024)
            .submit(&payload)
            .expect("submit");

        assert_eq!(report.bytes_written, payload.len() as u64);
        assert_eq!(report.spool_job_id, None);
        assert_eq!(server.join().expect("server thread"), payload);
    }

    #[test]
    fn refused_connection_fails_at_begin_document() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let backend = SocketBackend::new(
            vec![printer("ZDesigner ZT410", port)],
            Duration::from_millis(500),
        );

        let failure = RawPrintJob::new(
            &backend,
            PrinterRecord::local("ZDesigner ZT410").descriptor(),
            DocumentInfo::default(),
        )
        .submit(b"^XA^XZ")
        .unwrap_err();

        assert!(matches!(
            failure.primary,
            RawSpoolError::Document {
                stage: JobStage::BeginDocument,
                ..
            }
        ));
        assert!(failure.cleanup.is_empty());
    }

    #[test]
    fn unconfigured_printer_fails_open() {
        let backend = SocketBackend::new(vec![printer("A", 9100)], Duration::from_secs(1));
        let err = backend.open("B").unwrap_err();
        assert!(err.message.contains("invalid printer name"));
    }
}
