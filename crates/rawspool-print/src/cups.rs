// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS backend driven through the `lpstat` and `lp` command-line tools.
//
// Enumeration lists local destinations with `lpstat -e`.  A document is one
// `lp -d <dest> -t <job> -o raw` process: begin-document spawns it, writes go
// to its stdin, end-document closes stdin and waits for the request id.  CUPS
// has no page concept for raw jobs, so page transitions only check that a
// document is open.

use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use rawspool_core::error::{BackendError, RawSpoolError, Result};
use rawspool_core::types::{
    DocumentInfo, PrinterFlags, PrinterRecord, RAW_DATATYPE, SpoolJobId,
};

use crate::backend::{BackendResult, PrinterBackend, PrinterEnumerator, PrinterIo};

/// MIME type CUPS passes through without filtering.
const CUPS_RAW_MIME: &str = "application/vnd.cups-raw";

/// CUPS backend.  Stateless; each open printer carries its own `lp` child.
#[derive(Debug, Clone)]
pub struct CupsBackend {
    lpstat: PathBuf,
    lp: PathBuf,
}

impl Default for CupsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CupsBackend {
    pub fn new() -> Self {
        Self::with_commands("lpstat", "lp")
    }

    /// Use specific `lpstat` / `lp` executables.
    pub fn with_commands(lpstat: impl Into<PathBuf>, lp: impl Into<PathBuf>) -> Self {
        Self {
            lpstat: lpstat.into(),
            lp: lp.into(),
        }
    }

    /// Check that the CUPS tools exist and the scheduler is running.
    pub fn ensure_available(&self) -> Result<()> {
        let output = Command::new(&self.lpstat)
            .arg("-r")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| RawSpoolError::BackendUnavailable(spawn_error(&self.lpstat, e).message))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.contains("scheduler is running") {
            return Err(RawSpoolError::BackendUnavailable(
                "the CUPS scheduler is not running".into(),
            ));
        }
        Ok(())
    }

    fn destinations(&self) -> BackendResult<Vec<String>> {
        let output = Command::new(&self.lpstat)
            .arg("-e")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.lpstat, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // lpstat exits non-zero when nothing is installed.
            if stderr.contains("No destinations added") {
                return Ok(Vec::new());
            }
            return Err(exit_error("lpstat", output.status.code(), &stderr));
        }

        Ok(parse_destinations(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// An open CUPS destination, with the `lp` process of its current document.
#[derive(Debug)]
pub struct CupsPrinter {
    name: String,
    lp: Option<Child>,
    request_id: Option<SpoolJobId>,
}

impl PrinterBackend for CupsBackend {
    fn name(&self) -> &str {
        "cups"
    }
}

impl PrinterEnumerator for CupsBackend {
    fn enumerate_local(&self) -> BackendResult<Vec<PrinterRecord>> {
        Ok(self
            .destinations()?
            .into_iter()
            .map(|name| PrinterRecord {
                flags: PrinterFlags::LOCAL | PrinterFlags::RAW_CAPABLE,
                description: String::new(),
                name,
                comment: String::new(),
            })
            .collect())
    }
}

impl PrinterIo for CupsBackend {
    type Printer = CupsPrinter;

    fn open(&self, name: &str) -> BackendResult<CupsPrinter> {
        if !self.destinations()?.iter().any(|d| d == name) {
            return Err(BackendError::new(format!("unknown destination {name}")));
        }
        debug!(printer = name, "CUPS destination opened");
        Ok(CupsPrinter {
            name: name.to_owned(),
            lp: None,
            request_id: None,
        })
    }

    fn start_document(
        &self,
        printer: &mut CupsPrinter,
        doc: &DocumentInfo,
    ) -> BackendResult<Option<SpoolJobId>> {
        if printer.lp.is_some() {
            return Err(BackendError::new("a document is already open"));
        }
        if doc.output_file.is_some() {
            return Err(BackendError::new(
                "the CUPS backend cannot redirect jobs to a file",
            ));
        }

        let format = lp_format_option(&doc.datatype)?;

        let mut command = Command::new(&self.lp);
        command
            .args(["-d", printer.name.as_str(), "-t", doc.job_name.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if doc.datatype.eq_ignore_ascii_case(RAW_DATATYPE) {
            command.args(["-o", "raw"]);
        }
        command.arg("-o").arg(format);

        let child = command.spawn().map_err(|e| spawn_error(&self.lp, e))?;
        debug!(printer = %printer.name, pid = child.id(), "lp started");
        printer.lp = Some(child);
        printer.request_id = None;
        Ok(None)
    }

    fn start_page(&self, printer: &mut CupsPrinter) -> BackendResult<()> {
        require_document(printer).map(|_| ())
    }

    fn write(&self, printer: &mut CupsPrinter, bytes: &[u8]) -> BackendResult<usize> {
        let stdin = require_document(printer)?
            .stdin
            .as_mut()
            .ok_or_else(|| BackendError::new("lp stdin already closed"))?;
        Ok(stdin.write(bytes)?)
    }

    fn end_page(&self, printer: &mut CupsPrinter) -> BackendResult<()> {
        if let Some(stdin) = require_document(printer)?.stdin.as_mut() {
            stdin.flush()?;
        }
        Ok(())
    }

    fn end_document(&self, printer: &mut CupsPrinter) -> BackendResult<()> {
        let mut child = printer
            .lp
            .take()
            .ok_or_else(|| BackendError::new("no document is open"))?;
        // Closing stdin is what tells lp the document is complete.
        drop(child.stdin.take());
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(exit_error("lp", output.status.code(), &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        printer.request_id = parse_request_id(&stdout);
        info!(printer = %printer.name, request_id = ?printer.request_id, "CUPS accepted the job");
        Ok(())
    }

    fn close(&self, mut printer: CupsPrinter) -> BackendResult<()> {
        if let Some(mut child) = printer.lp.take() {
            warn!(printer = %printer.name, "closing with an unfinished lp process");
            child.kill()?;
            child.wait()?;
        }
        Ok(())
    }

    fn spool_job_id(&self, printer: &CupsPrinter) -> Option<SpoolJobId> {
        printer.request_id
    }
}

/// `RAW` maps to the CUPS raw type and MIME types pass through.  Spooler
/// datatype names such as `TEXT` have no CUPS equivalent.
fn lp_format_option(datatype: &str) -> BackendResult<String> {
    if datatype.eq_ignore_ascii_case(RAW_DATATYPE) {
        Ok(format!("document-format={CUPS_RAW_MIME}"))
    } else if datatype.contains('/') {
        Ok(format!("document-format={datatype}"))
    } else {
        Err(BackendError::new(format!(
            "datatype {datatype} is not supported by CUPS; use RAW or a MIME type"
        )))
    }
}

fn require_document(printer: &mut CupsPrinter) -> BackendResult<&mut Child> {
    printer
        .lp
        .as_mut()
        .ok_or_else(|| BackendError::new("no document is open"))
}

fn spawn_error(program: &std::path::Path, err: std::io::Error) -> BackendError {
    if err.kind() == ErrorKind::NotFound {
        BackendError::new(format!(
            "{} not found; is CUPS installed?",
            program.display()
        ))
    } else {
        BackendError::from(err)
    }
}

fn exit_error(program: &str, code: Option<i32>, stderr: &str) -> BackendError {
    let detail = stderr.trim();
    // The CUPS tools already prefix their own diagnostics.
    let message = if detail.is_empty() {
        format!("{program} failed")
    } else if detail.starts_with(&format!("{program}:")) {
        detail.to_owned()
    } else {
        format!("{program}: {detail}")
    };
    BackendError { code, message }
}

/// One destination per line; instances appear as `name/instance`.
fn parse_destinations(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `request id is ZDesigner_GK420t-42 (1 file(s))` → 42.
fn parse_request_id(stdout: &str) -> Option<SpoolJobId> {
    let rest = stdout.split("request id is ").nth(1)?;
    let token = rest.split_whitespace().next()?;
    let (_, number) = token.rsplit_once('-')?;
    number.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_destinations_in_order() {
        let out = "HP_LaserJet\nZDesigner_GK420t\n\nZDesigner_GK420t/wide\n";
        assert_eq!(
            parse_destinations(out),
            vec!["HP_LaserJet", "ZDesigner_GK420t", "ZDesigner_GK420t/wide"]
        );
    }

    #[test]
    fn parses_request_id() {
        assert_eq!(
            parse_request_id("request id is ZDesigner_GK420t-42 (1 file(s))\n"),
            Some(42)
        );
        assert_eq!(parse_request_id("request id is Zebra-ZT-410-7 (0 file(s))"), Some(7));
        assert_eq!(parse_request_id("lp: error"), None);
    }

    #[test]
    fn exit_error_keeps_code_and_stderr() {
        let err = exit_error("lp", Some(1), "lp: The printer or class does not exist.\n");
        assert_eq!(err.code, Some(1));
        assert_eq!(err.message, "lp: The printer or class does not exist.");
    }

    #[test]
    fn exit_error_prefixes_bare_stderr_once() {
        let err = exit_error("lpstat", Some(1), "Unable to connect to server\n");
        assert_eq!(err.message, "lpstat: Unable to connect to server");
        assert_eq!(err.to_string(), "lpstat: Unable to connect to server (code 1)");

        let err = exit_error("lp", None, "  \n");
        assert_eq!(err.message, "lp failed");
    }

    #[test]
    fn datatypes_map_to_document_formats() {
        assert_eq!(
            lp_format_option("RAW").expect("raw"),
            "document-format=application/vnd.cups-raw"
        );
        assert_eq!(
            lp_format_option("application/pdf").expect("mime"),
            "document-format=application/pdf"
        );
        assert!(lp_format_option("TEXT").is_err());
        assert!(lp_format_option("NT EMF 1.008").is_err());
    }

    #[test]
    fn unsupported_datatype_fails_before_spawning_lp() {
        let backend = CupsBackend::with_commands("lpstat", "/nonexistent/rawspool-lp");
        let mut printer = CupsPrinter {
            name: "ZDesigner_GK420t".into(),
            lp: None,
            request_id: None,
        };
        let doc = DocumentInfo {
            datatype: "TEXT".into(),
            ..DocumentInfo::default()
        };

        let err = backend.start_document(&mut printer, &doc).unwrap_err();
        assert!(err.message.contains("datatype TEXT"));
        assert!(printer.lp.is_none());
    }

    #[test]
    fn missing_tools_are_unavailable() {
        let backend = CupsBackend::with_commands("/nonexistent/rawspool-lpstat", "lp");
        assert!(matches!(
            backend.ensure_available(),
            Err(RawSpoolError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn missing_tools_are_reported() {
        let backend = CupsBackend::with_commands(
            "/nonexistent/rawspool-lpstat",
            "/nonexistent/rawspool-lp",
        );
        let err = backend.enumerate_local().unwrap_err();
        assert!(err.message.contains("is CUPS installed"));
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use crate::job::RawPrintJob;
        use rawspool_core::error::RawSpoolError;
        use rawspool_core::types::JobStage;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod script");
            path
        }

        fn fake_cups(dir: &Path, lp_body: &str) -> CupsBackend {
            let lpstat = script(dir, "lpstat", "printf 'HP_LaserJet\\nZDesigner_GK420t\\n'");
            let lp = script(dir, "lp", lp_body);
            CupsBackend::with_commands(lpstat, lp)
        }

        #[test]
        fn raw_job_reaches_lp_stdin() {
            let dir = tempfile::tempdir().expect("temp dir");
            let out = dir.path().join("payload");
            let args = dir.path().join("args");
            let backend = fake_cups(
                dir.path(),
                &format!(
                    "printf '%s\\n' \"$@\" > '{}'\ncat > '{}'\necho 'request id is ZDesigner_GK420t-7 (1 file(s))'",
                    args.display(),
                    out.display()
                ),
            );

            let records = backend.enumerate_local().expect("enumerate");
            assert_eq!(records[1].name, "ZDesigner_GK420t");

            let report = RawPrintJob::new(
                &backend,
                records[1].descriptor(),
                DocumentInfo::raw("ZPLII data from ArcMap"),
            )
            .submit(b"^XA^FO50,50^FDrawspool^FS^XZ")
            .expect("submit");

            assert_eq!(report.spool_job_id, Some(7));
            assert_eq!(
                std::fs::read(&out).expect("payload"),
                b"^XA^FO50,50^FDrawspool^FS^XZ"
            );
            let args = std::fs::read_to_string(&args).expect("args");
            assert_eq!(
                args.lines().collect::<Vec<_>>(),
                vec![
                    "-d",
                    "ZDesigner_GK420t",
                    "-t",
                    "ZPLII data from ArcMap",
                    "-o",
                    "raw",
                    "-o",
                    "document-format=application/vnd.cups-raw",
                ]
            );
        }

        #[test]
        fn lp_failure_surfaces_at_end_document() {
            let dir = tempfile::tempdir().expect("temp dir");
            let backend = fake_cups(
                dir.path(),
                "cat > /dev/null\necho 'lp: Destination is not accepting jobs.' >&2\nexit 1",
            );

            let failure = RawPrintJob::new(
                &backend,
                PrinterRecord::local("ZDesigner_GK420t").descriptor(),
                DocumentInfo::default(),
            )
            .submit(b"^XA^XZ")
            .unwrap_err();

            match failure.primary {
                RawSpoolError::Document { stage, source } => {
                    assert_eq!(stage, JobStage::EndDocument);
                    assert!(source.message.contains("not accepting jobs"));
                }
                other => panic!("unexpected primary {other:?}"),
            }
        }

        #[test]
        fn stopped_scheduler_is_unavailable() {
            let dir = tempfile::tempdir().expect("temp dir");
            let lpstat = script(dir.path(), "lpstat", "echo 'scheduler is not running'");
            let backend = CupsBackend::with_commands(lpstat, "lp");
            assert!(matches!(
                backend.ensure_available(),
                Err(RawSpoolError::BackendUnavailable(_))
            ));

            let lpstat = script(dir.path(), "lpstat-ok", "echo 'scheduler is running'");
            assert!(CupsBackend::with_commands(lpstat, "lp").ensure_available().is_ok());
        }

        #[test]
        fn unknown_destination_fails_open() {
            let dir = tempfile::tempdir().expect("temp dir");
            let backend = fake_cups(dir.path(), "cat > /dev/null");
            let err = backend.open("Brother_QL").unwrap_err();
            assert!(err.message.contains("unknown destination"));
        }
    }
}
