// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rawspool: send raw label data to a local printer.
//
// Entry point. Initialises logging, loads the config, picks the spooler
// backend, and runs one `list` or `print` command.

mod args;

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use rawspool_core::config::{BackendKind, SpoolConfig};
use rawspool_core::error::{JobFailure, RawSpoolError};
use rawspool_core::human_errors::{EXIT_SUCCESS, EXIT_USAGE, humanize_error, job_exit_code};
use rawspool_core::types::JobReport;
use rawspool_print::retry::{RetryConfig, RetryDecision, is_safe_to_resubmit, should_retry};
use rawspool_print::{CupsBackend, Dispatcher, PrinterBackend, Selector, SocketBackend};

use args::{Cli, Command, PrintArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too.
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            return exit(code);
        }
    };
    init_logging(&cli);

    match run(cli).await {
        Ok(()) => exit(EXIT_SUCCESS),
        Err(failure) => {
            report_failure(&failure);
            exit(job_exit_code(&failure))
        }
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// `RUST_LOG` wins; otherwise `-v` / `-q` pick the level.  Logs go to stderr
/// so stdout stays clean for `list` output.
fn init_logging(cli: &Cli) {
    let default = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), JobFailure> {
    let config = SpoolConfig::read_or_default(cli.config.as_deref())?
        .with_backend(cli.backend.map(BackendKind::from))?;
    debug!(backend = ?config.backend, selector = %config.selector, "configuration loaded");

    match config.backend {
        BackendKind::Cups => {
            let backend = CupsBackend::new();
            backend.ensure_available()?;
            execute(backend, &config, cli.command).await
        }
        BackendKind::Socket => {
            let backend =
                SocketBackend::new(config.socket_printers.clone(), config.connect_timeout());
            execute(backend, &config, cli.command).await
        }
    }
}

async fn execute<B: PrinterBackend + 'static>(
    backend: B,
    config: &SpoolConfig,
    command: Command,
) -> Result<(), JobFailure> {
    let mut dispatcher =
        Dispatcher::new(Arc::new(backend)).with_chunk_size(config.write_chunk_size);
    info!(backend = dispatcher.backend().name(), "rawspool starting");

    match command {
        Command::List { all } => list(&dispatcher, all).await,
        Command::Print(args) => {
            let timeout = args
                .timeout
                .map(Duration::from_secs)
                .or_else(|| config.submit_timeout());
            if let Some(timeout) = timeout {
                dispatcher = dispatcher.with_timeout(timeout);
            }
            print(&dispatcher, config, args).await
        }
    }
}

async fn list<B: PrinterBackend + 'static>(
    dispatcher: &Dispatcher<B>,
    all: bool,
) -> Result<(), JobFailure> {
    let records = dispatcher.records().await?;
    let mut shown = 0usize;
    for record in records.iter().filter(|r| all || r.flags.is_local()) {
        let scope = if record.flags.is_local() { "local" } else { "remote" };
        println!("{}\t{}\t{}", record.name, scope, record.description);
        shown += 1;
    }
    if shown == 0 {
        info!("no printers found");
    }
    Ok(())
}

async fn print<B: PrinterBackend + 'static>(
    dispatcher: &Dispatcher<B>,
    config: &SpoolConfig,
    args: PrintArgs,
) -> Result<(), JobFailure> {
    let payload = read_payload(&args)?;
    if payload.is_empty() {
        warn!("payload is empty; the printer will receive an empty job");
    }

    let selector: Selector = args
        .printer
        .as_deref()
        .unwrap_or(&config.selector)
        .parse()?;
    let mut doc = config.document_info();
    if let Some(job_name) = args.job_name {
        doc.job_name = job_name;
    }
    if let Some(datatype) = args.datatype {
        doc.datatype = datatype;
    }

    let target = dispatcher.resolve(selector).await?;
    let retry = RetryConfig {
        max_retries: args.retries,
        ..Default::default()
    };

    let mut attempt = 0;
    loop {
        let failure = match dispatcher
            .submit(target.clone(), payload.clone(), doc.clone())
            .await
        {
            Ok(report) => {
                print_report(&report);
                return Ok(());
            }
            Err(failure) => failure,
        };

        // Anything past begin-document may already be in the queue.
        if !is_safe_to_resubmit(&failure) {
            return Err(failure);
        }
        match should_retry(&failure.primary, attempt, &retry) {
            RetryDecision::RetryAfter(delay) => {
                warn!(attempt, ?delay, error = %failure, "resubmitting print job");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(failure),
        }
    }
}

fn read_payload(args: &PrintArgs) -> Result<Vec<u8>, RawSpoolError> {
    if args.reads_stdin() {
        let mut payload = Vec::new();
        std::io::stdin().lock().read_to_end(&mut payload)?;
        Ok(payload)
    } else {
        Ok(std::fs::read(&args.input)?)
    }
}

fn print_report(report: &JobReport) {
    let spool_id = report
        .spool_job_id
        .map(|id| format!(", spooler job {id}"))
        .unwrap_or_default();
    println!(
        "sent {} bytes to {} as \"{}\"{spool_id}",
        report.bytes_written, report.printer, report.job_name
    );
    debug!(
        job_id = %report.job_id,
        sha256 = %report.payload_sha256,
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "job report"
    );
}

fn report_failure(failure: &JobFailure) {
    error!(error = %failure, "rawspool failed");
    let human = humanize_error(&failure.primary);
    eprintln!("{}", human.message);
    eprintln!("  {}", human.suggestion);
    for cleanup in &failure.cleanup {
        eprintln!("  also: {}", humanize_error(cleanup).message);
    }
}
