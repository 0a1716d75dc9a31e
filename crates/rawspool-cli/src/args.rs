// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use rawspool_core::config::BackendKind;

#[derive(Debug, Parser)]
#[command(
    name = "rawspool",
    version,
    about = "Send raw label data (ZPL, EPL, ESC/POS) to a local printer"
)]
pub struct Cli {
    /// Config file (default: $RAWSPOOL_CONFIG or ~/.config/rawspool/config.json).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the configured backend.
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Log every transition and write.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the printers the backend reports.
    List {
        /// Include printers that are not local.
        #[arg(long)]
        all: bool,
    },

    /// Send a file to the first printer matching the selector.
    Print(PrintArgs),
}

#[derive(Debug, clap::Args)]
pub struct PrintArgs {
    /// File with the raw printer language, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// `Name` matches a substring, `~name` ignores case, `=Name` is exact.
    #[arg(short, long, value_name = "SELECTOR")]
    pub printer: Option<String>,

    /// Job name shown in the print queue.
    #[arg(long)]
    pub job_name: Option<String>,

    /// Spooler datatype for the document.
    #[arg(long)]
    pub datatype: Option<String>,

    /// Resubmit this many times when nothing reached the queue yet.
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Stop waiting after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Cups,
    Socket,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cups => BackendKind::Cups,
            BackendArg::Socket => BackendKind::Socket,
        }
    }
}

impl PrintArgs {
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}
