// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rawspool print: printer directory, raw print job lifecycle, and the spooler
// backends (CUPS, raw TCP) it runs against.  This crate drives the domain
// types defined in `rawspool-core` through the actual printing
// infrastructure.

pub mod backend;
pub mod cups;
pub mod directory;
pub mod dispatcher;
pub mod job;
pub mod mock;
pub mod retry;
pub mod socket;

pub use backend::{PrinterBackend, PrinterEnumerator, PrinterIo};
pub use cups::CupsBackend;
pub use directory::{PrinterDirectory, Selector};
pub use dispatcher::{AbandonedJobs, Dispatcher};
pub use job::{RawPrintJob, submit};
pub use socket::SocketBackend;
