// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer directory: resolve a selector against the installed printers.
//
// Resolution is a pure query over a fresh enumeration snapshot.  When several
// printers match, the first one in enumeration order wins; callers that need
// a particular one must pass a tighter selector.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use rawspool_core::error::{RawSpoolError, Result};
use rawspool_core::types::{PrinterDescriptor, PrinterRecord};

use crate::backend::PrinterEnumerator;

/// A predicate over printer names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Case-sensitive substring match.
    Contains(String),
    /// Case-insensitive substring match.
    ContainsIgnoreCase(String),
    /// Whole-name match.
    Exact(String),
}

impl Selector {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Contains(needle) => name.contains(needle.as_str()),
            Self::ContainsIgnoreCase(needle) => name
                .to_lowercase()
                .contains(needle.to_lowercase().as_str()),
            Self::Exact(expected) => name == expected,
        }
    }
}

/// `=Name` is exact, `~name` is case-insensitive, anything else is a
/// case-sensitive substring.
impl FromStr for Selector {
    type Err = RawSpoolError;

    fn from_str(s: &str) -> Result<Self> {
        let selector = if let Some(rest) = s.strip_prefix('=') {
            Self::Exact(rest.to_owned())
        } else if let Some(rest) = s.strip_prefix('~') {
            Self::ContainsIgnoreCase(rest.to_owned())
        } else {
            Self::Contains(s.to_owned())
        };
        match &selector {
            Self::Contains(v) | Self::ContainsIgnoreCase(v) | Self::Exact(v) if v.is_empty() => {
                Err(RawSpoolError::Config("printer selector must not be empty".into()))
            }
            _ => Ok(selector),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contains(v) => write!(f, "contains {v:?}"),
            Self::ContainsIgnoreCase(v) => write!(f, "contains {v:?} (any case)"),
            Self::Exact(v) => write!(f, "named {v:?}"),
        }
    }
}

/// Read-only view over whatever printers the enumerator reports.
pub struct PrinterDirectory<'a, E: PrinterEnumerator + ?Sized> {
    enumerator: &'a E,
}

impl<'a, E: PrinterEnumerator + ?Sized> PrinterDirectory<'a, E> {
    pub fn new(enumerator: &'a E) -> Self {
        Self { enumerator }
    }

    /// Every enumerated record, local or not, in enumeration order.
    pub fn records(&self) -> Result<Vec<PrinterRecord>> {
        self.enumerator
            .enumerate_local()
            .map_err(RawSpoolError::Enumeration)
    }

    /// Local printers in enumeration order.
    pub fn list(&self) -> Result<Vec<PrinterDescriptor>> {
        Ok(self
            .records()?
            .iter()
            .filter(|r| r.flags.is_local())
            .map(PrinterRecord::descriptor)
            .collect())
    }

    pub fn resolve(&self, selector: &Selector) -> Result<PrinterDescriptor> {
        self.resolve_by(|name| selector.matches(name), &selector.to_string())
    }

    /// Resolve with an arbitrary name predicate.  `label` describes the
    /// predicate in the `NotFound` error.
    pub fn resolve_by<F>(&self, predicate: F, label: &str) -> Result<PrinterDescriptor>
    where
        F: Fn(&str) -> bool,
    {
        let records = self.records()?;
        let mut matches = records
            .iter()
            .filter(|r| r.flags.is_local() && predicate(&r.name));

        let Some(first) = matches.next() else {
            debug!(selector = label, candidates = records.len(), "no printer matched");
            return Err(RawSpoolError::NotFound {
                selector: label.to_owned(),
            });
        };

        for ignored in matches {
            debug!(printer = %ignored.name, "ignoring later match");
        }

        info!(printer = %first.name, selector = label, "printer resolved");
        Ok(first.descriptor())
    }
}
