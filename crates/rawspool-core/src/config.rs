// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatcher configuration, loaded from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RawSpoolError, Result};
use crate::types::{DEFAULT_JOB_NAME, DocumentInfo, RAW_DATATYPE};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RAWSPOOL_CONFIG";

/// Default raw TCP port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

/// Which spooler integration to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local CUPS queues (`lpstat` / `lp -o raw`).
    Cups,
    /// Printers declared in `socket_printers`, reached over raw TCP.
    Socket,
}

/// A printer reached by streaming bytes to a TCP port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketPrinter {
    pub name: String,
    pub host: String,
    #[serde(default = "default_raw_port")]
    pub port: u16,
    #[serde(default)]
    pub description: String,
}

fn default_raw_port() -> u16 {
    RAW_PORT
}

/// Persistent dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    pub backend: BackendKind,
    /// Substring matched against printer names when no selector is given.
    pub selector: String,
    /// Job name shown in the spooler.
    pub job_name: String,
    /// Spooler datatype for "begin document".
    pub datatype: String,
    /// Bytes handed to the backend per write call.
    pub write_chunk_size: usize,
    /// TCP connect timeout for the socket backend.
    pub connect_timeout_secs: u64,
    /// Caller-level limit on a whole submit; cleanup still runs past it.
    pub submit_timeout_secs: Option<u64>,
    pub socket_printers: Vec<SocketPrinter>,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Cups,
            selector: "ZDesigner".into(),
            job_name: DEFAULT_JOB_NAME.into(),
            datatype: RAW_DATATYPE.into(),
            write_chunk_size: 8192,
            connect_timeout_secs: 10,
            submit_timeout_secs: None,
            socket_printers: Vec::new(),
        }
    }
}

impl SpoolConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without validating it, so command-line overrides
    /// can be applied first.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RawSpoolError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Load `explicit` if given (it must exist), otherwise the first existing
    /// default location, otherwise built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let config = Self::read_or_default(explicit)?;
        config.validate()?;
        Ok(config)
    }

    /// [`SpoolConfig::load_or_default`] minus validation.
    pub fn read_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::read(path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply a backend chosen on the command line, then validate the result.
    pub fn with_backend(mut self, backend: Option<BackendKind>) -> Result<Self> {
        if let Some(backend) = backend {
            self.backend = backend;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.write_chunk_size == 0 {
            return Err(RawSpoolError::Config(
                "write_chunk_size must be greater than zero".into(),
            ));
        }
        if self.job_name.is_empty() {
            return Err(RawSpoolError::Config("job_name must not be empty".into()));
        }
        if self.backend == BackendKind::Socket && self.socket_printers.is_empty() {
            return Err(RawSpoolError::Config(
                "socket backend selected but no socket_printers are configured".into(),
            ));
        }
        for printer in &self.socket_printers {
            if printer.name.is_empty() || printer.host.is_empty() {
                return Err(RawSpoolError::Config(format!(
                    "socket printer entry needs both name and host: {printer:?}"
                )));
            }
        }
        Ok(())
    }

    /// "Begin document" parameters derived from this config.
    pub fn document_info(&self) -> DocumentInfo {
        DocumentInfo {
            job_name: self.job_name.clone(),
            datatype: self.datatype.clone(),
            output_file: None,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_secs.map(Duration::from_secs)
    }
}

/// `$RAWSPOOL_CONFIG`, else `$XDG_CONFIG_HOME/rawspool/config.json`, else
/// `$HOME/.config/rawspool/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(explicit));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("rawspool").join("config.json"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("rawspool").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(body.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults_match_label_workflow() {
        let config = SpoolConfig::default();
        assert_eq!(config.selector, "ZDesigner");
        assert_eq!(config.job_name, "ZPLII data from ArcMap");
        assert_eq!(config.datatype, "RAW");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let file = write_config(
            r#"{
                "backend": "socket",
                "socket_printers": [{ "name": "ZDesigner ZT410", "host": "10.0.0.7" }]
            }"#,
        );
        let config = SpoolConfig::load(file.path()).expect("load");
        assert_eq!(config.backend, BackendKind::Socket);
        assert_eq!(config.socket_printers[0].port, RAW_PORT);
        assert_eq!(config.write_chunk_size, 8192);
    }

    #[test]
    fn socket_backend_without_printers_is_rejected() {
        let file = write_config(r#"{ "backend": "socket" }"#);
        let err = SpoolConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, RawSpoolError::Config(_)));
    }

    #[test]
    fn backend_override_is_validated_instead_of_the_file() {
        let file = write_config(r#"{ "backend": "socket", "selector": "Zebra" }"#);

        let config = SpoolConfig::read(file.path())
            .expect("read")
            .with_backend(Some(BackendKind::Cups))
            .expect("cups needs no socket printers");
        assert_eq!(config.backend, BackendKind::Cups);
        assert_eq!(config.selector, "Zebra");

        let err = SpoolConfig::read(file.path())
            .expect("read")
            .with_backend(None)
            .unwrap_err();
        assert!(matches!(err, RawSpoolError::Config(_)));
    }

    #[test]
    fn override_to_socket_still_needs_printers() {
        let err = SpoolConfig::default()
            .with_backend(Some(BackendKind::Socket))
            .unwrap_err();
        assert!(matches!(err, RawSpoolError::Config(_)));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = SpoolConfig {
            write_chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let file = write_config("{ not json");
        let err = SpoolConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, RawSpoolError::Serialization(_)));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.json");
        assert!(SpoolConfig::load_or_default(Some(&missing)).is_err());
    }

    #[test]
    fn document_info_follows_config() {
        let config = SpoolConfig {
            job_name: "shipping labels".into(),
            ..Default::default()
        };
        let doc = config.document_info();
        assert_eq!(doc.job_name, "shipping labels");
        assert_eq!(doc.datatype, "RAW");
    }
}
