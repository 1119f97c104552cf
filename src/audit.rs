/*!
 * Audit logging for satctl operations
 *
 * Every command that changes the active environment, the deployment state or
 * a satellite on-chain appends one JSON Lines record. Records carry the
 * session id of the process so the records of one run can be correlated.
 *
 * # Example
 *
 * ```no_run
 * use satctl::audit::{AuditEvent, AuditLogger, AuditStatus};
 * use std::path::Path;
 *
 * let logger = AuditLogger::new(Some(Path::new("satctl_audit.log"))).unwrap();
 * logger
 *     .emit(&AuditEvent::new(logger.session(), "env.change", AuditStatus::Success).with_environment("staging"))
 *     .unwrap();
 * ```
 */

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failure,
    /// Some on-chain calls went through, the store was left unchanged
    Partial,
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// RFC 3339 timestamp
    pub timestamp: String,

    /// Process-wide session id
    pub session: String,

    /// Dotted command name, e.g. `connection.register`
    pub action: String,

    pub status: AuditStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,

    /// Counterpart chain of a connection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_chain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,

    /// Modules touched by an upgrade
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(session: &str, action: &str, status: AuditStatus) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            session: session.to_string(),
            action: action.to_string(),
            status,
            environment: None,
            chain: None,
            remote_chain: None,
            address: None,
            tx_hash: None,
            modules: Vec::new(),
            error: None,
        }
    }

    pub fn with_environment(mut self, environment: &str) -> Self {
        self.environment = Some(environment.to_string());
        self
    }

    pub fn with_chain(mut self, chain: &str) -> Self {
        self.chain = Some(chain.to_string());
        self
    }

    pub fn with_remote_chain(mut self, chain: &str) -> Self {
        self.remote_chain = Some(chain.to_string());
        self
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: &str) -> Self {
        self.tx_hash = Some(tx_hash.to_string());
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Set error message
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Append-only JSON Lines audit writer
///
/// Each record is flushed before `emit` returns.
#[derive(Clone)]
pub struct AuditLogger {
    path: PathBuf,
    session: String,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl AuditLogger {
    /// Open or create the audit log.
    ///
    /// Defaults to `satctl_audit.log` in the current directory.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let log_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("satctl_audit.log"));

        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SatError::AuditLog(format!("Failed to create audit log directory: {}", e))
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| SatError::AuditLog(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            path: log_path,
            session: Uuid::new_v4().to_string(),
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Session id stamped on every record of this process
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Start an event for this session
    pub fn event(&self, action: &str, status: AuditStatus) -> AuditEvent {
        AuditEvent::new(&self.session, action, status)
    }

    /// Append one record
    pub fn emit(&self, event: &AuditEvent) -> Result<()> {
        let json = serde_json::to_string(event)
            .map_err(|e| SatError::AuditLog(format!("Failed to serialize event: {}", e)))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SatError::AuditLog("audit writer poisoned".to_string()))?;
        writeln!(writer, "{}", json)
            .map_err(|e| SatError::AuditLog(format!("Failed to write audit log: {}", e)))?;
        writer
            .flush()
            .map_err(|e| SatError::AuditLog(format!("Failed to flush audit log: {}", e)))?;
        Ok(())
    }

    /// Record the outcome of a command
    pub fn emit_result<T>(&self, event: AuditEvent, outcome: &Result<T>) -> Result<()> {
        let event = match outcome {
            Ok(_) => event,
            Err(e @ SatError::PartialConnection { .. }) => {
                let mut event = event.with_error(&e.to_string());
                event.status = AuditStatus::Partial;
                event
            }
            Err(e) => {
                let mut event = event.with_error(&e.to_string());
                event.status = AuditStatus::Failure;
                event
            }
        };
        self.emit(&event)
    }
}
