/*!
 * Error types for satctl
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

use satctl_core_interface::ExternalError;

pub type Result<T> = std::result::Result<T, SatError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INTEGRITY: i32 = 3;

#[derive(Debug)]
pub enum SatError {
    /// Missing environment, chain, satellite or connection
    NotFound(String),

    /// State file exists but fails validation; needs manual repair
    Corrupt {
        environment: String,
        path: PathBuf,
        message: String,
    },

    /// Two compiled functions disagree on a name or a selector
    SelectorCollision(Vec<String>),

    /// Modules selected for the batch without a deployed address
    UnresolvedAddress(Vec<String>),

    /// Graph or lifecycle rule broken; carries every violation found
    InvariantViolation(Vec<String>),

    /// The registry has no connection entry for `from -> to`
    NoConnectionData { from: String, to: String },

    /// Sender side succeeded, receiver side failed; the edge is not recorded
    PartialConnection {
        from: String,
        to: String,
        completed: String,
        failed: String,
    },

    /// Subprocess, RPC or explorer failure, reported verbatim
    ExternalToolFailure(String),

    /// An external call exceeded its configured deadline
    Timeout { operation: String, secs: u64 },

    /// Configuration error
    Config(String),

    /// I/O error
    Io(io::Error),

    /// Audit log error
    AuditLog(String),

    /// Generic error with message
    Other(String),
}

impl SatError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // On-chain state now differs from the store
            SatError::PartialConnection { .. } => EXIT_PARTIAL,
            SatError::Corrupt { .. } => EXIT_INTEGRITY,
            _ => EXIT_FATAL,
        }
    }

    /// Whether the operator must reconcile chain state by hand
    pub fn needs_manual_recovery(&self) -> bool {
        matches!(
            self,
            SatError::PartialConnection { .. } | SatError::Corrupt { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            SatError::NotFound(_) => ErrorCategory::Validation,
            SatError::Corrupt { .. } => ErrorCategory::Integrity,
            SatError::SelectorCollision(_) | SatError::UnresolvedAddress(_) => {
                ErrorCategory::Planning
            }
            SatError::InvariantViolation(_) => ErrorCategory::Invariant,
            SatError::NoConnectionData { .. } | SatError::Config(_) => {
                ErrorCategory::Configuration
            }
            SatError::PartialConnection { .. } => ErrorCategory::Partial,
            SatError::ExternalToolFailure(_) => ErrorCategory::External,
            SatError::Timeout { .. } => ErrorCategory::Timeout,
            SatError::Io(_) => ErrorCategory::IoError,
            SatError::AuditLog(_) => ErrorCategory::Audit,
            SatError::Other(_) => ErrorCategory::Unknown,
        }
    }

    /// Shorthand for a single invariant violation
    pub fn invariant<S: Into<String>>(message: S) -> Self {
        SatError::InvariantViolation(vec![message.into()])
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad operator input
    Validation,
    /// State file integrity
    Integrity,
    /// Plan computation and binding
    Planning,
    /// Store or graph invariants
    Invariant,
    /// Configuration errors
    Configuration,
    /// Half-applied on-chain changes
    Partial,
    /// External tools and services
    External,
    Timeout,
    /// I/O operation errors
    IoError,
    /// Audit logging errors
    Audit,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Planning => write!(f, "planning"),
            ErrorCategory::Invariant => write!(f, "invariant"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Partial => write!(f, "partial"),
            ErrorCategory::External => write!(f, "external"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Audit => write!(f, "audit"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[String]) -> fmt::Result {
    for item in items {
        write!(f, "\n  - {}", item)?;
    }
    Ok(())
}

impl fmt::Display for SatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SatError::NotFound(what) => write!(f, "Not found: {}", what),
            SatError::Corrupt {
                environment,
                path,
                message,
            } => write!(
                f,
                "Environment '{}' is corrupt ({}): {}. Repair the file by hand",
                environment,
                path.display(),
                message
            ),
            SatError::SelectorCollision(collisions) => {
                write!(f, "Selector collision")?;
                write_list(f, collisions)
            }
            SatError::UnresolvedAddress(modules) => {
                write!(
                    f,
                    "No deployed address for selected module(s): {}. Nothing was submitted",
                    modules.join(", ")
                )
            }
            SatError::InvariantViolation(violations) => {
                write!(f, "Invariant violation")?;
                write_list(f, violations)
            }
            SatError::NoConnectionData { from, to } => {
                write!(f, "No connection data configured for {} -> {}", from, to)
            }
            SatError::PartialConnection {
                from,
                to,
                completed,
                failed,
            } => write!(
                f,
                "Connection {} -> {} is half-applied: {} succeeded but {} failed. \
                 The store was not updated; reconcile the chains manually",
                from, to, completed, failed
            ),
            SatError::ExternalToolFailure(msg) => write!(f, "External tool failure: {}", msg),
            SatError::Timeout { operation, secs } => {
                write!(f, "{} timed out after {}s", operation, secs)
            }
            SatError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SatError::Io(err) => write!(f, "I/O error: {}", err),
            SatError::AuditLog(msg) => write!(f, "Audit log error: {}", msg),
            SatError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SatError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SatError {
    fn from(err: io::Error) -> Self {
        SatError::Io(err)
    }
}

impl From<serde_json::Error> for SatError {
    fn from(err: serde_json::Error) -> Self {
        SatError::Other(format!("JSON error: {}", err))
    }
}

impl From<ExternalError> for SatError {
    fn from(err: ExternalError) -> Self {
        SatError::ExternalToolFailure(err.to_string())
    }
}

impl From<satctl_core_state::Error> for SatError {
    fn from(err: satctl_core_state::Error) -> Self {
        use satctl_core_state::Error as StateError;
        match err {
            StateError::EnvironmentNotFound { name, path } => SatError::NotFound(format!(
                "environment '{}' ({})",
                name,
                path.display()
            )),
            StateError::NoActiveEnvironment => SatError::NotFound(
                "no active environment; run `satctl env change` or `satctl env create`".into(),
            ),
            StateError::Corrupt {
                name,
                path,
                message,
            } => SatError::Corrupt {
                environment: name,
                path,
                message,
            },
            StateError::Io(e) => SatError::Io(e),
            other @ (StateError::EnvironmentExists { .. }
            | StateError::EnvironmentActive { .. }
            | StateError::InvalidEnvironmentName(_)) => SatError::invariant(other.to_string()),
            other => SatError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(SatError::NotFound("x".into()).exit_code(), EXIT_FATAL);
        assert_eq!(
            SatError::Corrupt {
                environment: "dev".into(),
                path: PathBuf::from("dev.json"),
                message: "bad".into(),
            }
            .exit_code(),
            EXIT_INTEGRITY
        );
        assert_eq!(
            SatError::PartialConnection {
                from: "1".into(),
                to: "10".into(),
                completed: "sender".into(),
                failed: "receiver".into(),
            }
            .exit_code(),
            EXIT_PARTIAL
        );
        assert_eq!(SatError::UnresolvedAddress(vec![]).exit_code(), EXIT_FATAL);
    }

    #[test]
    fn test_invariant_display_lists_everything() {
        let err = SatError::InvariantViolation(vec![
            "edge 1 -> 10 exists".into(),
            "edge 10 -> 1 exists".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Invariant violation\n  - edge 1 -> 10 exists\n  - edge 10 -> 1 exists"
        );
    }

    #[test]
    fn test_state_errors_map_to_taxonomy() {
        let not_found: SatError = satctl_core_state::Error::NoActiveEnvironment.into();
        assert!(matches!(not_found, SatError::NotFound(_)));

        let corrupt: SatError =
            satctl_core_state::Error::corrupt("dev", "dev.json", "missing satellites").into();
        assert_eq!(corrupt.category(), ErrorCategory::Integrity);

        let active: SatError = satctl_core_state::Error::EnvironmentActive {
            name: "dev".into(),
        }
        .into();
        assert!(matches!(active, SatError::InvariantViolation(v) if v.len() == 1));
    }

    #[test]
    fn test_external_error_is_verbatim() {
        let err: SatError = ExternalError::ToolFailed {
            tool: "npx hardhat".into(),
            status: "exit status: 1".into(),
            stderr: "ProviderError: nonce too low".into(),
        }
        .into();
        assert!(err.to_string().contains("ProviderError: nonce too low"));
        assert_eq!(err.category(), ErrorCategory::External);
    }
}
