//! Error types and handling for zagent
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! Every fatal condition the provisioner can hit maps to exactly one variant
//! here; `main` prints the message and exits non-zero. Non-fatal degradations
//! (plugin discovery, optional packages, config backups) never surface as
//! errors; they are absorbed where they happen.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for zagent operations
#[derive(Error, Diagnostic, Debug)]
pub enum ZagentError {
    // Precondition errors
    #[error("Precondition failed: {reason}")]
    #[diagnostic(
        code(zagent::preflight::failed),
        help("zagent must run as root (or an elevated shell on Windows) with free disk space for package downloads")
    )]
    PreconditionFailed { reason: String },

    // Environment errors
    #[error("Unsupported environment: {detail}")]
    #[diagnostic(
        code(zagent::environ::unsupported),
        help("Supported families: debian, rhel, suse, windows on 64-bit x86 or ARM")
    )]
    EnvironmentUnsupported { detail: String },

    // Collector errors
    #[error("No Zabbix server reachable on port {port} (tried: {candidates})")]
    #[diagnostic(
        code(zagent::collector::unreachable),
        help("Check the candidate list (--servers / ZAGENT_SERVERS) and that the trapper port is open")
    )]
    NoCollectorReachable { port: u16, candidates: String },

    // Install errors
    #[error("Agent installation failed: {message}")]
    #[diagnostic(code(zagent::install::failed))]
    InstallFailed { message: String },

    // Service errors
    #[error("Agent service failure: {message}")]
    #[diagnostic(
        code(zagent::service::failed),
        help("Inspect the service manager logs (journalctl -u zabbix-agent2) and the run transcript")
    )]
    ServiceFailed { message: String },

    // File system errors
    #[error("Failed to read file: {path}")]
    #[diagnostic(code(zagent::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}")]
    #[diagnostic(code(zagent::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(zagent::fs::io_error))]
    IoError { message: String },
}

impl From<std::io::Error> for ZagentError {
    fn from(err: std::io::Error) -> Self {
        ZagentError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, ZagentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ZagentError::NoCollectorReachable {
            port: 10051,
            candidates: "zbx1, zbx2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No Zabbix server reachable on port 10051 (tried: zbx1, zbx2)"
        );
    }

    #[test]
    fn test_error_code() {
        let err = ZagentError::EnvironmentUnsupported {
            detail: "alpine".to_string(),
        };
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("zagent::environ::unsupported".to_string())
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ZagentError = io_err.into();
        assert!(matches!(err, ZagentError::IoError { .. }));
    }

    #[test]
    fn test_install_failed_display() {
        let err = ZagentError::InstallFailed {
            message: "zabbix-agent2 absent after fallback".to_string(),
        };
        assert!(err.to_string().contains("installation failed"));
        assert!(err.to_string().contains("zabbix-agent2"));
    }

    #[test]
    fn test_precondition_display() {
        let err = ZagentError::PreconditionFailed {
            reason: "must run as root".to_string(),
        };
        assert!(err.to_string().contains("Precondition failed"));
    }
}
