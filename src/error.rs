//! Error types for the conversion pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a page
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to acquire a browser context
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Failed to load the target URL
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// A script or DOM primitive failed inside the page
    #[error("Script execution failed: {0}")]
    Script(String),

    /// An exclusion pattern the document engine refuses to parse
    #[error("Invalid exclusion selector '{pattern}': {reason}")]
    InvalidSelector { pattern: String, reason: String },

    /// Failed to export the page to PDF
    #[error("PDF export failed: {0}")]
    Export(String),

    /// Failed to persist the exported bytes
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid caller input or configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A scope handle no longer resolves to a node
    #[error("Document error: {0}")]
    Dom(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort a traversal even when raised inside a
    /// nested scope. Everything else is local to the scope that raised it.
    pub fn aborts_walk(&self) -> bool {
        matches!(self, Error::InvalidSelector { .. } | Error::Timeout(_))
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Cdp(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_errors_abort_walks() {
        let err = Error::InvalidSelector {
            pattern: "div[".into(),
            reason: "unexpected end".into(),
        };
        assert!(err.aborts_walk());
        assert!(!Error::Dom("stale".into()).aborts_walk());
        assert!(err.to_string().contains("div["));
    }

    #[test]
    fn write_error_names_the_path() {
        let err = Error::Write {
            path: PathBuf::from("output/report.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("output/report.pdf"));
    }

    #[cfg(feature = "cdp")]
    #[test]
    fn protocol_errors_become_cdp_errors() {
        let err: Error = anyhow::anyhow!("Method not found").into();
        assert!(matches!(err, Error::Cdp(ref m) if m == "Method not found"));
        assert!(!err.aborts_walk());
    }
}
