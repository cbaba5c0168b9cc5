//! pagecut
//!
//! Renders a live web page to PDF after removing a caller-chosen set of
//! elements, including elements inside same-origin frames and shadow roots,
//! and elements the page inserts shortly after load.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives headless Chrome through the
//!   `headless_chrome` crate
//! - **Static Backend** (default): applies exclusions to parsed HTML with no
//!   browser at all
//! - **Shared traversal**: removal, frame/shadow walking and insertion watching
//!   are written once against the [`dom`] traits
//!
//! # Example
//!
//! ```no_run
//! use pagecut::{ExclusionSet, Orientation, RenderRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = RenderRequest::new("https://example.com")
//!     .with_output("example.pdf")
//!     .with_orientation(Orientation::Landscape)
//!     .with_exclusions(ExclusionSet::parse(".ad, #cookie-banner"));
//!
//! let summary = pagecut::convert(&request)?;
//! println!("Wrote {} bytes to {}", summary.bytes, summary.output.display());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod convert;
pub mod dom;
pub mod remover;
pub mod request;
pub mod selectors;
pub mod walker;
pub mod watcher;

// Chrome-backed rendering
#[cfg(feature = "cdp")]
pub mod cdp;
#[cfg(feature = "cdp")]
pub mod page_runtime;

// Async-friendly facade over the CDP converter
#[cfg(feature = "cdp")]
pub mod async_api;

// In-memory documents parsed with scraper
#[cfg(feature = "static")]
pub mod static_dom;

#[cfg(feature = "cdp")]
pub use async_api::AsyncConverter;
#[cfg(feature = "cdp")]
pub use convert::convert;
pub use convert::{ConversionSummary, Converter, Launcher, RenderTarget, Stage};
pub use dom::{DocumentTree, FrameAccess, InsertionSource, ScopeKind};
pub use remover::RemovalReport;
pub use request::{Orientation, PageFormat, PdfOptions, RenderRequest};
pub use selectors::{ExclusionPattern, ExclusionSet};
pub use walker::{walk, ScopeReport, WalkOutcome};
pub use watcher::{watch_for, MutationWatcher, WatchSummary};

/// Tuning for the conversion pipeline
///
/// The defaults match the command line tool: a 60 s navigation budget, a
/// 500 ms quiescence window, a 3 s watcher settle window and 20 px margins.
///
/// # Examples
///
/// ```
/// let cfg = pagecut::ConversionConfig::default();
/// assert_eq!(cfg.navigation_timeout.as_millis(), 60_000);
/// assert_eq!(cfg.output_dir, "output");
/// ```
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Upper bound for navigation plus the quiescence wait
    pub navigation_timeout: Duration,
    /// How long the page must stay free of new network activity
    pub quiescence_window: Duration,
    /// How long inserted elements keep being removed after the initial walk
    pub watch_window: Duration,
    /// How often the watcher drains insertions during its window
    pub watch_poll: Duration,
    /// PDF margin on all four sides, in CSS pixels
    pub margin_px: f64,
    /// Directory the output directory is created in (current directory when `None`)
    pub output_root: Option<PathBuf>,
    /// Name of the output directory
    pub output_dir: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(60_000),
            quiescence_window: Duration::from_millis(500),
            watch_window: Duration::from_millis(3_000),
            watch_poll: Duration::from_millis(50),
            margin_px: 20.0,
            output_root: None,
            output_dir: "output".to_string(),
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Orientation::Portrait.viewport()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConversionConfig::default();
        assert_eq!(config.watch_window, Duration::from_millis(3000));
        assert_eq!(config.margin_px, 20.0);
        assert!(config.output_root.is_none());
    }

    #[test]
    fn test_viewport() {
        let viewport = Viewport::default();
        assert_eq!(viewport.width, 1080);
        assert_eq!(viewport.height, 1920);
    }
}
