//! Render orchestration: launch, navigate, exclude, settle, export, write
//!
//! [`Converter`] drives one conversion through the [`Stage`] sequence. The
//! launched target is owned by the driving function, so it is dropped (and
//! the browser released) on every exit path before the conversion reports
//! `Closed` or `ErrorClosed`.

use crate::dom::InsertionSource;
use crate::request::{PdfOptions, RenderRequest};
use crate::walker::WalkOutcome;
use crate::watcher::{MutationWatcher, WatchSummary};
use crate::{ConversionConfig, Error, Result, Viewport};
use log::{debug, error, info};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A page that can be navigated, cleaned and exported.
///
/// Implementations release their browser resources on `Drop`.
pub trait RenderTarget: InsertionSource {
    /// Load `url` and wait for network quiescence, all within `timeout`
    fn navigate(&mut self, url: &str, timeout: Duration, quiescence: Duration) -> Result<()>;

    /// Export the current page as PDF bytes
    fn export_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>>;
}

/// Acquires a fresh, isolated render target per conversion.
pub trait Launcher {
    type Target: RenderTarget;

    /// `budget` is the longest the conversion may keep the target busy; a
    /// backend may use it to size idle timeouts.
    fn launch(&self, viewport: Viewport, budget: Duration) -> Result<Self::Target>;
}

/// Conversion state machine stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Idle,
    Launching,
    Navigating,
    ExcludingInitial,
    Settling,
    Exporting,
    Writing,
    Closed,
    ErrorClosed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a successful conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    /// Where the PDF was written
    pub output: PathBuf,
    pub bytes: usize,
    /// Stages entered, in order, ending with `Closed`
    pub stages: Vec<Stage>,
    /// Initial walk results when exclusions were requested
    pub initial: Option<WalkOutcome>,
    /// Watcher results when exclusions were requested
    pub watched: Option<WatchSummary>,
}

impl ConversionSummary {
    /// Elements removed by the initial walk and the watcher together
    pub fn total_removed(&self) -> usize {
        self.initial.as_ref().map_or(0, |w| w.total_removed())
            + self.watched.as_ref().map_or(0, |w| w.outcome.total_removed())
    }
}

struct Progress {
    stages: Vec<Stage>,
}

impl Progress {
    fn new() -> Self {
        Self {
            stages: vec![Stage::Idle],
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Stage: {} -> {}", self.current(), stage);
        self.stages.push(stage);
    }

    fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Idle)
    }
}

/// Runs conversions with a given launcher and configuration.
pub struct Converter<L> {
    launcher: L,
    config: ConversionConfig,
}

impl<L: Launcher> Converter<L> {
    pub fn new(launcher: L, config: ConversionConfig) -> Self {
        Self { launcher, config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Run one conversion end to end.
    ///
    /// Caller-input errors are reported before any browser is launched. Every
    /// other failure is returned unchanged after the target has been released.
    pub fn run(&self, request: &RenderRequest) -> Result<ConversionSummary> {
        request.validate()?;
        let output = self.resolve_output(request)?;

        let mut progress = Progress::new();
        let result = self.drive(request, &output, &mut progress);
        match result {
            Ok(mut summary) => {
                progress.enter(Stage::Closed);
                summary.stages = progress.stages;
                Ok(summary)
            }
            Err(e) => {
                error!("Conversion failed during {}: {}", progress.current(), e);
                progress.enter(Stage::ErrorClosed);
                Err(e)
            }
        }
    }

    /// Final path for the request: `<root>/<output_dir>/<basename>`.
    pub fn resolve_output(&self, request: &RenderRequest) -> Result<PathBuf> {
        let root = match &self.config.output_root {
            Some(root) => root.clone(),
            None => std::env::current_dir()
                .map_err(|e| Error::Config(format!("Cannot resolve working directory: {}", e)))?,
        };
        Ok(root.join(&self.config.output_dir).join(request.output_file_name()?))
    }

    fn drive(&self, request: &RenderRequest, output: &Path, progress: &mut Progress) -> Result<ConversionSummary> {
        progress.enter(Stage::Launching);
        info!("Launching browser...");
        let mut target = self
            .launcher
            .launch(request.orientation.viewport(), self.budget(request))?;

        progress.enter(Stage::Navigating);
        info!("Navigating to {}...", request.url);
        target.navigate(&request.url, self.config.navigation_timeout, self.config.quiescence_window)?;

        let (initial, watched) = if request.exclusions.is_empty() {
            (None, None)
        } else {
            progress.enter(Stage::ExcludingInitial);
            info!("Excluding elements: {}", request.exclusions);
            let initial = target.walk_observed(&request.exclusions)?;
            info!(
                "Removed {} element(s) across {} scope(s), skipped {} frame(s)",
                initial.total_removed(),
                initial.scopes.len(),
                initial.skipped_frames.len()
            );
            let watched = MutationWatcher::attach(&request.exclusions).run_for(
                &mut target,
                self.config.watch_window,
                self.config.watch_poll,
            )?;
            (Some(initial), Some(watched))
        };

        progress.enter(Stage::Settling);
        if !request.wait.is_zero() {
            info!("Waiting {}ms for dynamic content...", request.wait.as_millis());
            std::thread::sleep(request.wait);
        }

        progress.enter(Stage::Exporting);
        info!("Generating PDF...");
        let bytes = target.export_pdf(&request.pdf_options(self.config.margin_px))?;

        progress.enter(Stage::Writing);
        write_output(output, &bytes)?;
        info!("PDF successfully created: {}", output.display());

        Ok(ConversionSummary {
            output: output.to_path_buf(),
            bytes: bytes.len(),
            stages: Vec::new(),
            initial,
            watched,
        })
    }

    fn budget(&self, request: &RenderRequest) -> Duration {
        let exclusion = if request.exclusions.is_empty() {
            Duration::ZERO
        } else {
            self.config.watch_window
        };
        self.config.navigation_timeout + exclusion + request.wait + Duration::from_secs(30)
    }
}

/// Convert with headless Chrome and the default configuration.
#[cfg(feature = "cdp")]
pub fn convert(request: &RenderRequest) -> Result<ConversionSummary> {
    Converter::new(crate::cdp::CdpLauncher::default(), ConversionConfig::default()).run(request)
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| Error::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| {
        // Do not leave a truncated file behind.
        let _ = fs::remove_file(path);
        Error::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}
