//! Conversion inputs: the render request and page layout options

use crate::selectors::ExclusionSet;
use crate::{Error, Result, Viewport};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Paper sizes accepted for export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PageFormat {
    /// Paper width and height in inches, portrait
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (8.27, 11.7),
            PageFormat::Letter => (8.5, 11.0),
            PageFormat::Legal => (8.5, 14.0),
        }
    }
}

impl FromStr for PageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageFormat::A4),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            other => Err(Error::Config(format!(
                "unsupported page format '{}' (expected A4, Letter or Legal)",
                other
            ))),
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PageFormat::A4 => "A4",
            PageFormat::Letter => "Letter",
            PageFormat::Legal => "Legal",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn is_landscape(self) -> bool {
        self == Orientation::Landscape
    }

    /// Viewport used while rendering: 1080x1920, swapped in landscape
    pub fn viewport(self) -> Viewport {
        match self {
            Orientation::Portrait => Viewport {
                width: 1080,
                height: 1920,
            },
            Orientation::Landscape => Viewport {
                width: 1920,
                height: 1080,
            },
        }
    }
}

/// Layout handed to the exporter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfOptions {
    pub format: PageFormat,
    pub orientation: Orientation,
    pub scale: f64,
    pub print_background: bool,
    /// Margin on every side, in CSS pixels
    pub margin_px: f64,
}

impl PdfOptions {
    /// Margin converted to inches (96 CSS pixels per inch)
    pub fn margin_inches(&self) -> f64 {
        self.margin_px / 96.0
    }
}

/// The immutable input of one conversion.
///
/// Built once from caller input and validated before any browser work starts.
///
/// ```
/// use pagecut::{ExclusionSet, RenderRequest};
///
/// let request = RenderRequest::new("https://example.com")
///     .with_output("report.pdf")
///     .with_exclusions(ExclusionSet::parse(".ad"));
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRequest {
    pub url: String,
    /// Requested file name; only its last path component is used
    pub output: String,
    /// Extra pause before export
    pub wait: Duration,
    pub format: PageFormat,
    pub orientation: Orientation,
    pub scale: f64,
    pub exclusions: ExclusionSet,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output: "output.pdf".to_string(),
            wait: Duration::from_millis(1000),
            format: PageFormat::A4,
            orientation: Orientation::Portrait,
            scale: 1.0,
            exclusions: ExclusionSet::default(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_format(mut self, format: PageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Reject caller-input errors: a missing or unparsable URL, an output
    /// name without a file component, or a scale the exporter refuses.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("a target URL is required".into()));
        }
        url::Url::parse(self.url.trim()).map_err(|e| Error::Config(format!("invalid URL '{}': {}", self.url, e)))?;
        self.output_file_name()?;
        if !(0.1..=2.0).contains(&self.scale) {
            return Err(Error::Config(format!(
                "scale {} is outside the supported range 0.1-2.0",
                self.scale
            )));
        }
        Ok(())
    }

    /// Last path component of the requested output name.
    pub fn output_file_name(&self) -> Result<&str> {
        Path::new(&self.output)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("output '{}' has no file name", self.output)))
    }

    pub fn pdf_options(&self, margin_px: f64) -> PdfOptions {
        PdfOptions {
            format: self.format,
            orientation: self.orientation,
            scale: self.scale,
            print_background: true,
            margin_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_cli() {
        let r = RenderRequest::new("https://example.com");
        assert_eq!(r.output, "output.pdf");
        assert_eq!(r.wait, Duration::from_millis(1000));
        assert_eq!(r.format, PageFormat::A4);
        assert_eq!(r.orientation, Orientation::Portrait);
        assert_eq!(r.scale, 1.0);
        assert!(r.exclusions.is_empty());
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("letter".parse::<PageFormat>().unwrap(), PageFormat::Letter);
        assert_eq!("LEGAL".parse::<PageFormat>().unwrap(), PageFormat::Legal);
        assert!(matches!("A3".parse::<PageFormat>(), Err(Error::Config(_))));
    }

    #[test]
    fn landscape_swaps_the_viewport() {
        let p = Orientation::Portrait.viewport();
        let l = Orientation::Landscape.viewport();
        assert_eq!((p.width, p.height), (1080, 1920));
        assert_eq!((l.width, l.height), (1920, 1080));
    }

    #[test]
    fn output_keeps_only_the_basename() {
        let r = RenderRequest::new("https://example.com").with_output("../../etc/report.pdf");
        assert_eq!(r.output_file_name().unwrap(), "report.pdf");

        let r = RenderRequest::new("https://example.com").with_output("..");
        assert!(r.validate().is_err());
    }

    #[test]
    fn rejects_missing_or_invalid_urls() {
        assert!(RenderRequest::new("").validate().is_err());
        assert!(RenderRequest::new("not a url").validate().is_err());
        assert!(RenderRequest::new("http://127.0.0.1:8080/").validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_scale() {
        let r = RenderRequest::new("https://example.com").with_scale(3.0);
        assert!(matches!(r.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn margins_convert_to_inches() {
        let opts = RenderRequest::new("https://example.com").pdf_options(96.0);
        assert_eq!(opts.margin_inches(), 1.0);
        assert!(opts.print_background);
    }
}
