use anyhow::{anyhow, bail, Result};
use scraper::Selector;
use slug::slugify;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::extractor::ExtractionRules;

/// CSS pixels per inch, used to convert margins for the PDF renderer.
const PX_PER_INCH: f64 = 96.0;

/// How long to wait after navigating to a page before reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoadPolicy {
    /// Sleep for a fixed delay after the navigation completes.
    FixedDelay(Duration),
    /// Wait until the page stops requesting resources, without an upper bound.
    NetworkIdle,
}

impl PageLoadPolicy {
    /// A zero delay means "wait for the network instead".
    pub fn from_delay_ms(delay_ms: u64) -> Self {
        if delay_ms == 0 {
            Self::NetworkIdle
        } else {
            Self::FixedDelay(Duration::from_millis(delay_ms))
        }
    }
}

/// Paper sizes understood by the renderer, named as browsers name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PdfFormat {
    Letter,
    Legal,
    Tabloid,
    Ledger,
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
    A5,
    A6,
}

impl PdfFormat {
    /// Paper width and height in inches.
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            Self::Letter => (8.5, 11.0),
            Self::Legal => (8.5, 14.0),
            Self::Tabloid => (11.0, 17.0),
            Self::Ledger => (17.0, 11.0),
            Self::A0 => (33.1, 46.8),
            Self::A1 => (23.4, 33.1),
            Self::A2 => (16.54, 23.4),
            Self::A3 => (11.7, 16.54),
            Self::A4 => (8.27, 11.7),
            Self::A5 => (5.83, 8.27),
            Self::A6 => (4.13, 5.83),
        }
    }
}

impl FromStr for PdfFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "letter" => Self::Letter,
            "legal" => Self::Legal,
            "tabloid" => Self::Tabloid,
            "ledger" => Self::Ledger,
            "a0" => Self::A0,
            "a1" => Self::A1,
            "a2" => Self::A2,
            "a3" => Self::A3,
            "a4" => Self::A4,
            "a5" => Self::A5,
            "a6" => Self::A6,
            other => return Err(format!("Unsupported PDF format: {}", other)),
        };
        Ok(format)
    }
}

impl fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Page margins in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for PdfMargin {
    fn default() -> Self {
        Self {
            top: 32.0,
            right: 32.0,
            bottom: 32.0,
            left: 32.0,
        }
    }
}

impl PdfMargin {
    /// Margins as `(top, right, bottom, left)` in inches.
    pub fn to_inches(self) -> (f64, f64, f64, f64) {
        (
            self.top / PX_PER_INCH,
            self.right / PX_PER_INCH,
            self.bottom / PX_PER_INCH,
            self.left / PX_PER_INCH,
        )
    }
}

impl FromStr for PdfMargin {
    type Err = String;

    /// Accepts `"all"`, `"vertical,horizontal"` or `"top,right,bottom,left"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| {
                let value = part
                    .trim()
                    .trim_end_matches("px")
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid margin value: {}", part.trim()))?;
                if !value.is_finite() || value < 0.0 {
                    return Err("Margins must be zero or positive.".to_string());
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            [all] => Ok(Self { top: *all, right: *all, bottom: *all, left: *all }),
            [vertical, horizontal] => Ok(Self {
                top: *vertical,
                right: *horizontal,
                bottom: *vertical,
                left: *horizontal,
            }),
            [top, right, bottom, left] => Ok(Self {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            }),
            _ => Err("Expected 1, 2 or 4 comma-separated margin values.".to_string()),
        }
    }
}

/// Cover page contents. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct CoverOptions {
    pub title: String,
    pub subtitle: String,
    pub image_url: Option<Url>,
}

impl CoverOptions {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.subtitle.is_empty() && self.image_url.is_none()
    }
}

/// Everything the composer needs to turn the crawled content into a PDF.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub cover: CoverOptions,
    pub disable_toc: bool,
    pub exclude_selectors: Vec<String>,
    pub css_style: String,
    pub format: PdfFormat,
    pub margin: PdfMargin,
    pub header_template: String,
    pub footer_template: String,
}

/// Browser process settings.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub args: Vec<String>,
    pub with_head: bool,
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            with_head: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A validated run configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub seed_urls: Vec<Url>,
    pub exclude_urls: HashSet<Url>,
    pub output_path: PathBuf,
    pub diagnostics_dir: PathBuf,
    pub pagination_selector: String,
    pub load_policy: PageLoadPolicy,
    pub extraction: ExtractionRules,
    pub compose: ComposeOptions,
    pub browser: BrowserOptions,
}

impl GeneratorConfig {
    /// Output file name derived from the first seed's host, e.g. `docs-example-com.pdf`.
    pub fn default_output_path(seed: &Url) -> PathBuf {
        let host_slug = slugify(seed.host_str().unwrap_or("docs").replace('.', "-"));
        PathBuf::from(format!("{}.pdf", host_slug))
    }

    /// Rejects configurations that would only fail once the browser is running.
    pub fn validate(&self) -> Result<()> {
        if self.seed_urls.is_empty() {
            bail!("At least one initial document URL is required");
        }

        validate_selector("content", &self.extraction.content_selector)?;
        validate_selector("pagination", &self.pagination_selector)?;
        for selector in &self.compose.exclude_selectors {
            validate_selector("exclude", selector)?;
        }

        if self.output_path.as_os_str().is_empty() {
            bail!("Output PDF path must not be empty");
        }

        Ok(())
    }
}

fn validate_selector(kind: &str, selector: &str) -> Result<()> {
    if selector.trim().is_empty() {
        bail!("The {} selector must not be empty", kind);
    }
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| anyhow!("Invalid {} selector \"{}\": {:?}", kind, selector, e))
}

/// Parses a URL given on the command line.
pub fn parse_url(s: &str) -> Result<Url> {
    Url::parse(s.trim()).map_err(|e| anyhow!("Invalid URL \"{}\": {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GeneratorConfig {
        let seed = parse_url("https://docs.example.com/intro").unwrap();
        GeneratorConfig {
            output_path: GeneratorConfig::default_output_path(&seed),
            seed_urls: vec![seed],
            exclude_urls: HashSet::new(),
            diagnostics_dir: PathBuf::from("temp"),
            pagination_selector: ".pagination-nav__link--next".into(),
            load_policy: PageLoadPolicy::NetworkIdle,
            extraction: ExtractionRules::new("article"),
            compose: ComposeOptions::default(),
            browser: BrowserOptions::default(),
        }
    }

    #[test]
    fn parses_formats_case_insensitively() {
        assert_eq!("a4".parse::<PdfFormat>().unwrap(), PdfFormat::A4);
        assert_eq!("Letter".parse::<PdfFormat>().unwrap(), PdfFormat::Letter);
        assert_eq!(PdfFormat::Ledger.dimensions(), (17.0, 11.0));
        assert!("B5".parse::<PdfFormat>().is_err());
    }

    #[test]
    fn parses_margin_shorthands() {
        let all: PdfMargin = "10".parse().unwrap();
        assert_eq!(all, PdfMargin { top: 10.0, right: 10.0, bottom: 10.0, left: 10.0 });

        let pair: PdfMargin = "10px, 20px".parse().unwrap();
        assert_eq!(pair, PdfMargin { top: 10.0, right: 20.0, bottom: 10.0, left: 20.0 });

        let four: PdfMargin = "1,2,3,4".parse().unwrap();
        assert_eq!(four, PdfMargin { top: 1.0, right: 2.0, bottom: 3.0, left: 4.0 });

        assert!("1,2,3".parse::<PdfMargin>().is_err());
        assert!("-1".parse::<PdfMargin>().is_err());
        assert!("abc".parse::<PdfMargin>().is_err());
        assert!("NaN".parse::<PdfMargin>().is_err());
        assert!("10,inf".parse::<PdfMargin>().is_err());
    }

    #[test]
    fn margins_convert_to_inches() {
        let (top, right, bottom, left) = PdfMargin::default().to_inches();
        assert!((top - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(top, right);
        assert_eq!(bottom, left);
    }

    #[test]
    fn zero_delay_means_network_idle() {
        assert_eq!(PageLoadPolicy::from_delay_ms(0), PageLoadPolicy::NetworkIdle);
        assert_eq!(
            PageLoadPolicy::from_delay_ms(1500),
            PageLoadPolicy::FixedDelay(Duration::from_millis(1500))
        );
    }

    #[test]
    fn default_output_uses_host_slug() {
        let seed = parse_url("https://docs.example.com/intro").unwrap();
        assert_eq!(
            GeneratorConfig::default_output_path(&seed),
            PathBuf::from("docs-example-com.pdf")
        );
    }

    #[test]
    fn validates_selectors_and_seeds() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.pagination_selector = "!!next".into();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.compose.exclude_selectors = vec![".ok".into(), "!bad".into()];
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.seed_urls.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn cover_is_empty_only_without_title_subtitle_and_image() {
        assert!(CoverOptions::default().is_empty());
        let cover = CoverOptions { title: "Guide".into(), ..Default::default() };
        assert!(!cover.is_empty());
    }
}
