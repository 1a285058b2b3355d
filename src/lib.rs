//! # docs2pdf
//!
//! A CLI utility that walks a paginated documentation website in a headless
//! browser and renders every page into one PDF, with an optional cover page
//! and a table of contents.
//!
//! ## How it works
//!
//! - [`Walker`] follows the site's "next page" link from each seed URL and
//!   collects the content region of every page
//! - [`ExtractionRules`] normalize each page in the browser before it is
//!   collected (open `<details>`, flatten tabs, qualify heading ids, turn
//!   internal links into in-document anchors)
//! - [`generate_toc`] builds the table of contents from the collected headings
//! - [`compose`] assembles cover, TOC and content in the browser and prints it
//!
//! ## Usage
//!
//! ```bash
//! docs2pdf --initial-doc-urls https://docusaurus.io/docs \
//!     --content-selector article \
//!     --pagination-selector ".pagination-nav__link--next"
//! ```

mod browser;
mod composer;
mod config;
mod extractor;
mod generator;
mod toc;
mod walker;

pub use browser::{ChromePage, PageDriver, PdfOptions};
pub use composer::{compose, cover_html, ComposedDocument, DocumentAssembly};
pub use config::{
    parse_url, BrowserOptions, ComposeOptions, CoverOptions, GeneratorConfig, PageLoadPolicy,
    PdfFormat, PdfMargin,
};
pub use extractor::{ExtractionRules, Extractor};
pub use generator::Generator;
pub use toc::{generate_toc, HeadingRecord, TableOfContents};
pub use walker::{ContentAccumulator, PageJob, Walker};
