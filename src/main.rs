use anyhow::Result;
use clap::Parser;
use colored::*;
use docs2pdf::{
    parse_url, BrowserOptions, ComposeOptions, CoverOptions, ExtractionRules, Generator,
    GeneratorConfig, PageLoadPolicy, PdfFormat, PdfMargin,
};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docs2pdf")]
#[command(about = "CLI utility to turn a paginated documentation website into a single PDF")]
#[command(version = "0.1.0")]
struct Args {
    /// URLs to start from, comma separated; each one is followed through its "next" links
    #[arg(long = "initial-doc-urls", alias = "initialDocURLs", value_delimiter = ',', required = true)]
    initial_doc_urls: Vec<String>,

    /// URLs that are visited but left out of the PDF, comma separated
    #[arg(long = "exclude-urls", alias = "excludeURLs", value_delimiter = ',')]
    exclude_urls: Vec<String>,

    /// Output PDF path (defaults to the first URL's host name)
    #[arg(short = 'o', long = "output", alias = "outputPDFFilename")]
    output: Option<PathBuf>,

    /// Page margins in pixels: "all", "vertical,horizontal" or "top,right,bottom,left"
    #[arg(long = "pdf-margin", alias = "pdfMargin", default_value = "32,32,32,32")]
    pdf_margin: PdfMargin,

    /// CSS selector of the content region of each page
    #[arg(long = "content-selector", alias = "contentSelector", default_value = "article")]
    content_selector: String,

    /// CSS selector of the link to the next page
    #[arg(long = "pagination-selector", alias = "paginationSelector", default_value = ".pagination-nav__link--next")]
    pagination_selector: String,

    /// Paper format (Letter, Legal, Tabloid, Ledger, A0-A6)
    #[arg(long = "pdf-format", alias = "pdfFormat", default_value = "A4")]
    pdf_format: PdfFormat,

    /// CSS selectors of elements removed from the final document, comma separated
    #[arg(long = "exclude-selectors", alias = "excludeSelectors", value_delimiter = ',')]
    exclude_selectors: Vec<String>,

    /// Extra CSS added to the final document
    #[arg(long = "css-style", alias = "cssStyle", default_value = "")]
    css_style: String,

    /// Additional browser launch flags, comma separated
    #[arg(long = "browser-args", alias = "puppeteerArgs", value_delimiter = ',')]
    browser_args: Vec<String>,

    /// Cover page title
    #[arg(long = "cover-title", alias = "coverTitle", default_value = "")]
    cover_title: String,

    /// Cover page subtitle
    #[arg(long = "cover-sub", alias = "coverSub", default_value = "")]
    cover_sub: String,

    /// URL of the cover page image
    #[arg(long = "cover-image", alias = "coverImage")]
    cover_image: Option<String>,

    /// Don't generate a table of contents
    #[arg(long = "disable-toc", alias = "disableTOC")]
    disable_toc: bool,

    /// Milliseconds to wait after each navigation instead of waiting for the network to go idle
    #[arg(long = "wait-for-render", alias = "waitForRender", default_value = "0")]
    wait_for_render: u64,

    /// HTML template for the print header
    #[arg(long = "header-template", alias = "headerTemplate", default_value = "")]
    header_template: String,

    /// HTML template for the print footer
    #[arg(long = "footer-template", alias = "footerTemplate", default_value = "")]
    footer_template: String,

    /// Show the browser window
    #[arg(long = "with-head")]
    with_head: bool,

    /// Browser request timeout in seconds
    #[arg(short = 't', long = "timeout", default_value = "30.0", value_parser = parse_timeout)]
    timeout: f64,

    /// Directory for the intermediate content.html and toc.html files
    #[arg(long = "diagnostics-dir", default_value = "temp")]
    diagnostics_dir: PathBuf,
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if !value.is_finite() || value < 0.0 {
        return Err("Must be zero or positive number.".to_string());
    }
    Ok(value)
}

fn non_empty(values: Vec<String>) -> impl Iterator<Item = String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Args {
    fn into_config(self) -> Result<GeneratorConfig> {
        let seed_urls = non_empty(self.initial_doc_urls)
            .map(|url| parse_url(&url))
            .collect::<Result<Vec<_>>>()?;
        let exclude_urls = non_empty(self.exclude_urls)
            .map(|url| parse_url(&url))
            .collect::<Result<_>>()?;
        let image_url = self
            .cover_image
            .filter(|url| !url.trim().is_empty())
            .map(|url| parse_url(&url))
            .transpose()?;

        let output_path = match (self.output, seed_urls.first()) {
            (Some(path), _) => path,
            (None, Some(seed)) => GeneratorConfig::default_output_path(seed),
            (None, None) => PathBuf::from("docs.pdf"),
        };

        Ok(GeneratorConfig {
            seed_urls,
            exclude_urls,
            output_path,
            diagnostics_dir: self.diagnostics_dir,
            pagination_selector: self.pagination_selector,
            load_policy: PageLoadPolicy::from_delay_ms(self.wait_for_render),
            extraction: ExtractionRules::new(self.content_selector),
            compose: ComposeOptions {
                cover: CoverOptions {
                    title: self.cover_title,
                    subtitle: self.cover_sub,
                    image_url,
                },
                disable_toc: self.disable_toc,
                exclude_selectors: non_empty(self.exclude_selectors).collect(),
                css_style: self.css_style,
                format: self.pdf_format,
                margin: self.pdf_margin,
                header_template: self.header_template,
                footer_template: self.footer_template,
            },
            browser: BrowserOptions {
                args: non_empty(self.browser_args).collect(),
                with_head: self.with_head,
                request_timeout: Duration::from_secs_f64(self.timeout),
            },
        })
    }
}

#[tokio::main]
async fn main() {
    // Set up logging with chromiumoxide errors suppressed
    let filter = EnvFilter::from_default_env()
        .add_directive("chromiumoxide::conn=off".parse().expect("valid log directive"))
        .add_directive("chromiumoxide::handler=off".parse().expect("valid log directive"))
        .add_directive("docs2pdf=info".parse().expect("valid log directive"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    let result = match args.into_config() {
        Ok(config) => Generator::new(config).run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}
