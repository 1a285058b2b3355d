use anyhow::{anyhow, Result};
use chromiumoxide::{Browser, BrowserConfig};
use colored::*;
use futures_util::StreamExt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::browser::{ChromePage, PageDriver};
use crate::composer::{compose, ComposedDocument};
use crate::config::GeneratorConfig;
use crate::walker::Walker;

const CONTENT_DUMP: &str = "content.html";
const TOC_DUMP: &str = "toc.html";

/// Runs a whole crawl-and-render job with one browser and one tab.
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<()> {
        self.config.validate()?;

        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .request_timeout(self.config.browser.request_timeout)
            .args(self.config.browser.args.iter().map(String::as_str));
        if self.config.browser.with_head {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("Failed to create browser config: {}", e))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(err) = h {
                    // Chrome emits protocol messages chromiumoxide has no types for
                    let err_str = err.to_string();
                    if !err_str.contains("data did not match any variant")
                        && !err_str.contains("untagged enum Message")
                    {
                        error!("Browser handler error: {}", err);
                    } else {
                        debug!("Chrome protocol message ignored: {}", err);
                    }
                }
            }
        });

        let result = self.run_internal(&browser).await;

        browser.close().await.ok();
        handle.abort();

        result
    }

    async fn run_internal(&self, browser: &Browser) -> Result<()> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to create new page: {}", e))?;
        let page = ChromePage::new(page).await?;

        self.generate(&page).await
    }

    /// Crawls, composes and writes every output artifact through `page`.
    pub async fn generate<P: PageDriver>(&self, page: &P) -> Result<()> {
        let config = &self.config;
        let first_url = config
            .seed_urls
            .first()
            .ok_or_else(|| anyhow!("At least one initial document URL is required"))?;

        let walker = Walker {
            exclude_urls: &config.exclude_urls,
            load_policy: config.load_policy,
            extractor: &config.extraction,
            pagination_selector: &config.pagination_selector,
        };
        let content = walker.walk(page, &config.seed_urls).await?;
        info!("Collected content from {} pages", content.len());

        let document = compose(page, first_url, &content, &config.compose).await?;

        write_file(&config.output_path, &document.pdf).await?;
        info!(
            "PDF saved to: {}",
            config.output_path.display().to_string().blue()
        );

        self.write_diagnostics(&document).await;

        Ok(())
    }

    async fn write_diagnostics(&self, document: &ComposedDocument) {
        let dir = &self.config.diagnostics_dir;
        for (name, html) in [
            (CONTENT_DUMP, &document.content_html),
            (TOC_DUMP, &document.toc_html),
        ] {
            let path = dir.join(name);
            match write_file(&path, html.as_bytes()).await {
                Ok(()) => debug!("Wrote {}", path.display()),
                Err(e) => warn!("Failed to write {}: {}", path.display(), e),
            }
        }
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }

    fs::write(path, data)
        .await
        .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))
}
