use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, EventConsoleApiCalled};
use chromiumoxide::Page;
use colored::*;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

use crate::config::PageLoadPolicy;

/// Quiet period after which a page counts as network idle.
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);
const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(100);

const NETWORK_STATE_JS: &str = r#"
() => ({
    ready: document.readyState === 'complete',
    resources: performance.getEntriesByType('resource').length,
})
"#;

const ADD_STYLE_TAG_JS: &str = r#"
(css) => {
    const style = document.createElement('style');
    style.textContent = css;
    (document.head || document.documentElement).appendChild(style);
}
"#;

const SCROLL_TO_BOTTOM_JS: &str = r#"
async (scroll) => {
    await new Promise((resolve) => {
        let scrolled = 0;
        const timer = setInterval(() => {
            window.scrollBy(0, scroll.step);
            scrolled += scroll.step;
            if (scrolled >= document.body.scrollHeight) {
                clearInterval(timer);
                resolve();
            }
        }, scroll.delayMs);
    });
}
"#;

/// PDF render settings, in the units the renderer expects (inches).
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub print_background: bool,
    pub display_header_footer: bool,
    pub header_template: String,
    pub footer_template: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.7,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            print_background: true,
            display_header_footer: false,
            header_template: String::new(),
            footer_template: String::new(),
        }
    }
}

/// The single browser tab the whole run is driven through.
///
/// Every call completes before the next one is issued; implementations never
/// see concurrent operations.
#[allow(async_fn_in_trait)]
pub trait PageDriver {
    /// Navigates to `url` and waits according to `policy`.
    async fn goto(&self, url: &Url, policy: PageLoadPolicy) -> Result<()>;

    /// Evaluates a JavaScript expression in the page and returns its value
    /// (`Null` for `null`/`undefined`).
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    async fn add_style_tag(&self, css: &str) -> Result<()>;

    /// Scrolls progressively to the bottom so lazy-loaded media is fetched.
    async fn scroll_to_bottom(&self) -> Result<()>;

    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>>;

    /// Downloads a resource outside of the page.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Builds `(function)(payload)` with the payload serialized as JSON.
pub fn call_function<T: Serialize + ?Sized>(function: &str, payload: &T) -> Result<String> {
    let payload = serde_json::to_string(payload)
        .map_err(|e| anyhow!("Failed to serialize script arguments: {}", e))?;
    Ok(format!("({})({})", function.trim(), payload))
}

#[derive(Debug, Deserialize)]
struct NetworkState {
    ready: bool,
    resources: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrollStep {
    step: u32,
    delay_ms: u32,
}

/// [`PageDriver`] backed by a Chrome tab.
pub struct ChromePage {
    page: Page,
    http: reqwest::Client,
    console_task: JoinHandle<()>,
}

impl ChromePage {
    /// Wraps `page` and starts forwarding its console output to the log.
    pub async fn new(page: Page) -> Result<Self> {
        let mut console = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(|e| anyhow!("Failed to subscribe to console events: {}", e))?;

        let console_task = tokio::spawn(async move {
            while let Some(event) = console.next().await {
                for arg in &event.args {
                    let message = match (&arg.value, &arg.description) {
                        (Some(serde_json::Value::String(s)), _) => s.clone(),
                        (Some(value), _) => value.to_string(),
                        (None, Some(description)) => description.clone(),
                        (None, None) => continue,
                    };
                    info!("{}", message.yellow());
                }
            }
        });

        Ok(Self {
            page,
            http: reqwest::Client::new(),
            console_task,
        })
    }

    async fn wait_for_network_idle(&self) -> Result<()> {
        let script = call_function(NETWORK_STATE_JS, &())?;
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let state: NetworkState = serde_json::from_value(self.evaluate(&script).await?)
                .map_err(|e| anyhow!("Failed to read network state: {}", e))?;

            if last_count != Some(state.resources) {
                last_count = Some(state.resources);
                quiet_since = Instant::now();
            } else if state.ready && quiet_since.elapsed() >= NETWORK_IDLE_WINDOW {
                debug!("Network idle after {} resources", state.resources);
                return Ok(());
            }

            tokio::time::sleep(NETWORK_POLL_INTERVAL).await;
        }
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.console_task.abort();
    }
}

impl PageDriver for ChromePage {
    async fn goto(&self, url: &Url, policy: PageLoadPolicy) -> Result<()> {
        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;

        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| anyhow!("Failed to wait for navigation: {}", e))?;

        match policy {
            PageLoadPolicy::FixedDelay(delay) => {
                info!("{}", "Rendering...".green());
                tokio::time::sleep(delay).await;
            }
            PageLoadPolicy::NetworkIdle => self.wait_for_network_idle().await?,
        }

        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow!("Failed to build evaluation parameters: {}", e))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| anyhow!("Failed to evaluate script in page: {}", e))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn add_style_tag(&self, css: &str) -> Result<()> {
        self.evaluate(&call_function(ADD_STYLE_TAG_JS, css)?)
            .await
            .map_err(|e| anyhow!("Failed to add style tag: {}", e))?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        let step = ScrollStep {
            step: 250,
            delay_ms: 100,
        };
        self.evaluate(&call_function(SCROLL_TO_BOTTOM_JS, &step)?)
            .await
            .map_err(|e| anyhow!("Failed to scroll to the bottom of the page: {}", e))?;
        Ok(())
    }

    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let params = PrintToPdfParams {
            print_background: Some(options.print_background),
            paper_width: Some(options.paper_width),
            paper_height: Some(options.paper_height),
            margin_top: Some(options.margin_top),
            margin_right: Some(options.margin_right),
            margin_bottom: Some(options.margin_bottom),
            margin_left: Some(options.margin_left),
            display_header_footer: Some(options.display_header_footer),
            header_template: options
                .display_header_footer
                .then(|| options.header_template.clone()),
            footer_template: options
                .display_header_footer
                .then(|| options.footer_template.clone()),
            ..Default::default()
        };

        self.page
            .pdf(params)
            .await
            .map_err(|e| anyhow!("Failed to generate PDF: {}", e))
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch {}: {}", url, e))?
            .error_for_status()
            .map_err(|e| anyhow!("Failed to fetch {}: {}", url, e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| anyhow!("Failed to read body of {}: {}", url, e))?;

        Ok(bytes.to_vec())
    }
}
