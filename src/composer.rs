use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use colored::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{call_function, PageDriver, PdfOptions};
use crate::config::{ComposeOptions, CoverOptions, PageLoadPolicy};
use crate::toc::generate_toc;
use crate::walker::ContentAccumulator;

const ASSEMBLE_BODY_JS: &str = r#"
(doc) => {
    const body = document.body;
    body.innerHTML = '';
    body.innerHTML += doc.coverHtml;
    if (!doc.disableToc) {
        body.innerHTML += doc.tocHtml;
    }
    body.innerHTML += doc.contentHtml;
}
"#;

const REMOVE_MATCHES_JS: &str = r#"
(selector) => {
    document.querySelectorAll(selector).forEach((match) => match.remove());
}
"#;

/// The pieces that replace the live document body, in order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAssembly {
    pub cover_html: String,
    pub toc_html: String,
    pub content_html: String,
    pub disable_toc: bool,
}

impl DocumentAssembly {
    pub fn script(&self) -> Result<String> {
        call_function(ASSEMBLE_BODY_JS, self)
    }
}

/// Output of a composition: the rendered PDF plus the HTML it was built from.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub pdf: Vec<u8>,
    pub content_html: String,
    pub toc_html: String,
}

/// Cover page markup, or an empty string when there is nothing to show.
pub fn cover_html(cover: &CoverOptions, image_base64: &str) -> String {
    if cover.is_empty() {
        return String::new();
    }

    let title = if cover.title.is_empty() {
        String::new()
    } else {
        format!("<h1>{}</h1>", cover.title)
    };
    let subtitle = if cover.subtitle.is_empty() {
        String::new()
    } else {
        format!("<h3>{}</h3>", cover.subtitle)
    };

    format!(
        r#"
  <div
    class="pdf-cover"
    style="
      display: flex;
      flex-direction: column;
      justify-content: center;
      align-items: center;
      height: 100vh;
      page-break-after: always;
      text-align: center;
    "
  >
    {}
    {}
    <img
      class="cover-img"
      src="data:image/png;base64, {}"
      alt=""
      width="140"
      height="140"
    />
  </div>"#,
        title, subtitle, image_base64
    )
}

/// PDF settings derived from the compose options; header and footer are only
/// displayed when at least one template is set.
pub fn pdf_options(options: &ComposeOptions) -> PdfOptions {
    let (paper_width, paper_height) = options.format.dimensions();
    let (margin_top, margin_right, margin_bottom, margin_left) = options.margin.to_inches();

    PdfOptions {
        paper_width,
        paper_height,
        margin_top,
        margin_right,
        margin_bottom,
        margin_left,
        print_background: true,
        display_header_footer: !options.header_template.is_empty()
            || !options.footer_template.is_empty(),
        header_template: options.header_template.clone(),
        footer_template: options.footer_template.clone(),
    }
}

async fn cover_image_base64<P: PageDriver>(page: &P, image_url: Option<&Url>) -> String {
    let Some(image_url) = image_url else {
        return String::new();
    };

    match page.fetch(image_url).await {
        Ok(bytes) => {
            debug!("Downloaded cover image ({} bytes)", bytes.len());
            BASE64.encode(bytes)
        }
        Err(e) => {
            warn!("Cover image unavailable, rendering cover without it: {}", e);
            String::new()
        }
    }
}

/// Builds the final document in the browser and renders it to PDF.
pub async fn compose<P: PageDriver>(
    page: &P,
    first_url: &Url,
    content: &ContentAccumulator,
    options: &ComposeOptions,
) -> Result<ComposedDocument> {
    let image_base64 = cover_image_base64(page, options.cover.image_url.as_ref()).await;
    let cover_html = cover_html(&options.cover, &image_base64);

    page.goto(first_url, PageLoadPolicy::NetworkIdle).await?;

    let raw_content = content.html();
    let toc = generate_toc(&raw_content);
    info!("Table of contents has {} entries", toc.headings.len());

    let assembly = DocumentAssembly {
        cover_html,
        toc_html: toc.toc_html.clone(),
        content_html: toc.content_html,
        disable_toc: options.disable_toc,
    };
    page.evaluate(&assembly.script()?)
        .await
        .map_err(|e| anyhow!("Failed to assemble document: {}", e))?;

    for selector in &options.exclude_selectors {
        debug!("Removing elements matching {}", selector);
        page.evaluate(&call_function(REMOVE_MATCHES_JS, selector.as_str())?)
            .await
            .map_err(|e| anyhow!("Failed to remove \"{}\": {}", selector, e))?;
    }

    if !options.css_style.is_empty() {
        page.add_style_tag(&options.css_style).await?;
    }

    page.scroll_to_bottom().await?;

    info!("Rendering {} PDF...", options.format.to_string().blue());
    let pdf = page.pdf(&pdf_options(options)).await?;

    Ok(ComposedDocument {
        pdf,
        content_html: raw_content,
        toc_html: toc.toc_html,
    })
}
