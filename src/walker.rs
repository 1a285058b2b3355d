use anyhow::{anyhow, Result};
use colored::*;
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

use crate::browser::PageDriver;
use crate::config::PageLoadPolicy;
use crate::extractor::{next_page_script, Extractor};

/// A page about to be visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageJob {
    pub url: Url,
    pub is_excluded: bool,
}

impl PageJob {
    fn new(url: Url, exclude_urls: &HashSet<Url>) -> Self {
        let is_excluded = exclude_urls.contains(&url);
        Self { url, is_excluded }
    }
}

/// Content fragments of every non-excluded page, in visit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentAccumulator {
    fragments: Vec<String>,
}

impl ContentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: String) {
        self.fragments.push(fragment);
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// All fragments joined into one HTML string.
    pub fn html(&self) -> String {
        self.fragments.concat()
    }
}

/// Settings that stay fixed for the whole crawl.
pub struct Walker<'a, E> {
    pub exclude_urls: &'a HashSet<Url>,
    pub load_policy: PageLoadPolicy,
    pub extractor: &'a E,
    pub pagination_selector: &'a str,
}

impl<E: Extractor> Walker<'_, E> {
    /// Follows the "next page" chain from each seed in turn and collects the
    /// content of every visited page that is not excluded.
    ///
    /// A cycle in the chain never terminates.
    pub async fn walk<P: PageDriver>(&self, page: &P, seed_urls: &[Url]) -> Result<ContentAccumulator> {
        let mut content = ContentAccumulator::new();

        for seed in seed_urls {
            let mut next = Some(PageJob::new(seed.clone(), self.exclude_urls));

            while let Some(job) = next {
                info!("Retrieving html from {}", job.url.to_string().cyan());

                page.goto(&job.url, self.load_policy).await?;

                let html = self.extractor.extract(page).await?;

                if job.is_excluded {
                    info!("{}", "This URL is excluded.".green());
                } else {
                    content.push(html);
                    info!("{}", "Success".green());
                }

                next = self
                    .next_page_url(page)
                    .await?
                    .map(|url| PageJob::new(url, self.exclude_urls));
            }
        }

        debug!("Collected {} content fragments", content.len());
        Ok(content)
    }

    async fn next_page_url<P: PageDriver>(&self, page: &P) -> Result<Option<Url>> {
        let value = page.evaluate(&next_page_script(self.pagination_selector)?).await?;
        let href: Option<String> = serde_json::from_value(value)
            .map_err(|e| anyhow!("Pagination lookup returned an unexpected value: {}", e))?;

        match href.filter(|href| !href.is_empty()) {
            Some(href) => Url::parse(&href)
                .map(Some)
                .map_err(|e| anyhow!("Invalid next page URL \"{}\": {}", href, e)),
            None => Ok(None),
        }
    }
}
