use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::debug;

use crate::browser::{call_function, PageDriver};
use crate::toc::ON_THIS_PAGE;

/// In-page rules that normalize one page's content region before it is
/// serialized. The function body runs inside the browser and only sees the
/// JSON payload it is called with.
const EXTRACT_CONTENT_JS: &str = r#"
(rules) => {
    const element = document.querySelector(rules.contentSelector);
    if (!element) {
        return '';
    }

    element.style.pageBreakAfter = 'always';

    for (const details of element.getElementsByTagName('details')) {
        details.open = true;
    }

    for (const container of Array.from(element.getElementsByClassName(rules.tabsContainerClass))) {
        const titles = Array.from(container.getElementsByClassName(rules.tabItemClass));
        const panels = container.lastElementChild
            ? Array.from(container.lastElementChild.children)
            : [];
        panels.forEach((panel) => panel.removeAttribute('hidden'));

        const flattened = document.createElement('div');
        titles.forEach((title, index) => {
            const panel = panels[index];
            if (!panel) {
                return;
            }
            const tab = document.createElement('div');
            tab.classList.add(rules.tabBlockClass);
            const list = document.createElement('ul');
            list.setAttribute('role', 'tablist');
            list.setAttribute('aria-orientation', 'horizontal');
            list.setAttribute('class', rules.tabListClass);
            title.classList.add(rules.tabActiveClass);
            tab.appendChild(list);
            list.appendChild(title);
            panel.style.border = '1px solid #ccc';
            tab.appendChild(panel);
            flattened.appendChild(tab);
        });
        container.innerHTML = flattened.innerHTML;
    }

    const pathPrefix = document.location.pathname.split('/').join('_').substring(1);
    const headings = Array.from(element.getElementsByTagName('h1'))
        .concat(Array.from(element.getElementsByTagName('h2')))
        .concat(Array.from(element.getElementsByTagName('h3')));
    for (const heading of headings) {
        if (heading.innerText === rules.skipHeadingText) {
            continue;
        }
        if (heading.tagName !== 'H1' && !heading.id) {
            continue;
        }
        heading.id = pathPrefix + heading.id;
        if (heading.id === '') {
            heading.id = heading.innerText.split(' ').join('-');
        }
    }

    const scheme = /^[a-zA-Z][a-zA-Z0-9+.-]*:/;
    for (const link of Array.from(element.getElementsByTagName('a'))) {
        const href = link.getAttribute('href') || '';
        if (scheme.test(href) || href.startsWith('#')) {
            continue;
        }
        link.setAttribute('href', '#' + href.split('/').join('_'));
    }

    return element.outerHTML;
}
"#;

const NEXT_PAGE_JS: &str = r#"
(selector) => {
    const element = document.querySelector(selector);
    return element && element.href ? String(element.href) : null;
}
"#;

/// Produces the normalized HTML fragment for the page currently loaded.
#[allow(async_fn_in_trait)]
pub trait Extractor {
    async fn extract<P: PageDriver>(&self, page: &P) -> Result<String>;
}

/// Selector and markup conventions handed to the in-page extraction function.
///
/// Defaults match Docusaurus themes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRules {
    pub content_selector: String,
    pub skip_heading_text: String,
    pub tabs_container_class: String,
    pub tab_item_class: String,
    pub tab_active_class: String,
    pub tab_list_class: String,
    pub tab_block_class: String,
}

impl ExtractionRules {
    pub fn new(content_selector: impl Into<String>) -> Self {
        Self {
            content_selector: content_selector.into(),
            skip_heading_text: ON_THIS_PAGE.to_string(),
            tabs_container_class: "tabs-container".to_string(),
            tab_item_class: "tabs__item".to_string(),
            tab_active_class: "tabs__item--active".to_string(),
            tab_list_class: "tabs".to_string(),
            tab_block_class: "margin-top--md".to_string(),
        }
    }

    /// Expression that applies the rules and evaluates to the outer HTML of
    /// the content region, or `""` when the selector matches nothing.
    pub fn script(&self) -> Result<String> {
        call_function(EXTRACT_CONTENT_JS, self)
    }
}

impl Extractor for ExtractionRules {
    async fn extract<P: PageDriver>(&self, page: &P) -> Result<String> {
        let value = page.evaluate(&self.script()?).await?;
        let html: Option<String> = serde_json::from_value(value)
            .map_err(|e| anyhow!("Extraction returned an unexpected value: {}", e))?;
        let html = html.unwrap_or_default();
        debug!("Extracted {} bytes of content", html.len());
        Ok(html)
    }
}

/// Expression that evaluates to the resolved `href` of the element matched by
/// `selector`, or `null`.
pub fn next_page_script(selector: &str) -> Result<String> {
    call_function(NEXT_PAGE_JS, selector)
}
