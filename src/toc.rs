use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

/// Heading text that documentation themes render for their in-page outline.
pub const ON_THIS_PAGE: &str = "On this page";

/// Left indentation, in pixels, per heading level below 1.
const INDENT_PX: u8 = 20;

// `.` never crosses a newline, so headings spread over several lines are left alone.
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<h1(?:.+?)</h1 *>|<h2(?:.+?)</h2 *>|<h3(?:.+?)</h3 *>")
        .expect("heading pattern is valid")
});

static OPENING_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<h[1-3][^>]*>").expect("opening tag pattern is valid"));

// Whitespace before `id` keeps `data-id` and similar attributes out of the match.
static ID_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+id\s*=\s*"([^"]*)""#).expect("id pattern is valid"));

static PERMALINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a[^>]*>#</a *>").expect("permalink pattern is valid"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// A level 1-3 heading found in the assembled content, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRecord {
    pub text: String,
    pub level: u8,
    pub id: String,
}

impl HeadingRecord {
    /// Anchor target for the TOC link.
    pub fn href(&self) -> String {
        if self.id.starts_with('#') {
            self.id.clone()
        } else {
            format!("#{}", self.id)
        }
    }

    fn to_toc_item(&self) -> String {
        format!(
            r#"<li class="toc-item toc-item-{level}" style="margin-left:{margin}px"><a href="{href}">{text}</a></li>"#,
            level = self.level,
            margin = u32::from(self.level.saturating_sub(1)) * u32::from(INDENT_PX),
            href = self.href(),
            text = self.text,
        )
    }
}

/// Result of running the TOC generator over concatenated page content.
#[derive(Debug, Clone)]
pub struct TableOfContents {
    pub content_html: String,
    pub toc_html: String,
    pub headings: Vec<HeadingRecord>,
}

/// Scans `content_html` for h1-h3 headings, normalizes their `id` attribute
/// and renders a TOC that links to them.
///
/// Ids are read from the markup, never generated: headings were already given
/// path-qualified ids while each page was extracted.
pub fn generate_toc(content_html: &str) -> TableOfContents {
    let mut headings = Vec::new();

    let content_html = HEADING_RE
        .replace_all(content_html, |caps: &Captures| {
            let matched = &caps[0];
            let (rewritten, record) = rewrite_heading(matched);
            if let Some(record) = record {
                headings.push(record);
            }
            rewritten
        })
        .into_owned();

    debug!("Found {} headings for the table of contents", headings.len());

    let items = headings
        .iter()
        .map(HeadingRecord::to_toc_item)
        .collect::<Vec<_>>()
        .join("\n");

    let toc_html = format!(
        r#"
  <div class="toc-page" style="page-break-after: always;">
    <h1 class="toc-header">Table of contents:</h1>
    <ul class="toc-list">{}</ul>
  </div>
  "#,
        items
    );

    TableOfContents {
        content_html,
        toc_html,
        headings,
    }
}

fn rewrite_heading(matched: &str) -> (String, Option<HeadingRecord>) {
    let without_permalinks = PERMALINK_RE.replace_all(matched, "");
    let text = TAG_RE
        .replace_all(&without_permalinks, "")
        .trim()
        .to_string();

    // Both patterns match from the start of `matched`, which always opens with `<hN`.
    let Some(opening) = OPENING_TAG_RE.find(matched) else {
        return (matched.to_string(), None);
    };
    let opening = opening.as_str();

    let id = ID_ATTR_RE
        .captures(opening)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default();

    let level = matched.as_bytes()[2] - b'0';

    let bare_opening = ID_ATTR_RE.replace_all(opening, "");
    let normalized_opening = format!(
        r#"{} id="{}">"#,
        bare_opening.trim_end_matches('>').trim_end(),
        id
    );
    let rewritten = format!("{}{}", normalized_opening, &matched[opening.len()..]);

    if text == ON_THIS_PAGE {
        return (rewritten, None);
    }

    (rewritten, Some(HeadingRecord { text, level, id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn toc_items(toc_html: &str) -> Vec<(String, String, String)> {
        let fragment = Html::parse_fragment(toc_html);
        let item = Selector::parse("li.toc-item").unwrap();
        let link = Selector::parse("a").unwrap();
        fragment
            .select(&item)
            .map(|li| {
                let a = li.select(&link).next().unwrap();
                (
                    li.value().attr("style").unwrap_or_default().to_string(),
                    a.value().attr("href").unwrap_or_default().to_string(),
                    a.text().collect::<String>(),
                )
            })
            .collect()
    }

    #[test]
    fn records_headings_in_document_order() {
        let html = r#"<article><h1 id="docs_introa">Intro</h1><p>x</p><h2 id="docs_introb">Details</h2><h3 id="docs_introc">More</h3></article>"#;
        let toc = generate_toc(html);

        assert_eq!(
            toc.headings,
            vec![
                HeadingRecord { text: "Intro".into(), level: 1, id: "docs_introa".into() },
                HeadingRecord { text: "Details".into(), level: 2, id: "docs_introb".into() },
                HeadingRecord { text: "More".into(), level: 3, id: "docs_introc".into() },
            ]
        );

        let items = toc_items(&toc.toc_html);
        assert_eq!(
            items,
            vec![
                ("margin-left:0px".into(), "#docs_introa".into(), "Intro".into()),
                ("margin-left:20px".into(), "#docs_introb".into(), "Details".into()),
                ("margin-left:40px".into(), "#docs_introc".into(), "More".into()),
            ]
        );
        assert!(toc.toc_html.contains("Table of contents:"));
    }

    #[test]
    fn skips_on_this_page_heading_but_keeps_markup() {
        let html = r#"<h2 id="x">On this page</h2><h2 id="y">Usage</h2>"#;
        let toc = generate_toc(html);

        assert_eq!(toc.headings.len(), 1);
        assert_eq!(toc.headings[0].text, "Usage");
        assert!(!toc.toc_html.contains(ON_THIS_PAGE));
        assert!(toc.content_html.contains(ON_THIS_PAGE));
    }

    #[test]
    fn strips_permalink_anchor_and_inner_tags_from_text() {
        let html = r##"<h2 class="anchor" id="setup">Set <code>up</code> <a class="hash-link" href="#setup">#</a></h2>"##;
        let toc = generate_toc(html);

        assert_eq!(toc.headings[0].text, "Set up");
        assert_eq!(toc.headings[0].id, "setup");
    }

    #[test]
    fn id_comes_from_opening_tag_only() {
        let html = r##"<h2>Plain <a href="#elsewhere" id="inner">link</a></h2>"##;
        let toc = generate_toc(html);

        assert_eq!(toc.headings[0].id, "");
        assert_eq!(toc.headings[0].href(), "#");
        assert!(toc.content_html.starts_with(r#"<h2 id="">"#));
    }

    #[test]
    fn data_id_attribute_is_not_taken_for_the_id() {
        let toc = generate_toc(r#"<h2 data-id="x" id="docs_y">Y</h2>"#);

        assert_eq!(toc.headings[0].id, "docs_y");
        assert_eq!(toc.content_html, r#"<h2 data-id="x" id="docs_y">Y</h2>"#);
    }

    #[test]
    fn hash_prefixed_id_is_used_verbatim() {
        let toc = generate_toc(r##"<h1 id="#top">Top</h1>"##);
        let items = toc_items(&toc.toc_html);
        assert_eq!(items[0].1, "#top");
    }

    #[test]
    fn opening_tag_carries_exactly_one_id() {
        let toc = generate_toc(r#"<h1 class="title" id="a" >Intro</h1>"#);
        assert_eq!(toc.content_html, r#"<h1 class="title" id="a">Intro</h1>"#);
        assert_eq!(toc.content_html.matches("id=").count(), 1);
    }

    #[test]
    fn rerunning_keeps_ids_and_markup() {
        let html = r#"<div><h1 id="p_a">A</h1><h2>B</h2><h3 id="p_c">C</h3></div>"#;
        let first = generate_toc(html);
        let second = generate_toc(&first.content_html);

        assert_eq!(first.content_html, second.content_html);
        assert_eq!(first.headings, second.headings);
    }

    #[test]
    fn match_ends_at_close_tag_of_same_level() {
        let html = r#"<h1 id="outer">Title<h3>sub</h3> tail</h1>"#;
        let toc = generate_toc(html);

        assert_eq!(toc.headings.len(), 1);
        assert_eq!(toc.headings[0].level, 1);
        assert_eq!(toc.headings[0].text, "Titlesub tail");
    }

    #[test]
    fn multiline_heading_is_not_matched() {
        let toc = generate_toc("<h2 id=\"a\">\nSplit\n</h2>");
        assert!(toc.headings.is_empty());
    }

    #[test]
    fn toc_item_count_matches_heading_count() {
        let html = (1..=3)
            .map(|n| format!(r#"<h{n} id="h{n}">Heading {n}</h{n}><h2>On this page</h2>"#))
            .collect::<String>();
        let toc = generate_toc(&html);

        assert_eq!(toc.headings.len(), 3);
        assert_eq!(toc_items(&toc.toc_html).len(), 3);
    }

    #[test]
    fn ignores_h4_and_other_h_tags() {
        let toc = generate_toc(r#"<h4 id="x">Deep</h4><header>Top</header><hr/>"#);
        assert!(toc.headings.is_empty());
        assert_eq!(toc.content_html, r#"<h4 id="x">Deep</h4><header>Top</header><hr/>"#);
    }
}
