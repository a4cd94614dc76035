//! HTML extraction
//!
//! Turns a downloaded page into a [`ParsedPage`]: title, visible text with the
//! configured boilerplate removed, outbound links resolved against the page
//! URL, and a best-effort publication date.

pub mod date;

pub use date::{infer_published_date, parse_date, DateStrategy, PublishedDate};

use crate::config::ExtractionConfig;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPage {
    /// The page title (from `<title>`)
    pub title: Option<String>,

    /// Visible text, one space between text nodes
    pub text: String,

    /// Absolute http(s) links in document order, without duplicates
    pub links: Vec<String>,

    pub published: Option<PublishedDate>,
}

/// Configured HTML-to-record extractor
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    exclude_tags: HashSet<String>,
    exclude_classes: Vec<String>,
}

impl ExtractionPipeline {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            exclude_tags: config
                .exclude_tags
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            exclude_classes: config
                .exclude_classes
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// Parses HTML and extracts everything the crawler stores
    ///
    /// Never fails: a document with nothing useful yields an empty page.
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_gather::config::ExtractionConfig;
    /// use sumi_gather::extract::ExtractionPipeline;
    /// use url::Url;
    ///
    /// let html = r#"<html><head><title>Test</title></head><body><nav>Menu</nav><p>Hello</p><a href="/page">Link</a></body></html>"#;
    /// let base = Url::parse("https://example.com/").unwrap();
    /// let page = ExtractionPipeline::new(&ExtractionConfig::default()).parse(html, &base);
    /// assert_eq!(page.title.as_deref(), Some("Test"));
    /// assert_eq!(page.links, vec!["https://example.com/page"]);
    /// assert!(!page.text.contains("Menu"));
    /// ```
    pub fn parse(&self, html: &str, base_url: &Url) -> ParsedPage {
        let document = Html::parse_document(html);

        let title = extract_title(&document);
        let text = self.visible_text(&document);
        let links = extract_links(&document, base_url);
        let published = infer_published_date(&document, &text);

        ParsedPage {
            title,
            text,
            links,
            published,
        }
    }

    /// Collects text nodes outside excluded elements
    fn visible_text(&self, document: &Html) -> String {
        let mut parts: Vec<&str> = Vec::new();
        let mut stack = vec![*document.root_element()];

        while let Some(node) = stack.pop() {
            match node.value() {
                Node::Text(text) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        parts.push(trimmed);
                    }
                }
                Node::Element(_) => {
                    let Some(element) = ElementRef::wrap(node) else {
                        continue;
                    };
                    if !self.is_excluded(&element) {
                        stack.extend(node.children().rev());
                    }
                }
                _ => {}
            }
        }

        parts.join(" ")
    }

    fn is_excluded(&self, element: &ElementRef<'_>) -> bool {
        let value = element.value();
        if self.exclude_tags.contains(&value.name().to_ascii_lowercase()) {
            return true;
        }
        // Substring match: "footer__column" also removes "footer__column--wide"
        value.classes().any(|class| {
            self.exclude_classes
                .iter()
                .any(|excluded| class.contains(excluded.as_str()))
        })
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
}

/// Extracts followable links
///
/// Takes `<a href>` without a `download` attribute and `<link rel=canonical>`.
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for pattern in ["a[href]", "link[rel='canonical'][href]"] {
        let Ok(selector) = Selector::parse(pattern) else {
            continue;
        };
        for element in document.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            let Some(absolute) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            else {
                continue;
            };
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None for empty and fragment-only hrefs, `javascript:`, `mailto:`,
/// `tel:` and `data:` links, and anything that does not resolve.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}
