//! Page extraction: raw HTML + URL -> structured `Page`
//!
//! `extract_page` is a pure function with no I/O. It resolves the title and
//! meta tags through fallback chains, picks a main content region, collects
//! headings, links and images, and computes a whitespace word count.

use crate::error::Result;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// A structured page produced by the extractor. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub content: String,
    pub metadata: PageMetadata,
    pub crawled_at: DateTime<Utc>,
    pub status: u16,
    pub depth: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub word_count: usize,
    pub headings: Vec<Heading>,
    pub links: PageLinks,
    pub images: Vec<PageImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level, 1-6
    pub level: u8,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLinks {
    pub internal: Vec<String>,
    pub external: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Elements whose text never counts as page content
const SKIP_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "aside", "noscript"];

/// Content-region fallback chain, tried in order after `main` and `article`
const CONTENT_SELECTORS: &[&str] = &[
    "#content",
    ".content",
    ".main-content",
    ".post-content",
    ".entry-content",
    "#main",
];

/// Extract a structured page from raw markup
pub fn extract_page(html: &str, url: &str, depth: u32, status: u16) -> Result<Page> {
    let page_url = Url::parse(url)?;
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let content = extract_content(&document);
    let word_count = content.split_whitespace().count();

    let metadata = PageMetadata {
        description: meta_content(&document, "meta[name=\"description\"]")
            .or_else(|| meta_content(&document, "meta[property=\"og:description\"]")),
        keywords: meta_content(&document, "meta[name=\"keywords\"]"),
        author: meta_content(&document, "meta[name=\"author\"]"),
        published_at: meta_content(&document, "meta[property=\"article:published_time\"]")
            .or_else(|| meta_content(&document, "meta[name=\"date\"]")),
        modified_at: meta_content(&document, "meta[property=\"article:modified_time\"]"),
        canonical_url: attr_content(&document, "link[rel=\"canonical\"]", "href"),
        language: attr_content(&document, "html", "lang"),
        word_count,
        headings: extract_headings(&document),
        links: extract_links(&document, &page_url),
        images: extract_images(&document, &page_url),
    };

    Ok(Page {
        url: url.to_string(),
        title,
        content,
        metadata,
        crawled_at: Utc::now(),
        status,
        depth,
    })
}

/// Title tag, falling back to the first h1, falling back to "Untitled"
fn extract_title(document: &Html) -> String {
    for selector in ["title", "h1"] {
        if let Ok(sel) = Selector::parse(selector) {
            if let Some(elem) = document.select(&sel).next() {
                let text = elem.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    "Untitled".to_string()
}

/// Select the main content region and collect its text, skipping
/// script/style/navigation/footer/aside subtrees and comments.
fn extract_content(document: &Html) -> String {
    let root = select_content_root(document);

    let mut text = String::new();
    match root {
        Some(elem) => collect_text(*elem, &mut text),
        None => {
            if let Ok(sel) = Selector::parse("html") {
                if let Some(elem) = document.select(&sel).next() {
                    collect_text(*elem, &mut text);
                }
            }
        }
    }

    normalize_whitespace(&text)
}

fn select_content_root(document: &Html) -> Option<ElementRef<'_>> {
    let mut chain: Vec<&str> = vec!["main", "article"];
    chain.extend_from_slice(CONTENT_SELECTORS);
    chain.push("body");

    for selector in chain {
        if let Ok(sel) = Selector::parse(selector) {
            if let Some(elem) = document.select(&sel).next() {
                return Some(elem);
            }
        }
    }
    None
}

fn collect_text(node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(text);
            out.push(' ');
        }
        Node::Element(elem) => {
            if SKIP_ELEMENTS.contains(&elem.name()) {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
        }
        // Comments, doctype, processing instructions contribute nothing
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|e| e.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn attr_content(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Headings h1-h6 in document order with level and optional id
fn extract_headings(document: &Html) -> Vec<Heading> {
    let mut headings = Vec::new();
    let Ok(sel) = Selector::parse("h1, h2, h3, h4, h5, h6") else {
        return headings;
    };

    for elem in document.select(&sel) {
        let name = elem.value().name();
        let level = name
            .strip_prefix('h')
            .and_then(|l| l.parse::<u8>().ok())
            .unwrap_or(1);
        let text = elem.text().collect::<String>().trim().to_string();
        if text.is_empty() {
            continue;
        }
        headings.push(Heading {
            level,
            text,
            id: elem.value().attr("id").map(|s| s.to_string()),
        });
    }
    headings
}

/// Links resolved absolute and classified internal/external by hostname.
/// Malformed hrefs are skipped; both lists are deduplicated.
fn extract_links(document: &Html, page_url: &Url) -> PageLinks {
    let mut links = PageLinks::default();
    let Ok(sel) = Selector::parse("a[href]") else {
        return links;
    };

    let mut seen_internal = HashSet::new();
    let mut seen_external = HashSet::new();

    for elem in document.select(&sel) {
        let Some(href) = elem.value().attr("href") else {
            continue;
        };
        if href.starts_with("javascript:") || href.starts_with("mailto:") || href.starts_with("tel:")
        {
            continue;
        }
        let Ok(resolved) = page_url.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }

        let url_string = resolved.to_string();
        if resolved.host_str() == page_url.host_str() {
            if seen_internal.insert(url_string.clone()) {
                links.internal.push(url_string);
            }
        } else if seen_external.insert(url_string.clone()) {
            links.external.push(url_string);
        }
    }
    links
}

fn extract_images(document: &Html, page_url: &Url) -> Vec<PageImage> {
    let mut images = Vec::new();
    let Ok(sel) = Selector::parse("img[src]") else {
        return images;
    };

    for elem in document.select(&sel) {
        let Some(src) = elem.value().attr("src") else {
            continue;
        };
        let Ok(resolved) = page_url.join(src) else {
            continue;
        };
        images.push(PageImage {
            src: resolved.to_string(),
            alt: elem.value().attr("alt").map(|s| s.trim().to_string()),
            title: elem.value().attr("title").map(|s| s.trim().to_string()),
        });
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
    <!DOCTYPE html>
    <html lang="en">
    <head>
        <title>Getting Started</title>
        <meta name="description" content="Intro guide">
        <meta name="author" content="Docs Team">
        <link rel="canonical" href="https://example.com/docs/start">
    </head>
    <body>
        <nav><a href="/nav-link">Nav</a> navigation text</nav>
        <main>
            <h1 id="top">Getting Started</h1>
            <p>Install the tool and run it.</p>
            <h2>Next Steps</h2>
            <p>Read the guide.</p>
            <a href="/docs/install">Install</a>
            <a href="/docs/install">Install again</a>
            <a href="https://other.com/page">External</a>
            <a href="::bad::">Broken</a>
            <img src="/img/diagram.png" alt="Diagram">
        </main>
        <footer>footer text</footer>
        <script>var ignored = true;</script>
    </body>
    </html>
    "#;

    #[test]
    fn test_extract_basic_fields() {
        let page = extract_page(FIXTURE, "https://example.com/docs/start", 1, 200).unwrap();

        assert_eq!(page.title, "Getting Started");
        assert_eq!(page.depth, 1);
        assert_eq!(page.status, 200);
        assert_eq!(page.metadata.description.as_deref(), Some("Intro guide"));
        assert_eq!(page.metadata.author.as_deref(), Some("Docs Team"));
        assert_eq!(page.metadata.language.as_deref(), Some("en"));
        assert_eq!(
            page.metadata.canonical_url.as_deref(),
            Some("https://example.com/docs/start")
        );
    }

    #[test]
    fn test_content_excludes_chrome() {
        let page = extract_page(FIXTURE, "https://example.com/docs/start", 0, 200).unwrap();

        assert!(page.content.contains("Install the tool"));
        assert!(!page.content.contains("navigation text"));
        assert!(!page.content.contains("footer text"));
        assert!(!page.content.contains("ignored"));
        assert!(page.metadata.word_count > 0);
    }

    #[test]
    fn test_headings_in_order() {
        let page = extract_page(FIXTURE, "https://example.com/docs/start", 0, 200).unwrap();

        let headings = &page.metadata.headings;
        assert_eq!(headings[0].level, 1);
        assert_eq!(headings[0].text, "Getting Started");
        assert_eq!(headings[0].id.as_deref(), Some("top"));
        assert_eq!(headings[1].level, 2);
    }

    #[test]
    fn test_links_classified_and_deduped() {
        let page = extract_page(FIXTURE, "https://example.com/docs/start", 0, 200).unwrap();

        let links = &page.metadata.links;
        // /docs/install appears twice in markup but once here; /nav-link still counts as a link
        assert_eq!(
            links
                .internal
                .iter()
                .filter(|u| u.ends_with("/docs/install"))
                .count(),
            1
        );
        assert_eq!(links.external, vec!["https://other.com/page".to_string()]);
    }

    #[test]
    fn test_title_fallback_to_h1_then_untitled() {
        let html = "<html><body><h1>Only Heading</h1></body></html>";
        let page = extract_page(html, "https://example.com/", 0, 200).unwrap();
        assert_eq!(page.title, "Only Heading");

        let empty = "<html><body><p>text</p></body></html>";
        let page = extract_page(empty, "https://example.com/", 0, 200).unwrap();
        assert_eq!(page.title, "Untitled");
    }

    #[test]
    fn test_images_resolved() {
        let page = extract_page(FIXTURE, "https://example.com/docs/start", 0, 200).unwrap();
        assert_eq!(page.metadata.images.len(), 1);
        assert_eq!(
            page.metadata.images[0].src,
            "https://example.com/img/diagram.png"
        );
        assert_eq!(page.metadata.images[0].alt.as_deref(), Some("Diagram"));
    }

    #[test]
    fn test_malformed_url_is_validation_error() {
        assert!(extract_page("<html></html>", "not a url", 0, 200).is_err());
    }
}
