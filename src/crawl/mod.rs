//! Batched breadth-first web crawling
//!
//! The crawler maintains a FIFO frontier of `(url, depth)` pairs and
//! processes it in batches of up to `max_concurrent` concurrent fetches.
//! A batch never mixes depths, and shared state (visited set, page list,
//! error list) is only touched after a whole batch has settled, so all
//! pages at depth `d` complete before any page at depth `d + 1` is fetched. Individual page failures become error entries
//! in the result; only a malformed seed URL fails the crawl itself.

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use crate::extract::{extract_page, Page};
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Pause between batches on top of the per-request politeness delay
const INTER_BATCH_DELAY_MS: u64 = 100;

/// A single crawl invocation's parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    pub max_depth: u32,
    pub max_pages: u32,
    pub delay_ms: u64,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub follow_external_links: bool,
    /// Hosts the crawl may visit; derived from the seed when unset
    #[serde(default)]
    pub allowed_domains: Option<Vec<String>>,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        let defaults = CrawlConfig::default();
        Self {
            url: url.into(),
            max_depth: defaults.max_depth,
            max_pages: defaults.max_pages,
            delay_ms: defaults.delay_ms,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            follow_external_links: false,
            allowed_domains: None,
        }
    }

    /// Boundary validation: range checks with messages naming the field
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.url)
            .map_err(|e| Error::Validation(format!("url is not a valid URL: {}", e)))?;
        if !(1..=10).contains(&self.max_depth) {
            return Err(Error::Validation(
                "maxDepth must be between 1 and 10".to_string(),
            ));
        }
        if !(1..=1000).contains(&self.max_pages) {
            return Err(Error::Validation(
                "maxPages must be between 1 and 1000".to_string(),
            ));
        }
        if !(100..=10_000).contains(&self.delay_ms) {
            return Err(Error::Validation(
                "delay must be between 100 and 10000 milliseconds".to_string(),
            ));
        }
        Ok(())
    }
}

/// A per-page failure captured as data, never thrown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlError {
    pub url: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub total_pages: usize,
    pub total_words: usize,
    pub max_depth_reached: u32,
    pub duration_ms: u64,
    pub unique_domains: usize,
    pub errors: Vec<CrawlError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub pages: Vec<Page>,
    pub summary: CrawlSummary,
}

enum Fetched {
    Page(Page),
    /// Non-HTML response, skipped silently
    NotHtml,
}

struct FetchFailure {
    message: String,
    status: Option<u16>,
}

/// Web crawler. Holds only the HTTP client and static configuration; all
/// per-crawl state is scoped to a single `crawl` call.
pub struct Crawler {
    client: Client,
    config: CrawlConfig,
}

impl Crawler {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Crawl from the request's seed URL. Fails only on a malformed seed;
    /// every other failure is recorded in the result's error list.
    pub async fn crawl(&self, request: &CrawlRequest) -> Result<CrawlResult> {
        let started = Instant::now();
        let seed = Url::parse(&request.url)
            .map_err(|e| Error::Validation(format!("url is not a valid URL: {}", e)))?;
        let seed_host = seed
            .host_str()
            .ok_or_else(|| Error::Validation("url has no host".to_string()))?
            .to_string();

        let allowed_hosts: HashSet<String> = match &request.allowed_domains {
            Some(domains) if !domains.is_empty() => domains.iter().cloned().collect(),
            _ => HashSet::from([seed_host]),
        };

        let max_pages = request.max_pages as usize;
        let mut frontier: VecDeque<(Url, u32)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut pages: Vec<Page> = Vec::new();
        let mut errors: Vec<CrawlError> = Vec::new();

        visited.insert(normalize_url(&seed));
        frontier.push_back((seed, 0));

        while !frontier.is_empty() && pages.len() < max_pages {
            let batch_budget = self
                .config
                .max_concurrent
                .min(max_pages - pages.len());
            let batch = next_batch(&mut frontier, batch_budget);
            let batch_len = batch.len();

            debug!("Fetching batch of {} urls", batch_len);
            let fetches = batch
                .iter()
                .map(|(url, depth)| self.fetch_page(url, *depth));
            let settled = join_all(fetches).await;

            // Batch barrier: all fetches have settled, single-threaded
            // aggregation from here on.
            let mut batch_pages: Vec<Page> = Vec::new();
            for ((url, _depth), outcome) in batch.into_iter().zip(settled) {
                match outcome {
                    Ok(Fetched::Page(page)) => batch_pages.push(page),
                    Ok(Fetched::NotHtml) => {
                        debug!("Skipping non-HTML response: {}", url);
                    }
                    Err(failure) => {
                        warn!("Failed to fetch {}: {}", url, failure.message);
                        errors.push(CrawlError {
                            url: url.to_string(),
                            error: failure.message,
                            status: failure.status,
                        });
                    }
                }
            }

            for page in batch_pages {
                if page.depth < request.max_depth {
                    self.enqueue_links(
                        &page,
                        request,
                        &allowed_hosts,
                        &mut visited,
                        &mut frontier,
                        pages.len(),
                        max_pages,
                    );
                }
                pages.push(page);
            }

            if !frontier.is_empty() && pages.len() < max_pages {
                // Politeness: the per-request delays of a concurrent batch
                // coalesce into one sleep scaled by batch size.
                tokio::time::sleep(Duration::from_millis(
                    request.delay_ms * batch_len as u64,
                ))
                .await;
                tokio::time::sleep(Duration::from_millis(INTER_BATCH_DELAY_MS)).await;
            }
        }

        let summary = summarize(&pages, errors, started.elapsed());
        info!(
            "Crawled {} pages from {} ({} errors)",
            summary.total_pages,
            request.url,
            summary.errors.len()
        );
        Ok(CrawlResult { pages, summary })
    }

    #[allow(clippy::too_many_arguments)]
    fn enqueue_links(
        &self,
        page: &Page,
        request: &CrawlRequest,
        allowed_hosts: &HashSet<String>,
        visited: &mut HashSet<String>,
        frontier: &mut VecDeque<(Url, u32)>,
        pages_crawled: usize,
        max_pages: usize,
    ) {
        let Ok(referrer) = Url::parse(&page.url) else {
            return;
        };

        let mut candidates: Vec<&String> = page.metadata.links.internal.iter().collect();
        if request.follow_external_links {
            candidates.extend(page.metadata.links.external.iter());
        }

        for candidate in candidates {
            if pages_crawled + frontier.len() >= max_pages {
                return;
            }
            let Ok(link) = Url::parse(candidate) else {
                continue;
            };
            let Some(host) = link.host_str() else {
                continue;
            };
            if !allowed_hosts.contains(host) {
                continue;
            }
            if request
                .exclude_patterns
                .iter()
                .any(|p| url_matches_pattern(&link, &referrer, p))
            {
                continue;
            }
            if !request.include_patterns.is_empty()
                && !request
                    .include_patterns
                    .iter()
                    .any(|p| url_matches_pattern(&link, &referrer, p))
            {
                continue;
            }

            // Fragments never distinguish pages
            let normalized = normalize_url(&link);
            if visited.contains(&normalized) {
                continue;
            }
            visited.insert(normalized);

            let mut stripped = link.clone();
            stripped.set_fragment(None);
            frontier.push_back((stripped, page.depth + 1));
        }
    }

    async fn fetch_page(
        &self,
        url: &Url,
        depth: u32,
    ) -> std::result::Result<Fetched, FetchFailure> {
        debug!("Fetching: {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchFailure {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure {
                message: format!("HTTP {}", status),
                status: Some(status.as_u16()),
            });
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        if !is_html {
            return Ok(Fetched::NotHtml);
        }

        let body = response.text().await.map_err(|e| FetchFailure {
            message: e.to_string(),
            status: None,
        })?;

        extract_page(&body, url.as_str(), depth, status.as_u16())
            .map(Fetched::Page)
            .map_err(|e| FetchFailure {
                message: e.to_string(),
                status: None,
            })
    }
}

/// Pop up to `budget` frontier entries sharing the front entry's depth.
/// A batch never mixes depths, so a depth level finishes before the next
/// one starts even when the frontier spans the boundary.
fn next_batch(frontier: &mut VecDeque<(Url, u32)>, budget: usize) -> Vec<(Url, u32)> {
    let batch_depth = frontier.front().map(|(_, depth)| *depth);
    let mut batch = Vec::new();
    while batch.len() < budget {
        match frontier.front() {
            Some((_, depth)) if Some(*depth) == batch_depth => {}
            _ => break,
        }
        if let Some(entry) = frontier.pop_front() {
            batch.push(entry);
        }
    }
    batch
}

fn summarize(pages: &[Page], errors: Vec<CrawlError>, elapsed: Duration) -> CrawlSummary {
    let unique_domains = pages
        .iter()
        .filter_map(|p| Url::parse(&p.url).ok())
        .filter_map(|u| u.host_str().map(|h| h.to_string()))
        .collect::<HashSet<_>>()
        .len();

    CrawlSummary {
        total_pages: pages.len(),
        total_words: pages.iter().map(|p| p.metadata.word_count).sum(),
        max_depth_reached: pages.iter().map(|p| p.depth).max().unwrap_or(0),
        duration_ms: elapsed.as_millis() as u64,
        unique_domains,
        errors,
    }
}

/// Normalize a URL for visited-set identity: drop the fragment, trim the
/// trailing slash.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let path = normalized.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        normalized.set_path("/");
    } else {
        normalized.set_path(&path);
    }
    normalized.to_string()
}

/// Match a candidate URL against one include/exclude pattern.
///
/// A `?param` pattern matches only URLs whose query string looks like a
/// search query; a `#anchor` pattern matches only same-page anchors (same
/// path and query as the referring page); anything else is a substring
/// match against the path or the full URL.
pub fn url_matches_pattern(candidate: &Url, referrer: &Url, pattern: &str) -> bool {
    if let Some(param) = pattern.strip_prefix('?') {
        let param = param.trim_end_matches('=');
        return match candidate.query() {
            Some(query) => query.contains(param) && is_search_query(query),
            None => false,
        };
    }
    if let Some(anchor) = pattern.strip_prefix('#') {
        return match candidate.fragment() {
            Some(fragment) => {
                fragment.contains(anchor)
                    && candidate.path() == referrer.path()
                    && candidate.query() == referrer.query()
            }
            None => false,
        };
    }
    candidate.path().contains(pattern) || candidate.as_str().contains(pattern)
}

fn is_search_query(query: &str) -> bool {
    const SEARCH_KEYS: &[&str] = &["q", "query", "search", "s", "keyword", "term"];
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .any(|(key, _)| SEARCH_KEYS.contains(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string().into_bytes(), "text/html")
    }

    fn test_crawler() -> Crawler {
        let config = CrawlConfig {
            max_concurrent: 5,
            timeout_secs: 5,
            ..CrawlConfig::default()
        };
        Crawler::new(config).expect("crawler should build")
    }

    fn fast_request(url: String) -> CrawlRequest {
        CrawlRequest {
            delay_ms: 0,
            ..CrawlRequest::new(url)
        }
    }

    async fn mount_page(server: &MockServer, at: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(html_response(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_normalize_url() {
        let url = Url::parse("https://example.com/path/#section").unwrap();
        assert_eq!(normalize_url(&url), "https://example.com/path");
        let root = Url::parse("https://example.com/").unwrap();
        assert_eq!(normalize_url(&root), "https://example.com/");
    }

    #[test]
    fn test_pattern_matching() {
        let referrer = Url::parse("https://example.com/docs").unwrap();

        let search = Url::parse("https://example.com/find?q=rust").unwrap();
        assert!(url_matches_pattern(&search, &referrer, "?q="));
        let paged = Url::parse("https://example.com/list?page=2").unwrap();
        assert!(!url_matches_pattern(&paged, &referrer, "?q="));

        let anchor = Url::parse("https://example.com/docs#intro").unwrap();
        assert!(url_matches_pattern(&anchor, &referrer, "#intro"));
        let other_page = Url::parse("https://example.com/other#intro").unwrap();
        assert!(!url_matches_pattern(&other_page, &referrer, "#intro"));

        let admin = Url::parse("https://example.com/admin/users").unwrap();
        assert!(url_matches_pattern(&admin, &referrer, "/admin"));
    }

    #[test]
    fn test_batch_stops_at_depth_boundary() {
        let mut frontier: VecDeque<(Url, u32)> = VecDeque::new();
        for p in ["/a", "/b"] {
            frontier.push_back((Url::parse(&format!("https://example.com{}", p)).unwrap(), 1));
        }
        for p in ["/c", "/d", "/e"] {
            frontier.push_back((Url::parse(&format!("https://example.com{}", p)).unwrap(), 2));
        }

        // Budget covers the boundary, but the batch stays at depth 1
        let first = next_batch(&mut frontier, 4);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|(_, depth)| *depth == 1));

        let second = next_batch(&mut frontier, 4);
        assert_eq!(second.len(), 3);
        assert!(second.iter().all(|(_, depth)| *depth == 2));

        assert!(next_batch(&mut frontier, 4).is_empty());
    }

    #[test]
    fn test_request_validation() {
        let mut request = CrawlRequest::new("https://example.com");
        assert!(request.validate().is_ok());

        request.max_depth = 11;
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("maxDepth"));

        request.max_depth = 2;
        request.url = "not a url".to_string();
        assert!(request.validate().is_err());
    }

    // Scenario: a seed with 3 internal links and 1 external link crawled at
    // depth 1 without following external links yields exactly 4 pages.
    #[tokio::test]
    async fn test_crawl_internal_children_only() {
        let server = MockServer::start().await;
        let seed_body = r#"<html><head><title>Seed</title></head><body><main>
               <p>seed words</p>
               <a href="/a">A</a> <a href="/b">B</a> <a href="/c">C</a>
               <a href="https://elsewhere.invalid/x">External</a>
               </main></body></html>"#;
        mount_page(&server, "/", seed_body).await;
        for child in ["/a", "/b", "/c"] {
            mount_page(
                &server,
                child,
                "<html><head><title>Child</title></head><body><main><p>child text</p></main></body></html>",
            )
            .await;
        }

        let mut request = fast_request(format!("{}/", server.uri()));
        request.max_depth = 1;
        request.max_pages = 5;

        let result = test_crawler().crawl(&request).await.unwrap();

        assert_eq!(result.pages.len(), 4);
        assert!(result.summary.errors.is_empty());
        assert_eq!(result.summary.max_depth_reached, 1);
        assert!(result
            .pages
            .iter()
            .all(|p| p.url.starts_with(&server.uri())));
        // Breadth-first: seed completes before any child
        assert_eq!(result.pages[0].depth, 0);
    }

    #[tokio::test]
    async fn test_crawl_respects_page_budget() {
        let server = MockServer::start().await;
        let links: String = (0..10)
            .map(|i| format!("<a href=\"/p{}\">p{}</a>", i, i))
            .collect();
        mount_page(
            &server,
            "/",
            &format!("<html><body><main>{}</main></body></html>", links),
        )
        .await;
        for i in 0..10 {
            mount_page(
                &server,
                &format!("/p{}", i),
                "<html><body><main>leaf</main></body></html>",
            )
            .await;
        }

        let mut request = fast_request(format!("{}/", server.uri()));
        request.max_depth = 2;
        request.max_pages = 4;

        let result = test_crawler().crawl(&request).await.unwrap();
        assert!(result.pages.len() <= 4);
    }

    #[tokio::test]
    async fn test_failed_fetch_recorded_not_fatal() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><main><a href="/missing">gone</a><a href="/ok">ok</a></main></body></html>"#,
        )
        .await;
        mount_page(&server, "/ok", "<html><body><main>fine</main></body></html>").await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut request = fast_request(format!("{}/", server.uri()));
        request.max_depth = 1;
        request.max_pages = 10;

        let result = test_crawler().crawl(&request).await.unwrap();

        assert_eq!(result.pages.len(), 2);
        assert_eq!(result.summary.errors.len(), 1);
        assert_eq!(result.summary.errors[0].status, Some(404));
        assert!(result.summary.errors[0].url.ends_with("/missing"));
    }

    #[tokio::test]
    async fn test_non_html_skipped_silently() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><main><a href="/data.json">data</a></main></body></html>"#,
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"{}".to_vec(), "application/json"))
            .mount(&server)
            .await;

        let mut request = fast_request(format!("{}/", server.uri()));
        request.max_depth = 1;
        request.max_pages = 10;

        let result = test_crawler().crawl(&request).await.unwrap();

        assert_eq!(result.pages.len(), 1);
        assert!(result.summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_no_duplicate_pages() {
        let server = MockServer::start().await;
        // Both children link back to the seed and to each other
        mount_page(
            &server,
            "/",
            r#"<html><body><main><a href="/a">A</a><a href="/a#section">A again</a><a href="/b">B</a></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/a",
            r#"<html><body><main><a href="/">home</a><a href="/b">B</a></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/b",
            r#"<html><body><main><a href="/a">A</a></main></body></html>"#,
        )
        .await;

        let mut request = fast_request(format!("{}/", server.uri()));
        request.max_depth = 3;
        request.max_pages = 20;

        let result = test_crawler().crawl(&request).await.unwrap();

        let mut urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
        let total = urls.len();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), total);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_exclude_pattern_filters_links() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><main><a href="/docs/intro">docs</a><a href="/admin/panel">admin</a></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/docs/intro",
            "<html><body><main>docs</main></body></html>",
        )
        .await;
        mount_page(
            &server,
            "/admin/panel",
            "<html><body><main>admin</main></body></html>",
        )
        .await;

        let mut request = fast_request(format!("{}/", server.uri()));
        request.max_depth = 1;
        request.max_pages = 10;
        request.exclude_patterns = vec!["/admin".to_string()];

        let result = test_crawler().crawl(&request).await.unwrap();

        assert_eq!(result.pages.len(), 2);
        assert!(!result.pages.iter().any(|p| p.url.contains("/admin")));
    }
}
