//! Crawl command implementation

use crate::config::Config;
use crate::crawl::{CrawlRequest, CrawlResult, Crawler};
use crate::error::Result;
use tracing::info;

/// Crawl a site without vectorizing anything
pub async fn cmd_crawl(config: &Config, request: CrawlRequest) -> Result<CrawlResult> {
    request.validate()?;
    info!("Crawling {}", request.url);

    let crawler = Crawler::new(config.crawl.clone())?;
    crawler.crawl(&request).await
}

/// Print a crawl result to the console
pub fn print_crawl_result(result: &CrawlResult) {
    let summary = &result.summary;
    println!("\n✓ Crawl complete");
    println!("  Pages: {}", summary.total_pages);
    println!("  Words: {}", summary.total_words);
    println!("  Max depth reached: {}", summary.max_depth_reached);
    println!("  Duration: {}ms", summary.duration_ms);

    if !summary.errors.is_empty() {
        println!("\n  {} pages failed:", summary.errors.len());
        for error in &summary.errors {
            match error.status {
                Some(status) => println!("    {} ({}): {}", error.url, status, error.error),
                None => println!("    {}: {}", error.url, error.error),
            }
        }
    }

    println!();
    for page in &result.pages {
        println!(
            "  [depth {}] {} — {} ({} words)",
            page.depth,
            page.url,
            page.title,
            page.metadata.word_count
        );
    }
}
