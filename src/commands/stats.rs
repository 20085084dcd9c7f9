//! Stats command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{index_stats, namespace_vector_count, IndexStats, QdrantIndex};
use serde::Serialize;

/// Index statistics for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub index_name: String,
    pub namespace: String,
    pub namespace_vectors: u64,
    #[serde(flatten)]
    pub stats: IndexStats,
}

/// Report on the index and one namespace. Failures to reach the index are
/// reported as a missing index rather than an error.
pub async fn cmd_stats(config: &Config, index: &QdrantIndex, namespace: &str) -> Result<StatsReport> {
    let stats = index_stats(index).await;
    let namespace_vectors = if stats.exists {
        namespace_vector_count(index, namespace).await.unwrap_or(0)
    } else {
        0
    };

    Ok(StatsReport {
        index_name: config.index.name.clone(),
        namespace: namespace.to_string(),
        namespace_vectors,
        stats,
    })
}

/// Print index statistics to the console
pub fn print_stats(report: &StatsReport) {
    println!("\nIndex Status:");
    println!("  Index: {}", report.index_name);

    if !report.stats.exists {
        println!("  Exists: no");
        println!("\nRun 'docrag vectorize <url>' to create it.");
        return;
    }

    println!("  Exists: yes");
    println!("  Dimension: {}", report.stats.dimension);
    println!("  Total vectors: {}", report.stats.vector_count);
    println!("  Fullness: {:.1}%", report.stats.fullness * 100.0);
    println!(
        "  Namespace '{}': {} vectors",
        report.namespace, report.namespace_vectors
    );
}
