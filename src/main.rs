//! docrag CLI entry point

use clap::{Parser, Subcommand};
use docrag::{
    commands::{
        cmd_crawl, cmd_query, cmd_search, cmd_stats, cmd_vectorize, print_answer,
        print_crawl_result, print_search_results, print_stats, print_vectorize_result,
    },
    complete::HttpCompleter,
    config::Config,
    crawl::CrawlRequest,
    embed::HttpEmbedder,
    error::{Error, Result},
    ingest::VectorizeRequest,
    mcp::McpServer,
    store::QdrantIndex,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docrag")]
#[command(version, about = "Crawl documentation sites into a vector index and query them", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a documentation site without storing anything
    Crawl {
        /// Seed URL to start from
        url: String,

        /// Maximum link depth from the seed (1-10)
        #[arg(long)]
        max_depth: Option<u32>,

        /// Maximum pages to fetch (1-1000)
        #[arg(long)]
        max_pages: Option<u32>,

        /// Delay between fetches in milliseconds (100-10000)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Only crawl URLs matching these patterns
        #[arg(long)]
        include: Option<Vec<String>>,

        /// Skip URLs matching these patterns
        #[arg(long)]
        exclude: Option<Vec<String>>,

        /// Follow links to other domains
        #[arg(long)]
        follow_external: bool,
    },

    /// Crawl a site and store its content in the vector index
    Vectorize {
        /// Seed URL to start from
        url: String,

        /// Namespace to store vectors under
        #[arg(short, long)]
        namespace: Option<String>,

        /// Maximum link depth from the seed (1-10)
        #[arg(long)]
        max_depth: Option<u32>,

        /// Maximum pages to fetch (1-1000)
        #[arg(long)]
        max_pages: Option<u32>,

        /// Chunk size in tokens (100-8000)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlap between chunks in tokens (0-500)
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Skip URLs matching these patterns
        #[arg(long)]
        exclude: Option<Vec<String>>,
    },

    /// Ask a question and get a cited answer from the indexed docs
    Query {
        /// The question to answer
        query: String,

        /// Namespace to query
        #[arg(short, long)]
        namespace: Option<String>,

        /// Number of chunks to retrieve (1-20)
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Search the index and show raw matches
    Search {
        /// The search query
        query: String,

        /// Namespace to search
        #[arg(short, long)]
        namespace: Option<String>,

        /// Maximum number of results (1-20)
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Show vector index statistics
    Stats {
        /// Namespace to report on
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Start MCP server on stdio
    Mcp,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(e) = run(cli).await {
        eprintln!("{}", e.user_message(verbose));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Crawl {
            url,
            max_depth,
            max_pages,
            delay_ms,
            include,
            exclude,
            follow_external,
        } => {
            let mut request = CrawlRequest::new(url);
            if let Some(depth) = max_depth {
                request.max_depth = depth;
            }
            if let Some(pages) = max_pages {
                request.max_pages = pages;
            }
            if let Some(delay) = delay_ms {
                request.delay_ms = delay;
            }
            request.include_patterns = include.unwrap_or_default();
            request.exclude_patterns = exclude.unwrap_or_default();
            request.follow_external_links = follow_external;

            let result = cmd_crawl(&config, request).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_crawl_result(&result);
            }
        }

        Commands::Vectorize {
            url,
            namespace,
            max_depth,
            max_pages,
            chunk_size,
            chunk_overlap,
            exclude,
        } => {
            let mut crawl = CrawlRequest::new(url);
            crawl.max_depth = max_depth.unwrap_or(config.crawl.max_depth);
            crawl.max_pages = max_pages.unwrap_or(config.crawl.max_pages);
            crawl.delay_ms = config.crawl.delay_ms;
            crawl.exclude_patterns = exclude.unwrap_or_default();

            let request = VectorizeRequest {
                crawl,
                index_name: config.index.name.clone(),
                namespace: namespace.unwrap_or_else(|| config.index.namespace.clone()),
                chunk_size: chunk_size.unwrap_or(config.chunk.chunk_size),
                chunk_overlap: chunk_overlap.unwrap_or(config.chunk.chunk_overlap),
            };

            let embedder = HttpEmbedder::new(&config.embedding)?;
            let index = connect_index(&config)?;
            let result = cmd_vectorize(&config, &embedder, &index, request).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_vectorize_result(&result);
            }
        }

        Commands::Query {
            query,
            namespace,
            top_k,
        } => {
            let namespace = namespace.unwrap_or_else(|| config.index.namespace.clone());
            let embedder = HttpEmbedder::new(&config.embedding)?;
            let index = connect_index(&config)?;
            let completer = HttpCompleter::new(&config.completion)?;

            let result =
                cmd_query(&embedder, &index, &completer, &query, &namespace, top_k, None).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_answer(&result);
            }
        }

        Commands::Search {
            query,
            namespace,
            top_k,
        } => {
            let namespace = namespace.unwrap_or_else(|| config.index.namespace.clone());
            let embedder = HttpEmbedder::new(&config.embedding)?;
            let index = connect_index(&config)?;

            let result = cmd_search(&embedder, &index, &query, &namespace, top_k, None).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_search_results(&result, &query);
            }
        }

        Commands::Stats { namespace } => {
            let namespace = namespace.unwrap_or_else(|| config.index.namespace.clone());
            let index = connect_index(&config)?;

            let report = cmd_stats(&config, &index, &namespace).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_stats(&report);
            }
        }

        Commands::Mcp => {
            let embedder = HttpEmbedder::new(&config.embedding)?;
            let index = connect_index(&config)?;
            let completer = HttpCompleter::new(&config.completion)?;

            let server = McpServer::new(config, embedder, index, completer);
            server
                .run()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
        }
    }

    Ok(())
}

fn connect_index(config: &Config) -> Result<QdrantIndex> {
    QdrantIndex::connect(
        &config.index.url,
        &config.index.name,
        config.embedding.dimension,
    )
}
