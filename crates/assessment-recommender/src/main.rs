mod cache;
mod catalog;
mod config;
mod constraint;
mod error;
mod evaluate;
mod index;
mod model;
mod recommender;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use assessment_common::embedding::Embedder;
use assessment_common::memory::MemoryIndex;
use assessment_common::oracle::{NeighborIndex, TextEncoder};
use assessment_common::redis::RedisCache;
use assessment_common::vectordb::VectorDb;
use cache::AssessmentCache;
use config::Config;
use index::{AssessmentIndex, SyncOutcome};
use model::RecommendationResponse;
use recommender::{Recommender, MAX_RESULTS};

const TABLE_NAME: &str = "assessments";

/// Recommend assessments for a free-text hiring need.
#[derive(Debug, Parser)]
#[command(name = "assessment-recommender", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print recommendations for a query as JSON
    Recommend {
        query: String,
        #[arg(short, long, default_value_t = MAX_RESULTS)]
        k: usize,
    },
    /// Synchronize the embedding index with the catalog
    Index {
        /// Rebuild even if the catalog is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Mean Recall@K over a labelled query set (Query, Assessment_url)
    Evaluate {
        labels: PathBuf,
        #[arg(short, long, default_value_t = MAX_RESULTS)]
        k: usize,
    },
    /// Write Query,Assessment_url predictions for every query in a CSV file
    Predict {
        queries: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value_t = MAX_RESULTS)]
        k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        catalog_dir = %config.catalog_dir.display(),
        lancedb = config.lancedb_path.is_some(),
        redis = config.redis_url.is_some(),
        model = ?config.embedding_model,
        "configuration loaded"
    );

    // 2. Connect to Redis (optional, degrades to no caching)
    let redis_cache = RedisCache::new(config.redis_url.as_deref());
    let cache = if redis_cache.is_available().await {
        info!("redis connected");
        AssessmentCache::new(redis_cache)
    } else {
        info!("redis unavailable, running without cache");
        AssessmentCache::disabled()
    };
    let cache = Arc::new(cache);

    // 3. Load the catalog
    let catalog_path = catalog::locate_catalog(&config.catalog_candidates())?;
    let catalog = catalog::load_catalog(&catalog_path)?;

    // 4. Initialize embedding model
    info!("initializing embedding model (may download on first run)");
    let embedder: Arc<dyn TextEncoder> = Arc::new(Embedder::new(config.embedding_model).await?);
    info!(dimensions = embedder.dimensions(), "embedding model ready");

    // 5. Open the neighbor index
    let store: Arc<dyn NeighborIndex> = match &config.lancedb_path {
        Some(path) => {
            let db = VectorDb::connect(path, TABLE_NAME, embedder.dimensions()).await?;
            info!(path = %path, "lancedb connected");
            Arc::new(db)
        }
        None => {
            info!("no LANCEDB_PATH set, using in-memory index");
            Arc::new(MemoryIndex::new())
        }
    };

    // 6. Bring the index up to date with the catalog
    let index = Arc::new(AssessmentIndex::new(
        embedder,
        store,
        cache,
        config.embed_batch_size,
    ));
    let force = matches!(cli.command, Command::Index { force: true });
    let outcome = index.sync(&catalog, force).await?;
    info!(entries = index.count().await?, ?outcome, "index ready");

    let recommender = Recommender::new(index, Arc::new(catalog.records), config.overfetch);

    match cli.command {
        Command::Recommend { query, k } => {
            let records = recommender.recommend(&query, k).await?;
            let response = RecommendationResponse::from_records(&records);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Index { .. } => match outcome {
            SyncOutcome::Populated { added } => println!("indexed {added} assessments"),
            SyncOutcome::Skipped { existing } => {
                println!("index up to date ({existing} assessments)")
            }
        },
        Command::Evaluate { labels, k } => {
            let report = evaluate::evaluate(&recommender, &labels, k).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Predict { queries, output, k } => {
            let rows = evaluate::predict(&recommender, &queries, &output, k).await?;
            println!("wrote {rows} predictions to {}", output.display());
        }
    }

    Ok(())
}
