use std::path::{Path, PathBuf};

use assessment_common::embedding::ModelChoice;

use crate::error::AppError;
use crate::recommender::MAX_RESULTS;

/// Catalog file names tried, in order, when no explicit path is configured.
pub const CATALOG_CANDIDATES: &[&str] = &[
    "shl_assessments.csv",
    "shl_assessments_clean.csv",
    "shl_assessments_from_excel.csv",
    "shl_assessments_guaranteed.csv",
    "catalog.csv",
    "assessments.json",
];

const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_OVERFETCH: usize = 15;

/// Application configuration loaded explicitly from environment variables.
///
/// Every variable is optional. Without `LANCEDB_PATH` the index lives in memory and is
/// rebuilt on each start; without `REDIS_URL` nothing is cached.
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit catalog file. Takes precedence over the candidate search.
    pub catalog_path: Option<PathBuf>,
    /// Directory searched for `CATALOG_CANDIDATES`.
    pub catalog_dir: PathBuf,
    /// Filesystem path to the LanceDB data directory.
    pub lancedb_path: Option<String>,
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379"). `None` disables caching.
    pub redis_url: Option<String>,
    pub embedding_model: ModelChoice,
    /// Number of records embedded per encoder call while populating the index.
    pub embed_batch_size: usize,
    /// Candidates requested from the index before filtering.
    pub overfetch: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: None,
            catalog_dir: PathBuf::from("."),
            lancedb_path: None,
            redis_url: None,
            embedding_model: ModelChoice::default(),
            embed_batch_size: DEFAULT_BATCH_SIZE,
            overfetch: DEFAULT_OVERFETCH,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `CATALOG_PATH`: catalog file (CSV or JSON)
    /// - `CATALOG_DIR`: directory searched for well-known catalog names (default ".")
    /// - `LANCEDB_PATH`: persist the index in LanceDB at this path
    /// - `REDIS_URL`: Redis connection string
    /// - `EMBEDDING_MODEL`: all-minilm-l6-v2 (default), bge-small-en-v1.5, nomic-embed-text-v1.5
    /// - `EMBED_BATCH_SIZE`: default 50
    /// - `RECOMMEND_OVERFETCH`: default 15, must be greater than 10
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let embedding_model = match std::env::var("EMBEDDING_MODEL") {
            Ok(name) => name
                .parse()
                .map_err(|e| AppError::Config(format!("EMBEDDING_MODEL: {e}")))?,
            Err(_) => defaults.embedding_model,
        };

        Ok(Self {
            catalog_path: std::env::var("CATALOG_PATH").ok().map(PathBuf::from),
            catalog_dir: std::env::var("CATALOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_dir),
            lancedb_path: std::env::var("LANCEDB_PATH").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            embedding_model,
            embed_batch_size: positive_from_env("EMBED_BATCH_SIZE", defaults.embed_batch_size)?,
            overfetch: overfetch(positive_from_env("RECOMMEND_OVERFETCH", defaults.overfetch)?)?,
        })
    }

    /// Paths tried when locating the catalog, in priority order.
    pub fn catalog_candidates(&self) -> Vec<PathBuf> {
        match &self.catalog_path {
            Some(path) => vec![path.clone()],
            None => CATALOG_CANDIDATES
                .iter()
                .map(|name| Path::new(&self.catalog_dir).join(name))
                .collect(),
        }
    }
}

fn positive_from_env(name: &str, default: usize) -> Result<usize, AppError> {
    match std::env::var(name) {
        Ok(raw) => parse_positive(name, &raw),
        Err(_) => Ok(default),
    }
}

/// Candidates fetched before filtering must exceed the largest result size.
fn overfetch(n: usize) -> Result<usize, AppError> {
    if n <= MAX_RESULTS {
        return Err(AppError::Config(format!(
            "RECOMMEND_OVERFETCH must be greater than {MAX_RESULTS}, got {n}"
        )));
    }
    Ok(n)
}

fn parse_positive(name: &str, raw: &str) -> Result<usize, AppError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| AppError::Config(format!("{name} must be a positive integer, got '{raw}'")))
}
