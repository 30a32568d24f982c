/// Offline evaluation (mean Recall@K over a labelled query set) and prediction export.
///
/// Labels: CSV with `Query` and `Assessment_url` columns, one row per relevant pair.
/// Predictions: CSV with `Query` and `Assessment_url` columns, one row per recommendation.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::normalize_url;
use crate::error::AppError;
use crate::recommender::Recommender;

const QUERY_COLUMN: &str = "query";
const URL_COLUMN: &str = "assessment_url";

#[derive(Debug, Clone, Serialize)]
pub struct QueryRecall {
    pub query: String,
    pub recall: f64,
    pub relevant: usize,
    pub predicted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub k: usize,
    pub mean_recall: f64,
    pub queries: Vec<QueryRecall>,
}

/// Fraction of `relevant` URLs found among the first `k` of `predicted`.
pub fn recall_at_k(predicted: &[String], relevant: &[String], k: usize) -> f64 {
    let relevant: HashSet<String> = relevant.iter().map(|u| normalize_url(u)).collect();
    if relevant.is_empty() {
        return 0.0;
    }
    let top: HashSet<String> = predicted.iter().take(k).map(|u| normalize_url(u)).collect();
    let hits = relevant.iter().filter(|u| top.contains(*u)).count();
    hits as f64 / relevant.len() as f64
}

/// Relevant URLs per query, in the order queries first appear.
pub fn read_labels(path: &Path) -> Result<Vec<(String, Vec<String>)>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let query_col = find_column(&headers, QUERY_COLUMN).ok_or_else(|| missing(path, QUERY_COLUMN))?;
    let url_col = find_column(&headers, URL_COLUMN).ok_or_else(|| missing(path, URL_COLUMN))?;

    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for row in reader.records() {
        let row = row?;
        let (Some(query), Some(url)) = (row.get(query_col), row.get(url_col)) else {
            continue;
        };
        if query.is_empty() || url.is_empty() {
            continue;
        }
        grouped
            .entry(query.to_string())
            .or_insert_with(|| {
                order.push(query.to_string());
                Vec::new()
            })
            .push(url.to_string());
    }

    Ok(order
        .into_iter()
        .map(|q| {
            let urls = grouped.remove(&q).unwrap_or_default();
            (q, urls)
        })
        .collect())
}

/// Queries from the `Query` column, or the first column when there is none.
pub fn read_queries(path: &Path) -> Result<Vec<String>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = find_column(&headers, QUERY_COLUMN).unwrap_or(0);

    let mut queries = Vec::new();
    for row in reader.records() {
        if let Some(query) = row?.get(column).filter(|q| !q.is_empty()) {
            queries.push(query.to_string());
        }
    }
    Ok(queries)
}

/// Recommend for every labelled query and score the result with Recall@K.
pub async fn evaluate(recommender: &Recommender, labels: &Path, k: usize) -> Result<EvaluationReport, AppError> {
    let labelled = read_labels(labels)?;
    info!(queries = labelled.len(), k, "evaluating");

    let mut queries = Vec::with_capacity(labelled.len());
    for (query, relevant) in labelled {
        let predicted: Vec<String> = recommender
            .recommend(&query, k)
            .await?
            .into_iter()
            .map(|r| r.url)
            .collect();
        let recall = recall_at_k(&predicted, &relevant, k);
        info!(recall, query = %truncate(&query, 60), "scored query");
        queries.push(QueryRecall {
            query,
            recall,
            relevant: relevant.len(),
            predicted: predicted.len(),
        });
    }

    let mean_recall = if queries.is_empty() {
        0.0
    } else {
        queries.iter().map(|q| q.recall).sum::<f64>() / queries.len() as f64
    };
    info!(mean_recall, k, "evaluation complete");
    Ok(EvaluationReport {
        k,
        mean_recall,
        queries,
    })
}

/// Write one `Query,Assessment_url` row per recommendation. Returns the row count.
pub async fn predict(
    recommender: &Recommender,
    queries: &Path,
    output: &Path,
    k: usize,
) -> Result<usize, AppError> {
    let queries = read_queries(queries)?;
    if queries.is_empty() {
        warn!(path = %output.display(), "no queries found, writing header only");
    }

    let mut writer = csv::Writer::from_path(output)?;
    writer.write_record(["Query", "Assessment_url"])?;
    let mut rows = 0;
    for query in &queries {
        for record in recommender.recommend(query, k).await? {
            writer.write_record([query.as_str(), record.url.as_str()])?;
            rows += 1;
        }
    }
    writer.flush()?;

    info!(queries = queries.len(), rows, path = %output.display(), "predictions written");
    Ok(rows)
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn missing(path: &Path, column: &str) -> AppError {
    AppError::Dataset {
        path: path.to_path_buf(),
        message: format!("missing column '{column}'"),
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
