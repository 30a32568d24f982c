/// Recommendation pipeline.
///
/// embed query → over-fetch candidates → duration window → category balance →
/// clamp to [1, 10], topping up to the service minimum from a wider search and,
/// as a last resort, from the head of the catalog.
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::constraint::extract_constraint;
use crate::error::AppError;
use crate::index::AssessmentIndex;
use crate::model::{AssessmentRecord, CategoryGroup};

pub const MAX_RESULTS: usize = 10;
pub const MIN_RESULTS: usize = 5;
const MAX_QUERY_CHARS: usize = 1000;
/// Candidates requested when topping up a short result list.
const REFILL_FETCH: usize = 20;

/// A whole word (or phrase), or a stem matching any word it begins.
#[derive(Debug, Clone, Copy)]
enum Keyword {
    Word(&'static str),
    Stem(&'static str),
}

use Keyword::{Stem, Word};

const TECHNICAL_KEYWORDS: &[Keyword] = &[
    Word("java"), Word("python"), Word("sql"), Word("javascript"), Word("typescript"),
    Word("c++"), Word("c#"), Word(".net"), Stem("developer"), Stem("engineer"),
    Stem("programm"), Word("coding"), Word("software"), Word("technical"), Word("data"),
    Stem("analyst"), Word("analytics"), Word("cloud"), Word("devops"), Word("selenium"),
    Stem("automat"), Word("excel"),
];

const BEHAVIORAL_KEYWORDS: &[Keyword] = &[
    Stem("collaborat"), Stem("communicat"), Word("teamwork"), Word("team player"),
    Word("interpersonal"), Stem("leader"), Stem("personalit"), Stem("behavio"),
    Stem("soft skill"), Stem("stakeholder"), Stem("cultur"), Word("attitude"),
    Stem("empath"), Word("customer service"), Stem("motivat"), Stem("people skill"),
];

impl Keyword {
    /// `words` is the query as space-separated words with a leading and trailing space.
    fn matches(self, words: &str) -> bool {
        match self {
            Word(text) => words.contains(&format!(" {text} ")),
            Stem(text) => words.contains(&format!(" {text}")),
        }
    }
}

/// Lower-cased words of `query`, space-joined and space-padded. `+`, `#` and inner
/// dots stay part of a word so "c++", "c#" and ".net" survive.
fn query_words(query: &str) -> String {
    let words: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.')))
        .map(|w| w.trim_end_matches('.').to_string())
        .filter(|w| !w.is_empty())
        .collect();
    format!(" {} ", words.join(" "))
}

pub struct Recommender {
    index: Arc<AssessmentIndex>,
    catalog: Arc<Vec<AssessmentRecord>>,
    overfetch: usize,
}

impl Recommender {
    pub fn new(index: Arc<AssessmentIndex>, catalog: Arc<Vec<AssessmentRecord>>, overfetch: usize) -> Self {
        Self {
            index,
            catalog,
            overfetch,
        }
    }

    /// Recommend between 1 and `k` (at most 10) assessments for a hiring query.
    ///
    /// Only an empty query is an error. Search failures degrade to the catalog head.
    pub async fn recommend(&self, query: &str, k: usize) -> Result<Vec<AssessmentRecord>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidQuery("query must be a non-empty string".to_string()));
        }
        let query: String = query.chars().take(MAX_QUERY_CHARS).collect();
        let k = k.clamp(1, MAX_RESULTS);
        let minimum = MIN_RESULTS.min(k);

        let constraint = extract_constraint(&query);
        let window = constraint.window();

        let mut candidates = self.index.search(&query, self.overfetch.max(k)).await;
        let fetched = candidates.len();

        if let Some((min, max)) = window {
            candidates = filter_by_duration(candidates, min, max, k);
        }
        candidates = balance_categories(candidates, &query, k);
        candidates.truncate(k);

        if candidates.len() < minimum {
            let extra = self.index.search(&query, REFILL_FETCH.max(k)).await;
            top_up(&mut candidates, extra, window, minimum);
        }

        if candidates.is_empty() {
            warn!("no candidates from index, falling back to catalog head");
            candidates = self.catalog.iter().take(minimum).cloned().collect();
        }

        info!(
            k,
            ?window,
            fetched,
            returned = candidates.len(),
            "recommendation complete"
        );
        Ok(candidates)
    }
}

/// Keep records whose duration lies in `[min, max]`.
///
/// If none do, return the `k` records closest to the window midpoint instead, so a
/// non-empty candidate set never filters down to nothing.
pub fn filter_by_duration(
    candidates: Vec<AssessmentRecord>,
    min: u32,
    max: u32,
    k: usize,
) -> Vec<AssessmentRecord> {
    let in_window: Vec<AssessmentRecord> = candidates
        .iter()
        .filter(|r| (min..=max).contains(&r.duration))
        .cloned()
        .collect();
    if !in_window.is_empty() || candidates.is_empty() {
        return in_window;
    }

    // distance to the midpoint, doubled to stay in integers
    let doubled_mid = i64::from(min) + i64::from(max);
    let mut closest = candidates;
    closest.sort_by_key(|r| (2 * i64::from(r.duration) - doubled_mid).abs());
    closest.truncate(k);
    closest
}

/// Which category groups a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySignals {
    pub technical: bool,
    pub behavioral: bool,
}

impl QuerySignals {
    pub fn detect(query: &str) -> Self {
        let words = query_words(query);
        Self {
            technical: TECHNICAL_KEYWORDS.iter().any(|kw| kw.matches(&words)),
            behavioral: BEHAVIORAL_KEYWORDS.iter().any(|kw| kw.matches(&words)),
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.technical && self.behavioral
    }
}

/// Avoid a single-category monopoly of the first `k` slots when the query is mixed.
///
/// Each of the technical and behavioral groups is guaranteed its best `ceil(k/3)`
/// candidates within the first `k` (when it has that many); remaining slots go to the
/// best-ranked leftovers. The chosen records keep their rank order and are followed
/// by the rest. Non-mixed queries are returned unchanged.
pub fn balance_categories(
    candidates: Vec<AssessmentRecord>,
    query: &str,
    k: usize,
) -> Vec<AssessmentRecord> {
    if !QuerySignals::detect(query).is_mixed() || candidates.len() <= k {
        return candidates;
    }

    let quota = k.div_ceil(3);
    let mut chosen = vec![false; candidates.len()];
    let mut taken = 0;

    for group in [CategoryGroup::Technical, CategoryGroup::Behavioral] {
        let members = candidates
            .iter()
            .enumerate()
            .filter(|(_, r)| r.has_group(group))
            .map(|(i, _)| i)
            .take(quota);
        for i in members {
            if taken < k && !chosen[i] {
                chosen[i] = true;
                taken += 1;
            }
        }
    }
    for slot in chosen.iter_mut() {
        if taken >= k {
            break;
        }
        if !*slot {
            *slot = true;
            taken += 1;
        }
    }

    let (head, tail): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .zip(chosen)
        .partition(|(_, picked)| *picked);
    head.into_iter().chain(tail).map(|(r, _)| r).collect()
}

/// Append unseen records from `extra` until `results` holds `minimum` entries.
/// Records inside the duration window are preferred.
fn top_up(
    results: &mut Vec<AssessmentRecord>,
    extra: Vec<AssessmentRecord>,
    window: Option<(u32, u32)>,
    minimum: usize,
) {
    let mut seen: HashSet<String> = results.iter().map(|r| r.id.clone()).collect();
    let (preferred, others): (Vec<_>, Vec<_>) = extra
        .into_iter()
        .partition(|r| window.is_none_or(|(min, max)| (min..=max).contains(&r.duration)));

    for record in preferred.into_iter().chain(others) {
        if results.len() >= minimum {
            break;
        }
        if seen.insert(record.id.clone()) {
            results.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AssessmentCache;
    use crate::test_support::{record, BagOfWordsEncoder, FailingEncoder};
    use assessment_common::memory::MemoryIndex;
    use assessment_common::oracle::{NeighborIndex, TextEncoder};

    fn catalog() -> Vec<AssessmentRecord> {
        vec![
            record("0", "Core Java", "Java programming for developers", &["K"], 45),
            record("1", "Interpersonal Communication", "Collaboration and communication skills", &["P"], 30),
            record("2", "SQL Server", "Relational database querying", &["K"], 20),
            record("3", "Leadership Report", "Leadership style and personality", &["P"], 90),
            record("4", "Verbal Reasoning", "Reading comprehension ability", &["A"], 18),
            record("5", "Python", "Python scripting and programming", &["K"], 11),
            record("6", "Sales Simulation", "Customer facing sales scenarios", &["S"], 75),
        ]
    }

    async fn recommender_with(encoder: Arc<dyn TextEncoder>, records: Vec<AssessmentRecord>) -> Recommender {
        let index = Arc::new(AssessmentIndex::new(
            encoder,
            Arc::new(MemoryIndex::new()),
            Arc::new(AssessmentCache::disabled()),
            50,
        ));
        index.populate(&records).await.unwrap();
        Recommender::new(index, Arc::new(records), 15)
    }

    fn ids(records: &[AssessmentRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_java_and_communication_both_returned() {
        let recommender = recommender_with(Arc::new(BagOfWordsEncoder::default()), catalog()).await;
        let results = recommender
            .recommend("Java developer with collaboration skills, 40 minute test", 10)
            .await
            .unwrap();

        let top_two: HashSet<&str> = ids(&results[..2]).into_iter().collect();
        assert_eq!(top_two, HashSet::from(["0", "1"]));
        assert!(results.len() >= MIN_RESULTS && results.len() <= MAX_RESULTS);
    }

    #[tokio::test]
    async fn test_result_count_always_within_bounds() {
        let recommender = recommender_with(Arc::new(BagOfWordsEncoder::default()), catalog()).await;
        for (query, k) in [
            ("java", 10),
            ("zzz unrelated words", 10),
            ("a quick assessment", 3),
            ("long assessment for leaders", 0),
            ("python", 500),
        ] {
            let results = recommender.recommend(query, k).await.unwrap();
            assert!(!results.is_empty(), "no results for {query:?}");
            assert!(results.len() <= MAX_RESULTS, "too many results for {query:?}");
            assert!(results.len() <= k.clamp(1, MAX_RESULTS));
        }
    }

    #[tokio::test]
    async fn test_minimum_is_topped_up() {
        let recommender = recommender_with(Arc::new(BagOfWordsEncoder::default()), catalog()).await;
        // only one record lies in 40-50 minutes
        let results = recommender.recommend("java, 40-50 minutes", 10).await.unwrap();
        assert_eq!(results.len(), MIN_RESULTS);
        assert_eq!(results[0].id, "0");
        let unique: HashSet<&str> = ids(&results).into_iter().collect();
        assert_eq!(unique.len(), results.len());
    }

    #[tokio::test]
    async fn test_failing_encoder_falls_back_to_catalog() {
        let recommender = recommender_with(Arc::new(BagOfWordsEncoder::default()), vec![]).await;
        assert!(recommender.recommend("java", 10).await.unwrap().is_empty());

        let store = Arc::new(MemoryIndex::new());
        AssessmentIndex::new(
            Arc::new(BagOfWordsEncoder::default()),
            Arc::clone(&store) as Arc<dyn NeighborIndex>,
            Arc::new(AssessmentCache::disabled()),
            50,
        )
        .populate(&catalog())
        .await
        .unwrap();

        let index = Arc::new(AssessmentIndex::new(
            Arc::new(FailingEncoder),
            store,
            Arc::new(AssessmentCache::disabled()),
            50,
        ));
        let recommender = Recommender::new(index, Arc::new(catalog()), 15);
        let results = recommender.recommend("java developer", 10).await.unwrap();
        assert_eq!(ids(&results), vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_empty_query_is_invalid() {
        let recommender = recommender_with(Arc::new(BagOfWordsEncoder::default()), catalog()).await;
        assert!(matches!(
            recommender.recommend("   ", 10).await,
            Err(AppError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_duration_filter_keeps_window() {
        let candidates = catalog();
        let kept = filter_by_duration(candidates, 30, 50, 10);
        assert_eq!(ids(&kept), vec!["0", "1"]);
    }

    #[test]
    fn test_duration_filter_falls_back_to_closest() {
        let candidates = vec![
            record("a", "A", "", &["K"], 60),
            record("b", "B", "", &["K"], 10),
            record("c", "C", "", &["K"], 45),
            record("d", "D", "", &["K"], 90),
            record("e", "E", "", &["K"], 20),
        ];
        let kept = filter_by_duration(candidates, 30, 40, 3);
        assert_eq!(ids(&kept), vec!["c", "e", "a"]);
        assert!(filter_by_duration(Vec::new(), 30, 40, 3).is_empty());
    }

    #[test]
    fn test_query_signals() {
        assert!(QuerySignals::detect("Java developers who collaborate with business teams").is_mixed());
        assert!(!QuerySignals::detect("Python and SQL").is_mixed());
        assert!(QuerySignals::detect("Personality test").behavioral);
    }

    #[test]
    fn test_query_signals_match_whole_words() {
        let signals = QuerySignals::detect("sales associate with excellent interpersonal skills");
        assert_eq!(
            signals,
            QuerySignals {
                technical: false,
                behavioral: true
            }
        );
        assert!(!QuerySignals::detect("decoding agriculture records").technical);
        assert!(!QuerySignals::detect("decoding agriculture records").behavioral);
        assert!(QuerySignals::detect("C++ and .NET engineers, strong communicators.").is_mixed());
        assert!(QuerySignals::detect("Excel, then leadership").is_mixed());
    }

    #[test]
    fn test_behavioral_query_does_not_promote_technical_records() {
        let mut candidates: Vec<AssessmentRecord> = (0..9)
            .map(|i| record(&format!("p{i}"), "Behavior", "", &["P"], 30))
            .collect();
        candidates.push(record("k0", "Tech", "", &["K"], 30));

        let balanced = balance_categories(
            candidates.clone(),
            "sales associate with excellent interpersonal skills",
            5,
        );
        assert_eq!(balanced, candidates);
        assert_eq!(ids(&balanced[..5]), vec!["p0", "p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_balance_breaks_single_category_monopoly() {
        let mut candidates: Vec<AssessmentRecord> = (0..8)
            .map(|i| record(&format!("k{i}"), "Tech", "", &["K"], 30))
            .collect();
        candidates.push(record("p0", "Behavior", "", &["P"], 30));
        candidates.push(record("p1", "Behavior", "", &["P"], 30));

        let balanced = balance_categories(candidates, "java developer with communication skills", 6);
        let head = ids(&balanced[..6]);
        assert_eq!(head, vec!["k0", "k1", "k2", "k3", "p0", "p1"]);
        assert_eq!(balanced.len(), 10);
    }

    #[test]
    fn test_balance_leaves_unmixed_queries_alone() {
        let candidates: Vec<AssessmentRecord> = (0..8)
            .map(|i| record(&i.to_string(), "Tech", "", &["K"], 30))
            .chain([record("p", "Behavior", "", &["P"], 30)])
            .collect();
        let balanced = balance_categories(candidates.clone(), "java developer", 3);
        assert_eq!(balanced, candidates);
    }
}
