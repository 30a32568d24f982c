/// Catalog loader for assessment CSV/JSON files.
///
/// Every row is normalized into an `AssessmentRecord` with a fixed schema. Malformed
/// cells never abort the load: each degrades to a default and is counted as a repair.
/// Only a missing or unreadable file is fatal.
///
/// Recognized columns (case-insensitive): id, name (alias assessment_name), url (alias
/// assessment_url), description, test_type, duration, adaptive_support, remote_support.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::model::{AssessmentRecord, Support, TestCategory, DEFAULT_DURATION, DEFAULT_TEST_TYPE};

const DEFAULT_ADAPTIVE: Support = Support::No;
const DEFAULT_REMOTE: Support = Support::Yes;

/// A loaded catalog together with the digest of the file it came from.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub path: PathBuf,
    /// Hex SHA-256 of the file bytes, used to detect catalog changes between runs.
    pub digest: String,
    pub records: Vec<AssessmentRecord>,
}

/// Return the first candidate that exists on disk.
pub fn locate_catalog(candidates: &[PathBuf]) -> Result<PathBuf, AppError> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| AppError::CatalogNotFound(candidates.to_vec()))
}

/// Read and normalize a catalog file. `.json` files are parsed as JSON, anything else as CSV.
pub fn load_catalog(path: &Path) -> Result<Catalog, AppError> {
    let bytes = std::fs::read(path).map_err(|e| AppError::Catalog {
        path: path.to_path_buf(),
        message: format!("failed to read: {e}"),
    })?;
    let digest = format!("{:x}", Sha256::digest(&bytes));
    let content = String::from_utf8_lossy(&bytes);

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let rows = if is_json {
        parse_json_rows(&content)
    } else {
        parse_csv_rows(&content)
    }
    .map_err(|e| AppError::Catalog {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let records = normalize_rows(rows);
    info!(path = %path.display(), records = records.len(), "catalog loaded");

    Ok(Catalog {
        path: path.to_path_buf(),
        digest,
        records,
    })
}

/// A `test_type` cell before normalization.
#[derive(Debug, Clone, PartialEq)]
enum TestTypeCell {
    Missing,
    Text(String),
    List(Vec<String>),
}

/// One catalog row with cells still in their raw form.
#[derive(Debug, Clone)]
struct RawRow {
    id: Option<String>,
    name: Option<String>,
    url: Option<String>,
    description: Option<String>,
    test_type: TestTypeCell,
    duration: Option<String>,
    adaptive_support: Option<String>,
    remote_support: Option<String>,
}

fn canonical_column(header: &str) -> Option<&'static str> {
    match header.trim().to_ascii_lowercase().as_str() {
        "id" => Some("id"),
        "name" | "assessment_name" => Some("name"),
        "url" | "assessment_url" => Some("url"),
        "description" => Some("description"),
        "test_type" => Some("test_type"),
        "duration" => Some("duration"),
        "adaptive_support" => Some("adaptive_support"),
        "remote_support" => Some("remote_support"),
        _ => None,
    }
}

fn parse_csv_rows(content: &str) -> Result<Vec<RawRow>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut columns: HashMap<&'static str, usize> = HashMap::new();
    for (idx, header) in reader.headers()?.iter().enumerate() {
        if let Some(name) = canonical_column(header) {
            columns.entry(name).or_insert(idx);
        }
    }

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(row = line, error = %e, "unreadable csv row, skipping");
                continue;
            }
        };
        let cell = |name: &str| -> Option<String> {
            columns
                .get(name)
                .and_then(|&idx| record.get(idx))
                .map(str::to_string)
        };
        rows.push(RawRow {
            id: cell("id"),
            name: cell("name"),
            url: cell("url"),
            description: cell("description"),
            test_type: cell("test_type").map_or(TestTypeCell::Missing, TestTypeCell::Text),
            duration: cell("duration"),
            adaptive_support: cell("adaptive_support"),
            remote_support: cell("remote_support"),
        });
    }
    Ok(rows)
}

fn parse_json_rows(content: &str) -> Result<Vec<RawRow>, AppError> {
    let document: Value = serde_json::from_str(content)?;
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => ["assessments", "recommended_assessments"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut rows = Vec::new();
    for (idx, item) in items.into_iter().enumerate() {
        let Value::Object(object) = item else {
            warn!(row = idx, "catalog entry is not an object, skipping");
            continue;
        };
        let mut fields: HashMap<&'static str, Value> = HashMap::new();
        for (key, value) in object {
            if let Some(name) = canonical_column(&key) {
                fields.entry(name).or_insert(value);
            }
        }
        let text = |name: &str| fields.get(name).and_then(json_scalar_text);
        let test_type = match fields.get("test_type") {
            Some(Value::Array(items)) => {
                TestTypeCell::List(items.iter().filter_map(json_scalar_text).collect())
            }
            Some(other) => json_scalar_text(other).map_or(TestTypeCell::Missing, TestTypeCell::Text),
            None => TestTypeCell::Missing,
        };
        rows.push(RawRow {
            id: text("id"),
            name: text("name"),
            url: text("url"),
            description: text("description"),
            test_type,
            duration: text("duration"),
            adaptive_support: text("adaptive_support"),
            remote_support: text("remote_support"),
        });
    }
    Ok(rows)
}

fn json_scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize_rows(rows: Vec<RawRow>) -> Vec<AssessmentRecord> {
    let mut records = Vec::with_capacity(rows.len());
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut repaired = 0usize;
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for (idx, row) in rows.into_iter().enumerate() {
        let url = non_empty(row.url).unwrap_or_default();
        let name = non_empty(row.name).unwrap_or_else(|| name_from_url(&url));
        if name.is_empty() && url.is_empty() {
            warn!(row = idx, "catalog row has neither name nor url, skipping");
            skipped += 1;
            continue;
        }
        if !url.is_empty() && !seen_urls.insert(normalize_url(&url)) {
            debug!(row = idx, url, "duplicate catalog url, skipping");
            duplicates += 1;
            continue;
        }

        let (test_type, tt_ok) = normalize_test_type(&row.test_type);
        let (duration, d_ok) = parse_duration(row.duration.as_deref());
        let (adaptive_support, a_ok) = parse_support(row.adaptive_support.as_deref(), DEFAULT_ADAPTIVE);
        let (remote_support, r_ok) = parse_support(row.remote_support.as_deref(), DEFAULT_REMOTE);
        for (field, ok) in [
            ("test_type", tt_ok),
            ("duration", d_ok),
            ("adaptive_support", a_ok),
            ("remote_support", r_ok),
        ] {
            if !ok {
                debug!(row = idx, field, "malformed field replaced with default");
                repaired += 1;
            }
        }

        records.push(AssessmentRecord {
            id: non_empty(row.id).unwrap_or_else(|| idx.to_string()),
            name,
            url,
            description: row.description.unwrap_or_default().trim().to_string(),
            test_type,
            duration,
            adaptive_support,
            remote_support,
        });
    }

    if repaired > 0 || skipped > 0 || duplicates > 0 {
        info!(repaired, skipped, duplicates, "catalog rows normalized");
    }
    records
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !is_null_marker(v))
}

fn is_null_marker(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "nan" | "null" | "none")
}

/// Lower-cased, without surrounding whitespace or a trailing slash.
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// "https://x/view/core-java-entry-level-new/" → "Core Java Entry Level New".
fn name_from_url(url: &str) -> String {
    let slug = url.trim().trim_end_matches('/').rsplit('/').next().unwrap_or("");
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn default_test_type() -> Vec<String> {
    vec![DEFAULT_TEST_TYPE.to_string()]
}

/// Map a display name such as "Knowledge & Skills" to its code; keep anything else.
fn canonical_code(token: &str) -> String {
    TestCategory::from_display_name(token)
        .map(|c| c.code().to_string())
        .unwrap_or_else(|| token.to_string())
}

fn clean_tokens<I: IntoIterator<Item = String>>(tokens: I) -> Vec<String> {
    tokens
        .into_iter()
        .map(|t| t.trim().trim_matches(['"', '\'', '[', ']']).trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| canonical_code(&t))
        .collect()
}

fn normalize_test_type(cell: &TestTypeCell) -> (Vec<String>, bool) {
    match cell {
        TestTypeCell::Missing => (default_test_type(), false),
        TestTypeCell::List(items) => {
            let codes = clean_tokens(items.iter().cloned());
            if codes.is_empty() {
                (default_test_type(), false)
            } else {
                (codes, true)
            }
        }
        TestTypeCell::Text(text) => match parse_test_type(text) {
            Some(codes) => (codes, true),
            None => (default_test_type(), false),
        },
    }
}

/// Parse a serialized `test_type` cell. `None` means the cell is unusable.
///
/// Accepted shapes, in order: a JSON array (single quotes tolerated), a comma-separated
/// list, a single letter, a category display name.
pub fn parse_test_type(cell: &str) -> Option<Vec<String>> {
    let value = cell.trim();
    if value.is_empty() || is_null_marker(value) {
        return None;
    }

    if value.starts_with('[') && value.ends_with(']') {
        let parsed: Value = serde_json::from_str(&value.replace('\'', "\"")).ok()?;
        let Value::Array(items) = parsed else {
            return None;
        };
        let codes = clean_tokens(items.iter().filter_map(json_scalar_text));
        return (!codes.is_empty()).then_some(codes);
    }

    if value.contains(',') {
        let codes = clean_tokens(value.split(',').map(str::to_string));
        return (!codes.is_empty()).then_some(codes);
    }

    let mut chars = value.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_alphabetic() {
            return Some(vec![c.to_uppercase().collect()]);
        }
    }

    TestCategory::from_display_name(value).map(|c| vec![c.code().to_string()])
}

/// Minutes from an integer, a float, or text with a leading number ("45 minutes").
fn parse_duration(cell: Option<&str>) -> (u32, bool) {
    let Some(value) = cell.map(str::trim).filter(|v| !v.is_empty() && !is_null_marker(v)) else {
        return (DEFAULT_DURATION, false);
    };
    if let Ok(minutes) = value.parse::<u32>() {
        return (minutes, true);
    }
    if let Ok(minutes) = value.parse::<f64>() {
        if minutes.is_finite() && minutes >= 0.0 {
            return (minutes.round() as u32, true);
        }
        return (DEFAULT_DURATION, false);
    }
    let digits: String = value
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    match digits.parse::<u32>() {
        Ok(minutes) => (minutes, true),
        Err(_) => (DEFAULT_DURATION, false),
    }
}

fn parse_support(cell: Option<&str>, default: Support) -> (Support, bool) {
    match cell.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("yes" | "y" | "true" | "1") => (Support::Yes, true),
        Some("no" | "n" | "false" | "0") => (Support::No, true),
        _ => (default, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_test_type_shapes() {
        assert_eq!(parse_test_type(r#"["K", "P"]"#), Some(codes(&["K", "P"])));
        assert_eq!(parse_test_type("['A', 'S']"), Some(codes(&["A", "S"])));
        assert_eq!(parse_test_type("K, P"), Some(codes(&["K", "P"])));
        assert_eq!(parse_test_type("p"), Some(codes(&["P"])));
        assert_eq!(parse_test_type("Knowledge & Skills"), Some(codes(&["K"])));
        assert_eq!(
            parse_test_type("Knowledge & Skills, Personality & Behavior"),
            Some(codes(&["K", "P"]))
        );
    }

    #[test]
    fn test_malformed_test_type_always_defaults_to_non_empty_list() {
        let malformed = [
            "", "   ", "nan", "NaN", "null", "None", "[", "[]", "[K, P", "[not json]",
            "[{}]", "[null]", ",", " , , ", "42", "KP", "unknown category", "[\"\"]",
        ];
        for cell in malformed {
            let (types, _) = normalize_test_type(&TestTypeCell::Text(cell.to_string()));
            assert!(!types.is_empty(), "empty list for {cell:?}");
            assert!(types.iter().all(|t| !t.is_empty()), "empty code for {cell:?}");
        }
        let (types, ok) = normalize_test_type(&TestTypeCell::Missing);
        assert_eq!(types, codes(&["K"]));
        assert!(!ok);
        let (types, ok) = normalize_test_type(&TestTypeCell::List(vec![]));
        assert_eq!(types, codes(&["K"]));
        assert!(!ok);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(Some("45")), (45, true));
        assert_eq!(parse_duration(Some("45.0")), (45, true));
        assert_eq!(parse_duration(Some("about 30 minutes")), (30, true));
        assert_eq!(parse_duration(Some("untimed")), (60, false));
        assert_eq!(parse_duration(Some("-5")), (60, false));
        assert_eq!(parse_duration(Some("nan")), (60, false));
        assert_eq!(parse_duration(None), (60, false));
    }

    #[test]
    fn test_parse_support() {
        assert_eq!(parse_support(Some("Yes"), Support::No), (Support::Yes, true));
        assert_eq!(parse_support(Some(" n "), Support::Yes), (Support::No, true));
        assert_eq!(parse_support(Some("maybe"), Support::Yes), (Support::Yes, false));
        assert_eq!(parse_support(None, Support::No), (Support::No, false));
    }

    #[test]
    fn test_name_from_url() {
        assert_eq!(
            name_from_url("https://www.shl.com/solutions/products/product-catalog/view/core-java-entry-level-new/"),
            "Core Java Entry Level New"
        );
        assert_eq!(name_from_url(""), "");
    }

    #[test]
    fn test_load_csv_with_defaults_and_repairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "catalog.csv",
            "name,url,description,test_type\n\
             Java 8,https://example.com/java-8/,Core Java,\"[\"\"K\"\"]\"\n\
             Teamwork,https://example.com/team/,Collaboration,\"P, C\"\n\
             Broken,https://example.com/broken/,Bad cell,[oops\n",
        );
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.records.len(), 3);
        assert_eq!(catalog.digest.len(), 64);

        let java = &catalog.records[0];
        assert_eq!(java.id, "0");
        assert_eq!(java.test_type, codes(&["K"]));
        assert_eq!(java.duration, 60);
        assert_eq!(java.adaptive_support, Support::No);
        assert_eq!(java.remote_support, Support::Yes);

        assert_eq!(catalog.records[1].test_type, codes(&["P", "C"]));
        assert_eq!(catalog.records[2].test_type, codes(&["K"]));
    }

    #[test]
    fn test_load_csv_aliases_duplicates_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "shl_catalog.csv",
            "Assessment_Name,Assessment_URL,duration,adaptive_support,remote_support\n\
             ,https://example.com/view/sql-server/,30,yes,no\n\
             SQL again,https://example.com/view/sql-server,30,yes,no\n\
             ,,,,\n",
        );
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.records.len(), 1);
        let sql = &catalog.records[0];
        assert_eq!(sql.name, "Sql Server");
        assert_eq!(sql.duration, 30);
        assert_eq!(sql.adaptive_support, Support::Yes);
        assert_eq!(sql.remote_support, Support::No);
    }

    #[test]
    fn test_load_json_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "assessments.json",
            r#"[
                {"id": "java", "name": "Java 8", "url": "https://example.com/java/",
                 "description": "Java", "test_type": ["K", "S"], "duration": 45,
                 "adaptive_support": "Yes", "remote_support": "Yes"},
                {"name": "OPQ", "url": "https://example.com/opq/", "test_type": "P",
                 "duration": "25 minutes"},
                {"name": "Null types", "url": "https://example.com/x/", "test_type": null},
                "not an object"
            ]"#,
        );
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.records.len(), 3);
        assert_eq!(catalog.records[0].id, "java");
        assert_eq!(catalog.records[0].test_type, codes(&["K", "S"]));
        assert_eq!(catalog.records[1].id, "1");
        assert_eq!(catalog.records[1].duration, 25);
        assert_eq!(catalog.records[2].test_type, codes(&["K"]));
    }

    #[test]
    fn test_load_json_wrapped_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "assessments.json",
            r#"{"recommended_assessments": [{"name": "A", "url": "https://example.com/a/"}]}"#,
        );
        assert_eq!(load_catalog(&path).unwrap().records.len(), 1);
    }

    #[test]
    fn test_invalid_json_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "assessments.json", "{not json");
        assert!(matches!(load_catalog(&path), Err(AppError::Catalog { .. })));
    }

    #[test]
    fn test_locate_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("shl_assessments.csv");
        let present = write_file(&dir, "catalog.csv", "name,url\n");

        let found = locate_catalog(&[missing.clone(), present.clone()]).unwrap();
        assert_eq!(found, present);

        match locate_catalog(&[missing.clone()]) {
            Err(AppError::CatalogNotFound(paths)) => assert_eq!(paths, vec![missing]),
            other => panic!("expected CatalogNotFound, got {other:?}"),
        }
    }
}
