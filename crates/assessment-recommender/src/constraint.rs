/// Duration hints in free-text queries ("30-40 minutes", "about an hour", "short test").
///
/// A priority-ordered list of pattern rules, not a grammar: the first rule whose
/// pattern matches (case-insensitive, leftmost occurrence) decides the window.
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::QueryConstraint;

/// Slack around a single stated duration ("40 minutes" → 30..=50).
const SINGLE_VALUE_SLACK: u32 = 10;

struct Rule {
    name: &'static str,
    pattern: Regex,
    window: fn(&Captures) -> Option<QueryConstraint>,
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule {
            name: "range",
            pattern: Regex::new(
                r"(?i)(\d+(?:\.\d+)?)\s*(?:-|–|to)\s*(\d+(?:\.\d+)?)\s*(?:-\s*)?(minutes?|mins?|hours?|hrs?)\b",
            )
            .expect("valid regex"),
            window: range_window,
        },
        Rule {
            name: "minutes",
            pattern: Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:-\s*)?(?:minutes?|mins?)\b")
                .expect("valid regex"),
            window: |caps| minutes(caps, 1, 1).map(around),
        },
        Rule {
            name: "hours",
            pattern: Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:-\s*)?(?:hours?|hrs?)\b")
                .expect("valid regex"),
            window: |caps| minutes(caps, 1, 60).map(around),
        },
        Rule {
            name: "about_an_hour",
            pattern: Regex::new(r"(?i)\babout\s+an?\s+hour\b").expect("valid regex"),
            window: |_| Some(around(60)),
        },
        Rule {
            name: "short",
            pattern: Regex::new(r"(?i)\b(?:short\s+test|quick\s+assessment)").expect("valid regex"),
            window: |_| Some(QueryConstraint::between(15, 30)),
        },
        Rule {
            name: "long",
            pattern: Regex::new(r"(?i)\blong\s+assessment").expect("valid regex"),
            window: |_| Some(QueryConstraint::between(90, 180)),
        },
        // A bare number only: "under 5 developers" is not a duration. Bounds with a
        // unit are already taken by the minutes and hours rules.
        Rule {
            name: "upper_bound",
            pattern: Regex::new(
                r"(?i)\b(?:less\s+than|at\s+most|max(?:imum)?|under)\s*(\d+)\s*(?:$|[,;:!?)]|\.(?:\s|$))",
            )
            .expect("valid regex"),
            window: |caps| minutes(caps, 1, 1).map(|n| QueryConstraint::between(0, n)),
        },
    ]
});

/// Extract the duration window a query asks for.
pub fn extract_constraint(text: &str) -> QueryConstraint {
    for rule in RULES.iter() {
        let Some(caps) = rule.pattern.captures(text) else {
            continue;
        };
        if let Some(constraint) = (rule.window)(&caps) {
            tracing::debug!(rule = rule.name, ?constraint, "duration constraint extracted");
            return constraint;
        }
    }
    QueryConstraint::unconstrained()
}

/// Capture `group` as a number of `scale`-minute units, rounded to whole minutes.
fn minutes(caps: &Captures, group: usize, scale: u32) -> Option<u32> {
    let value: f64 = caps.get(group)?.as_str().parse().ok()?;
    let total = (value * f64::from(scale)).round();
    (total.is_finite() && total >= 0.0 && total <= f64::from(u32::MAX)).then_some(total as u32)
}

fn around(minutes: u32) -> QueryConstraint {
    QueryConstraint::between(
        minutes.saturating_sub(SINGLE_VALUE_SLACK),
        minutes.saturating_add(SINGLE_VALUE_SLACK),
    )
}

fn range_window(caps: &Captures) -> Option<QueryConstraint> {
    let unit = caps.get(3)?.as_str().to_ascii_lowercase();
    let scale = if unit.starts_with('h') { 60 } else { 1 };
    Some(QueryConstraint::between(
        minutes(caps, 1, scale)?,
        minutes(caps, 2, scale)?,
    ))
}
