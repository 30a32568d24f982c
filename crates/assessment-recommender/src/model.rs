use serde::{Deserialize, Serialize};

/// Default category code when a record's `test_type` cannot be recovered.
pub const DEFAULT_TEST_TYPE: &str = "K";
/// Default assessment length in minutes.
pub const DEFAULT_DURATION: u32 = 60;

/// A Yes/No catalog flag, serialized as the strings "Yes" and "No".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Support {
    Yes,
    No,
}

/// A single catalogued assessment, normalized at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    /// Row id from the catalog, or the zero-based row index
    pub id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    /// Category codes such as "K" or "P". Never empty.
    pub test_type: Vec<String>,
    /// Length in minutes
    pub duration: u32,
    pub adaptive_support: Support,
    pub remote_support: Support,
}

impl AssessmentRecord {
    /// Text handed to the embedding model: name, description and the category codes.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.description,
            self.test_type.join(" ")
        )
    }

    pub fn groups(&self) -> impl Iterator<Item = CategoryGroup> + '_ {
        self.test_type
            .iter()
            .filter_map(|code| TestCategory::from_code(code))
            .map(TestCategory::group)
    }

    pub fn has_group(&self, group: CategoryGroup) -> bool {
        self.groups().any(|g| g == group)
    }
}

/// Duration window parsed from a query. Both bounds are set or neither is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryConstraint {
    pub min_minutes: Option<u32>,
    pub max_minutes: Option<u32>,
}

impl QueryConstraint {
    pub fn between(min: u32, max: u32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min_minutes: Some(min),
            max_minutes: Some(max),
        }
    }

    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// The `[min, max]` window, if the query carried one.
    pub fn window(&self) -> Option<(u32, u32)> {
        self.min_minutes.zip(self.max_minutes)
    }
}

/// Assessment categories used by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCategory {
    AbilityAptitude,
    BiodataSituationalJudgement,
    Competencies,
    Development360,
    AssessmentExercises,
    KnowledgeSkills,
    PersonalityBehavior,
    Simulations,
}

/// Coarse grouping used when balancing a mixed technical/behavioral query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryGroup {
    Technical,
    Behavioral,
    Neutral,
}

impl TestCategory {
    pub const ALL: [TestCategory; 8] = [
        TestCategory::AbilityAptitude,
        TestCategory::BiodataSituationalJudgement,
        TestCategory::Competencies,
        TestCategory::Development360,
        TestCategory::AssessmentExercises,
        TestCategory::KnowledgeSkills,
        TestCategory::PersonalityBehavior,
        TestCategory::Simulations,
    ];

    pub fn code(self) -> &'static str {
        match self {
            TestCategory::AbilityAptitude => "A",
            TestCategory::BiodataSituationalJudgement => "B",
            TestCategory::Competencies => "C",
            TestCategory::Development360 => "D",
            TestCategory::AssessmentExercises => "E",
            TestCategory::KnowledgeSkills => "K",
            TestCategory::PersonalityBehavior => "P",
            TestCategory::Simulations => "S",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TestCategory::AbilityAptitude => "Ability & Aptitude",
            TestCategory::BiodataSituationalJudgement => "Biodata & Situational Judgement",
            TestCategory::Competencies => "Competencies",
            TestCategory::Development360 => "Development & 360",
            TestCategory::AssessmentExercises => "Assessment Exercises",
            TestCategory::KnowledgeSkills => "Knowledge & Skills",
            TestCategory::PersonalityBehavior => "Personality & Behavior",
            TestCategory::Simulations => "Simulations",
        }
    }

    pub fn group(self) -> CategoryGroup {
        match self {
            TestCategory::KnowledgeSkills | TestCategory::Simulations => CategoryGroup::Technical,
            TestCategory::PersonalityBehavior
            | TestCategory::Competencies
            | TestCategory::BiodataSituationalJudgement => CategoryGroup::Behavioral,
            _ => CategoryGroup::Neutral,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
    }

    /// Match a display name, ignoring case and treating "and" like "&".
    pub fn from_display_name(name: &str) -> Option<Self> {
        let wanted = normalize_name(name);
        Self::ALL
            .into_iter()
            .find(|c| normalize_name(c.display_name()) == wanted)
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace(" and ", " & ")
        .replace("behaviour", "behavior")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// One entry of the response schema consumed by API clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAssessment {
    pub url: String,
    pub name: String,
    pub adaptive_support: Support,
    pub description: String,
    pub duration: u32,
    pub remote_support: Support,
    pub test_type: Vec<String>,
}

impl From<&AssessmentRecord> for RecommendedAssessment {
    fn from(record: &AssessmentRecord) -> Self {
        Self {
            url: record.url.clone(),
            name: record.name.clone(),
            adaptive_support: record.adaptive_support,
            description: record.description.clone(),
            duration: record.duration,
            remote_support: record.remote_support,
            test_type: record.test_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommended_assessments: Vec<RecommendedAssessment>,
}

impl RecommendationResponse {
    pub fn from_records(records: &[AssessmentRecord]) -> Self {
        Self {
            recommended_assessments: records.iter().map(RecommendedAssessment::from).collect(),
        }
    }
}
