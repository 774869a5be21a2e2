//! Core data model types for itemstat.
//!
//! Items, students and responses are the inputs to the statistics engine;
//! `StatisticRecord` and `DifRecord` are its outputs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an assessment in the store.
pub type AssessmentId = Uuid;

/// How an item is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    /// Selected response: one letter key, worth one point.
    #[serde(rename = "MC")]
    MultipleChoice,
    /// Constructed response: the raw value is the points awarded.
    #[serde(rename = "CR")]
    ConstructedResponse,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::MultipleChoice => write!(f, "MC"),
            ItemType::ConstructedResponse => write!(f, "CR"),
        }
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MC" | "SR" => Ok(ItemType::MultipleChoice),
            "CR" => Ok(ItemType::ConstructedResponse),
            other => Err(format!("unknown item type: {other}")),
        }
    }
}

/// Scoring metadata of an item, as read from the answer-key row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub item_type: ItemType,
    /// Always > 0. 1 for multiple-choice items.
    pub max_points: f64,
    /// Upper-case key letter; `None` for constructed-response items.
    #[serde(default)]
    pub correct_answer: Option<String>,
}

impl ItemMetadata {
    pub fn multiple_choice(correct_answer: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::MultipleChoice,
            max_points: 1.0,
            correct_answer: Some(correct_answer.into().to_uppercase()),
        }
    }

    pub fn constructed_response(max_points: f64) -> Self {
        Self {
            item_type: ItemType::ConstructedResponse,
            max_points,
            correct_answer: None,
        }
    }

    pub fn is_multiple_choice(&self) -> bool {
        self.item_type == ItemType::MultipleChoice
    }
}

/// An item as stored, before the store has assigned an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub code: String,
    #[serde(flatten)]
    pub metadata: ItemMetadata,
    #[serde(default)]
    pub content_domain: Option<String>,
}

/// A persisted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub code: String,
    #[serde(flatten)]
    pub metadata: ItemMetadata,
    #[serde(default)]
    pub content_domain: Option<String>,
}

impl Item {
    pub fn max_points(&self) -> f64 {
        self.metadata.max_points
    }
}

/// Descriptive data attached to an uploaded assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentMeta {
    pub name: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub country: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl AssessmentMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            year: None,
            country: None,
            uploaded_at: Utc::now(),
        }
    }
}

/// Listing entry returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub id: AssessmentId,
    #[serde(flatten)]
    pub meta: AssessmentMeta,
    pub student_count: usize,
    pub item_count: usize,
}

/// One scored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub item_id: u64,
    /// Trimmed, upper-cased; "" means no answer.
    pub raw_value: String,
    pub is_correct: bool,
    /// 0 ≤ points_earned ≤ item max points.
    pub points_earned: f64,
}

/// A scored response keyed by item code, used when handing a freshly
/// scored student to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResponse {
    pub item_code: String,
    pub raw_value: String,
    pub is_correct: bool,
    pub points_earned: f64,
}

/// Student demographics shared by parsed, scored and stored students.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub school_type: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
}

/// A student whose responses have been scored but not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredStudent {
    pub code: String,
    #[serde(flatten)]
    pub demographics: Demographics,
    pub total_score: f64,
    pub responses: Vec<ScoredResponse>,
}

/// A persisted student with its responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: u64,
    pub code: String,
    #[serde(flatten)]
    pub demographics: Demographics,
    pub total_score: f64,
    #[serde(default)]
    pub responses: Vec<Response>,
}

impl Student {
    pub fn gender(&self) -> Option<&str> {
        self.demographics.gender.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.demographics.country.as_deref()
    }
}

/// Everything the statistics engine reads for one assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentData {
    pub id: AssessmentId,
    pub meta: AssessmentMeta,
    pub items: Vec<Item>,
    pub students: Vec<Student>,
}

/// Kind of a stored statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    N,
    Min,
    Max,
    Mean,
    Median,
    Mode,
    Stdev,
    Variance,
    Skewness,
    Kurtosis,
    CronbachAlpha,
    SplitHalfReliability,
    Sem,
    SdgMplPercentage,
    PerfBelowMinimum,
    PerfMinimum,
    PerfModerate,
    PerfHigh,
    PerfAdvanced,
    Difficulty,
    Discrimination,
    PointBiserial,
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // serde_json renders unit variants as quoted strings
        let quoted = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", quoted.trim_matches('"'))
    }
}

/// One stored statistic. `item_id == None` marks a test-level statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticRecord {
    pub assessment_id: AssessmentId,
    pub item_id: Option<u64>,
    pub stat_type: StatType,
    pub value: f64,
}

/// Sub-group comparison a DIF record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifType {
    Gender,
    Percentile,
    Country,
    CountryGender,
}

impl fmt::Display for DifType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifType::Gender => write!(f, "gender"),
            DifType::Percentile => write!(f, "percentile"),
            DifType::Country => write!(f, "country"),
            DifType::CountryGender => write!(f, "country_gender"),
        }
    }
}

impl FromStr for DifType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "gender" => Ok(DifType::Gender),
            "percentile" => Ok(DifType::Percentile),
            "country" => Ok(DifType::Country),
            "country_gender" => Ok(DifType::CountryGender),
            other => Err(format!("unknown DIF type: {other}")),
        }
    }
}

/// Magnitude class of a DIF score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifClassification {
    Negligible,
    #[serde(rename = "Slight to Moderate")]
    SlightToModerate,
    #[serde(rename = "Moderate to Large")]
    ModerateToLarge,
}

impl fmt::Display for DifClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifClassification::Negligible => write!(f, "Negligible"),
            DifClassification::SlightToModerate => write!(f, "Slight to Moderate"),
            DifClassification::ModerateToLarge => write!(f, "Moderate to Large"),
        }
    }
}

/// Per-item difference in difficulty between two sub-groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifRecord {
    pub assessment_id: AssessmentId,
    pub item_id: u64,
    pub item_code: String,
    pub dif_type: DifType,
    /// Set for country-gender comparisons only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub group_a: String,
    pub group_b: String,
    pub difficulty_a: f64,
    pub difficulty_b: f64,
    /// `difficulty_a - difficulty_b`.
    pub dif_score: f64,
    pub classification: DifClassification,
    pub sample_size_a: usize,
    pub sample_size_b: usize,
}

/// The statistics of one assessment, replaced as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticSet {
    #[serde(default)]
    pub statistics: Vec<StatisticRecord>,
    #[serde(default)]
    pub dif: Vec<DifRecord>,
}

impl StatisticSet {
    pub fn is_empty(&self) -> bool {
        self.statistics.is_empty() && self.dif.is_empty()
    }

    /// Test-level value of a statistic, if it was computed.
    pub fn test_value(&self, stat_type: StatType) -> Option<f64> {
        self.statistics
            .iter()
            .find(|s| s.item_id.is_none() && s.stat_type == stat_type)
            .map(|s| s.value)
    }

    /// Item-level value of a statistic, if it was computed.
    pub fn item_value(&self, item_id: u64, stat_type: StatType) -> Option<f64> {
        self.statistics
            .iter()
            .find(|s| s.item_id == Some(item_id) && s.stat_type == stat_type)
            .map(|s| s.value)
    }
}
