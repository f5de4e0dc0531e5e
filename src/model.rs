use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::semantic::ModelConfig;

pub const WELLBEING_MIN: i64 = 1;
pub const WELLBEING_MAX: i64 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Task {
    #[serde(rename = "A.1")]
    A1,
    #[serde(rename = "A.2")]
    A2,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C")]
    C,
}

impl Task {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A1 => "A.1",
            Self::A2 => "A.2",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Raw annotation exports (one JSON file per timeline)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawTimeline {
    pub timeline_id: String,
    #[serde(default)]
    pub timeline_summary: Option<String>,
    pub posts: Vec<RawPost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub post_id: String,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(rename = "Post Summary", default)]
    pub post_summary: Option<String>,
    #[serde(default)]
    pub evidence: Option<RawEvidence>,
    #[serde(rename = "Well-being", default)]
    pub wellbeing: Value,
}

/// Evidence keyed by element tag; key order follows the export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvidence {
    #[serde(rename = "adaptive-state", default)]
    pub adaptive: Map<String, Value>,
    #[serde(rename = "maladaptive-state", default)]
    pub maladaptive: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEvidenceElement {
    pub highlighted_evidence: String,
    #[serde(rename = "Category", default)]
    pub category: String,
}

// ---------------------------------------------------------------------------
// Canonical gold store
// ---------------------------------------------------------------------------

pub type GoldStore = BTreeMap<String, GoldTimeline>;

/// Timeline id to its ordered post ids.
pub type TimelinePostMapping = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoldTimeline {
    pub timeline_level: GoldTimelineLevel,
    pub post_level: BTreeMap<String, GoldPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoldTimelineLevel {
    pub summary: String,
    pub summary_sents: Vec<String>,
    pub adaptive_spans: Vec<EvidenceSpan>,
    pub maladaptive_spans: Vec<EvidenceSpan>,
    /// Sentences of each post's text, one list per post in timeline order.
    pub sents: Vec<Vec<String>>,
    pub post_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceSpan {
    pub text: String,
    pub element: String,
    pub subcategory: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GoldPost {
    pub summary: String,
    pub summary_sents: Vec<String>,
    pub wellbeing_score: Option<i64>,
}

// ---------------------------------------------------------------------------
// Wellbeing score readings
// ---------------------------------------------------------------------------

/// How a wellbeing value was written in a JSON document.
///
/// The validator reports on the reading itself; scoring only ever sees
/// [`ScoreReading::score`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreReading {
    Missing,
    Integer(i64),
    NumericString(i64),
    Float { raw: f64, truncated: i64 },
    Malformed { found: &'static str },
}

impl ScoreReading {
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Missing,
            Some(Value::Number(number)) => {
                if let Some(integer) = number.as_i64() {
                    Self::Integer(integer)
                } else if number.is_f64() {
                    let raw = number.as_f64().unwrap_or(f64::NAN);
                    if raw.is_finite() {
                        Self::Float {
                            raw,
                            truncated: raw.trunc() as i64,
                        }
                    } else {
                        Self::Malformed { found: "number" }
                    }
                } else {
                    Self::Malformed { found: "integer" }
                }
            }
            Some(Value::String(raw)) => {
                let trimmed = raw.trim();
                if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
                    match trimmed.parse::<i64>() {
                        Ok(parsed) => Self::NumericString(parsed),
                        Err(_) => Self::Malformed { found: "string" },
                    }
                } else {
                    Self::Malformed { found: "string" }
                }
            }
            Some(other) => Self::Malformed {
                found: json_type_name(other),
            },
        }
    }

    /// The numeric value as written, before truncation.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Self::Integer(value) | Self::NumericString(value) => Some(*value as f64),
            Self::Float { raw, .. } => Some(*raw),
            Self::Missing | Self::Malformed { .. } => None,
        }
    }

    pub fn is_out_of_range(&self) -> bool {
        self.numeric()
            .map(|value| value < WELLBEING_MIN as f64 || value > WELLBEING_MAX as f64)
            .unwrap_or(false)
    }

    /// Integer score used for scoring, `None` when missing, malformed or out of range.
    pub fn score(&self) -> Option<i64> {
        if self.is_out_of_range() {
            return None;
        }
        match self {
            Self::Integer(value) | Self::NumericString(value) => Some(*value),
            Self::Float { truncated, .. } => Some(*truncated),
            Self::Missing | Self::Malformed { .. } => None,
        }
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Participant submissions (normalized for scoring)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PredictedPost {
    pub adaptive_evidence: Vec<String>,
    pub maladaptive_evidence: Vec<String>,
    pub summary: String,
    pub wellbeing_score: Option<i64>,
}

impl PredictedPost {
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        Self {
            adaptive_evidence: string_list(object.get("adaptive_evidence")),
            maladaptive_evidence: string_list(object.get("maladaptive_evidence")),
            summary: object
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            wellbeing_score: ScoreReading::from_json(object.get("wellbeing_score")).score(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictedTimeline {
    pub summary: Option<String>,
    pub posts: HashMap<String, PredictedPost>,
}

impl PredictedTimeline {
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let summary = object
            .get("timeline_level")
            .and_then(|level| level.get("summary"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        let posts = object
            .get("post_level")
            .and_then(Value::as_object)
            .map(|post_level| {
                post_level
                    .iter()
                    .map(|(post_id, post)| (post_id.clone(), PredictedPost::from_value(post)))
                    .collect::<HashMap<String, PredictedPost>>()
            })
            .unwrap_or_default();

        Self { summary, posts }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub timelines: HashMap<String, PredictedTimeline>,
}

impl Submission {
    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            bail!(
                "submission root must be an object of timelines, got {}",
                json_type_name(value)
            );
        };

        let timelines = object
            .iter()
            .map(|(timeline_id, timeline)| {
                (timeline_id.clone(), PredictedTimeline::from_value(timeline))
            })
            .collect();

        Ok(Self { timelines })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let value: Value = crate::util::read_json(path)?;
        Self::from_value(&value)
            .with_context(|| format!("invalid submission structure in {}", path.display()))
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Metric results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub task: Task,
    pub value: f64,
}

impl Metric {
    pub fn new(name: impl Into<String>, task: Task, value: f64) -> Self {
        Self {
            name: name.into(),
            task,
            value,
        }
    }

    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            name: format!("{}_{}", self.name, suffix),
            task: self.task,
            value: self.value,
        }
    }
}

/// One row of the results table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRow {
    pub timeline_id: String,
    pub metric: String,
    pub task: Task,
    pub value: f64,
    pub team_name: String,
    pub submission_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitter {
    pub team_name: String,
    pub submission_id: String,
}

impl Submitter {
    /// `{team}_{submission}` file stems split in two; anything else uses the stem for both.
    pub fn from_path(path: &Path) -> Self {
        let stem = crate::util::file_stem_string(path).unwrap_or_default();
        let parts = stem.split('_').collect::<Vec<&str>>();
        if let [team_name, submission_id] = parts.as_slice() {
            return Self {
                team_name: (*team_name).to_string(),
                submission_id: (*submission_id).to_string(),
            };
        }

        Self {
            team_name: stem.clone(),
            submission_id: stem,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring run manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ScoreRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub split: String,
    pub started_at: String,
    pub completed_at: String,
    pub tasks: Vec<Task>,
    pub evidence_consistency: bool,
    pub models: ModelDescriptors,
    pub gold_path: String,
    pub gold_sha256: String,
    pub submissions: Vec<SubmissionEntry>,
    pub row_count: usize,
    pub results_csv: String,
    pub results_db: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptors {
    pub similarity: ModelConfig,
    pub tokenizer: ModelConfig,
    pub entailment: ModelConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionEntry {
    pub file_name: String,
    pub team_name: String,
    pub submission_id: String,
    pub sha256: String,
    pub row_count: usize,
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;

    #[test]
    fn score_reading_accepts_integers_and_numeric_strings() {
        assert_eq!(ScoreReading::from_json(Some(&json!(7))).score(), Some(7));
        assert_eq!(ScoreReading::from_json(Some(&json!(" 7 "))).score(), Some(7));
        assert_eq!(
            ScoreReading::from_json(Some(&json!("7"))),
            ScoreReading::NumericString(7)
        );
    }

    #[test]
    fn score_reading_truncates_floats() {
        let reading = ScoreReading::from_json(Some(&json!(7.0)));
        assert_eq!(
            reading,
            ScoreReading::Float {
                raw: 7.0,
                truncated: 7
            }
        );
        assert_eq!(reading.score(), Some(7));
        assert_eq!(ScoreReading::from_json(Some(&json!(6.9))).score(), Some(6));
    }

    #[test]
    fn score_reading_treats_out_of_range_and_malformed_as_absent() {
        for value in [json!(0), json!(11), json!(10.5), json!("-3"), json!("7.0"), json!("")] {
            assert_eq!(
                ScoreReading::from_json(Some(&value)).score(),
                None,
                "value {value} should not score"
            );
        }
        assert_eq!(
            ScoreReading::from_json(Some(&json!(true))),
            ScoreReading::Malformed { found: "boolean" }
        );
        assert_eq!(ScoreReading::from_json(None), ScoreReading::Missing);
        assert_eq!(ScoreReading::from_json(Some(&Value::Null)), ScoreReading::Missing);
        assert!(ScoreReading::from_json(Some(&json!(11))).is_out_of_range());
        assert!(!ScoreReading::from_json(Some(&json!("x"))).is_out_of_range());
    }

    #[test]
    fn predicted_post_defaults_malformed_fields() {
        let post = PredictedPost::from_value(&json!({
            "adaptive_evidence": ["keeps going", 3, "  "],
            "maladaptive_evidence": "not a list",
            "summary": null,
            "wellbeing_score": "4"
        }));
        assert_eq!(post.adaptive_evidence, vec!["keeps going", "  "]);
        assert!(post.maladaptive_evidence.is_empty());
        assert_eq!(post.summary, "");
        assert_eq!(post.wellbeing_score, Some(4));

        let empty = PredictedPost::from_value(&json!([1, 2]));
        assert!(empty.adaptive_evidence.is_empty());
        assert_eq!(empty.wellbeing_score, None);
    }

    #[test]
    fn submission_rejects_non_object_root() {
        let error = Submission::from_value(&json!([1])).expect_err("array root should fail");
        assert!(error.to_string().contains("got array"), "unexpected: {error}");
    }

    #[test]
    fn submission_reads_timeline_and_post_levels() {
        let submission = Submission::from_value(&json!({
            "t1": {
                "timeline_level": {"summary": "Overall stable."},
                "post_level": {"p1": {"summary": "Fine.", "wellbeing_score": 8}}
            },
            "t2": {"timeline_level": {"summary": 5}}
        }))
        .expect("object root");

        let t1 = &submission.timelines["t1"];
        assert_eq!(t1.summary.as_deref(), Some("Overall stable."));
        assert_eq!(t1.posts["p1"].wellbeing_score, Some(8));
        assert!(submission.timelines["t2"].summary.is_none());
        assert!(submission.timelines["t2"].posts.is_empty());
    }

    #[test]
    fn submitter_parses_team_and_submission_from_stem() {
        let parsed = Submitter::from_path(&PathBuf::from("/tmp/owls_run2.json"));
        assert_eq!(parsed.team_name, "owls");
        assert_eq!(parsed.submission_id, "run2");

        let bare = Submitter::from_path(&PathBuf::from("dummy.json"));
        assert_eq!(bare.team_name, "dummy");
        assert_eq!(bare.submission_id, "dummy");

        let many = Submitter::from_path(&PathBuf::from("a_b_c.json"));
        assert_eq!(many.team_name, "a_b_c");
        assert_eq!(many.submission_id, "a_b_c");
    }

    #[test]
    fn task_serializes_with_dotted_labels() {
        assert_eq!(serde_json::to_value(Task::A1).expect("serialize"), json!("A.1"));
        assert_eq!(Task::A2.to_string(), "A.2");
    }
}
