use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed set of categories the extractor is allowed to emit.
pub const CATEGORIES: &[&str] = &[
  "profile_stable",
  "preference",
  "goal_plan",
  "routine",
  "skill",
  "relationship",
  "health",
  "context_env",
  "affective_marker",
  "event",
  "conversation_context",
];

/// Tag applied to every fact synthesized by the consolidator.
pub const CONSOLIDATED_TAG: &str = "consolidated";

/// Prefix for the metadata key a consolidated fact records per cited source.
pub const SOURCE_FACT_METADATA_PREFIX: &str = "source_fact_";

/// A structured, atomic, subject-attribute-value claim with provenance and
/// an embedding. `content` is always recomputed from the structured fields
/// (see `Fact::render_content`) — it is never hand-edited independently of
/// them, except by the Decision Engine's UPDATE path, which replaces it with
/// a model-authored revision while leaving the structured fields untouched.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Fact {
  pub id: Uuid,
  pub content: String,
  pub timestamp: DateTime<Utc>,
  pub source: String,
  pub tags: Vec<String>,
  pub document_references: Vec<Uuid>,
  pub metadata: HashMap<String, Json>,
  pub category: String,
  pub subject: String,
  pub attribute: String,
  pub value: String,
  pub temporal_context: Option<String>,
  pub sensitivity: Sensitivity,
  pub importance: Importance,
  pub file_path: Option<String>,
  pub vector: Vec<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
  Low,
  Medium,
  High,
}

impl Sensitivity {
  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
    }
  }
}

impl std::str::FromStr for Sensitivity {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "low" => Ok(Self::Low),
      "medium" => Ok(Self::Medium),
      "high" => Ok(Self::High),
      other => Err(format!("unknown sensitivity: {other}")),
    }
  }
}

/// `1` = low, `2` = medium, `3` = high — validated on construction, not
/// represented as an arbitrary integer column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum Importance {
  Low = 1,
  Medium = 2,
  High = 3,
}

impl Importance {
  #[must_use]
  pub const fn as_i16(self) -> i16 {
    self as i16
  }

  #[must_use]
  pub const fn from_i16(value: i16) -> Self {
    match value {
      3 => Self::High,
      2 => Self::Medium,
      _ => Self::Low,
    }
  }
}

impl Fact {
  /// Build a fact from structured fields, computing `content` via
  /// `render_content` and assigning a fresh id.
  #[allow(clippy::too_many_arguments)]
  pub fn new_structured(
    category: &str,
    subject: &str,
    attribute: &str,
    value: &str,
    temporal_context: Option<String>,
    sensitivity: &str,
    importance: i16,
    source: &str,
    file_path: Option<String>,
    document_references: Vec<Uuid>,
    timestamp: DateTime<Utc>,
  ) -> Self {
    let sensitivity = sensitivity.parse().unwrap_or(Sensitivity::Low);
    let importance = Importance::from_i16(importance);
    let content = render_content(subject, value, attribute, category, temporal_context.as_deref());

    Self {
      id: Uuid::new_v4(),
      content,
      timestamp,
      source: source.to_owned(),
      tags: Vec::new(),
      document_references,
      metadata: HashMap::new(),
      category: category.to_owned(),
      subject: subject.to_owned(),
      attribute: attribute.to_owned(),
      value: value.to_owned(),
      temporal_context,
      sensitivity,
      importance,
      file_path,
      vector: Vec::new(),
    }
  }

  /// Recompute `content` from the current structured fields. Called after
  /// any structured-field edit so `content` (and thus the embedding derived
  /// from it) never drifts from the fields it is supposed to project.
  pub fn refresh_content(&mut self) {
    self.content = render_content(
      &self.subject,
      &self.value,
      &self.attribute,
      &self.category,
      self.temporal_context.as_deref(),
    );
  }

  #[must_use]
  pub fn is_consolidated(&self) -> bool {
    self.tags.iter().any(|t| t == CONSOLIDATED_TAG)
  }

  /// Extract every `source_fact_<n>` id recorded in this fact's metadata.
  #[must_use]
  pub fn cited_source_fact_ids(&self) -> Vec<Uuid> {
    self
      .metadata
      .iter()
      .filter(|(k, _)| k.starts_with(SOURCE_FACT_METADATA_PREFIX))
      .filter_map(|(_, v)| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
      .collect()
  }
}

/// The stable subject name the extractor and decision engine use for the
/// conversation's primary user (see `ConversationDocument::primary_user` and
/// the anonymization token it is rendered as before reaching the model).
pub const PRIMARY_USER_SUBJECT: &str = "user";

/// `"subject value (attribute) (category) (temporalContext)"`, prefixed
/// `"User: "` when `subject` (case-insensitively) is the primary user.
fn render_content(
  subject: &str,
  value: &str,
  attribute: &str,
  category: &str,
  temporal_context: Option<&str>,
) -> String {
  let mut s = format!("{subject} {value} ({attribute}) ({category})");
  if let Some(tc) = temporal_context {
    s.push_str(&format!(" ({tc})"));
  }
  if subject.eq_ignore_ascii_case(PRIMARY_USER_SUBJECT) {
    s = format!("User: {s}");
  }
  s
}
