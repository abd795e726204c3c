use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Boolean combinator for a leaf of `TagExpr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
  And,
  Or,
}

/// A recursive boolean expression tree over tags. Backends that cannot
/// express this natively expand it into a union of conjunctions (one query
/// per leaf, merged and deduplicated); the in-memory backend evaluates it
/// directly.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub enum TagExpr {
  Leaf { op: BoolOp, tags: Vec<String> },
  Branch { op: BoolOp, children: Vec<TagExpr> },
}

impl TagExpr {
  #[must_use]
  pub fn evaluate(&self, present: &[String]) -> bool {
    match self {
      Self::Leaf { op, tags } => match op {
        BoolOp::And => tags.iter().all(|t| present.contains(t)),
        BoolOp::Or => tags.iter().any(|t| present.contains(t)),
      },
      Self::Branch { op, children } => match op {
        BoolOp::And => children.iter().all(|c| c.evaluate(present)),
        BoolOp::Or => children.iter().any(|c| c.evaluate(present)),
      },
    }
  }
}

/// The simple forms most callers use, plus an escape hatch to the full tree.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub enum TagFilter {
  /// ContainsAll
  All(Vec<String>),
  /// ContainsAny
  Any(Vec<String>),
  Expr(TagExpr),
}

impl TagFilter {
  #[must_use]
  pub fn evaluate(&self, present: &[String]) -> bool {
    match self {
      Self::All(tags) => tags.iter().all(|t| present.contains(t)),
      Self::Any(tags) => tags.iter().any(|t| present.contains(t)),
      Self::Expr(expr) => expr.evaluate(present),
    }
  }
}

/// All filter legs are optional and combined conjunctively. `distance`,
/// when > 0, is a maximum cosine-distance cutoff in `[0, 2]` evaluated
/// against a widened candidate set (see the storage contract); `limit`
/// defaults to 100, `0` returns empty, negative is treated as the default.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Filter {
  pub source: Option<String>,
  pub subject: Option<String>,
  pub tags: Option<TagFilter>,
  pub fact_category: Option<String>,
  pub fact_attribute: Option<String>,
  pub fact_file_path: Option<String>,
  pub fact_importance: Option<i16>,
  pub fact_importance_min: Option<i16>,
  pub fact_importance_max: Option<i16>,
  pub timestamp_after: Option<DateTime<Utc>>,
  pub timestamp_before: Option<DateTime<Utc>>,
  pub document_references: Option<Uuid>,
  pub distance: Option<f32>,
  pub limit: Option<i64>,
}

/// Default page size when `limit` is unset.
pub const DEFAULT_LIMIT: i64 = 100;

impl Filter {
  #[must_use]
  pub fn with_subject(subject: impl Into<String>) -> Self {
    Self {
      subject: Some(subject.into()),
      ..Self::default()
    }
  }

  #[must_use]
  pub fn with_tags_any(mut self, tags: Vec<String>) -> Self {
    self.tags = Some(TagFilter::Any(tags));
    self
  }

  #[must_use]
  pub fn with_distance(mut self, distance: f32) -> Self {
    self.distance = Some(distance);
    self
  }

  #[must_use]
  pub fn with_importance_min(mut self, min: i16) -> Self {
    self.fact_importance_min = Some(min);
    self
  }

  #[must_use]
  pub fn with_limit(mut self, limit: i64) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Resolve `limit` per the documented semantics: unset → default, `0` →
  /// empty (represented as `Some(0)`), negative → default.
  #[must_use]
  pub fn resolved_limit(&self) -> i64 {
    match self.limit {
      None => DEFAULT_LIMIT,
      Some(0) => 0,
      Some(n) if n < 0 => DEFAULT_LIMIT,
      Some(n) => n,
    }
  }

  /// `true` when the importance range is inverted (`min > max`), which must
  /// yield an empty result rather than an error.
  #[must_use]
  pub fn importance_range_is_empty(&self) -> bool {
    matches!(
      (self.fact_importance_min, self.fact_importance_max),
      (Some(min), Some(max)) if min > max
    )
  }
}
