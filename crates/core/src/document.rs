use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::fact::Fact;

/// Namespace prefix for metadata keys the chunker writes. Original document
/// metadata under any other key is copied verbatim and never overwritten.
pub const CHUNK_METADATA_NAMESPACE: &str = "_engine_";

/// A single turn in a `ConversationDocument`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationMessage {
  pub speaker: String,
  pub content: String,
  pub time: Option<DateTime<Utc>>,
}

/// The polymorphic input to the pipeline. Three variants, one shared
/// capability set (`DocumentLike`) — deliberately not an inheritance tree.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub enum Document {
  Text(TextDocument),
  Conversation(ConversationDocument),
  File(FileDocument),
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TextDocument {
  pub id: Uuid,
  pub text: String,
  pub timestamp: Option<DateTime<Utc>>,
  pub source: String,
  pub tags: Vec<String>,
  pub metadata: HashMap<String, Json>,
  pub file_path: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationDocument {
  pub id: Uuid,
  pub messages: Vec<ConversationMessage>,
  pub primary_user: String,
  pub timestamp: Option<DateTime<Utc>>,
  pub source: String,
  pub tags: Vec<String>,
  pub metadata: HashMap<String, Json>,
  pub file_path: Option<String>,
}

/// Stable token the primary user's real name is replaced with in
/// `ConversationDocument::content()`, so the extraction prompt never sees
/// (and cannot be tricked into echoing) the user's actual identity.
const PRIMARY_USER_TOKEN: &str = "__PRIMARY_USER__";

/// A document that bypasses fact extraction entirely: each chunk becomes one
/// pre-made fact (category `document`, attribute `file_chunk`).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FileDocument {
  pub id: Uuid,
  pub text: String,
  pub timestamp: Option<DateTime<Utc>>,
  pub source: String,
  pub tags: Vec<String>,
  pub metadata: HashMap<String, Json>,
  pub file_path: Option<String>,
  pub subject: String,
}

/// The capability set every document variant exposes to the pipeline.
pub trait DocumentLike {
  fn id(&self) -> Uuid;
  fn content(&self) -> String;
  fn timestamp(&self) -> Option<DateTime<Utc>>;
  fn source(&self) -> &str;
  fn tags(&self) -> &[String];
  fn metadata(&self) -> &HashMap<String, Json>;
  fn file_path(&self) -> Option<&str>;
}

impl DocumentLike for Document {
  fn id(&self) -> Uuid {
    match self {
      Self::Text(d) => d.id,
      Self::Conversation(d) => d.id,
      Self::File(d) => d.id,
    }
  }

  fn content(&self) -> String {
    match self {
      Self::Text(d) => d.text.clone(),
      Self::Conversation(d) => render_conversation(d),
      Self::File(d) => d.text.clone(),
    }
  }

  fn timestamp(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Text(d) => d.timestamp,
      Self::Conversation(d) => d.timestamp,
      Self::File(d) => d.timestamp,
    }
  }

  fn source(&self) -> &str {
    match self {
      Self::Text(d) => &d.source,
      Self::Conversation(d) => &d.source,
      Self::File(d) => &d.source,
    }
  }

  fn tags(&self) -> &[String] {
    match self {
      Self::Text(d) => &d.tags,
      Self::Conversation(d) => &d.tags,
      Self::File(d) => &d.tags,
    }
  }

  fn metadata(&self) -> &HashMap<String, Json> {
    match self {
      Self::Text(d) => &d.metadata,
      Self::Conversation(d) => &d.metadata,
      Self::File(d) => &d.metadata,
    }
  }

  fn file_path(&self) -> Option<&str> {
    match self {
      Self::Text(d) => d.file_path.as_deref(),
      Self::Conversation(d) => d.file_path.as_deref(),
      Self::File(d) => d.file_path.as_deref(),
    }
  }
}

/// Deterministic JSON rendering of a conversation, with the primary user
/// renamed to a stable token (see `PRIMARY_USER_TOKEN`).
fn render_conversation(doc: &ConversationDocument) -> String {
  #[derive(Serialize)]
  struct RenderedMessage<'a> {
    speaker: &'a str,
    content: &'a str,
    time: Option<DateTime<Utc>>,
  }

  let messages: Vec<RenderedMessage<'_>> = doc
    .messages
    .iter()
    .map(|m| RenderedMessage {
      speaker: if m.speaker == doc.primary_user {
        PRIMARY_USER_TOKEN
      } else {
        &m.speaker
      },
      content: &m.content,
      time: m.time,
    })
    .collect();

  serde_json::to_string(&messages).unwrap_or_default()
}

/// One piece of a document too large to extract from in one call. Inherits
/// the parent's source metadata verbatim; only adds namespaced `_engine_*`
/// keys, never overwriting an existing key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
  pub content: String,
  pub chunk_index: usize,
  pub metadata: HashMap<String, Json>,
}

/// Pure, I/O-free split of oversize content on character count, preferring a
/// whitespace boundary within `lookback` characters of the cut point so
/// words are not split mid-token. Every chunk's metadata is the parent's
/// metadata plus `_engine_chunk_number`, `_engine_original_document_id`, and
/// `_engine_chunk_type`; original keys are never replaced.
#[must_use]
pub fn chunk(
  content: &str,
  original_document_id: Uuid,
  chunk_type: &str,
  base_metadata: &HashMap<String, Json>,
  max_chars: usize,
) -> Vec<Chunk> {
  // Byte offset of every char boundary, so every cut point below lands on one
  // regardless of how much of `content` is multi-byte UTF-8.
  let mut boundaries: Vec<usize> = content.char_indices().map(|(i, _)| i).collect();
  boundaries.push(content.len());

  if boundaries.len() - 1 <= max_chars || max_chars == 0 {
    return vec![Chunk {
      content: content.to_owned(),
      chunk_index: 0,
      metadata: with_chunk_metadata(base_metadata, 0, original_document_id, chunk_type),
    }];
  }

  const LOOKBACK: usize = 80;
  let total_chars = boundaries.len() - 1;
  let mut chunks = Vec::new();
  let mut start_char = 0usize;
  let mut index = 0usize;

  while start_char < total_chars {
    let mut end_char = (start_char + max_chars).min(total_chars);

    if end_char < total_chars {
      let window_start_char = end_char.saturating_sub(LOOKBACK).max(start_char);
      let window = &content[boundaries[window_start_char]..boundaries[end_char]];
      if let Some(rel) = window.rfind(char::is_whitespace) {
        let candidate_char = window_start_char + window[..rel].chars().count() + 1;
        if candidate_char > start_char {
          end_char = candidate_char;
        }
      }
    }

    let piece = &content[boundaries[start_char]..boundaries[end_char]];
    chunks.push(Chunk {
      content: piece.to_owned(),
      chunk_index: index,
      metadata: with_chunk_metadata(base_metadata, index, original_document_id, chunk_type),
    });

    index += 1;
    start_char = end_char;
  }

  chunks
}

fn with_chunk_metadata(
  base: &HashMap<String, Json>,
  chunk_index: usize,
  original_document_id: Uuid,
  chunk_type: &str,
) -> HashMap<String, Json> {
  let mut metadata = base.clone();
  metadata.insert(
    format!("{CHUNK_METADATA_NAMESPACE}chunk_number"),
    Json::from(chunk_index),
  );
  metadata.insert(
    format!("{CHUNK_METADATA_NAMESPACE}original_document_id"),
    Json::from(original_document_id.to_string()),
  );
  metadata.insert(
    format!("{CHUNK_METADATA_NAMESPACE}chunk_type"),
    Json::from(chunk_type),
  );
  metadata
}

/// Build the pre-made facts for a `FileDocument`'s chunks (category
/// `document`, attribute `file_chunk`, importance 1, sensitivity `low`).
/// `document_id` is the `StoredDocument` id the facts should reference.
#[must_use]
pub fn file_document_facts(doc: &FileDocument, document_id: Uuid, max_chars: usize) -> Vec<Fact> {
  let chunks = chunk(&doc.text, doc.id, "file", &doc.metadata, max_chars);
  let now = doc.timestamp.unwrap_or_else(Utc::now);

  chunks
    .into_iter()
    .map(|c| {
      Fact::new_structured(
        "document",
        &doc.subject,
        "file_chunk",
        &c.content,
        None,
        "low",
        1,
        &doc.source,
        doc.file_path.clone(),
        vec![document_id],
        now,
      )
    })
    .collect()
}
