use std::collections::HashMap;

use serde_json::json;
use uuid::Uuid;

use crate::document::chunk;

#[test]
fn short_content_yields_a_single_chunk() {
  let meta = HashMap::new();
  let chunks = chunk("hello world", Uuid::new_v4(), "text", &meta, 20_000);

  assert_eq!(chunks.len(), 1);
  assert_eq!(chunks[0].content, "hello world");
}

#[test]
fn oversize_content_is_split_on_a_whitespace_boundary() {
  let meta = HashMap::new();
  let content = "word ".repeat(50); // 250 chars
  let chunks = chunk(&content, Uuid::new_v4(), "text", &meta, 100);

  assert!(chunks.len() > 1);
  for c in &chunks {
    assert!(c.content.chars().count() <= 100);
  }
  // Reassembling every chunk reproduces the original content exactly.
  let rejoined: String = chunks.iter().map(|c| c.content.clone()).collect();
  assert_eq!(rejoined, content);
}

#[test]
fn chunk_boundary_never_splits_a_multi_byte_character() {
  // Every character here is multi-byte UTF-8; a byte-offset-based splitter
  // would panic slicing mid-character.
  let meta = HashMap::new();
  let content = "日本語のテキストです。".repeat(20);
  let chunks = chunk(&content, Uuid::new_v4(), "text", &meta, 30);

  assert!(chunks.len() > 1);
  let rejoined: String = chunks.iter().map(|c| c.content.clone()).collect();
  assert_eq!(rejoined, content);
}

#[test]
fn original_metadata_keys_survive_chunking_under_their_own_names() {
  let mut meta = HashMap::new();
  meta.insert("chunk_number".to_owned(), json!(999));
  meta.insert("original_document_id".to_owned(), json!("not-touched"));

  let content = "word ".repeat(50);
  let chunks = chunk(&content, Uuid::new_v4(), "text", &meta, 100);

  for c in &chunks {
    assert_eq!(c.metadata.get("chunk_number"), Some(&json!(999)));
    assert_eq!(c.metadata.get("original_document_id"), Some(&json!("not-touched")));
    assert!(c.metadata.contains_key("_engine_chunk_number"));
    assert!(c.metadata.contains_key("_engine_original_document_id"));
    assert!(c.metadata.contains_key("_engine_chunk_type"));
  }
}
