use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::document::{Document, DocumentLike, TextDocument};
use crate::extractor::extract_facts;
use crate::llm::ToolCallingClient;

use super::test_support::ScriptedLlmClient;

fn text_doc(text: &str) -> Document {
  Document::Text(TextDocument {
    id: Uuid::new_v4(),
    text: text.to_owned(),
    timestamp: None,
    source: "chat".to_owned(),
    tags: vec![],
    metadata: Default::default(),
    file_path: None,
  })
}

#[tokio::test]
async fn empty_document_yields_no_facts_without_calling_the_model() {
  let llm: Arc<dyn ToolCallingClient> = Arc::new(ScriptedLlmClient::new(vec![]));
  let doc = text_doc("   ");

  let facts = extract_facts(&doc, &llm, Utc::now()).await.unwrap();

  assert!(facts.is_empty());
}

#[tokio::test]
async fn tool_call_facts_are_attributed_to_the_source_document() {
  let outcome = ScriptedLlmClient::tool_call(
    "EXTRACT_FACTS",
    json!({
      "facts": [{
        "category": "preference",
        "subject": "user",
        "attribute": "favorite_color",
        "value": "blue",
        "temporal_context": null,
        "sensitivity": "low",
        "importance": 2,
      }]
    }),
  );
  let llm: Arc<dyn ToolCallingClient> = Arc::new(ScriptedLlmClient::single(outcome));
  let doc = text_doc("I really like the color blue.");
  let doc_id = doc.id();

  let facts = extract_facts(&doc, &llm, Utc::now()).await.unwrap();

  assert_eq!(facts.len(), 1);
  let fact = &facts[0];
  assert_eq!(fact.document_references, vec![doc_id]);
  assert_eq!(fact.source, "chat");
  assert!(fact.content.starts_with("User: "));
  assert!(fact.content.contains("blue"));
}

#[tokio::test]
async fn empty_fact_list_is_not_an_error() {
  let outcome = ScriptedLlmClient::tool_call("EXTRACT_FACTS", json!({ "facts": [] }));
  let llm: Arc<dyn ToolCallingClient> = Arc::new(ScriptedLlmClient::single(outcome));
  let doc = text_doc("Nothing memorable happened today.");

  let facts = extract_facts(&doc, &llm, Utc::now()).await.unwrap();

  assert!(facts.is_empty());
}

#[tokio::test]
async fn fallback_json_block_is_parsed_when_no_tool_call_is_made() {
  let content = "<json>{\"facts\":[{\"category\":\"goal_plan\",\"subject\":\"user\",\
    \"attribute\":\"career_goal\",\"value\":\"become a pilot\",\"temporal_context\":null,\
    \"sensitivity\":\"low\",\"importance\":2}]}</json>";
  let outcome = plastmem_ai::ToolOutcome {
    tool_calls: vec![],
    content: Some(content.to_owned()),
  };
  let llm: Arc<dyn ToolCallingClient> = Arc::new(ScriptedLlmClient::single(outcome));
  let doc = text_doc("I want to become a pilot one day.");

  let facts = extract_facts(&doc, &llm, Utc::now()).await.unwrap();

  assert_eq!(facts.len(), 1);
  assert!(facts[0].value.contains("pilot"));
}
