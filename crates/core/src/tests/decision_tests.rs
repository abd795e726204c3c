use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::decision::{decide, validate_target, Decision};
use crate::fact::Fact;
use crate::llm::ToolCallingClient;

use super::test_support::ScriptedLlmClient;

fn sample_fact(subject: &str, value: &str) -> Fact {
  Fact::new_structured(
    "preference",
    subject,
    "favorite_color",
    value,
    None,
    "low",
    2,
    "test",
    None,
    vec![],
    Utc::now(),
  )
}

#[tokio::test]
async fn decide_defaults_to_add_when_no_tool_call() {
  let llm: Arc<dyn ToolCallingClient> =
    Arc::new(ScriptedLlmClient::single(ScriptedLlmClient::empty_content()));
  let new_fact = sample_fact("user", "blue");

  let decision = decide(&new_fact, &[], &llm).await.unwrap();

  assert!(matches!(decision, Decision::Add));
}

#[tokio::test]
async fn decide_parses_update_with_target_and_content() {
  let candidate = sample_fact("user", "red");
  let llm: Arc<dyn ToolCallingClient> = Arc::new(ScriptedLlmClient::single(ScriptedLlmClient::tool_call(
    "UPDATE",
    json!({ "id": candidate.id, "updated_content": "User: user blue (favorite_color) (preference)" }),
  )));
  let new_fact = sample_fact("user", "blue");

  let decision = decide(&new_fact, std::slice::from_ref(&candidate), &llm)
    .await
    .unwrap();

  match decision {
    Decision::Update {
      target_id,
      updated_content,
    } => {
      assert_eq!(target_id, candidate.id);
      assert!(updated_content.contains("blue"));
    }
    other => panic!("expected Update, got {other:?}"),
  }
}

#[tokio::test]
async fn decide_parses_delete_with_target() {
  let candidate = sample_fact("user", "obsolete");
  let llm: Arc<dyn ToolCallingClient> = Arc::new(ScriptedLlmClient::single(ScriptedLlmClient::tool_call(
    "DELETE",
    json!({ "id": candidate.id }),
  )));
  let new_fact = sample_fact("user", "contradiction");

  let decision = decide(&new_fact, std::slice::from_ref(&candidate), &llm)
    .await
    .unwrap();

  match decision {
    Decision::Delete { target_id } => assert_eq!(target_id, candidate.id),
    other => panic!("expected Delete, got {other:?}"),
  }
}

#[tokio::test]
async fn decide_parses_none() {
  let llm: Arc<dyn ToolCallingClient> =
    Arc::new(ScriptedLlmClient::single(ScriptedLlmClient::tool_call(
      "NONE",
      json!({ "reason": "already represented" }),
    )));
  let new_fact = sample_fact("user", "blue");

  let decision = decide(&new_fact, &[], &llm).await.unwrap();

  assert!(matches!(decision, Decision::None));
}

#[test]
fn validate_target_accepts_member_of_candidate_set() {
  let candidate = sample_fact("user", "blue");
  assert!(validate_target(candidate.id, std::slice::from_ref(&candidate)).is_ok());
}

#[test]
fn validate_target_rejects_id_outside_candidate_set() {
  let candidate = sample_fact("user", "blue");
  let stray = Uuid::new_v4();
  assert!(validate_target(stray, std::slice::from_ref(&candidate)).is_err());
}
