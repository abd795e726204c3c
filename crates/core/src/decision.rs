use std::sync::Arc;

use plastmem_ai::{
  ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
  ChatCompletionRequestUserMessage, ToolSpec,
};
use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::fact::Fact;
use crate::llm::ToolCallingClient;

const ADD: &str = "ADD";
const UPDATE: &str = "UPDATE";
const DELETE: &str = "DELETE";
const NONE: &str = "NONE";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateArgs {
  pub id: Uuid,
  pub updated_content: String,
  #[serde(default)]
  pub reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteArgs {
  pub id: Uuid,
  #[serde(default)]
  pub reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoneArgs {
  #[serde(default)]
  pub reason: Option<String>,
}

/// The decision the model made for one newly extracted fact, parsed from its
/// tool call. Exactly one variant results from `decide`.
#[derive(Debug, Clone)]
pub enum Decision {
  Add,
  Update { target_id: Uuid, updated_content: String },
  Delete { target_id: Uuid },
  None,
}

fn system_prompt() -> String {
  format!(
    "You evolve a memory store. Given a new fact and a list of candidate existing \
     memories about the same subject, choose exactly one action: {add} if the new fact \
     is genuinely new information, {update} if it revises or supersedes one existing \
     candidate (supply its id and the full updated content), {delete} if the new fact \
     makes an existing candidate obsolete or contradicted (supply its id), or {none} if \
     the new fact is already represented and adds nothing. Always call exactly one of \
     these tools.",
    add = ADD,
    update = UPDATE,
    delete = DELETE,
    none = NONE,
  )
}

fn user_prompt(new_fact: &Fact, candidates: &[Fact]) -> String {
  let candidate_list = candidates
    .iter()
    .map(|c| format!("ID: {}, Content: {}", c.id, c.content))
    .collect::<Vec<_>>()
    .join("\n---\n");

  format!(
    "New fact: {}\n\nCandidate memories (same subject):\n{}",
    new_fact.content,
    if candidate_list.is_empty() {
      "(none)".to_owned()
    } else {
      candidate_list
    }
  )
}

/// Ask the LLM which of ADD/UPDATE/DELETE/NONE applies to `new_fact` given
/// `candidates` (already subject-filtered by the caller). Defaults to `Add`
/// with no tool call at all — the model is treated as having implicitly
/// chosen to keep new information rather than silently drop it.
pub async fn decide(
  new_fact: &Fact,
  candidates: &[Fact],
  llm: &Arc<dyn ToolCallingClient>,
) -> Result<Decision, EngineError> {
  let messages = vec![
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(system_prompt())),
    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(user_prompt(
      new_fact, candidates,
    ))),
  ];

  let tools = vec![
    ToolSpec::new::<AddArgs>(ADD, "Add the new fact as a brand new memory."),
    ToolSpec::new::<UpdateArgs>(UPDATE, "Revise an existing candidate with updated content."),
    ToolSpec::new::<DeleteArgs>(DELETE, "Remove an existing candidate made obsolete."),
    ToolSpec::new::<NoneArgs>(NONE, "Take no storage action."),
  ];

  let outcome = llm.call_tools(messages, tools).await?;

  let Some(call) = outcome.tool_calls.into_iter().next() else {
    return Ok(Decision::Add);
  };

  match call.name.as_str() {
    ADD => Ok(Decision::Add),
    UPDATE => {
      let args: UpdateArgs = serde_json::from_value(call.arguments)
        .map_err(|err| EngineError::MalformedToolArguments(err.to_string()))?;
      Ok(Decision::Update {
        target_id: args.id,
        updated_content: args.updated_content,
      })
    }
    DELETE => {
      let args: DeleteArgs = serde_json::from_value(call.arguments)
        .map_err(|err| EngineError::MalformedToolArguments(err.to_string()))?;
      Ok(Decision::Delete { target_id: args.id })
    }
    NONE => Ok(Decision::None),
    other => Err(EngineError::MalformedToolArguments(format!(
      "unknown action: {other}"
    ))),
  }
}

/// Validate that an UPDATE/DELETE target is a member of the candidate set.
/// A target outside the set is fatal for this fact only — it is never
/// allowed to mutate a memory the subject filter didn't already surface.
pub fn validate_target(target_id: Uuid, candidates: &[Fact]) -> Result<(), EngineError> {
  if candidates.iter().any(|c| c.id == target_id) {
    Ok(())
  } else {
    Err(EngineError::NotFound(target_id))
  }
}
