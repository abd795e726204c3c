use async_openai::{
  Client,
  config::OpenAIConfig,
  types::chat::{
    ChatCompletionRequestMessage, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionObject,
  },
};
use plastmem_shared::{APP_CONFIG, AppError};
use schemars::JsonSchema;

use crate::generate_object::fix_schema_for_strict;

/// One function the model may call, with its argument schema derived from `T`.
pub struct ToolSpec {
  pub name: String,
  pub description: String,
  pub schema: serde_json::Value,
}

impl ToolSpec {
  pub fn new<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
    let schema = schemars::schema_for!(T);
    let mut schema = serde_json::to_value(&schema).unwrap_or(serde_json::json!({}));
    fix_schema_for_strict(&mut schema);
    Self {
      name: name.into(),
      description: description.into(),
      schema,
    }
  }
}

/// A tool call the model made, with its raw (unparsed) argument JSON.
pub struct ToolCall {
  pub name: String,
  pub arguments: serde_json::Value,
}

/// The full outcome of a tool-enabled chat completion: any tool calls the
/// model made, plus whatever free-text content it also emitted (the decision
/// engine and fact extractor fall back to parsing this when no tool call
/// comes back).
pub struct ToolOutcome {
  pub tool_calls: Vec<ToolCall>,
  pub content: Option<String>,
}

/// Call the chat model with a fixed set of callable tools and return every
/// tool call it made (possibly none), plus any plain-text content.
pub async fn generate_with_tools(
  messages: Vec<ChatCompletionRequestMessage>,
  tools: Vec<ToolSpec>,
) -> Result<ToolOutcome, AppError> {
  let config = OpenAIConfig::new()
    .with_api_key(&APP_CONFIG.openai_api_key)
    .with_api_base(&APP_CONFIG.openai_base_url);

  let client = Client::with_config(config);

  let tool_defs: Vec<ChatCompletionTool> = tools
    .into_iter()
    .map(|t| ChatCompletionTool {
      r#type: ChatCompletionToolType::Function,
      function: FunctionObject {
        name: t.name,
        description: Some(t.description),
        parameters: Some(t.schema),
        strict: None,
      },
    })
    .collect();

  let request = CreateChatCompletionRequestArgs::default()
    .model(&APP_CONFIG.openai_chat_model)
    .messages(messages)
    .tools(tool_defs)
    .build()?;

  let response = client.chat().create(request).await?;

  let Some(choice) = response.choices.into_iter().next() else {
    return Ok(ToolOutcome {
      tool_calls: vec![],
      content: None,
    });
  };

  let tool_calls = choice
    .message
    .tool_calls
    .unwrap_or_default()
    .into_iter()
    .filter_map(|call| {
      let arguments = serde_json::from_str(&call.function.arguments).ok()?;
      Some(ToolCall {
        name: call.function.name,
        arguments,
      })
    })
    .collect();

  Ok(ToolOutcome {
    tool_calls,
    content: choice.message.content,
  })
}
