use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::params::ResolvedParameters;

/// 對話中的發言者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 對話歷史中的單一訊息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub id: String,
}

impl ChatMessage {
    /// 建立一則帶有新 UUID 的使用者訊息。
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            id: id.into(),
        }
    }

    /// 從 LangGraph 訊息物件解析出助理訊息。
    ///
    /// 伺服器會以 `{"type": "ai", "content": ..., "id": ...}` 的形式回傳，
    /// `content` 可能是字串，也可能是 `[{"type": "text", "text": ...}]` 區塊陣列。
    /// 非助理訊息或缺少 id 的訊息一律回傳 `None`。
    pub fn from_graph_message(value: &Value) -> Option<Self> {
        let kind = value
            .get("type")
            .or_else(|| value.get("role"))
            .and_then(Value::as_str)?;
        if !matches!(kind, "ai" | "AIMessage" | "AIMessageChunk" | "assistant") {
            return None;
        }
        let id = value.get("id").and_then(Value::as_str)?;
        let content = match value.get("content") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(blocks)) => blocks
                .iter()
                .filter_map(|block| match block {
                    Value::String(text) => Some(text.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        };
        Some(Self::assistant(id, content))
    }
}

/// 送往研究代理的一次串流請求。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRequest {
    /// 負責處理請求的遠端助理（圖）識別碼。
    pub assistant_id: String,
    pub messages: Vec<ChatMessage>,
    pub initial_search_query_count: u32,
    pub max_research_loops: u32,
    pub reasoning_model: String,
}

impl StreamRequest {
    pub fn new(
        params: ResolvedParameters,
        messages: Vec<ChatMessage>,
        reasoning_model: impl Into<String>,
    ) -> Self {
        Self {
            assistant_id: params.assistant_id,
            messages,
            initial_search_query_count: params.initial_search_query_count,
            max_research_loops: params.max_research_loops,
            reasoning_model: reasoning_model.into(),
        }
    }

    /// The last user message, i.e. the question being researched.
    pub fn question(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }
}
