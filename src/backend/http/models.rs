//! Request and frame payloads for the LangGraph-style run API.
//! 此模組包含串流執行 API 的請求與回應結構。

use crate::research::ChatMessage;

/// Stream modes requested from the server; node updates carry the stage keys.
pub const STREAM_MODES: [&str; 1] = ["updates"];

#[derive(serde::Serialize)]
pub struct RunStreamPayload<'a> {
    pub assistant_id: &'a str,
    pub input: RunInput<'a>,
    pub stream_mode: &'a [&'a str],
}

#[derive(serde::Serialize)]
pub struct RunInput<'a> {
    pub messages: &'a [ChatMessage],
    pub initial_search_query_count: u32,
    pub max_research_loops: u32,
    pub reasoning_model: &'a str,
}

/// Body of the `metadata` frame sent when a run starts.
#[derive(serde::Deserialize)]
pub struct RunMetadata {
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Body of an `error` frame.
#[derive(serde::Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RunError {
    pub fn describe(self) -> String {
        match (self.error, self.message) {
            (Some(kind), Some(message)) => format!("{}: {}", kind, message),
            (Some(text), None) | (None, Some(text)) => text,
            (None, None) => String::from("unknown error"),
        }
    }
}
