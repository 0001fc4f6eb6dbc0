//! `backend` 模組負責與遠端研究代理之間的傳輸。
//!
//! 每個子模組（如 `http`, `replay`）都實現了 `ResearchBackend` trait，
//! 把串流細節抽象化，UI 只需要在每次 tick 時輪詢 `StreamEvent`。

/// `http` 模組：透過 HTTP 串流 (SSE / NDJSON) 連線到 LangGraph 風格的代理伺服器。
pub mod http;
/// `prompts` 模組：提示詞設定 API 的用戶端。
pub mod prompts;
/// `replay` 模組：從檔案重播預先錄製的事件信封，用於離線展示與測試。
pub mod replay;
/// `sse` 模組：將位元組區塊切分成完整的串流訊框。
pub mod sse;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use serde_json::Value;

use crate::config::ServerConfig;
use crate::research::StreamRequest;

/// Events a backend forwards to the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The server acknowledged the run.
    Started { run_id: Option<String> },
    /// One node update envelope.
    Update(Value),
    /// The stream ended normally.
    Completed,
    /// The stream ended with a transport-level failure.
    Failed(String),
}

/// Transport-level failures. All of them end the run.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not reach the research server at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("research server answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("stream interrupted: {0}")]
    Stream(#[from] reqwest::Error),
    #[error("malformed stream frame: {0}")]
    Decode(String),
    #[error("research server reported an error: {0}")]
    Remote(String),
    #[error("replay file error: {0}")]
    Io(#[from] std::io::Error),
}

/// 所有研究代理後端都必須遵守的行為介面。
///
/// `start` 不會阻塞：實作應該啟動背景任務，並透過 `poll_event` 交出結果。
#[async_trait]
pub trait ResearchBackend: Send {
    /// 後端名稱，用於狀態列與日誌。
    fn name(&self) -> &str;

    /// 開始一次研究串流。同一時間只會有一個串流在進行。
    async fn start(&mut self, request: StreamRequest) -> anyhow::Result<()>;

    /// 非阻塞地取出下一個事件；沒有事件時立即回傳 `None`。
    fn poll_event(&mut self) -> Option<StreamEvent>;

    /// 立即中止進行中的串流，並丟棄尚未取出的事件。
    fn cancel(&mut self);
}

/// 有重播檔時使用 `ReplayBackend`，否則連線到設定中的伺服器。
pub fn connect(
    server: &ServerConfig,
    replay: Option<&Path>,
    replay_delay: Duration,
) -> anyhow::Result<Box<dyn ResearchBackend>> {
    let backend: Box<dyn ResearchBackend> = match replay {
        Some(path) => Box::new(replay::ReplayBackend::new(path, replay_delay)),
        None => Box::new(http::HttpBackend::new(server)?),
    };
    info!("Research backend: {}", backend.name());
    Ok(backend)
}
