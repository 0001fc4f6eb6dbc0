use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::research::StreamRequest;

use super::sse::{Frame, FrameDecoder, FrameFormat};
use super::{ResearchBackend, StreamEvent, TransportError};

mod models;

/// `ResearchBackend` 的 HTTP 實作，透過串流 API 與遠端研究代理通訊。
pub struct HttpBackend {
    /// 連線資訊，會被複製到每個背景任務中。
    info: HttpBackendInfo,
    client: Client,
    /// 背景任務把事件送回 UI 迴圈的通道。
    events_tx: UnboundedSender<StreamEvent>,
    events_rx: UnboundedReceiver<StreamEvent>,
    /// 進行中的串流任務，取消時直接中止。
    task: Option<JoinHandle<()>>,
}

#[derive(Clone)]
struct HttpBackendInfo {
    base_url: String,
    api_key: Option<String>,
    headers: BTreeMap<String, String>,
}

impl HttpBackend {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            info: HttpBackendInfo {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: config.resolved_api_key(),
                headers: config.extra_headers.clone(),
            },
            client,
            events_tx: tx,
            events_rx: rx,
            task: None,
        })
    }
}

#[async_trait]
impl ResearchBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.info.base_url
    }

    /// 立即 `tokio::spawn` 一個任務處理實際的 HTTP 串流，不會阻塞 UI。
    async fn start(&mut self, request: StreamRequest) -> Result<()> {
        self.cancel();
        let tx = self.events_tx.clone();
        let info = self.info.clone();
        let client = self.client.clone();
        self.task = Some(tokio::spawn(async move {
            match stream_run(info, client, request, tx.clone()).await {
                Ok(()) => {
                    let _ = tx.send(StreamEvent::Completed);
                }
                Err(err) => {
                    let _ = tx.send(StreamEvent::Failed(err.to_string()));
                }
            }
        }));
        Ok(())
    }

    fn poll_event(&mut self) -> Option<StreamEvent> {
        self.events_rx.try_recv().ok()
    }

    /// 中止任務並換上新的通道，確保舊任務殘留的事件不會被讀到。
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Aborted in-flight research stream");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.events_tx = tx;
        self.events_rx = rx;
    }
}

fn build_headers(info: &HttpBackendInfo) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    if let Some(api_key) = &info.api_key {
        let value = HeaderValue::from_str(api_key)
            .map_err(|err| TransportError::Decode(format!("invalid API key header: {err}")))?;
        headers.insert("x-api-key", value);
    }
    for (key, value) in info.headers.iter() {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| TransportError::Decode(format!("invalid header {key}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| TransportError::Decode(format!("invalid header {key}: {err}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Posts the run and forwards every decoded frame until the body ends.
async fn stream_run(
    info: HttpBackendInfo,
    client: Client,
    request: StreamRequest,
    tx: UnboundedSender<StreamEvent>,
) -> Result<(), TransportError> {
    use models::{RunInput, RunStreamPayload, STREAM_MODES};

    let url = format!("{}/runs/stream", info.base_url);
    let payload = RunStreamPayload {
        assistant_id: &request.assistant_id,
        input: RunInput {
            messages: &request.messages,
            initial_search_query_count: request.initial_search_query_count,
            max_research_loops: request.max_research_loops,
            reasoning_model: &request.reasoning_model,
        },
        stream_mode: &STREAM_MODES,
    };

    debug!("POST {} (assistant {})", url, request.assistant_id);
    let response = client
        .post(&url)
        .headers(build_headers(&info)?)
        .json(&payload)
        .send()
        .await
        .map_err(|source| TransportError::Connect {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Status { status, body });
    }

    let format = FrameFormat::from_content_type(
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    );
    let mut decoder = FrameDecoder::new(format);
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        for frame in decoder.push(&chunk?)? {
            if !forward_frame(frame, &tx)? {
                return Ok(());
            }
        }
    }
    for frame in decoder.finish()? {
        if !forward_frame(frame, &tx)? {
            break;
        }
    }
    Ok(())
}

/// Maps a frame onto a `StreamEvent`. Returns `false` once the server signals the end.
fn forward_frame(frame: Frame, tx: &UnboundedSender<StreamEvent>) -> Result<bool, TransportError> {
    use models::{RunError, RunMetadata};

    match frame.event.as_deref() {
        Some("end") => return Ok(false),
        Some("metadata") => {
            let metadata: RunMetadata = serde_json::from_str(&frame.data)
                .map_err(|err| TransportError::Decode(err.to_string()))?;
            let _ = tx.send(StreamEvent::Started {
                run_id: metadata.run_id,
            });
        }
        Some("error") => {
            let message = serde_json::from_str::<RunError>(&frame.data)
                .map(RunError::describe)
                .unwrap_or(frame.data);
            return Err(TransportError::Remote(message));
        }
        None | Some("updates") => {
            let envelope: Value = serde_json::from_str(&frame.data)
                .map_err(|err| TransportError::Decode(err.to_string()))?;
            let _ = tx.send(StreamEvent::Update(envelope));
        }
        Some(other) => {
            warn!("Ignoring stream frame of type {}", other);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: Option<&str>, data: &str) -> Frame {
        Frame {
            event: event.map(String::from),
            data: data.to_string(),
        }
    }

    #[test]
    fn frames_map_to_stream_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(forward_frame(frame(Some("metadata"), r#"{"run_id":"r-1"}"#), &tx).unwrap());
        assert!(forward_frame(frame(Some("updates"), r#"{"reflection":{}}"#), &tx).unwrap());
        assert!(forward_frame(frame(None, r#"{"web_research":{}}"#), &tx).unwrap());
        assert!(forward_frame(frame(Some("values"), "{}"), &tx).unwrap());
        assert!(!forward_frame(frame(Some("end"), ""), &tx).unwrap());

        assert_eq!(
            rx.try_recv().unwrap(),
            StreamEvent::Started {
                run_id: Some(String::from("r-1"))
            }
        );
        assert_eq!(rx.try_recv().unwrap(), StreamEvent::Update(json!({"reflection": {}})));
        assert_eq!(rx.try_recv().unwrap(), StreamEvent::Update(json!({"web_research": {}})));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn error_frames_become_remote_errors() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = forward_frame(
            frame(Some("error"), r#"{"error":"ValueError","message":"GEMINI_API_KEY is not set"}"#),
            &tx,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "research server reported an error: ValueError: GEMINI_API_KEY is not set"
        );
    }

    #[test]
    fn malformed_update_is_a_decode_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            forward_frame(frame(Some("updates"), "{not json"), &tx),
            Err(TransportError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_reports_failure() {
        let config = ServerConfig {
            base_url: String::from("http://127.0.0.1:9"),
            ..ServerConfig::default()
        };
        let mut backend = HttpBackend::new(&config).unwrap();
        backend
            .start(StreamRequest {
                assistant_id: String::from("agent"),
                messages: Vec::new(),
                initial_search_query_count: 0,
                max_research_loops: 0,
                reasoning_model: String::from("m"),
            })
            .await
            .unwrap();
        let event = loop {
            if let Some(event) = backend.poll_event() {
                break event;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert!(matches!(event, StreamEvent::Failed(_)));
    }
}
