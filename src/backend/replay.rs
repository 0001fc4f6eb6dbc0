use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::research::StreamRequest;

use super::sse::{FrameDecoder, FrameFormat};
use super::{ResearchBackend, StreamEvent, TransportError};

/// Streams envelopes recorded in an NDJSON file, one per line, as if a server
/// had sent them. The request content is ignored.
pub struct ReplayBackend {
    path: PathBuf,
    label: String,
    delay: Duration,
    events_tx: UnboundedSender<StreamEvent>,
    events_rx: UnboundedReceiver<StreamEvent>,
    task: Option<JoinHandle<()>>,
}

impl ReplayBackend {
    pub fn new(path: impl Into<PathBuf>, delay: Duration) -> Self {
        let path = path.into();
        let label = format!("replay:{}", path.display());
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            path,
            label,
            delay,
            events_tx: tx,
            events_rx: rx,
            task: None,
        }
    }
}

#[async_trait]
impl ResearchBackend for ReplayBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn start(&mut self, request: StreamRequest) -> Result<()> {
        self.cancel();
        debug!(
            "Replaying {} for assistant {}",
            self.path.display(),
            request.assistant_id
        );
        let tx = self.events_tx.clone();
        let path = self.path.clone();
        let delay = self.delay;
        self.task = Some(tokio::spawn(async move {
            let outcome = match replay_file(&path, delay, &tx).await {
                Ok(()) => StreamEvent::Completed,
                Err(err) => StreamEvent::Failed(err.to_string()),
            };
            let _ = tx.send(outcome);
        }));
        Ok(())
    }

    fn poll_event(&mut self) -> Option<StreamEvent> {
        self.events_rx.try_recv().ok()
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Aborted replay of {}", self.path.display());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.events_tx = tx;
        self.events_rx = rx;
    }
}

async fn replay_file(
    path: &Path,
    delay: Duration,
    tx: &UnboundedSender<StreamEvent>,
) -> Result<(), TransportError> {
    let raw = tokio::fs::read(path).await?;
    let mut decoder = FrameDecoder::new(FrameFormat::Ndjson);
    let mut frames = decoder.push(&raw)?;
    frames.extend(decoder.finish()?);

    let _ = tx.send(StreamEvent::Started { run_id: None });
    for frame in frames {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let envelope = serde_json::from_str(&frame.data)
            .map_err(|err| TransportError::Decode(err.to_string()))?;
        let _ = tx.send(StreamEvent::Update(envelope));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn drain(backend: &mut ReplayBackend) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        loop {
            match backend.poll_event() {
                Some(event) => {
                    let done = matches!(event, StreamEvent::Completed | StreamEvent::Failed(_));
                    events.push(event);
                    if done {
                        return events;
                    }
                }
                None => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
    }

    fn request() -> StreamRequest {
        StreamRequest {
            assistant_id: String::from("agent"),
            messages: Vec::new(),
            initial_search_query_count: 1,
            max_research_loops: 1,
            reasoning_model: String::from("m"),
        }
    }

    #[tokio::test]
    async fn replays_every_line_then_completes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"generate_query": {{"search_query": ["a"]}}}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"finalize_answer": {{}}}}"#).unwrap();

        let mut backend = ReplayBackend::new(file.path(), Duration::ZERO);
        backend.start(request()).await.unwrap();
        let events = drain(&mut backend).await;
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], StreamEvent::Started { run_id: None });
        assert!(matches!(events[1], StreamEvent::Update(_)));
        assert_eq!(events[3], StreamEvent::Completed);
    }

    #[tokio::test]
    async fn missing_file_fails_the_run() {
        let mut backend = ReplayBackend::new("/nonexistent/replay.ndjson", Duration::ZERO);
        backend.start(request()).await.unwrap();
        let events = drain(&mut backend).await;
        assert!(matches!(events.as_slice(), [StreamEvent::Failed(_)]));
    }
}
