//! Submission state machine.
//!
//! The controller owns the conversation, the live timeline and the terminal
//! flag. It performs no I/O: [`SubmissionController::submit`] hands back the
//! request to send, and the caller feeds stream outcomes back through
//! `on_update` / `on_complete` / `on_error`.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde_json::Value;

use super::classify::{Classified, TimelineEvent, classify};
use super::message::{ChatMessage, Role, StreamRequest};
use super::mode::{EffortLevel, FlowType, SearchMode};
use super::params::resolve;

/// Lifecycle of the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Streaming,
    /// Transport failure; only a reload leaves this state.
    Failed { reason: String },
}

/// The user's current picks, captured at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchSelection {
    pub search_mode: SearchMode,
    pub effort: EffortLevel,
    pub flow: FlowType,
    pub reasoning_model: String,
}

/// Reasons a submission is refused before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("input is empty")]
    EmptyInput,
    #[error("a research run is already in progress")]
    Busy,
    #[error("the last run failed; reload before submitting again")]
    NeedsReload,
}

#[derive(Debug, Default)]
pub struct SubmissionController {
    phase: Phase,
    messages: Vec<ChatMessage>,
    timeline: Vec<TimelineEvent>,
    terminal_seen: bool,
    /// Mode of the run in flight; titles follow it even if the picker changes.
    run_mode: SearchMode,
    historical_activities: HashMap<String, Vec<TimelineEvent>>,
}

impl SubmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == Phase::Streaming
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Live timeline of the current (or most recent) run.
    pub fn timeline(&self) -> &[TimelineEvent] {
        &self.timeline
    }

    pub fn terminal_seen(&self) -> bool {
        self.terminal_seen
    }

    /// Archived timeline of a finished run, keyed by its assistant message id.
    pub fn activities_for(&self, message_id: &str) -> Option<&[TimelineEvent]> {
        self.historical_activities
            .get(message_id)
            .map(Vec::as_slice)
    }

    pub fn historical_activities(&self) -> &HashMap<String, Vec<TimelineEvent>> {
        &self.historical_activities
    }

    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    /// Idle → Streaming. Returns the single request to send.
    pub fn submit(
        &mut self,
        input: &str,
        selection: &ResearchSelection,
    ) -> Result<StreamRequest, SubmitError> {
        if input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        match self.phase {
            Phase::Idle => {}
            Phase::Streaming => return Err(SubmitError::Busy),
            Phase::Failed { .. } => return Err(SubmitError::NeedsReload),
        }

        self.timeline.clear();
        self.terminal_seen = false;
        self.run_mode = selection.search_mode;
        let params = resolve(selection.search_mode, selection.effort, selection.flow);
        info!(
            "Submitting research: mode={} effort={} flow={} queries={} loops={} assistant={}",
            selection.search_mode,
            selection.effort,
            selection.flow,
            params.initial_search_query_count,
            params.max_research_loops,
            params.assistant_id
        );
        self.messages.push(ChatMessage::user(input));
        self.phase = Phase::Streaming;
        Ok(StreamRequest::new(
            params,
            self.messages.clone(),
            selection.reasoning_model.clone(),
        ))
    }

    /// Feeds one streamed envelope. Returns the classification when it produced
    /// a timeline entry.
    pub fn on_update(&mut self, envelope: &Value) -> Option<Classified> {
        if !self.is_streaming() {
            debug!("Dropping stream update outside of a run");
            return None;
        }
        self.absorb_messages(envelope);
        let classified = classify(envelope, self.run_mode)?;
        debug!("Stage {} -> {}", classified.stage.key(), classified.event.title);
        self.timeline.push(classified.event.clone());
        if classified.terminal {
            self.terminal_seen = true;
        }
        Some(classified)
    }

    /// Streaming → Idle. Returns the message id the timeline was archived under.
    pub fn on_complete(&mut self) -> Option<String> {
        if !self.is_streaming() {
            return None;
        }
        self.phase = Phase::Idle;
        if !self.terminal_seen {
            warn!("Stream completed without a terminal stage");
            return None;
        }
        let id = self.last_assistant()?.id.clone();
        self.historical_activities
            .insert(id.clone(), self.timeline.clone());
        info!("Archived {} timeline events under {}", self.timeline.len(), id);
        Some(id)
    }

    /// Streaming → Failed.
    pub fn on_error(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Research stream failed: {}", reason);
        self.phase = Phase::Failed { reason };
    }

    /// Drops every piece of client state, including the conversation.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Picks up assistant messages carried by node updates, e.g.
    /// `{"finalize_answer": {"messages": [{"type": "ai", ...}]}}`.
    fn absorb_messages(&mut self, envelope: &Value) {
        let Some(object) = envelope.as_object() else {
            return;
        };
        let incoming = object
            .values()
            .filter_map(|payload| payload.get("messages").and_then(Value::as_array))
            .flatten()
            .filter_map(ChatMessage::from_graph_message);
        for message in incoming {
            match self.messages.iter_mut().find(|existing| existing.id == message.id) {
                Some(existing) => *existing = message,
                None => self.messages.push(message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn selection(mode: SearchMode, effort: EffortLevel, flow: FlowType) -> ResearchSelection {
        ResearchSelection {
            search_mode: mode,
            effort,
            flow,
            reasoning_model: String::from("gemini-2.5-flash"),
        }
    }

    fn standard() -> ResearchSelection {
        selection(SearchMode::Standard, EffortLevel::Medium, FlowType::SingleAgent)
    }

    #[test]
    fn blank_input_is_blocked_without_state_change() {
        let mut controller = SubmissionController::new();
        assert_eq!(controller.submit("   \n", &standard()), Err(SubmitError::EmptyInput));
        assert_eq!(controller.phase(), &Phase::Idle);
        assert!(controller.messages().is_empty());
    }

    #[test]
    fn submit_builds_one_request_with_resolved_parameters() {
        let mut controller = SubmissionController::new();
        let request = controller
            .submit(
                "What is Rust?",
                &selection(SearchMode::Deep, EffortLevel::Low, FlowType::SingleAgent),
            )
            .unwrap();
        assert_eq!(request.assistant_id, "agent");
        assert_eq!(request.initial_search_query_count, 8);
        assert_eq!(request.max_research_loops, 15);
        assert_eq!(request.reasoning_model, "gemini-2.5-flash");
        assert_eq!(request.question(), Some("What is Rust?"));
        assert_eq!(controller.phase(), &Phase::Streaming);
        assert_eq!(controller.submit("again", &standard()), Err(SubmitError::Busy));
    }

    #[test]
    fn deep_scenario_first_event() {
        let mut controller = SubmissionController::new();
        controller
            .submit("q", &selection(SearchMode::Deep, EffortLevel::Low, FlowType::SingleAgent))
            .unwrap();
        controller.on_update(&json!({"generate_query": {"search_query": ["a", "b"]}}));
        assert_eq!(
            controller.timeline(),
            &[TimelineEvent::new("Generating Comprehensive Queries", "a, b")]
        );
    }

    #[test]
    fn completed_run_is_archived_under_the_assistant_message() {
        let mut controller = SubmissionController::new();
        controller.submit("q", &standard()).unwrap();
        controller.on_update(&json!({"generate_query": {"search_query": ["a"]}}));
        controller.on_update(&json!({"metadata": {}}));
        controller.on_update(&json!({"reflection": {"is_sufficient": true}}));
        assert!(!controller.terminal_seen());
        controller.on_update(&json!({
            "finalize_answer": {
                "messages": [{"type": "ai", "id": "ai-1", "content": "Answer"}]
            }
        }));
        assert!(controller.terminal_seen());
        assert_eq!(controller.timeline().len(), 3);

        assert_eq!(controller.on_complete(), Some(String::from("ai-1")));
        assert_eq!(controller.phase(), &Phase::Idle);
        assert_eq!(controller.activities_for("ai-1").unwrap().len(), 3);
        assert_eq!(controller.timeline().len(), 3);
        assert_eq!(controller.last_assistant().unwrap().content, "Answer");
    }

    #[test]
    fn next_submit_clears_live_timeline_but_keeps_history() {
        let mut controller = SubmissionController::new();
        controller.submit("q1", &standard()).unwrap();
        controller.on_update(&json!({
            "finalize_answer": {"messages": [{"type": "ai", "id": "ai-1", "content": "A1"}]}
        }));
        controller.on_complete();

        let request = controller.submit("q2", &standard()).unwrap();
        assert!(controller.timeline().is_empty());
        assert!(!controller.terminal_seen());
        assert_eq!(request.messages.len(), 3);
        assert!(controller.activities_for("ai-1").is_some());
    }

    #[test]
    fn completion_without_terminal_event_archives_nothing() {
        let mut controller = SubmissionController::new();
        controller.submit("q", &standard()).unwrap();
        controller.on_update(&json!({"web_research": {"sources_gathered": []}}));
        assert_eq!(controller.on_complete(), None);
        assert!(controller.historical_activities().is_empty());
    }

    #[test]
    fn errors_require_a_reload() {
        let mut controller = SubmissionController::new();
        controller.submit("q", &standard()).unwrap();
        controller.on_error("connection refused");
        assert_eq!(
            controller.phase(),
            &Phase::Failed {
                reason: String::from("connection refused")
            }
        );
        assert_eq!(controller.submit("q", &standard()), Err(SubmitError::NeedsReload));
        controller.reset();
        assert_eq!(controller.phase(), &Phase::Idle);
        assert!(controller.messages().is_empty());
        assert!(controller.submit("q", &standard()).is_ok());
    }

    #[test]
    fn updates_outside_a_run_are_ignored() {
        let mut controller = SubmissionController::new();
        assert!(controller.on_update(&json!({"finalize_answer": {}})).is_none());
        assert!(controller.timeline().is_empty());
    }

    #[test]
    fn timeline_keeps_arrival_order_and_duplicates() {
        let mut controller = SubmissionController::new();
        controller.submit("q", &standard()).unwrap();
        let research = json!({"web_research": {"sources_gathered": [{"label": "a"}]}});
        controller.on_update(&research);
        controller.on_update(&json!({"reflection": {}}));
        controller.on_update(&research);
        let titles: Vec<&str> = controller
            .timeline()
            .iter()
            .map(|event| event.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Web Research", "Reflection", "Web Research"]);
    }
}
