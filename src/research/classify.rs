//! Turns raw streamed envelopes into timeline entries.
//!
//! An envelope is a JSON object keyed by the graph node that produced it, e.g.
//! `{"web_research": {"sources_gathered": [...]}}`. Only one stage key is
//! expected per envelope. When several are present the first one in
//! [`StageKey::ALL`] order wins; the agent runtime has not been confirmed to
//! rule that case out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::mode::SearchMode;

/// Maximum number of source labels quoted in a research summary.
const MAX_SOURCE_LABELS: usize = 3;

/// A single row of the activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub title: String,
    pub data: String,
}

impl TimelineEvent {
    pub fn new(title: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data: data.into(),
        }
    }
}

/// Result of classifying one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub stage: StageKey,
    pub event: TimelineEvent,
    /// Set when the stage marks the end of the remote run.
    pub terminal: bool,
}

/// Pipeline phases the remote graphs report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKey {
    GenerateQuery,
    WebResearch,
    Reflection,
    ValidateSources,
    FinalizeAnswer,
    DirectLlmResponse,
    LeadAgent,
    SearchSubagent,
    CitationsSubagent,
    FinalizeReport,
}

impl StageKey {
    /// Lookup order; also the precedence when an envelope has several keys.
    pub const ALL: [StageKey; 10] = [
        StageKey::GenerateQuery,
        StageKey::WebResearch,
        StageKey::Reflection,
        StageKey::ValidateSources,
        StageKey::FinalizeAnswer,
        StageKey::DirectLlmResponse,
        StageKey::LeadAgent,
        StageKey::SearchSubagent,
        StageKey::CitationsSubagent,
        StageKey::FinalizeReport,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StageKey::GenerateQuery => "generate_query",
            StageKey::WebResearch => "web_research",
            StageKey::Reflection => "reflection",
            StageKey::ValidateSources => "validate_sources",
            StageKey::FinalizeAnswer => "finalize_answer",
            StageKey::DirectLlmResponse => "direct_llm_response",
            StageKey::LeadAgent => "lead_agent",
            StageKey::SearchSubagent => "search_subagent",
            StageKey::CitationsSubagent => "citations_subagent",
            StageKey::FinalizeReport => "finalize_report",
        }
    }

    /// `finalize_report` is only emitted by the multi-agent graph.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageKey::FinalizeAnswer | StageKey::DirectLlmResponse | StageKey::FinalizeReport
        )
    }

    /// Display title, with a more elaborate wording in deep mode.
    pub fn title(self, mode: SearchMode) -> &'static str {
        let deep = matches!(mode, SearchMode::Deep);
        match (self, deep) {
            (StageKey::GenerateQuery, false) => "Generating Search Queries",
            (StageKey::GenerateQuery, true) => "Generating Comprehensive Queries",
            (StageKey::WebResearch, false) => "Web Research",
            (StageKey::WebResearch, true) => "Deep Web Research",
            (StageKey::Reflection, false) => "Reflection",
            (StageKey::Reflection, true) => "Deep Analysis & Reflection",
            (StageKey::ValidateSources, false) => "Source Validation",
            (StageKey::ValidateSources, true) => "Cross-Validating Sources",
            (StageKey::FinalizeAnswer, false) => "Finalizing Answer",
            (StageKey::FinalizeAnswer, true) => "Synthesizing Comprehensive Answer",
            (StageKey::DirectLlmResponse, _) => "Direct Response",
            (StageKey::LeadAgent, false) => "Lead Agent Planning",
            (StageKey::LeadAgent, true) => "Lead Agent Strategic Planning",
            (StageKey::SearchSubagent, false) => "Search Subagent",
            (StageKey::SearchSubagent, true) => "Parallel Search Subagents",
            (StageKey::CitationsSubagent, false) => "Processing Citations",
            (StageKey::CitationsSubagent, true) => "Verifying Citations",
            (StageKey::FinalizeReport, false) => "Finalizing Report",
            (StageKey::FinalizeReport, true) => "Synthesizing Final Report",
        }
    }

    fn summarize(self, payload: &Value) -> String {
        match self {
            StageKey::GenerateQuery => join_queries(payload.get("search_query")),
            StageKey::WebResearch | StageKey::SearchSubagent => summarize_sources(payload),
            StageKey::Reflection => summarize_reflection(payload),
            StageKey::ValidateSources => summarize_validation(payload),
            StageKey::FinalizeAnswer => String::from("Composing and presenting the final answer."),
            StageKey::DirectLlmResponse => {
                String::from("Answering from model knowledge without web search.")
            }
            StageKey::LeadAgent => {
                let tasks = array_len(payload.get("search_query"));
                format!("Delegating {} research tasks to search subagents.", tasks)
            }
            StageKey::CitationsSubagent => {
                let results = array_len(payload.get("web_research_result"));
                format!("Adding citations to {} research results.", results)
            }
            StageKey::FinalizeReport => {
                String::from("Synthesizing subagent findings into the final report.")
            }
        }
    }
}

/// Classifies one envelope. Unknown stage keys and non-object envelopes yield `None`.
pub fn classify(envelope: &Value, mode: SearchMode) -> Option<Classified> {
    let object = envelope.as_object()?;
    let (stage, payload) = StageKey::ALL
        .into_iter()
        .find_map(|stage| object.get(stage.key()).map(|payload| (stage, payload)))?;
    Some(Classified {
        stage,
        event: TimelineEvent::new(stage.title(mode), stage.summarize(payload)),
        terminal: stage.is_terminal(),
    })
}

fn array_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_array).map(Vec::len).unwrap_or(0)
}

/// Query lists arrive either as plain strings or `{query, rationale}` objects.
fn join_queries(value: Option<&Value>) -> String {
    let Some(items) = value.and_then(Value::as_array) else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.as_str()),
            Value::Object(map) => map.get("query").and_then(Value::as_str),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn summarize_sources(payload: &Value) -> String {
    let sources = payload
        .get("sources_gathered")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut labels: Vec<&str> = Vec::new();
    for label in sources
        .iter()
        .filter_map(|source| source.get("label").and_then(Value::as_str))
    {
        if label.is_empty() || labels.contains(&label) {
            continue;
        }
        labels.push(label);
    }
    labels.truncate(MAX_SOURCE_LABELS);
    let related = if labels.is_empty() {
        String::from("N/A")
    } else {
        labels.join(", ")
    };
    format!("Gathered {} sources. Related to: {}.", sources.len(), related)
}

fn summarize_reflection(payload: &Value) -> String {
    if payload.get("is_sufficient").and_then(Value::as_bool) == Some(true) {
        return String::from("Search successful, generating final answer.");
    }
    let follow_ups = join_queries(payload.get("follow_up_queries"));
    if follow_ups.is_empty() {
        String::from("Analysing Web Research Results")
    } else {
        format!("Need more information, searching for {}", follow_ups)
    }
}

fn summarize_validation(payload: &Value) -> String {
    let contradictions = array_len(payload.get("contradictions_found"));
    match payload.get("reliability_score").and_then(Value::as_f64) {
        Some(score) => format!(
            "Reliability score {:.2}, {} contradictions found.",
            score, contradictions
        ),
        None => String::from("Validating gathered sources."),
    }
}
