//! 提示詞預設檔（preset）的資料模型、編解碼與本地編輯區。
//!
//! A preset is either a bundle of all three flows' prompts or the prompts of a
//! single flow; the two shapes are told apart by `metadata.flow_type`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

mod codec;
mod filename;
mod workspace;

pub use codec::{decode, encode, read_preset, write_preset};
pub use filename::preset_filename;
pub use workspace::{ImportSummary, PromptWorkspace};

/// Prompt key to prompt text for one flow.
pub type FlowPrompts = BTreeMap<String, String>;

/// Wire shape of `/api/flow-prompts`.
pub type FlowPromptSet = BTreeMap<FlowKind, FlowPrompts>;

pub const PRESET_VERSION: &str = "1.0";

/// Prompt families understood by the server graphs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Default,
    Anthropic,
    Nosearch,
}

impl FlowKind {
    pub const ALL: [FlowKind; 3] = [FlowKind::Default, FlowKind::Anthropic, FlowKind::Nosearch];

    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::Default => "default",
            FlowKind::Anthropic => "anthropic",
            FlowKind::Nosearch => "nosearch",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flow| flow.as_str() == key)
    }

    /// Prompt keys a preset must carry for this flow.
    pub fn required_prompts(self) -> &'static [&'static str] {
        match self {
            FlowKind::Default => &["generate_query", "web_research", "reflection", "finalize_answer"],
            FlowKind::Anthropic => &[
                "generate_query",
                "web_research",
                "reflection",
                "finalize_answer",
                "direct_llm_response",
            ],
            FlowKind::Nosearch => &["direct_llm_response"],
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<FlowKind>,
}

impl PresetMetadata {
    /// Fresh metadata stamped with `now` in RFC 3339.
    pub fn new<Tz: TimeZone>(name: impl Into<String>, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self {
            name: name.into(),
            description: None,
            version: String::from(PRESET_VERSION),
            created_at: now.to_rfc3339(),
            modified_at: None,
            author: None,
            flow_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllFlowPrompts {
    pub default: FlowPrompts,
    pub anthropic: FlowPrompts,
    pub nosearch: FlowPrompts,
}

impl AllFlowPrompts {
    pub fn get(&self, flow: FlowKind) -> &FlowPrompts {
        match flow {
            FlowKind::Default => &self.default,
            FlowKind::Anthropic => &self.anthropic,
            FlowKind::Nosearch => &self.nosearch,
        }
    }
}

/// Prompts for every flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPreset {
    pub metadata: PresetMetadata,
    pub prompts: AllFlowPrompts,
}

/// Prompts for one flow; `metadata.flow_type` is always set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleFlowPreset {
    pub metadata: PresetMetadata,
    pub prompts: FlowPrompts,
}

impl SingleFlowPreset {
    pub fn new(flow: FlowKind, mut metadata: PresetMetadata, prompts: FlowPrompts) -> Self {
        metadata.flow_type = Some(flow);
        Self { metadata, prompts }
    }

    pub fn flow(&self) -> FlowKind {
        self.metadata.flow_type.unwrap_or(FlowKind::Default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preset {
    AllFlows(PromptPreset),
    SingleFlow(SingleFlowPreset),
}

impl Preset {
    pub fn metadata(&self) -> &PresetMetadata {
        match self {
            Preset::AllFlows(preset) => &preset.metadata,
            Preset::SingleFlow(preset) => &preset.metadata,
        }
    }

    /// Flows this preset carries prompts for.
    pub fn flows(&self) -> Vec<FlowKind> {
        match self {
            Preset::AllFlows(_) => FlowKind::ALL.to_vec(),
            Preset::SingleFlow(preset) => vec![preset.flow()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
    #[error("invalid preset at {path}: {reason}")]
    Schema { path: String, reason: String },
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PresetError {
    pub(crate) fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PresetError::Schema {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_keys_round_trip() {
        for flow in FlowKind::ALL {
            assert_eq!(FlowKind::from_key(flow.as_str()), Some(flow));
        }
        assert_eq!(FlowKind::from_key("claude"), None);
    }

    #[test]
    fn flow_prompt_set_uses_flow_names_as_keys() {
        let set: FlowPromptSet = serde_json::from_str(
            r#"{"nosearch": {"direct_llm_response": "answer"}, "default": {}}"#,
        )
        .unwrap();
        assert_eq!(set.keys().copied().collect::<Vec<_>>(), vec![FlowKind::Default, FlowKind::Nosearch]);
    }

    #[test]
    fn anthropic_requires_a_superset_of_default() {
        for key in FlowKind::Default.required_prompts() {
            assert!(FlowKind::Anthropic.required_prompts().contains(key));
        }
    }
}
