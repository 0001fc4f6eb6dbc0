use std::fmt;
use std::path::Path;

use chrono::{DateTime, TimeZone};
use log::info;

use super::codec::{self, validate_flow};
use super::{
    AllFlowPrompts, FlowKind, FlowPromptSet, FlowPrompts, Preset, PresetError, PresetMetadata,
    PromptPreset, SingleFlowPreset,
};

/// What an import replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub name: String,
    pub flows: Vec<FlowKind>,
}

/// 本地可編輯的提示詞副本。匯入或修改後標記為 dirty，直到成功存回伺服器。
#[derive(Debug, Clone, Default)]
pub struct PromptWorkspace {
    prompts: FlowPromptSet,
    dirty: bool,
}

impl PromptWorkspace {
    /// Starts from prompts as the server knows them, clean.
    pub fn new(prompts: FlowPromptSet) -> Self {
        Self {
            prompts,
            dirty: false,
        }
    }

    pub fn prompts(&self) -> &FlowPromptSet {
        &self.prompts
    }

    pub fn flow(&self, flow: FlowKind) -> Option<&FlowPrompts> {
        self.prompts.get(&flow)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called after the server accepted the current prompts.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Replaces everything with server state, dropping local edits.
    pub fn replace(&mut self, prompts: FlowPromptSet) {
        self.prompts = prompts;
        self.dirty = false;
    }

    /// Decodes `text` completely before touching the workspace; on error nothing changes.
    pub fn import(&mut self, text: &str) -> Result<ImportSummary, PresetError> {
        let preset = codec::decode(text)?;
        Ok(self.apply(preset))
    }

    pub fn import_file(&mut self, path: &Path) -> Result<ImportSummary, PresetError> {
        let preset = codec::read_preset(path)?;
        Ok(self.apply(preset))
    }

    fn apply(&mut self, preset: Preset) -> ImportSummary {
        let summary = ImportSummary {
            name: preset.metadata().name.clone(),
            flows: preset.flows(),
        };
        match preset {
            Preset::AllFlows(preset) => {
                let AllFlowPrompts {
                    default,
                    anthropic,
                    nosearch,
                } = preset.prompts;
                self.prompts.insert(FlowKind::Default, default);
                self.prompts.insert(FlowKind::Anthropic, anthropic);
                self.prompts.insert(FlowKind::Nosearch, nosearch);
            }
            Preset::SingleFlow(preset) => {
                let flow = preset.flow();
                self.prompts.insert(flow, preset.prompts);
            }
        }
        self.dirty = true;
        info!(
            "Imported preset {:?} covering {} flow(s)",
            summary.name,
            summary.flows.len()
        );
        summary
    }

    /// Bundles every flow. Fails if a flow is missing or incomplete.
    pub fn export_all<Tz: TimeZone>(
        &self,
        name: &str,
        now: &DateTime<Tz>,
    ) -> Result<Preset, PresetError>
    where
        Tz::Offset: fmt::Display,
    {
        let default = self.checked_flow(FlowKind::Default)?;
        let anthropic = self.checked_flow(FlowKind::Anthropic)?;
        let nosearch = self.checked_flow(FlowKind::Nosearch)?;
        Ok(Preset::AllFlows(PromptPreset {
            metadata: PresetMetadata::new(name, now),
            prompts: AllFlowPrompts {
                default,
                anthropic,
                nosearch,
            },
        }))
    }

    pub fn export_flow<Tz: TimeZone>(
        &self,
        flow: FlowKind,
        name: &str,
        now: &DateTime<Tz>,
    ) -> Result<Preset, PresetError>
    where
        Tz::Offset: fmt::Display,
    {
        let prompts = self.checked_flow(flow)?;
        Ok(Preset::SingleFlow(SingleFlowPreset::new(
            flow,
            PresetMetadata::new(name, now),
            prompts,
        )))
    }

    fn checked_flow(&self, flow: FlowKind) -> Result<FlowPrompts, PresetError> {
        let path = format!("prompts.{}", flow);
        let prompts = self
            .prompts
            .get(&flow)
            .ok_or_else(|| PresetError::schema(path.clone(), "no prompts loaded for this flow"))?;
        validate_flow(prompts, flow, &path)?;
        Ok(prompts.clone())
    }
}
