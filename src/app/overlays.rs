use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{debug, info};

use super::{
    App, InputPromptState, OverlayState, PendingInputAction, SelectorOption, SelectorState,
    SelectorTarget,
};
use crate::research::{EffortLevel, FlowType, SearchMode, resolve};

impl App {
    /// Opens the picker for one research option.
    pub(crate) fn open_selector(&mut self, target: SelectorTarget) {
        if self.controller.is_streaming() {
            self.status_message = String::from("Options are locked while research is running");
            return;
        }
        let (options, current) = match target {
            SelectorTarget::Mode => (self.mode_options(), self.selection.search_mode.as_str()),
            SelectorTarget::Effort => (self.effort_options(), self.selection.effort.as_str()),
            SelectorTarget::Flow => (self.flow_options(), self.selection.flow.as_str()),
            SelectorTarget::Model => (self.model_options(), self.selection.reasoning_model.as_str()),
        };
        let state = SelectorState::new(target, options, current);
        self.overlay = Some(OverlayState::Selector(state));
        self.status_message = format!("Select {}", target.title());
        debug!("Opened {:?} selector", target);
    }

    fn mode_options(&self) -> Vec<SelectorOption> {
        SearchMode::ALL
            .iter()
            .map(|mode| {
                let profile = mode.profile();
                let mut detail = vec![format!("{} · ~{}", profile.summary, profile.estimated_time)];
                detail.extend(profile.features.iter().map(|feature| format!("• {}", feature)));
                SelectorOption {
                    value: mode.as_str().to_string(),
                    label: profile.label.to_string(),
                    detail,
                }
            })
            .collect()
    }

    /// Effort entries preview what they resolve to under the current mode.
    fn effort_options(&self) -> Vec<SelectorOption> {
        let mode = self.selection.search_mode;
        EffortLevel::ALL
            .iter()
            .map(|effort| {
                let detail = if mode.uses_effort() {
                    let params = resolve(mode, *effort, self.selection.flow);
                    format!(
                        "{} queries · {} loops",
                        params.initial_search_query_count, params.max_research_loops
                    )
                } else {
                    format!("No effect in {} mode", mode.label())
                };
                SelectorOption {
                    value: effort.as_str().to_string(),
                    label: effort.label().to_string(),
                    detail: vec![detail],
                }
            })
            .collect()
    }

    fn flow_options(&self) -> Vec<SelectorOption> {
        FlowType::ALL
            .iter()
            .map(|flow| {
                let params = resolve(self.selection.search_mode, self.selection.effort, *flow);
                SelectorOption {
                    value: flow.as_str().to_string(),
                    label: self.flow_label(*flow).to_string(),
                    detail: vec![format!("assistant: {}", params.assistant_id)],
                }
            })
            .collect()
    }

    fn model_options(&self) -> Vec<SelectorOption> {
        self.settings
            .research
            .models
            .iter()
            .map(|model| SelectorOption {
                value: model.clone(),
                label: model.clone(),
                detail: Vec::new(),
            })
            .collect()
    }

    /// Applies a picked value. Refused while streaming.
    pub(crate) fn apply_selection(&mut self, target: SelectorTarget, value: &str) {
        if self.controller.is_streaming() {
            self.status_message = String::from("Options are locked while research is running");
            return;
        }
        match target {
            SelectorTarget::Mode => {
                if let Some(mode) = SearchMode::ALL.into_iter().find(|mode| mode.as_str() == value) {
                    self.selection.search_mode = mode;
                }
            }
            SelectorTarget::Effort => self.selection.effort = EffortLevel::parse_lenient(value),
            SelectorTarget::Flow => {
                if let Some(flow) = FlowType::from_key(value) {
                    self.selection.flow = flow;
                }
            }
            SelectorTarget::Model => self.selection.reasoning_model = value.to_string(),
        }
        info!("{} set to {}", target.title(), value);
        self.status_message = format!("{}: {}", target.title(), value);
    }

    /// Advances one option in place; the model wraps around the configured list.
    pub(crate) fn cycle_selection(&mut self, target: SelectorTarget) {
        let value = match target {
            SelectorTarget::Mode => self.selection.search_mode.next().as_str().to_string(),
            SelectorTarget::Effort => self.selection.effort.next().as_str().to_string(),
            SelectorTarget::Flow => self.selection.flow.next().as_str().to_string(),
            SelectorTarget::Model => {
                let models = &self.settings.research.models;
                if models.is_empty() {
                    return;
                }
                let next = models
                    .iter()
                    .position(|model| *model == self.selection.reasoning_model)
                    .map_or(0, |index| (index + 1) % models.len());
                models[next].clone()
            }
        };
        self.apply_selection(target, &value);
    }

    /// Opens the path prompt for a preset import or export.
    pub(crate) fn prompt_input(&mut self, action: PendingInputAction) {
        let (title, placeholder, initial) = match action {
            PendingInputAction::ImportPreset => (
                String::from("Import Prompt Preset"),
                "Path of a preset JSON file (relative to workspace)",
                None,
            ),
            PendingInputAction::ExportAll => (
                String::from("Export All Prompts"),
                "Destination file (relative to workspace)",
                Some(self.suggest_export_path(None)),
            ),
            PendingInputAction::ExportFlow(flow) => (
                format!("Export {} Prompts", flow),
                "Destination file (relative to workspace)",
                Some(self.suggest_export_path(Some(flow))),
            ),
        };
        debug!("Showing input prompt: {}", title);
        self.status_message = format!("{}: waiting for input", title);
        self.overlay = Some(OverlayState::InputPrompt(InputPromptState::new(
            title,
            placeholder,
            action,
            initial,
        )));
    }

    pub(crate) fn toggle_help(&mut self) {
        self.overlay = match self.overlay {
            Some(OverlayState::Help) => None,
            _ => Some(OverlayState::Help),
        };
    }

    pub(crate) fn close_overlay(&mut self) {
        self.overlay = None;
        debug!("Closed overlay");
    }

    /// Overlays capture all input while open.
    pub(crate) async fn handle_overlay_key(&mut self, key: KeyEvent) {
        match self.overlay.as_mut() {
            Some(OverlayState::Selector(state)) => match key.code {
                KeyCode::Esc => self.close_overlay(),
                KeyCode::Up => state.move_selection(-1),
                KeyCode::Down | KeyCode::Tab => state.move_selection(1),
                KeyCode::Enter => {
                    let target = state.target;
                    let value = state.selected_option().map(|option| option.value.clone());
                    self.close_overlay();
                    if let Some(value) = value {
                        self.apply_selection(target, &value);
                    }
                }
                _ => {}
            },
            Some(OverlayState::InputPrompt(state)) => match key.code {
                KeyCode::Esc => {
                    self.close_overlay();
                    self.status_message = String::from("Cancelled");
                }
                KeyCode::Enter => self.complete_input_prompt().await,
                KeyCode::Backspace => {
                    state.value.pop();
                    state.error = None;
                }
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    state.value.clear();
                    state.error = None;
                }
                KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    state.value.push(ch);
                    state.error = None;
                }
                _ => {}
            },
            Some(OverlayState::Help) => self.close_overlay(),
            None => {}
        }
    }

    /// Runs the pending action; errors stay inline so the user can fix the path.
    pub(crate) async fn complete_input_prompt(&mut self) {
        let Some(OverlayState::InputPrompt(state)) = self.overlay.as_ref() else {
            return;
        };
        let action = state.action;
        let raw = state.value.trim().to_string();
        if raw.is_empty() {
            self.set_prompt_error(String::from("Path cannot be empty"));
            return;
        }
        let path = self.resolve_path(&raw);
        let outcome = match action {
            PendingInputAction::ImportPreset => self.import_preset(&path).await,
            PendingInputAction::ExportAll => self.export_preset(&path, None),
            PendingInputAction::ExportFlow(flow) => self.export_preset(&path, Some(flow)),
        };
        match outcome {
            Ok(()) => self.close_overlay(),
            Err(message) => self.set_prompt_error(message),
        }
    }

    fn set_prompt_error(&mut self, message: String) {
        if let Some(OverlayState::InputPrompt(state)) = self.overlay.as_mut() {
            state.error = Some(message);
        }
    }

    fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            path
        } else {
            self.workspace_root.join(path)
        }
    }
}
