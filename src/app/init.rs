use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};

use super::{App, Banner, BannerKind, Composer};
use crate::backend::ResearchBackend;
use crate::backend::prompts::PromptApi;
use crate::config::AppSettings;
use crate::panels::conversation::ConversationPanel;
use crate::preset::PromptWorkspace;
use crate::research::{FlowType, ResearchSelection};

impl App {
    /// Creates the application state. Nothing is fetched here; see
    /// [`App::load_remote_config`].
    pub fn new(
        workspace_root: PathBuf,
        settings: AppSettings,
        backend: Box<dyn ResearchBackend>,
        prompt_api: Option<PromptApi>,
    ) -> Self {
        debug!(
            "Initializing App with workspace {} and backend {}",
            workspace_root.display(),
            backend.name()
        );
        let selection = Self::default_selection(&settings);
        Self {
            should_quit: false,
            workspace_root,
            selection,
            controller: Default::default(),
            conversation: ConversationPanel::new(),
            input: Composer::new(),
            prompts: PromptWorkspace::default(),
            flow_labels: static_flow_labels(),
            status_message: String::from("Enter 送出問題 · F1 說明 · Ctrl+Q 離開"),
            overlay: None,
            banner: None,
            backend,
            prompt_api,
            run_id: None,
            run_started: None,
            tick_rate: Duration::from_millis(250),
            settings,
        }
    }

    /// Selections from the configuration file; reload returns to these.
    pub(crate) fn default_selection(settings: &AppSettings) -> ResearchSelection {
        ResearchSelection {
            search_mode: settings.research.search_mode,
            effort: settings.research.effort,
            flow: settings.research.flow,
            reasoning_model: settings.research.reasoning_model.clone(),
        }
    }

    /// Fetches the flow registry and the current prompts from the configuration
    /// service. Failures only degrade the pickers and preset commands.
    pub async fn load_remote_config(&mut self) {
        let Some(api) = self.prompt_api.as_ref() else {
            return;
        };
        match api.flows().await {
            Ok(flows) if !flows.is_empty() => {
                info!("Loaded {} flows from the configuration service", flows.len());
                self.flow_labels.extend(flows);
            }
            Ok(_) => {}
            Err(err) => warn!("Flow registry unavailable: {}", err),
        }
        match api.current_flow_prompts().await {
            Ok(prompts) => {
                info!("Loaded prompts for {} flows", prompts.len());
                self.prompts.replace(prompts);
            }
            Err(err) => {
                warn!("Prompt configuration unavailable: {}", err);
                self.banner = Some(Banner::new(
                    BannerKind::Error,
                    format!("Prompt configuration unavailable: {}", err),
                ));
            }
        }
    }

    pub fn flow_label(&self, flow: FlowType) -> &str {
        self.flow_labels
            .get(flow.as_str())
            .map(String::as_str)
            .unwrap_or_else(|| flow.label())
    }
}

fn static_flow_labels() -> BTreeMap<String, String> {
    FlowType::ALL
        .iter()
        .map(|flow| (flow.as_str().to_string(), flow.label().to_string()))
        .collect()
}
