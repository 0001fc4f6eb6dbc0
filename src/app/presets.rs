use std::path::Path;

use chrono::Local;
use log::{error, info};

use super::{App, Banner, BannerKind};
use crate::preset::{self, FlowKind};
use crate::research::{FlowType, SearchMode};

const EXPORT_NAME: &str = "Sleuth Prompts";

impl App {
    /// Prompt family the current selection runs with.
    pub(crate) fn prompt_flow(&self) -> FlowKind {
        match (self.selection.search_mode, self.selection.flow) {
            (SearchMode::NoSearch, _) => FlowKind::Nosearch,
            (_, FlowType::Claude) => FlowKind::Anthropic,
            _ => FlowKind::Default,
        }
    }

    pub(crate) fn suggest_export_path(&self, flow: Option<FlowKind>) -> String {
        preset::preset_filename(EXPORT_NAME, flow, &Local::now())
    }

    /// Imports a preset file into the local workspace and pushes it to the
    /// configuration service. Decode errors are returned for inline display.
    pub(crate) async fn import_preset(&mut self, path: &Path) -> Result<(), String> {
        let summary = self
            .prompts
            .import_file(path)
            .map_err(|err| err.to_string())?;
        let flows = summary
            .flows
            .iter()
            .map(|flow| flow.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        info!("Imported {} ({})", summary.name, flows);
        self.status_message = format!("Imported \"{}\" ({})", summary.name, flows);
        self.save_prompts().await;
        Ok(())
    }

    pub(crate) fn export_preset(&mut self, path: &Path, flow: Option<FlowKind>) -> Result<(), String> {
        let now = Local::now();
        let preset = match flow {
            Some(flow) => self.prompts.export_flow(flow, EXPORT_NAME, &now),
            None => self.prompts.export_all(EXPORT_NAME, &now),
        }
        .map_err(|err| err.to_string())?;
        preset::write_preset(path, &preset).map_err(|err| err.to_string())?;
        info!("Exported prompts to {}", path.display());
        self.status_message = format!("Exported prompts to {}", path.display());
        Ok(())
    }

    /// Pushes local prompt edits to the configuration service. On failure the
    /// edits stay dirty so Ctrl+S can retry.
    pub(crate) async fn save_prompts(&mut self) {
        if !self.prompts.is_dirty() {
            self.status_message = String::from("Prompts are already up to date");
            return;
        }
        let Some(api) = self.prompt_api.as_ref() else {
            self.banner = Some(Banner::new(
                BannerKind::Error,
                "No configuration service configured; prompts kept locally",
            ));
            return;
        };
        match api.store_flow_prompts(self.prompts.prompts()).await {
            Ok(()) => {
                self.prompts.mark_saved();
                self.banner = Some(Banner::new(BannerKind::Info, "Prompts saved"));
            }
            Err(err) => {
                error!("Saving prompts failed: {}", err);
                self.banner = Some(Banner::new(
                    BannerKind::Error,
                    format!("Saving prompts failed: {} (Ctrl+S to retry)", err),
                ));
            }
        }
    }
}
