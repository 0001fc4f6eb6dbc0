use log::{debug, info, warn};

use super::{App, Banner, BannerKind, PendingInputAction, SelectorTarget};

/// Everything a key binding can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    Submit,
    Cancel,
    Reload,
    Pick(SelectorTarget),
    /// Steps to the next value without opening the picker.
    Cycle(SelectorTarget),
    ImportPreset,
    ExportAll,
    ExportCurrentFlow,
    SavePrompts,
    SaveDefaults,
    ToggleHelp,
    Quit,
}

impl App {
    /// The single source of truth for executing a `CommandAction`.
    pub(crate) async fn execute_action(&mut self, action: CommandAction) {
        debug!("Executing action {:?}", action);
        match action {
            CommandAction::Submit => self.submit_research().await,
            CommandAction::Cancel => self.cancel_research(),
            CommandAction::Reload => self.reload(),
            CommandAction::Pick(target) => self.open_selector(target),
            CommandAction::Cycle(target) => self.cycle_selection(target),
            CommandAction::ImportPreset => self.prompt_input(PendingInputAction::ImportPreset),
            CommandAction::ExportAll => self.prompt_input(PendingInputAction::ExportAll),
            CommandAction::ExportCurrentFlow => {
                let flow = self.prompt_flow();
                self.prompt_input(PendingInputAction::ExportFlow(flow));
            }
            CommandAction::SavePrompts => self.save_prompts().await,
            CommandAction::SaveDefaults => self.save_defaults(),
            CommandAction::ToggleHelp => self.toggle_help(),
            CommandAction::Quit => self.should_quit = true,
        }
    }

    /// Writes the current picks to the settings file; reloads return to them.
    fn save_defaults(&mut self) {
        let research = &mut self.settings.research;
        research.search_mode = self.selection.search_mode;
        research.effort = self.selection.effort;
        research.flow = self.selection.flow;
        research.reasoning_model = self.selection.reasoning_model.clone();
        match self.settings.save_to_file(&self.workspace_root) {
            Ok(path) => {
                info!("Saved research defaults to {}", path.display());
                self.status_message = format!("Defaults saved to {}", path.display());
            }
            Err(err) => {
                warn!("Failed to save defaults: {:#}", err);
                self.banner = Some(Banner::new(
                    BannerKind::Error,
                    format!("Could not save defaults: {:#}", err),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;
    use crate::backend::replay::ReplayBackend;
    use crate::config::{AppSettings, CONFIG_RELATIVE_PATH};
    use crate::research::SearchMode;

    #[tokio::test]
    async fn save_defaults_targets_the_loaded_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom.toml");
        fs::write(&custom, "[server]\nbase_url = \"http://from-custom:1\"\n").unwrap();
        let settings = AppSettings::load_from(&custom).unwrap();
        let mut app = App::new(
            dir.path().to_path_buf(),
            settings,
            Box::new(ReplayBackend::new(dir.path().join("none.ndjson"), Duration::ZERO)),
            None,
        );
        app.selection.search_mode = SearchMode::NoSearch;

        app.execute_action(CommandAction::SaveDefaults).await;

        assert!(app.banner.is_none());
        assert!(!dir.path().join(CONFIG_RELATIVE_PATH).exists());
        let reloaded = AppSettings::load_from(&custom).unwrap();
        assert_eq!(reloaded.research.search_mode, SearchMode::NoSearch);
        assert!(fs::read_to_string(&custom).unwrap().contains("http://from-custom:1"));
    }
}
