use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::research::{EffortLevel, FlowType, SearchMode};

/// 設定檔相對於工作區根目錄的位置。
pub const CONFIG_RELATIVE_PATH: &str = "config/sleuth.toml";

pub const ENV_BASE_URL: &str = "SLEUTH_BASE_URL";
pub const ENV_CONFIG_URL: &str = "SLEUTH_CONFIG_URL";
pub const ENV_REASONING_MODEL: &str = "SLEUTH_REASONING_MODEL";

/// 應用程式設定的頂層結構，通常從 `config/sleuth.toml` 載入。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub research: ResearchDefaults,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// File the settings were loaded from; `save_to_file` writes back here.
    #[serde(skip)]
    source: Option<PathBuf>,
    /// Model forced by `SLEUTH_REASONING_MODEL`, never written back.
    #[serde(skip)]
    env_model: Option<String>,
}

/// 研究伺服器與設定 API 的連線資訊。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 串流 API 的基礎 URL，例如 `http://127.0.0.1:2024`。
    pub base_url: String,
    /// 設定 API 的基礎 URL；未指定時沿用 `base_url`。
    pub config_url: Option<String>,
    pub connect_timeout_secs: u64,
    /// 只套用在設定 API 上，研究串流沒有整體逾時。
    pub request_timeout_secs: u64,
    /// 直接在設定中指定的 API 金鑰。
    pub api_key: Option<String>,
    /// 用於讀取 API 金鑰的環境變數名稱。
    pub api_key_env: Option<String>,
    /// 附加到每個串流請求的額外 HTTP 標頭。
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://127.0.0.1:2024"),
            config_url: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            api_key: None,
            api_key_env: None,
            extra_headers: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// 優先順序：`api_key` 欄位 > `api_key_env` 環境變數。
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            Some(key.clone())
        } else if let Some(var) = &self.api_key_env {
            env::var(var).ok()
        } else {
            None
        }
    }

    pub fn config_base_url(&self) -> &str {
        self.config_url.as_deref().unwrap_or(&self.base_url)
    }
}

/// Selections the UI starts with and returns to after a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchDefaults {
    pub search_mode: SearchMode,
    pub effort: EffortLevel,
    pub flow: FlowType,
    pub reasoning_model: String,
    /// Models offered by the model picker, in cycling order.
    pub models: Vec<String>,
}

impl Default for ResearchDefaults {
    fn default() -> Self {
        Self {
            search_mode: SearchMode::default(),
            effort: EffortLevel::default(),
            flow: FlowType::default(),
            reasoning_model: String::from("gemini-2.5-flash"),
            models: vec![
                String::from("gemini-2.0-flash"),
                String::from("gemini-2.5-flash"),
                String::from("gemini-2.5-pro"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `log::LevelFilter` spelling: off, error, warn, info, debug, trace.
    pub level: String,
    /// Log file for the terminal UI, relative to the workspace root.
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            file: PathBuf::from("logs/sleuth.log"),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.level);
            log::LevelFilter::Info
        })
    }
}

impl AppSettings {
    /// 從工作區讀取 `config/sleuth.toml`，不存在時使用內建預設值，最後套用環境變數覆寫。
    pub fn load(workspace_root: &Path) -> Result<Self> {
        Self::load_from(&workspace_root.join(CONFIG_RELATIVE_PATH))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut settings = Self::read_file(config_path)?;
        settings.source = Some(config_path.to_path_buf());
        settings.apply_overrides(|key| env::var(key).ok());
        settings.normalize();
        Ok(settings)
    }

    /// The file's own values, without environment overrides.
    fn read_file(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            debug!("{} not found, using defaults", config_path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("讀取設定失敗: {}", config_path.display()))?;
        toml::from_str::<AppSettings>(&raw)
            .with_context(|| format!("解析設定失敗: {}", config_path.display()))
    }

    /// Where `save_to_file` writes: the loaded file, else `config/sleuth.toml`.
    pub fn target_path(&self, workspace_root: &Path) -> PathBuf {
        self.source
            .clone()
            .unwrap_or_else(|| workspace_root.join(CONFIG_RELATIVE_PATH))
    }

    /// Applies `SLEUTH_*` overrides; `lookup` is `std::env::var` outside of tests.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|value| !value.trim().is_empty()) {
            self.server.base_url = url;
        }
        if let Some(url) = lookup(ENV_CONFIG_URL).filter(|value| !value.trim().is_empty()) {
            self.server.config_url = Some(url);
        }
        if let Some(model) = lookup(ENV_REASONING_MODEL).filter(|value| !value.trim().is_empty()) {
            self.research.reasoning_model = model.clone();
            self.env_model = Some(model);
        }
    }

    /// The configured model always appears in the picker.
    fn normalize(&mut self) {
        let model = &self.research.reasoning_model;
        if !self.research.models.iter().any(|candidate| candidate == model) {
            self.research.models.push(model.clone());
        }
    }

    /// 把目前的研究預設值寫回來源設定檔。
    ///
    /// Only the `[research]` selection changes; every other value is re-read from
    /// the file so environment overrides and picker-only models stay out of it.
    pub fn save_to_file(&self, workspace_root: &Path) -> Result<PathBuf> {
        let config_path = self.target_path(workspace_root);
        let mut on_disk = Self::read_file(&config_path)?;
        let research = &mut on_disk.research;
        research.search_mode = self.research.search_mode;
        research.effort = self.research.effort;
        research.flow = self.research.flow;
        if self.env_model.as_ref() != Some(&self.research.reasoning_model) {
            research.reasoning_model = self.research.reasoning_model.clone();
        }

        if let Some(config_dir) = config_path.parent()
            && !config_dir.as_os_str().is_empty()
            && !config_dir.exists()
        {
            fs::create_dir_all(config_dir)
                .with_context(|| format!("建立設定目錄失敗: {}", config_dir.display()))?;
        }
        let serialized = toml::to_string_pretty(&on_disk).context("序列化設定失敗")?;
        fs::write(&config_path, serialized)
            .with_context(|| format!("寫入設定失敗: {}", config_path.display()))?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.research.search_mode, SearchMode::Standard);
        assert_eq!(settings.research.effort, EffortLevel::Medium);
        assert_eq!(settings.logging.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleuth.toml");
        fs::write(
            &path,
            r#"
[server]
base_url = "http://research.internal:8123"

[research]
search_mode = "deep"
effort = "extreme"
reasoning_model = "gemini-2.5-pro"
"#,
        )
        .unwrap();
        let settings = AppSettings::load_from(&path).unwrap();
        assert_eq!(settings.server.connect_timeout_secs, 10);
        assert_eq!(settings.server.config_base_url(), "http://research.internal:8123");
        assert_eq!(settings.research.search_mode, SearchMode::Deep);
        assert_eq!(settings.research.effort, EffortLevel::Medium);
        assert_eq!(settings.research.flow, FlowType::SingleAgent);
    }

    #[test]
    fn overrides_take_precedence_over_file_values() {
        let mut settings = AppSettings::default();
        settings.apply_overrides(|key| match key {
            ENV_BASE_URL => Some(String::from("http://override:1")),
            ENV_CONFIG_URL => Some(String::from("http://config:2")),
            ENV_REASONING_MODEL => Some(String::from("   ")),
            _ => None,
        });
        assert_eq!(settings.server.base_url, "http://override:1");
        assert_eq!(settings.server.config_base_url(), "http://config:2");
        assert_eq!(settings.research.reasoning_model, "gemini-2.5-flash");
    }

    #[test]
    fn unknown_model_is_added_to_the_picker() {
        let mut settings = AppSettings::default();
        settings.research.reasoning_model = String::from("local-llm");
        settings.normalize();
        assert_eq!(settings.research.models.last().map(String::as_str), Some("local-llm"));
        let count = settings.research.models.len();
        settings.normalize();
        assert_eq!(settings.research.models.len(), count);
    }

    #[test]
    fn save_then_load_preserves_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = AppSettings::default();
        settings.research.flow = FlowType::MultiAgent;
        settings.research.effort = EffortLevel::High;
        let written = settings.save_to_file(dir.path()).unwrap();
        assert_eq!(written, dir.path().join(CONFIG_RELATIVE_PATH));

        let loaded = AppSettings::read_file(&written).unwrap();
        assert_eq!(loaded.research, settings.research);
        assert_eq!(loaded.server, ServerConfig::default());
    }

    #[test]
    fn save_writes_back_to_the_loaded_file_without_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom.toml");
        fs::write(
            &custom,
            r#"
[server]
base_url = "http://from-custom:1"

[research]
reasoning_model = "gemini-2.5-pro"
models = ["gemini-2.5-pro"]
"#,
        )
        .unwrap();
        let mut settings = AppSettings::read_file(&custom).unwrap();
        settings.source = Some(custom.clone());
        settings.apply_overrides(|key| match key {
            ENV_BASE_URL => Some(String::from("http://transient-env:9")),
            ENV_REASONING_MODEL => Some(String::from("env-model")),
            _ => None,
        });
        settings.normalize();
        assert_eq!(settings.research.models, vec!["gemini-2.5-pro", "env-model"]);

        settings.research.search_mode = SearchMode::Deep;
        let written = settings.save_to_file(dir.path()).unwrap();
        assert_eq!(written, custom);
        assert!(!dir.path().join(CONFIG_RELATIVE_PATH).exists());

        let reloaded = AppSettings::read_file(&custom).unwrap();
        assert_eq!(reloaded.server.base_url, "http://from-custom:1");
        assert_eq!(reloaded.research.search_mode, SearchMode::Deep);
        assert_eq!(reloaded.research.reasoning_model, "gemini-2.5-pro");
        assert_eq!(reloaded.research.models, vec!["gemini-2.5-pro"]);
        assert!(!fs::read_to_string(&custom).unwrap().contains("transient-env"));
    }

    #[test]
    fn picked_model_replaces_the_environment_one_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = AppSettings::default();
        settings.apply_overrides(|key| (key == ENV_REASONING_MODEL).then(|| String::from("env-model")));
        settings.research.reasoning_model = String::from("gemini-2.5-pro");
        let written = settings.save_to_file(dir.path()).unwrap();
        let reloaded = AppSettings::read_file(&written).unwrap();
        assert_eq!(reloaded.research.reasoning_model, "gemini-2.5-pro");
    }

    #[test]
    fn explicit_api_key_wins() {
        let server = ServerConfig {
            api_key: Some(String::from("inline")),
            api_key_env: Some(String::from("SLEUTH_TEST_UNSET_KEY")),
            ..ServerConfig::default()
        };
        assert_eq!(server.resolved_api_key().as_deref(), Some("inline"));
    }
}
