//! 日誌初始化。
//!
//! 終端介面佔用 stdout，因此 TUI 模式把日誌寫到檔案（log4rs）；
//! 無介面的指令模式則用 env_logger 輸出到 stderr。

use std::path::Path;

use anyhow::{Context, Result};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::LoggingConfig;

const LOG4RS_RELATIVE_PATH: &str = "config/log4rs.yaml";
const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:<5} {t} - {m}{n}";

/// 優先使用工作區的 `config/log4rs.yaml`，否則依設定寫入單一日誌檔。
pub fn init_tui(workspace_root: &Path, config: &LoggingConfig) -> Result<()> {
    let yaml = workspace_root.join(LOG4RS_RELATIVE_PATH);
    if yaml.exists() {
        log4rs::init_file(&yaml, Default::default())
            .with_context(|| format!("載入日誌設定失敗: {}", yaml.display()))?;
        return Ok(());
    }

    let log_path = workspace_root.join(&config.file);
    let appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(&log_path)
        .with_context(|| format!("無法開啟日誌檔: {}", log_path.display()))?;
    let log_config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .build(
            Root::builder()
                .appender("file")
                .build(config.level_filter()),
        )
        .context("建立日誌設定失敗")?;
    log4rs::init_config(log_config).context("初始化日誌失敗")?;
    Ok(())
}

/// `RUST_LOG` overrides the configured level.
pub fn init_headless(config: &LoggingConfig) {
    let _ = env_logger::Builder::new()
        .filter_level(config.level_filter())
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
