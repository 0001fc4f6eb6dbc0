//! 無介面的指令模式：`sleuth ask` 與 `sleuth preset ...`。
//!
//! 事件流程與 TUI 相同（同一個 `SubmissionController`），只是把時間軸
//! 與最終答案直接印到 stdout。

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use clap::{Args, Subcommand};
use log::{info, warn};

use crate::backend::prompts::PromptApi;
use crate::backend::{ResearchBackend, StreamEvent};
use crate::config::AppSettings;
use crate::preset::{self, FlowKind, Preset, PromptWorkspace, preset_filename};
use crate::research::{
    EffortLevel, FlowType, ResearchSelection, Role, SearchMode, SubmissionController,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Args)]
pub struct AskArgs {
    /// The research question.
    pub question: String,
    #[arg(long, value_enum)]
    pub mode: Option<SearchMode>,
    /// low, medium or high; anything else means medium.
    #[arg(long, value_parser = EffortLevel::clap_parser)]
    pub effort: Option<EffortLevel>,
    #[arg(long, value_enum)]
    pub flow: Option<FlowType>,
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum PresetCommand {
    /// Checks a preset file without contacting the server.
    Validate { file: PathBuf },
    /// Downloads the current prompts and writes them as a preset file.
    Export {
        /// Export a single flow instead of all of them.
        #[arg(long, value_enum)]
        flow: Option<FlowKind>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "Exported prompts")]
        name: String,
    },
    /// Uploads the prompts of a preset file to the server.
    Import { file: PathBuf },
    /// Restores the server's built-in prompts.
    Reset {
        /// Use the single-flow `/api/prompts/reset` endpoint.
        #[arg(long)]
        legacy: bool,
    },
}

impl AskArgs {
    fn selection(&self, settings: &AppSettings) -> ResearchSelection {
        let defaults = &settings.research;
        ResearchSelection {
            search_mode: self.mode.unwrap_or(defaults.search_mode),
            effort: self.effort.unwrap_or(defaults.effort),
            flow: self.flow.unwrap_or(defaults.flow),
            reasoning_model: self
                .model
                .clone()
                .unwrap_or_else(|| defaults.reasoning_model.clone()),
        }
    }
}

/// Runs one research question to completion. Ctrl+C cancels the run.
pub async fn ask(
    settings: &AppSettings,
    mut backend: Box<dyn ResearchBackend>,
    args: AskArgs,
) -> Result<()> {
    let selection = args.selection(settings);
    let mut controller = SubmissionController::new();
    let request = controller
        .submit(&args.question, &selection)
        .context("無法送出研究問題")?;
    info!("Question: {}", request.question().unwrap_or_default());
    backend.start(request).await?;
    eprintln!(
        "Researching with {} · {} ({})",
        selection.search_mode.label(),
        selection.reasoning_model,
        backend.name()
    );

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    loop {
        while let Some(event) = backend.poll_event() {
            match event {
                StreamEvent::Started { run_id } => {
                    if let Some(run_id) = run_id {
                        info!("Run {} started", run_id);
                    }
                }
                StreamEvent::Update(envelope) => {
                    if let Some(classified) = controller.on_update(&envelope) {
                        println!("● {}", classified.event.title);
                        if !classified.event.data.is_empty() {
                            println!("  {}", classified.event.data);
                        }
                    }
                }
                StreamEvent::Completed => {
                    if controller.on_complete().is_none() {
                        warn!("Stream ended before a final answer was produced");
                    }
                    let answer = controller
                        .messages()
                        .iter()
                        .rev()
                        .find(|message| message.role == Role::Assistant)
                        .ok_or_else(|| anyhow!("研究結束但沒有收到答案"))?;
                    println!();
                    println!("{}", answer.content);
                    return Ok(());
                }
                StreamEvent::Failed(reason) => {
                    controller.on_error(reason.clone());
                    bail!("研究失敗: {}", reason);
                }
            }
        }

        tokio::select! {
            _ = &mut interrupt => {
                backend.cancel();
                controller.reset();
                bail!("已取消");
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

pub async fn preset(
    settings: &AppSettings,
    workspace_root: &Path,
    command: PresetCommand,
) -> Result<()> {
    match command {
        PresetCommand::Validate { file } => {
            let preset = preset::read_preset(&file)?;
            print_summary(&file, &preset);
            Ok(())
        }
        PresetCommand::Export { flow, out, name } => {
            let api = PromptApi::new(&settings.server)?;
            let prompts = api
                .current_flow_prompts()
                .await
                .context("下載提示詞失敗")?;
            let workspace = PromptWorkspace::new(prompts);
            let now = Local::now();
            let preset = match flow {
                Some(flow) => workspace.export_flow(flow, &name, &now)?,
                None => workspace.export_all(&name, &now)?,
            };
            let path =
                out.unwrap_or_else(|| workspace_root.join(preset_filename(&name, flow, &now)));
            preset::write_preset(&path, &preset)?;
            println!("{}", path.display());
            Ok(())
        }
        PresetCommand::Import { file } => {
            let api = PromptApi::new(&settings.server)?;
            let mut workspace = PromptWorkspace::new(
                api.current_flow_prompts()
                    .await
                    .context("下載提示詞失敗")?,
            );
            let summary = workspace.import_file(&file)?;
            api.store_flow_prompts(workspace.prompts())
                .await
                .context("上傳提示詞失敗")?;
            println!(
                "Imported {:?} ({})",
                summary.name,
                flow_list(&summary.flows)
            );
            Ok(())
        }
        PresetCommand::Reset { legacy } => {
            let api = PromptApi::new(&settings.server)?;
            if legacy {
                api.reset_prompts().await.context("重設提示詞失敗")?;
            } else {
                api.reset_flow_prompts().await.context("重設提示詞失敗")?;
            }
            println!("Prompts reset to server defaults");
            Ok(())
        }
    }
}

fn print_summary(file: &Path, preset: &Preset) {
    let metadata = preset.metadata();
    println!("{}: ok", file.display());
    println!("  name:    {}", metadata.name);
    println!("  version: {}", metadata.version);
    println!("  created: {}", metadata.created_at);
    println!("  flows:   {}", flow_list(&preset.flows()));
}

fn flow_list(flows: &[FlowKind]) -> String {
    flows
        .iter()
        .map(|flow| flow.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
