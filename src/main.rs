pub mod app;
pub mod backend;
pub mod config;
pub mod event;
pub mod headless;
pub mod logging;
pub mod panels;
pub mod preset;
pub mod research;
pub mod tui;
pub mod ui;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use app::App;
use backend::prompts::PromptApi;
use clap::{Parser, Subcommand};
use config::AppSettings;
use crossterm::event::{Event as CrosstermEvent, EventStream};
use event::Event;
use futures_util::StreamExt;
use log::{info, warn};
use tui::{init, restore};
use ui::render;

/// 終端機裡的研究代理前端。
#[derive(Debug, Parser)]
#[command(name = "sleuth", version, about)]
struct Cli {
    /// Workspace root holding `config/` and `logs/`.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,
    /// Settings file; defaults to `<workspace>/config/sleuth.toml`.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Replay recorded NDJSON envelopes instead of contacting the server.
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Pause between replayed envelopes.
    #[arg(long, default_value_t = 400)]
    replay_delay_ms: u64,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs one research question and prints the answer.
    Ask(headless::AskArgs),
    /// Works with prompt preset files.
    #[command(subcommand)]
    Preset(headless::PresetCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = match cli.config.as_deref() {
        Some(path) => AppSettings::load_from(path)?,
        None => AppSettings::load(&cli.workspace)?,
    };
    let replay_delay = Duration::from_millis(cli.replay_delay_ms);

    match cli.command {
        Some(Command::Ask(args)) => {
            logging::init_headless(&settings.logging);
            let backend = backend::connect(&settings.server, cli.replay.as_deref(), replay_delay)?;
            headless::ask(&settings, backend, args).await
        }
        Some(Command::Preset(command)) => {
            logging::init_headless(&settings.logging);
            headless::preset(&settings, &cli.workspace, command).await
        }
        None => {
            run_tui(&cli.workspace, settings, cli.replay.as_deref(), replay_delay).await
        }
    }
}

async fn run_tui(
    workspace_root: &Path,
    settings: AppSettings,
    replay: Option<&Path>,
    replay_delay: Duration,
) -> Result<()> {
    logging::init_tui(workspace_root, &settings.logging)?;
    info!("Sleuth starting in {}", workspace_root.display());

    let backend = backend::connect(&settings.server, replay, replay_delay)?;
    let prompt_api = match PromptApi::new(&settings.server) {
        Ok(api) => Some(api),
        Err(err) => {
            warn!("Configuration API unavailable: {:#}", err);
            None
        }
    };
    let mut app = App::new(workspace_root.to_path_buf(), settings, backend, prompt_api);
    app.load_remote_config().await;

    let mut terminal = init().context("無法初始化終端機")?;
    let outcome = event_loop(&mut terminal, &mut app).await;
    restore().context("無法還原終端機")?;
    info!("Sleuth exiting");
    outcome
}

async fn event_loop(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut stream = EventStream::new();
    let mut interval = tokio::time::interval(app.tick_rate);

    while !app.should_quit {
        terminal.draw(|frame| render(frame, app))?;

        let event = tokio::select! {
            _ = interval.tick() => Event::Tick,
            maybe_event = stream.next() => {
                match maybe_event {
                    Some(Ok(CrosstermEvent::Key(key))) => Event::Key(key),
                    Some(Ok(CrosstermEvent::Mouse(mouse))) => Event::Mouse(mouse),
                    Some(Ok(CrosstermEvent::Resize(_, _))) => Event::Resize,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return Err(err).context("讀取終端機事件失敗"),
                    None => break,
                }
            }
        };
        app.handle_event(event).await;
    }
    Ok(())
}
