//! Defines the core state structures for the application.
//!
//! `App` owns the submission controller and the selected research options; the
//! UI reads it but never mutates it. Overlays (pickers, path prompts, help) and
//! the transient banner live here too.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::backend::ResearchBackend;
use crate::backend::prompts::PromptApi;
use crate::config::AppSettings;
use crate::panels::conversation::ConversationPanel;
use crate::preset::{FlowKind, PromptWorkspace};
use crate::research::{ResearchSelection, SubmissionController};

/// How long a banner stays on screen.
pub const BANNER_TTL: Duration = Duration::from_secs(5);

/// The main application state.
pub struct App {
    // --- Core State ---
    pub should_quit: bool,
    pub workspace_root: PathBuf,
    pub settings: AppSettings,
    /// Options the next submission will use.
    pub selection: ResearchSelection,
    pub controller: SubmissionController,
    pub conversation: ConversationPanel,
    pub input: Composer,
    /// Local editable copy of the server's prompts.
    pub prompts: PromptWorkspace,
    /// Display names of the flows, keyed by flow key (`single-agent`, ...).
    pub flow_labels: BTreeMap<String, String>,

    // --- UI ---
    pub status_message: String,
    pub overlay: Option<OverlayState>,
    pub banner: Option<Banner>,

    // --- Internal State ---
    pub(crate) backend: Box<dyn ResearchBackend>,
    pub(crate) prompt_api: Option<PromptApi>,
    /// Server-assigned id of the run in flight, if it sent one.
    pub(crate) run_id: Option<String>,
    pub(crate) run_started: Option<Instant>,
    pub(crate) tick_rate: Duration,
}

/// Transient notice shown above the conversation.
#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    pub kind: BannerKind,
    pub shown_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Info,
    Error,
}

impl Banner {
    pub fn new(kind: BannerKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            shown_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= BANNER_TTL
    }
}

/// Single-line text input with history, used for the research question.
#[derive(Clone, Default)]
pub struct Composer {
    buffer: String,
    /// Byte offset into `buffer`, always on a char boundary.
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn insert_char(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        self.history_index = None;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        if let Some((idx, _)) = self.buffer[..self.cursor].char_indices().next_back() {
            self.buffer.drain(idx..self.cursor);
            self.cursor = idx;
            self.history_index = None;
        }
    }

    pub fn delete(&mut self) {
        if let Some(ch) = self.buffer[self.cursor..].chars().next() {
            self.buffer.drain(self.cursor..self.cursor + ch.len_utf8());
            self.history_index = None;
        }
    }

    pub fn move_left(&mut self) {
        if let Some((idx, _)) = self.buffer[..self.cursor].char_indices().next_back() {
            self.cursor = idx;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(ch) = self.buffer[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = self.buffer[..self.cursor]
            .rfind('\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);
    }

    pub fn move_end(&mut self) {
        self.cursor = self.buffer[self.cursor..]
            .find('\n')
            .map(|pos| self.cursor + pos)
            .unwrap_or(self.buffer.len());
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.history_index = None;
    }

    /// Puts text back into an empty composer, e.g. after a refused submission.
    pub fn restore(&mut self, text: String) {
        self.cursor = text.len();
        self.buffer = text;
        self.history_index = None;
    }

    /// Takes the buffer and records it in history.
    pub fn take(&mut self) -> String {
        let content = std::mem::take(&mut self.buffer);
        if !content.trim().is_empty() && self.history.last() != Some(&content) {
            self.history.push(content.clone());
        }
        self.cursor = 0;
        self.history_index = None;
        content
    }

    pub fn history_previous(&mut self) -> bool {
        let target = match self.history_index {
            Some(idx) => idx.saturating_sub(1),
            None if self.history.is_empty() => return false,
            None => self.history.len() - 1,
        };
        self.load_history(target)
    }

    pub fn history_next(&mut self) -> bool {
        match self.history_index {
            Some(idx) if idx + 1 < self.history.len() => self.load_history(idx + 1),
            Some(_) => {
                self.clear();
                true
            }
            None => false,
        }
    }

    fn load_history(&mut self, index: usize) -> bool {
        let Some(entry) = self.history.get(index).cloned() else {
            return false;
        };
        self.cursor = entry.len();
        self.buffer = entry;
        self.history_index = Some(index);
        true
    }

    /// (col, row) of the cursor when the buffer is wrapped at `width` cells.
    pub fn cursor_display_position(&self, width: usize) -> (u16, u16) {
        if width == 0 {
            return (0, 0);
        }
        let mut col = 0usize;
        let mut row = 0usize;
        for ch in self.buffer[..self.cursor].chars() {
            if ch == '\n' {
                row += 1;
                col = 0;
                continue;
            }
            let char_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(1).max(1);
            if col + char_width > width {
                row += 1;
                col = 0;
            }
            col += char_width;
        }
        if col >= width {
            row += 1;
            col = 0;
        }
        (col as u16, row as u16)
    }
}

/// Which research option a picker edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorTarget {
    Mode,
    Effort,
    Flow,
    Model,
}

impl SelectorTarget {
    pub fn title(self) -> &'static str {
        match self {
            SelectorTarget::Mode => "Research Mode",
            SelectorTarget::Effort => "Effort Level",
            SelectorTarget::Flow => "Agent Flow",
            SelectorTarget::Model => "Reasoning Model",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectorOption {
    /// Value applied on confirm, e.g. `deep` or a model name.
    pub value: String,
    pub label: String,
    pub detail: Vec<String>,
}

/// Picker overlay over a fixed list of options.
#[derive(Debug, Clone)]
pub struct SelectorState {
    pub target: SelectorTarget,
    pub options: Vec<SelectorOption>,
    pub selected: usize,
}

impl SelectorState {
    pub fn new(target: SelectorTarget, options: Vec<SelectorOption>, current: &str) -> Self {
        let selected = options
            .iter()
            .position(|option| option.value == current)
            .unwrap_or(0);
        Self {
            target,
            options,
            selected,
        }
    }

    /// Wraps around at both ends.
    pub fn move_selection(&mut self, delta: isize) {
        if self.options.is_empty() {
            self.selected = 0;
            return;
        }
        let len = self.options.len() as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
    }

    pub fn selected_option(&self) -> Option<&SelectorOption> {
        self.options.get(self.selected)
    }
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Selector(SelectorState),
    InputPrompt(InputPromptState),
    Help,
}

/// Actions that need a path from the input prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInputAction {
    ImportPreset,
    ExportAll,
    ExportFlow(FlowKind),
}

#[derive(Debug, Clone)]
pub struct InputPromptState {
    pub title: String,
    pub value: String,
    pub placeholder: String,
    pub action: PendingInputAction,
    /// Shown under the input; the prompt stays open so another path can be tried.
    pub error: Option<String>,
}

impl InputPromptState {
    pub fn new(
        title: impl Into<String>,
        placeholder: impl Into<String>,
        action: PendingInputAction,
        initial: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            value: initial.unwrap_or_default(),
            placeholder: placeholder.into(),
            action,
            error: None,
        }
    }
}
