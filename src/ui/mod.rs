use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, BannerKind, InputPromptState, OverlayState, SelectorState};
use crate::panels::conversation::TimelineSource;
use crate::research::mode::MODE_PROFILES;
use crate::research::{Phase, Role};

mod theme;
use theme::*;

const MIN_WIDTH: u16 = 60;
const MIN_HEIGHT: u16 = 16;

pub fn render(f: &mut Frame<'_>, app: &App) {
    let size = f.size();
    if size.width < MIN_WIDTH || size.height < MIN_HEIGHT {
        let block = Paragraph::new("終端機視窗過小，請調整至至少 60x16。")
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .title("Sleuth")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(FG_PRIMARY).bg(MENU_BG)),
            )
            .style(Style::default().fg(FG_PRIMARY).bg(BG_PRIMARY));
        f.render_widget(block, size);
        return;
    }

    let base = Block::default().style(Style::default().bg(BG_PRIMARY));
    f.render_widget(base, size);

    if let Phase::Failed { reason } = app.controller.phase() {
        render_failure(f, reason, size);
        return;
    }

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(size);
    let header_area = vertical[0];
    let body = vertical[1];
    let input_area = vertical[2];
    let status_area = vertical[3];

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(body);

    render_header(f, app, header_area);
    render_conversation(f, app, columns[0]);
    render_timeline(f, app, columns[1]);
    render_input(f, app, input_area);
    render_status_bar(f, app, status_area);

    if let Some(banner) = app.banner.as_ref() {
        let area = Rect {
            height: 1,
            ..body
        };
        let bg = match banner.kind {
            BannerKind::Info => INFO_BANNER_BG,
            BannerKind::Error => ERROR_BANNER_BG,
        };
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(format!(" {}", banner.message))
                .style(Style::default().fg(Color::White).bg(bg)),
            area,
        );
    }

    if let Some(overlay) = app.overlay.as_ref() {
        render_overlay(f, app, overlay);
    }
}

/// One line of selectors: `F2 Mode │ F3 Effort │ F4 Flow │ F5 Model`.
fn render_header(f: &mut Frame<'_>, app: &App, area: Rect) {
    let locked = app.controller.is_streaming();
    let value_style = if locked {
        Style::default().fg(FG_DIM).bg(BAR_BG)
    } else {
        Style::default()
            .fg(BAR_TEXT)
            .bg(BAR_HIGHLIGHT_BG)
            .add_modifier(Modifier::BOLD)
    };
    let key_style = Style::default().fg(BAR_TEXT).bg(BAR_BG);
    let selection = &app.selection;
    let effort = if selection.search_mode.uses_effort() {
        selection.effort.label().to_string()
    } else {
        String::from("-")
    };
    let segments = [
        ("F2 Mode", selection.search_mode.label().to_string()),
        ("F3 Effort", effort),
        ("F4 Flow", app.flow_label(selection.flow).to_string()),
        ("F5 Model", selection.reasoning_model.clone()),
    ];

    let mut spans = vec![Span::styled(
        " Sleuth ",
        Style::default()
            .fg(Color::Black)
            .bg(BORDER_FOCUS)
            .add_modifier(Modifier::BOLD),
    )];
    for (key, value) in segments {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", value), value_style));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BAR_BG)),
        area,
    );
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(BORDER_FOCUS).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(BORDER_IDLE)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Span::styled(title, Style::default().fg(FG_PRIMARY)))
        .style(Style::default().bg(BG_PANEL))
}

fn render_conversation(f: &mut Frame<'_>, app: &App, area: Rect) {
    let messages = app.controller.messages();
    let block = panel_block(String::from("對話"), !app.conversation.is_following());
    if messages.is_empty() {
        render_welcome(f, block, area);
        return;
    }

    let wrap_width = block.inner(area).width.max(1) as usize;
    let mut items: Vec<ListItem> = messages
        .iter()
        .map(|message| {
            let mut lines = Vec::new();
            match message.role {
                Role::User => lines.push(Line::from(Span::styled(
                    "你",
                    Style::default().fg(USER_ACCENT).add_modifier(Modifier::BOLD),
                ))),
                Role::Assistant => {
                    let mut header = vec![Span::styled(
                        "Sleuth",
                        Style::default()
                            .fg(ASSISTANT_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    )];
                    if let Some(events) = app.controller.activities_for(&message.id) {
                        header.push(Span::styled(
                            format!("  ({} 個研究步驟)", events.len()),
                            Style::default().fg(FG_DIM),
                        ));
                    }
                    lines.push(Line::from(header));
                }
            }
            for line in message.content.lines() {
                push_wrapped_line(&mut lines, line, Style::default().fg(FG_PRIMARY), wrap_width);
            }
            lines.push(Line::from(""));
            ListItem::new(lines)
        })
        .collect();

    let awaiting_answer = app.controller.is_streaming()
        && messages.last().map(|message| message.role) == Some(Role::User);
    if awaiting_answer {
        let elapsed = app.elapsed_secs().unwrap_or(0);
        items.push(ListItem::new(Line::from(Span::styled(
            format!("研究中… {}s", elapsed),
            Style::default().fg(FG_DIM).add_modifier(Modifier::ITALIC),
        ))));
    }

    let last = items.len().saturating_sub(1);
    let mut state = ListState::default();
    let mut list = List::new(items).block(block).style(Style::default().bg(BG_PANEL));
    if app.conversation.is_following() {
        state.select(Some(last));
    } else {
        state.select(app.conversation.selected_index(messages.len()));
        list = list.highlight_style(
            Style::default()
                .bg(SELECTION_BG)
                .fg(SELECTION_FG)
                .add_modifier(Modifier::BOLD),
        );
    }
    f.render_stateful_widget(list, area, &mut state);
}

/// Shown before the first question: what each research mode does.
fn render_welcome(f: &mut Frame<'_>, block: Block<'static>, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            "輸入研究問題後按 Enter。F2 切換研究模式。",
            Style::default().fg(FG_PRIMARY),
        )),
        Line::from(""),
    ];
    for profile in MODE_PROFILES.iter() {
        lines.push(Line::from(vec![
            Span::styled(
                profile.label,
                Style::default().fg(STAGE_ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  ~{}", profile.estimated_time),
                Style::default().fg(FG_DIM),
            ),
        ]));
        lines.push(Line::from(Span::styled(
            profile.summary,
            Style::default().fg(FG_PRIMARY),
        )));
        lines.push(Line::from(Span::styled(
            profile.features.join(" · "),
            Style::default().fg(FG_DIM),
        )));
        lines.push(Line::from(""));
    }
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_timeline(f: &mut Frame<'_>, app: &App, area: Rect) {
    let view = app.conversation.timeline(&app.controller);
    let title = match view.source {
        TimelineSource::Live => String::from("研究過程"),
        TimelineSource::Archived => String::from("研究過程（歷史紀錄）"),
    };
    let block = panel_block(title, false);
    let wrap_width = block.inner(area).width.saturating_sub(2).max(1) as usize;

    let mut items: Vec<ListItem> = view
        .events
        .iter()
        .map(|event| {
            let mut lines = vec![Line::from(vec![
                Span::styled("● ", Style::default().fg(STAGE_ACCENT)),
                Span::styled(
                    event.title.clone(),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ),
            ])];
            for segment in wrap_to_width(&event.data, wrap_width) {
                lines.push(Line::from(Span::styled(
                    format!("  {}", segment),
                    Style::default().fg(FG_DIM),
                )));
            }
            ListItem::new(lines)
        })
        .collect();

    let live_run = view.source == TimelineSource::Live && app.controller.is_streaming();
    if live_run {
        items.push(ListItem::new(Line::from(Span::styled(
            "○ 等待下一個階段…",
            Style::default().fg(FG_DIM).add_modifier(Modifier::ITALIC),
        ))));
    } else if items.is_empty() {
        items.push(ListItem::new(Line::from(Span::styled(
            "尚無研究活動",
            Style::default().fg(FG_DIM),
        ))));
    }

    let mut state = ListState::default();
    state.select(Some(items.len() - 1));
    let list = List::new(items).block(block).style(Style::default().bg(BG_PANEL));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_input(f: &mut Frame<'_>, app: &App, area: Rect) {
    let streaming = app.controller.is_streaming();
    let title = if streaming {
        "研究進行中… (Esc 取消)"
    } else {
        "輸入問題 (Enter 送出 / Shift+Enter 換行)"
    };
    let block = panel_block(title.to_string(), app.overlay.is_none() && !streaming);
    let inner = block.inner(area);

    let lines: Vec<Line> = if app.input.is_empty() {
        vec![Line::from(Span::styled(
            "想研究什麼？",
            Style::default().fg(FG_DIM),
        ))]
    } else {
        app.input
            .buffer()
            .split('\n')
            .map(|line| Line::from(Span::styled(line.to_string(), Style::default().fg(FG_PRIMARY))))
            .collect()
    };
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .style(Style::default().bg(BG_PANEL))
            .wrap(Wrap { trim: false }),
        area,
    );

    if app.overlay.is_none() {
        let width = inner.width.max(1) as usize;
        let (col, row) = app.input.cursor_display_position(width);
        f.set_cursor(
            inner.x.saturating_add(col.min(inner.width.saturating_sub(1))),
            inner.y.saturating_add(row.min(inner.height.saturating_sub(1))),
        );
    }
}

fn render_status_bar(f: &mut Frame<'_>, app: &App, area: Rect) {
    let phase = match app.controller.phase() {
        Phase::Idle => "IDLE",
        Phase::Streaming => "RUN",
        Phase::Failed { .. } => "FAIL",
    };
    let mut segments = vec![
        format!("[{}]", phase),
        format!("[PROMPTS:{}]", if app.prompts.is_dirty() { "*" } else { "OK" }),
        format!("[{}]", app.backend.name()),
    ];
    if let Some(run_id) = app.run_id.as_ref() {
        segments.push(format!("[RUN:{}]", run_id));
    }
    segments.push(app.status_message.clone());

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(segments.join(" ")).style(Style::default().fg(BAR_TEXT).bg(BAR_BG)),
        area,
    );
}

/// Full-screen error shown after a transport failure.
fn render_failure(f: &mut Frame<'_>, reason: &str, size: Rect) {
    let area = centered_rect(70, 50, size);
    let block = Block::default()
        .title(Span::styled(
            "研究失敗",
            Style::default().fg(ERROR_FG).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ERROR_FG))
        .style(Style::default().bg(BG_PANEL));
    let lines = vec![
        Line::from(Span::styled(reason.to_string(), Style::default().fg(FG_PRIMARY))),
        Line::from(""),
        Line::from(Span::styled(
            "Ctrl+R / Enter 重新載入 · Ctrl+Q 離開",
            Style::default().fg(FG_DIM),
        )),
    ];
    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .alignment(Alignment::Center),
        area,
    );
}

fn render_overlay(f: &mut Frame<'_>, app: &App, overlay: &OverlayState) {
    match overlay {
        OverlayState::Selector(state) => render_selector_overlay(f, state),
        OverlayState::InputPrompt(state) => render_input_prompt_overlay(f, app, state),
        OverlayState::Help => render_help_overlay(f),
    }
}

fn overlay_block(title: &str) -> Block<'_> {
    Block::default()
        .title(Span::styled(
            title,
            Style::default().fg(BAR_TEXT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MENU_BORDER))
        .style(Style::default().bg(MENU_BG))
}

fn render_selector_overlay(f: &mut Frame<'_>, state: &SelectorState) {
    let area = centered_rect(60, 60, f.size());
    f.render_widget(Clear, area);
    let block = overlay_block(state.target.title());
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(inner);

    let items: Vec<ListItem> = state
        .options
        .iter()
        .map(|option| {
            let mut lines = vec![Line::from(Span::styled(
                option.label.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            lines.extend(
                option
                    .detail
                    .iter()
                    .map(|detail| Line::from(Span::raw(format!("  {}", detail)))),
            );
            ListItem::new(lines)
        })
        .collect();

    let mut list_state = ListState::default();
    if !state.options.is_empty() {
        list_state.select(Some(state.selected.min(state.options.len() - 1)));
    }
    let list = List::new(items)
        .style(Style::default().fg(FG_PRIMARY).bg(MENU_BG))
        .highlight_style(Style::default().bg(MENU_HIGHLIGHT_BG).fg(MENU_HIGHLIGHT_TEXT));
    f.render_stateful_widget(list, chunks[0], &mut list_state);

    f.render_widget(
        Paragraph::new("上/下鍵選擇，Enter 套用，Esc 取消")
            .style(Style::default().fg(FG_DIM).bg(MENU_BG))
            .alignment(Alignment::Center),
        chunks[1],
    );
}

fn render_input_prompt_overlay(f: &mut Frame<'_>, app: &App, state: &InputPromptState) {
    let area = centered_rect(70, 30, f.size());
    f.render_widget(Clear, area);
    let block = overlay_block(&state.title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(inner);

    f.render_widget(
        Paragraph::new(state.placeholder.as_str()).style(Style::default().fg(FG_DIM).bg(MENU_BG)),
        chunks[0],
    );

    let mut input_spans = vec![Span::styled("> ", Style::default().fg(FG_PRIMARY))];
    if state.value.is_empty() {
        input_spans.push(Span::styled("(尚未輸入)", Style::default().fg(FG_DIM)));
    } else {
        input_spans.push(Span::styled(
            state.value.as_str(),
            Style::default().fg(Color::White),
        ));
    }
    input_spans.push(Span::styled(" ▍", Style::default().fg(BORDER_FOCUS)));
    f.render_widget(
        Paragraph::new(Line::from(input_spans)).style(Style::default().bg(MENU_BG)),
        chunks[1],
    );

    f.render_widget(
        Paragraph::new(format!("工作目錄：{}", app.workspace_root.display()))
            .style(Style::default().fg(FG_DIM).bg(MENU_BG)),
        chunks[2],
    );

    let message = match state.error.as_ref() {
        Some(error) => Paragraph::new(error.as_str())
            .style(Style::default().fg(ERROR_FG).bg(MENU_BG))
            .wrap(Wrap { trim: true }),
        None => Paragraph::new("Enter 確認 · Ctrl+U 清除 · Esc 取消")
            .style(Style::default().fg(FG_DIM).bg(MENU_BG)),
    };
    f.render_widget(message, chunks[3]);
}

const HELP_LINES: [(&str, &str); 15] = [
    ("Enter", "送出問題"),
    ("Shift+Enter", "換行"),
    ("Esc", "取消進行中的研究 / 清除輸入"),
    ("F2 / F3 / F4 / F5", "研究模式 / 努力程度 / 代理流程 / 模型"),
    ("Shift+F2 … Shift+F5", "直接切換到下一個選項"),
    ("Tab", "切換研究模式"),
    ("↑ / ↓", "問題歷史"),
    ("Ctrl+↑ / Ctrl+↓", "選擇對話訊息，檢視當時的研究過程"),
    ("Ctrl+O", "匯入提示詞預設檔"),
    ("Ctrl+E", "匯出全部流程的提示詞"),
    ("Ctrl+F", "匯出目前流程的提示詞"),
    ("Ctrl+S", "將提示詞存回伺服器"),
    ("Ctrl+D", "把目前選項存為預設值"),
    ("Ctrl+R", "重新載入"),
    ("Ctrl+Q", "離開"),
];

fn render_help_overlay(f: &mut Frame<'_>) {
    let area = centered_rect(60, 70, f.size());
    f.render_widget(Clear, area);
    let lines: Vec<Line> = HELP_LINES
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(
                    format!("{:<20}", key),
                    Style::default().fg(BAR_TEXT).add_modifier(Modifier::BOLD),
                ),
                Span::styled(*action, Style::default().fg(FG_PRIMARY)),
            ])
        })
        .collect();
    f.render_widget(
        Paragraph::new(lines).block(overlay_block("快捷鍵")),
        area,
    );
}

fn push_wrapped_line(lines: &mut Vec<Line>, text: &str, style: Style, width: usize) {
    for segment in wrap_to_width(text, width) {
        lines.push(Line::from(Span::styled(segment, style)));
    }
}

/// Hard-wraps by display width; wide characters count as two cells.
fn wrap_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.is_empty() {
        return vec![text.to_string()];
    }
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(1).max(1);
        if current_width + ch_width > width && !current.is_empty() {
            result.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(ch);
        current_width += ch_width;
    }
    result.push(current);
    result
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1])[1]
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    use super::*;
    use crate::backend::replay::ReplayBackend;
    use crate::config::AppSettings;

    fn app() -> App {
        App::new(
            std::env::temp_dir(),
            AppSettings::default(),
            Box::new(ReplayBackend::new("/nonexistent.ndjson", Duration::ZERO)),
            None,
        )
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn wraps_wide_characters_by_cell_width() {
        assert_eq!(wrap_to_width("研究abc", 4), vec!["研究", "abc"]);
        assert_eq!(wrap_to_width("", 4), vec![String::new()]);
    }

    #[test]
    fn welcome_screen_lists_modes() {
        let screen = screen(&app());
        assert!(screen.contains("Deep Research"));
        assert!(screen.contains("F2 Mode"));
    }

    #[test]
    fn timeline_shows_classified_stages() {
        let mut app = app();
        app.controller
            .submit("question", &app.selection.clone())
            .unwrap();
        app.controller
            .on_update(&json!({"generate_query": {"search_query": ["alpha", "beta"]}}));
        let screen = screen(&app);
        assert!(screen.contains("Generating Search Queries"));
        assert!(screen.contains("alpha, beta"));
    }

    #[test]
    fn failure_replaces_the_whole_screen() {
        let mut app = app();
        app.controller
            .submit("question", &app.selection.clone())
            .unwrap();
        app.controller.on_error("connection refused");
        let screen = screen(&app);
        assert!(screen.contains("connection refused"));
        assert!(!screen.contains("F2 Mode"));
    }
}
