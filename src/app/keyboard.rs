use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

use super::{App, CommandAction, SelectorTarget};
use crate::event::Event;

impl App {
    pub async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick => self.on_tick(),
            Event::Key(key) => self.handle_key(key).await,
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize => {}
        }
    }

    /// The main entry point for handling keyboard events.
    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        // The error screen only offers reload and quit.
        if self.is_failed() {
            if let Some(action) = failed_shortcut(key) {
                self.execute_action(action).await;
            }
            return;
        }

        if self.overlay.is_some() {
            self.handle_overlay_key(key).await;
            return;
        }

        if let Some(action) = global_shortcut(key) {
            self.execute_action(action).await;
            return;
        }

        self.handle_composer_key(key).await;
    }

    async fn handle_composer_key(&mut self, key: KeyEvent) {
        let modifiers = key.modifiers;
        match key.code {
            KeyCode::Enter if modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) => {
                self.input.insert_newline();
            }
            KeyCode::Enter => self.execute_action(CommandAction::Submit).await,
            KeyCode::Esc if self.controller.is_streaming() => {
                self.execute_action(CommandAction::Cancel).await;
            }
            KeyCode::Esc => self.input.clear(),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            KeyCode::Up | KeyCode::Down if modifiers.contains(KeyModifiers::CONTROL) => {
                let delta = if key.code == KeyCode::Up { -1 } else { 1 };
                self.move_conversation_selection(delta);
            }
            KeyCode::Up => self.navigate_history(-1),
            KeyCode::Down => self.navigate_history(1),
            KeyCode::PageUp => self.move_conversation_selection(-5),
            KeyCode::PageDown => self.move_conversation_selection(5),
            KeyCode::Char(ch)
                if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.input.insert_char(ch);
            }
            _ => {}
        }
    }

    /// Up/Down walk the question history only while the composer is empty or
    /// already showing a history entry; otherwise they move through the conversation.
    fn navigate_history(&mut self, delta: isize) {
        let navigated = if delta < 0 {
            self.input.history_previous()
        } else {
            self.input.history_next()
        };
        if !navigated {
            self.move_conversation_selection(delta);
        }
    }

    fn move_conversation_selection(&mut self, delta: isize) {
        let len = self.controller.messages().len();
        self.conversation.move_selection(delta, len);
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.move_conversation_selection(-1),
            MouseEventKind::ScrollDown => self.move_conversation_selection(1),
            _ => {}
        }
    }
}

fn failed_shortcut(key: KeyEvent) -> Option<CommandAction> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('r'), m) if m.contains(KeyModifiers::CONTROL) => Some(CommandAction::Reload),
        (KeyCode::Char('q'), m) if m.contains(KeyModifiers::CONTROL) => Some(CommandAction::Quit),
        (KeyCode::Enter, _) => Some(CommandAction::Reload),
        _ => None,
    }
}

fn global_shortcut(key: KeyEvent) -> Option<CommandAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let action = match key.code {
        KeyCode::F(2) if shift => CommandAction::Cycle(SelectorTarget::Mode),
        KeyCode::F(3) if shift => CommandAction::Cycle(SelectorTarget::Effort),
        KeyCode::F(4) if shift => CommandAction::Cycle(SelectorTarget::Flow),
        KeyCode::F(5) if shift => CommandAction::Cycle(SelectorTarget::Model),
        KeyCode::Tab => CommandAction::Cycle(SelectorTarget::Mode),
        KeyCode::F(1) => CommandAction::ToggleHelp,
        KeyCode::F(2) => CommandAction::Pick(SelectorTarget::Mode),
        KeyCode::F(3) => CommandAction::Pick(SelectorTarget::Effort),
        KeyCode::F(4) => CommandAction::Pick(SelectorTarget::Flow),
        KeyCode::F(5) => CommandAction::Pick(SelectorTarget::Model),
        KeyCode::Char('q') if ctrl => CommandAction::Quit,
        KeyCode::Char('c') if ctrl => CommandAction::Quit,
        KeyCode::Char('r') if ctrl => CommandAction::Reload,
        KeyCode::Char('o') if ctrl => CommandAction::ImportPreset,
        KeyCode::Char('e') if ctrl => CommandAction::ExportAll,
        KeyCode::Char('f') if ctrl => CommandAction::ExportCurrentFlow,
        KeyCode::Char('s') if ctrl => CommandAction::SavePrompts,
        KeyCode::Char('d') if ctrl => CommandAction::SaveDefaults,
        _ => return None,
    };
    Some(action)
}
