use crossterm::event::{KeyEvent, MouseEvent};

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A tick event, sent at a regular interval. Drains backend events.
    Tick,
    /// A key press event.
    Key(KeyEvent),
    /// A mouse event; only the wheel is used.
    Mouse(MouseEvent),
    /// The terminal was resized.
    Resize,
}
