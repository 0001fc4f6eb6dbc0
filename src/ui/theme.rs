use ratatui::style::Color;

pub const BG_PRIMARY: Color = Color::Rgb(0, 0, 0);
pub const BG_PANEL: Color = Color::Rgb(12, 12, 12);
pub const FG_PRIMARY: Color = Color::Rgb(190, 190, 190);
pub const FG_DIM: Color = Color::Rgb(128, 128, 128);

pub const BAR_BG: Color = Color::Rgb(23, 52, 127);
pub const BAR_TEXT: Color = Color::Rgb(235, 240, 255);
pub const BAR_HIGHLIGHT_BG: Color = Color::Rgb(73, 102, 177);

pub const MENU_BG: Color = Color::Rgb(79, 79, 79);
pub const MENU_BORDER: Color = Color::Rgb(208, 208, 208);
pub const MENU_HIGHLIGHT_BG: Color = Color::Rgb(220, 220, 220);
pub const MENU_HIGHLIGHT_TEXT: Color = Color::Rgb(30, 30, 30);

pub const BORDER_IDLE: Color = Color::Rgb(61, 120, 120);
pub const BORDER_FOCUS: Color = Color::Rgb(187, 94, 0);
pub const SELECTION_BG: Color = Color::Rgb(142, 142, 142);
pub const SELECTION_FG: Color = Color::Rgb(255, 255, 255);

pub const USER_ACCENT: Color = Color::Cyan;
pub const ASSISTANT_ACCENT: Color = Color::Rgb(120, 200, 120);
pub const STAGE_ACCENT: Color = Color::Rgb(120, 160, 255);
pub const ERROR_FG: Color = Color::LightRed;
pub const ERROR_BANNER_BG: Color = Color::Rgb(110, 20, 20);
pub const INFO_BANNER_BG: Color = Color::Rgb(20, 80, 40);
