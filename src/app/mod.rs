//! `app` 模組是 Sleuth 終端介面的核心。
//!
//! 它持有整個應用程式的狀態（提交控制器、目前的研究選項、提示詞編輯區），
//! 處理鍵盤與滑鼠輸入，並在每次 tick 時把後端事件交給控制器。

/// `actions` 模組：所有快捷鍵最終都轉成 `CommandAction` 在這裡執行。
mod actions;
/// `init` 模組：`App` 的建立與遠端設定載入。
mod init;
/// `keyboard` 模組：鍵盤與滑鼠事件的路由。
mod keyboard;
/// `overlays` 模組：選擇器、路徑輸入框與說明視窗。
mod overlays;
/// `presets` 模組：提示詞預設檔的匯入、匯出與儲存。
mod presets;
/// `research` 模組：提交、取消、重新載入與串流事件處理。
mod research;
/// `state` 模組：定義 `App` 以及所有 UI 狀態類型。
mod state;
/// `tick` 模組：定時輪詢後端事件。
mod tick;

pub use actions::CommandAction;
pub use state::{
    App, Banner, BannerKind, Composer, InputPromptState, OverlayState,
    PendingInputAction, SelectorOption, SelectorState, SelectorTarget,
};
