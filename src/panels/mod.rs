/// `conversation` 模組：對話列表的選取狀態與時間軸來源。
pub mod conversation;
