//! 研究流程的核心邏輯。
//!
//! 此模組描述前端與遠端研究代理之間的資料流：模式選擇、參數解析、
//! 串流事件分類，以及提交流程的狀態機。這裡的每個元件都不做 I/O，
//! 傳輸層位於 `crate::backend`。

/// `mode` 模組：研究模式、努力程度與代理流程的靜態登錄表。
pub mod mode;

/// `params` 模組：將 (模式, 努力程度, 流程) 轉換成實際請求參數。
pub mod params;

/// `classify` 模組：把串流回來的事件信封轉換成時間軸條目。
pub mod classify;

/// `message` 模組：對話訊息與送出給代理的串流請求格式。
pub mod message;

/// `controller` 模組：提交流程的狀態機，擁有時間軸與終止旗標。
pub mod controller;

pub use classify::{Classified, StageKey, TimelineEvent, classify};
pub use controller::{Phase, ResearchSelection, SubmissionController, SubmitError};
pub use message::{ChatMessage, Role, StreamRequest};
pub use mode::{EffortLevel, FlowType, SearchMode};
pub use params::{ResolvedParameters, resolve};
