use crate::research::{ChatMessage, Role, SubmissionController, TimelineEvent};

/// 時間軸面板目前顯示的內容來源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineSource {
    /// 進行中（或最近一次）研究的即時時間軸。
    Live,
    /// 已完成回答所封存的時間軸。
    Archived,
}

/// 時間軸面板要繪製的資料。
pub struct TimelineView<'a> {
    pub source: TimelineSource,
    pub events: &'a [TimelineEvent],
}

/// 對話面板的選取狀態。
///
/// 沒有選取時跟隨最新訊息；選到一則已封存的助理回答時，
/// 時間軸面板改為顯示該回答當時的研究過程。
#[derive(Debug, Default)]
pub struct ConversationPanel {
    selected: Option<usize>,
}

impl ConversationPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 回到跟隨最新訊息的狀態。
    pub fn follow_latest(&mut self) {
        self.selected = None;
    }

    pub fn is_following(&self) -> bool {
        self.selected.is_none()
    }

    /// 依偏移量移動選取位置；移過最後一則時恢復跟隨。
    pub fn move_selection(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected = None;
            return;
        }
        let last = len as isize - 1;
        let current = self.selected.map(|idx| idx as isize).unwrap_or(last + 1);
        let next = current + delta;
        self.selected = if next > last {
            None
        } else {
            Some(next.max(0) as usize)
        };
    }

    /// 實際用於繪製的選取索引。
    pub fn selected_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.selected.unwrap_or(len - 1).min(len - 1))
    }

    pub fn selected_message<'a>(
        &self,
        messages: &'a [ChatMessage],
    ) -> Option<&'a ChatMessage> {
        self.selected.and_then(|idx| messages.get(idx))
    }

    /// Archived timeline of the selected answer, otherwise the live one.
    pub fn timeline<'a>(&self, controller: &'a SubmissionController) -> TimelineView<'a> {
        let archived = self
            .selected_message(controller.messages())
            .filter(|message| message.role == Role::Assistant)
            .and_then(|message| controller.activities_for(&message.id));
        match archived {
            Some(events) => TimelineView {
                source: TimelineSource::Archived,
                events,
            },
            None => TimelineView {
                source: TimelineSource::Live,
                events: controller.timeline(),
            },
        }
    }
}
