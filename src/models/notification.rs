use super::order::{OrderId, OrderPayload};
use serde::{Deserialize, Serialize};

/// 实时通道状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

/// 订阅收到的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Inserted(OrderId),
    Status(ChannelStatus),
}

/// 宿主界面读取的通知状态
#[derive(Debug, Clone, Serialize)]
pub struct NotificationSnapshot {
    pub is_visible: bool,
    pub order_data: Option<OrderPayload>,
    pub polling_enabled: bool,
    pub can_confirm: bool,
}

/// 推送给 SSE 客户端的事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenterEvent {
    Shown { order: OrderPayload },
    Dismissed { order_id: Option<OrderId> },
    Confirmed { order_id: OrderId },
    ConfirmFailed { order_id: OrderId, message: String },
    PollingToggled { enabled: bool },
}

impl PresenterEvent {
    /// SSE event 字段
    pub fn kind(&self) -> &'static str {
        match self {
            PresenterEvent::Shown { .. } => "shown",
            PresenterEvent::Dismissed { .. } => "dismissed",
            PresenterEvent::Confirmed { .. } => "confirmed",
            PresenterEvent::ConfirmFailed { .. } => "confirm_failed",
            PresenterEvent::PollingToggled { .. } => "polling_toggled",
        }
    }
}
