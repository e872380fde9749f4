use crate::audio::AlertGenerator;
use crate::error::ConfirmError;
use crate::models::{NotificationSnapshot, OrderId, OrderPayload, PresenterEvent};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 64;

/// 外部提供的"确认订单"动作
#[async_trait]
pub trait ConfirmAction: Send + Sync {
    async fn confirm(&self, order_id: OrderId) -> Result<(), ConfirmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterState {
    Idle,
    Visible,
}

/// 通知状态 (进程内, 不持久化)
#[derive(Debug, Default)]
struct NotificationState {
    last_seen: Option<OrderId>,
    current: Option<OrderPayload>,
}

/// 新订单弹窗状态机: Idle → Visible → Idle
///
/// 只管理音频和展示状态; 确认动作交给外部的 `ConfirmAction`。
pub struct NotificationPresenter {
    state: Mutex<NotificationState>,
    alert: AlertGenerator,
    confirm: Option<Arc<dyn ConfirmAction>>,
    polling_enabled: watch::Sender<bool>,
    events: broadcast::Sender<PresenterEvent>,
}

impl NotificationPresenter {
    pub fn new(
        alert: AlertGenerator,
        confirm: Option<Arc<dyn ConfirmAction>>,
        polling_enabled: bool,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (polling_enabled, _) = watch::channel(polling_enabled);
        Self {
            state: Mutex::new(NotificationState::default()),
            alert,
            confirm,
            polling_enabled,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, NotificationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PresenterState {
        if self.lock().current.is_some() {
            PresenterState::Visible
        } else {
            PresenterState::Idle
        }
    }

    pub fn current(&self) -> Option<OrderPayload> {
        self.lock().current.clone()
    }

    /// 最近一次展示的订单 id
    pub fn last_seen(&self) -> Option<OrderId> {
        self.lock().last_seen
    }

    pub fn can_confirm(&self) -> bool {
        self.confirm.is_some()
    }

    pub fn alert(&self) -> &AlertGenerator {
        &self.alert
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        let state = self.lock();
        NotificationSnapshot {
            is_visible: state.current.is_some(),
            order_data: state.current.clone(),
            polling_enabled: *self.polling_enabled.borrow(),
            can_confirm: self.confirm.is_some(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenterEvent> {
        self.events.subscribe()
    }

    /// 展示新订单并开始提示音; 已在展示时直接替换为新订单
    pub async fn show(&self, order: OrderPayload) {
        // 与 dismiss 共用状态锁, 关闭弹窗时一定能取消这一轮提示音
        let cycle = {
            let mut state = self.lock();
            state.last_seen = Some(order.id);
            state.current = Some(order.clone());
            self.alert.arm_alert()
        };
        tracing::info!(
            "新订单 {} ({}), 客户: {}, 金额: {}",
            order.order_number, order.id, order.customer_name, order.total_amount
        );
        let _ = self.events.send(PresenterEvent::Shown { order });
        if let Some(cycle) = cycle {
            self.alert.start_alert(cycle).await;
        }
    }

    /// 关闭弹窗; 无论当前是否有订单都会停止提示音
    pub fn dismiss(&self) {
        let order_id = {
            let mut state = self.lock();
            self.alert.stop_alert();
            state.current.take().map(|o| o.id)
        };
        if order_id.is_some() {
            tracing::info!("Notification for order {:?} dismissed", order_id);
        }
        let _ = self.events.send(PresenterEvent::Dismissed { order_id });
    }

    /// 确认当前订单; 失败时保持 Visible, 错误返回给界面让用户重试
    pub async fn confirm(&self) -> Result<OrderId, ConfirmError> {
        let Some(action) = &self.confirm else {
            return Err(ConfirmError::NotConfigured);
        };
        let Some(order_id) = self.lock().current.as_ref().map(|o| o.id) else {
            return Err(ConfirmError::NothingShown);
        };

        match action.confirm(order_id).await {
            Ok(()) => {
                {
                    // 确认期间展示了新订单时, 新订单和它的提示音保持不变
                    let mut state = self.lock();
                    if state.current.as_ref().map(|o| o.id) == Some(order_id) {
                        state.current = None;
                        self.alert.stop_alert();
                    }
                }
                tracing::info!("Order {} confirmed", order_id);
                let _ = self.events.send(PresenterEvent::Confirmed { order_id });
                Ok(order_id)
            }
            Err(e) => {
                tracing::warn!("Order {} confirm failed: {}", order_id, e);
                let _ = self.events.send(PresenterEvent::ConfirmFailed {
                    order_id,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn polling_enabled(&self) -> bool {
        *self.polling_enabled.borrow()
    }

    /// 轮询检测器监听这个开关
    pub fn watch_polling(&self) -> watch::Receiver<bool> {
        self.polling_enabled.subscribe()
    }

    pub fn set_polling_enabled(&self, enabled: bool) {
        let changed = self.polling_enabled.send_if_modified(|current| {
            if *current == enabled {
                return false;
            }
            *current = enabled;
            true
        });
        if changed {
            tracing::info!("Order polling {}", if enabled { "enabled" } else { "disabled" });
            let _ = self.events.send(PresenterEvent::PollingToggled { enabled });
        }
    }
}
