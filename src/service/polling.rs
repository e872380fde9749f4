use crate::audio::{Haptics, ORDER_VIBRATION_PATTERN};
use crate::db::OrderSource;
use crate::models::{OrderId, OrderPayload};
use crate::service::fetcher::OrderDetailFetcher;
use crate::service::presenter::NotificationPresenter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// 轮询模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// 每轮只看最新一单, 两轮之间的多笔订单合并为一次通知
    #[default]
    Newest,
    /// 每轮取出基线之后的全部订单, 逐单通知
    CatchUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSettings {
    pub interval: Duration,
    pub mode: PollMode,
    /// CatchUp 模式下每轮最多处理的订单数
    pub catch_up_limit: i64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            mode: PollMode::Newest,
            catch_up_limit: 20,
        }
    }
}

/// 一次启动周期内的轮询状态; 停用再启用时重置
#[derive(Debug, Default)]
struct PollState {
    baseline: Option<OrderId>,
    primed: bool,
}

/// 轮询变更检测 (实时通道不可用时使用)
pub struct PollingDetector {
    source: Arc<dyn OrderSource>,
    fetcher: Arc<OrderDetailFetcher>,
    presenter: Arc<NotificationPresenter>,
    haptics: Option<Arc<dyn Haptics>>,
    settings: PollingSettings,
}

impl PollingDetector {
    pub fn new(
        source: Arc<dyn OrderSource>,
        fetcher: Arc<OrderDetailFetcher>,
        presenter: Arc<NotificationPresenter>,
        haptics: Option<Arc<dyn Haptics>>,
        settings: PollingSettings,
    ) -> Self {
        Self {
            source,
            fetcher,
            presenter,
            haptics,
            settings,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut enabled = self.presenter.watch_polling();

        loop {
            // 停用期间不查库
            while !*enabled.borrow_and_update() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = enabled.changed() => if changed.is_err() { return },
                }
            }

            tracing::info!(
                "Order polling started, every {:?} ({:?})",
                self.settings.interval, self.settings.mode
            );
            let mut state = PollState::default();
            let mut ticker = tokio::time::interval(self.settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = enabled.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if !*enabled.borrow_and_update() {
                            tracing::info!("Order polling stopped");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.poll_once(&mut state, &cancel).await;
                        if cancel.is_cancelled() {
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn poll_once(&self, state: &mut PollState, cancel: &CancellationToken) {
        if !state.primed {
            match self.source.latest_order().await {
                Ok(latest) => {
                    state.baseline = latest.map(|l| l.id);
                    state.primed = true;
                    tracing::debug!("Polling baseline adopted: {:?}", state.baseline);
                }
                Err(e) => tracing::warn!("Polling baseline query failed: {}", e),
            }
            return;
        }

        match self.settings.mode {
            PollMode::Newest => self.poll_newest(state, cancel).await,
            PollMode::CatchUp => self.poll_catch_up(state, cancel).await,
        }
    }

    async fn poll_newest(&self, state: &mut PollState, cancel: &CancellationToken) {
        let latest = match self.source.latest_order().await {
            Ok(Some(latest)) => latest,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Polling query failed: {}", e);
                return;
            }
        };
        if state.baseline == Some(latest.id) {
            return;
        }

        tracing::debug!("Newest order changed: {:?} -> {} ({})", state.baseline, latest.id, latest.created_at);
        match self.fetcher.fetch(latest.id).await {
            Ok(payload) if !cancel.is_cancelled() => {
                state.baseline = Some(latest.id);
                self.notify(payload).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("New order {} not shown: {}", latest.id, e),
        }
    }

    async fn poll_catch_up(&self, state: &mut PollState, cancel: &CancellationToken) {
        let after = state.baseline.unwrap_or(OrderId::MIN);
        let newer = match self.source.orders_after(after, self.settings.catch_up_limit).await {
            Ok(newer) => newer,
            Err(e) => {
                tracing::warn!("Polling query failed: {}", e);
                return;
            }
        };

        for order in newer {
            let payload = match self.fetcher.fetch(order.id).await {
                Ok(payload) => payload,
                Err(e) => {
                    // 保持顺序, 下一轮从这里重试
                    tracing::warn!("New order {} not shown: {}", order.id, e);
                    return;
                }
            };
            if cancel.is_cancelled() {
                return;
            }
            state.baseline = Some(state.baseline.map_or(order.id, |b| b.max(order.id)));
            self.notify(payload).await;
        }
    }

    async fn notify(&self, payload: OrderPayload) {
        self.presenter.show(payload).await;
        if let Some(haptics) = &self.haptics {
            haptics.vibrate(&ORDER_VIBRATION_PATTERN);
        }
    }
}
