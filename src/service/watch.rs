use crate::audio::Haptics;
use crate::db::{InsertFeed, OrderSource};
use crate::service::fetcher::OrderDetailFetcher;
use crate::service::polling::{PollingDetector, PollingSettings};
use crate::service::presenter::NotificationPresenter;
use crate::service::realtime::{RealtimeDetector, RealtimeExit, RealtimeSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 配置的检测方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchMode {
    #[default]
    Realtime,
    Polling,
}

/// 当前正在运行的检测器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveDetector {
    Starting,
    Realtime,
    Polling,
    Stopped,
}

/// 检测器依赖
pub struct WatchDeps {
    pub source: Arc<dyn OrderSource>,
    /// 为 None 时只能轮询
    pub feed: Option<Arc<dyn InsertFeed>>,
    pub presenter: Arc<NotificationPresenter>,
    pub haptics: Option<Arc<dyn Haptics>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchSettings {
    pub mode: WatchMode,
    pub realtime: RealtimeSettings,
    pub polling: PollingSettings,
}

/// 订单监听任务; 实时通道重连失败后自动切换为轮询
pub struct OrderWatch {
    cancel: CancellationToken,
    active: watch::Receiver<ActiveDetector>,
    task: Option<JoinHandle<()>>,
}

impl OrderWatch {
    pub fn start(deps: WatchDeps, settings: WatchSettings) -> Self {
        let cancel = CancellationToken::new();
        let (active_tx, active) = watch::channel(ActiveDetector::Starting);
        let fetcher = Arc::new(OrderDetailFetcher::new(deps.source.clone()));

        let polling = PollingDetector::new(
            deps.source.clone(),
            fetcher.clone(),
            deps.presenter.clone(),
            deps.haptics.clone(),
            settings.polling,
        );
        let realtime = match (settings.mode, deps.feed) {
            (WatchMode::Realtime, Some(feed)) => Some(RealtimeDetector::new(
                deps.source.clone(),
                feed,
                fetcher,
                deps.presenter.clone(),
                settings.realtime,
            )),
            (WatchMode::Realtime, None) => {
                tracing::warn!("Realtime mode requested without a feed, using polling");
                None
            }
            (WatchMode::Polling, _) => None,
        };

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            if let Some(realtime) = realtime {
                let _ = active_tx.send(ActiveDetector::Realtime);
                match realtime.run(token.clone()).await {
                    RealtimeExit::Stopped => {
                        let _ = active_tx.send(ActiveDetector::Stopped);
                        return;
                    }
                    RealtimeExit::Exhausted => {
                        tracing::warn!("Realtime channel unavailable, falling back to polling");
                    }
                }
            }

            let _ = active_tx.send(ActiveDetector::Polling);
            polling.run(token).await;
            let _ = active_tx.send(ActiveDetector::Stopped);
        });

        Self {
            cancel,
            active,
            task: Some(task),
        }
    }

    pub fn active(&self) -> ActiveDetector {
        *self.active.borrow()
    }

    /// 停止检测器并等待任务结束
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Order watch task ended abnormally: {}", e);
            }
        }
        tracing::info!("Order watch stopped");
    }
}

impl Drop for OrderWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
