use crate::db::{InsertFeed, OrderSource};
use crate::error::FeedError;
use crate::models::{ChannelStatus, FeedEvent, OrderId};
use crate::service::fetcher::OrderDetailFetcher;
use crate::service::presenter::NotificationPresenter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 断线重连策略: 指数退避, 有上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// 第 `attempt` 次重连前的等待 (从 1 开始)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeSettings {
    /// 收到新增事件后等待明细写完
    pub settle_delay: Duration,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    /// 重连成功后补查断线期间的订单, 单次上限
    pub catch_up_limit: i64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            catch_up_limit: 20,
        }
    }
}

/// 检测器退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeExit {
    Stopped,
    /// 重连次数用尽, 调用方应切换到轮询
    Exhausted,
}

/// 实时变更检测: 订阅 orders 新增事件, 每个新订单只通知一次
pub struct RealtimeDetector {
    source: Arc<dyn OrderSource>,
    feed: Arc<dyn InsertFeed>,
    fetcher: Arc<OrderDetailFetcher>,
    presenter: Arc<NotificationPresenter>,
    settings: RealtimeSettings,
}

impl RealtimeDetector {
    pub fn new(
        source: Arc<dyn OrderSource>,
        feed: Arc<dyn InsertFeed>,
        fetcher: Arc<OrderDetailFetcher>,
        presenter: Arc<NotificationPresenter>,
        settings: RealtimeSettings,
    ) -> Self {
        Self {
            source,
            feed,
            fetcher,
            presenter,
            settings,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> RealtimeExit {
        // 基线: 启动前已存在的订单不会触发通知
        let latest = tokio::select! {
            _ = cancel.cancelled() => return RealtimeExit::Stopped,
            latest = self.source.latest_order() => latest,
        };
        // 基线不可知时不补查, 否则会把历史订单当成新订单
        let (mut baseline, baseline_known) = match latest {
            Ok(latest) => (latest.map(|l| l.id), true),
            Err(e) => {
                tracing::warn!("Could not read latest order for baseline: {}", e);
                (None, false)
            }
        };
        tracing::info!("Realtime detector started, baseline={:?}", baseline);

        let mut failures = 0u32;
        let mut reconnecting = false;
        loop {
            let subscribed = tokio::select! {
                _ = cancel.cancelled() => return RealtimeExit::Stopped,
                result = tokio::time::timeout(self.settings.connect_timeout, self.feed.subscribe()) => {
                    result.unwrap_or(Err(FeedError::TimedOut))
                }
            };

            match subscribed {
                Ok(mut subscription) => {
                    tracing::info!("Realtime channel status: {:?}", ChannelStatus::Subscribed);
                    if reconnecting && baseline_known {
                        self.catch_up(&mut baseline, &cancel).await;
                        if cancel.is_cancelled() {
                            return RealtimeExit::Stopped;
                        }
                    }
                    failures = 0;
                    reconnecting = false;
                    loop {
                        let event = tokio::select! {
                            _ = cancel.cancelled() => return RealtimeExit::Stopped,
                            event = subscription.next_event() => event,
                        };
                        match event {
                            FeedEvent::Inserted(id) => {
                                self.handle_insert(id, &mut baseline, &cancel).await;
                                if cancel.is_cancelled() {
                                    return RealtimeExit::Stopped;
                                }
                            }
                            FeedEvent::Status(ChannelStatus::Subscribed) => {
                                tracing::debug!("Realtime channel status: Subscribed");
                            }
                            FeedEvent::Status(status) => {
                                tracing::warn!("Realtime channel status: {:?}", status);
                                break;
                            }
                        }
                    }
                }
                Err(FeedError::TimedOut) => {
                    tracing::warn!("Realtime channel status: {:?}", ChannelStatus::TimedOut);
                }
                Err(e) => {
                    tracing::warn!("Realtime channel status: {:?} ({})", ChannelStatus::ChannelError, e);
                }
            }

            reconnecting = true;
            failures += 1;
            if failures > self.settings.reconnect.max_attempts {
                tracing::error!(
                    "Realtime channel failed {} times, giving up",
                    failures
                );
                return RealtimeExit::Exhausted;
            }

            let delay = self.settings.reconnect.delay_for(failures);
            tracing::info!(
                "Reconnecting realtime channel in {:?} (attempt {}/{})",
                delay, failures, self.settings.reconnect.max_attempts
            );
            tokio::select! {
                _ = cancel.cancelled() => return RealtimeExit::Stopped,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// 重连后补查断线期间新增的订单, 按 id 升序逐个处理
    async fn catch_up(&self, baseline: &mut Option<OrderId>, cancel: &CancellationToken) {
        let after = baseline.unwrap_or(0);
        let missed = tokio::select! {
            _ = cancel.cancelled() => return,
            missed = self.source.orders_after(after, self.settings.catch_up_limit) => missed,
        };
        match missed {
            Ok(missed) => {
                if !missed.is_empty() {
                    tracing::info!("Catching up {} orders missed while disconnected", missed.len());
                }
                for order in missed {
                    self.handle_insert(order.id, baseline, cancel).await;
                    if cancel.is_cancelled() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Could not catch up orders after {}: {}", after, e);
            }
        }
    }

    async fn handle_insert(
        &self,
        id: OrderId,
        baseline: &mut Option<OrderId>,
        cancel: &CancellationToken,
    ) {
        if *baseline == Some(id) {
            tracing::debug!("Duplicate insert event for order {}, ignored", id);
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.settings.settle_delay) => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.fetcher.fetch(id) => result,
        };
        if cancel.is_cancelled() {
            return;
        }

        match result {
            Ok(payload) => {
                *baseline = Some(id);
                self.presenter.show(payload).await;
            }
            Err(e) => {
                tracing::warn!("New order {} not shown: {}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AlertGenerator;
    use crate::db::{ItemSource, MemoryStore, OrderFixture};
    use crate::service::presenter::PresenterState;

    struct Harness {
        store: Arc<MemoryStore>,
        presenter: Arc<NotificationPresenter>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                presenter: Arc::new(NotificationPresenter::new(AlertGenerator::unsupported(), None, true)),
            }
        }

        fn detector(&self, settings: RealtimeSettings) -> RealtimeDetector {
            RealtimeDetector::new(
                self.store.clone(),
                self.store.clone(),
                Arc::new(OrderDetailFetcher::new(self.store.clone())),
                self.presenter.clone(),
                settings,
            )
        }

        async fn wait_subscribed(&self) {
            for _ in 0..1000 {
                if self.store.subscriber_count() > 0 {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("detector never subscribed");
        }
    }

    fn order(id: OrderId) -> OrderFixture {
        OrderFixture::new(id, 1000 * id)
            .customer("Awa", "Ndong")
            .item(ItemSource::Stored, "Punch coco", 1, 1000)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_new_insert_fetched_once() {
        let h = Harness::new();
        h.store.seed_order(order(1));

        let cancel = CancellationToken::new();
        let task = tokio::spawn(h.detector(RealtimeSettings::default()).run(cancel.clone()));
        h.wait_subscribed().await;

        for id in 2..=5 {
            h.store.insert_order(order(id));
        }
        // 传输层重复投递最后一个事件
        h.store.redeliver(5);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(h.store.fetched_ids(), vec![2, 3, 4, 5]);
        assert_eq!(h.presenter.last_seen(), Some(5));
        assert_eq!(h.presenter.state(), PresenterState::Visible);

        cancel.cancel();
        assert_eq!(task.await.unwrap(), RealtimeExit::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_leaves_state_unchanged() {
        let h = Harness::new();
        let cancel = CancellationToken::new();
        tokio::spawn(h.detector(RealtimeSettings::default()).run(cancel.clone()));
        h.wait_subscribed().await;

        // 事件到了但订单行不存在
        h.store.redeliver(7);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.store.fetched_ids(), vec![7]);
        assert_eq!(h.presenter.state(), PresenterState::Idle);
        assert_eq!(h.presenter.last_seen(), None);

        // 后续事件照常处理
        h.store.insert_order(order(8));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.presenter.last_seen(), Some(8));
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_fetch_does_not_present() {
        let h = Harness::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(h.detector(RealtimeSettings::default()).run(cancel.clone()));
        h.wait_subscribed().await;

        h.store.insert_order(order(3));
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
        assert_eq!(task.await.unwrap(), RealtimeExit::Stopped);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(h.store.fetched_ids().is_empty());
        assert_eq!(h.presenter.state(), PresenterState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_channel_close() {
        let h = Harness::new();
        let cancel = CancellationToken::new();
        tokio::spawn(h.detector(RealtimeSettings::default()).run(cancel.clone()));
        h.wait_subscribed().await;

        h.store.close_feed();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.store.subscriber_count(), 0);

        // 1 秒退避后重新订阅
        h.wait_subscribed().await;
        assert_eq!(h.store.subscribe_attempts(), 2);

        h.store.insert_order(order(4));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.presenter.last_seen(), Some(4));
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_orders_missed_during_backoff_are_caught_up() {
        let h = Harness::new();
        h.store.seed_order(order(1));
        let cancel = CancellationToken::new();
        tokio::spawn(h.detector(RealtimeSettings::default()).run(cancel.clone()));
        h.wait_subscribed().await;

        // 断线后第一次重连也失败, 期间进来两单, 没有订阅者收到事件
        h.store.fail_subscriptions(1);
        h.store.close_feed();
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.store.insert_order(order(2));
        h.store.insert_order(order(3));

        h.wait_subscribed().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.store.subscribe_attempts(), 3);
        assert_eq!(h.store.fetched_ids(), vec![2, 3]);
        assert_eq!(h.presenter.last_seen(), Some(3));

        // 补查之后实时事件照常处理, 已补查的订单不会重复
        h.store.redeliver(3);
        h.store.insert_order(order(4));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.store.fetched_ids(), vec![2, 3, 4]);
        cancel.cancel();
    }

    /// 订阅请求永远不返回
    struct StalledFeed;

    #[async_trait::async_trait]
    impl InsertFeed for StalledFeed {
        async fn subscribe(&self) -> Result<Box<dyn crate::db::InsertSubscription>, FeedError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_timeout_counts_as_failure() {
        let h = Harness::new();
        let settings = RealtimeSettings {
            connect_timeout: Duration::from_secs(2),
            reconnect: ReconnectPolicy {
                max_attempts: 1,
                ..ReconnectPolicy::default()
            },
            ..RealtimeSettings::default()
        };
        let detector = RealtimeDetector::new(
            h.store.clone(),
            Arc::new(StalledFeed),
            Arc::new(OrderDetailFetcher::new(h.store.clone())),
            h.presenter.clone(),
            settings,
        );

        let started = tokio::time::Instant::now();
        assert_eq!(detector.run(CancellationToken::new()).await, RealtimeExit::Exhausted);
        // 两次 2 秒超时加一次 1 秒退避
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let h = Harness::new();
        h.store.fail_subscriptions(u32::MAX);
        let settings = RealtimeSettings {
            reconnect: ReconnectPolicy {
                max_attempts: 3,
                ..ReconnectPolicy::default()
            },
            ..RealtimeSettings::default()
        };

        let exit = h.detector(settings).run(CancellationToken::new()).await;
        assert_eq!(exit, RealtimeExit::Exhausted);
        assert_eq!(h.store.subscribe_attempts(), 4);
    }
}
