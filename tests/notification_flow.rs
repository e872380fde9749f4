use akanda_order_alerts::audio::{AlertGenerator, AlertSettings, AudioOutput};
use akanda_order_alerts::db::{ItemSource, MemoryStore, OrderFixture};
use akanda_order_alerts::error::AudioError;
use akanda_order_alerts::models::PresenterEvent;
use akanda_order_alerts::service::{
    ActiveDetector, NotificationPresenter, OrderWatch, PresenterState, WatchDeps, WatchSettings,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct CountingOutput {
    plays: AtomicU64,
}

#[async_trait]
impl AudioOutput for CountingOutput {
    async fn activate(&self) -> Result<(), AudioError> {
        Ok(())
    }

    async fn play(&self, _samples: Arc<[f32]>, _sample_rate: u32) -> Result<(), AudioError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn test_new_order_shown_then_dismissed() {
    let store = Arc::new(MemoryStore::new());
    store.seed_order(OrderFixture::new(1, 3000).customer("Awa", "Ndong"));

    let output = Arc::new(CountingOutput::default());
    let alert = AlertGenerator::with_output(AlertSettings::default(), output.clone());
    let presenter = Arc::new(NotificationPresenter::new(alert.clone(), None, true));
    let mut events = presenter.subscribe();

    let watch = OrderWatch::start(
        WatchDeps {
            source: store.clone(),
            feed: Some(store.clone()),
            presenter: presenter.clone(),
            haptics: None,
        },
        WatchSettings::default(),
    );
    wait_until(|| store.subscriber_count() > 0).await;
    assert_eq!(watch.active(), ActiveDetector::Realtime);

    // 历史订单不触发通知
    assert_eq!(presenter.state(), PresenterState::Idle);

    store.insert_order(
        OrderFixture::new(2, 12000)
            .customer("Jean", "Dupont")
            .item(ItemSource::CocktailKit, "Mojito", 2, 5000)
            .item(ItemSource::Product, "Chips", 1, 2000),
    );
    wait_until(|| presenter.state() == PresenterState::Visible).await;

    let shown = presenter.current().unwrap();
    assert_eq!(shown.id, 2);
    assert_eq!(shown.customer_name, "Jean Dupont");
    assert_eq!(shown.total_amount, BigDecimal::from(12000));
    let items: Vec<_> = shown.items.iter().map(|i| (i.name.as_str(), i.quantity)).collect();
    assert_eq!(items, vec![("Mojito", 2), ("Chips", 1)]);
    assert!(alert.is_playing());
    match events.recv().await.unwrap() {
        PresenterEvent::Shown { order } => assert_eq!(order.id, 2),
        other => panic!("unexpected event: {:?}", other),
    }

    presenter.dismiss();
    assert_eq!(presenter.state(), PresenterState::Idle);
    assert!(!alert.is_playing());

    let plays = output.plays.load(Ordering::SeqCst);
    assert!(plays >= 1);
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(output.plays.load(Ordering::SeqCst), plays);

    watch.stop().await;
    assert_eq!(store.fetched_ids(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_second_order_replaces_first_and_keeps_one_alert() {
    let store = Arc::new(MemoryStore::new());
    let output = Arc::new(CountingOutput::default());
    let alert = AlertGenerator::with_output(AlertSettings::default(), output.clone());
    let presenter = Arc::new(NotificationPresenter::new(alert.clone(), None, true));

    let watch = OrderWatch::start(
        WatchDeps {
            source: store.clone(),
            feed: Some(store.clone()),
            presenter: presenter.clone(),
            haptics: None,
        },
        WatchSettings::default(),
    );
    wait_until(|| store.subscriber_count() > 0).await;

    store.insert_order(OrderFixture::new(10, 1000).full_name("Marie Obame"));
    wait_until(|| presenter.last_seen() == Some(10)).await;
    store.insert_order(OrderFixture::new(11, 2000));
    wait_until(|| presenter.last_seen() == Some(11)).await;

    let shown = presenter.current().unwrap();
    assert_eq!(shown.customer_name, "Unknown customer");

    // 只有一个重复计时器: 每 6 秒一次
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = output.plays.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(12_050)).await;
    assert_eq!(output.plays.load(Ordering::SeqCst), before + 2);

    presenter.dismiss();
    watch.stop().await;
}
