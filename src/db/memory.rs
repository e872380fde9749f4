//! 内存订单库
//!
//! 同时实现 `OrderSource`、`InsertFeed` 与 `ConfirmAction`, 供测试和本地联调使用。
//! 可以注入查询失败、订阅失败、确认失败, 并记录每次查询的订单 id。

use crate::db::listener::{InsertFeed, InsertSubscription};
use crate::db::source::OrderSource;
use crate::error::{ConfirmError, FeedError};
use crate::models::{ChannelStatus, FeedEvent, LatestOrder, OrderId, OrderItemRow, OrderRow};
use crate::service::ConfirmAction;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::DateTime;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 64;

/// 明细名称来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSource {
    /// 明细自带 product_name
    Stored,
    ReadyCocktail,
    CocktailKit,
    Product,
    /// 所有名称列为空
    Missing,
}

/// 订单构造器
#[derive(Debug, Clone)]
pub struct OrderFixture {
    row: OrderRow,
    items: Vec<OrderItemRow>,
}

impl OrderFixture {
    pub fn new(id: OrderId, total_amount: i64) -> Self {
        Self {
            row: OrderRow {
                id,
                order_number: format!("AK-{:05}", id),
                created_at: DateTime::from_timestamp(1_700_000_000 + id, 0).unwrap_or_default(),
                total_amount: BigDecimal::from(total_amount),
                first_name: None,
                last_name: None,
                full_name: None,
            },
            items: Vec::new(),
        }
    }

    pub fn customer(mut self, first_name: &str, last_name: &str) -> Self {
        self.row.first_name = Some(first_name.to_string());
        self.row.last_name = Some(last_name.to_string());
        self
    }

    pub fn full_name(mut self, full_name: &str) -> Self {
        self.row.full_name = Some(full_name.to_string());
        self
    }

    pub fn item(mut self, source: ItemSource, name: &str, quantity: i32, unit_price: i64) -> Self {
        let name = Some(name.to_string());
        let mut row = OrderItemRow {
            item_id: self.row.id * 100 + self.items.len() as i64 + 1,
            order_id: self.row.id,
            product_name: None,
            quantity,
            unit_price: BigDecimal::from(unit_price),
            ready_cocktail_name: None,
            cocktail_kit_name: None,
            product_join_name: None,
        };
        match source {
            ItemSource::Stored => row.product_name = name,
            ItemSource::ReadyCocktail => row.ready_cocktail_name = name,
            ItemSource::CocktailKit => row.cocktail_kit_name = name,
            ItemSource::Product => row.product_join_name = name,
            ItemSource::Missing => {}
        }
        self.items.push(row);
        self
    }

    pub fn id(&self) -> OrderId {
        self.row.id
    }
}

struct Inner {
    orders: BTreeMap<OrderId, OrderRow>,
    items: HashMap<OrderId, Vec<OrderItemRow>>,
    feed: broadcast::Sender<OrderId>,
    fetched: Vec<OrderId>,
    latest_queries: usize,
    subscribe_attempts: usize,
    failing_subscriptions: u32,
    fail_queries: bool,
    reject_confirms: bool,
    confirmed: Vec<OrderId>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                orders: BTreeMap::new(),
                items: HashMap::new(),
                feed,
                fetched: Vec::new(),
                latest_queries: 0,
                subscribe_attempts: 0,
                failing_subscriptions: 0,
                fail_queries: false,
                reject_confirms: false,
                confirmed: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 写入历史订单, 不发事件
    pub fn seed_order(&self, order: OrderFixture) {
        let mut inner = self.lock();
        inner.items.insert(order.row.id, order.items);
        inner.orders.insert(order.row.id, order.row);
    }

    /// 写入新订单并向所有订阅者广播新增事件
    pub fn insert_order(&self, order: OrderFixture) {
        let id = order.id();
        self.seed_order(order);
        self.redeliver(id);
    }

    /// 重复投递一个新增事件 (模拟传输层重复)
    pub fn redeliver(&self, id: OrderId) {
        let _ = self.lock().feed.send(id);
    }

    /// 关闭当前通道, 已有订阅收到 `Closed`
    pub fn close_feed(&self) {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        self.lock().feed = feed;
    }

    /// 接下来 `count` 次订阅直接失败
    pub fn fail_subscriptions(&self, count: u32) {
        self.lock().failing_subscriptions = count;
    }

    /// 所有查询返回错误
    pub fn set_query_failure(&self, fail: bool) {
        self.lock().fail_queries = fail;
    }

    pub fn set_confirm_rejection(&self, reject: bool) {
        self.lock().reject_confirms = reject;
    }

    /// 按顺序记录的订单详情查询 id
    pub fn fetched_ids(&self) -> Vec<OrderId> {
        self.lock().fetched.clone()
    }

    pub fn latest_queries(&self) -> usize {
        self.lock().latest_queries
    }

    pub fn subscribe_attempts(&self) -> usize {
        self.lock().subscribe_attempts
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().feed.receiver_count()
    }

    pub fn confirmed_ids(&self) -> Vec<OrderId> {
        self.lock().confirmed.clone()
    }

    fn check_failure(inner: &Inner) -> Result<(), sqlx::Error> {
        if inner.fail_queries {
            return Err(sqlx::Error::Protocol("injected query failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderSource for MemoryStore {
    async fn latest_order(&self) -> Result<Option<LatestOrder>, sqlx::Error> {
        let mut inner = self.lock();
        inner.latest_queries += 1;
        Self::check_failure(&inner)?;
        Ok(inner
            .orders
            .values()
            .max_by_key(|o| (o.created_at, o.id))
            .map(|o| LatestOrder {
                id: o.id,
                created_at: o.created_at,
            }))
    }

    async fn orders_after(
        &self,
        after_id: OrderId,
        limit: i64,
    ) -> Result<Vec<LatestOrder>, sqlx::Error> {
        let inner = self.lock();
        Self::check_failure(&inner)?;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(inner
            .orders
            .range(after_id.saturating_add(1)..)
            .take(limit)
            .map(|(_, o)| LatestOrder {
                id: o.id,
                created_at: o.created_at,
            })
            .collect())
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<OrderRow>, sqlx::Error> {
        let mut inner = self.lock();
        inner.fetched.push(order_id);
        Self::check_failure(&inner)?;
        Ok(inner.orders.get(&order_id).cloned())
    }

    async fn fetch_line_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRow>, sqlx::Error> {
        let inner = self.lock();
        Self::check_failure(&inner)?;
        Ok(inner.items.get(&order_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl InsertFeed for MemoryStore {
    async fn subscribe(&self) -> Result<Box<dyn InsertSubscription>, FeedError> {
        let mut inner = self.lock();
        inner.subscribe_attempts += 1;
        if inner.failing_subscriptions > 0 {
            inner.failing_subscriptions -= 1;
            return Err(FeedError::Rejected("injected subscription failure".to_string()));
        }
        Ok(Box::new(MemorySubscription {
            rx: inner.feed.subscribe(),
        }))
    }
}

struct MemorySubscription {
    rx: broadcast::Receiver<OrderId>,
}

#[async_trait]
impl InsertSubscription for MemorySubscription {
    async fn next_event(&mut self) -> FeedEvent {
        loop {
            match self.rx.recv().await {
                Ok(id) => return FeedEvent::Inserted(id),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Memory feed lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return FeedEvent::Status(ChannelStatus::Closed);
                }
            }
        }
    }
}

#[async_trait]
impl ConfirmAction for MemoryStore {
    async fn confirm(&self, order_id: OrderId) -> Result<(), ConfirmError> {
        let mut inner = self.lock();
        if inner.reject_confirms || !inner.orders.contains_key(&order_id) {
            return Err(ConfirmError::Rejected(order_id));
        }
        inner.confirmed.push(order_id);
        Ok(())
    }
}
