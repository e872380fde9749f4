use crate::db::queries;
use crate::error::ConfirmError;
use crate::models::{LatestOrder, OrderId, OrderItemRow, OrderRow};
use crate::service::ConfirmAction;
use async_trait::async_trait;
use sqlx::PgPool;

/// 订单数据来源 (只读)
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn latest_order(&self) -> Result<Option<LatestOrder>, sqlx::Error>;

    async fn orders_after(
        &self,
        after_id: OrderId,
        limit: i64,
    ) -> Result<Vec<LatestOrder>, sqlx::Error>;

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<OrderRow>, sqlx::Error>;

    async fn fetch_line_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRow>, sqlx::Error>;
}

/// Postgres 实现
#[derive(Clone)]
pub struct PgOrderSource {
    pool: PgPool,
}

impl PgOrderSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderSource for PgOrderSource {
    async fn latest_order(&self) -> Result<Option<LatestOrder>, sqlx::Error> {
        queries::latest_order(&self.pool).await
    }

    async fn orders_after(
        &self,
        after_id: OrderId,
        limit: i64,
    ) -> Result<Vec<LatestOrder>, sqlx::Error> {
        queries::orders_after(&self.pool, after_id, limit).await
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<OrderRow>, sqlx::Error> {
        queries::get_order(&self.pool, order_id).await
    }

    async fn fetch_line_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRow>, sqlx::Error> {
        queries::list_order_items(&self.pool, order_id).await
    }
}

/// 后台"确认订单"动作: 把 orders.status 更新为 confirmed
#[derive(Clone)]
pub struct PgConfirmAction {
    pool: PgPool,
}

impl PgConfirmAction {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfirmAction for PgConfirmAction {
    async fn confirm(&self, order_id: OrderId) -> Result<(), ConfirmError> {
        match queries::confirm_order(&self.pool, order_id).await? {
            0 => Err(ConfirmError::Rejected(order_id)),
            _ => Ok(()),
        }
    }
}
