use crate::db::OrderSource;
use crate::error::FetchError;
use crate::models::{OrderId, OrderLineItem, OrderPayload};
use crate::service::resolver::{customer_display_name, NameResolver};
use std::sync::Arc;

/// 订单详情查询
///
/// 每次调用都重新查库, 不做缓存 (调用频率等于真实下单频率)。
pub struct OrderDetailFetcher {
    source: Arc<dyn OrderSource>,
    resolver: NameResolver,
}

impl OrderDetailFetcher {
    pub fn new(source: Arc<dyn OrderSource>) -> Self {
        Self::with_resolver(source, NameResolver::default())
    }

    pub fn with_resolver(source: Arc<dyn OrderSource>, resolver: NameResolver) -> Self {
        Self { source, resolver }
    }

    pub async fn fetch(&self, order_id: OrderId) -> Result<OrderPayload, FetchError> {
        // 1. 订单主表 + 客户
        let order = self
            .source
            .fetch_order(order_id)
            .await
            .map_err(|source| FetchError::Query { id: order_id, source })?;
        let Some(order) = order else {
            return Err(FetchError::NotFound(order_id));
        };

        // 2. 明细 + 商品名关联
        let rows = self
            .source
            .fetch_line_items(order_id)
            .await
            .map_err(|source| FetchError::Query { id: order_id, source })?;

        let items: Vec<OrderLineItem> = rows
            .iter()
            .map(|row| OrderLineItem {
                name: self.resolver.resolve(row),
                quantity: row.quantity,
                unit_price: row.unit_price.clone(),
            })
            .collect();

        tracing::debug!("Order {} resolved with {} items", order_id, items.len());

        Ok(OrderPayload {
            id: order.id,
            customer_name: customer_display_name(&order),
            order_number: order.order_number,
            total_amount: order.total_amount,
            created_at: order.created_at,
            items,
        })
    }
}
