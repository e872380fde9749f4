use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 订单主键 (orders.id, 由数据库递增分配)
pub type OrderId = i64;

/// 最新订单投影 (轮询只读这两列)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LatestOrder {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
}

/// 订单行 + 关联的客户字段
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: OrderId,
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub total_amount: BigDecimal,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
}

/// 订单明细行
///
/// 商品名可能来自明细自身或三张商品表之一 (products / ready_cocktails /
/// cocktails_maison)，所以全部以可空列查询，再交给 `NameResolver` 决定。
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItemRow {
    pub item_id: i64,
    pub order_id: OrderId,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub ready_cocktail_name: Option<String>,
    pub cocktail_kit_name: Option<String>,
    pub product_join_name: Option<String>,
}

/// 展示用明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub name: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

/// 解析完成的订单通知内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub id: OrderId,
    pub order_number: String,
    pub customer_name: String,
    pub total_amount: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderLineItem>,
}
