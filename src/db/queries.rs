use crate::models::{LatestOrder, OrderId, OrderItemRow, OrderRow};
use sqlx::PgPool;

/// 查询最新一笔订单 (id + 创建时间)
pub async fn latest_order(pool: &PgPool) -> Result<Option<LatestOrder>, sqlx::Error> {
    sqlx::query_as::<_, LatestOrder>(
        r#"
        SELECT id, created_at
        FROM orders
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#
    )
    .fetch_optional(pool)
    .await
}

/// 查询比基线更新的订单 (按 id 升序, 用于补发模式)
pub async fn orders_after(
    pool: &PgPool,
    after_id: OrderId,
    limit: i64,
) -> Result<Vec<LatestOrder>, sqlx::Error> {
    sqlx::query_as::<_, LatestOrder>(
        r#"
        SELECT id, created_at
        FROM orders
        WHERE id > $1
        ORDER BY id ASC
        LIMIT $2
        "#
    )
    .bind(after_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// 查询订单主表 + 客户信息
pub async fn get_order(
    pool: &PgPool,
    order_id: OrderId,
) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT o.id,
               CAST(o.order_number AS TEXT) as order_number,
               o.created_at,
               o.total_amount,
               c.first_name,
               c.last_name,
               c.full_name
        FROM orders o
        LEFT JOIN customers c ON c.id = o.customer_id
        WHERE o.id = $1
        "#
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await
}

/// 查询订单明细, 一次性关联全部商品类型表
pub async fn list_order_items(
    pool: &PgPool,
    order_id: OrderId,
) -> Result<Vec<OrderItemRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT oi.id as item_id,
               oi.order_id,
               oi.product_name,
               oi.quantity,
               oi.unit_price,
               rc.name as ready_cocktail_name,
               cm.name as cocktail_kit_name,
               p.name as product_join_name
        FROM order_items oi
        LEFT JOIN ready_cocktails rc ON rc.id = oi.ready_cocktail_id
        LEFT JOIN cocktails_maison cm ON cm.id = oi.cocktail_maison_id
        LEFT JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = $1
        ORDER BY oi.id
        "#
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
}

/// 确认订单, 返回受影响行数
pub async fn confirm_order(pool: &PgPool, order_id: OrderId) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'confirmed'
        WHERE id = $1
        "#
    )
    .bind(order_id)
    .execute(pool)
    .await?;

    tracing::info!("订单 {} 已确认, 影响 {} 行", order_id, result.rows_affected());
    Ok(result.rows_affected())
}
