use sqlx::PgPool;

/// 安装 orders 新增触发器: 每插入一行就 pg_notify(channel, '{"id": ...}')
///
/// 可重复执行。`channel` 来自配置, 只允许字母数字和下划线。
pub async fn install_notify_trigger(pool: &PgPool, channel: &str) -> Result<(), sqlx::Error> {
    if channel.is_empty() || !channel.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(sqlx::Error::Configuration(
            format!("invalid notify channel name: {:?}", channel).into(),
        ));
    }

    let function_sql = format!(
        r#"
        CREATE OR REPLACE FUNCTION notify_order_inserted() RETURNS trigger AS $$
        BEGIN
            PERFORM pg_notify('{channel}', json_build_object('id', NEW.id)::text);
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql
        "#
    );

    sqlx::query(&function_sql).execute(pool).await?;
    sqlx::query("DROP TRIGGER IF EXISTS orders_inserted_notify ON orders")
        .execute(pool)
        .await?;
    sqlx::query(
        r#"
        CREATE TRIGGER orders_inserted_notify
        AFTER INSERT ON orders
        FOR EACH ROW EXECUTE FUNCTION notify_order_inserted()
        "#
    )
    .execute(pool)
    .await?;

    tracing::info!("orders 新增触发器已安装, channel={}", channel);
    Ok(())
}
