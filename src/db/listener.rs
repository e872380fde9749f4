use crate::error::FeedError;
use crate::models::{ChannelStatus, FeedEvent, OrderId};
use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;

/// 订单新增事件源
#[async_trait]
pub trait InsertFeed: Send + Sync {
    /// 建立一次订阅; 订阅断开后由调用方决定是否重连
    async fn subscribe(&self) -> Result<Box<dyn InsertSubscription>, FeedError>;
}

/// 一次活跃订阅
#[async_trait]
pub trait InsertSubscription: Send {
    /// 等待下一个事件; 返回非 `Subscribed` 的状态事件表示订阅已结束
    async fn next_event(&mut self) -> FeedEvent;
}

/// 基于 LISTEN/NOTIFY 的事件源
#[derive(Clone)]
pub struct PgInsertFeed {
    pool: PgPool,
    channel: String,
}

impl PgInsertFeed {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl InsertFeed for PgInsertFeed {
    async fn subscribe(&self) -> Result<Box<dyn InsertSubscription>, FeedError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.channel).await?;
        tracing::debug!("LISTEN {} established", self.channel);
        Ok(Box::new(PgSubscription { listener }))
    }
}

struct PgSubscription {
    listener: PgListener,
}

#[async_trait]
impl InsertSubscription for PgSubscription {
    async fn next_event(&mut self) -> FeedEvent {
        loop {
            match self.listener.try_recv().await {
                Ok(Some(notification)) => match parse_insert_payload(notification.payload()) {
                    Some(id) => return FeedEvent::Inserted(id),
                    None => {
                        tracing::warn!(
                            "Ignoring malformed notify payload on {}: {:?}",
                            notification.channel(),
                            notification.payload()
                        );
                    }
                },
                // try_recv 在连接断开时返回 None
                Ok(None) => return FeedEvent::Status(ChannelStatus::Closed),
                Err(e) => {
                    tracing::warn!("LISTEN connection error: {}", e);
                    return FeedEvent::Status(ChannelStatus::ChannelError);
                }
            }
        }
    }
}

/// 解析 NOTIFY 负载
///
/// 接受 `{"id": 42}`、`{"record": {"id": 42}}` 以及纯数字 `42`。
pub fn parse_insert_payload(payload: &str) -> Option<OrderId> {
    let payload = payload.trim();
    if let Ok(id) = payload.parse::<OrderId>() {
        return Some(id);
    }

    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let id = value
        .get("id")
        .or_else(|| value.get("record").and_then(|r| r.get("id")))?;

    id.as_i64()
        .or_else(|| id.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_insert_payload_shapes() {
        assert_eq!(parse_insert_payload("42"), Some(42));
        assert_eq!(parse_insert_payload(" 7 \n"), Some(7));
        assert_eq!(parse_insert_payload(r#"{"id": 42}"#), Some(42));
        assert_eq!(parse_insert_payload(r#"{"id": "43"}"#), Some(43));
        assert_eq!(parse_insert_payload(r#"{"record": {"id": 44, "total_amount": 1}}"#), Some(44));
    }

    #[test]
    fn test_parse_insert_payload_rejects_garbage() {
        assert_eq!(parse_insert_payload(""), None);
        assert_eq!(parse_insert_payload("not json"), None);
        assert_eq!(parse_insert_payload(r#"{"order_id": 1}"#), None);
        assert_eq!(parse_insert_payload(r#"{"id": null}"#), None);
    }
}
