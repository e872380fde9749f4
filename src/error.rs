use crate::models::OrderId;
use thiserror::Error;

/// 启动及服务运行错误
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// 订单详情查询错误 (调用方只记录日志，不打断页面)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Order {0} not found")]
    NotFound(OrderId),

    #[error("Order {id} fetch failed: {source}")]
    Query {
        id: OrderId,
        #[source]
        source: sqlx::Error,
    },
}

/// 实时订阅错误
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Subscription failed: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Subscription timed out")]
    TimedOut,

    #[error("Subscription rejected: {0}")]
    Rejected(String),
}

/// 确认订单错误 (需要展示给用户，允许重试)
#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("No confirm action configured")]
    NotConfigured,

    #[error("No order is currently shown")]
    NothingShown,

    #[error("Order {0} could not be confirmed")]
    Rejected(OrderId),

    #[error("Confirm failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// 提示音错误
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio output unsupported")]
    Unsupported,

    #[error("Audio output error: {0}")]
    Output(String),

    #[error("WAV encode error: {0}")]
    Wav(#[from] hound::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}
