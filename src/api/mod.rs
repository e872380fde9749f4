pub mod handlers;

pub use handlers::*;

use crate::service::NotificationPresenter;
use axum::{routing::{get, post}, Router};
use std::sync::Arc;

/// 宿主界面使用的通知接口
pub fn router(presenter: Arc<NotificationPresenter>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/notifications/current", get(current_notification))
        .route("/api/notifications/dismiss", post(dismiss_notification))
        .route("/api/notifications/confirm", post(confirm_order))
        .route("/api/notifications/polling", post(set_polling))
        .route("/api/notifications/events", get(event_stream))
        .route("/api/audio/permission", post(request_audio_permission))
        .with_state(presenter)
}
