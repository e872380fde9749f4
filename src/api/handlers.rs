use crate::error::ConfirmError;
use crate::models::{NotificationSnapshot, OrderId};
use crate::service::NotificationPresenter;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;

/// 请求体: 轮询开关
#[derive(Debug, Deserialize)]
pub struct PollingRequest {
    pub enabled: bool,
}

/// 通用响应体
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub granted: bool,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 当前弹窗状态
pub async fn current_notification(
    State(presenter): State<Arc<NotificationPresenter>>,
) -> Json<NotificationSnapshot> {
    Json(presenter.snapshot())
}

/// 关闭弹窗并停止提示音
pub async fn dismiss_notification(
    State(presenter): State<Arc<NotificationPresenter>>,
) -> Json<NotificationSnapshot> {
    presenter.dismiss();
    Json(presenter.snapshot())
}

/// 确认当前订单
pub async fn confirm_order(State(presenter): State<Arc<NotificationPresenter>>) -> Response {
    match presenter.confirm().await {
        Ok(order_id) => {
            let response = ActionResponse {
                success: true,
                message: format!("Order {} confirmed", order_id),
                order_id: Some(order_id),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let status = match e {
                ConfirmError::NotConfigured | ConfirmError::NothingShown => StatusCode::CONFLICT,
                ConfirmError::Rejected(_) | ConfirmError::Database(_) => StatusCode::BAD_GATEWAY,
            };
            let response = ActionResponse {
                success: false,
                message: format!("Error: {}", e),
                order_id: presenter.current().map(|o| o.id),
            };
            (status, Json(response)).into_response()
        }
    }
}

/// 启用 / 停用轮询
pub async fn set_polling(
    State(presenter): State<Arc<NotificationPresenter>>,
    Json(req): Json<PollingRequest>,
) -> Json<NotificationSnapshot> {
    presenter.set_polling_enabled(req.enabled);
    Json(presenter.snapshot())
}

/// 用户手势后唤醒音频
pub async fn request_audio_permission(
    State(presenter): State<Arc<NotificationPresenter>>,
) -> Json<PermissionResponse> {
    let granted = presenter.alert().request_audio_permission().await;
    Json(PermissionResponse { granted })
}

/// GET /api/notifications/events - 弹窗事件 SSE 流
pub async fn event_stream(
    State(presenter): State<Arc<NotificationPresenter>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("New SSE client connected");

    let stream = BroadcastStream::new(presenter.subscribe()).filter_map(|result| async move {
        match result {
            Ok(event) => match Event::default().event(event.kind()).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    tracing::warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::audio::AlertGenerator;
    use crate::db::{MemoryStore, OrderFixture};
    use crate::service::{ConfirmAction, OrderDetailFetcher};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_current_dismiss_and_confirm() {
        let store = Arc::new(MemoryStore::new());
        store.seed_order(OrderFixture::new(1, 12000).customer("Jean", "Dupont"));
        let presenter = Arc::new(NotificationPresenter::new(
            AlertGenerator::unsupported(),
            Some(store.clone() as Arc<dyn ConfirmAction>),
            true,
        ));
        let app = router(presenter.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/api/notifications/current").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["is_visible"], false);
        assert!(json["order_data"].is_null());

        // 没有订单时确认返回 409
        let response = app
            .clone()
            .oneshot(Request::post("/api/notifications/confirm").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let payload = OrderDetailFetcher::new(store.clone()).fetch(1).await.unwrap();
        presenter.show(payload).await;
        let json = body_json(
            app.clone()
                .oneshot(Request::get("/api/notifications/current").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(json["is_visible"], true);
        assert_eq!(json["order_data"]["customer_name"], "Jean Dupont");

        let response = app
            .clone()
            .oneshot(Request::post("/api/notifications/confirm").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["order_id"], 1);
        assert_eq!(store.confirmed_ids(), vec![1]);

        let json = body_json(
            app.oneshot(Request::post("/api/notifications/dismiss").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(json["is_visible"], false);
    }

    #[tokio::test]
    async fn test_polling_toggle_and_permission() {
        let presenter = Arc::new(NotificationPresenter::new(AlertGenerator::unsupported(), None, true));
        let app = router(presenter.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/notifications/polling")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"enabled": false}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["polling_enabled"], false);
        assert!(!presenter.polling_enabled());

        let response = app
            .oneshot(Request::post("/api/audio/permission").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["granted"], false);
    }
}
