use akanda_order_alerts::audio::{AlertGenerator, AudioOutput, WavOutput};
use akanda_order_alerts::config::AudioOutputKind;
use akanda_order_alerts::db::{self, InsertFeed, OrderSource, PgConfirmAction, PgInsertFeed, PgOrderSource};
use akanda_order_alerts::error::AppError;
use akanda_order_alerts::service::{ConfirmAction, NotificationPresenter, OrderWatch, WatchDeps};
use akanda_order_alerts::{api, create_pool, AppConfig};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 初始化日志 - 本地时间格式, RUST_LOG 控制级别
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting order alerts with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;
    info!("Database pool created");

    if config.notifications.install_trigger {
        db::install_notify_trigger(&pool, &config.notifications.channel).await?;
    }

    // 提示音: 第一次播放时才创建输出
    let audio = config.audio.clone();
    let alert = AlertGenerator::new(
        config.alert_settings(),
        Box::new(move || match audio.output {
            AudioOutputKind::Wav => Some(Arc::new(WavOutput::new(&audio.wav_path)) as Arc<dyn AudioOutput>),
            AudioOutputKind::None => None,
        }),
    );

    let confirm = config
        .notifications
        .confirm_enabled
        .then(|| Arc::new(PgConfirmAction::new(pool.clone())) as Arc<dyn ConfirmAction>);
    let presenter = Arc::new(NotificationPresenter::new(
        alert,
        confirm,
        config.notifications.polling_enabled,
    ));

    // 启动订单监听
    let source: Arc<dyn OrderSource> = Arc::new(PgOrderSource::new(pool.clone()));
    let feed: Arc<dyn InsertFeed> = Arc::new(PgInsertFeed::new(pool, config.notifications.channel.clone()));
    let watch = OrderWatch::start(
        WatchDeps {
            source,
            feed: Some(feed),
            presenter: presenter.clone(),
            haptics: None,
        },
        config.watch_settings(),
    );
    info!("Order watch started ({:?})", config.notifications.mode);

    // 构建路由
    let app = api::router(presenter.clone()).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /api/notifications/current  - 当前弹窗");
    info!("  POST /api/notifications/dismiss  - 关闭弹窗");
    info!("  POST /api/notifications/confirm  - 确认订单");
    info!("  POST /api/notifications/polling  - 轮询开关");
    info!("  GET  /api/notifications/events   - SSE 事件流");
    info!("  POST /api/audio/permission       - 唤醒音频");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    presenter.dismiss();
    watch.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
