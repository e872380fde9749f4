use crate::audio::{AlertSettings, Phrase, RenderSettings};
use crate::service::{
    PollMode, PollingSettings, RealtimeSettings, ReconnectPolicy, WatchMode, WatchSettings,
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub notifications: NotificationConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// 新订单检测
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub mode: WatchMode,
    /// LISTEN/NOTIFY 通道名
    pub channel: String,
    /// 启动时安装 orders 新增触发器
    pub install_trigger: bool,
    pub settle_delay_ms: u64,
    pub connect_timeout_secs: u64,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub max_reconnect_attempts: u32,
    pub polling_enabled: bool,
    pub poll_interval_secs: u64,
    pub poll_mode: PollMode,
    pub catch_up_limit: i64,
    /// 是否提供"确认订单"动作
    pub confirm_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioOutputKind {
    None,
    Wav,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub output: AudioOutputKind,
    pub wav_path: String,
    pub repeat_interval_secs: u64,
    pub lowpass_hz: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/akanda".to_string(),
                max_connections: 5,
                acquire_timeout_secs: 10,
            },
            notifications: NotificationConfig {
                mode: WatchMode::Realtime,
                channel: "orders_inserted".to_string(),
                install_trigger: true,
                settle_delay_ms: 1500,
                connect_timeout_secs: 10,
                reconnect_base_ms: 1000,
                reconnect_max_ms: 30_000,
                max_reconnect_attempts: 5,
                polling_enabled: true,
                poll_interval_secs: 5,
                poll_mode: PollMode::Newest,
                catch_up_limit: 20,
                confirm_enabled: true,
            },
            audio: AudioConfig {
                output: AudioOutputKind::Wav,
                wav_path: "var/alerts/new-order.wav".to_string(),
                repeat_interval_secs: 6,
                lowpass_hz: 2_000.0,
            },
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 → config/akanda.toml (可选) → AKANDA__SECTION__KEY 环境变量
    ///
    /// DATABASE_URL / SERVER_HOST / SERVER_PORT 仍然生效。
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Some("config/akanda"))
    }

    pub fn load_from(file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("AKANDA")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .build()?
            .try_deserialize()
    }

    pub fn watch_settings(&self) -> WatchSettings {
        let n = &self.notifications;
        WatchSettings {
            mode: n.mode,
            realtime: RealtimeSettings {
                settle_delay: Duration::from_millis(n.settle_delay_ms),
                connect_timeout: Duration::from_secs(n.connect_timeout_secs),
                reconnect: ReconnectPolicy {
                    base_delay: Duration::from_millis(n.reconnect_base_ms),
                    max_delay: Duration::from_millis(n.reconnect_max_ms),
                    max_attempts: n.max_reconnect_attempts,
                },
                catch_up_limit: n.catch_up_limit.max(1),
            },
            polling: PollingSettings {
                interval: Duration::from_secs(n.poll_interval_secs.max(1)),
                mode: n.poll_mode,
                catch_up_limit: n.catch_up_limit.max(1),
            },
        }
    }

    pub fn alert_settings(&self) -> AlertSettings {
        AlertSettings {
            phrase: Phrase::order_chime(),
            render: RenderSettings {
                lowpass_hz: self.audio.lowpass_hz,
                ..RenderSettings::default()
            },
            repeat_interval: Duration::from_secs(self.audio.repeat_interval_secs.max(1)),
        }
    }
}
