pub mod api;
pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use audio::AlertGenerator;
pub use config::AppConfig;
pub use db::create_pool;
pub use service::{NotificationPresenter, OrderWatch};
