pub mod fetcher;
pub mod polling;
pub mod presenter;
pub mod realtime;
pub mod resolver;
pub mod watch;

pub use fetcher::OrderDetailFetcher;
pub use polling::{PollMode, PollingDetector, PollingSettings};
pub use presenter::{ConfirmAction, NotificationPresenter, PresenterState};
pub use realtime::{RealtimeDetector, RealtimeExit, RealtimeSettings, ReconnectPolicy};
pub use resolver::{customer_display_name, NameResolver, NameStrategy, UNKNOWN_CUSTOMER, UNKNOWN_PRODUCT};
pub use watch::{ActiveDetector, OrderWatch, WatchDeps, WatchMode, WatchSettings};
