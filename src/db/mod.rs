pub mod init;
pub mod listener;
pub mod memory;
pub mod pool;
pub mod queries;
pub mod source;

pub use init::install_notify_trigger;
pub use listener::{parse_insert_payload, InsertFeed, InsertSubscription, PgInsertFeed};
pub use memory::{ItemSource, MemoryStore, OrderFixture};
pub use pool::create_pool;
pub use source::{OrderSource, PgConfirmAction, PgOrderSource};
