pub mod notification;
pub mod order;

pub use notification::{ChannelStatus, FeedEvent, NotificationSnapshot, PresenterEvent};
pub use order::{LatestOrder, OrderId, OrderItemRow, OrderLineItem, OrderPayload, OrderRow};
