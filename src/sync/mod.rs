pub mod hub;
pub mod protocol;
pub mod remote;

pub use hub::{BroadcastHub, HubStats, SubscriberHandle, SubscriberId};
pub use protocol::StreamMessage;

// Live location fan-out: the hub owns the subscriber set and replays the
// registry to late joiners; the protocol module defines the frames pushed to
// WebSocket viewers; remote holds the client side (viewer + update pusher).
