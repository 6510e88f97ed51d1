//! WebSocket Gateway
//!
//! Real-time communication via WebSocket connections, scaled across
//! processes through a Redis pub/sub adapter.

pub mod adapter;
pub mod handler;
pub mod hub;
pub mod messages;

pub use adapter::{attach, RealtimeAdapter, EVENTS_CHANNEL};
pub use handler::ws_handler;
pub use hub::{Hub, HubError};
pub use messages::{Envelope, RealtimeEvent};
