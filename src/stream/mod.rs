//! Live feed plumbing: one logical subscription per mounted view.

pub mod connection;
pub mod transport;

pub use connection::{ConnectionManager, ReconnectPolicy, Subscription};
pub use transport::{channel, ChannelFeed, ChannelTransport, LineTransport, RawEvent, Transport, TransportError};
