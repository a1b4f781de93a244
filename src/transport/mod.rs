//! Pluggable transports for the duplex channel
//!
//! The channel manager is generic over a [`Connector`] so the same lifecycle,
//! heartbeat, and queuing semantics apply to any byte-stream transport.

mod tcp;
mod traits;

pub use tcp::TcpConnector;
pub use traits::{Connector, TransportStream};
