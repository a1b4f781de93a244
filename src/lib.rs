//! relink — resilient duplex-channel client
//!
//! Maintains a logical, always-available bidirectional message connection
//! over an inherently unreliable transport. The [`ChannelManager`]
//! transparently reconnects with exponential backoff, detects silent failures
//! via an application-level heartbeat, queues outbound messages while
//! disconnected, and exposes a stable event stream to callers regardless of
//! the underlying connection's actual lifecycle.
//!
//! ```no_run
//! use relink::{ChannelConfig, ChannelEvent, ChannelManager, TcpConnector};
//!
//! # async fn run() {
//! let config = ChannelConfig {
//!     channel_id: "session-42".into(),
//!     ..Default::default()
//! };
//! let mut channel = ChannelManager::new(TcpConnector::new("127.0.0.1:8080"), config);
//!
//! channel.send(serde_json::json!({"text": "hello"}));
//!
//! while let Some(event) = channel.recv().await {
//!     match event {
//!         ChannelEvent::Message(payload) => println!("received: {payload}"),
//!         ChannelEvent::Exhausted { attempts } => {
//!             eprintln!("gave up after {attempts} attempts");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # }
//! ```

pub mod backoff;
pub mod channel;
pub mod codec;
pub mod frame;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use channel::{ChannelConfig, ChannelEvent, ChannelManager, ChannelState};
pub use frame::Frame;
pub use transport::{Connector, TcpConnector, TransportStream};
