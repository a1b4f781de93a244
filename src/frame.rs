//! Wire frame types for the duplex channel
//!
//! Control frames (ping/pong) are distinguished from application payloads by
//! the `type` discriminator. The channel manager intercepts and consumes
//! control frames before surfacing anything to the caller, so application
//! code never observes heartbeat traffic.

use serde::{Deserialize, Serialize};

/// A single frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Identifies the channel on a freshly opened connection.
    ///
    /// Sent exactly once per connection epoch, before any queued data is
    /// flushed.
    Hello { channel: String },
    /// Liveness probe emitted by the heartbeat monitor.
    Ping { seq: u64 },
    /// Response to a peer's ping.
    Pong { seq: u64 },
    /// Application payload.
    Data { seq: u64, payload: serde_json::Value },
}

impl Frame {
    /// Whether this frame is heartbeat traffic that must not reach the caller.
    pub fn is_control(&self) -> bool {
        matches!(self, Frame::Ping { .. } | Frame::Pong { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_discriminator() {
        let json = serde_json::to_string(&Frame::Ping { seq: 7 }).unwrap();
        assert!(json.contains(r#""type":"ping""#));

        let frame: Frame = serde_json::from_str(r#"{"type":"pong","seq":7}"#).unwrap();
        assert_eq!(frame, Frame::Pong { seq: 7 });
    }

    #[test]
    fn test_control_classification() {
        assert!(Frame::Ping { seq: 1 }.is_control());
        assert!(Frame::Pong { seq: 1 }.is_control());
        assert!(!Frame::Data {
            seq: 1,
            payload: serde_json::json!({"k": "v"})
        }
        .is_control());
        assert!(!Frame::Hello {
            channel: "chan-1".into()
        }
        .is_control());
    }
}
