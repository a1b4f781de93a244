//! Connection management for persistent bidirectional communication
//!
//! This module handles:
//! - The channel lifecycle state machine with automatic reconnection
//! - Exponential backoff scheduling with a configurable attempt ceiling
//! - Heartbeat-based detection of silently dead connections
//! - FIFO queuing of outbound messages while disconnected

mod manager;
mod queue;

pub use manager::{ChannelConfig, ChannelEvent, ChannelManager, ChannelState};
