//! Channel manager with a persistent duplex connection and automatic reconnection

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::channel::queue::OutboundQueue;
use crate::codec::{self, FrameDecoder};
use crate::frame::Frame;
use crate::transport::{Connector, TransportStream};

/// Lifecycle state of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// A connect attempt is in flight
    Connecting = 0,
    /// The transport is open and the heartbeat monitor is running
    Open = 1,
    /// Waiting out the backoff delay before the next attempt
    ReconnectScheduled = 2,
    /// The caller closed the channel (terminal)
    ClosedForced = 3,
    /// The attempt ceiling was reached (terminal)
    Failed = 4,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ChannelState::Connecting,
            1 => ChannelState::Open,
            2 => ChannelState::ReconnectScheduled,
            3 => ChannelState::ClosedForced,
            _ => ChannelState::Failed,
        }
    }
}

/// Events emitted by the channel manager
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The transport opened; queued messages are flushed immediately after
    Open,
    /// An application payload arrived from the peer
    Message(Value),
    /// The transport closed. `forced` distinguishes a caller-initiated
    /// shutdown from a transport-initiated one.
    Closed { reason: String, forced: bool },
    /// A connect attempt failed; the channel will retry unless closed
    Error { reason: String },
    /// A reconnect was scheduled; `attempt` is 1-based
    Reconnecting { attempt: u32 },
    /// The attempt ceiling was reached; no further attempts will be made
    Exhausted { attempts: u32 },
}

/// Configuration for the channel manager
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Identity announced in the hello frame on every connection epoch
    pub channel_id: String,
    /// Time limit for a single connect attempt
    pub connect_timeout: Duration,
    /// Backoff delay before the first retry
    pub base_interval: Duration,
    /// Upper bound on the backoff delay
    pub max_interval: Duration,
    /// Backoff growth factor (must be > 1)
    pub decay_factor: f64,
    /// Retry ceiling; `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
    /// Interval between liveness probes while open
    pub heartbeat_interval: Duration,
    /// How long to wait for any inbound frame after a probe
    pub heartbeat_timeout: Duration,
    /// Outbound queue capacity (drop-oldest on overflow)
    pub queue_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_id: "channel-0".into(),
            connect_timeout: Duration::from_secs(5),
            base_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            decay_factor: 1.5,
            max_reconnect_attempts: None,
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(5),
            queue_capacity: 1024,
        }
    }
}

/// Commands from the public facade to the owner task
enum Command {
    Send(Value),
    Close,
}

/// State snapshot shared between the facade and the owner task
struct Shared {
    state: AtomicU8,
    pending: AtomicUsize,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ChannelState::Connecting as u8),
            pending: AtomicUsize::new(0),
        }
    }

    fn set_state(&self, state: ChannelState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_pending(&self, len: usize) {
        self.pending.store(len, Ordering::SeqCst);
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Maintains a logical, always-available duplex channel over an unreliable
/// transport.
///
/// Construction starts the first connect attempt immediately. The manager
/// transparently reconnects with exponential backoff, detects silently dead
/// connections with an application-level heartbeat, and queues outbound
/// messages while disconnected. Lifecycle and inbound traffic are delivered
/// as an ordered [`ChannelEvent`] stream via [`recv`](Self::recv).
pub struct ChannelManager {
    config: ChannelConfig,
    command_tx: mpsc::UnboundedSender<Command>,
    event_rx: mpsc::Receiver<ChannelEvent>,
    shared: Arc<Shared>,
    forced: Arc<AtomicBool>,
}

impl ChannelManager {
    /// Create a new channel manager and start the connection loop
    pub fn new<C: Connector>(connector: C, config: ChannelConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel::<Command>();
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(100);
        let shared = Arc::new(Shared::new());
        let forced = Arc::new(AtomicBool::new(false));

        let loop_config = config.clone();
        let loop_shared = shared.clone();
        let loop_forced = forced.clone();
        tokio::spawn(async move {
            channel_loop(
                connector,
                loop_config,
                loop_shared,
                loop_forced,
                command_rx,
                event_tx,
            )
            .await;
        });

        Self {
            config,
            command_tx,
            event_rx,
            shared,
            forced,
        }
    }

    /// Submit a payload for transmission.
    ///
    /// Never blocks and never fails toward the caller: if the channel is
    /// open the payload is transmitted, otherwise it is queued and flushed
    /// in submission order once a connection becomes available. After
    /// [`close`](Self::close) or terminal failure the payload is discarded.
    pub fn send(&self, payload: Value) {
        if self.forced.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.command_tx.send(Command::Send(payload));
    }

    /// Permanently shut the channel down.
    ///
    /// Idempotent. Cancels any pending heartbeat and backoff timers and
    /// suppresses all further reconnection.
    pub fn close(&self) {
        if self.forced.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.command_tx.send(Command::Close);
    }

    /// Whether the underlying transport is currently open
    pub fn is_connected(&self) -> bool {
        self.shared.state() == ChannelState::Open
    }

    /// Snapshot of the current lifecycle state
    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    /// Number of messages waiting in the outbound queue (informational)
    pub fn pending(&self) -> usize {
        self.shared.pending()
    }

    /// The channel identity from the configuration
    pub fn channel_id(&self) -> &str {
        &self.config.channel_id
    }

    /// Receive the next channel event
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.event_rx.recv().await
    }
}

/// How a connection epoch ended
enum EpochEnd {
    /// The caller requested shutdown
    Forced,
}

/// Main connection loop with reconnection logic
async fn channel_loop<C: Connector>(
    connector: C,
    config: ChannelConfig,
    shared: Arc<Shared>,
    forced: Arc<AtomicBool>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<ChannelEvent>,
) {
    let policy = ReconnectPolicy::new(config.base_interval, config.max_interval, config.decay_factor);
    let mut queue = OutboundQueue::new(config.queue_capacity);
    let mut attempts: u32 = 0;

    'outer: loop {
        if forced.load(Ordering::SeqCst) {
            break;
        }

        shared.set_state(ChannelState::Connecting);

        match timeout(config.connect_timeout, connector.connect()).await {
            Ok(Ok(stream)) => {
                // A close() issued while the attempt was in flight must not
                // enter the open state.
                if forced.load(Ordering::SeqCst) {
                    drop(stream);
                    break;
                }

                attempts = 0;
                shared.set_state(ChannelState::Open);
                info!(
                    transport = connector.name(),
                    channel = %config.channel_id,
                    "connected"
                );
                let _ = event_tx.send(ChannelEvent::Open).await;

                match run_epoch(
                    stream,
                    &config,
                    &mut queue,
                    &shared,
                    &mut command_rx,
                    &event_tx,
                )
                .await
                {
                    Ok(EpochEnd::Forced) => break,
                    Err(reason) => {
                        warn!(channel = %config.channel_id, %reason, "connection lost");
                        let _ = event_tx
                            .send(ChannelEvent::Closed {
                                reason: reason.to_string(),
                                forced: false,
                            })
                            .await;
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(
                    transport = connector.name(),
                    channel = %config.channel_id,
                    error = %e,
                    "connect failed"
                );
                let _ = event_tx
                    .send(ChannelEvent::Error {
                        reason: e.to_string(),
                    })
                    .await;
            }
            Err(_) => {
                let reason = format!("connect timed out after {:?}", config.connect_timeout);
                warn!(transport = connector.name(), channel = %config.channel_id, "{reason}");
                let _ = event_tx.send(ChannelEvent::Error { reason }).await;
            }
        }

        if forced.load(Ordering::SeqCst) {
            break;
        }

        // Terminal once the ceiling is reached; reported exactly once.
        if let Some(max) = config.max_reconnect_attempts {
            if attempts >= max {
                shared.set_state(ChannelState::Failed);
                error!(
                    channel = %config.channel_id,
                    attempts,
                    "maximum reconnect attempts reached, giving up"
                );
                let _ = event_tx.send(ChannelEvent::Exhausted { attempts }).await;
                return;
            }
        }

        shared.set_state(ChannelState::ReconnectScheduled);
        let delay = policy.delay(attempts);
        let attempt = attempts + 1;
        debug!(channel = %config.channel_id, attempt, ?delay, "reconnect scheduled");
        let _ = event_tx.send(ChannelEvent::Reconnecting { attempt }).await;

        // Wait out the backoff while absorbing sends into the queue. A close
        // cancels the pending retry.
        let wake = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(wake) => break,

                cmd = command_rx.recv() => match cmd {
                    Some(Command::Send(payload)) => {
                        if queue.push(payload).is_some() {
                            warn!(
                                channel = %config.channel_id,
                                total_dropped = queue.dropped(),
                                "outbound queue full, dropped oldest message"
                            );
                        }
                        shared.set_pending(queue.len());
                    }
                    Some(Command::Close) | None => {
                        forced.store(true, Ordering::SeqCst);
                        break 'outer;
                    }
                },
            }
        }

        attempts += 1;
    }

    shared.set_state(ChannelState::ClosedForced);
    queue.clear();
    shared.set_pending(0);
    info!(channel = %config.channel_id, "channel closed");
    let _ = event_tx
        .send(ChannelEvent::Closed {
            reason: "closed by caller".into(),
            forced: true,
        })
        .await;
}

/// Drive one open connection until it ends.
///
/// Returns `Ok(EpochEnd::Forced)` when the caller requested shutdown, or an
/// error describing the unforced close (peer disconnect, transport error, or
/// heartbeat timeout).
async fn run_epoch<S: TransportStream>(
    stream: S,
    config: &ChannelConfig,
    queue: &mut OutboundQueue,
    shared: &Shared,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> Result<EpochEnd> {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];
    let mut seq: u64 = 0;

    // Identify the channel before anything else on this epoch.
    let hello = codec::encode(&Frame::Hello {
        channel: config.channel_id.clone(),
    })?;
    writer.write_all(&hello).await?;

    // Flush queued messages in FIFO order before any post-open send is
    // processed.
    while let Some(payload) = queue.pop_front() {
        shared.set_pending(queue.len());
        seq += 1;
        let frame = Frame::Data { seq, payload };
        let encoded = codec::encode(&frame)?;
        if let Err(e) = writer.write_all(&encoded).await {
            if let Frame::Data { payload, .. } = frame {
                queue.push_front(payload);
                shared.set_pending(queue.len());
            }
            return Err(anyhow!("queue flush failed: {e}"));
        }
    }
    shared.set_pending(queue.len());

    let mut heartbeat = interval(config.heartbeat_interval);
    // Armed if and only if a probe was sent and no frame has arrived since
    let mut response_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            // Emit a liveness probe
            _ = heartbeat.tick() => {
                seq += 1;
                let encoded = codec::encode(&Frame::Ping { seq })?;
                writer
                    .write_all(&encoded)
                    .await
                    .map_err(|e| anyhow!("probe write failed: {e}"))?;
                if response_deadline.is_none() {
                    response_deadline = Some(Instant::now() + config.heartbeat_timeout);
                }
            }

            // No frame arrived in time: the connection is silently dead
            _ = async { sleep_until(response_deadline.unwrap()).await }, if response_deadline.is_some() => {
                return Err(anyhow!(
                    "heartbeat timed out after {:?}",
                    config.heartbeat_timeout
                ));
            }

            // Commands from the facade
            cmd = command_rx.recv() => match cmd {
                Some(Command::Send(payload)) => {
                    seq += 1;
                    let frame = Frame::Data { seq, payload };
                    let encoded = codec::encode(&frame)?;
                    if let Err(e) = writer.write_all(&encoded).await {
                        // Re-queue rather than discard; the reconnect cycle
                        // will retransmit it.
                        if let Frame::Data { payload, .. } = frame {
                            queue.push(payload);
                            shared.set_pending(queue.len());
                        }
                        return Err(anyhow!("send failed: {e}"));
                    }
                }
                Some(Command::Close) | None => return Ok(EpochEnd::Forced),
            },

            // Inbound traffic
            result = reader.read(&mut read_buf) => match result {
                Ok(0) => return Err(anyhow!("peer closed connection")),
                Ok(n) => {
                    decoder.extend(&read_buf[..n]);

                    while let Some(frame) = decoder.decode_next()? {
                        // Any inbound frame proves liveness
                        response_deadline = None;

                        match frame {
                            Frame::Ping { seq: peer_seq } => {
                                let encoded = codec::encode(&Frame::Pong { seq: peer_seq })?;
                                writer
                                    .write_all(&encoded)
                                    .await
                                    .map_err(|e| anyhow!("pong write failed: {e}"))?;
                            }
                            Frame::Pong { .. } => {}
                            Frame::Hello { channel } => {
                                debug!(peer_channel = %channel, "peer hello");
                            }
                            Frame::Data { payload, .. } => {
                                let _ = event_tx.send(ChannelEvent::Message(payload)).await;
                            }
                        }
                    }
                }
                Err(e) => return Err(anyhow!("read error: {e}")),
            },
        }
    }
}
