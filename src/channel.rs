use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use hdcore::net::{Transport, TransportEvent, TransportFactory};
use hdcore::types::events::{Connected, Disconnected, Frame};
use log::{debug, info, warn};
use rand::Rng;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, broadcast, mpsc, watch};
use tokio::time::Duration;

/// Connection lifecycle of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Explicit teardown in progress.
    Closing,
    /// The connection dropped mid-stream; a reconnect will follow.
    Faulted,
    Reconnecting,
}

/// One delivery to channel subscribers.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Connected(Connected),
    Disconnected(Disconnected),
    Frame(Arc<Frame>),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is already running")]
    AlreadyRunning,
}

const EVENT_CAPACITY: usize = 100;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Owns the single push connection for a session: connects, decodes frames,
/// broadcasts them to subscribers and reconnects with backoff after drops.
///
/// Frames emitted by the server while the channel is disconnected are not
/// replayed; `Connected { resumed: true }` tells subscribers a gap may exist
/// so they can re-run their history fetch.
pub struct EventChannel {
    transport_factory: Arc<dyn TransportFactory>,
    session_token: String,
    events: broadcast::Sender<ChannelEvent>,
    state: watch::Sender<ChannelState>,
    is_running: AtomicBool,
    shutdown: Notify,
    reconnect_errors: AtomicU32,
    had_connection: AtomicBool,
    malformed_frames: AtomicU64,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    run_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl EventChannel {
    pub fn new(
        transport_factory: Arc<dyn TransportFactory>,
        session_token: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            transport_factory,
            session_token: session_token.into(),
            events,
            state,
            is_running: AtomicBool::new(false),
            shutdown: Notify::new(),
            reconnect_errors: AtomicU32::new(0),
            had_connection: AtomicBool::new(false),
            malformed_frames: AtomicU64::new(0),
            transport: Mutex::new(None),
            run_task: Mutex::new(None),
        }
    }

    /// Registers a subscriber. Every subscriber receives every event in
    /// delivery order; dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Observable connection state.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state() == ChannelState::Connected
    }

    /// Frames dropped as undecodable since the channel was built.
    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames.load(Ordering::Relaxed)
    }

    /// Starts the connection loop in a background task. Call once per
    /// session; the loop runs until [`EventChannel::close`].
    pub async fn connect(self: &Arc<Self>) -> Result<(), ChannelError> {
        let mut slot = self.run_task.lock().await;
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::AlreadyRunning);
        }
        let channel = self.clone();
        *slot = Some(tokio::spawn(channel.run()));
        Ok(())
    }

    /// Scoped teardown. When this returns the underlying connection is
    /// released and no further events are delivered, on all exit paths,
    /// including a close during `Connecting`.
    pub async fn close(&self) {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!(target: "Channel", "closing");
        self.state.send_replace(ChannelState::Closing);
        self.shutdown.notify_one();
        if let Some(transport) = self.transport.lock().await.take() {
            transport.disconnect().await;
        }
        let handle = self.run_task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn run(self: Arc<Self>) {
        let channel = self.clone();
        let _guard = scopeguard::guard((), move |_| {
            channel.is_running.store(false, Ordering::Relaxed);
            channel.state.send_replace(ChannelState::Disconnected);
            debug!(target: "Channel", "run loop exited");
        });

        while self.is_running.load(Ordering::Relaxed) {
            self.state.send_replace(ChannelState::Connecting);

            let opened = tokio::select! {
                result = self.open_transport() => Some(result),
                _ = self.shutdown.notified() => None,
            };
            let Some(opened) = opened else { break };

            match opened {
                Ok(mut events) => {
                    let was_connected = self.pump(&mut events).await;
                    *self.transport.lock().await = None;
                    if !self.is_running.load(Ordering::Relaxed) {
                        if was_connected {
                            let _ = self.events.send(ChannelEvent::Disconnected(Disconnected {
                                will_retry: false,
                            }));
                        }
                        break;
                    }
                    self.state.send_replace(ChannelState::Faulted);
                    warn!(target: "Channel", "connection lost, will reconnect");
                    if was_connected {
                        let _ = self.events.send(ChannelEvent::Disconnected(Disconnected {
                            will_retry: true,
                        }));
                    }
                }
                Err(e) => {
                    warn!(target: "Channel", "connect failed: {e:#}");
                }
            }

            if !self.is_running.load(Ordering::Relaxed) {
                break;
            }
            self.state.send_replace(ChannelState::Reconnecting);
            let delay = self.next_backoff();
            info!(
                target: "Channel",
                "will attempt to reconnect in {delay:?}"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.notified() => break,
            }
        }
    }

    async fn open_transport(&self) -> anyhow::Result<mpsc::Receiver<TransportEvent>> {
        let (transport, events) = self
            .transport_factory
            .create_transport(&self.session_token)
            .await?;
        *self.transport.lock().await = Some(transport);
        Ok(events)
    }

    /// Drains one connection's events. Returns whether the connection ever
    /// reached the connected state.
    async fn pump(&self, events: &mut mpsc::Receiver<TransportEvent>) -> bool {
        let mut was_connected = false;
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(TransportEvent::Connected) => {
                        was_connected = true;
                        let resumed = self.had_connection.swap(true, Ordering::Relaxed);
                        self.reconnect_errors.store(0, Ordering::Relaxed);
                        self.state.send_replace(ChannelState::Connected);
                        info!(target: "Channel", "connected (resumed: {resumed})");
                        let _ = self
                            .events
                            .send(ChannelEvent::Connected(Connected { resumed }));
                    }
                    Some(TransportEvent::DataReceived(data)) => self.handle_data(&data),
                    Some(TransportEvent::Disconnected) | None => {
                        debug!(target: "Channel", "transport closed");
                        return was_connected;
                    }
                },
                _ = self.shutdown.notified() => return was_connected,
            }
        }
    }

    fn handle_data(&self, data: &[u8]) {
        match Frame::decode(data) {
            Ok(frame) => {
                let _ = self.events.send(ChannelEvent::Frame(Arc::new(frame)));
            }
            Err(e) => {
                self.malformed_frames.fetch_add(1, Ordering::Relaxed);
                warn!(target: "Channel", "dropping malformed frame: {e}");
            }
        }
    }

    /// Linear backoff capped at 30s, with ±25% jitter so a fleet of clients
    /// does not reconnect in lockstep. The first retry is immediate.
    fn next_backoff(&self) -> Duration {
        let errors = self.reconnect_errors.fetch_add(1, Ordering::SeqCst);
        let base_ms = (u64::from(errors) * 2_000).min(MAX_BACKOFF_MS);
        let jitter = base_ms / 4;
        let ms = if jitter > 0 {
            rand::rng().random_range(base_ms - jitter..=base_ms + jitter)
        } else {
            base_ms
        };
        Duration::from_millis(ms)
    }
}
