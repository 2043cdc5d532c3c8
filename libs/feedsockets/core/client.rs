use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Control messages for the connection task
#[derive(Debug)]
enum ClientCommand {
    /// Leave the `Error` state (or skip a pending backoff) and connect again
    Reconnect,
    /// Close the connection and stop the task
    Shutdown,
}

/// Lifecycle notifications published by the connection task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connected to the server
    Connected,
    /// Transport closed or failed
    Disconnected,
    /// Starting reconnect attempt `n` (1-based)
    Reconnecting(usize),
    /// Reconnect budget spent; the client is parked in `Error`
    Exhausted,
    /// Transport-level error
    Error(String),
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_received: u64,
    pub handshakes_discarded: u64,
    pub parse_failures: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// How an open connection ended
enum ConnectionEnd {
    /// Shutdown was requested; do not reconnect
    Shutdown,
    /// Remote side went away; fall through to the reconnect policy
    Dropped,
}

/// Reconnecting WebSocket feed client
///
/// One tokio task owns the socket, decodes frames through the router in
/// arrival order and forwards typed messages to the handler threads. State
/// changes are visible through [`connection_state`](Self::connection_state)
/// and the event channel.
pub struct WebSocketClient<R>
where
    R: MessageRouter,
{
    config: Arc<ClientConfig<R>>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
    handler_handles: Vec<std::thread::JoinHandle<()>>,
}

impl<R> WebSocketClient<R>
where
    R: MessageRouter,
{
    pub(crate) fn new(
        config: ClientConfig<R>,
        handler_handles: Vec<std::thread::JoinHandle<()>>,
    ) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connecting));
        let metrics = Arc::new(AtomicMetrics::new());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = unbounded();

        let task_handle = {
            let config = Arc::clone(&config);
            let state = Arc::clone(&state);
            let metrics = Arc::clone(&metrics);

            tokio::spawn(async move {
                run_client(config, state, metrics, command_rx, event_tx).await;
            })
        };

        Self {
            config,
            state,
            metrics,
            command_tx,
            event_rx,
            task_handle: Some(task_handle),
            handler_handles,
        }
    }

    pub fn url(&self) -> &str {
        self.config.url()
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Shared handle on the connection state, for observers that outlive a borrow
    pub fn state_handle(&self) -> Arc<AtomicConnectionState> {
        Arc::clone(&self.state)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_received: self.metrics.messages_received(),
            handshakes_discarded: self.metrics.handshakes_discarded(),
            parse_failures: self.metrics.parse_failures(),
            reconnect_count: self.metrics.reconnect_count(),
            connection_state: self.state.get(),
        }
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Clone of the event receiver, for consumers on another thread
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.event_rx.clone()
    }

    /// Ask a parked (`Error`) client to start over with a fresh retry budget
    pub fn reconnect(&self) -> Result<()> {
        self.command_tx
            .send(ClientCommand::Reconnect)
            .map_err(|e| FeedError::ChannelSend(e.to_string()))
    }

    pub fn shutdown_flag(&self) -> &Arc<AtomicBool> {
        &self.config.shutdown_flag
    }

    /// Close the connection, cancel any pending reconnect and join the
    /// handler threads
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down feed client for {}", self.config.url);
        self.stop();

        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }

        // Handler threads exit once the flag is observed or the senders drop
        let handles = std::mem::take(&mut self.handler_handles);
        debug!("Waiting for {} handler threads to complete", handles.len());
        for handle in handles {
            let _ = handle.join();
        }

        info!("Feed client for {} shut down", self.config.url);
        Ok(())
    }

    fn stop(&self) {
        self.config.shutdown_flag.store(false, Ordering::Release);
        let _ = self.command_tx.send(ClientCommand::Shutdown);
    }
}

impl<R> Drop for WebSocketClient<R>
where
    R: MessageRouter,
{
    fn drop(&mut self) {
        if self.task_handle.is_some() {
            self.stop();
        }
    }
}

#[inline]
fn running(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Acquire)
}

/// Main client task loop
async fn run_client<R>(
    config: Arc<ClientConfig<R>>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    event_tx: Sender<ClientEvent>,
) where
    R: MessageRouter,
{
    let mut reconnect_attempt = 0usize;
    let shutdown_flag = &config.shutdown_flag;

    'outer: loop {
        if !running(shutdown_flag) {
            debug!("Shutdown flag is false, exiting main loop");
            break;
        }

        state.set(ConnectionState::Connecting);
        if reconnect_attempt > 0 {
            let _ = event_tx.send(ClientEvent::Reconnecting(reconnect_attempt));
        }

        let connection_result = tokio::select! {
            result = connect_async(config.url.as_str()) => result,
            cmd = command_rx.recv() => match cmd {
                Some(ClientCommand::Reconnect) => continue,
                Some(ClientCommand::Shutdown) | None => break,
            },
        };

        match connection_result {
            Ok((ws_stream, _)) => {
                info!("Connected to {}", config.url);
                state.set(ConnectionState::Connected);
                let _ = event_tx.send(ClientEvent::Connected);
                reconnect_attempt = 0;

                match handle_connection(ws_stream, &config, &metrics, &mut command_rx).await {
                    Ok(ConnectionEnd::Shutdown) => break,
                    Ok(ConnectionEnd::Dropped) => {}
                    Err(e) => {
                        warn!("Connection to {} lost: {}", config.url, e);
                        let _ = event_tx.send(ClientEvent::Error(e.to_string()));
                    }
                }

                state.set(ConnectionState::Disconnected);
                let _ = event_tx.send(ClientEvent::Disconnected);
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", config.url, e);
                state.set(ConnectionState::Disconnected);
                let _ = event_tx.send(ClientEvent::Error(e.to_string()));
            }
        }

        if !running(shutdown_flag) {
            debug!("Shutdown flag set during connection, stopping reconnection");
            break;
        }

        match config.reconnect_strategy.next_delay(reconnect_attempt) {
            Some(delay) => {
                info!(
                    "Reconnecting to {} in {:?} (attempt {})",
                    config.url,
                    delay,
                    reconnect_attempt + 1
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    cmd = command_rx.recv() => match cmd {
                        Some(ClientCommand::Reconnect) => {
                            debug!("Reconnect requested during backoff, connecting now");
                        }
                        Some(ClientCommand::Shutdown) | None => break 'outer,
                    },
                }

                reconnect_attempt += 1;
                metrics.increment_reconnects();
            }
            None => {
                warn!(
                    "Reconnection strategy exhausted for {} after {} attempts",
                    config.url, reconnect_attempt
                );
                state.set(ConnectionState::Error);
                let _ = event_tx.send(ClientEvent::Exhausted);

                // Parked until someone explicitly asks for a reconnect
                loop {
                    match command_rx.recv().await {
                        Some(ClientCommand::Reconnect) => {
                            info!("Explicit reconnect requested for {}", config.url);
                            reconnect_attempt = 0;
                            continue 'outer;
                        }
                        Some(ClientCommand::Shutdown) | None => break 'outer,
                    }
                }
            }
        }
    }

    if !state.is_error() {
        state.set(ConnectionState::Disconnected);
    }
    info!("Feed client task for {} exiting", config.url);
}

/// Pump frames from one open connection until it ends
async fn handle_connection<R>(
    ws_stream: WsStream,
    config: &ClientConfig<R>,
    metrics: &AtomicMetrics,
    command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
) -> Result<ConnectionEnd>
where
    R: MessageRouter,
{
    let (mut write, mut read) = ws_stream.split();
    let shutdown_flag = &config.shutdown_flag;

    // Re-armed on every connection
    let mut awaiting_handshake = config.discard_first_message;

    loop {
        if !running(shutdown_flag) {
            debug!("Shutdown flag detected in message loop, closing connection");
            let _ = write.close().await;
            return Ok(ConnectionEnd::Shutdown);
        }

        tokio::select! {
            msg = read.next() => {
                let ws_msg = match msg {
                    Some(Ok(Message::Text(text))) => WsMessage::Text(text),
                    Some(Ok(Message::Binary(data))) => WsMessage::Binary(data),
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Server closed {}: {:?}", config.url, frame);
                        return Ok(ConnectionEnd::Dropped);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(FeedError::WebSocket(e.to_string())),
                    None => return Err(FeedError::ConnectionClosed("Stream ended".into())),
                };

                metrics.increment_received();

                if awaiting_handshake {
                    awaiting_handshake = false;
                    metrics.increment_handshakes();
                    debug!("Discarded handshake token from {} ({} bytes)", config.url, ws_msg.len());
                    continue;
                }

                route_message(config, metrics, ws_msg).await;
            }

            cmd = command_rx.recv() => match cmd {
                Some(ClientCommand::Reconnect) => {
                    debug!("Reconnect requested while connected to {}, ignoring", config.url);
                }
                Some(ClientCommand::Shutdown) | None => {
                    info!("Received shutdown command");
                    let _ = write.close().await;
                    return Ok(ConnectionEnd::Shutdown);
                }
            },
        }
    }
}

/// Parse one frame and hand it to the handler for its route
///
/// Parsing happens inline so frames keep their arrival order.
async fn route_message<R>(config: &ClientConfig<R>, metrics: &AtomicMetrics, message: WsMessage)
where
    R: MessageRouter,
{
    match config.router.parse(message).await {
        Ok(parsed) => {
            if !running(&config.shutdown_flag) {
                debug!("Shutdown detected after parse, discarding message");
                return;
            }

            let route_key = config.router.route_key(&parsed);
            match config.route_senders.get(&route_key) {
                // A closed channel only happens during shutdown
                Some(sender) => {
                    let _ = sender.send(parsed);
                }
                None => warn!("No handler configured for route key: {:?}", route_key),
            }
        }
        Err(e) => {
            metrics.increment_parse_failures();
            warn!("Skipping undecodable frame from {}: {}", config.url, e);
        }
    }
}
