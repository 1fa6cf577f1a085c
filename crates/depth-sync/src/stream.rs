//! Diff stream source
//!
//! Reads `<symbol>@depth` frames from a [`Transport`], parses them, and feeds
//! them to the coordinator in arrival order. Reconnects with backoff and
//! reports connection changes to the coordinator as well.

use crate::{
    config::SyncConfig,
    coordinator::Command,
    events::{ConnectionEvent, DisconnectReason},
    reconnect::ReconnectConfig,
    transport::{Transport, TransportError, WsTransport},
};
use depth_types::{DepthError, DepthResult, DepthUpdate, Symbol};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How a connected session ended
enum SessionEnd {
    /// Connection dropped; reconnect
    Lost(DisconnectReason),
    /// Coordinator is gone; stop
    Abandoned,
}

/// Diff stream for one instrument
pub struct DepthStream<T: Transport> {
    transport: T,
    symbol: Symbol,
    reconnect: ReconnectConfig,
    commands: mpsc::Sender<Command>,
}

impl DepthStream<WsTransport> {
    /// Stream for `symbol` over a real WebSocket, per `config`
    pub fn websocket(config: &SyncConfig, symbol: Symbol, commands: mpsc::Sender<Command>) -> Self {
        let url = config.endpoint.stream_url(&symbol, config.speed);
        debug!(symbol = %symbol, url = %url, "Opening depth stream");
        let transport = WsTransport::new(url).with_timeout(config.connect_timeout);
        Self::new(transport, symbol, config.reconnect.clone(), commands)
    }
}

impl<T: Transport> DepthStream<T> {
    /// Create a stream over an arbitrary transport
    pub fn new(
        transport: T,
        symbol: Symbol,
        reconnect: ReconnectConfig,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            transport,
            symbol,
            reconnect,
            commands,
        }
    }

    /// Instrument this stream carries
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Run until the coordinator goes away or reconnection gives up
    pub async fn run(mut self) -> DepthResult<()> {
        let url = self.transport.endpoint().to_string();
        let mut attempt: u32 = 0;

        loop {
            let last_error = match self.transport.connect().await {
                Ok(()) => {
                    attempt = 0;
                    info!(symbol = %self.symbol, url = %url, "Depth stream connected");
                    if !self.notify(ConnectionEvent::Connected { url: url.clone() }).await {
                        return Ok(());
                    }

                    match self.pump().await {
                        SessionEnd::Abandoned => {
                            let _ = self.transport.close().await;
                            return Ok(());
                        }
                        SessionEnd::Lost(reason) => {
                            warn!(symbol = %self.symbol, reason = ?reason, "Depth stream lost");
                            let error = format!("{reason:?}");
                            if !self.notify(ConnectionEvent::Disconnected { reason }).await {
                                return Ok(());
                            }
                            error
                        }
                    }
                }
                Err(e) => {
                    warn!(symbol = %self.symbol, url = %url, error = %e, "Depth stream connect failed");
                    e.to_string()
                }
            };

            attempt += 1;
            if !self.reconnect.should_reconnect(attempt) {
                error!(
                    symbol = %self.symbol,
                    attempts = attempt - 1,
                    "Reconnection attempts exhausted"
                );
                self.notify(ConnectionEvent::ReconnectFailed {
                    error: last_error.clone(),
                })
                .await;
                return Err(DepthError::WebSocket(last_error));
            }

            let delay = self.reconnect.delay_with_jitter(attempt);
            info!(symbol = %self.symbol, attempt, delay = ?delay, "Reconnecting depth stream");
            if !self
                .notify(ConnectionEvent::Reconnecting { attempt, delay })
                .await
            {
                return Ok(());
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Forward frames until the connection ends
    async fn pump(&mut self) -> SessionEnd {
        loop {
            let frame = match self.transport.recv().await {
                Ok(Some(frame)) => frame,
                Ok(None) => return SessionEnd::Lost(DisconnectReason::ServerClosed),
                Err(TransportError::Timeout(_)) => return SessionEnd::Lost(DisconnectReason::Timeout),
                Err(e) => return SessionEnd::Lost(DisconnectReason::NetworkError(e.to_string())),
            };

            let update = match DepthUpdate::parse(&frame) {
                Ok(update) => update,
                Err(e) => {
                    warn!(symbol = %self.symbol, error = %e, frame = %frame, "Skipping unparsable frame");
                    continue;
                }
            };

            if update.event_type != DepthUpdate::EVENT_TYPE {
                debug!(event_type = %update.event_type, "Skipping non-depth event");
                continue;
            }

            if self.commands.send(Command::Diff(update)).await.is_err() {
                return SessionEnd::Abandoned;
            }
        }
    }

    /// Report a connection change; false if the coordinator is gone
    async fn notify(&self, event: ConnectionEvent) -> bool {
        self.commands.send(Command::Connection(event)).await.is_ok()
    }
}
