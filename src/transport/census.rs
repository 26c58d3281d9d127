//! Websocket implementation of the event stream.
//!
//! Connects to the PS2 census push endpoint and surfaces raw text frames.
//! Ping/pong and binary frames are handled here; everything else is passed
//! through for the parser to classify. Disconnects are surfaced, never
//! retried internally - the pipeline owns the reconnect schedule.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{EventStream, StreamMessage, Subscription, TransportError};

const CENSUS_PUSH_ENDPOINT: &str = "wss://push.planetside2.com/streaming?environment=ps2";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A census event-streaming session.
pub struct CensusStream {
    url: String,
    socket: Option<Socket>,
}

impl CensusStream {
    /// Creates a disconnected session for the given census service ID
    /// (including the `s:` prefix).
    pub fn new(service_id: &str) -> Self {
        CensusStream {
            url: format!("{CENSUS_PUSH_ENDPOINT}&service-id={service_id}"),
            socket: None,
        }
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::NotConnected)?;
        socket
            .send(Message::Text(frame))
            .await
            .map_err(TransportError::Send)
    }
}

impl EventStream for CensusStream {
    async fn connect(&mut self) -> Result<(), TransportError> {
        // Drop any half-dead session before dialing a new one.
        self.close().await;
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(TransportError::Connect)?;
        self.socket = Some(socket);
        info!("connected to census event stream");
        Ok(())
    }

    async fn subscribe(&mut self, subscription: &Subscription) -> Result<(), TransportError> {
        debug!(
            worlds = ?subscription.worlds,
            events = subscription.event_names.len(),
            "subscribing"
        );
        self.send(subscription.subscribe_action()).await
    }

    async fn unsubscribe(&mut self, subscription: &Subscription) -> Result<(), TransportError> {
        debug!(worlds = ?subscription.worlds, "clearing subscription");
        self.send(subscription.clear_action()).await
    }

    async fn next_message(&mut self) -> StreamMessage {
        let Some(socket) = self.socket.as_mut() else {
            return StreamMessage::Disconnected {
                reason: "not connected".to_string(),
            };
        };
        let reason = loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return StreamMessage::Text(text),
                Some(Ok(Message::Close(_))) => break "closed by server".to_string(),
                // Pings are answered by tungstenite itself; binary and pong
                // frames carry nothing for us.
                Some(Ok(_)) => continue,
                Some(Err(err)) => break err.to_string(),
                None => break "stream ended".to_string(),
            }
        };
        self.socket = None;
        StreamMessage::Disconnected { reason }
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
    }
}
