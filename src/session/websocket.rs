//! WebSocket transport to the live endpoint.
//!
//! `connect` performs the handshake and sends the setup message, then splits
//! the socket into a writer task (draining the outbound lanes, text first) and
//! a reader task (turning frames into [`TransportEvent`]s).

use crate::error::{CognitaError, Result};
use crate::session::event::TransportEvent;
use crate::session::protocol::{ClientMessage, SessionSetup, parse_server_frame};
use crate::session::transport::{
    Outbound, OutboundQueue, Transport, TransportLink, outbound_channel,
};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

pub struct WebSocketTransport {
    endpoint: String,
    api_key: Option<String>,
}

impl WebSocketTransport {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn request_url(&self) -> Result<Url> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CognitaError::TransportConnect {
                message: "no API key configured".to_string(),
            })?;
        Url::parse_with_params(&self.endpoint, &[("key", key)]).map_err(|e| {
            CognitaError::TransportConnect {
                message: format!("invalid endpoint {}: {}", self.endpoint, e),
            }
        })
    }
}

fn encode(item: &Outbound) -> Result<Message> {
    let msg = match item {
        Outbound::Text(text) => ClientMessage::text(text.clone()),
        Outbound::Audio(chunk) => ClientMessage::audio(chunk),
    };
    Ok(Message::Text(msg.to_json()?.into()))
}

async fn write_loop<S>(mut sink: S, mut queue: OutboundQueue, mut shutdown: oneshot::Receiver<()>)
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let item = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            item = queue.next() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let msg = match encode(&item) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!("Failed to serialize outbound message: {}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(msg).await {
            tracing::error!("Failed to send WebSocket message: {}", e);
            return;
        }
    }

    if let Err(e) = sink.send(Message::Close(None)).await {
        tracing::debug!("close frame not sent: {}", e);
    }
}

/// Map one frame to the events it carries.
fn frame_events(frame: Message) -> Vec<TransportEvent> {
    let payload = match frame {
        Message::Text(text) => text.as_bytes().to_vec(),
        Message::Binary(bytes) => bytes.to_vec(),
        Message::Close(frame) => {
            let reason = frame
                .map(|f| f.reason.as_str().to_string())
                .filter(|r| !r.is_empty());
            return vec![TransportEvent::Closed { reason }];
        }
        _ => return Vec::new(),
    };

    match parse_server_frame(&payload) {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("Ignoring unparseable server frame: {}", e);
            Vec::new()
        }
    }
}

async fn read_loop<S>(mut stream: S, events: mpsc::UnboundedSender<TransportEvent>)
where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                let _ = events.send(TransportEvent::Failed {
                    message: e.to_string(),
                });
                return;
            }
        };

        let closing = matches!(frame, Message::Close(_));
        for event in frame_events(frame) {
            tracing::trace!(?event, "inbound");
            if events.send(event).is_err() {
                return;
            }
        }
        if closing {
            tracing::info!("WebSocket closed by server");
            return;
        }
    }

    let _ = events.send(TransportEvent::Closed { reason: None });
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self, setup: &SessionSetup) -> Result<TransportLink> {
        let url = self.request_url()?;
        tracing::info!(endpoint = %self.endpoint, model = %setup.model, "connecting");

        let (mut ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| CognitaError::TransportConnect {
                message: e.to_string(),
            })?;

        let setup_json = setup.to_message().to_json()?;
        ws.send(Message::Text(setup_json.into()))
            .await
            .map_err(|e| CognitaError::TransportConnect {
                message: format!("failed to send setup: {}", e),
            })?;

        let (ws_sink, ws_stream) = ws.split();
        let (outbound, queue) = outbound_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        // The writer is left to finish on its own so the close frame goes out.
        tokio::spawn(write_loop(ws_sink, queue, shutdown_rx));
        let reader = tokio::spawn(read_loop(ws_stream, events_tx));

        Ok(TransportLink::new(outbound, events_rx, shutdown_tx).with_task(reader))
    }
}
