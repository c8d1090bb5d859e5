//! Transport seam.
//!
//! A [`Connector`] opens a [`Link`]: a pair of channels carrying text frames
//! out and [`LinkEvent`]s in. Dropping the link closes the connection.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::errors::TransportError;

const LINK_QUEUE: usize = 64;

/// Inbound traffic on a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A text frame.
    Text(String),
    /// The peer closed the connection.
    Closed,
    /// The connection broke.
    Error(String),
}

/// An open connection.
#[derive(Debug)]
pub struct Link {
    /// Outbound text frames.
    pub outbound: mpsc::Sender<String>,
    /// Inbound events. Ends after `Closed` or `Error`.
    pub inbound: mpsc::Receiver<LinkEvent>,
}

/// Opens links to the server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new link.
    async fn connect(&self) -> Result<Link, TransportError>;
}

/// WebSocket connector.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Connector for a `ws://` or `wss://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Link, TransportError> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(url = %self.url, "websocket connected");

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(LINK_QUEUE);
        let (in_tx, in_rx) = mpsc::channel::<LinkEvent>(LINK_QUEUE);

        let _pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    out = out_rx.recv() => {
                        let Some(text) = out else {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        };
                        if let Err(e) = sink.send(Message::text(text)).await {
                            let _ = in_tx.send(LinkEvent::Error(e.to_string())).await;
                            break;
                        }
                    }
                    frame = stream.next() => {
                        let event = match frame {
                            Some(Ok(Message::Text(text))) => LinkEvent::Text(text.as_str().to_owned()),
                            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                                Ok(text) => LinkEvent::Text(text),
                                Err(_) => {
                                    warn!(len = data.len(), "discarding non-UTF-8 binary frame");
                                    continue;
                                }
                            },
                            Some(Ok(Message::Close(_))) | None => LinkEvent::Closed,
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => LinkEvent::Error(e.to_string()),
                        };
                        let terminal = !matches!(event, LinkEvent::Text(_));
                        if in_tx.send(event).await.is_err() || terminal {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

#[async_trait]
impl<C: Connector + ?Sized> Connector for std::sync::Arc<C> {
    async fn connect(&self) -> Result<Link, TransportError> {
        (**self).connect().await
    }
}
