//! WebSocket transport over tokio-tungstenite.
//!
//! [`WsConnector`] validates the endpoint URL once at construction and
//! produces one [`WsTransport`] per connect call. Binary, ping and pong
//! frames are handled below this layer and never reach the state machine.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

use super::{Connector, Transport, TransportEvent};

// ============================================================================
// Types
// ============================================================================

/// The underlying stream type produced by `connect_async`.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WsConnector
// ============================================================================

/// Connector that dials the game server's WebSocket endpoint.
///
/// # Example
///
/// ```ignore
/// use city_realtime::transport::WsConnector;
///
/// let connector = WsConnector::new("wss://play.example.com/ws")?;
/// let transport = connector.connect().await?;
/// ```
#[derive(Debug, Clone)]
pub struct WsConnector {
    /// Validated endpoint URL.
    url: Url,
}

impl WsConnector {
    /// Creates a connector for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL does not parse or its scheme is
    /// not `ws` or `wss`.
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| Error::config(format!("invalid endpoint url: {e}")))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "endpoint scheme must be ws or wss, got: {}",
                url.scheme()
            )));
        }

        Ok(Self { url })
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let (stream, response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        debug!(url = %self.url, status = %response.status(), "WebSocket connection established");

        Ok(Box::new(WsTransport { stream }))
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// A live tokio-tungstenite WebSocket connection.
pub struct WsTransport {
    /// The underlying WebSocket stream.
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<TransportEvent>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    trace!(len = text.len(), "Text frame received");
                    return Some(Ok(TransportEvent::Text(text.to_string())));
                }

                Ok(Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                        None => (super::ABNORMAL_CLOSURE, String::new()),
                    };
                    debug!(code, reason = %reason, "Close frame received");
                    return Some(Ok(TransportEvent::Closed { code, reason }));
                }

                Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                    // Not part of the protocol; keep reading.
                }

                Err(e) => return Some(Err(Error::WebSocket(e))),
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_accepts_ws_schemes() {
        assert!(WsConnector::new("ws://localhost:9000/ws").is_ok());
        assert!(WsConnector::new("wss://play.example.com/ws").is_ok());
    }

    #[test]
    fn test_connector_rejects_http_scheme() {
        let err = WsConnector::new("https://example.com/ws").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_connector_rejects_garbage() {
        let err = WsConnector::new("not a url").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_connector_keeps_url() {
        let connector = WsConnector::new("ws://localhost:9000/ws").expect("valid url");
        assert_eq!(connector.url().as_str(), "ws://localhost:9000/ws");
    }
}
