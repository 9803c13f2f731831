//! The realtime transport seam.
//!
//! A [`Connector`] opens one bidirectional text channel per session and hands
//! back its two halves.  Frames carry plain text in both directions with no
//! envelope: outbound frames are the user's message verbatim and inbound
//! frames are reply fragments.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::SessionId;

/// Outbound half of a session transport.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of a session transport.  The stream ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Opens session transports.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens the transport for `session`, resolving once the peer has
    /// confirmed the connection.
    async fn connect(&self, session: SessionId) -> Result<(FrameSink, FrameStream)>;
}

/// Connects to the backend's chat websocket at `{root}{session_id}`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    root: Url,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Creates a connector below `root`, which must end in a `/`.
    pub fn new(root: Url, connect_timeout: Duration) -> Result<Self> {
        if root.cannot_be_a_base() || !root.path().ends_with('/') {
            return Err(Error::config(format!(
                "websocket root {root} must be a base URL ending in '/'"
            )));
        }
        match root.scheme() {
            "ws" | "wss" => Ok(Self {
                root,
                connect_timeout,
            }),
            scheme => Err(Error::config(format!(
                "websocket root must use ws or wss, not {scheme}"
            ))),
        }
    }

    /// Creates a connector for the websocket root derived from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.websocket_root()?, config.connect_timeout)
    }

    /// The address of `session`'s channel.
    pub fn session_url(&self, session: SessionId) -> Result<Url> {
        Ok(self.root.join(&session.to_string())?)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, session: SessionId) -> Result<(FrameSink, FrameStream)> {
        let url = self.session_url(session)?;
        let (socket, _response) = tokio::time::timeout(
            self.connect_timeout,
            connect_async(url.as_str()),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("websocket handshake with {url} timed out"),
                Some(self.connect_timeout.as_secs_f64()),
            )
        })?
        .map_err(|err| {
            Error::transport(format!("failed to open {url}: {err}"), Some(Box::new(err)))
        })?;

        let (sink, stream) = socket.split();
        let sink = sink
            .sink_map_err(|err| {
                Error::transport(format!("websocket send failed: {err}"), Some(Box::new(err)))
            })
            .with(|text: String| future::ready(Ok::<_, Error>(Message::Text(text))));
        let stream = stream.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(String::from_utf8(bytes).map_err(|err| {
                    Error::encoding("binary frame is not UTF-8", Some(Box::new(err)))
                })),
                // ping, pong, and close are handled by tungstenite
                Ok(_) => None,
                Err(err) => Some(Err(Error::transport(
                    format!("websocket receive failed: {err}"),
                    Some(Box::new(err)),
                ))),
            })
        });
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! An in-memory [`Connector`] whose far end is driven by the test.

    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::channel::mpsc as fmpsc;
    use tokio::sync::mpsc;

    use super::*;

    /// The far end of one in-memory connection.
    pub(crate) struct FakePeer {
        pub session: SessionId,
        pub received: fmpsc::UnboundedReceiver<String>,
        pub fragments: fmpsc::UnboundedSender<Result<String>>,
    }

    impl FakePeer {
        pub fn push(&self, fragment: &str) {
            let _ = self.fragments.unbounded_send(Ok(fragment.to_string()));
        }

        pub fn fail(&self, message: &str) {
            let _ = self
                .fragments
                .unbounded_send(Err(Error::transport(message, None)));
        }

        pub fn hang_up(&self) {
            self.fragments.close_channel();
        }

        pub async fn next_sent(&mut self) -> Option<String> {
            self.received.next().await
        }
    }

    pub(crate) struct ChannelConnector {
        peers: mpsc::UnboundedSender<FakePeer>,
        refuse: AtomicBool,
    }

    impl ChannelConnector {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<FakePeer>) {
            let (peers, accepted) = mpsc::unbounded_channel();
            let connector = Self {
                peers,
                refuse: AtomicBool::new(false),
            };
            (connector, accepted)
        }

        pub fn refuse_connections(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Connector for ChannelConnector {
        async fn connect(&self, session: SessionId) -> Result<(FrameSink, FrameStream)> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(Error::transport("connection refused", None));
            }
            let (sent_tx, sent_rx) = fmpsc::unbounded();
            let (fragments_tx, fragments_rx) = fmpsc::unbounded();
            self.peers
                .send(FakePeer {
                    session,
                    received: sent_rx,
                    fragments: fragments_tx,
                })
                .map_err(|_| Error::transport("test harness went away", None))?;
            let sink = sent_tx.sink_map_err(|err| Error::transport(err.to_string(), None));
            Ok((Box::pin(sink), Box::pin(fragments_rx)))
        }
    }
}
