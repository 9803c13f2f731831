//! One live realtime connection for one session.
//!
//! A [`SessionConnection`] is created per session binding and moves through
//! `Connecting → Connected → Disconnected` exactly once.  The transport is
//! driven by a background task; everything it observes comes back as
//! [`ConnectionEvent`]s that the owner applies in arrival order with
//! [`SessionConnection::next_event`] or [`SessionConnection::drain`].  Only
//! the owner mutates the timeline, so fragment order is the transport's
//! order.
//!
//! Dropping the connection cancels the driver and closes the transport.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::observability::{
    CONNECTION_CLOSES, CONNECTION_DROPPED_SENDS, CONNECTION_FAILURES, CONNECTION_FRAGMENT_BYTES,
    CONNECTION_FRAGMENTS, CONNECTION_OPEN_LATENCY, CONNECTION_OPENS, CONNECTION_SENDS,
};
use crate::timeline::{MessageEntry, Timeline};
use crate::transport::{Connector, FrameSink, FrameStream};
use crate::types::SessionId;

/// How long a local close waits for the peer to acknowledge.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle state of a session connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// The transport is being opened.
    Connecting,
    /// The transport is open; sends are accepted.
    Connected,
    /// Closed for good, or never opened.
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The peer confirmed the connection.
    Opened,
    /// A reply fragment arrived.
    Fragment(String),
    /// The transport closed.  `reason` is set when it closed because of an error.
    Closed {
        /// Why the transport failed, if it did.
        reason: Option<String>,
    },
}

/// Why a message was not sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The message was empty or only whitespace.
    Empty,
    /// The connection is not open.
    NotConnected,
    /// No session is bound.
    NoSession,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Empty => write!(f, "message is empty"),
            DropReason::NotConnected => write!(f, "not connected"),
            DropReason::NoSession => write!(f, "no session selected"),
        }
    }
}

/// The result of asking to send a message.  Sending never fails loudly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SendOutcome {
    /// The message was echoed locally and handed to the transport.
    Sent,
    /// The message was ignored.
    Dropped(DropReason),
}

impl SendOutcome {
    /// True if the message went out.
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

/// The transport and timeline of one bound session.
pub struct SessionConnection {
    session: SessionId,
    status: ConnectionStatus,
    timeline: Timeline,
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl SessionConnection {
    /// Starts connecting to `session`, seeding the conversation with `timeline`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(connector: Arc<dyn Connector>, session: SessionId, timeline: Timeline) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        debug!(session_id = %session, "opening session connection");
        tokio::spawn(drive(
            connector,
            session,
            outbound_rx,
            events_tx,
            cancel.clone(),
        ));
        Self {
            session,
            status: ConnectionStatus::Connecting,
            timeline,
            outbound: outbound_tx,
            events: events_rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// The bound session.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// The conversation so far.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The entries of the conversation so far.
    pub fn messages(&self) -> &[MessageEntry] {
        self.timeline.snapshot()
    }

    /// Echoes `text` into the timeline, opens a pending reply, and transmits it.
    ///
    /// Returns immediately; nothing waits for the backend.  While not
    /// connected the message is dropped and the timeline left alone.
    pub fn send(&mut self, text: &str) -> SendOutcome {
        // Fragments that already arrived belong before the new message.
        self.drain();
        if self.status != ConnectionStatus::Connected {
            CONNECTION_DROPPED_SENDS.click();
            debug!(session_id = %self.session, status = %self.status, "dropping send");
            return SendOutcome::Dropped(DropReason::NotConnected);
        }
        self.timeline.append(MessageEntry::user(text));
        self.timeline.begin_streaming_assistant_entry();
        if self.outbound.send(text.to_string()).is_err() {
            // The driver is gone; its Closed event is already queued.
            debug!(session_id = %self.session, "transport driver exited before send");
        }
        CONNECTION_SENDS.click();
        SendOutcome::Sent
    }

    /// Waits for the next transport event and applies it.
    ///
    /// Returns `None` once the connection is disconnected.  Cancel safe.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        if self.status == ConnectionStatus::Disconnected {
            return None;
        }
        match self.events.recv().await {
            Some(event) => {
                self.apply(&event);
                Some(event)
            }
            None => {
                self.mark_disconnected(None);
                None
            }
        }
    }

    /// Applies every event that has already arrived; returns how many.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while self.status != ConnectionStatus::Disconnected {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply(&event);
                    applied += 1;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.mark_disconnected(None);
                    break;
                }
            }
        }
        applied
    }

    /// Closes the transport and ends any reply still streaming.
    pub fn close(&mut self) {
        if self.status != ConnectionStatus::Disconnected {
            info!(session_id = %self.session, "closing session connection");
            self.mark_disconnected(None);
        }
    }

    fn apply(&mut self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                if self.status == ConnectionStatus::Connecting {
                    CONNECTION_OPENS.click();
                    info!(session_id = %self.session, "session connected");
                    self.status = ConnectionStatus::Connected;
                }
            }
            ConnectionEvent::Fragment(fragment) => {
                if self.status == ConnectionStatus::Disconnected {
                    return;
                }
                CONNECTION_FRAGMENTS.click();
                CONNECTION_FRAGMENT_BYTES.count(fragment.len() as u64);
                self.timeline.accumulate(fragment);
            }
            ConnectionEvent::Closed { reason } => {
                self.mark_disconnected(reason.as_deref());
            }
        }
    }

    fn mark_disconnected(&mut self, reason: Option<&str>) {
        if self.status == ConnectionStatus::Disconnected {
            return;
        }
        match reason {
            Some(reason) => {
                warn!(session_id = %self.session, error = reason, "session connection lost")
            }
            None => info!(session_id = %self.session, "session disconnected"),
        }
        CONNECTION_CLOSES.click();
        self.status = ConnectionStatus::Disconnected;
        self.timeline.end_turn();
        self.cancel.cancel();
    }
}

impl fmt::Debug for SessionConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConnection")
            .field("session", &self.session)
            .field("status", &self.status)
            .field("entries", &self.timeline.len())
            .finish()
    }
}

/// Owns the transport for the lifetime of one connection.
async fn drive(
    connector: Arc<dyn Connector>,
    session: SessionId,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connector.connect(session) => result,
    };
    let (mut sink, mut stream): (FrameSink, FrameStream) = match connected {
        Ok(halves) => halves,
        Err(err) => {
            CONNECTION_FAILURES.click();
            let _ = events.send(ConnectionEvent::Closed {
                reason: Some(err.to_string()),
            });
            return;
        }
    };
    CONNECTION_OPEN_LATENCY.add(started.elapsed().as_secs_f64());
    if events.send(ConnectionEvent::Opened).is_err() {
        return;
    }

    let reason = loop {
        tokio::select! {
            biased;
            Some(text) = outbound.recv() => {
                if let Err(err) = sink.send(text).await {
                    CONNECTION_FAILURES.click();
                    break Some(err.to_string());
                }
            }
            _ = cancel.cancelled() => {
                // Sends accepted before the close still go out.
                let _ = tokio::time::timeout(CLOSE_GRACE, flush_and_close(&mut sink, &mut outbound)).await;
                return;
            }
            frame = stream.next() => match frame {
                Some(Ok(fragment)) => {
                    if events.send(ConnectionEvent::Fragment(fragment)).is_err() {
                        return;
                    }
                }
                Some(Err(err)) => {
                    CONNECTION_FAILURES.click();
                    break Some(err.to_string());
                }
                None => break None,
            },
        }
    };
    let _ = events.send(ConnectionEvent::Closed { reason });
}

async fn flush_and_close(sink: &mut FrameSink, outbound: &mut mpsc::UnboundedReceiver<String>) {
    while let Ok(text) = outbound.try_recv() {
        if sink.send(text).await.is_err() {
            return;
        }
    }
    let _ = sink.close().await;
}
