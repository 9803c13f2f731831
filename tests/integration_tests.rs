//! Integration tests for the Jarvis client.
//! These tests run the websocket connector against a local tungstenite server.

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    use jarvis::{
        ClientConfig, ConnectionEvent, ConnectionStatus, SendOutcome, SessionConnection,
        SessionId, SpanKind, Timeline, WebSocketConnector, parse_thoughts,
    };

    /// What the server saw: the request path and every text frame received.
    struct Seen {
        path: oneshot::Receiver<String>,
        frames: oneshot::Receiver<Vec<String>>,
    }

    /// Accepts one websocket, answers the first text frame with `reply`,
    /// then hangs up once the client stops sending.
    async fn serve(reply: Vec<&'static str>) -> (SocketAddr, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (path_tx, path) = oneshot::channel();
        let (frames_tx, frames) = oneshot::channel();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                let _ = path_tx.send(request.uri().path().to_string());
                Ok(response)
            };
            let mut ws = accept_hdr_async(stream, callback).await.unwrap();
            let mut received = Vec::new();
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Text(text) => {
                        let first = received.is_empty();
                        received.push(text);
                        if first {
                            for fragment in &reply {
                                ws.send(Message::Text(fragment.to_string())).await.unwrap();
                            }
                        }
                        if received.len() == 2 {
                            let _ = ws.close(None).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            let _ = frames_tx.send(received);
        });
        (addr, Seen { path, frames })
    }

    fn connector(addr: SocketAddr) -> Arc<WebSocketConnector> {
        let config = ClientConfig::new()
            .with_base_url(&format!("http://{addr}/api/"))
            .unwrap();
        Arc::new(WebSocketConnector::from_config(&config).unwrap())
    }

    async fn next_fragment(connection: &mut SessionConnection) {
        match connection.next_event().await {
            Some(ConnectionEvent::Fragment(_)) => {}
            other => panic!("expected a fragment, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn streams_a_reply_over_websocket() {
        let (addr, seen) = serve(vec!["<think>", "plan", "</think>", "Hi ", "there"]).await;
        let mut connection =
            SessionConnection::open(connector(addr), SessionId::new(7), Timeline::new());
        assert_eq!(connection.status(), ConnectionStatus::Connecting);
        assert_eq!(connection.next_event().await, Some(ConnectionEvent::Opened));
        assert_eq!(seen.path.await.unwrap(), "/api/chat/ws/7");

        assert_eq!(connection.send("hello"), SendOutcome::Sent);
        for _ in 0..5 {
            next_fragment(&mut connection).await;
        }
        let messages = connection.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content(), "hello");
        assert_eq!(messages[1].content(), "<think>plan</think>Hi there");
        assert!(messages[1].is_growing());

        let spans = parse_thoughts(messages[1].content(), true);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].kind, SpanKind::Reasoning);
        assert_eq!(spans[0].text, "plan");
        assert!(spans[0].complete);
        assert_eq!(spans[1].kind, SpanKind::Answer);
        assert!(!spans[1].complete);

        // The second message finalizes the first reply; the server then hangs up.
        assert_eq!(connection.send("thanks"), SendOutcome::Sent);
        assert!(!connection.messages()[1].is_growing());
        while connection.next_event().await.is_some() {}
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
        assert_eq!(
            seen.frames.await.unwrap(),
            vec!["hello".to_string(), "thanks".to_string()]
        );
    }

    #[tokio::test]
    async fn refused_connection_reports_closed() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let mut connection =
            SessionConnection::open(connector(addr), SessionId::new(1), Timeline::new());
        let event = connection.next_event().await;
        assert!(matches!(
            event,
            Some(ConnectionEvent::Closed { reason: Some(_) })
        ));
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
        assert_eq!(
            connection.send("anyone?"),
            SendOutcome::Dropped(jarvis::DropReason::NotConnected)
        );
        assert!(connection.messages().is_empty());
    }

    #[tokio::test]
    async fn closing_the_connection_hangs_up() {
        let (addr, seen) = serve(vec![]).await;
        let mut connection =
            SessionConnection::open(connector(addr), SessionId::new(3), Timeline::new());
        assert_eq!(connection.next_event().await, Some(ConnectionEvent::Opened));
        connection.close();
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
        assert_eq!(connection.next_event().await, None);
        assert!(seen.frames.await.unwrap().is_empty());
    }
}
