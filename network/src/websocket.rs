//! WebSocket subscription client.
//!
//! Connects to `<endpoint>/v1/subscribe/<subscription_id>?from_block=<h>`,
//! forwards every text frame as a [`FeedEvent`] and reconnects with
//! exponential backoff when the connection drops. Each reconnect resumes at
//! the block after the last `block-done` it delivered, and is bracketed by
//! `disconnected`/`connected` status events.

use std::time::Duration;

use bap_types::BlockHeight;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::wire::parse_frame;
use crate::{Backoff, FeedError, FeedEvent, StatusKind, Subscription, SubscriptionFeed};

const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct WebSocketFeed {
    endpoint: String,
    subscription_id: String,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl WebSocketFeed {
    pub fn new(endpoint: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            subscription_id: subscription_id.into(),
            backoff_base: RECONNECT_BASE_DELAY,
            backoff_max: MAX_RECONNECT_DELAY,
        }
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn subscribe_url(&self, from: BlockHeight) -> Result<String, FeedError> {
        let endpoint = self.endpoint.trim_end_matches('/');
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(FeedError::InvalidEndpoint(format!(
                "{endpoint}: expected a ws:// or wss:// URL"
            )));
        }
        if self.subscription_id.is_empty() || self.subscription_id.contains(['/', '?', '#']) {
            return Err(FeedError::InvalidEndpoint(format!(
                "bad subscription id {:?}",
                self.subscription_id
            )));
        }
        Ok(format!(
            "{endpoint}/v1/subscribe/{}?from_block={from}",
            self.subscription_id
        ))
    }
}

impl SubscriptionFeed for WebSocketFeed {
    fn subscribe(
        &self,
        from: BlockHeight,
        sink: mpsc::Sender<FeedEvent>,
    ) -> Result<Subscription, FeedError> {
        self.subscribe_url(from)?;
        let (cancel, cancelled) = oneshot::channel();
        let task = tokio::spawn(connection_loop(self.clone(), from, sink, cancelled));
        Ok(Subscription::new(from, cancel, task))
    }
}

async fn connection_loop(
    feed: WebSocketFeed,
    from: BlockHeight,
    sink: mpsc::Sender<FeedEvent>,
    mut cancelled: oneshot::Receiver<()>,
) {
    let mut resume = from;
    let mut backoff = Backoff::new(feed.backoff_base, feed.backoff_max);

    loop {
        let url = match feed.subscribe_url(resume) {
            Ok(url) => url,
            Err(e) => {
                forward(&sink, &mut cancelled, FeedEvent::Error(e.to_string())).await;
                return;
            }
        };

        let result = tokio::select! {
            _ = &mut cancelled => return,
            result = run_connection(&url, &sink, &mut resume, &mut backoff) => result,
        };

        match result {
            Err(FeedError::ConsumerClosed) => return,
            Err(e) => {
                warn!(error = %e, resume, "feed connection failed");
                if !forward(&sink, &mut cancelled, FeedEvent::Error(e.to_string())).await {
                    return;
                }
            }
            Ok(()) => info!(resume, "feed connection closed"),
        }

        let disconnected = FeedEvent::status(StatusKind::Disconnected, resume);
        if !forward(&sink, &mut cancelled, disconnected).await {
            return;
        }

        let delay = backoff.next_delay();
        debug!(?delay, attempt = backoff.attempts(), "reconnecting");
        tokio::select! {
            _ = &mut cancelled => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Send `event` unless the subscription is cancelled first. `false` means
/// the loop should exit.
async fn forward(
    sink: &mpsc::Sender<FeedEvent>,
    cancelled: &mut oneshot::Receiver<()>,
    event: FeedEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancelled => false,
        sent = sink.send(event) => sent.is_ok(),
    }
}

async fn deliver(sink: &mpsc::Sender<FeedEvent>, event: FeedEvent) -> Result<(), FeedError> {
    sink.send(event).await.map_err(|_| FeedError::ConsumerClosed)
}

/// One connection. Returns `Ok` when the server closes cleanly.
async fn run_connection(
    url: &str,
    sink: &mpsc::Sender<FeedEvent>,
    resume: &mut BlockHeight,
    backoff: &mut Backoff,
) -> Result<(), FeedError> {
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
    backoff.reset();
    info!(%url, "feed connected");
    deliver(sink, FeedEvent::status(StatusKind::Connected, *resume)).await?;

    let (mut write, mut read) = stream.split();
    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => match parse_frame(&text) {
                Ok(event) => {
                    if let FeedEvent::Status {
                        kind: StatusKind::BlockDone,
                        height,
                    } = event
                    {
                        *resume = (*resume).max(height.saturating_add(1));
                    }
                    deliver(sink, event).await?;
                }
                Err(e) => {
                    warn!(error = %e, "dropping feed frame");
                    deliver(sink, FeedEvent::Error(e.to_string())).await?;
                }
            },
            Message::Ping(data) => write.send(Message::Pong(data)).await?,
            Message::Close(_) => return Ok(()),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_frame;
    use crate::FeedTransaction;
    use bap_types::{Timestamp, TxHash};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    #[test]
    fn builds_subscribe_url() {
        let feed = WebSocketFeed::new("wss://feed.example/", "abc");
        assert_eq!(
            feed.subscribe_url(574_287).unwrap(),
            "wss://feed.example/v1/subscribe/abc?from_block=574287"
        );
    }

    #[test]
    fn rejects_bad_endpoints() {
        assert!(WebSocketFeed::new("http://x", "abc").subscribe_url(0).is_err());
        assert!(WebSocketFeed::new("ws://x", "").subscribe_url(0).is_err());
        assert!(WebSocketFeed::new("ws://x", "a/b").subscribe_url(0).is_err());
    }

    /// Serves `frames` to each connection in turn, recording request paths.
    async fn serve(sessions: Vec<Vec<FeedEvent>>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = paths.clone();
        tokio::spawn(async move {
            for frames in sessions {
                let (stream, _) = listener.accept().await.unwrap();
                let seen = seen.clone();
                let callback = move |req: &Request, resp: Response| {
                    seen.lock().unwrap().push(req.uri().to_string());
                    Ok::<_, ErrorResponse>(resp)
                };
                let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                    .await
                    .unwrap();
                for frame in frames {
                    ws.send(Message::Text(encode_frame(&frame).into())).await.unwrap();
                }
                ws.close(None).await.unwrap();
            }
        });
        (format!("ws://{addr}"), paths)
    }

    fn tx(height: BlockHeight) -> FeedEvent {
        FeedEvent::Transaction(FeedTransaction {
            id: TxHash::new([height as u8; 32]),
            height,
            time: Timestamp::new(1),
            raw: vec![1, 2, 3],
        })
    }

    async fn next(rx: &mut mpsc::Receiver<FeedEvent>) -> FeedEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_frames_and_resumes_after_last_block_done() {
        let (endpoint, paths) = serve(vec![
            vec![tx(100), FeedEvent::status(StatusKind::BlockDone, 100), tx(101)],
            vec![tx(101)],
        ])
        .await;
        let feed = WebSocketFeed::new(endpoint, "sub")
            .with_backoff(Duration::from_millis(10), Duration::from_millis(20));
        let (sink, mut rx) = mpsc::channel(16);
        let sub = feed.subscribe(100, sink).unwrap();

        assert_eq!(next(&mut rx).await, FeedEvent::status(StatusKind::Connected, 100));
        assert_eq!(next(&mut rx).await, tx(100));
        assert_eq!(next(&mut rx).await, FeedEvent::status(StatusKind::BlockDone, 100));
        assert_eq!(next(&mut rx).await, tx(101));
        assert_eq!(next(&mut rx).await, FeedEvent::status(StatusKind::Disconnected, 101));
        assert_eq!(next(&mut rx).await, FeedEvent::status(StatusKind::Connected, 101));
        assert_eq!(next(&mut rx).await, tx(101));

        sub.unsubscribe().await;
        let paths = paths.lock().unwrap().clone();
        assert_eq!(
            paths,
            vec![
                "/v1/subscribe/sub?from_block=100".to_string(),
                "/v1/subscribe/sub?from_block=101".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_and_retries() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let feed = WebSocketFeed::new(format!("ws://{addr}"), "sub")
            .with_backoff(Duration::from_millis(5), Duration::from_millis(5));
        let (sink, mut rx) = mpsc::channel(16);
        let sub = feed.subscribe(7, sink).unwrap();

        for _ in 0..2 {
            assert!(matches!(next(&mut rx).await, FeedEvent::Error(_)));
            assert_eq!(next(&mut rx).await, FeedEvent::status(StatusKind::Disconnected, 7));
        }
        sub.unsubscribe().await;
    }

    #[tokio::test]
    async fn unsubscribe_returns_while_the_queue_is_full() {
        let (endpoint, _) = serve(vec![vec![]]).await;
        let feed = WebSocketFeed::new(endpoint, "sub")
            .with_backoff(Duration::from_millis(10), Duration::from_millis(20));
        let (sink, rx) = mpsc::channel(1);
        let sub = feed.subscribe(5, sink).unwrap();

        // `connected` fills the queue; the close leaves `disconnected` pending.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.len(), 1);

        tokio::time::timeout(Duration::from_secs(3), sub.unsubscribe())
            .await
            .expect("unsubscribe completes with a full queue");
        drop(rx);
    }
}
