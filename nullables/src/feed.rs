//! Nullable feed: replays scripted event sessions instead of connecting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bap_network::{FeedError, FeedEvent, Subscription, SubscriptionFeed};
use bap_types::BlockHeight;
use tokio::sync::{mpsc, oneshot};

struct Session {
    events: Vec<FeedEvent>,
    hold_open: bool,
}

#[derive(Default)]
struct Script {
    sessions: VecDeque<Session>,
    subscriptions: Vec<BlockHeight>,
}

/// Each `subscribe` call plays the next queued session. A session either
/// ends the subscription after its last event (the consumer sees the
/// channel close) or holds it open until unsubscribed. With nothing
/// queued, a subscription stays open and silent.
#[derive(Clone, Default)]
pub struct NullFeed {
    script: Arc<Mutex<Script>>,
}

impl NullFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a session that closes after `events`.
    pub fn push_session(&self, events: Vec<FeedEvent>) {
        self.push(events, false);
    }

    /// Queue a session that stays open after `events`.
    pub fn push_open_session(&self, events: Vec<FeedEvent>) {
        self.push(events, true);
    }

    fn push(&self, events: Vec<FeedEvent>, hold_open: bool) {
        self.script
            .lock()
            .unwrap()
            .sessions
            .push_back(Session { events, hold_open });
    }

    /// Start heights of every subscribe call so far.
    pub fn subscriptions(&self) -> Vec<BlockHeight> {
        self.script.lock().unwrap().subscriptions.clone()
    }
}

impl SubscriptionFeed for NullFeed {
    fn subscribe(
        &self,
        from: BlockHeight,
        sink: mpsc::Sender<FeedEvent>,
    ) -> Result<Subscription, FeedError> {
        let session = {
            let mut script = self.script.lock().unwrap();
            script.subscriptions.push(from);
            script.sessions.pop_front().unwrap_or(Session {
                events: Vec::new(),
                hold_open: true,
            })
        };

        let (cancel, mut cancelled) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            for event in session.events {
                tokio::select! {
                    _ = &mut cancelled => return,
                    sent = sink.send(event) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            if session.hold_open {
                let _ = cancelled.await;
            }
        });
        Ok(Subscription::new(from, cancel, task))
    }
}
