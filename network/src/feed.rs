use bap_types::BlockHeight;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{FeedError, FeedEvent};

/// A source of transaction events.
pub trait SubscriptionFeed: Send + Sync + 'static {
    /// Start delivering events for blocks from `from` onward into `sink`.
    ///
    /// Delivery happens on a background task; a full `sink` blocks it.
    /// Must be called inside a tokio runtime.
    fn subscribe(
        &self,
        from: BlockHeight,
        sink: mpsc::Sender<FeedEvent>,
    ) -> Result<Subscription, FeedError>;
}

/// Handle to a running subscription. Dropping it cancels delivery.
#[derive(Debug)]
pub struct Subscription {
    from: BlockHeight,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a delivery task that stops when `cancel` fires or is dropped.
    pub fn new(from: BlockHeight, cancel: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            from,
            cancel: Some(cancel),
            task: Some(task),
        }
    }

    pub fn from_height(&self) -> BlockHeight {
        self.from
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop delivery and wait for the task to exit. No event is sent
    /// after this returns.
    pub async fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}
