//! The transaction subscription feed.
//!
//! A feed delivers mined transactions, unconfirmed transactions and
//! subscription status changes, in order, into a bounded channel owned by
//! the consumer. [`SubscriptionFeed`] is the seam: the daemon uses
//! [`WebSocketFeed`], tests use the scripted feed from `bap-nullables`.

pub mod backoff;
pub mod error;
pub mod event;
pub mod feed;
pub mod websocket;
pub mod wire;

pub use backoff::Backoff;
pub use error::FeedError;
pub use event::{FeedEvent, FeedTransaction, StatusKind};
pub use feed::{Subscription, SubscriptionFeed};
pub use websocket::WebSocketFeed;
