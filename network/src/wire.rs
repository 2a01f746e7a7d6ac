//! JSON text frames of the subscription protocol.
//!
//! ```text
//! {"type":"transaction","id":"<txid>","block_height":h,"block_time":t,"transaction":"<base64>"}
//! {"type":"mempool","id":"<txid>","transaction":"<base64>"}
//! {"type":"status","status":"block-done","block":h}
//! {"type":"error","message":"..."}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bap_types::{BlockHeight, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

use crate::{FeedError, FeedEvent, FeedTransaction, StatusKind};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Frame {
    Transaction {
        id: TxHash,
        block_height: BlockHeight,
        block_time: u64,
        transaction: String,
    },
    Mempool {
        id: TxHash,
        transaction: String,
    },
    Status {
        status: StatusKind,
        #[serde(default)]
        block: BlockHeight,
    },
    Error {
        message: String,
    },
}

fn decode_raw(text: &str) -> Result<Vec<u8>, FeedError> {
    STANDARD
        .decode(text)
        .map_err(|e| FeedError::MalformedFrame(format!("transaction is not base64: {e}")))
}

pub fn parse_frame(text: &str) -> Result<FeedEvent, FeedError> {
    let frame: Frame =
        serde_json::from_str(text).map_err(|e| FeedError::MalformedFrame(e.to_string()))?;
    Ok(match frame {
        Frame::Transaction {
            id,
            block_height,
            block_time,
            transaction,
        } => FeedEvent::Transaction(FeedTransaction {
            id,
            height: block_height,
            time: Timestamp::new(block_time),
            raw: decode_raw(&transaction)?,
        }),
        Frame::Mempool { id, transaction } => FeedEvent::Mempool(FeedTransaction {
            id,
            height: 0,
            time: Timestamp::EPOCH,
            raw: decode_raw(&transaction)?,
        }),
        Frame::Status { status, block } => FeedEvent::Status {
            kind: status,
            height: block,
        },
        Frame::Error { message } => FeedEvent::Error(message),
    })
}

pub fn encode_frame(event: &FeedEvent) -> String {
    let frame = match event {
        FeedEvent::Transaction(tx) => Frame::Transaction {
            id: tx.id,
            block_height: tx.height,
            block_time: tx.time.as_secs(),
            transaction: STANDARD.encode(&tx.raw),
        },
        FeedEvent::Mempool(tx) => Frame::Mempool {
            id: tx.id,
            transaction: STANDARD.encode(&tx.raw),
        },
        FeedEvent::Status { kind, height } => Frame::Status {
            status: *kind,
            block: *height,
        },
        FeedEvent::Error(message) => Frame::Error {
            message: message.clone(),
        },
    };
    // A derived Serialize over strings and integers cannot fail.
    serde_json::to_string(&frame).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    #[test]
    fn parses_transaction_frame() {
        let text = format!(
            r#"{{"type":"transaction","id":"{TXID}","block_height":574300,"block_time":1550000000,"transaction":"AQID"}}"#
        );
        let FeedEvent::Transaction(tx) = parse_frame(&text).unwrap() else {
            panic!("expected transaction");
        };
        assert_eq!(tx.id.to_string(), TXID);
        assert_eq!(tx.height, 574_300);
        assert_eq!(tx.time.as_secs(), 1_550_000_000);
        assert_eq!(tx.raw, vec![1, 2, 3]);
    }

    #[test]
    fn mempool_frames_have_no_block() {
        let text = format!(r#"{{"type":"mempool","id":"{TXID}","transaction":""}}"#);
        let FeedEvent::Mempool(tx) = parse_frame(&text).unwrap() else {
            panic!("expected mempool");
        };
        assert_eq!(tx.height, 0);
        assert_eq!(tx.time, Timestamp::EPOCH);
        assert!(tx.context().is_mempool());
    }

    #[test]
    fn parses_status_codes() {
        let cases = [
            ("connected", StatusKind::Connected),
            ("disconnected", StatusKind::Disconnected),
            ("block-done", StatusKind::BlockDone),
            ("waiting", StatusKind::Waiting),
            ("reorg", StatusKind::Reorg),
            ("something-new", StatusKind::Unknown),
        ];
        for (text, kind) in cases {
            let frame = format!(r#"{{"type":"status","status":"{text}","block":12}}"#);
            assert_eq!(parse_frame(&frame).unwrap(), FeedEvent::status(kind, 12));
        }
    }

    #[test]
    fn status_block_defaults_to_zero() {
        let event = parse_frame(r#"{"type":"status","status":"waiting"}"#).unwrap();
        assert_eq!(event, FeedEvent::status(StatusKind::Waiting, 0));
    }

    #[test]
    fn rejects_malformed_frames() {
        for text in [
            "",
            "not json",
            r#"{"type":"unknown"}"#,
            r#"{"type":"transaction","id":"zz","block_height":1,"block_time":1,"transaction":""}"#,
            &format!(r#"{{"type":"mempool","id":"{TXID}","transaction":"!!"}}"#),
        ] {
            assert!(
                matches!(parse_frame(text), Err(FeedError::MalformedFrame(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn encoded_frames_parse_back() {
        let events = [
            FeedEvent::Transaction(FeedTransaction {
                id: TxHash::new([9; 32]),
                height: 600_000,
                time: Timestamp::new(1_570_000_000),
                raw: vec![0xde, 0xad],
            }),
            FeedEvent::status(StatusKind::BlockDone, 600_000),
            FeedEvent::Error("boom".into()),
        ];
        for event in events {
            assert_eq!(parse_frame(&encode_frame(&event)).unwrap(), event);
        }
    }

    proptest! {
        #[test]
        fn arbitrary_text_never_panics(text in ".{0,256}") {
            let _ = parse_frame(&text);
        }
    }
}
