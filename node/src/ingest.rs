//! Bulk ingestion worker.
//!
//! Replays a block's staged records against the persistent store. Records
//! that share a lane key run sequentially in input order; distinct lanes fan
//! out, bounded by a fixed permit pool. `ingest` returns only after every
//! lane has finished, so a caller never checkpoints ahead of its writes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bap_store::{IndexStore, StagedRecord, StoreError};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Longest staging-file line accepted.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("staging I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{}:{line}: malformed record: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{}:{line}: line exceeds {MAX_LINE_BYTES} bytes", path.display())]
    LineTooLong { path: PathBuf, line: usize },

    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error("ingest task failed: {0}")]
    Task(String),
}

impl IngestError {
    /// Staging-file problems can be retried by rebuilding the block; store
    /// and task failures cannot.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Malformed { .. } | Self::LineTooLong { .. }
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub records: usize,
    pub lanes: usize,
}

#[derive(Clone)]
pub struct IngestWorker {
    store: Arc<dyn IndexStore>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl IngestWorker {
    pub fn new(store: Arc<dyn IndexStore>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            store,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Persist `records`. The first failure aborts the remaining lanes and
    /// is returned.
    pub async fn ingest(&self, records: Vec<StagedRecord>) -> Result<IngestStats, IngestError> {
        let lanes = into_lanes(records);
        let stats = IngestStats {
            records: lanes.iter().map(Vec::len).sum(),
            lanes: lanes.len(),
        };

        let mut tasks = JoinSet::new();
        for lane in lanes {
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&self.permits);
            tasks.spawn(persist_lane(store, permits, lane));
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Err(IngestError::Task(e.to_string())),
            };
            if let Err(e) = result {
                if failure.is_none() {
                    error!(error = %e, "ingest batch aborted");
                    tasks.abort_all();
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                debug!(records = stats.records, lanes = stats.lanes, "batch ingested");
                Ok(stats)
            }
        }
    }

    /// Read a staging file and ingest it.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestStats, IngestError> {
        let owned = path.to_path_buf();
        let records = tokio::task::spawn_blocking(move || read_records(&owned))
            .await
            .map_err(|e| IngestError::Task(e.to_string()))??;
        self.ingest(records).await
    }
}

async fn persist_lane(
    store: Arc<dyn IndexStore>,
    permits: Arc<Semaphore>,
    lane: Vec<StagedRecord>,
) -> Result<(), IngestError> {
    for record in lane {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| IngestError::Task(e.to_string()))?;
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            record.persist(store.as_ref())
        })
        .await
        .map_err(|e| IngestError::Task(e.to_string()))??;
    }
    Ok(())
}

/// Split `records` by lane key, keeping input order inside each lane and
/// first-appearance order across lanes.
fn into_lanes(records: Vec<StagedRecord>) -> Vec<Vec<StagedRecord>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut lanes: Vec<Vec<StagedRecord>> = Vec::new();
    for record in records {
        let slot = *index.entry(record.lane_key()).or_insert_with(|| {
            lanes.push(Vec::new());
            lanes.len() - 1
        });
        lanes[slot].push(record);
    }
    lanes
}

/// Parse a JSONL staging file. Blank lines are skipped.
pub fn read_records(path: &Path) -> Result<Vec<StagedRecord>, IngestError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut line = 0;

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        line += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.len() > MAX_LINE_BYTES {
            return Err(IngestError::LineTooLong {
                path: path.to_path_buf(),
                line,
            });
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let record = serde_json::from_slice(&buf).map_err(|e| IngestError::Malformed {
            path: path.to_path_buf(),
            line,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bap_nullables::NullStore;
    use bap_store::{AttestationStore, IdentityStore};
    use bap_types::{
        Attestation, BitcoinAddress, BlockContext, ClaimHash, IdKey, Identity, Signer, Timestamp,
        TxHash,
    };
    use std::time::Duration;

    fn ctx(n: u8) -> BlockContext {
        BlockContext::new(100, Timestamp::new(1), TxHash::new([n; 32]))
    }

    fn identity(n: u8) -> StagedRecord {
        StagedRecord::Identity(Identity::create(
            IdKey::new(format!("id{n}")),
            BitcoinAddress::new(format!("1Addr{n}")),
            &ctx(n),
        ))
    }

    fn attestation(claim: u8, sequence: u64) -> StagedRecord {
        let signer = Signer::new(IdKey::new("id"), BitcoinAddress::new("1A"), sequence, &ctx(1));
        StagedRecord::Attestation(Attestation::new(ClaimHash::new([claim; 32]), signer))
    }

    fn worker(store: &Arc<NullStore>, permits: usize) -> IngestWorker {
        IngestWorker::new(store.clone(), permits)
    }

    #[test]
    fn lanes_keep_input_order() {
        let lanes = into_lanes(vec![
            attestation(1, 1),
            identity(1),
            attestation(1, 2),
            attestation(2, 1),
        ]);
        assert_eq!(lanes.len(), 3);
        assert_eq!(lanes[0], vec![attestation(1, 1), attestation(1, 2)]);
        assert_eq!(lanes[1], vec![identity(1)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_permits() {
        let store = Arc::new(NullStore::new());
        store.set_write_delay(Some(Duration::from_millis(5)));
        let records: Vec<_> = (0..24).map(identity).collect();

        let stats = worker(&store, 3).ingest(records).await.unwrap();

        assert_eq!(stats, IngestStats { records: 24, lanes: 24 });
        assert_eq!(store.snapshot().identities.len(), 24);
        assert!(store.peak_concurrent_writes() <= 3);
        assert!(store.peak_concurrent_writes() >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_lane_is_applied_in_order() {
        let store = Arc::new(NullStore::new());
        store.set_write_delay(Some(Duration::from_millis(2)));
        let records = vec![attestation(9, 1), attestation(9, 5), attestation(9, 3)];

        worker(&store, 8).ingest(records).await.unwrap();

        let stored = store.find_attestation(&ClaimHash::new([9; 32])).unwrap().unwrap();
        assert_eq!(stored.signers[0].sequence, 3);
    }

    #[tokio::test]
    async fn store_failure_aborts_the_batch() {
        let store = Arc::new(NullStore::new());
        store.fail_writes(true);
        let err = worker(&store, 4)
            .ingest(vec![identity(1), identity(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = Arc::new(NullStore::new());
        let stats = worker(&store, 4).ingest(Vec::new()).await.unwrap();
        assert_eq!(stats, IngestStats::default());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn ingests_jsonl_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("100.jsonl");
        let lines: Vec<String> = [identity(1), identity(2)]
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect();
        std::fs::write(&path, format!("{}\n\n{}\n", lines[0], lines[1])).unwrap();

        let store = Arc::new(NullStore::new());
        let stats = worker(&store, 2).ingest_file(&path).await.unwrap();
        assert_eq!(stats.records, 2);
        assert!(store.find_identity(&IdKey::new("id2")).unwrap().is_some());
    }

    #[test]
    fn malformed_lines_report_their_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.jsonl");
        let good = serde_json::to_string(&identity(1)).unwrap();
        std::fs::write(&path, format!("{good}\n{{\"collection\":\"nope\"}}\n")).unwrap();

        match read_records(&path).unwrap_err() {
            err @ IngestError::Malformed { line: 2, .. } => assert!(err.is_retryable()),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn oversized_lines_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.jsonl");
        std::fs::write(&path, vec![b'x'; MAX_LINE_BYTES + 2]).unwrap();
        assert!(matches!(
            read_records(&path),
            Err(IngestError::LineTooLong { line: 1, .. })
        ));
    }
}
