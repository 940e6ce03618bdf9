//! The shared-record contract every mini-game replicates through.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};

use super::codec;
use crate::game::entities::{Session, SessionId};

/// Capacity of each record's change feed. A slow subscriber observes a lag
/// error and recovers by re-reading the record.
const FEED_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record for session")]
    NotFound,
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },
    #[error("record codec failure: {0}")]
    Codec(#[from] bincode::Error),
}

/// Persistence plus fan-out for one shared record per match.
///
/// `write` is a compare-and-swap: it succeeds only while the stored version
/// still equals `expected_version`; on a conflict the caller re-reads and
/// retries its reduction against the fresh snapshot. Subscribers receive
/// every accepted snapshot at least once, in best-effort order.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read(&self, id: SessionId) -> Result<Session, StoreError>;

    async fn write(
        &self,
        id: SessionId,
        expected_version: u64,
        session: &Session,
    ) -> Result<(), StoreError>;

    async fn subscribe(&self, id: SessionId)
    -> Result<broadcast::Receiver<Session>, StoreError>;
}

struct StoredRecord {
    version: u64,
    bytes: Vec<u8>,
    feed: broadcast::Sender<Session>,
}

/// In-memory store: one encoded record and one broadcast feed per session.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<SessionId, StoredRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the initial record for a freshly created session.
    pub async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let bytes = codec::encode(session)?;
        let mut records = self.records.write().await;
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        records.insert(
            session.id,
            StoredRecord {
                version: session.version,
                bytes,
                feed,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn read(&self, id: SessionId) -> Result<Session, StoreError> {
        let records = self.records.read().await;
        let record = records.get(&id).ok_or(StoreError::NotFound)?;
        codec::decode(&record.bytes)
    }

    async fn write(
        &self,
        id: SessionId,
        expected_version: u64,
        session: &Session,
    ) -> Result<(), StoreError> {
        let bytes = codec::encode(session)?;
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound)?;
        if record.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                found: record.version,
            });
        }
        record.version = session.version;
        record.bytes = bytes;
        // Nobody subscribed yet is fine; the record itself is the source of
        // truth.
        let _ = record.feed.send(session.clone());
        Ok(())
    }

    async fn subscribe(
        &self,
        id: SessionId,
    ) -> Result<broadcast::Receiver<Session>, StoreError> {
        let records = self.records.read().await;
        let record = records.get(&id).ok_or(StoreError::NotFound)?;
        Ok(record.feed.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Profile, SessionSettings};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_session() -> Session {
        let roster = vec![
            (Uuid::new_v4(), Profile::new("alice")),
            (Uuid::new_v4(), Profile::new("bob")),
        ];
        Session::create(Uuid::new_v4(), SessionSettings::default(), &roster, Utc::now())
            .expect("valid roster")
    }

    #[tokio::test]
    async fn insert_then_read_round_trips() {
        let store = MemoryStore::new();
        let session = sample_session();
        store.insert(&session).await.expect("insert");
        let read = store.read(session.id).await.expect("read");
        assert_eq!(read, session);
    }

    #[tokio::test]
    async fn read_of_missing_record_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.read(Uuid::new_v4()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn write_is_compare_and_swap() {
        let store = MemoryStore::new();
        let mut session = sample_session();
        store.insert(&session).await.expect("insert");

        session.version += 1;
        store
            .write(session.id, 1, &session)
            .await
            .expect("expected version matches");

        // A second writer still holding the old version loses.
        let stale = session.clone();
        match store.write(session.id, 1, &stale).await {
            Err(StoreError::VersionConflict { expected, found }) => {
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected a version conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_every_accepted_write() {
        let store = MemoryStore::new();
        let mut session = sample_session();
        store.insert(&session).await.expect("insert");
        let mut first = store.subscribe(session.id).await.expect("subscribe");
        let mut second = store.subscribe(session.id).await.expect("subscribe");

        session.version += 1;
        store.write(session.id, 1, &session).await.expect("write");

        assert_eq!(first.recv().await.expect("delivery").version, 2);
        assert_eq!(second.recv().await.expect("delivery").version, 2);
    }
}
