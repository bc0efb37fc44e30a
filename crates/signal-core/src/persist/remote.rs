use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

/// Failures talking to the remote save table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed remote response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Decode(e.to_string())
    }
}

/// The signed-in player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// One row of the remote save table.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRow {
    pub user_id: String,
    /// The state blob as stored. Untrusted.
    pub state: Value,
    /// Row-level timestamp column, when the backend reports one.
    pub updated_at_ms: Option<u64>,
}

/// A prepared upsert, ready to ship.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteWrite {
    pub user_id: String,
    pub state: Value,
    pub updated_at_ms: u64,
    pub forced: bool,
}

impl RemoteWrite {
    pub fn into_row(self) -> RemoteRow {
        RemoteRow {
            user_id: self.user_id,
            state: self.state,
            updated_at_ms: Some(self.updated_at_ms),
        }
    }
}

/// One row per identity, upsert semantics, last write wins.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteRow>, RemoteError>;
    async fn upsert(&self, write: &RemoteWrite) -> Result<(), RemoteError>;
    async fn delete(&self, user_id: &str) -> Result<(), RemoteError>;
}

#[derive(Debug, Default)]
struct MemoryRemoteInner {
    rows: HashMap<String, RemoteRow>,
    writes: usize,
    offline: bool,
}

/// In-memory remote table. Clones share the table and the write counter.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Rc<RefCell<MemoryRemoteInner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing the write counter.
    pub fn insert_row(&self, row: RemoteRow) {
        self.inner.borrow_mut().rows.insert(row.user_id.clone(), row);
    }

    pub fn row(&self, user_id: &str) -> Option<RemoteRow> {
        self.inner.borrow().rows.get(user_id).cloned()
    }

    /// Number of upserts that reached the table.
    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }

    /// Fail every request with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.inner.borrow_mut().offline = offline;
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.inner.borrow().offline {
            Err(RemoteError::Transport("network unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for MemoryRemote {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteRow>, RemoteError> {
        self.check_online()?;
        Ok(self.row(user_id))
    }

    async fn upsert(&self, write: &RemoteWrite) -> Result<(), RemoteError> {
        self.check_online()?;
        let mut inner = self.inner.borrow_mut();
        inner.writes += 1;
        inner.rows.insert(write.user_id.clone(), write.clone().into_row());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), RemoteError> {
        self.check_online()?;
        self.inner.borrow_mut().rows.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;
    use serde_json::json;

    fn write(user: &str, ts: u64) -> RemoteWrite {
        RemoteWrite {
            user_id: user.to_string(),
            state: json!({ "total": ts }),
            updated_at_ms: ts,
            forced: false,
        }
    }

    #[test]
    fn upsert_replaces_the_row() {
        let remote = MemoryRemote::new();
        block_on(remote.upsert(&write("u1", 1))).unwrap();
        block_on(remote.upsert(&write("u1", 2))).unwrap();
        let row = block_on(remote.fetch("u1")).unwrap().unwrap();
        assert_eq!(row.updated_at_ms, Some(2));
        assert_eq!(remote.writes(), 2);
    }

    #[test]
    fn rows_are_per_identity() {
        let remote = MemoryRemote::new();
        block_on(remote.upsert(&write("u1", 1))).unwrap();
        assert!(block_on(remote.fetch("u2")).unwrap().is_none());
        block_on(remote.delete("u1")).unwrap();
        assert!(block_on(remote.fetch("u1")).unwrap().is_none());
    }

    #[test]
    fn offline_remote_reports_transport_errors() {
        let remote = MemoryRemote::new();
        remote.set_offline(true);
        assert!(matches!(block_on(remote.fetch("u1")), Err(RemoteError::Transport(_))));
        assert!(block_on(remote.upsert(&write("u1", 1))).is_err());
        assert_eq!(remote.writes(), 0);
    }
}
