//! Session bookkeeping: which connection is logged in as whom.

use crate::protocol::wire::Credentials;
use std::collections::HashMap;

/// Authenticated state for one connection.
#[derive(Debug, Clone)]
pub struct Session {
    credentials: Credentials,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Mapping from connection id to its session.
///
/// Owned by one worker and touched only by that worker's dispatch path;
/// an entry lives exactly as long as its connection. There is no expiry
/// and no cross-connection access.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<usize, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// Bind `conn_id` to `credentials`, replacing any existing session.
    pub fn upsert(&mut self, conn_id: usize, credentials: Credentials) {
        self.sessions.insert(conn_id, Session::new(credentials));
    }

    pub fn lookup(&self, conn_id: usize) -> Option<&Session> {
        self.sessions.get(&conn_id)
    }

    /// Drop the session for a closing connection, if one exists.
    pub fn remove(&mut self, conn_id: usize) -> Option<Session> {
        self.sessions.remove(&conn_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut table = SessionTable::new();
        assert!(table.is_empty());
        assert!(table.lookup(3).is_none());

        let creds = Credentials::new(b"admin", b"12345").unwrap();
        table.upsert(3, creds);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(3).unwrap().credentials().username(), b"admin");

        let removed = table.remove(3);
        assert_eq!(removed.unwrap().credentials().username(), b"admin");
        assert!(table.is_empty());
        assert!(table.remove(3).is_none());
    }

    #[test]
    fn test_upsert_replaces_existing_session() {
        let mut table = SessionTable::new();
        table.upsert(7, Credentials::new(b"alice", b"first").unwrap());
        table.upsert(7, Credentials::new(b"bob", b"second").unwrap());

        assert_eq!(table.len(), 1);
        let session = table.lookup(7).unwrap();
        assert_eq!(session.credentials().username(), b"bob");
        assert_eq!(session.credentials().password(), b"second");
    }

    #[test]
    fn test_sessions_are_per_connection() {
        let mut table = SessionTable::new();
        table.upsert(1, Credentials::new(b"alice", b"pw").unwrap());
        table.upsert(2, Credentials::new(b"bob", b"pw").unwrap());

        assert_eq!(table.len(), 2);
        table.remove(1);
        assert!(table.lookup(1).is_none());
        assert_eq!(table.lookup(2).unwrap().credentials().username(), b"bob");
    }
}
