use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Who is acting. Passed explicitly from the request edge down to whatever
/// wants to stamp the operator into a log line; nothing reads it from a
/// global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub operator_id: i32,
    pub operator_name: String,
}

/// Storage for live sessions, keyed by an opaque token. The store is a
/// seam: the in-memory implementation below is the default, anything
/// durable can replace it behind the same trait.
pub trait SessionStore: Send + Sync {
    fn get(&self, token: &str) -> Option<SessionContext>;
    fn put(&self, token: String, context: SessionContext);
    fn remove(&self, token: &str) -> Option<SessionContext>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionContext>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, token: &str) -> Option<SessionContext> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    fn put(&self, token: String, context: SessionContext) {
        self.sessions.insert(token, context);
    }

    fn remove(&self, token: &str) -> Option<SessionContext> {
        self.sessions.remove(token).map(|(_, context)| context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator() -> SessionContext {
        SessionContext {
            operator_id: 7,
            operator_name: "Laura".to_owned(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = MemorySessionStore::new();
        store.put("tok-1".to_owned(), operator());
        assert_eq!(store.get("tok-1"), Some(operator()));
    }

    #[test]
    fn remove_ends_the_session() {
        let store = MemorySessionStore::new();
        store.put("tok-1".to_owned(), operator());
        assert_eq!(store.remove("tok-1"), Some(operator()));
        assert_eq!(store.get("tok-1"), None);
    }

    #[test]
    fn unknown_token_is_none() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("missing"), None);
    }
}
