//! Session store
//!
//! Process-local mapping from session key to conversation state. Each session
//! sits behind its own async mutex: holding the guard for the length of a
//! turn is what serializes concurrent requests on the same key, while
//! different keys never contend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use super::store::ConversationSession;
use crate::models::Scenario;

/// Shared, lockable handle to one session
pub type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Called with the session key whenever a session is evicted or removed
pub type TeardownHook = Arc<dyn Fn(&str) + Send + Sync>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the live session for `key`, creating it for `scenario` if absent
    /// or expired. An existing session keeps its own scenario.
    async fn get_or_create(&self, key: &str, scenario: Scenario) -> SessionHandle;

    /// Fetch without creating
    async fn get(&self, key: &str) -> Option<SessionHandle>;

    /// Explicit teardown. Returns whether a session existed.
    async fn remove(&self, key: &str) -> bool;

    /// Drop idle sessions past their TTL. Sessions in the middle of a turn
    /// are skipped. Returns the number evicted.
    async fn evict_expired(&self) -> usize;

    async fn len(&self) -> usize;
}

struct SessionEntry {
    handle: SessionHandle,
    last_access: Instant,
}

/// In-memory session store with idle TTL
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
    on_teardown: Option<TeardownHook>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            on_teardown: None,
        }
    }

    pub fn with_teardown_hook(mut self, hook: TeardownHook) -> Self {
        self.on_teardown = Some(hook);
        self
    }

    fn teardown(&self, key: &str) {
        if let Some(hook) = &self.on_teardown {
            hook(key);
        }
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.duration_since(entry.last_access) > self.ttl
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, key: &str, scenario: Scenario) -> SessionHandle {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if let Some(entry) = sessions.get_mut(key) {
            let busy = entry.handle.try_lock().is_err();
            if busy || !self.is_expired(entry, now) {
                entry.last_access = now;
                return entry.handle.clone();
            }

            info!(session_key = %key, "Session expired, starting a new one");
            sessions.remove(key);
            self.teardown(key);
        }

        info!(session_key = %key, %scenario, "Creating session");
        let handle = Arc::new(Mutex::new(ConversationSession::new(key, scenario)));
        sessions.insert(
            key.to_string(),
            SessionEntry {
                handle: handle.clone(),
                last_access: now,
            },
        );
        handle
    }

    async fn get(&self, key: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(key).map(|entry| entry.handle.clone())
    }

    async fn remove(&self, key: &str) -> bool {
        let removed = self.sessions.write().await.remove(key).is_some();
        if removed {
            info!(session_key = %key, "Session torn down");
            self.teardown(key);
        }
        removed
    }

    async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now) && entry.handle.try_lock().is_ok())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            sessions.remove(key);
            self.teardown(key);
        }

        if !expired.is_empty() {
            info!(evicted = expired.len(), remaining = sessions.len(), "Evicted idle sessions");
        } else {
            debug!(remaining = sessions.len(), "No idle sessions to evict");
        }

        expired.len()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Periodically evict idle sessions until the store is dropped elsewhere
pub fn spawn_eviction_task(
    store: Arc<dyn SessionStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.evict_expired().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationTurn;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_existing_session_keeps_scenario() {
        let store = InMemorySessionStore::default();
        let first = store.get_or_create("s1", Scenario::BuyVsRent).await;
        first.lock().await.push(ConversationTurn::user("hello"));

        let second = store.get_or_create("s1", Scenario::RefinanceCheck).await;
        let session = second.lock().await;
        assert_eq!(session.scenario(), Scenario::BuyVsRent);
        assert_eq!(session.turn_count(), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_is_replaced() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        let first = store.get_or_create("s1", Scenario::BuyVsRent).await;
        first.lock().await.push(ConversationTurn::user("hello"));
        drop(first);

        tokio::time::advance(Duration::from_secs(61)).await;

        let fresh = store.get_or_create("s1", Scenario::Affordability).await;
        let session = fresh.lock().await;
        assert_eq!(session.turn_count(), 1);
        assert_eq!(session.scenario(), Scenario::Affordability);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_expired_runs_teardown_hook() {
        let torn_down = Arc::new(StdMutex::new(Vec::<String>::new()));
        let recorder = torn_down.clone();
        let store = InMemorySessionStore::new(Duration::from_secs(30)).with_teardown_hook(
            Arc::new(move |key: &str| recorder.lock().unwrap().push(key.to_string())),
        );

        store.get_or_create("idle", Scenario::BuyVsRent).await;
        tokio::time::advance(Duration::from_secs(20)).await;
        store.get_or_create("active", Scenario::BuyVsRent).await;
        tokio::time::advance(Duration::from_secs(15)).await;

        assert_eq!(store.evict_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("active").await.is_some());
        assert_eq!(*torn_down.lock().unwrap(), vec!["idle".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_session_is_not_evicted() {
        let store = InMemorySessionStore::new(Duration::from_secs(1));
        let handle = store.get_or_create("busy", Scenario::BuyVsRent).await;
        let _guard = handle.lock().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.evict_expired().await, 0);
        assert!(store.get("busy").await.is_some());
    }

    #[tokio::test]
    async fn test_remove_is_explicit_teardown() {
        let store = InMemorySessionStore::default();
        store.get_or_create("s1", Scenario::BuyVsRent).await;
        assert!(store.remove("s1").await);
        assert!(!store.remove("s1").await);
        assert_eq!(store.len().await, 0);
    }
}
