use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use crate::models::auth::{AuthEvent, AuthEventKind, Session};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
enum SessionEntry {
    Active(Session),
    /// Tokens of this session stay refused until they would have expired anyway.
    SignedOut { expires_at: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionLookup {
    Active(Session),
    SignedOut,
    Unknown,
}

/// Live and signed-out sessions of this process, keyed by provider session id.
pub struct SessionRegistry {
    entries: RwLock<HashMap<String, SessionEntry>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Record `session` as active, publishing `event` when given.
    ///
    /// Entries whose tokens have expired are dropped on the way.
    pub async fn establish(&self, session: Session, event: Option<AuthEventKind>) {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry_expiry(entry) > now);
        if let Some(kind) = event {
            self.publish(kind, &session);
        }
        entries.insert(session.key.clone(), SessionEntry::Active(session));
    }

    pub async fn lookup(&self, key: &str) -> SessionLookup {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(SessionEntry::Active(session)) => SessionLookup::Active(session.clone()),
            Some(SessionEntry::SignedOut { .. }) => SessionLookup::SignedOut,
            None => SessionLookup::Unknown,
        }
    }

    /// Invalidate the session; later lookups of its key report `SignedOut`.
    pub async fn sign_out(&self, session: &Session) {
        let mut entries = self.entries.write().await;
        entries.insert(
            session.key.clone(),
            SessionEntry::SignedOut {
                expires_at: session.expires_at,
            },
        );
        self.publish(AuthEventKind::SignedOut, session);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: AuthEventKind, session: &Session) {
        // No subscribers is not an error.
        let _ = self.events.send(AuthEvent {
            event,
            user_id: session.user_id,
            session_key: session.key.clone(),
            at: Utc::now(),
        });
    }
}

fn entry_expiry(entry: &SessionEntry) -> i64 {
    match entry {
        SessionEntry::Active(session) => session.expires_at,
        SessionEntry::SignedOut { expires_at } => *expires_at,
    }
}
