//! The observable, persisted session collection.
//!
//! `SessionStore` owns every [`Session`] and is the only component allowed to
//! mutate them. Both stream controllers hold an `Arc<SessionStore>`; the
//! interior lock keeps mutations atomic, and every mutation synchronously
//! rewrites the persisted record before returning.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use askdoc_core::defaults;
use askdoc_core::models::{derive_title, Message, Role, Session};
use askdoc_core::{Error, Result};

use crate::persist::KvStorage;

/// Default capacity of the change feed.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Change notification emitted after every successful mutation.
///
/// Observers re-render from a fresh snapshot; events carry identifiers, not
/// data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SessionCreated { id: Uuid },
    SessionDeleted { id: Uuid },
    SessionRenamed { id: Uuid },
    MessageAppended { session_id: Uuid, message_id: Uuid },
    CurrentChanged { id: Uuid },
}

/// The persisted record: the whole collection plus the current pointer,
/// stored under one fixed key.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    sessions: Vec<Session>,
    current_id: Uuid,
}

struct Inner {
    sessions: Vec<Session>,
    current_id: Uuid,
}

/// Owned, injectable session collection with a broadcast change feed.
pub struct SessionStore {
    storage: Box<dyn KvStorage>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<StoreEvent>,
}

impl SessionStore {
    /// Open the store, restoring from persistence.
    ///
    /// A missing record starts a fresh collection with one default session.
    /// A corrupt record is treated the same way: logged at WARN and
    /// discarded, never a crash.
    pub fn open(storage: impl KvStorage + 'static) -> Result<Self> {
        let storage: Box<dyn KvStorage> = Box::new(storage);

        let restored = match storage.read(defaults::SESSIONS_KEY)? {
            Some(raw) => match serde_json::from_str::<PersistedState>(&raw) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(error = %e, "discarding corrupt session record, starting fresh");
                    None
                }
            },
            None => None,
        };

        let mut inner = match restored {
            Some(state) if !state.sessions.is_empty() => {
                info!(session_count = state.sessions.len(), "restored sessions");
                Inner {
                    current_id: state.current_id,
                    sessions: state.sessions,
                }
            }
            _ => {
                let session = Session::new();
                Inner {
                    current_id: session.id,
                    sessions: vec![session],
                }
            }
        };

        // The current pointer must always name a live session
        if !inner.sessions.iter().any(|s| s.id == inner.current_id) {
            inner.current_id = inner.sessions[0].id;
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Self {
            storage,
            inner: Mutex::new(inner),
            events,
        };
        // Ensure the record exists even before the first mutation
        store.persist(&store.inner.lock().unwrap())?;
        Ok(store)
    }

    /// Subscribe to the change feed. Lagging receivers miss events but never
    /// block mutations.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Prepend a fresh default session and make it current.
    pub fn create_session(&self) -> Result<Uuid> {
        let session = Session::new();
        let id = session.id;
        {
            let mut inner = self.inner.lock().unwrap();
            inner.sessions.insert(0, session);
            inner.current_id = id;
            self.persist(&inner)?;
        }
        debug!(session_id = %id, "session created");
        self.emit(StoreEvent::SessionCreated { id });
        self.emit(StoreEvent::CurrentChanged { id });
        Ok(id)
    }

    /// Delete a session.
    ///
    /// The collection is never left empty: deleting the last session
    /// synthesizes a fresh default. If the deleted session was current,
    /// current moves to the first remaining session.
    pub fn delete_session(&self, id: Uuid) -> Result<()> {
        let (created, current_changed) = {
            let mut inner = self.inner.lock().unwrap();
            let before = inner.sessions.len();
            inner.sessions.retain(|s| s.id != id);
            if inner.sessions.len() == before {
                return Err(Error::SessionNotFound(id));
            }

            let created = if inner.sessions.is_empty() {
                let session = Session::new();
                let new_id = session.id;
                inner.sessions.push(session);
                Some(new_id)
            } else {
                None
            };

            let current_changed = if inner.current_id == id {
                inner.current_id = inner.sessions[0].id;
                Some(inner.current_id)
            } else {
                None
            };

            self.persist(&inner)?;
            (created, current_changed)
        };

        debug!(session_id = %id, "session deleted");
        self.emit(StoreEvent::SessionDeleted { id });
        if let Some(new_id) = created {
            self.emit(StoreEvent::SessionCreated { id: new_id });
        }
        if let Some(current) = current_changed {
            self.emit(StoreEvent::CurrentChanged { id: current });
        }
        Ok(())
    }

    /// Append a message to a session's log.
    ///
    /// The first user message also derives the session title. Messages are
    /// append-only; nothing here can reorder or rewrite the log.
    pub fn append_message(&self, session_id: Uuid, message: Message) -> Result<()> {
        let message_id = message.id;
        {
            let mut inner = self.inner.lock().unwrap();
            let session = inner
                .sessions
                .iter_mut()
                .find(|s| s.id == session_id)
                .ok_or(Error::SessionNotFound(session_id))?;

            if message.role == Role::User && session.has_default_title() {
                session.title = derive_title(&message.content);
            }
            session.messages.push(message);
            self.persist(&inner)?;
        }
        self.emit(StoreEvent::MessageAppended {
            session_id,
            message_id,
        });
        Ok(())
    }

    /// Rename a session.
    pub fn rename(&self, id: Uuid, title: impl Into<String>) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            let session = inner
                .sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(Error::SessionNotFound(id))?;
            session.title = title.into();
            self.persist(&inner)?;
        }
        self.emit(StoreEvent::SessionRenamed { id });
        Ok(())
    }

    /// Make an existing session current.
    pub fn set_current(&self, id: Uuid) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.sessions.iter().any(|s| s.id == id) {
                return Err(Error::SessionNotFound(id));
            }
            inner.current_id = id;
            self.persist(&inner)?;
        }
        self.emit(StoreEvent::CurrentChanged { id });
        Ok(())
    }

    /// Id of the current session.
    pub fn current_id(&self) -> Uuid {
        self.inner.lock().unwrap().current_id
    }

    /// Whether a session with this id exists.
    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.lock().unwrap().sessions.iter().any(|s| s.id == id)
    }

    /// Snapshot of one session.
    pub fn session(&self, id: Uuid) -> Option<Session> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// Snapshot of the whole collection, most recent first.
    pub fn sessions(&self) -> Vec<Session> {
        self.inner.lock().unwrap().sessions.clone()
    }

    fn persist(&self, inner: &Inner) -> Result<()> {
        let state = PersistedState {
            sessions: inner.sessions.clone(),
            current_id: inner.current_id,
        };
        let raw = serde_json::to_string(&state)?;
        self.storage.write(defaults::SESSIONS_KEY, &raw)
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}
