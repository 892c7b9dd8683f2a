//! In-process registry of live sessions.
//!
//! Each session sits behind its own mutex, which serializes `submit_choice`
//! calls against it. The registry only maps ids to sessions and enforces one
//! active session per (candidate, listing) pair. Finished sessions that were
//! saved are evicted by [`SessionStore::sweep`] once their retention expires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::dna::session::DecisionSession;

pub type SharedSession = Arc<Mutex<DecisionSession>>;

type PairKey = (Uuid, Uuid);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("a Decision DNA session is already in progress for this candidate and listing")]
    AlreadyActive { session_id: Option<Uuid> },
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Starting,
    Live(Uuid),
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, SharedSession>,
    slots: HashMap<PairKey, Slot>,
}

impl Inner {
    fn clear_starting(&mut self, key: &PairKey) {
        if matches!(self.slots.get(key), Some(Slot::Starting)) {
            self.slots.remove(key);
        }
    }
}

#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<Inner>,
}

/// Claim on a (candidate, listing) pair while its session starts.
///
/// Dropping it without [`Reservation::commit`] frees the pair, including when
/// the request that holds it is cancelled.
#[must_use]
pub struct Reservation {
    store: Arc<SessionStore>,
    key: PairKey,
    armed: bool,
}

impl Reservation {
    /// Registers the started session under the claimed pair.
    pub async fn commit(mut self, session: DecisionSession) -> SharedSession {
        let shared = self.store.insert(session).await;
        self.armed = false;
        shared
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let key = self.key;
        if let Ok(mut inner) = self.store.inner.try_write() {
            inner.clear_starting(&key);
            return;
        }
        // the registry is busy; release once it is free
        let store = self.store.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                store.inner.write().await.clear_starting(&key);
            });
        }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the (candidate, listing) pair for a session that is about to start.
    ///
    /// A pair whose previous session is terminal can be claimed again; a
    /// session that is currently locked counts as active.
    pub async fn reserve(
        self: &Arc<Self>,
        candidate_id: Uuid,
        listing_id: Uuid,
    ) -> Result<Reservation, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (candidate_id, listing_id);

        match inner.slots.get(&key).copied() {
            Some(Slot::Starting) => return Err(StoreError::AlreadyActive { session_id: None }),
            Some(Slot::Live(id)) => {
                let previous = inner.sessions.get(&id).cloned();
                if let Some(previous) = previous {
                    let (finished, persisted) = match previous.try_lock() {
                        Ok(s) => (s.status().is_terminal(), s.is_persisted()),
                        Err(_) => (false, false),
                    };
                    if !finished {
                        return Err(StoreError::AlreadyActive {
                            session_id: Some(id),
                        });
                    }
                    // unsaved results stay reachable for a persist retry
                    if persisted {
                        inner.sessions.remove(&id);
                    }
                }
            }
            None => {}
        }

        inner.slots.insert(key, Slot::Starting);
        Ok(Reservation {
            store: self.clone(),
            key,
            armed: true,
        })
    }

    async fn insert(&self, session: DecisionSession) -> SharedSession {
        let owner = session.owner();
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));

        let mut inner = self.inner.write().await;
        inner.sessions.insert(id, shared.clone());
        inner
            .slots
            .insert((owner.candidate_id, owner.listing_id), Slot::Live(id));
        shared
    }

    pub async fn get(&self, session_id: Uuid) -> Option<SharedSession> {
        self.inner.read().await.sessions.get(&session_id).cloned()
    }

    /// Evicts saved terminal sessions that finished at least `retention` ago.
    /// Sessions locked by a request are left for the next sweep.
    pub async fn sweep(&self, retention: Duration) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let expired: Vec<Uuid> = inner
            .sessions
            .iter()
            .filter_map(|(id, shared)| {
                let session = shared.try_lock().ok()?;
                let finished_at = session.finished_at()?;
                let age = (now - finished_at).to_std().unwrap_or(Duration::ZERO);
                let evict =
                    session.status().is_terminal() && session.is_persisted() && age >= retention;
                evict.then_some(*id)
            })
            .collect();

        for id in &expired {
            inner.sessions.remove(id);
        }
        inner
            .slots
            .retain(|_, slot| !matches!(slot, Slot::Live(id) if expired.contains(id)));

        if !expired.is_empty() {
            debug!("Evicted {} finished Decision DNA session(s)", expired.len());
        }
        expired.len()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}
