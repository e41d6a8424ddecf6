//! Concurrent registry of live sessions.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::client::Session;
use super::{Connection, SessionOptions};
use crate::error::{GatewayError, Result};
use crate::utils::Metrics;

/// Maps session ids to live sessions. At most one live session per id: storing
/// a different session under an occupied id kicks the previous occupant.
pub struct Store {
    sessions: DashMap<Arc<str>, Arc<Session>>,
    metrics: Arc<Metrics>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(Metrics::new()))
    }

    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Create a session for `conn`, start its transport tasks and register it.
    ///
    /// A fresh UUID is assigned when `id` is `None`.
    pub async fn new_session(
        &self,
        conn: Connection,
        id: Option<String>,
        opts: SessionOptions,
    ) -> Result<Arc<Session>> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = Session::start(conn, id, opts, Arc::clone(&self.metrics)).await?;
        self.metrics.session_opened();
        self.store(Arc::clone(&session));
        debug!(
            sid = %session.id(),
            peer = ?session.peer_addr(),
            transport = %session.kind(),
            "Session registered"
        );
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    /// Register `session` under its current id
    pub fn store(&self, session: Arc<Session>) {
        let replaced = self.sessions.insert(session.id(), Arc::clone(&session));
        if let Some(old) = replaced {
            if !Arc::ptr_eq(&old, &session) {
                info!(sid = %session.id(), "Session id taken over, kicking previous session");
                old.kick();
                self.metrics.session_closed();
            }
        }
    }

    /// Re-key a registered session, typically after login binds a stable id.
    pub fn rebind(&self, old_id: &str, new_id: impl Into<String>) -> Result<Arc<Session>> {
        let (_, session) = self
            .sessions
            .remove(old_id)
            .ok_or_else(|| GatewayError::SessionNotFound(old_id.to_string()))?;
        session.set_id(Arc::from(new_id.into()));
        self.store(Arc::clone(&session));
        Ok(session)
    }

    /// Drop the mapping without touching the session
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(id)?;
        self.metrics.session_closed();
        Some(session)
    }

    /// Drop the mapping and kick the session. Safe to call repeatedly.
    pub fn remove_and_exit(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.kick();
                self.metrics.session_closed();
                true
            }
            None => false,
        }
    }

    /// Like [`remove_and_exit`](Self::remove_and_exit), but only if `id` still
    /// maps to this exact session.
    pub(crate) fn release(&self, session: &Arc<Session>) {
        if let Entry::Occupied(entry) = self.sessions.entry(session.id()) {
            if Arc::ptr_eq(entry.get(), session) {
                entry.remove();
                self.metrics.session_closed();
            }
        }
        session.kick();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<Arc<str>> {
        self.sessions.iter().map(|e| Arc::clone(e.key())).collect()
    }

    /// Kick every registered session, returning how many were kicked by this call
    pub fn kick_all(&self) -> usize {
        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        sessions.iter().filter(|s| s.kick()).count()
    }
}
