//! Session registry and per-session actors
//!
//! Each session owns one [`McpServer`] inside a Tokio task. Requests reach it
//! through a bounded mailbox and are answered over oneshot channels, so calls
//! within a session run in arrival order while sessions run independently.
//! [`SessionManager`] only guards the id -> handle mapping. A session whose
//! actor has stopped without a close is dropped from the mapping the next
//! time it is looked up.

use crate::errors::{GatewayError, GatewayResult};
use crate::metrics::{ACTIVE_SESSIONS, SESSIONS_CLOSED_TOTAL, SESSIONS_OPENED_TOTAL};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, McpServer};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use signal_engine::SignalEngine;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Closed,
}

/// Message sent to a session actor
pub enum SessionMessage {
    Request {
        request: JsonRpcRequest,
        response: oneshot::Sender<Option<JsonRpcResponse>>,
    },

    /// Stop the actor
    Close { response: oneshot::Sender<()> },
}

struct SessionActor {
    server: McpServer,
    mailbox: mpsc::Receiver<SessionMessage>,
    open: Arc<AtomicBool>,
    handled: Arc<AtomicU64>,
}

// Also runs when the task unwinds
impl Drop for SessionActor {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Release);
    }
}

impl SessionActor {
    async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                SessionMessage::Request { request, response } => {
                    let reply = self.server.handle(request).await;
                    self.handled.fetch_add(1, Ordering::Relaxed);
                    let _ = response.send(reply);
                }
                SessionMessage::Close { response } => {
                    self.mailbox.close();
                    let _ = response.send(());
                    break;
                }
            }
        }
        debug!(session_id = %self.server.session_id(), "Session actor stopped");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub requests_handled: u64,
}

/// Cloneable handle to a session actor
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    created_at: DateTime<Utc>,
    sender: mpsc::Sender<SessionMessage>,
    open: Arc<AtomicBool>,
    handled: Arc<AtomicU64>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        if self.open.load(Ordering::Acquire) {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    /// Open and its actor still receiving
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open && !self.sender.is_closed()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            state: self.state(),
            created_at: self.created_at,
            requests_handled: self.handled.load(Ordering::Relaxed),
        }
    }

    /// Hand a request to the session and wait for its reply
    pub async fn request(&self, request: JsonRpcRequest) -> GatewayResult<Option<JsonRpcResponse>> {
        if !self.is_open() {
            return Err(GatewayError::InvalidSession);
        }

        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Request { request, response: tx })
            .await
            .map_err(|_| self.fail("mailbox closed"))?;

        rx.await.map_err(|_| self.fail("dropped reply"))
    }

    fn fail(&self, what: &str) -> GatewayError {
        self.open.store(false, Ordering::Release);
        GatewayError::Channel(format!("session {} {}", self.id, what))
    }

    /// Mark closed and stop the actor; returns false if already closed
    async fn close(&self) -> bool {
        if !self.open.swap(false, Ordering::AcqRel) {
            return false;
        }

        let (tx, rx) = oneshot::channel();
        if self.sender.send(SessionMessage::Close { response: tx }).await.is_ok() {
            let _ = rx.await;
        }
        true
    }
}

fn spawn_session(id: String, engine: SignalEngine, mailbox_capacity: usize) -> SessionHandle {
    let (sender, mailbox) = mpsc::channel(mailbox_capacity.max(1));
    let open = Arc::new(AtomicBool::new(true));
    let handled = Arc::new(AtomicU64::new(0));

    let actor = SessionActor {
        server: McpServer::new(id.clone(), engine),
        mailbox,
        open: open.clone(),
        handled: handled.clone(),
    };
    tokio::spawn(actor.run());

    SessionHandle {
        id,
        created_at: Utc::now(),
        sender,
        open,
        handled,
    }
}

/// Registry of open sessions
pub struct SessionManager {
    sessions: DashMap<String, SessionHandle>,
    engine: SignalEngine,
    mailbox_capacity: usize,
}

impl SessionManager {
    pub fn new(engine: SignalEngine, mailbox_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            engine,
            mailbox_capacity,
        }
    }

    pub fn engine(&self) -> &SignalEngine {
        &self.engine
    }

    /// Open a session with a fresh id and a new protocol server
    pub fn create(&self) -> SessionHandle {
        let id = Uuid::new_v4().to_string();
        let handle = spawn_session(id.clone(), self.engine.clone(), self.mailbox_capacity);
        self.sessions.insert(id.clone(), handle.clone());

        SESSIONS_OPENED_TOTAL.inc();
        ACTIVE_SESSIONS.set(self.sessions.len() as i64);
        info!(session_id = %id, "Session opened");

        handle
    }

    /// Look up an open session, forgetting it if its actor is gone
    pub fn resume(&self, session_id: &str) -> GatewayResult<SessionHandle> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or(GatewayError::InvalidSession)?;

        if handle.is_open() {
            return Ok(handle);
        }
        if self.sessions.remove_if(session_id, |_, h| !h.is_open()).is_some() {
            self.forget(session_id);
        }
        Err(GatewayError::InvalidSession)
    }

    fn forget(&self, session_id: &str) {
        ACTIVE_SESSIONS.set(self.sessions.len() as i64);
        SESSIONS_CLOSED_TOTAL.inc();
        warn!(session_id = %session_id, "Session actor stopped unexpectedly");
    }

    /// Close a session; closing an unknown or closed id is a no-op
    pub async fn close(&self, session_id: &str) -> bool {
        let Some((_, handle)) = self.sessions.remove(session_id) else {
            return false;
        };
        ACTIVE_SESSIONS.set(self.sessions.len() as i64);

        let closed = handle.close().await;
        if closed {
            SESSIONS_CLOSED_TOTAL.inc();
            info!(session_id = %session_id, "Session closed");
        }
        closed
    }

    /// Sessions still able to answer; dead ones are dropped on the way
    pub fn active_sessions(&self) -> usize {
        let mut dead = Vec::new();
        self.sessions.retain(|id, handle| {
            let open = handle.is_open();
            if !open {
                dead.push(id.clone());
            }
            open
        });
        for id in &dead {
            self.forget(id);
        }
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use signal_engine::{EngineConfig, EntityHistoryStore, StaticRecordLookup};

    fn manager() -> SessionManager {
        let engine = SignalEngine::new(
            EngineConfig::default(),
            EntityHistoryStore::new(),
            Arc::new(StaticRecordLookup::new()),
        );
        SessionManager::new(engine, 8)
    }

    fn ping(id: i64) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: "ping".to_string(),
            params: Value::Null,
            id: Some(json!(id)),
        }
    }

    #[tokio::test]
    async fn test_create_and_resume() {
        let manager = manager();
        let handle = manager.create();

        let resumed = manager.resume(handle.id()).unwrap();
        assert_eq!(resumed.id(), handle.id());
        assert_eq!(manager.active_sessions(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let manager = manager();
        let a = manager.create();
        let b = manager.create();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_requests_are_counted() {
        let manager = manager();
        let handle = manager.create();

        for i in 0..3 {
            let reply = handle.request(ping(i)).await.unwrap().unwrap();
            assert_eq!(reply.id, json!(i));
        }
        assert_eq!(handle.info().requests_handled, 3);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let manager = manager();
        let handle = manager.create();
        let id = handle.id().to_string();

        assert!(manager.close(&id).await);
        assert!(!manager.close(&id).await);
        assert!(!manager.close("never-existed").await);
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_requests() {
        let manager = manager();
        let handle = manager.create();
        let id = handle.id().to_string();
        manager.close(&id).await;

        assert!(matches!(manager.resume(&id), Err(GatewayError::InvalidSession)));
        assert!(matches!(handle.request(ping(1)).await, Err(GatewayError::InvalidSession)));
        assert_eq!(handle.state(), SessionState::Closed);
    }

    /// Stop the actor behind the manager's back
    async fn stop_actor(handle: &SessionHandle) {
        let (tx, rx) = oneshot::channel();
        handle.sender.send(SessionMessage::Close { response: tx }).await.unwrap();
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_actor_is_forgotten_on_resume() {
        let manager = manager();
        let handle = manager.create();
        let id = handle.id().to_string();
        stop_actor(&handle).await;

        assert!(!handle.is_open());
        assert!(matches!(manager.resume(&id), Err(GatewayError::InvalidSession)));
        assert_eq!(manager.active_sessions(), 0);
        assert!(!manager.close(&id).await);
    }

    #[tokio::test]
    async fn test_stopped_actor_not_counted_active() {
        let manager = manager();
        let live = manager.create();
        let dead = manager.create();
        stop_actor(&dead).await;

        assert_eq!(manager.active_sessions(), 1);
        assert!(manager.resume(live.id()).is_ok());
        assert!(matches!(dead.request(ping(1)).await, Err(GatewayError::InvalidSession)));
    }

    #[tokio::test]
    async fn test_dropped_actor_marks_handle_closed() {
        let (sender, mailbox) = mpsc::channel(1);
        let open = Arc::new(AtomicBool::new(true));
        let engine = manager().engine().clone();
        let actor = SessionActor {
            server: McpServer::new("s", engine),
            mailbox,
            open: open.clone(),
            handled: Arc::new(AtomicU64::new(0)),
        };
        drop(actor);

        assert!(!open.load(Ordering::Acquire));
        assert!(sender.is_closed());
    }
}
