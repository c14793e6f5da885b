//! Session boundary used by handlers to act on the connection that sent a
//! message.
//!
//! Real sessions belong to the transport layer. [`LoopbackSession`] is an
//! in-memory implementation that records replies, for hosts without a
//! transport and for tests.

use crate::error::SessionError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait Session: Send + Sync {
    fn id(&self) -> SessionId;

    fn is_connected(&self) -> bool {
        true
    }

    /// Sends a response paired with the request's `rpc_id`.
    async fn reply(&self, rpc_id: u32, message: Arc<dyn Message>) -> Result<(), SessionError>;
}

pub type SessionRef = Arc<dyn Session>;

/// A reply captured by [`LoopbackSession`].
#[derive(Debug, Clone)]
pub struct Reply {
    pub rpc_id: u32,
    pub message: Arc<dyn Message>,
}

#[derive(Debug, Default)]
pub struct LoopbackSession {
    id: SessionId,
    closed: AtomicBool,
    replies: Mutex<Vec<Reply>>,
}

impl LoopbackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub async fn replies(&self) -> Vec<Reply> {
        self.replies.lock().await.clone()
    }

    pub async fn take_replies(&self) -> Vec<Reply> {
        std::mem::take(&mut *self.replies.lock().await)
    }
}

#[async_trait]
impl Session for LoopbackSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn reply(&self, rpc_id: u32, message: Arc<dyn Message>) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::Closed);
        }
        self.replies.lock().await.push(Reply { rpc_id, message });
        Ok(())
    }
}
