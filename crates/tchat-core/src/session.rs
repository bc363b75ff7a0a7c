//! Seams to the browser-side collaborators.

use crate::error::{ProbeError, SendError, SessionError};
use crate::record::RawFragment;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Surfaces chat entries appended to the page since the previous call,
/// in page order.
#[async_trait]
pub trait FragmentProbe: Send + Sync {
    async fn poll_new_fragments(&self) -> Result<Vec<RawFragment>, ProbeError>;
}

/// Posts one message into the chat room.
#[async_trait]
pub trait OutgoingSender: Send + Sync {
    async fn send_outgoing(&self, text: &str) -> Result<(), SendError>;
}

/// Tears down the remote browser session.
#[async_trait]
pub trait SessionRelease: Send + Sync {
    async fn close(&self) -> Result<(), SessionError>;
}

#[async_trait]
impl<T: FragmentProbe + ?Sized> FragmentProbe for Arc<T> {
    async fn poll_new_fragments(&self) -> Result<Vec<RawFragment>, ProbeError> {
        (**self).poll_new_fragments().await
    }
}

#[async_trait]
impl<T: OutgoingSender + ?Sized> OutgoingSender for Arc<T> {
    async fn send_outgoing(&self, text: &str) -> Result<(), SendError> {
        (**self).send_outgoing(text).await
    }
}

/// Shared handle to an authenticated session. Any holder may call
/// [`SessionLease::release`]; the underlying close runs at most once.
pub struct SessionLease<S> {
    session: S,
    released: AtomicBool,
}

impl<S> SessionLease<S> {
    pub fn new(session: S) -> Arc<Self> {
        Arc::new(Self {
            session,
            released: AtomicBool::new(false),
        })
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl<S: SessionRelease> SessionLease<S> {
    /// Returns `true` for the caller that actually performed the close.
    pub async fn release(&self, origin: &str) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self.session.close().await {
            Ok(()) => info!(event = "session_released", origin = origin),
            Err(err) => warn!(event = "session_release_failed", origin = origin, error = %err),
        }
        true
    }
}

#[async_trait]
impl<S: FragmentProbe> FragmentProbe for SessionLease<S> {
    async fn poll_new_fragments(&self) -> Result<Vec<RawFragment>, ProbeError> {
        if self.is_released() {
            return Err(ProbeError::SessionLost("session already released".to_string()));
        }
        self.session.poll_new_fragments().await
    }
}

#[async_trait]
impl<S: OutgoingSender> OutgoingSender for SessionLease<S> {
    async fn send_outgoing(&self, text: &str) -> Result<(), SendError> {
        if self.is_released() {
            return Err(SendError::Transport("session already released".to_string()));
        }
        self.session.send_outgoing(text).await
    }
}
