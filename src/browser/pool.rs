//! Session pool
//!
//! Sessions are created lazily by a factory and handed out exclusively. A
//! [`PooledSession`] guard returns its session to the pool when dropped, so a
//! session released by one worker is reused by the next acquirer instead of
//! opening another one.

use crate::browser::PageSession;
use crate::{HarvestError, Result};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type SessionFactory<S> = dyn Fn() -> Result<S> + Send + Sync;

/// Arena of navigation sessions shared by the page workers
pub struct SessionPool<S: PageSession> {
    idle: Arc<Mutex<Vec<S>>>,
    factory: Arc<SessionFactory<S>>,
    created: Arc<AtomicUsize>,
}

impl<S: PageSession> Clone for SessionPool<S> {
    fn clone(&self) -> Self {
        Self {
            idle: Arc::clone(&self.idle),
            factory: Arc::clone(&self.factory),
            created: Arc::clone(&self.created),
        }
    }
}

impl<S: PageSession + 'static> SessionPool<S> {
    /// Creates an empty pool that builds sessions with `factory` on demand
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<S> + Send + Sync + 'static,
    {
        Self {
            idle: Arc::new(Mutex::new(Vec::new())),
            factory: Arc::new(factory),
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Takes an idle session, or creates one if none is free
    pub fn acquire(&self) -> Result<PooledSession<S>> {
        let reused = self
            .idle
            .lock()
            .map_err(|_| HarvestError::Session("session pool lock poisoned".to_string()))?
            .pop();

        let session = match reused {
            Some(session) => session,
            None => {
                let session = (self.factory)()?;
                let total = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!("Opened navigation session #{}", total);
                session
            }
        };

        Ok(PooledSession {
            session: Some(session),
            idle: Arc::clone(&self.idle),
        })
    }

    /// Number of sessions the factory has built so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of sessions currently waiting in the pool
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

/// Exclusive handle to a pooled session
pub struct PooledSession<S: PageSession> {
    session: Option<S>,
    idle: Arc<Mutex<Vec<S>>>,
}

impl<S: PageSession> Deref for PooledSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        // Only `drop` takes the session out.
        self.session.as_ref().expect("session present until drop")
    }
}

impl<S: PageSession> DerefMut for PooledSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().expect("session present until drop")
    }
}

impl<S: PageSession> Drop for PooledSession<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            match self.idle.lock() {
                Ok(mut idle) => idle.push(session),
                Err(_) => tracing::warn!("Session pool poisoned; discarding session"),
            }
        }
    }
}
