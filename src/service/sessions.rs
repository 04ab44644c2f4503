use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

/// Tracks the live summary worker of each dashboard session.
///
/// Starting a worker for a session aborts whatever that session was still
/// running, so stale summaries never reach a newer search.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
    tickets: Arc<AtomicU64>,
}

struct Entry {
    ticket: u64,
    handle: AbortHandle,
}

impl SessionRegistry {
    pub fn start<F>(&self, session_id: &str, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let registry = self.clone();
        let key = session_id.to_string();

        // Held across the spawn so the worker cannot deregister before it is registered.
        let mut sessions = self.inner.lock().unwrap_or_else(|poison| poison.into_inner());

        let task = tokio::spawn(async move {
            work.await;
            registry.finish(&key, ticket);
        });

        if let Some(previous) = sessions.insert(
            session_id.to_string(),
            Entry {
                ticket,
                handle: task.abort_handle(),
            },
        ) {
            debug!(session_id, "aborting previous summary worker");
            previous.handle.abort();
        }

        task
    }

    /// Abort whatever `session_id` is still running, if anything.
    pub fn cancel(&self, session_id: &str) -> bool {
        let mut sessions = self.inner.lock().unwrap_or_else(|poison| poison.into_inner());
        match sessions.remove(session_id) {
            Some(entry) => {
                debug!(session_id, "cancelling summary worker");
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    fn finish(&self, session_id: &str, ticket: u64) {
        let mut sessions = self.inner.lock().unwrap_or_else(|poison| poison.into_inner());
        if sessions.get(session_id).is_some_and(|entry| entry.ticket == ticket) {
            sessions.remove(session_id);
        }
    }

    pub fn active(&self) -> usize {
        self.inner
            .lock()
            .map(|sessions| sessions.len())
            .unwrap_or_default()
    }
}
