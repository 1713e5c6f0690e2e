//! Per-session turn serialization
//!
//! Turns on the same session run one at a time; turns on different sessions
//! never wait on each other. Entries are dropped once no turn holds or awaits
//! them, so the map only grows with concurrently active sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

#[derive(Default)]
pub struct SessionLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`
    pub async fn acquire(&self, session_id: &str) -> SessionGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            // A waiter dropped mid-acquire leaves an idle slot behind
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(session_id.to_string()).or_default())
        };
        let guard = slot.lock_owned().await;
        SessionGuard {
            session_id: session_id.to_string(),
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn active(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// Held for the duration of a turn
pub struct SessionGuard {
    session_id: String,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Release first so the strong count reflects only waiters
        drop(self.guard.take());
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get(&self.session_id) {
            if Arc::strong_count(slot) == 1 {
                slots.remove(&self.session_id);
            }
        }
    }
}
