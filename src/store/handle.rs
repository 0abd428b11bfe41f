//! Shared handle to the process-wide store connection.
//!
//! Cloned into every component that needs the store; never recreated per request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::watch;

use crate::store::driver::{StoreConnection, StoreError};
use crate::store::state::ConnectionState;

struct Shared {
    state: watch::Sender<ConnectionState>,
    /// Published before the state flips to Connected, retracted after it leaves.
    connection: ArcSwapOption<Arc<dyn StoreConnection>>,
    times_connected: AtomicU64,
    selection_timeout: Duration,
}

/// Cheap, cloneable view of the store connection.
#[derive(Clone)]
pub struct StoreHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("state", &self.state())
            .field("times_connected", &self.times_connected())
            .finish()
    }
}

impl StoreHandle {
    /// A handle with no connection behind it.
    ///
    /// `acquire` waits at most `selection_timeout` for a connection.
    pub fn disconnected(selection_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                state,
                connection: ArcSwapOption::empty(),
                times_connected: AtomicU64::new(0),
                selection_timeout,
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Number of transitions into `Connected` so far.
    pub fn times_connected(&self) -> u64 {
        self.shared.times_connected.load(Ordering::SeqCst)
    }

    /// The live connection, failing fast when the store is not connected.
    pub fn connection(&self) -> Result<Arc<dyn StoreConnection>, StoreError> {
        if !self.state().is_connected() {
            return Err(StoreError::Unavailable);
        }
        self.shared
            .connection
            .load_full()
            .map(|conn| Arc::clone(&*conn))
            .ok_or(StoreError::Unavailable)
    }

    /// Wait for a connection, bounded by the server-selection timeout.
    pub async fn acquire(&self) -> Result<Arc<dyn StoreConnection>, StoreError> {
        let mut rx = self.subscribe();
        let ready = tokio::time::timeout(self.shared.selection_timeout, async {
            rx.wait_for(|state| state.is_connected()).await.map(|_| ())
        })
        .await;

        match ready {
            Ok(Ok(())) => self.connection(),
            Ok(Err(_)) | Err(_) => Err(StoreError::Unavailable),
        }
    }

    /// Update the state. Returns `true` when it actually changed.
    pub(crate) fn set_state(&self, next: ConnectionState) -> bool {
        let previous = self.shared.state.send_replace(next);
        if previous == next {
            return false;
        }
        if next.is_connected() {
            self.shared.times_connected.fetch_add(1, Ordering::SeqCst);
        }
        true
    }

    pub(crate) fn publish(&self, connection: Arc<dyn StoreConnection>) {
        self.shared.connection.store(Some(Arc::new(connection)));
    }

    pub(crate) fn retract(&self) -> Option<Arc<dyn StoreConnection>> {
        self.shared
            .connection
            .swap(None)
            .map(|conn| Arc::clone(&*conn))
    }
}
