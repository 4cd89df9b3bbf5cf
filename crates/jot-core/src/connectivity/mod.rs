//! Network reachability signal.
//!
//! The monitor is a pure signal source: it holds the current reachability
//! value, publishes it on a `watch` channel and invokes registered handlers
//! once per transition. It never retries anything itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

/// Direction of a reachability transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Online,
    Offline,
}

impl Direction {
    const fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Handle returned by [`ConnectivityMonitor::on_transition`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn() + Send + Sync>;

struct Listener {
    id: ListenerId,
    direction: Direction,
    handler: Handler,
}

struct Inner {
    state: watch::Sender<bool>,
    listeners: Mutex<Vec<Listener>>,
    next_listener: AtomicU64,
}

/// Shared reachability state with transition callbacks
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            inner: Arc::new(Inner {
                state,
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Point-in-time reachability
    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Feed a platform reachability reading.
    ///
    /// Returns `true` when the reading caused a transition; handlers for that
    /// direction run on the caller's thread before this returns.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            let direction = Direction::from_online(online);
            tracing::info!("Connectivity changed: {direction:?}");

            let handlers = self
                .listeners()
                .iter()
                .filter(|listener| listener.direction == direction)
                .map(|listener| Arc::clone(&listener.handler))
                .collect::<Vec<_>>();
            for handler in handlers {
                handler();
            }
        }

        changed
    }

    /// Register a callback for transitions in `direction`
    pub fn on_transition(
        &self,
        direction: Direction,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners().push(Listener {
            id,
            direction,
            handler: Arc::new(handler),
        });
        id
    }

    /// Unregister a callback; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    /// Receiver that observes every reachability value
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    fn listeners(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Check whether `url` answers at all; any HTTP status counts as reachable.
pub async fn probe(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    match client.head(url).timeout(timeout).send().await {
        Ok(_) => true,
        Err(error) => {
            tracing::debug!("Reachability probe to {url} failed: {error}");
            false
        }
    }
}

/// One-off reachability check with a fresh client
pub async fn is_reachable(url: &str, timeout: Duration) -> bool {
    match reqwest::Client::builder().build() {
        Ok(client) => probe(&client, url, timeout).await,
        Err(error) => {
            tracing::warn!("Could not build reachability client: {error}");
            false
        }
    }
}
