//! Host lifecycle notifications.
//!
//! A host (an application shell, a service manager, a test) implements
//! [`LifecycleHost`] and hands it to each box at construction. The box
//! subscribes a listener that saves on [`LifecycleEvent::Suspend`] and
//! [`LifecycleEvent::Exit`], and unsubscribes when destroyed.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LifecycleEvent {
    Start,
    Suspend,
    Resume,
    Exit,
}

impl LifecycleEvent {
    /// Events on which a loaded box persists itself.
    pub fn triggers_save(self) -> bool {
        matches!(self, LifecycleEvent::Suspend | LifecycleEvent::Exit)
    }
}

/// Receives lifecycle events. May be called from any thread.
pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, event: LifecycleEvent);
}

/// Handle for a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The environment a box lives in.
pub trait LifecycleHost: Send + Sync + std::fmt::Debug {
    fn subscribe(&self, listener: Arc<dyn LifecycleListener>) -> ListenerId;

    /// Returns whether `id` was subscribed.
    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// Platform flag deciding whether `path` is included in backups or cloud
    /// sync. Hosts without such a notion return `None`.
    fn set_sync(&self, _path: &Path, _enabled: bool) -> Option<bool> {
        None
    }
}

type Listeners = Vec<(ListenerId, Arc<dyn LifecycleListener>)>;

/// In-process [`LifecycleHost`]: keeps a listener registry and dispatches
/// whatever is passed to [`LifecycleHub::notify`].
#[derive(Default)]
pub struct LifecycleHub {
    next_id: AtomicU64,
    listeners: Mutex<Listeners>,
    sync_flags: Mutex<HashMap<PathBuf, bool>>,
}

impl std::fmt::Debug for LifecycleHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHub")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl LifecycleHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver `event` to every listener; returns how many were notified.
    ///
    /// Listeners run outside the registry lock, so they may subscribe or
    /// unsubscribe while handling the event.
    pub fn notify(&self, event: LifecycleEvent) -> usize {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        debug!("dispatching {} to {} listener(s)", event, listeners.len());
        for listener in &listeners {
            listener.on_event(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Last value passed to [`LifecycleHost::set_sync`] for `path`.
    pub fn sync_flag(&self, path: &Path) -> Option<bool> {
        self.sync_flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
    }
}

impl LifecycleHost for LifecycleHub {
    fn subscribe(&self, listener: Arc<dyn LifecycleListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    fn set_sync(&self, path: &Path, enabled: bool) -> Option<bool> {
        self.sync_flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), enabled);
        Some(enabled)
    }
}
