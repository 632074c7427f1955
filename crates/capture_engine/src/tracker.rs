use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use capture_core::{update, CaptureState, Effect, Msg, Phase, ProgressInfo};
use capture_logging::capture_debug;

/// Push-notification sink for progress snapshots, called on the thread that
/// changed the state. Observers may read progress or call `stop_capture`,
/// but must not start a capture from inside the callback.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &ProgressInfo);
}

/// Forwards snapshots into a std channel; a dropped receiver is ignored.
pub struct ChannelProgressObserver {
    tx: Mutex<std::sync::mpsc::Sender<ProgressInfo>>,
}

impl ChannelProgressObserver {
    pub fn new(tx: std::sync::mpsc::Sender<ProgressInfo>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl ProgressObserver for ChannelProgressObserver {
    fn on_progress(&self, progress: &ProgressInfo) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = tx.send(progress.clone());
    }
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    fn on_progress(&self, progress: &ProgressInfo) {
        self(progress)
    }
}

struct TrackedState {
    state: CaptureState,
    /// Bumped on every published change; orders observer deliveries.
    revision: u64,
}

struct ObserverSlot {
    observer: Option<Arc<dyn ProgressObserver>>,
    delivered: u64,
}

/// Holds the session state. All mutation goes through [`ProgressTracker::apply`],
/// which runs the pure `update` under one lock; snapshots are clones taken
/// under the same lock.
pub struct ProgressTracker {
    state: Mutex<TrackedState>,
    slot: Mutex<ObserverSlot>,
    has_observer: AtomicBool,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackedState {
                state: CaptureState::new(),
                revision: 0,
            }),
            slot: Mutex::new(ObserverSlot {
                observer: None,
                delivered: 0,
            }),
            has_observer: AtomicBool::new(false),
        }
    }

    /// Register (or clear) the observer. Only one observer is held.
    pub fn set_observer(&self, observer: Option<Arc<dyn ProgressObserver>>) {
        let mut slot = lock(&self.slot);
        self.has_observer.store(observer.is_some(), Ordering::Release);
        slot.observer = observer;
    }

    pub fn snapshot(&self) -> ProgressInfo {
        lock(&self.state).state.view()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).state.phase()
    }

    /// Read access to the full state for the controller.
    pub fn with_state<R>(&self, f: impl FnOnce(&CaptureState) -> R) -> R {
        f(&lock(&self.state).state)
    }

    /// Apply `msg`, notify the observer if progress changed, and return the
    /// effects the caller still has to run.
    pub fn apply(&self, msg: Msg) -> Vec<Effect> {
        self.apply_inner(msg).1
    }

    /// Apply `msg` and report whether it changed the state. Used where a
    /// refused transition matters, such as a worker claiming an entry.
    pub fn try_apply(&self, msg: Msg) -> bool {
        self.apply_inner(msg).0
    }

    fn apply_inner(&self, msg: Msg) -> (bool, Vec<Effect>) {
        let (effects, published) = {
            let mut tracked = lock(&self.state);
            let current = std::mem::take(&mut tracked.state);
            let (next, effects) = update(current, msg);
            tracked.state = next;

            let publish = effects.contains(&Effect::PublishProgress);
            if publish {
                tracked.revision += 1;
            }
            let published = (publish && self.has_observer.load(Ordering::Acquire))
                .then(|| (tracked.revision, tracked.state.view()));
            (effects, published)
        };

        if let Some((revision, progress)) = published {
            self.deliver(revision, &progress);
        }

        let changed = !effects.is_empty();
        let remaining = effects
            .into_iter()
            .filter(|effect| *effect != Effect::PublishProgress)
            .collect();
        (changed, remaining)
    }

    fn deliver(&self, revision: u64, progress: &ProgressInfo) {
        let mut slot = lock(&self.slot);
        // Snapshots taken concurrently may arrive here out of order.
        if revision <= slot.delivered {
            capture_debug!("dropping stale progress revision {}", revision);
            return;
        }
        slot.delivered = revision;
        if let Some(observer) = slot.observer.clone() {
            observer.on_progress(progress);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
