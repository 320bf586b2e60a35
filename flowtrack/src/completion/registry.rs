//! Outstanding-work registry: per (stage, message identifier) counters.

use super::{CompletionEvent, CompletionObserver, CompletionOutcome};
use crate::message::{Message, MessageId};
use crate::stage::{StageId, StageIdentity};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One open cycle of work: the units spawned but not yet completed for a
/// (stage, message identifier) pair, plus what is needed to build the
/// completion event when the last unit ends.
#[derive(Debug)]
struct OpenCycle {
    source: StageIdentity,
    message: Message,
    units: usize,
}

/// Tracks in-flight work per (stage, message identifier) pair and raises a
/// completion event exactly when a pair's counter returns to zero.
///
/// A registry instance is owned by the flow that created it and passed
/// explicitly (as `Arc`) to stages and dispatchers; there is no global
/// registry. Entries are created lazily on the first `begin` and removed on
/// the `end` that closes the cycle, so an entry exists iff work is in flight.
#[derive(Default)]
pub struct CompletionRegistry {
    pending: Mutex<HashMap<(StageId, MessageId), OpenCycle>>,
    observers: RwLock<Vec<Arc<dyn CompletionObserver>>>,
}

impl CompletionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for the registry's lifetime.
    pub fn subscribe(&self, observer: Arc<dyn CompletionObserver>) {
        self.observers.write().push(observer);
    }

    /// Records one unit of work taken on by `source` for `message`.
    ///
    /// Creates the counter entry if absent, capturing the originating message
    /// and stage identity for the eventual completion event. Receipts are
    /// tracked per occurrence, never deduplicated by identifier: a second
    /// `begin` for an already-open pair joins that cycle as one more unit.
    pub fn begin(&self, source: &StageIdentity, message: &Message) {
        let key = (source.id.clone(), message.id().clone());
        let mut pending = self.pending.lock();
        let cycle = pending.entry(key).or_insert_with(|| OpenCycle {
            source: source.clone(),
            message: message.clone(),
            units: 0,
        });
        cycle.units += 1;
        debug!(
            stage = %source.id,
            message = %message.id(),
            units = cycle.units,
            "begin unit"
        );
    }

    /// Adds a unit to an already-open cycle (handle forking).
    pub(crate) fn add_unit(&self, stage: &StageId, message: &MessageId) {
        let key = (stage.clone(), message.clone());
        let mut pending = self.pending.lock();
        if let Some(cycle) = pending.get_mut(&key) {
            cycle.units += 1;
            debug!(stage = %stage, message = %message, units = cycle.units, "fork unit");
        } else {
            warn!(stage = %stage, message = %message, "fork on a closed cycle ignored");
        }
    }

    /// Records that one unit of work for (`stage`, `message`) finished with
    /// the given outcome.
    ///
    /// On the transition to zero, removes the entry and dispatches a
    /// completion event to all observers, synchronously, in subscription
    /// order. An `end` with no matching `begin` is floored at zero: no event,
    /// no fault, a warning log.
    pub fn end(&self, stage: &StageId, message: &MessageId, outcome: CompletionOutcome) {
        let key = (stage.clone(), message.clone());
        let event = {
            let mut pending = self.pending.lock();
            let Some(cycle) = pending.get_mut(&key) else {
                warn!(stage = %stage, message = %message, "end without matching begin ignored");
                return;
            };
            cycle.units -= 1;
            debug!(stage = %stage, message = %message, units = cycle.units, "end unit");
            if cycle.units > 0 {
                return;
            }
            let Some(cycle) = pending.remove(&key) else {
                return;
            };
            CompletionEvent::new(cycle.source, cycle.message, outcome)
        };

        // Lock released before dispatch so observers may re-enter.
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_completion(&event);
        }
    }

    /// Returns the current unit count for a (stage, message identifier) pair.
    #[must_use]
    pub fn pending(&self, stage: &StageId, message: &MessageId) -> usize {
        self.pending
            .lock()
            .get(&(stage.clone(), message.clone()))
            .map_or(0, |cycle| cycle.units)
    }

    /// Returns the number of open cycles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if no work is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl std::fmt::Debug for CompletionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRegistry")
            .field("open_cycles", &self.len())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}
