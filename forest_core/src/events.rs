// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The sealed forest event variants and the synchronous event bus that
//! dispatches them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use forest_geometry::TreeBounds;
use forest_tree::{EntityId, TreeId};
use parking_lot::RwLock;

use crate::config::SubdivisionStrategy;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The shape of a tree, as carried by structural events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TreeShape {
    /// Cubic bounds (octree).
    Cubic,
    /// Tetrahedral bounds (tetree).
    Tetrahedral,
}

impl From<&TreeBounds> for TreeShape {
    fn from(bounds: &TreeBounds) -> Self {
        if bounds.is_tetrahedral() {
            Self::Tetrahedral
        } else {
            Self::Cubic
        }
    }
}

/// A structural change to the forest.
///
/// This is a sealed/closed set by design (not an extension point): every
/// variant carries `timestamp_ms` and `forest_id`, and listeners match
/// exhaustively rather than subscribing to string-typed topics.
#[derive(Debug)]
pub enum ForestEvent {
    /// A tree was added to the forest.
    TreeAdded {
        /// Milliseconds since the Unix epoch.
        timestamp_ms: u64,
        /// The forest that emitted this event.
        forest_id: String,
        /// The new tree's id.
        tree_id: TreeId,
        /// The new tree's bounds.
        bounds: TreeBounds,
        /// The new tree's shape.
        shape: TreeShape,
        /// The new tree's parent, if created by subdivision.
        parent_id: Option<TreeId>,
    },
    /// A tree was removed from the forest.
    TreeRemoved {
        /// Milliseconds since the Unix epoch.
        timestamp_ms: u64,
        /// The forest that emitted this event.
        forest_id: String,
        /// The removed tree's id.
        tree_id: TreeId,
    },
    /// A tree completed subdivision into children.
    TreeSubdivided {
        /// Milliseconds since the Unix epoch.
        timestamp_ms: u64,
        /// The forest that emitted this event.
        forest_id: String,
        /// The tree that was subdivided.
        parent_id: TreeId,
        /// The newly-created children, in subdivision order.
        child_ids: Vec<TreeId>,
        /// The strategy used.
        strategy_tag: SubdivisionStrategy,
        /// The shape of the children.
        child_shape: TreeShape,
    },
    /// Two or more trees were merged into a new tree.
    TreesMerged {
        /// Milliseconds since the Unix epoch.
        timestamp_ms: u64,
        /// The forest that emitted this event.
        forest_id: String,
        /// The ids of the trees that were merged (and removed).
        source_ids: Vec<TreeId>,
        /// The id of the new, merged tree.
        merged_id: TreeId,
    },
    /// An entity moved from one tree to another.
    EntityMigrated {
        /// Milliseconds since the Unix epoch.
        timestamp_ms: u64,
        /// The forest that emitted this event.
        forest_id: String,
        /// The migrated entity.
        entity_id: EntityId,
        /// The tree the entity moved out of.
        from_tree_id: TreeId,
        /// The tree the entity moved into.
        to_tree_id: TreeId,
    },
}

/// A listener for [`ForestEvent`]s.
///
/// Implementations should not block or panic; a panic is caught at the
/// dispatch boundary and logged, but it still means that listener's other
/// invariants (e.g. a counter it was about to update) may be left
/// inconsistent.
pub trait ForestListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &ForestEvent);
}

impl<F: Fn(&ForestEvent) + Send + Sync> ForestListener for F {
    fn on_event(&self, event: &ForestEvent) {
        self(event)
    }
}

/// An opaque handle returned by [`EventBus::add_listener`], used to remove
/// the listener later.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ListenerHandle(u64);

/// A synchronous, thread-safe dispatcher of [`ForestEvent`]s.
///
/// Listener registration is a copy-on-write list: readers (dispatch) never
/// block on registration/removal, which are comparatively rare. Dispatch is
/// synchronous on the emitting thread, in program order for that thread; a
/// panic inside one listener is caught so it cannot block listeners
/// registered after it.
pub struct EventBus {
    forest_id: String,
    listeners: RwLock<Vec<(u64, std::sync::Arc<dyn ForestListener>)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("forest_id", &self.forest_id)
            .field("listener_count", &self.listeners.read().len())
            .finish()
    }
}

impl EventBus {
    /// Create an event bus for the forest identified by `forest_id`.
    pub fn new(forest_id: impl Into<String>) -> Self {
        Self {
            forest_id: forest_id.into(),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The current timestamp/forest-id pair every emitted event carries.
    pub(crate) fn stamp(&self) -> (u64, String) {
        (now_ms(), self.forest_id.clone())
    }

    /// Register a listener, returning a handle to later remove it with
    /// [`EventBus::remove_listener`].
    pub fn add_listener(&self, listener: std::sync::Arc<dyn ForestListener>) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.write();
        let mut next = Vec::with_capacity(listeners.len() + 1);
        next.extend(listeners.iter().cloned());
        next.push((id, listener));
        *listeners = next;
        ListenerHandle(id)
    }

    /// Remove a previously-registered listener. Idempotent.
    pub fn remove_listener(&self, handle: ListenerHandle) {
        let mut listeners = self.listeners.write();
        let next: Vec<_> = listeners
            .iter()
            .filter(|(id, _)| *id != handle.0)
            .cloned()
            .collect();
        *listeners = next;
    }

    /// Dispatch `event` to every registered listener, in registration order.
    ///
    /// A panic in one listener is caught and logged at `error!`; it does
    /// not prevent subsequent listeners from running.
    pub fn emit(&self, event: ForestEvent) {
        let snapshot = self.listeners.read().clone();
        for (id, listener) in &snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
            if let Err(panic) = result {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                log::error!("forest event listener {id} panicked: {msg}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn sample_event(bus: &EventBus) -> ForestEvent {
        let (timestamp_ms, forest_id) = bus.stamp();
        ForestEvent::TreeRemoved {
            timestamp_ms,
            forest_id,
            tree_id: TreeId::new("t0"),
        }
    }

    #[test]
    fn listener_receives_events_until_removed() {
        let bus = EventBus::new("f");
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let handle = bus.add_listener(Arc::new(move |_event: &ForestEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let event = sample_event(&bus);
        bus.emit(event.clone());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        bus.remove_listener(handle);
        bus.emit(event);
        assert_eq!(count.load(Ordering::SeqCst), 1, "removed listener must not run again");
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let bus = EventBus::new("f");
        bus.add_listener(Arc::new(|_: &ForestEvent| panic!("boom")));
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        bus.add_listener(Arc::new(move |_: &ForestEvent| {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let event = sample_event(&bus);
        bus.emit(event);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}

impl Clone for ForestEvent {
    fn clone(&self) -> Self {
        match self {
            Self::TreeAdded {
                timestamp_ms,
                forest_id,
                tree_id,
                bounds,
                shape,
                parent_id,
            } => Self::TreeAdded {
                timestamp_ms: *timestamp_ms,
                forest_id: forest_id.clone(),
                tree_id: tree_id.clone(),
                bounds: *bounds,
                shape: *shape,
                parent_id: parent_id.clone(),
            },
            Self::TreeRemoved {
                timestamp_ms,
                forest_id,
                tree_id,
            } => Self::TreeRemoved {
                timestamp_ms: *timestamp_ms,
                forest_id: forest_id.clone(),
                tree_id: tree_id.clone(),
            },
            Self::TreeSubdivided {
                timestamp_ms,
                forest_id,
                parent_id,
                child_ids,
                strategy_tag,
                child_shape,
            } => Self::TreeSubdivided {
                timestamp_ms: *timestamp_ms,
                forest_id: forest_id.clone(),
                parent_id: parent_id.clone(),
                child_ids: child_ids.clone(),
                strategy_tag: *strategy_tag,
                child_shape: *child_shape,
            },
            Self::TreesMerged {
                timestamp_ms,
                forest_id,
                source_ids,
                merged_id,
            } => Self::TreesMerged {
                timestamp_ms: *timestamp_ms,
                forest_id: forest_id.clone(),
                source_ids: source_ids.clone(),
                merged_id: merged_id.clone(),
            },
            Self::EntityMigrated {
                timestamp_ms,
                forest_id,
                entity_id,
                from_tree_id,
                to_tree_id,
            } => Self::EntityMigrated {
                timestamp_ms: *timestamp_ms,
                forest_id: forest_id.clone(),
                entity_id: *entity_id,
                from_tree_id: from_tree_id.clone(),
                to_tree_id: to_tree_id.clone(),
            },
        }
    }
}
