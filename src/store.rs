//! In-memory arena of live tracking tasks

use crate::types::{Snapshot, TrackingTask};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// A task together with everything captured for it so far
#[derive(Debug)]
pub struct TaskEntry {
    pub task: TrackingTask,
    /// Snapshots accumulated for the final analysis
    pub snapshots: Vec<Snapshot>,
    /// Set once finalization started; the entry is about to leave the store
    pub finished: bool,
}

/// Type alias for an individual task slot
///
/// Holding the slot lock serializes capture and finalization for one event
/// while other events proceed independently.
pub type TaskSlot = Arc<Mutex<TaskEntry>>;

/// Type alias for the task map (event id -> scheduling order, task slot)
type TaskMap = HashMap<String, (u64, TaskSlot)>;

#[derive(Default)]
struct StoreState {
    tasks: TaskMap,
    next_order: u64,
}

/// Store for live tracking tasks keyed by event id
///
/// The map lock is only ever held for lookups and membership changes, never
/// while waiting on a task slot, so a slow capture for one event does not
/// block scheduling or ticking of others.
pub struct TaskStore {
    state: Arc<RwLock<StoreState>>,
}

impl TaskStore {
    /// Creates an empty task store
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    /// Inserts a new task unless one with the same event id is live
    ///
    /// # Returns
    /// The locked slot of the new task, or `None` when the event id is
    /// already tracked. The caller holds the lock until the initial capture
    /// is done, so a concurrent tick cannot observe a half-initialized task.
    pub async fn insert_locked(&self, task: TrackingTask) -> Option<OwnedMutexGuard<TaskEntry>> {
        let mut state = self.state.write().await;
        if state.tasks.contains_key(&task.event_id) {
            return None;
        }

        let event_id = task.event_id.clone();
        let slot: TaskSlot = Arc::new(Mutex::new(TaskEntry {
            task,
            snapshots: Vec::new(),
            finished: false,
        }));
        // Fresh slot, nobody else can hold it yet
        let guard = slot.clone().lock_owned().await;

        let order = state.next_order;
        state.next_order += 1;
        state.tasks.insert(event_id, (order, slot));

        Some(guard)
    }

    /// Gets the slot for an event
    pub async fn get(&self, event_id: &str) -> Option<TaskSlot> {
        let state = self.state.read().await;
        state.tasks.get(event_id).map(|(_, slot)| slot.clone())
    }

    /// All live slots in scheduling order
    pub async fn slots(&self) -> Vec<(String, TaskSlot)> {
        let state = self.state.read().await;
        let mut slots: Vec<(u64, String, TaskSlot)> = state
            .tasks
            .iter()
            .map(|(event_id, (order, slot))| (*order, event_id.clone(), slot.clone()))
            .collect();
        slots.sort_by_key(|(order, _, _)| *order);

        slots
            .into_iter()
            .map(|(_, event_id, slot)| (event_id, slot))
            .collect()
    }

    /// Removes an event's task
    ///
    /// # Returns
    /// True if the event was tracked
    pub async fn remove(&self, event_id: &str) -> bool {
        let mut state = self.state.write().await;
        state.tasks.remove(event_id).is_some()
    }

    /// Checks if an event is currently tracked
    pub async fn contains(&self, event_id: &str) -> bool {
        let state = self.state.read().await;
        state.tasks.contains_key(event_id)
    }

    /// Event ids of all live tasks in scheduling order
    pub async fn event_ids(&self) -> Vec<String> {
        self.slots()
            .await
            .into_iter()
            .map(|(event_id, _)| event_id)
            .collect()
    }

    /// Number of live tasks
    pub async fn len(&self) -> usize {
        self.state.read().await.tasks.len()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
