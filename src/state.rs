use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dates;
use crate::store::EntryStore;
use crate::tracker::{Command, CycleTracker, Outcome, TrackerError};

#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => dates::today(),
            Clock::Fixed(date) => *date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerEvent {
    pub user_id: Uuid,
    pub outcome: Outcome,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Rejected(#[from] TrackerError),
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

/// A user's tracker, `None` until loaded from the store.
type Slot = Arc<Mutex<Option<CycleTracker>>>;

/// Shared server state. Each user's tracker sits behind its own lock, so
/// commands for one user apply strictly in order while other users proceed.
/// Users with nothing tracked are not kept in memory.
pub struct AppState<S> {
    pub store: S,
    pub clock: Clock,
    pub ovulation_day: i64,
    trackers: Arc<Mutex<HashMap<Uuid, Slot>>>,
    events: broadcast::Sender<TrackerEvent>,
}

impl<S: Clone> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock,
            ovulation_day: self.ovulation_day,
            trackers: self.trackers.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S: EntryStore> AppState<S> {
    pub fn new(store: S, clock: Clock, ovulation_day: i64) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            clock,
            ovulation_day,
            trackers: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Users whose trackers are currently held in memory.
    pub async fn cached_users(&self) -> usize {
        self.trackers.lock().await.len()
    }

    /// Runs `f` against the user's tracker, loading it from the store on first use.
    pub async fn read<T>(&self, user_id: Uuid, f: impl FnOnce(&CycleTracker) -> T) -> Result<T> {
        let mut slot = self.lock_user(user_id).await;
        let result = self.ensure_loaded(&mut slot, user_id).await.map(|tracker| f(tracker));
        self.evict_if_empty(user_id, &slot).await;
        result
    }

    /// Applies a command, persists the period entries and announces the change.
    /// A failed save leaves the in-memory tracker untouched.
    pub async fn apply(&self, user_id: Uuid, command: Command) -> Result<Outcome, ApplyError> {
        let today = self.today();
        let mut slot = self.lock_user(user_id).await;
        let result = match self.ensure_loaded(&mut slot, user_id).await {
            Ok(tracker) => self.commit(tracker, user_id, command, today).await,
            Err(e) => Err(ApplyError::Storage(e)),
        };
        self.evict_if_empty(user_id, &slot).await;
        result
    }

    async fn commit(
        &self,
        tracker: &mut CycleTracker,
        user_id: Uuid,
        command: Command,
        today: NaiveDate,
    ) -> Result<Outcome, ApplyError> {
        let mut next = tracker.clone();
        let outcome = next.apply(command, today)?;

        self.store
            .save_all(user_id, &next.stored_records(&Local))
            .await
            .map_err(|e| {
                error!("❌ Failed to save entries for {}: {:#}", user_id, e);
                ApplyError::Storage(e)
            })?;

        *tracker = next;
        // No subscribers is fine.
        let _ = self.events.send(TrackerEvent { user_id, outcome });
        Ok(outcome)
    }

    /// Locks the user's slot. A slot evicted while we waited is stale, so
    /// the lookup starts over.
    async fn lock_user(&self, user_id: Uuid) -> OwnedMutexGuard<Option<CycleTracker>> {
        loop {
            let slot = self.trackers.lock().await.entry(user_id).or_default().clone();
            let guard = slot.clone().lock_owned().await;
            let current = self
                .trackers
                .lock()
                .await
                .get(&user_id)
                .is_some_and(|current| Arc::ptr_eq(current, &slot));
            if current {
                return guard;
            }
        }
    }

    async fn ensure_loaded<'a>(
        &self,
        slot: &'a mut Option<CycleTracker>,
        user_id: Uuid,
    ) -> Result<&'a mut CycleTracker> {
        if slot.is_none() {
            let records = self.store.load_all(user_id).await.map_err(|e| {
                error!("❌ Failed to load entries for {}: {:#}", user_id, e);
                e
            })?;
            let (tracker, report) = CycleTracker::load(records, &Local, self.ovulation_day);
            if !report.skipped.is_empty() {
                warn!(
                    "⚠️ Skipped {} malformed entries for {}",
                    report.skipped.len(),
                    user_id
                );
            }
            info!("📅 Loaded {} period entries for {}", report.loaded, user_id);
            *slot = Some(tracker);
        }
        slot.as_mut().context("tracker slot emptied while locked")
    }

    /// Must be called while holding the user's slot lock.
    async fn evict_if_empty(&self, user_id: Uuid, slot: &Option<CycleTracker>) {
        if slot.as_ref().map_or(true, CycleTracker::is_empty) {
            self.trackers.lock().await.remove(&user_id);
        }
    }
}
