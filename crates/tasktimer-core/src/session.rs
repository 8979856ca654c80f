//! Running/stopped timer for a single task on a single date

use crate::{Store, TaskEntry};
use chrono::NaiveDateTime;

/// In-memory timing session for one task.
///
/// The stored `seconds` of the task only advances in [`TimeSession::stop`];
/// while running, [`TimeSession::display_seconds`] adds the live delta on
/// every read without touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSession {
    date: String,
    task: String,
    started_at: Option<NaiveDateTime>,
}

impl TimeSession {
    pub fn new(date: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            task: task.into(),
            started_at: None,
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<NaiveDateTime> {
        self.started_at
    }

    /// Begin timing. Returns false (and keeps the original start) if the
    /// session is already running.
    pub fn start(&mut self, now: NaiveDateTime) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now);
        true
    }

    /// Whole seconds since the session started; zero when stopped
    pub fn elapsed(&self, now: NaiveDateTime) -> u64 {
        self.started_at
            .map(|start| elapsed_seconds(start, now))
            .unwrap_or(0)
    }

    /// End timing and commit the elapsed seconds to the task's entry in
    /// `store`, creating the entry if it is missing. Persisting `store` is
    /// the caller's job.
    ///
    /// Returns `None` if the session was not running, or if the date or task
    /// holds a malformed value in `store`; the session then keeps running.
    pub fn stop(&mut self, now: NaiveDateTime, store: &mut Store) -> Option<u64> {
        let elapsed = self.started_at.map(|start| elapsed_seconds(start, now))?;
        if !commit_seconds(store, &self.date, &self.task, elapsed) {
            return None;
        }
        self.started_at = None;
        Some(elapsed)
    }

    /// Stop without committing anything. Returns whether it was running.
    pub fn cancel(&mut self) -> bool {
        self.started_at.take().is_some()
    }

    /// Seconds to show for the task: confirmed seconds plus the live delta
    pub fn display_seconds(&self, store: &Store, now: NaiveDateTime) -> u64 {
        let confirmed = store
            .day(&self.date)
            .and_then(|day| day.task(&self.task))
            .map(|entry| entry.seconds)
            .unwrap_or(0);
        confirmed.saturating_add(self.elapsed(now))
    }

    /// Discard the task: any running time is dropped, the entry is removed,
    /// and the date disappears if nothing is left on it. Returns the removed
    /// entry, or `None` if the task did not exist.
    pub fn delete(mut self, store: &mut Store) -> Option<TaskEntry> {
        self.cancel();
        let removed = store.day_mut(&self.date)?.remove_task(&self.task)?;
        store.remove_day_if_empty(&self.date);
        Some(removed)
    }
}

/// Add `seconds` to a task's confirmed total, creating the entry if it is
/// missing. Returns false and leaves `store` untouched when the date or the
/// task holds a malformed value.
pub fn commit_seconds(store: &mut Store, date: &str, task: &str, seconds: u64) -> bool {
    match store.day_entry(date).and_then(|day| day.entry_mut(task)) {
        Some(entry) => {
            entry.seconds = entry.seconds.saturating_add(seconds);
            true
        }
        None => false,
    }
}

/// Whole seconds between two instants, clamped at zero if the clock went
/// backwards
pub fn elapsed_seconds(start: NaiveDateTime, now: NaiveDateTime) -> u64 {
    (now - start).num_seconds().max(0) as u64
}
