//! Entry point for front ends: tasks, timing sessions, notes, and reports
//!
//! Every mutation is a full load-modify-save of the store. A single
//! `Tracker` is meant to be the only writer of its data file.
//!
//! Time from a stopped session that could not be written is held in memory
//! and folded into the next save that succeeds, so a failed write never
//! loses it.

use crate::chart::{ChartData, ChartSeries};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, SavePolicy};
use crate::error_log::ErrorLog;
use crate::export::{ExportError, ExportFormat, Exporter};
use crate::metrics::{DaySummary, Metrics, Summary};
use crate::session::{commit_seconds, TimeSession};
use crate::store::{JsonStore, StoreError};
use crate::{date_key, Store, TaskEntry, NOTE_KEY};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    #[error("Invalid task name: {0:?}")]
    InvalidTaskName(String),
    #[error("Task {task:?} not found on {date}")]
    TaskNotFound { date: String, task: String },
    #[error("{date} holds a value that is not a day record; fix it in the data file first")]
    MalformedDay { date: String },
    #[error("Task {task:?} on {date} holds a malformed value; fix it in the data file first")]
    MalformedTask { date: String, task: String },
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// A task as shown in a day's task list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub name: String,
    pub seconds: u64,
    pub description: String,
    pub running: bool,
}

type SessionKey = (NaiveDate, String);

/// Pending seconds that found no place in the store, each with the reason
type Unplaced = Vec<(SessionKey, TrackerError)>;

pub struct Tracker<C: Clock = SystemClock> {
    config: Config,
    store: JsonStore,
    error_log: ErrorLog,
    clock: C,
    sessions: HashMap<SessionKey, TimeSession>,
    pending: HashMap<SessionKey, u64>,
}

impl Tracker<SystemClock> {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Tracker<C> {
    pub fn with_clock(config: Config, clock: C) -> Self {
        let error_log = ErrorLog::new(config.error_log_path());
        let store = JsonStore::open(config.data_path(), error_log.clone());
        Self {
            config,
            store,
            error_log,
            clock,
            sessions: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Load the store, reporting read failures to the error log
    pub fn snapshot(&self) -> Result<Store> {
        let result = self.store.load().map_err(TrackerError::from);
        self.surface("Loading store", result)
    }

    /// Add an empty task to a date. Returns false if it already exists.
    pub fn add_task(&mut self, date: NaiveDate, name: &str) -> Result<bool> {
        let name = validate_name(name)?;
        let result = self.try_add_task(&date_key(date), name);
        self.surface("Adding task", result)
    }

    fn try_add_task(&mut self, date: &str, name: &str) -> Result<bool> {
        let mut store = self.store.load()?;
        let Some(day) = store.day_entry(date) else {
            return Err(TrackerError::MalformedDay {
                date: date.to_string(),
            });
        };
        if day.is_malformed(name) {
            return Err(TrackerError::MalformedTask {
                date: date.to_string(),
                task: name.to_string(),
            });
        }
        let added = day.insert_task(name, TaskEntry::default());
        if added || !self.pending.is_empty() {
            self.save_with_pending(&mut store)?;
        }
        if added {
            info!("Added task {:?} on {}", name, date);
        }
        Ok(added)
    }

    /// Start timing a task. Returns false if it is already running.
    pub fn start(&mut self, date: NaiveDate, name: &str) -> Result<bool> {
        let name = name.trim();
        let key = date_key(date);
        let store = self.snapshot()?;
        if store.day(&key).and_then(|d| d.task(name)).is_none() {
            return Err(self.not_found(&key, name));
        }

        let now = self.clock.now();
        let started = self
            .sessions
            .entry((date, name.to_string()))
            .or_insert_with(|| TimeSession::new(key.as_str(), name))
            .start(now);
        if started {
            info!("Started {:?} on {}", name, key);
        }
        Ok(started)
    }

    /// Stop timing a task and persist the elapsed seconds.
    ///
    /// Returns `None` if the task was not running. Under the lenient policy a
    /// failed write is logged, the elapsed time is held until the next save
    /// that succeeds, and it is still returned. Under the strict policy the
    /// session keeps running and the error is returned.
    pub fn stop(&mut self, date: NaiveDate, name: &str) -> Result<Option<u64>> {
        let key = (date, name.trim().to_string());
        let Some(session) = self.sessions.get(&key).filter(|s| s.is_running()) else {
            return Ok(None);
        };
        let elapsed = session.elapsed(self.clock.now());

        self.add_pending(&key, elapsed);
        let committed = match self.commit_pending() {
            Ok(unplaced) => match unplaced.into_iter().find(|(k, _)| *k == key) {
                Some((_, err)) => Err(err),
                None => Ok(()),
            },
            Err(e) => Err(e.into()),
        };
        if let Err(e) = committed {
            if let Err(err) = self.absorb("Saving stopped session", e) {
                self.remove_pending(&key, elapsed);
                return Err(err);
            }
            warn!(
                "{}s for {:?} on {} held until the next successful save",
                elapsed, key.1, date
            );
        }

        self.sessions.remove(&key);
        info!("Stopped {:?} on {} after {}s", key.1, date, elapsed);
        Ok(Some(elapsed))
    }

    /// Seconds from stopped sessions that are not on disk yet
    pub fn pending_seconds(&self) -> u64 {
        self.pending.values().sum()
    }

    /// Retry writing held session time
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let result = self
            .commit_pending()
            .map(|_| ())
            .map_err(TrackerError::from);
        self.surface("Saving held session time", result)
    }

    /// Stop every running session, e.g. before the front end exits
    pub fn stop_all(&mut self) -> Result<Vec<(NaiveDate, String, u64)>> {
        let running: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_running())
            .map(|(k, _)| k.clone())
            .collect();

        let mut stopped = Vec::new();
        for (date, name) in running {
            if let Some(elapsed) = self.stop(date, &name)? {
                stopped.push((date, name, elapsed));
            }
        }
        Ok(stopped)
    }

    pub fn is_running(&self, date: NaiveDate, name: &str) -> bool {
        self.sessions
            .get(&(date, name.trim().to_string()))
            .is_some_and(TimeSession::is_running)
    }

    /// Number of running sessions on a date
    pub fn running_count(&self, date: NaiveDate) -> usize {
        self.sessions
            .iter()
            .filter(|((day, _), s)| *day == date && s.is_running())
            .count()
    }

    /// Confirmed seconds plus any live session time, without writing anything
    pub fn display_seconds(&self, date: NaiveDate, name: &str) -> Result<u64> {
        let store = self.snapshot()?;
        Ok(self.live_seconds(&store, date, name))
    }

    /// Like [`Tracker::display_seconds`] but against an already loaded store,
    /// for refresh ticks
    pub fn live_seconds(&self, store: &Store, date: NaiveDate, name: &str) -> u64 {
        let key = (date, name.trim().to_string());
        let shown = match self.sessions.get(&key) {
            Some(session) => session.display_seconds(store, self.clock.now()),
            None => store
                .day(&date_key(date))
                .and_then(|d| d.task(&key.1))
                .map(|e| e.seconds)
                .unwrap_or(0),
        };
        shown.saturating_add(self.pending.get(&key).copied().unwrap_or(0))
    }

    /// Remove a task. A running session for it is discarded without
    /// committing its time.
    pub fn delete_task(&mut self, date: NaiveDate, name: &str) -> Result<()> {
        let result = self.try_delete_task(date, name);
        self.surface("Deleting task", result)
    }

    fn try_delete_task(&mut self, date: NaiveDate, name: &str) -> Result<()> {
        let name = name.trim();
        let day = date_key(date);
        let mut store = self.store.load()?;
        let key = (date, name.to_string());
        let session = self
            .sessions
            .get(&key)
            .cloned()
            .unwrap_or_else(|| TimeSession::new(day.as_str(), name));

        // held time of a deleted task goes with it
        let held = self.pending.contains_key(&key);
        if session.delete(&mut store).is_none() && !held {
            return Err(self.not_found(&day, name));
        }

        self.pending.remove(&key);
        self.save_with_pending(&mut store)?;
        self.sessions.remove(&key);
        info!("Deleted task {:?} on {}", name, day);
        Ok(())
    }

    pub fn edit_description(&mut self, date: NaiveDate, name: &str, text: &str) -> Result<()> {
        let name = name.trim();
        let date = date_key(date);
        let mut store = self.snapshot()?;
        match store.day_mut(&date).and_then(|d| d.task_mut(name)) {
            Some(entry) => entry.description = text.to_string(),
            None => return Err(self.not_found(&date, name)),
        }
        self.autosave(&mut store, "Saving description")
    }

    /// Set the notepad text for a date. Empty text removes the note.
    pub fn set_note(&mut self, date: NaiveDate, text: &str) -> Result<()> {
        let result = self.try_set_note(&date_key(date), text);
        self.surface("Saving note", result)
    }

    fn try_set_note(&mut self, date: &str, text: &str) -> Result<()> {
        let mut store = self.store.load()?;
        if store.is_foreign(date) {
            return Err(TrackerError::MalformedDay {
                date: date.to_string(),
            });
        }
        if text.is_empty() {
            match store.day_mut(date) {
                Some(day) => day.set_note(None),
                None => return Ok(()),
            }
            store.remove_day_if_empty(date);
        } else if let Some(day) = store.day_entry(date) {
            day.set_note(Some(text.to_string()));
        }
        self.save_with_pending(&mut store)?;
        debug!("Saved note for {}", date);
        Ok(())
    }

    pub fn note(&self, date: NaiveDate) -> Result<Option<String>> {
        let store = self.snapshot()?;
        Ok(store
            .day(&date_key(date))
            .and_then(|d| d.note())
            .map(str::to_string))
    }

    /// Tasks of a date in their stored order, with live times
    pub fn tasks_for_date(&self, date: NaiveDate) -> Result<Vec<TaskRow>> {
        let store = self.snapshot()?;
        let Some(day) = store.day(&date_key(date)) else {
            return Ok(Vec::new());
        };

        Ok(day
            .tasks()
            .map(|(name, entry)| TaskRow {
                name: name.to_string(),
                seconds: self.live_seconds(&store, date, name),
                description: entry.description.clone(),
                running: self.is_running(date, name),
            })
            .collect())
    }

    /// Per-task seconds for a date including live session time
    pub fn day_summary(&self, date: NaiveDate) -> Result<DaySummary> {
        let store = self.snapshot()?;
        let key = date_key(date);
        let mut summary = Metrics::new(&store).summarize_day(&key);

        let now = self.clock.now();
        for session in self.sessions.values().filter(|s| s.date() == key.as_str()) {
            let delta = session.elapsed(now);
            if delta > 0 {
                summary.add_live(session.task(), delta);
            }
        }
        for ((day, name), secs) in &self.pending {
            if *day == date && *secs > 0 {
                summary.add_live(name, *secs);
            }
        }
        Ok(summary)
    }

    pub fn day_total(&self, date: NaiveDate) -> Result<u64> {
        Ok(self.day_summary(date)?.total_seconds())
    }

    pub fn all_summary(&self) -> Result<Summary> {
        let store = self.snapshot()?;
        Ok(Metrics::new(&store).summarize_all())
    }

    pub fn chart_series(&self) -> Result<ChartSeries> {
        let store = self.snapshot()?;
        Ok(ChartData::new(&store).series())
    }

    /// Write the CSV summary to the configured export file
    pub fn export_csv(&self) -> Result<PathBuf> {
        let path = self.config.export_path();
        let result = self.try_export_file(&path, ExportFormat::Csv);
        self.surface("Exporting CSV", result)?;
        info!("Exported summary to {:?}", path);
        Ok(path)
    }

    /// Write the summary in `format` to any writer
    pub fn export_to<W: Write>(&self, writer: W, format: ExportFormat) -> Result<()> {
        let result = self
            .store
            .load()
            .map_err(TrackerError::from)
            .and_then(|store| {
                let summary = Metrics::new(&store).summarize_all();
                Exporter::new(&summary)
                    .export(writer, format)
                    .map_err(TrackerError::from)
            });
        self.surface("Exporting summary", result)
    }

    fn try_export_file(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let store = self.store.load()?;
        let summary = Metrics::new(&store).summarize_all();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ExportError::from)?;
        }
        let file = File::create(path).map_err(ExportError::from)?;
        Exporter::new(&summary).export(file, format)?;
        Ok(())
    }

    /// Save after a routine change, honouring the save policy
    fn autosave(&mut self, store: &mut Store, context: &str) -> Result<()> {
        match self.save_with_pending(store) {
            Ok(_) => Ok(()),
            Err(e) => self.absorb(context, e.into()),
        }
    }

    fn add_pending(&mut self, key: &SessionKey, seconds: u64) {
        let held = self.pending.entry(key.clone()).or_default();
        *held = held.saturating_add(seconds);
    }

    fn remove_pending(&mut self, key: &SessionKey, seconds: u64) {
        if let Some(held) = self.pending.get_mut(key) {
            *held = held.saturating_sub(seconds);
            if *held == 0 {
                self.pending.remove(key);
            }
        }
    }

    fn commit_pending(&mut self) -> std::result::Result<Unplaced, StoreError> {
        let mut store = self.store.load()?;
        self.save_with_pending(&mut store)
    }

    /// Fold held session time into `store` and save it. Held time is only
    /// released once the write succeeds; time whose date or task holds a
    /// malformed value stays held and is returned.
    fn save_with_pending(
        &mut self,
        store: &mut Store,
    ) -> std::result::Result<Unplaced, StoreError> {
        let mut placed = Vec::new();
        let mut unplaced = Vec::new();
        for ((date, name), secs) in &self.pending {
            let day = date_key(*date);
            if commit_seconds(store, &day, name, *secs) {
                placed.push((*date, name.clone()));
                continue;
            }
            let err = if store.is_foreign(&day) {
                TrackerError::MalformedDay { date: day }
            } else {
                TrackerError::MalformedTask {
                    date: day,
                    task: name.clone(),
                }
            };
            warn!("Holding {}s: {}", secs, err);
            unplaced.push(((*date, name.clone()), err));
        }

        self.store.save(store)?;
        for key in placed {
            if let Some(secs) = self.pending.remove(&key) {
                info!("Wrote {}s held for {:?} on {}", secs, key.1, key.0);
            }
        }
        Ok(unplaced)
    }

    fn absorb(&self, context: &str, err: TrackerError) -> Result<()> {
        self.error_log.record(context, &err);
        match self.config.save_policy {
            SavePolicy::Lenient => {
                warn!("{} failed, continuing: {}", context, err);
                Ok(())
            }
            SavePolicy::Strict => Err(err),
        }
    }

    /// Log a user-facing failure and hand it back unchanged
    fn surface<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.error_log.record(context, e);
        }
        result
    }

    fn not_found(&self, date: &str, name: &str) -> TrackerError {
        TrackerError::TaskNotFound {
            date: date.to_string(),
            task: name.to_string(),
        }
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == NOTE_KEY {
        return Err(TrackerError::InvalidTaskName(name.to_string()));
    }
    Ok(trimmed)
}
