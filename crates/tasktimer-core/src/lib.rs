//! TaskTimer Core Library
//!
//! Provides the JSON day store, per-task timing sessions, report aggregation,
//! chart data shaping, and CSV export for the TaskTimer day tracker.

pub mod chart;
pub mod clock;
pub mod config;
pub mod error_log;
pub mod export;
pub mod metrics;
pub mod session;
pub mod store;
pub mod tracker;

pub use chart::{ChartData, ChartSeries};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, SavePolicy};
pub use error_log::ErrorLog;
pub use export::{ExportFormat, Exporter};
pub use metrics::{DaySummary, Metrics, Summary, TaskSummary};
pub use session::TimeSession;
pub use store::JsonStore;
pub use tracker::{TaskRow, Tracker, TrackerError};

use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Reserved day key holding the notepad text for that date
pub const NOTE_KEY: &str = "_note";

/// Format a calendar date as a store key (`YYYY-MM-DD`)
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Cumulative confirmed duration and description for one task on one date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub seconds: u64,
    #[serde(default)]
    pub description: String,
}

impl TaskEntry {
    pub fn new(seconds: u64, description: impl Into<String>) -> Self {
        Self {
            seconds,
            description: description.into(),
        }
    }

    /// Build an entry from loosely-typed JSON.
    ///
    /// Hand-edited files sometimes carry `null`, floats, or numeric strings for
    /// `seconds`; those are coerced rather than rejecting the whole file.
    /// Returns `None` when the value is not an object at all.
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let seconds = match obj.get("seconds") {
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };
        let description = obj
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or_default()
            .to_string();
        Some(Self {
            seconds,
            description,
        })
    }
}

/// All task entries for one date, plus the optional notepad text.
///
/// Task order is the order tasks were added (or appeared in the file), which
/// is what the per-day views display. Task values that are not objects are
/// carried along untouched in `malformed` and written back on save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayRecord {
    tasks: Vec<(String, TaskEntry)>,
    malformed: Vec<(String, serde_json::Value)>,
    note: Option<String>,
}

impl DayRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the record holds no tasks, no malformed values and no note
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.malformed.is_empty() && self.note.is_none()
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&str, &TaskEntry)> {
        self.tasks.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn task(&self, name: &str) -> Option<&TaskEntry> {
        self.tasks
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entry)| entry)
    }

    pub fn task_mut(&mut self, name: &str) -> Option<&mut TaskEntry> {
        self.tasks
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, entry)| entry)
    }

    /// True when the name's stored value is not a task object
    pub fn is_malformed(&self, name: &str) -> bool {
        self.malformed.iter().any(|(n, _)| n == name)
    }

    /// Insert a task unless the name is already taken, by a task or by a
    /// malformed value. Returns whether the entry was inserted.
    pub fn insert_task(&mut self, name: impl Into<String>, entry: TaskEntry) -> bool {
        let name = name.into();
        if self.task(&name).is_some() || self.is_malformed(&name) {
            return false;
        }
        self.tasks.push((name, entry));
        true
    }

    /// Get the named entry, creating a zeroed one if missing.
    /// `None` if the name holds a malformed value.
    pub fn entry_mut(&mut self, name: &str) -> Option<&mut TaskEntry> {
        if self.is_malformed(name) {
            return None;
        }
        let idx = match self.tasks.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.tasks.push((name.to_string(), TaskEntry::default()));
                self.tasks.len() - 1
            }
        };
        Some(&mut self.tasks[idx].1)
    }

    pub fn remove_task(&mut self, name: &str) -> Option<TaskEntry> {
        let idx = self.tasks.iter().position(|(n, _)| n == name)?;
        Some(self.tasks.remove(idx).1)
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }

    /// Sum of confirmed seconds over every task of the day
    pub fn total_seconds(&self) -> u64 {
        self.tasks.iter().map(|(_, e)| e.seconds).sum()
    }
}

impl Serialize for DayRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.tasks.len() + self.malformed.len() + usize::from(self.note.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, entry) in &self.tasks {
            map.serialize_entry(name, entry)?;
        }
        for (name, value) in &self.malformed {
            map.serialize_entry(name, value)?;
        }
        if let Some(note) = &self.note {
            map.serialize_entry(NOTE_KEY, note)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DayRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DayVisitor;

        impl<'de> Visitor<'de> for DayVisitor {
            type Value = DayRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of task names to task entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<DayRecord, A::Error> {
                let mut record = DayRecord::new();
                while let Some((key, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    if key == NOTE_KEY {
                        match value {
                            serde_json::Value::String(note) => record.note = Some(note),
                            serde_json::Value::Null => {}
                            other => record.note = Some(other.to_string()),
                        }
                        continue;
                    }
                    // a repeated key keeps its first position and its last value
                    match TaskEntry::from_value(&value) {
                        Some(entry) => {
                            if let Some(existing) = record.task_mut(&key) {
                                warn!(task = %key, "Duplicate task key, keeping the last value");
                                *existing = entry;
                                continue;
                            }
                            record.malformed.retain(|(n, _)| *n != key);
                            record.tasks.push((key, entry));
                        }
                        None => {
                            warn!(task = %key, "Task value is not an object, keeping it as is");
                            if record.remove_task(&key).is_some() {
                                warn!(task = %key, "Duplicate task key, keeping the last value");
                            }
                            match record.malformed.iter_mut().find(|(n, _)| *n == key) {
                                Some((_, existing)) => *existing = value,
                                None => record.malformed.push((key, value)),
                            }
                        }
                    }
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(DayVisitor)
    }
}

/// Value stored under a date key.
///
/// Anything that is not a map of tasks is kept verbatim so a save does not
/// destroy it, but it takes no part in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Day {
    Record(DayRecord),
    Foreign(serde_json::Value),
}

/// The full persisted mapping of date keys to day records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    days: BTreeMap<String, Day>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn contains_date(&self, date: &str) -> bool {
        self.days.contains_key(date)
    }

    /// Every date key with its raw value, ascending by date
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Day)> {
        self.days.iter().map(|(date, day)| (date.as_str(), day))
    }

    /// Every well-formed day record, ascending by date
    pub fn records(&self) -> impl Iterator<Item = (&str, &DayRecord)> {
        self.iter().filter_map(|(date, day)| match day {
            Day::Record(record) => Some((date, record)),
            Day::Foreign(_) => None,
        })
    }

    pub fn day(&self, date: &str) -> Option<&DayRecord> {
        match self.days.get(date)? {
            Day::Record(record) => Some(record),
            Day::Foreign(_) => None,
        }
    }

    pub fn day_mut(&mut self, date: &str) -> Option<&mut DayRecord> {
        match self.days.get_mut(date)? {
            Day::Record(record) => Some(record),
            Day::Foreign(_) => None,
        }
    }

    /// True when the date key holds something other than a day record
    pub fn is_foreign(&self, date: &str) -> bool {
        matches!(self.days.get(date), Some(Day::Foreign(_)))
    }

    /// Get the record for a date, creating it if missing.
    /// `None` if the key holds a foreign value, which is never overwritten.
    pub fn day_entry(&mut self, date: &str) -> Option<&mut DayRecord> {
        let day = self
            .days
            .entry(date.to_string())
            .or_insert_with(|| Day::Record(DayRecord::new()));
        match day {
            Day::Record(record) => Some(record),
            Day::Foreign(_) => None,
        }
    }

    pub fn insert_day(&mut self, date: impl Into<String>, record: DayRecord) {
        self.days.insert(date.into(), Day::Record(record));
    }

    /// Drop the date key if its record has neither tasks nor a note.
    /// Returns whether the key was removed.
    pub fn remove_day_if_empty(&mut self, date: &str) -> bool {
        if self.day(date).is_some_and(DayRecord::is_empty) {
            self.days.remove(date);
            return true;
        }
        false
    }
}

/// Get the data directory for TaskTimer
pub fn data_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("com", "tasktimer", "tasktimer")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            directories::BaseDirs::new()
                .map(|d| d.home_dir().join(".tasktimer"))
                .unwrap_or_else(|| std::path::PathBuf::from(".tasktimer"))
        })
}
