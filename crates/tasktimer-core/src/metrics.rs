//! Report aggregation and duration formatting

use crate::Store;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-task seconds for a single date, in the day's task order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub tasks: Vec<(String, u64)>,
}

impl DaySummary {
    pub fn seconds(&self, task: &str) -> Option<u64> {
        self.tasks
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, secs)| *secs)
    }

    pub fn total_seconds(&self) -> u64 {
        self.tasks.iter().map(|(_, secs)| secs).sum()
    }

    /// Add in-progress session time the store does not know about yet
    pub fn add_live(&mut self, task: &str, delta: u64) {
        match self.tasks.iter_mut().find(|(name, _)| name == task) {
            Some((_, secs)) => *secs = secs.saturating_add(delta),
            None => self.tasks.push((task.to_string(), delta)),
        }
    }
}

/// Cross-date rollup for one task name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub total_seconds: u64,
    /// Seconds per date, only for dates with recorded time
    pub per_day: BTreeMap<String, u64>,
}

impl TaskSummary {
    pub fn days_count(&self) -> usize {
        self.per_day.len()
    }

    pub fn hours(&self) -> f64 {
        seconds_to_hours(self.total_seconds)
    }
}

/// Rollup of every task across every date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Summary {
    tasks: BTreeMap<String, TaskSummary>,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn get(&self, task: &str) -> Option<&TaskSummary> {
        self.tasks.get(task)
    }

    /// Tasks in display order: case-insensitive by name, exact name as the
    /// tie-break so the order is total
    pub fn sorted(&self) -> Vec<(&str, &TaskSummary)> {
        let mut rows: Vec<(&str, &TaskSummary)> = self
            .tasks
            .iter()
            .map(|(name, summary)| (name.as_str(), summary))
            .collect();
        rows.sort_by(|(a, _), (b, _)| a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b)));
        rows
    }

    pub fn total_seconds(&self) -> u64 {
        self.tasks.values().map(|t| t.total_seconds).sum()
    }
}

/// High-level report API over a loaded store
pub struct Metrics<'a> {
    store: &'a Store,
}

impl<'a> Metrics<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Confirmed seconds per task for one date (note excluded)
    pub fn summarize_day(&self, date: &str) -> DaySummary {
        let tasks = self
            .store
            .day(date)
            .map(|day| {
                day.tasks()
                    .map(|(name, entry)| (name.to_string(), entry.seconds))
                    .collect()
            })
            .unwrap_or_default();

        DaySummary {
            date: date.to_string(),
            tasks,
        }
    }

    /// Roll every task entry of every date up by task name.
    ///
    /// Dates where the task has zero seconds count towards nothing and are
    /// left out of `per_day`.
    pub fn summarize_all(&self) -> Summary {
        let mut tasks: BTreeMap<String, TaskSummary> = BTreeMap::new();

        for (date, day) in self.store.records() {
            for (name, entry) in day.tasks() {
                let summary = tasks.entry(name.to_string()).or_default();
                summary.total_seconds = summary.total_seconds.saturating_add(entry.seconds);
                if entry.seconds > 0 {
                    summary.per_day.insert(date.to_string(), entry.seconds);
                }
            }
        }

        Summary { tasks }
    }

    /// Format seconds as `H:MM:SS`
    pub fn format_hms(seconds: u64) -> String {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }

    /// Format seconds as decimal hours with two places
    pub fn format_hours(seconds: u64) -> String {
        format!("{:.2}", seconds_to_hours(seconds))
    }
}

/// Derived display unit; never written back to the store
pub fn seconds_to_hours(seconds: u64) -> f64 {
    seconds as f64 / 3600.0
}
