//! Data series for line and pie charts. Rendering is left to the caller.

use crate::metrics::seconds_to_hours;
use crate::{DayRecord, Store};
use serde::Serialize;

/// One point of the hours-per-day line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoursPoint {
    pub date: String,
    pub seconds: u64,
    pub hours: f64,
}

/// One pie slice.
///
/// `weight` is what the slice should be drawn with; `seconds` is always the
/// recorded value, for legends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub task: String,
    pub seconds: u64,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendLine {
    pub task: String,
    pub seconds: u64,
    pub hours: f64,
    pub percent: f64,
}

/// Task distribution for one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayDistribution {
    pub date: String,
    pub slices: Vec<Slice>,
    /// Every task had zero seconds, so all weights were set to 1
    pub uniform: bool,
}

impl DayDistribution {
    fn from_record(date: &str, day: &DayRecord) -> Option<Self> {
        if !day.has_tasks() {
            return None;
        }

        let uniform = day.tasks().all(|(_, entry)| entry.seconds == 0);
        let slices = day
            .tasks()
            .map(|(name, entry)| Slice {
                task: name.to_string(),
                seconds: entry.seconds,
                weight: if uniform { 1 } else { entry.seconds },
            })
            .collect();

        Some(Self {
            date: date.to_string(),
            slices,
            uniform,
        })
    }

    pub fn total_seconds(&self) -> u64 {
        self.slices.iter().map(|s| s.seconds).sum()
    }

    /// Legend rows with the real share of the day's recorded time
    pub fn legend(&self) -> Vec<LegendLine> {
        let total = self.total_seconds();
        self.slices
            .iter()
            .map(|slice| LegendLine {
                task: slice.task.clone(),
                seconds: slice.seconds,
                hours: seconds_to_hours(slice.seconds),
                percent: if total > 0 {
                    slice.seconds as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect()
    }
}

/// Everything a chart screen needs in one value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub hours: Vec<HoursPoint>,
    pub distributions: Vec<DayDistribution>,
}

pub struct ChartData<'a> {
    store: &'a Store,
}

impl<'a> ChartData<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Hours recorded per date, ascending, including dates with no time
    pub fn daily_hours_series(&self) -> Vec<HoursPoint> {
        self.store
            .records()
            .map(|(date, day)| {
                let seconds = day.total_seconds();
                HoursPoint {
                    date: date.to_string(),
                    seconds,
                    hours: seconds_to_hours(seconds),
                }
            })
            .collect()
    }

    /// Task distribution for one date, or `None` if it has no tasks
    pub fn daily_distribution(&self, date: &str) -> Option<DayDistribution> {
        DayDistribution::from_record(date, self.store.day(date)?)
    }

    /// Distributions for every date that has at least one task, ascending
    pub fn distributions(&self) -> Vec<DayDistribution> {
        self.store
            .records()
            .filter_map(|(date, day)| DayDistribution::from_record(date, day))
            .collect()
    }

    pub fn series(&self) -> ChartSeries {
        ChartSeries {
            hours: self.daily_hours_series(),
            distributions: self.distributions(),
        }
    }
}
