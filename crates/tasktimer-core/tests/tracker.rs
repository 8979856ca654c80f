use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fs;
use tasktimer_core::{Config, ManualClock, SavePolicy, Tracker, TrackerError};
use tempfile::TempDir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn t0() -> NaiveDateTime {
    day(1).and_hms_opt(9, 0, 0).unwrap()
}

fn tracker(dir: &TempDir) -> (Tracker<ManualClock>, ManualClock) {
    let clock = ManualClock::new(t0());
    let tracker = Tracker::with_clock(Config::in_dir(dir.path()), clock.clone());
    (tracker, clock)
}

fn stored(dir: &TempDir) -> serde_json::Value {
    let text = fs::read_to_string(dir.path().join("tasks_data.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_start_stop_accumulates_across_sessions() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);

    assert!(tracker.add_task(day(1), "Write").unwrap());
    assert!(tracker.start(day(1), "Write").unwrap());
    clock.advance(Duration::seconds(90));
    assert_eq!(tracker.stop(day(1), "Write").unwrap(), Some(90));

    assert!(tracker.start(day(1), "Write").unwrap());
    clock.advance(Duration::seconds(45));
    assert_eq!(tracker.stop(day(1), "Write").unwrap(), Some(45));

    assert_eq!(stored(&dir)["2024-01-01"]["Write"]["seconds"], 135);
}

#[test]
fn test_display_advances_without_touching_disk() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);

    tracker.add_task(day(1), "Write").unwrap();
    tracker.start(day(1), "Write").unwrap();
    assert_eq!(tracker.display_seconds(day(1), "Write").unwrap(), 0);

    clock.advance(Duration::seconds(30));
    assert_eq!(tracker.display_seconds(day(1), "Write").unwrap(), 30);
    assert_eq!(stored(&dir)["2024-01-01"]["Write"]["seconds"], 0);
    assert!(tracker.is_running(day(1), "Write"));
    assert_eq!(tracker.running_count(day(1)), 1);
    assert_eq!(tracker.running_count(day(2)), 0);
}

#[test]
fn test_start_twice_and_stop_twice_are_noops() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);
    tracker.add_task(day(1), "Write").unwrap();

    assert_eq!(tracker.stop(day(1), "Write").unwrap(), None);
    assert!(tracker.start(day(1), "Write").unwrap());
    clock.advance(Duration::seconds(10));
    assert!(!tracker.start(day(1), "Write").unwrap());
    clock.advance(Duration::seconds(10));
    assert_eq!(tracker.stop(day(1), "Write").unwrap(), Some(20));
    assert_eq!(tracker.stop(day(1), "Write").unwrap(), None);
}

#[test]
fn test_start_unknown_task_fails() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, _) = tracker(&dir);
    let err = tracker.start(day(1), "Ghost").unwrap_err();
    assert!(matches!(err, TrackerError::TaskNotFound { .. }));
}

#[test]
fn test_add_task_validation_and_duplicates() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, _) = tracker(&dir);

    assert!(tracker.add_task(day(1), "  Write  ").unwrap());
    assert!(!tracker.add_task(day(1), "Write").unwrap());
    assert!(tracker.add_task(day(2), "Write").unwrap());
    assert!(matches!(
        tracker.add_task(day(1), " "),
        Err(TrackerError::InvalidTaskName(_))
    ));
    assert!(matches!(
        tracker.add_task(day(1), "_note"),
        Err(TrackerError::InvalidTaskName(_))
    ));

    let rows = tracker.tasks_for_date(day(1)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Write");
}

#[test]
fn test_delete_running_task_discards_time_and_empty_date() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);
    tracker.add_task(day(1), "Write").unwrap();
    tracker.start(day(1), "Write").unwrap();
    clock.advance(Duration::seconds(500));

    tracker.delete_task(day(1), "Write").unwrap();
    assert!(!tracker.is_running(day(1), "Write"));
    assert_eq!(stored(&dir), serde_json::json!({}));
}

#[test]
fn test_delete_one_of_several_keeps_date() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, _) = tracker(&dir);
    tracker.add_task(day(1), "Write").unwrap();
    tracker.add_task(day(1), "Read").unwrap();

    tracker.delete_task(day(1), "Write").unwrap();
    let data = stored(&dir);
    assert!(data["2024-01-01"].get("Write").is_none());
    assert_eq!(data["2024-01-01"]["Read"]["seconds"], 0);
}

#[test]
fn test_delete_missing_task_is_surfaced_and_logged() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, _) = tracker(&dir);
    let err = tracker.delete_task(day(1), "Ghost").unwrap_err();
    assert!(matches!(err, TrackerError::TaskNotFound { .. }));

    let log = fs::read_to_string(dir.path().join("error.log")).unwrap();
    assert!(log.contains("Deleting task"));
}

#[test]
fn test_description_and_note() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, _) = tracker(&dir);
    tracker.add_task(day(1), "Write").unwrap();

    tracker.edit_description(day(1), "Write", "chapter two").unwrap();
    tracker.set_note(day(1), "slow morning").unwrap();
    tracker.set_note(day(3), "only a note").unwrap();

    assert_eq!(tracker.note(day(1)).unwrap().as_deref(), Some("slow morning"));
    let rows = tracker.tasks_for_date(day(1)).unwrap();
    assert_eq!(rows[0].description, "chapter two");

    let data = stored(&dir);
    assert_eq!(data["2024-01-01"]["_note"], "slow morning");
    assert_eq!(data["2024-01-03"]["_note"], "only a note");

    // clearing the only content of a day removes the day
    tracker.set_note(day(3), "").unwrap();
    assert!(stored(&dir).get("2024-01-03").is_none());
    assert_eq!(tracker.note(day(3)).unwrap(), None);

    let err = tracker.edit_description(day(1), "Ghost", "x").unwrap_err();
    assert!(matches!(err, TrackerError::TaskNotFound { .. }));
}

#[test]
fn test_day_summary_includes_live_time() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);
    tracker.add_task(day(1), "Write").unwrap();
    tracker.add_task(day(1), "Read").unwrap();

    tracker.start(day(1), "Write").unwrap();
    clock.advance(Duration::seconds(60));
    tracker.stop(day(1), "Write").unwrap();

    tracker.start(day(1), "Read").unwrap();
    clock.advance(Duration::seconds(15));

    let summary = tracker.day_summary(day(1)).unwrap();
    assert_eq!(summary.seconds("Write"), Some(60));
    assert_eq!(summary.seconds("Read"), Some(15));
    assert_eq!(tracker.day_total(day(1)).unwrap(), 75);

    // the report path only sees confirmed time
    let all = tracker.all_summary().unwrap();
    assert_eq!(all.get("Read").unwrap().total_seconds, 0);
}

#[test]
fn test_reports_across_dates_and_export() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("tasks_data.json"),
        r#"{
  "2024-01-01": {"Write": {"seconds": 3600, "description": ""}},
  "2024-01-02": {"Write": {"seconds": 1800, "description": ""}, "Read": {"seconds": 0, "description": ""}}
}"#,
    )
    .unwrap();
    let (tracker, _) = tracker(&dir);

    let summary = tracker.all_summary().unwrap();
    assert_eq!(summary.get("Write").unwrap().total_seconds, 5400);

    let series = tracker.chart_series().unwrap();
    let hours: Vec<f64> = series.hours.iter().map(|p| p.hours).collect();
    assert_eq!(hours, vec![1.0, 0.5]);
    assert_eq!(series.distributions.len(), 2);

    let path = tracker.export_csv().unwrap();
    assert_eq!(path, dir.path().join("tasks_aggregated.csv"));
    let csv = fs::read_to_string(path).unwrap();
    assert_eq!(
        csv,
        "task_name,total_seconds,days_count,per_day_breakdown\n\
         \"Read\",0,0,\"\"\n\
         \"Write\",5400,2,\"2024-01-01:3600;2024-01-02:1800\"\n"
    );
}

#[test]
fn test_corrupt_file_recovers_and_rebuilds() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tasks_data.json"), "not json at all").unwrap();
    let (mut tracker, _) = tracker(&dir);

    assert!(tracker.tasks_for_date(day(1)).unwrap().is_empty());
    tracker.add_task(day(1), "Write").unwrap();
    assert_eq!(stored(&dir)["2024-01-01"]["Write"]["seconds"], 0);

    let backups = fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("tasks_data.json.backup.")
        })
        .count();
    assert_eq!(backups, 1);
}

/// Swap the data file for a directory so the next load fails with an IO
/// error. Returns the file's previous contents.
fn break_store(dir: &TempDir) -> String {
    let path = dir.path().join("tasks_data.json");
    let contents = fs::read_to_string(&path).unwrap();
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();
    contents
}

fn restore_store(dir: &TempDir, contents: &str) {
    let path = dir.path().join("tasks_data.json");
    fs::remove_dir(&path).unwrap();
    fs::write(&path, contents).unwrap();
}

#[test]
fn test_lenient_stop_survives_unreadable_store() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);
    tracker.add_task(day(1), "Write").unwrap();
    tracker.add_task(day(1), "Read").unwrap();
    tracker.start(day(1), "Write").unwrap();
    clock.advance(Duration::seconds(20));
    let contents = break_store(&dir);

    assert_eq!(tracker.stop(day(1), "Write").unwrap(), Some(20));
    assert!(!tracker.is_running(day(1), "Write"));
    assert_eq!(tracker.pending_seconds(), 20);
    assert!(dir.path().join("error.log").exists());

    // user-facing reads report the failure
    assert!(matches!(
        tracker.all_summary(),
        Err(TrackerError::Store(_))
    ));

    // the held time is shown and lands with the next successful save
    restore_store(&dir, &contents);
    assert_eq!(tracker.display_seconds(day(1), "Write").unwrap(), 20);
    tracker.edit_description(day(1), "Read", "notes").unwrap();
    assert_eq!(tracker.pending_seconds(), 0);

    let data = stored(&dir);
    assert_eq!(data["2024-01-01"]["Write"]["seconds"], 20);
    assert_eq!(data["2024-01-01"]["Read"]["description"], "notes");
    assert_eq!(tracker.display_seconds(day(1), "Write").unwrap(), 20);
}

#[test]
fn test_held_time_accumulates_and_flushes() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);
    tracker.add_task(day(1), "Write").unwrap();

    tracker.start(day(1), "Write").unwrap();
    clock.advance(Duration::seconds(10));
    let contents = break_store(&dir);
    tracker.stop(day(1), "Write").unwrap();
    assert!(tracker.flush().is_err());

    restore_store(&dir, &contents);
    tracker.start(day(1), "Write").unwrap();
    clock.advance(Duration::seconds(15));
    let contents = break_store(&dir);
    tracker.stop(day(1), "Write").unwrap();
    assert_eq!(tracker.pending_seconds(), 25);

    restore_store(&dir, &contents);
    tracker.flush().unwrap();
    assert_eq!(tracker.pending_seconds(), 0);
    assert_eq!(stored(&dir)["2024-01-01"]["Write"]["seconds"], 25);
}

#[test]
fn test_strict_stop_keeps_session_on_failure() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(t0());
    let config = Config::in_dir(dir.path()).with_save_policy(SavePolicy::Strict);
    let mut tracker = Tracker::with_clock(config, clock.clone());
    tracker.add_task(day(1), "Write").unwrap();
    tracker.start(day(1), "Write").unwrap();
    clock.advance(Duration::seconds(20));
    break_store(&dir);

    assert!(matches!(
        tracker.stop(day(1), "Write"),
        Err(TrackerError::Store(_))
    ));
    assert!(tracker.is_running(day(1), "Write"));

    // once the file is usable again the same session commits everything
    assert_eq!(tracker.pending_seconds(), 0);
    fs::remove_dir(dir.path().join("tasks_data.json")).unwrap();
    tracker.add_task(day(1), "Write").unwrap();
    clock.advance(Duration::seconds(5));
    assert_eq!(tracker.stop(day(1), "Write").unwrap(), Some(25));
    assert_eq!(stored(&dir)["2024-01-01"]["Write"]["seconds"], 25);
}

#[test]
fn test_stop_all() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);
    tracker.add_task(day(1), "Write").unwrap();
    tracker.add_task(day(2), "Read").unwrap();
    tracker.start(day(1), "Write").unwrap();
    tracker.start(day(2), "Read").unwrap();
    clock.advance(Duration::seconds(12));

    let mut stopped = tracker.stop_all().unwrap();
    stopped.sort();
    assert_eq!(
        stopped,
        vec![
            (day(1), "Write".to_string(), 12),
            (day(2), "Read".to_string(), 12),
        ]
    );
    let data = stored(&dir);
    assert_eq!(data["2024-01-01"]["Write"]["seconds"], 12);
    assert_eq!(data["2024-01-02"]["Read"]["seconds"], 12);
}

#[test]
fn test_repeated_task_key_keeps_the_day() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("tasks_data.json"),
        r#"{"2024-01-01": {"Read": {"seconds": 900, "description": "keep me"}, "Write": {"seconds": 60}, "Write": {"seconds": 30}}}"#,
    )
    .unwrap();
    let (mut tracker, _) = tracker(&dir);

    let summary = tracker.all_summary().unwrap();
    assert_eq!(summary.get("Read").unwrap().total_seconds, 900);
    assert_eq!(summary.get("Write").unwrap().total_seconds, 30);

    assert!(tracker.add_task(day(1), "Code").unwrap());
    let data = stored(&dir);
    assert_eq!(data["2024-01-01"]["Read"]["seconds"], 900);
    assert_eq!(data["2024-01-01"]["Read"]["description"], "keep me");
    assert_eq!(data["2024-01-01"]["Write"]["seconds"], 30);
    assert_eq!(data["2024-01-01"]["Code"]["seconds"], 0);
}

#[test]
fn test_malformed_values_are_never_overwritten() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("tasks_data.json"),
        r#"{"2024-01-01": "hand edited", "2024-01-02": {"Write": {"seconds": 5}, "Odd": 42}}"#,
    )
    .unwrap();
    let (mut tracker, _) = tracker(&dir);

    assert!(matches!(
        tracker.add_task(day(1), "Code"),
        Err(TrackerError::MalformedDay { .. })
    ));
    assert!(matches!(
        tracker.set_note(day(1), "hello"),
        Err(TrackerError::MalformedDay { .. })
    ));
    assert!(matches!(
        tracker.add_task(day(2), "Odd"),
        Err(TrackerError::MalformedTask { .. })
    ));

    // an unrelated change writes the malformed values back untouched
    tracker.add_task(day(2), "Code").unwrap();
    let data = stored(&dir);
    assert_eq!(data["2024-01-01"], "hand edited");
    assert_eq!(data["2024-01-02"]["Odd"], 42);
    assert_eq!(data["2024-01-02"]["Write"]["seconds"], 5);

    let log = fs::read_to_string(dir.path().join("error.log")).unwrap();
    assert!(log.contains("Adding task"));
    assert!(log.contains("Saving note"));
}

#[test]
fn test_names_are_trimmed_everywhere() {
    let dir = TempDir::new().unwrap();
    let (mut tracker, clock) = tracker(&dir);
    tracker.add_task(day(1), " Write").unwrap();

    assert!(tracker.start(day(1), "Write ").unwrap());
    assert!(tracker.is_running(day(1), " Write"));
    clock.advance(Duration::seconds(8));
    assert_eq!(tracker.display_seconds(day(1), "  Write").unwrap(), 8);
    assert_eq!(tracker.stop(day(1), " Write ").unwrap(), Some(8));

    tracker.edit_description(day(1), "Write  ", "draft").unwrap();
    assert_eq!(stored(&dir)["2024-01-01"]["Write"]["description"], "draft");

    tracker.delete_task(day(1), " Write").unwrap();
    assert_eq!(stored(&dir), serde_json::json!({}));
}
