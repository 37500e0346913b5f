//! Trial segmentation of the control stream

mod common;

use common::builders::SessionBuilder;
use common::{message, session_key, state};
use streamlog_rs::config::LoggerConfig;
use streamlog_rs::events::trial::{RECORDING_END, RECORDING_START};
use streamlog_rs::events::{read_rows, EventRow, TrialRow};
use streamlog_rs::session::read_trials;
use streamlog_rs::TrialLogger;

#[test]
fn test_consecutive_trials_never_merge() {
    let dir = tempfile::tempdir().unwrap();
    let key = session_key(1, 10, "TWO");
    let summary = SessionBuilder::new(key.clone())
        .message(message("filename", "\"a.dat\""), 0.5)
        .message(state("rec"), 1.0)
        .message(message("parameter", "{\"speed\":1}"), 1.5)
        .message(state("idle"), 2.0)
        .message(message("filename", "\"b.dat\""), 2.5)
        .message(state("rec"), 3.0)
        .message(message("parameter", "{\"speed\":2}"), 3.5)
        .message(state("idle"), 4.0)
        .write(dir.path());

    assert_eq!(summary.stats.trials_completed, 2);
    assert!(summary.unterminated_trial.is_none());

    let trials = read_trials(key.table_path(dir.path(), "trials")).unwrap();
    assert_eq!(trials.len(), 2);
    assert_eq!((trials[0].start_time(), trials[0].end_time()), (1.0, Some(2.0)));
    assert_eq!((trials[1].start_time(), trials[1].end_time()), (3.0, Some(4.0)));
    assert_eq!(trials[0].file(), Some("a.dat"));
    assert_eq!(trials[1].file(), Some("b.dat"));
    assert_eq!(trials[0].events.len(), 1);
    assert_eq!(trials[1].events.len(), 1);
    assert_eq!(trials[1].events[0].payload["value"]["speed"], 2);
}

#[test]
fn test_trial_rows_are_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let key = session_key(1, 11, "ROWS");
    SessionBuilder::new(key.clone())
        .buffered(2)
        .message(state("rec"), 1.0)
        .message(message("parameter", "1"), 1.1)
        .message(message("parameter", "2"), 1.2)
        .message(message("parameter", "3"), 1.3)
        .message(state("idle"), 2.0)
        .write(dir.path());

    let rows: Vec<TrialRow> = read_rows(key.table_path(dir.path(), "trials")).unwrap();
    let events: Vec<&str> = rows.iter().map(|r| r.event.as_str()).collect();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0], RECORDING_START);
    assert_eq!(events[4], RECORDING_END);
}

#[test]
fn test_flush_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let key = session_key(2, 9, "FLUSH");
    let config = LoggerConfig {
        flush_every_message: false,
        ..LoggerConfig::default()
    };
    let mut logger = TrialLogger::new(dir.path(), &key, &config).unwrap();
    logger.handle_raw(&state("idle"), 0.1).unwrap();
    logger.handle_raw(&message("custom", "7"), 0.2).unwrap();

    logger.flush().unwrap();
    logger.flush().unwrap();
    logger.flush().unwrap();
    assert_eq!(logger.pending_rows(), 0);

    let all: Vec<EventRow> = read_rows(logger.all_path()).unwrap();
    assert_eq!(all.len(), 2);
    let other: Vec<EventRow> = read_rows(logger.table_path("other").unwrap()).unwrap();
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].name, "custom");
    assert_eq!(other[0].value, "7");

    // Nothing new, still one header and two rows
    logger.finish().unwrap();
    let text = std::fs::read_to_string(key.table_path(dir.path(), "all")).unwrap();
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn test_unterminated_trial_at_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let key = session_key(3, 8, "OPEN");
    let summary = SessionBuilder::new(key.clone())
        .buffered(64)
        .message(state("rec"), 5.0)
        .message(message("parameter", "{\"x\":1}"), 5.5)
        .write(dir.path());

    assert_eq!(summary.stats.trials_completed, 0);
    let open = summary.unterminated_trial.as_ref().unwrap();
    assert_eq!(open.start_time(), 5.0);
    assert!(summary.incomplete_trial_warning().unwrap().contains("never closed"));

    let trials = read_trials(key.table_path(dir.path(), "trials")).unwrap();
    assert_eq!(trials.len(), 1);
    assert!(!trials[0].is_complete());
    assert_eq!(trials[0].events.len(), 1);
}

#[test]
fn test_malformed_messages_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let key = session_key(4, 8, "BAD");
    let summary = SessionBuilder::new(key.clone())
        .message("not json", 0.1)
        .message("[1, 2]", 0.2)
        .message(r#"{"value": 3}"#, 0.3)
        .message(state("rec"), 1.0)
        .message(state("idle"), 2.0)
        .write(dir.path());

    assert_eq!(summary.stats.malformed, 3);
    assert_eq!(summary.stats.messages, 2);
    assert_eq!(summary.stats.trials_completed, 1);
}

#[test]
fn test_parameters_attached_in_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let key = session_key(5, 8, "ORDER");
    let summary = SessionBuilder::new(key.clone())
        .message(state("rec"), 1.0)
        .message(message("parameter", "{\"a\":1}"), 1.2)
        .message(message("parameter", "{\"b\":2}"), 1.4)
        .message(state("idle"), 2.0)
        .message(state("rec"), 3.0)
        .message(message("parameter", "{\"a\":3}"), 3.2)
        .message(message("parameter", "{\"b\":4}"), 3.4)
        .message(state("idle"), 4.0)
        .write(dir.path());
    assert_eq!(summary.stats.trials_completed, 2);

    let trials = read_trials(key.table_path(dir.path(), "trials")).unwrap();
    assert_eq!(trials.len(), 2);
    for (trial, (a, b)) in trials.iter().zip([(1, 2), (3, 4)]) {
        assert!(trial.is_complete());
        assert_eq!(trial.events.len(), 2);
        assert_eq!(trial.events[0].payload["value"]["a"], a);
        assert_eq!(trial.events[1].payload["value"]["b"], b);
        assert!(trial.events[0].timestamp < trial.events[1].timestamp);
    }
}

#[test]
fn test_reopened_session_appends_under_one_header() {
    let dir = tempfile::tempdir().unwrap();
    let key = session_key(6, 8, "AGAIN");
    for start in [1.0, 3.0] {
        SessionBuilder::new(key.clone())
            .message(state("rec"), start)
            .message(message("parameter", "{\"n\":1}"), start + 0.5)
            .message(state("idle"), start + 1.0)
            .write(dir.path());
    }

    let trials = read_trials(key.table_path(dir.path(), "trials")).unwrap();
    assert_eq!(trials.len(), 2);
    assert_eq!((trials[0].start_time(), trials[0].end_time()), (1.0, Some(2.0)));
    assert_eq!((trials[1].start_time(), trials[1].end_time()), (3.0, Some(4.0)));

    let all: Vec<EventRow> = read_rows(key.table_path(dir.path(), "all")).unwrap();
    assert_eq!(all.len(), 6);
    let text = std::fs::read_to_string(key.table_path(dir.path(), "all")).unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("timestamp")).count(), 1);
}
