//! Capture workers from spawn to stop, followed by an offline join

mod common;

use common::{message, session_key, state};
use streamlog_rs::config::LoggerConfig;
use streamlog_rs::session::key::container_file_name;
use streamlog_rs::{
    EventCapture, RawMessage, SampleCapture, SampleChunk, SampleEncoding, SessionJoiner,
    StreamInfo, TrialLogger,
};

#[test]
fn test_stop_drains_everything_pushed() {
    let streams = tempfile::tempdir().unwrap();
    let events = tempfile::tempdir().unwrap();
    let config = LoggerConfig {
        stream_dir: streams.path().to_path_buf(),
        event_dir: events.path().to_path_buf(),
        flush_every_message: false,
        ..LoggerConfig::default()
    };

    let key = session_key(5, 14, "LIVE");
    let started = key.started_at().unwrap().and_utc();
    let path = streams.path().join(container_file_name(started, "EEG"));
    let info = StreamInfo::new("EEG", 4, 500.0, SampleEncoding::F32);
    let samples = SampleCapture::with_capacity(&path, info, 8).unwrap();
    let logger = TrialLogger::new(events.path(), &key, &config).unwrap();
    let control = EventCapture::with_capacity(logger, 4).unwrap();

    // 100 chunks of 10 records at 2 ms spacing, pushed from a producer thread
    std::thread::scope(|scope| {
        scope.spawn(|| {
            for chunk in 0..100 {
                let timestamps: Vec<f64> =
                    (0..10).map(|i| 1.0 + (chunk * 10 + i) as f64 * 0.002).collect();
                let rows = vec![vec![0.5; 4]; 10];
                samples.push(SampleChunk::new(timestamps, rows)).unwrap();
            }
        });
        scope.spawn(|| {
            control.push(RawMessage::new(state("rec"), 1.2)).unwrap();
            control.push(RawMessage::new(message("parameter", "5"), 1.3)).unwrap();
            control.push(RawMessage::new(state("idle"), 1.4)).unwrap();
            control.push(RawMessage::new(state("rec"), 2.5)).unwrap();
        });
    });

    let report = samples.stop().unwrap();
    assert_eq!(report.chunks, 100);
    assert_eq!(report.stats.records, 1000);
    assert_eq!(report.start_time, Some(1.0));

    let summary = control.stop().unwrap();
    assert_eq!(summary.stats.messages, 4);
    assert_eq!(summary.stats.trials_completed, 1);
    assert!(summary.unterminated_trial.is_some());

    let session = SessionJoiner::from_config(&config)
        .load("20250105_140000", &summary.session_id)
        .unwrap();
    assert_eq!(session.container.record_count(), 1000);
    let segments = session.segments();
    assert_eq!(segments.len(), 2);
    assert!(segments[0].timestamps.iter().all(|&t| (1.2..=1.4).contains(&t)));
    assert!(!segments[0].is_empty());
    // The open trial runs to the last sample
    assert_eq!(segments[1].timestamps.last(), session.timestamps().last());
}

#[test]
fn test_idle_captures_stop_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("emg.bin");
    let info = StreamInfo::new("EMG", 1, 1000.0, SampleEncoding::F64);
    let capture = SampleCapture::spawn(&path, info).unwrap();
    assert!(!capture.is_stopped());
    let report = capture.stop().unwrap();
    assert!(!report.created);
    assert!(!path.exists());

    let logger = TrialLogger::new(dir.path(), &session_key(6, 6, "X"), &LoggerConfig::default())
        .unwrap();
    let all_path = logger.all_path().to_path_buf();
    let summary = EventCapture::spawn(logger).unwrap().stop().unwrap();
    assert_eq!(summary.stats.messages, 0);
    assert!(summary.incomplete_trial_warning().is_none());
    assert!(!all_path.exists());
}
