use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use weatherlog_common::notifier::{Delivery, DummyNotifier};
use weatherlog_common::retry::RetryPolicy;
use weatherlog_common::sensor::{DummySensor, SensorError};
use weatherlog_common::{Clock, Config, DataLogger, LoggerError, Outcome, Shutdown, State};
use weatherlog_model::{ConnectivityProbe, Reading};

struct FixedClock(NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Fails the first `failures` probes, then reports a connection.
#[derive(Clone, Default)]
struct FlakyProbe {
    failures: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyProbe {
    fn online() -> Self {
        Self::default()
    }

    fn offline_for(failures: u32) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConnectivityProbe for FlakyProbe {
    fn is_connected(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) >= self.failures
    }
}

const READING: Reading = Reading {
    temperature_celsius: 22.5,
    pressure_hpa: 1013.25,
    humidity_percent: 45.0,
};

fn new_year() -> FixedClock {
    FixedClock(
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
    )
}

fn test_config(log_path: &Path, max_samples: Option<u64>) -> Config {
    Config {
        log_path: log_path.to_path_buf(),
        sample_interval: Duration::ZERO,
        retry: RetryPolicy::unbounded(Duration::ZERO),
        max_samples,
        ..Config::default()
    }
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn first_entry_messages(notifier: &DummyNotifier) -> usize {
    notifier
        .sent()
        .iter()
        .filter(|d| matches!(d, Delivery::Message(text) if text.starts_with("First data entry")))
        .count()
}

#[test]
fn test_first_run_creates_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");
    let notifier = DummyNotifier::new();

    let mut logger = DataLogger::new(
        test_config(&path, Some(1)),
        DummySensor::new(READING),
        notifier.clone(),
    )
    .with_probe(FlakyProbe::online())
    .with_clock(new_year());

    assert_eq!(logger.run().unwrap(), Outcome::Completed { rows: 1 });
    assert_eq!(logger.state(), State::Stopped);

    assert_eq!(
        lines(&path),
        [
            "Date,Time,Temperature (°C),Pressure (hPa),Humidity (%)",
            "2024-01-01,12:00:00,22.5,1013.25,45.0",
        ]
    );

    // The log did not exist yet, so there was nothing to attach.
    assert_eq!(
        notifier.sent(),
        [
            Delivery::Message(
                "Internet connection established on Raspberry Pi. Starting data logging.".into()
            ),
            Delivery::Message("First data entry written to CSV on 2024-01-01 at 12:00:00.".into()),
        ]
    );
}

#[test]
fn test_restart_appends_without_header_and_sends_existing_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");

    for _ in 0..2 {
        DataLogger::new(
            test_config(&path, Some(1)),
            DummySensor::new(READING),
            DummyNotifier::new(),
        )
        .with_probe(FlakyProbe::online())
        .with_clock(new_year())
        .run()
        .unwrap();
    }

    let notifier = DummyNotifier::new();
    DataLogger::new(
        test_config(&path, Some(1)),
        DummySensor::new(READING),
        notifier.clone(),
    )
    .with_probe(FlakyProbe::online())
    .with_clock(new_year())
    .run()
    .unwrap();

    let lines = lines(&path);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines.iter().filter(|l| l.starts_with("Date,")).count(), 1);

    assert!(notifier.sent().contains(&Delivery::File {
        path: path.clone(),
        text: "Here is the BME280_data.csv file after establishing internet connection.".into(),
    }));
}

#[test]
fn test_first_entry_notification_fires_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");
    let notifier = DummyNotifier::new();

    let mut logger = DataLogger::new(
        test_config(&path, Some(5)),
        DummySensor::new(READING),
        notifier.clone(),
    )
    .with_probe(FlakyProbe::online())
    .with_clock(new_year());

    assert_eq!(logger.run().unwrap(), Outcome::Completed { rows: 5 });
    assert_eq!(first_entry_messages(&notifier), 1);
    assert_eq!(lines(&path).len(), 6);
}

#[test]
fn test_failing_notifier_does_not_stop_logging() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");
    std::fs::write(&path, "").unwrap();
    let notifier = DummyNotifier::failing(500);

    let mut logger = DataLogger::new(
        test_config(&path, Some(3)),
        DummySensor::new(READING),
        notifier.clone(),
    )
    .with_probe(FlakyProbe::online())
    .with_clock(new_year());

    assert_eq!(logger.run().unwrap(), Outcome::Completed { rows: 3 });
    assert_eq!(lines(&path).len(), 4);
    // Startup message, log file, first entry; all of them rejected.
    assert_eq!(notifier.sent().len(), 3);
}

#[test]
fn test_sensor_fault_stops_run_and_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");

    let sensor = DummySensor::scripted([
        Ok(READING),
        Ok(READING),
        Err(SensorError::Driver("no ack from 0x77".into())),
    ]);
    let mut logger = DataLogger::new(test_config(&path, None), sensor, DummyNotifier::new())
        .with_probe(FlakyProbe::online())
        .with_clock(new_year());

    let result = logger.run();
    assert!(matches!(result, Err(LoggerError::Sensor(SensorError::Driver(_)))));
    assert_eq!(logger.state(), State::Stopped);
    assert_eq!(logger.rows(), 2);

    let lines = lines(&path);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "2024-01-01,12:00:00,22.5,1013.25,45.0");
}

#[test]
fn test_unwritable_log_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("BME280_data.csv");

    let mut logger = DataLogger::new(
        test_config(&path, Some(1)),
        DummySensor::new(READING),
        DummyNotifier::new(),
    )
    .with_probe(FlakyProbe::online());

    assert!(matches!(logger.run(), Err(LoggerError::LogFile(_))));
}

#[test]
fn test_waits_for_connectivity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");
    let probe = FlakyProbe::offline_for(4);
    let notifier = DummyNotifier::new();

    let mut logger = DataLogger::new(
        test_config(&path, Some(1)),
        DummySensor::new(READING),
        notifier.clone(),
    )
    .with_probe(probe.clone())
    .with_clock(new_year());

    assert_eq!(logger.run().unwrap(), Outcome::Completed { rows: 1 });
    assert_eq!(probe.calls(), 5);
    assert_eq!(
        notifier.sent().first(),
        Some(&Delivery::Message(
            "Internet connection established on Raspberry Pi. Starting data logging.".into()
        ))
    );
}

#[test]
fn test_bounded_retry_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");
    let probe = FlakyProbe::offline_for(u32::MAX);
    let notifier = DummyNotifier::new();

    let config = Config {
        retry: RetryPolicy::bounded(Duration::ZERO, 3),
        ..test_config(&path, None)
    };
    let mut logger = DataLogger::new(config, DummySensor::new(READING), notifier.clone())
        .with_probe(probe.clone());

    assert!(matches!(
        logger.run(),
        Err(LoggerError::Connectivity { attempts: 3 })
    ));
    assert_eq!(probe.calls(), 3);
    assert!(notifier.sent().is_empty());
    assert!(!path.exists());
}

#[test]
fn test_shutdown_before_connectivity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");
    let shutdown = Shutdown::new();
    shutdown.request();

    let probe = FlakyProbe::online();
    let mut logger = DataLogger::new(
        test_config(&path, None),
        DummySensor::new(READING),
        DummyNotifier::new(),
    )
    .with_probe(probe.clone())
    .with_shutdown(shutdown);

    assert_eq!(logger.run().unwrap(), Outcome::Interrupted { rows: 0 });
    assert_eq!(probe.calls(), 0);
}

#[test]
fn test_shutdown_interrupts_sample_pause() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");
    let shutdown = Shutdown::new();

    let config = Config {
        sample_interval: Duration::from_secs(3600),
        ..test_config(&path, None)
    };
    let mut logger = DataLogger::new(config, DummySensor::new(READING), DummyNotifier::new())
        .with_probe(FlakyProbe::online())
        .with_clock(new_year())
        .with_shutdown(shutdown.clone());

    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        shutdown.request();
    });

    assert_eq!(logger.run().unwrap(), Outcome::Interrupted { rows: 1 });
    assert_eq!(lines(&path).len(), 2);

    stopper.join().unwrap();
}
