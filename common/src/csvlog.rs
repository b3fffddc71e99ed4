use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{NaiveTime, Timelike};
use weatherlog_model::Sample;

use crate::LoggerError;

pub const HEADER: [&str; 5] = [
    "Date",
    "Time",
    "Temperature (°C)",
    "Pressure (hPa)",
    "Humidity (%)",
];

/// Append-only CSV file holding one row per sample, CRLF terminated.
///
/// The header is written on open if, and only if, the file is empty. Every row is
/// flushed right away so a crash never loses more than the row being written.
pub struct LogFile {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl LogFile {
    pub fn open(path: &Path) -> Result<Self, LoggerError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);

        if empty {
            log::debug!("{} is empty, writing header", path.display());
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, sample: &Sample) -> Result<(), LoggerError> {
        let reading = &sample.reading;
        self.writer.write_record([
            sample.date.to_string(),
            format_time(sample.time),
            format_value(reading.temperature_celsius),
            format_value(reading.pressure_hpa),
            format_value(reading.humidity_percent),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// `HH:MM:SS`, followed by microseconds when there are any.
pub fn format_time(time: NaiveTime) -> String {
    if time.nanosecond() / 1_000 == 0 {
        time.format("%H:%M:%S").to_string()
    } else {
        time.format("%H:%M:%S%.6f").to_string()
    }
}

/// Shortest representation, but integral values keep one decimal (`45.0`).
pub fn format_value(value: f32) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use weatherlog_model::Reading;

    fn sample(hour: u32) -> Sample {
        Sample::new(
            Reading {
                temperature_celsius: 22.5,
                pressure_hpa: 1013.25,
                humidity_percent: 45.0,
            },
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_header_written_once_for_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BME280_data.csv");

        let mut log = LogFile::open(&path).unwrap();
        log.append(&sample(12)).unwrap();
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines,
            [
                "Date,Time,Temperature (°C),Pressure (hPa),Humidity (%)",
                "2024-01-01,12:00:00,22.5,1013.25,45.0",
            ]
        );
    }

    #[test]
    fn test_reopen_does_not_repeat_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BME280_data.csv");

        LogFile::open(&path).unwrap().append(&sample(12)).unwrap();
        LogFile::open(&path).unwrap().append(&sample(13)).unwrap();
        LogFile::open(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(content.matches("Date,Time").count(), 1);

        for row in content.lines().skip(1) {
            assert_eq!(row.split(',').count(), 5);
        }
    }

    #[test]
    fn test_existing_content_without_header_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BME280_data.csv");
        std::fs::write(&path, "2023-12-31,23:59:59,1.0,2.0,3.0\r\n").unwrap();

        LogFile::open(&path).unwrap().append(&sample(0)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "2023-12-31,23:59:59,1.0,2.0,3.0\r\n2024-01-01,00:00:00,22.5,1013.25,45.0\r\n"
        );
    }

    #[test]
    fn test_format_time() {
        let whole = NaiveTime::from_hms_opt(8, 5, 3).unwrap();
        let fraction = NaiveTime::from_hms_micro_opt(8, 5, 3, 120).unwrap();

        assert_eq!(format_time(whole), "08:05:03");
        assert_eq!(format_time(fraction), "08:05:03.000120");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(45.0), "45.0");
        assert_eq!(format_value(22.5), "22.5");
        assert_eq!(format_value(1013.25), "1013.25");
        assert_eq!(format_value(-3.0), "-3.0");
    }
}
