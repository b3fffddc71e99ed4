use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A single physical reading as delivered by a sensor, before it is timestamped.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Reading {
    pub temperature_celsius: f32,
    pub pressure_hpa: f32,
    pub humidity_percent: f32,
}

impl Reading {
    pub fn temperature_fahrenheit(&self) -> f32 {
        celsius_to_fahrenheit(self.temperature_celsius)
    }
}

/// A reading stamped with the local date and time-of-day it was taken at.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub reading: Reading,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Sample {
    pub fn new(reading: Reading, when: NaiveDateTime) -> Self {
        Self {
            reading,
            date: when.date(),
            time: when.time(),
        }
    }
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

/// A trait to find out whether the outside world is reachable.
///
/// To be implemented for each platform. Implementations must not retry on their own.
pub trait ConnectivityProbe {
    fn is_connected(&self) -> bool;
}

/// Probes connectivity by opening (and immediately dropping) a TCP connection.
#[derive(Clone, Debug)]
pub struct TcpProbe {
    pub target: SocketAddr,
    pub timeout: Duration,
}

impl TcpProbe {
    /// Google's public DNS server, port 53.
    pub const DEFAULT_TARGET: ([u8; 4], u16) = ([8, 8, 8, 8], 53);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(target: SocketAddr, timeout: Duration) -> Self {
        Self { target, timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TARGET.into(), Self::DEFAULT_TIMEOUT)
    }
}

impl ConnectivityProbe for TcpProbe {
    fn is_connected(&self) -> bool {
        match TcpStream::connect_timeout(&self.target, self.timeout) {
            Ok(_) => {
                log::debug!("Connected to {}", self.target);
                true
            }
            Err(e) => {
                log::debug!("Cannot reach {}: {e}", self.target);
                false
            }
        }
    }
}

#[test]
fn test_fahrenheit_conversion() {
    assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
    assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
    assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);

    let reading = Reading {
        temperature_celsius: 22.5,
        ..Default::default()
    };
    assert_eq!(reading.temperature_fahrenheit(), 72.5);
}

#[test]
fn test_sample_splits_date_and_time() {
    let when = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap();
    let sample = Sample::new(Reading::default(), when);

    assert_eq!(sample.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(sample.time, NaiveTime::from_hms_opt(12, 30, 0).unwrap());
}

#[test]
fn test_tcp_probe_connects_to_listener() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let probe = TcpProbe::new(listener.local_addr().unwrap(), Duration::from_secs(1));

    assert!(probe.is_connected());
}

#[test]
fn test_tcp_probe_refused() {
    // Bind to get a free port, then close it again so nothing listens there.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let probe = TcpProbe::new(addr, Duration::from_millis(500));

    assert!(!probe.is_connected());
}

#[test]
fn test_default_probe_target() {
    let probe = TcpProbe::default();
    assert_eq!(probe.target, "8.8.8.8:53".parse::<SocketAddr>().unwrap());
    assert_eq!(probe.timeout, Duration::from_secs(5));
}
