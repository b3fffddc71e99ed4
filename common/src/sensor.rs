use std::collections::VecDeque;

use thiserror::Error;
use weatherlog_model::Reading;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("cannot open I2C device {device}: {reason}")]
    Bus { device: String, reason: String },

    #[error("unsupported BME280 address {0:#04x}, expected 0x76 or 0x77")]
    Address(u8),

    #[error("driver error: {0}")]
    Driver(String),
}

/// A source of environmental readings.
///
/// One call is one synchronous measurement. Faults are returned to the caller as is.
pub trait SensorReader {
    fn read(&mut self) -> Result<Reading, SensorError>;
}

impl<S: SensorReader + ?Sized> SensorReader for Box<S> {
    fn read(&mut self) -> Result<Reading, SensorError> {
        (**self).read()
    }
}

/// Sensor replacement that replays a script of readings and faults.
///
/// Once the script is exhausted the last reading is repeated forever.
#[derive(Default)]
pub struct DummySensor {
    script: VecDeque<Result<Reading, SensorError>>,
    last: Reading,
    reads: usize,
}

impl DummySensor {
    pub fn new(reading: Reading) -> Self {
        Self {
            script: VecDeque::new(),
            last: reading,
            reads: 0,
        }
    }

    pub fn scripted(script: impl IntoIterator<Item = Result<Reading, SensorError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Number of times `read` was called.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl SensorReader for DummySensor {
    fn read(&mut self) -> Result<Reading, SensorError> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(Ok(reading)) => {
                self.last = reading;
                Ok(reading)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last),
        }
    }
}

#[cfg(feature = "bme280")]
pub use hardware::Bme280Sensor;

#[cfg(feature = "bme280")]
mod hardware {
    use super::{Reading, SensorError, SensorReader};
    use bme280::i2c::BME280;
    use linux_embedded_hal::{Delay, I2cdev};

    pub const PRIMARY_ADDRESS: u8 = 0x76;
    pub const SECONDARY_ADDRESS: u8 = 0x77;

    /// A BME280 on a Linux I2C character device.
    ///
    /// Calibration data is loaded once in [`Bme280Sensor::open`] and kept by the driver.
    pub struct Bme280Sensor {
        driver: BME280<I2cdev>,
        delay: Delay,
    }

    impl Bme280Sensor {
        pub fn open(device: &str, address: u8) -> Result<Self, SensorError> {
            let bus = I2cdev::new(device).map_err(|e| SensorError::Bus {
                device: device.to_string(),
                reason: e.to_string(),
            })?;

            let mut driver = match address {
                PRIMARY_ADDRESS => BME280::new_primary(bus),
                SECONDARY_ADDRESS => BME280::new_secondary(bus),
                other => return Err(SensorError::Address(other)),
            };

            let mut delay = Delay;
            driver
                .init(&mut delay)
                .map_err(|e| SensorError::Driver(format!("{e:?}")))?;
            log::info!("BME280 at {address:#04x} on {device} initialised");

            Ok(Self { driver, delay })
        }
    }

    impl SensorReader for Bme280Sensor {
        fn read(&mut self) -> Result<Reading, SensorError> {
            let measurements = self
                .driver
                .measure(&mut self.delay)
                .map_err(|e| SensorError::Driver(format!("{e:?}")))?;

            Ok(Reading {
                temperature_celsius: measurements.temperature,
                // The driver reports pascals.
                pressure_hpa: measurements.pressure / 100.0,
                humidity_percent: measurements.humidity,
            })
        }
    }
}

#[test]
fn test_dummy_sensor_replays_script() {
    let first = Reading {
        temperature_celsius: 20.0,
        pressure_hpa: 1000.0,
        humidity_percent: 40.0,
    };
    let mut sensor = DummySensor::scripted([
        Ok(first),
        Err(SensorError::Driver("bus stuck".into())),
    ]);

    assert_eq!(sensor.read(), Ok(first));
    assert_eq!(sensor.read(), Err(SensorError::Driver("bus stuck".into())));
    assert_eq!(sensor.read(), Ok(first));
    assert_eq!(sensor.reads(), 3);
}
