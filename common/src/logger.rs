use log::{error, info, warn};
use weatherlog_model::{ConnectivityProbe, Sample, TcpProbe};

use crate::csvlog::{format_time, LogFile};
use crate::notifier::{Notifier, NotifierPointer};
use crate::sensor::SensorReader;
use crate::{Clock, Config, LoggerError, Shutdown, SystemClock};

pub const STARTUP_MESSAGE: &str =
    "Internet connection established on Raspberry Pi. Starting data logging.";

/// Where the logger currently is in its life cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    AwaitingConnectivity,
    Announced,
    Logging,
    Stopped,
}

/// How a run ended, when it ended without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A stop was requested, e.g. by Ctrl-C.
    Interrupted { rows: u64 },
    /// The configured number of samples was written.
    Completed { rows: u64 },
}

/// Waits for the network, announces itself, then appends one sample per interval to
/// the CSV log until it is stopped or something goes wrong.
///
/// Sensor and log file errors end the run. Notification failures never do.
pub struct DataLogger {
    config: Config,
    sensor: Box<dyn SensorReader + Send>,
    notifier: NotifierPointer,
    probe: Box<dyn ConnectivityProbe + Send>,
    clock: Box<dyn Clock + Send>,
    shutdown: Shutdown,

    state: State,
    first_write: bool,
    rows: u64,
}

impl DataLogger {
    pub fn new(
        config: Config,
        sensor: impl SensorReader + Send + 'static,
        notifier: impl Notifier + Send + 'static,
    ) -> Self {
        let probe = TcpProbe::new(config.probe_address, config.probe_timeout);

        Self {
            config,
            sensor: Box::new(sensor),
            notifier: Box::new(notifier),
            probe: Box::new(probe),
            clock: Box::new(SystemClock),
            shutdown: Shutdown::new(),
            state: State::AwaitingConnectivity,
            first_write: false,
            rows: 0,
        }
    }

    pub fn with_probe(mut self, probe: impl ConnectivityProbe + Send + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Rows appended during this run.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Runs until stopped. The terminal message goes to the log either way.
    pub fn run(&mut self) -> Result<Outcome, LoggerError> {
        let result = self.drive();
        self.state = State::Stopped;

        match &result {
            Ok(Outcome::Interrupted { rows }) => info!("Program stopped after {rows} rows"),
            Ok(Outcome::Completed { rows }) => info!("Finished after {rows} rows"),
            Err(e) => error!("An unexpected error occurred: {e}"),
        }
        result
    }

    fn drive(&mut self) -> Result<Outcome, LoggerError> {
        if !self.await_connectivity()? {
            return Ok(Outcome::Interrupted { rows: self.rows });
        }

        self.announce();

        let mut log = LogFile::open(&self.config.log_path)?;
        info!("Logging to {}", log.path().display());
        self.state = State::Logging;

        loop {
            if self.shutdown.is_requested() {
                return Ok(Outcome::Interrupted { rows: self.rows });
            }

            self.log_sample(&mut log)?;

            if self.config.max_samples.is_some_and(|max| self.rows >= max) {
                return Ok(Outcome::Completed { rows: self.rows });
            }

            if self.shutdown.wait_timeout(self.config.sample_interval) {
                return Ok(Outcome::Interrupted { rows: self.rows });
            }
        }
    }

    /// Probes until connected. Returns `false` if a stop was requested meanwhile.
    fn await_connectivity(&mut self) -> Result<bool, LoggerError> {
        self.state = State::AwaitingConnectivity;
        let mut attempts = 0;

        loop {
            if self.shutdown.is_requested() {
                return Ok(false);
            }

            attempts += 1;
            if self.probe.is_connected() {
                info!("Internet connection available after {attempts} attempt(s)");
                self.state = State::Announced;
                return Ok(true);
            }

            if !self.config.retry.allows_retry(attempts) {
                return Err(LoggerError::Connectivity { attempts });
            }

            info!("Waiting for internet connection...");
            if self.shutdown.wait_timeout(self.config.retry.delay()) {
                return Ok(false);
            }
        }
    }

    fn announce(&self) {
        // Results are already reported by the notifier.
        let _ = self.notifier.send_message(STARTUP_MESSAGE);

        let path = &self.config.log_path;
        if !path.exists() {
            warn!("{} does not exist yet, not sending it", path.display());
            return;
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        let text = format!("Here is the {name} file after establishing internet connection.");
        let _ = self.notifier.send_file(path, &text);
    }

    fn log_sample(&mut self, log: &mut LogFile) -> Result<(), LoggerError> {
        let reading = self.sensor.read()?;
        let sample = Sample::new(reading, self.clock.now());
        let time = format_time(sample.time);

        info!(
            "Temperature: {:.2} °C, {:.2} °F",
            reading.temperature_celsius,
            reading.temperature_fahrenheit()
        );
        info!("Pressure: {:.2} hPa", reading.pressure_hpa);
        info!("Humidity: {:.2} %", reading.humidity_percent);
        info!("Date: {}", sample.date);
        info!("Time: {time}");

        log.append(&sample)?;
        self.rows += 1;

        if !self.first_write {
            self.first_write = true;
            let _ = self.notifier.send_message(&format!(
                "First data entry written to CSV on {} at {time}.",
                sample.date
            ));
        }

        Ok(())
    }
}
