use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::warn;

use weatherlog_common::notifier::{DiscordNotifier, DummyNotifier, NotifierPointer};
use weatherlog_common::sensor::Bme280Sensor;
use weatherlog_common::{Config, DataLogger, LoggerError, Outcome, Shutdown};

/// Logs BME280 readings to a CSV file and reports to a Discord webhook.
#[derive(Debug, Parser)]
#[command(name = "weatherlog", version)]
struct Args {
    /// Config file (JSON). Defaults to the per-user config file if it exists.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CSV file to append readings to
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Stop after this many readings
    #[arg(long)]
    samples: Option<u64>,

    /// Log notifications instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// More output (`-v` debug, `-vv` trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Our App struct that holds the data logger and the handle used to stop it.
struct App {
    logger: DataLogger,
    shutdown: Shutdown,
}

impl App {
    /// Create a new App struct.
    ///
    /// Loads the configuration, opens the sensor (which loads its calibration) and
    /// picks the notifier.
    fn new(args: Args) -> anyhow::Result<Self> {
        let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;

        // Command line flags win over the config file.
        if let Some(log_path) = args.log_path {
            config.log_path = log_path;
        }
        if let Some(samples) = args.samples {
            config.max_samples = Some(samples);
        }

        let notifier: NotifierPointer = match &config.webhook_url {
            Some(url) if !args.dry_run => {
                Box::new(DiscordNotifier::new(url.clone(), config.request_timeout))
            }
            Some(_) => Box::new(DummyNotifier::new()),
            None => {
                warn!("No webhook URL configured, notifications will only be logged");
                Box::new(DummyNotifier::new())
            }
        };

        let sensor = Bme280Sensor::open(&config.i2c_device, config.i2c_address)
            .context("initialising the BME280")?;

        let shutdown = Shutdown::new();
        let logger = DataLogger::new(config, sensor, notifier).with_shutdown(shutdown.clone());

        Ok(Self { logger, shutdown })
    }

    /// Run the logger until Ctrl-C, the sample limit, or a fatal error.
    fn run(&mut self) -> anyhow::Result<ExitCode> {
        let shutdown = self.shutdown.clone();
        ctrlc::set_handler(move || shutdown.request()).context("installing the Ctrl-C handler")?;

        Ok(ExitCode::from(exit_status(&self.logger.run())))
    }
}

/// The logger already reported a fatal error, so only the status is left to return.
fn exit_status(result: &Result<Outcome, LoggerError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut app = App::new(args)?;

    app.run()
}

#[test]
fn test_fatal_run_only_sets_exit_status() {
    use weatherlog_common::sensor::SensorError;

    assert_eq!(exit_status(&Ok(Outcome::Interrupted { rows: 3 })), 0);
    assert_eq!(exit_status(&Ok(Outcome::Completed { rows: 1 })), 0);
    assert_eq!(
        exit_status(&Err(LoggerError::Sensor(SensorError::Driver("gone".into())))),
        1
    );
    assert_eq!(
        exit_status(&Err(LoggerError::Connectivity { attempts: 3 })),
        1
    );
}

#[test]
fn test_verbose_flag() {
    use clap::CommandFactory;
    Args::command().debug_assert();

    assert_eq!(Args::try_parse_from(["weatherlog"]).unwrap().verbose, 0);
    assert_eq!(Args::try_parse_from(["weatherlog", "-vv"]).unwrap().verbose, 2);
    assert_eq!(
        Args::try_parse_from(["weatherlog", "--verbose", "--verbose"])
            .unwrap()
            .verbose,
        2
    );
}

#[test]
fn test_overrides() {
    let args = Args::try_parse_from([
        "weatherlog",
        "--log-path",
        "/tmp/readings.csv",
        "--samples",
        "4",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(args.log_path, Some(PathBuf::from("/tmp/readings.csv")));
    assert_eq!(args.samples, Some(4));
    assert!(args.dry_run);
}
