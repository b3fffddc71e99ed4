pub mod config;
pub mod csvlog;
pub mod error;
pub mod logger;
pub mod notifier;
pub mod retry;
pub mod sensor;

pub use config::Config;
pub use error::LoggerError;
pub use logger::{DataLogger, Outcome, State};

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveDateTime;

/// Stop request shared between the logging loop and whoever wants to end it, for
/// example a Ctrl-C handler running on another thread.
///
/// Pauses taken through [`Shutdown::wait_timeout`] end as soon as a stop is requested.
#[derive(Clone, Default)]
pub struct Shutdown(Arc<(Mutex<bool>, Condvar)>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the stop and wakes every pending [`Shutdown::wait_timeout`].
    pub fn request(&self) {
        let (flag, wakeup) = &*self.0;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wakeup.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        let (flag, _) = &*self.0;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for `timeout` unless a stop is requested first.
    ///
    /// Returns `true` if a stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, wakeup) = &*self.0;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wakeup
            .wait_timeout_while(guard, timeout, |stop| !*stop)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Source of the local wall-clock time used to stamp samples.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

#[test]
fn test_shutdown_wakes_waiter() {
    let shutdown = Shutdown::new();
    let remote = shutdown.clone();

    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        remote.request();
    });

    let started = std::time::Instant::now();
    assert!(shutdown.wait_timeout(Duration::from_secs(30)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(shutdown.is_requested());

    handle.join().unwrap();
}

#[test]
fn test_shutdown_wait_times_out() {
    let shutdown = Shutdown::new();

    assert!(!shutdown.wait_timeout(Duration::from_millis(10)));
    assert!(!shutdown.is_requested());
}
