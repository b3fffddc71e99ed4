// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::notifier::notifier::{DeliveryResult, Notifier, NotifyError};

/// A notification as seen by the [`DummyNotifier`].
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    Message(String),
    File { path: PathBuf, text: String },
}

/// Notifier that only logs and records what it was asked to send.
///
/// Clones share the record, so a test can keep one and hand the other to the logger.
#[derive(Clone, Default)]
pub struct DummyNotifier {
    sent: Arc<Mutex<Vec<Delivery>>>,
    status: Option<u16>,
}

impl DummyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery is answered with `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Delivery> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, delivery: Delivery) -> DeliveryResult {
        log::info!("Dry run, not sending: {delivery:?}");
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delivery);

        match self.status {
            Some(code) => {
                log::warn!("Failed to send notification. Status code: {code}");
                Err(NotifyError::Status(code))
            }
            None => Ok(()),
        }
    }
}

impl Notifier for DummyNotifier {
    fn send_message(&self, text: &str) -> DeliveryResult {
        self.record(Delivery::Message(text.to_string()))
    }

    fn send_file(&self, path: &Path, text: &str) -> DeliveryResult {
        self.record(Delivery::File {
            path: path.to_path_buf(),
            text: text.to_string(),
        })
    }
}

#[test]
fn test_dummy_notifier_records_deliveries() {
    let notifier = DummyNotifier::new();
    let observer = notifier.clone();

    notifier.send_message("hello").unwrap();
    notifier
        .send_file(Path::new("/tmp/BME280_data.csv"), "the file")
        .unwrap();

    assert_eq!(
        observer.sent(),
        [
            Delivery::Message("hello".into()),
            Delivery::File {
                path: "/tmp/BME280_data.csv".into(),
                text: "the file".into()
            },
        ]
    );
}

#[test]
fn test_failing_dummy_notifier() {
    let notifier = DummyNotifier::failing(500);

    assert!(matches!(
        notifier.send_message("hello"),
        Err(NotifyError::Status(500))
    ));
    assert_eq!(notifier.sent().len(), 1);
}
