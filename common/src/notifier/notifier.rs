// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::path::Path;
use thiserror::Error;

/// Why a notification did not go through.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The endpoint answered, but not with `204 No Content`.
    #[error("unexpected status code {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot read attachment: {0}")]
    Attachment(#[from] std::io::Error),
}

pub type DeliveryResult = Result<(), NotifyError>;

pub type NotifierPointer = Box<dyn Notifier + Send>;

/// Delivers short status messages to whoever watches the logger.
///
/// Delivery is best effort: implementations report every outcome themselves and
/// callers are free to ignore the result.
pub trait Notifier {
    /// Sends a plain text message.
    fn send_message(&self, text: &str) -> DeliveryResult;

    /// Sends `path` as an attachment, together with a text message.
    fn send_file(&self, path: &Path, text: &str) -> DeliveryResult;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn send_message(&self, text: &str) -> DeliveryResult {
        (**self).send_message(text)
    }

    fn send_file(&self, path: &Path, text: &str) -> DeliveryResult {
        (**self).send_file(path, text)
    }
}
