// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

#[allow(clippy::module_inception)]
mod notifier;
mod discordnotifier;
mod dummynotifier;

pub use notifier::DeliveryResult;
pub use notifier::Notifier;
pub use notifier::NotifierPointer;
pub use notifier::NotifyError;

pub use discordnotifier::DiscordNotifier;
pub use dummynotifier::{Delivery, DummyNotifier};
