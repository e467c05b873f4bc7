//! Durable webhook delivery: a crash-recoverable queue file, a cooperative
//! drain loop with exponential backoff, and an append-only dead-letter log.

mod dispatcher;
mod queue;

pub use dispatcher::{DrainStats, WebhookConfig, WebhookDispatcher};
pub use queue::{DeadLetterEntry, WebhookItem, WebhookQueue};
