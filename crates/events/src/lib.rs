//! Background services: the audit event pipeline, the durable webhook
//! dispatcher, and the intel collection scheduler.
//!
//! Every long-running loop here follows the same shape: a
//! `tokio::time::interval` driven by `tokio::select!` against a
//! `CancellationToken`, so the binary can stop each service independently
//! during graceful shutdown.

pub mod audit;
pub mod intel;
pub mod ring;
pub mod scheduler;
pub mod webhook;

pub use audit::{AuditEvent, AuditHub, AuditPersistence};
pub use ring::AuditRing;
pub use scheduler::IntelScheduler;
pub use webhook::{WebhookConfig, WebhookDispatcher};
