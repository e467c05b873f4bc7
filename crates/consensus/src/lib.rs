//! Provider adapters and the weighted consensus engine.
//!
//! The internal detector (pure signal heuristics from `provtrack-core`) is
//! always consulted; external providers contribute additional votes when
//! their credentials are configured. The engine fans out to all external
//! providers concurrently under a shared per-provider deadline and folds the
//! votes into one calibrated probability.

pub mod detector;
pub mod engine;
pub mod provider;
pub mod providers;

pub use detector::detect_internal;
pub use engine::{ConsensusEngine, Thresholds};
pub use provider::{ProbeOutcome, ProbeRequest, Provider};
