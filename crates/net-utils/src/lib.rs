//! Networking utilities shared by the reporting client and the export sinks: exponential
//! backoff with jitter, and classification of transient Google API failures.

pub mod backoff;
pub mod transient;

pub use backoff::{Backoff, BackoffConfig, BackoffOnce, Sleeper, TokioSleeper};
pub use transient::{DefaultTransientReasons, IsTransient};
