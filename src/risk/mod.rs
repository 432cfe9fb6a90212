//! Position risk control: thresholds, admission, and the close loop.

mod admission;
mod book;
mod close_loop;
mod config;
mod controller;
mod error;
mod snapshot;
mod thresholds;

pub use admission::{Admission, DenialReason};
pub use close_loop::CloseOutcome;
pub use config::RiskPolicy;
pub use controller::{Evaluation, RiskController, StatusReport};
pub use error::RiskError;
pub use thresholds::ThresholdAction;
