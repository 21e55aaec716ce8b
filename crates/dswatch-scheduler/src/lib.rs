//! Background probing: which domain to check next, how often, and the loop
//! that does it.

pub mod error;
pub mod interval;
pub mod scheduler;
pub mod selector;

pub use error::{Error, Result};
pub use interval::{parse_duration, probe_interval, MIN_INTERVAL};
pub use scheduler::{ProbeOutcome, Scheduler};
pub use selector::{Selector, STALENESS_WINDOW};
