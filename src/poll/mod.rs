//! Interval polling with capped backoff retries for one data source.

pub mod backoff;
pub mod clock;
pub mod controller;

pub use backoff::RetryPolicy;
pub use clock::{Clock, FixedClock, SystemClock};
pub use controller::{DataSource, PollController, PollOptions, PollPhase, PollSnapshot};
