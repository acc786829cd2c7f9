//! State polling for asynchronous RDS changes.
//!
//! Nearly every mutating RDS call returns before the work is done; the
//! instance (or job) then moves through intermediate states such as `BUILD`,
//! `MODIFYING` or `BACKING UP` before settling. This module polls a
//! caller-supplied refresh function until one of the target states shows up,
//! a terminal/unexpected state appears, or the budget runs out.

mod error;
mod poll;
mod spec;

pub use error::WaitError;
pub use poll::wait_for_state;
pub use spec::{PollTiming, Refreshed, WaitSpec};

pub(crate) use poll::{poll_until, sleep_within};
