//! Retry and wait core for Huawei Cloud RDS operations.
//!
//! Resource code hands a guarded operation and a state-refresh probe to
//! [`retry::run_with_retry_and_wait`]; conflicts with concurrent operations on
//! the same instance are classified by [`retry`] and retried, then the probe is
//! polled by [`wait`] until the instance settles.

pub mod config;
pub mod context;
pub mod keyed_lock;
pub mod logging;
pub mod refresh;
pub mod retry;
pub mod transport;
pub mod wait;
