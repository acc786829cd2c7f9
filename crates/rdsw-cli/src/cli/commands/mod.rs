//! CLI command handlers, one per file.

mod classify;
mod codes;
mod wait_instance;
mod wait_job;

pub use classify::run_classify;
pub use codes::run_codes;
pub use wait_instance::run_wait_instance;
pub use wait_job::run_wait_job;
