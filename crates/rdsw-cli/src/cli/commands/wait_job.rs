//! `rdsw wait-job` – block until an RDS job completes.

use anyhow::{Context, Result};
use rdsw_core::context::CallContext;
use rdsw_core::refresh;
use rdsw_core::transport::CurlTransport;
use rdsw_core::wait::PollTiming;

pub async fn run_wait_job(
    ctx: CallContext,
    transport: CurlTransport,
    project_id: String,
    job_id: String,
    timing: PollTiming,
) -> Result<()> {
    let id = job_id.clone();
    let done = tokio::task::spawn_blocking(move || {
        refresh::wait_for_job(&ctx, &transport, &project_id, &id, timing)
    })
    .await
    .context("wait task panicked")?
    .with_context(|| format!("waiting for job {}", job_id))?;

    println!("job {} is {}", job_id, done.state);
    Ok(())
}
