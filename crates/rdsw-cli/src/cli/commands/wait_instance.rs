//! `rdsw wait-instance` – block until an instance reaches a target state.

use anyhow::{Context, Result};
use rdsw_core::context::CallContext;
use rdsw_core::refresh;
use rdsw_core::transport::CurlTransport;
use rdsw_core::wait::{wait_for_state, PollTiming, WaitSpec};

pub async fn run_wait_instance(
    ctx: CallContext,
    transport: CurlTransport,
    project_id: String,
    instance_id: String,
    targets: Vec<String>,
    pending: Vec<String>,
    timing: PollTiming,
) -> Result<()> {
    let spec = WaitSpec::new(targets, timing.timeout)
        .timing(timing)
        .pending(pending);
    tracing::info!(instance_id = %instance_id, targets = ?spec.target, "waiting for instance");

    let id = instance_id.clone();
    let done = tokio::task::spawn_blocking(move || {
        wait_for_state(
            &ctx,
            &spec,
            refresh::instance_status(&transport, &project_id, &id),
        )
    })
    .await
    .context("wait task panicked")?
    .with_context(|| format!("waiting for instance {}", instance_id))?;

    println!("instance {} is {}", instance_id, done.state);
    if !done.payload.is_null() {
        println!("{}", serde_json::to_string_pretty(&done.payload)?);
    }
    Ok(())
}
