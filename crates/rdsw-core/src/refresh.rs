//! State refresh adapters for RDS instances and jobs.
//!
//! Each adapter turns one GET into a [`Refreshed`] state string for the poll
//! loop. They hold no state of their own beyond the ids they probe.

use crate::context::CallContext;
use crate::retry::RdsError;
use crate::transport::{ApiFailure, RdsTransport};
use crate::wait::{wait_for_state, PollTiming, Refreshed, WaitError, WaitSpec};
use serde_json::Value;

/// State reported for an instance that no longer exists.
pub const DELETED: &str = "DELETED";

/// Instance status that aborts any wait.
const INSTANCE_FAILED: &str = "FAILED";

pub const JOB_RUNNING: &str = "Running";
pub const JOB_COMPLETED: &str = "Completed";
pub const JOB_FAILED: &str = "Failed";

fn query_escape(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn instance_path(project_id: &str, instance_id: &str) -> String {
    format!("v3/{}/instances?id={}", project_id, query_escape(instance_id))
}

fn job_path(project_id: &str, job_id: &str) -> String {
    format!("v3/{}/jobs?id={}", project_id, query_escape(job_id))
}

/// Fetch one instance. `Ok(None)` when RDS says it does not exist.
fn fetch_instance<T: RdsTransport + ?Sized>(
    transport: &T,
    project_id: &str,
    instance_id: &str,
) -> Result<Option<Value>, RdsError> {
    let body = match transport.get_json(&instance_path(project_id, instance_id)) {
        Ok(body) => body,
        Err(ApiFailure::NotFound { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let instance = body
        .get("instances")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .filter(|inst| {
            inst.get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| !id.is_empty())
        })
        .cloned();
    Ok(instance)
}

/// Probe an instance's `status`. A missing instance reports [`DELETED`];
/// status `FAILED` is an error.
pub fn instance_status<'a, T: RdsTransport + ?Sized>(
    transport: &'a T,
    project_id: &'a str,
    instance_id: &'a str,
) -> impl FnMut() -> Result<Refreshed<Value>, RdsError> + 'a {
    move || {
        let Some(instance) = fetch_instance(transport, project_id, instance_id)? else {
            return Ok(Refreshed::new(Value::Null, DELETED));
        };
        let status = instance
            .get("status")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RdsError::refresh(format!("instance {} has no status", instance_id)))?
            .to_string();
        if status == INSTANCE_FAILED {
            return Err(RdsError::refresh(format!(
                "the instance status is: {}",
                status
            )));
        }
        Ok(Refreshed::new(instance, status))
    }
}

/// Probe whether SSL is enabled on an instance; the state is `"true"` or `"false"`.
pub fn instance_ssl<'a, T: RdsTransport + ?Sized>(
    transport: &'a T,
    project_id: &'a str,
    instance_id: &'a str,
) -> impl FnMut() -> Result<Refreshed<Value>, RdsError> + 'a {
    move || {
        let Some(instance) = fetch_instance(transport, project_id, instance_id)? else {
            return Err(RdsError::refresh(format!(
                "the instance ({}) has been deleted",
                instance_id
            )));
        };
        if instance.get("status").and_then(Value::as_str) == Some(INSTANCE_FAILED) {
            return Err(RdsError::refresh(format!(
                "the instance status is: {}",
                INSTANCE_FAILED
            )));
        }
        let enabled = instance
            .get("enable_ssl")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Refreshed::new(instance, enabled.to_string()))
    }
}

/// Probe a job's `status` (`Running`, `Completed`, `Failed`).
pub fn job_status<'a, T: RdsTransport + ?Sized>(
    transport: &'a T,
    project_id: &'a str,
    job_id: &'a str,
) -> impl FnMut() -> Result<Refreshed<Value>, RdsError> + 'a {
    move || {
        let body = transport.get_json(&job_path(project_id, job_id))?;
        let job = body.get("job").cloned().unwrap_or(Value::Null);
        let status = job
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| RdsError::refresh(format!("job {} has no status", job_id)))?
            .to_string();
        Ok(Refreshed::new(job, status))
    }
}

/// Block until a job completes. `Failed` is a terminal error.
pub fn wait_for_job<T: RdsTransport + ?Sized>(
    ctx: &CallContext,
    transport: &T,
    project_id: &str,
    job_id: &str,
    timing: PollTiming,
) -> Result<Refreshed<Value>, WaitError> {
    let spec = WaitSpec::new([JOB_COMPLETED], timing.timeout)
        .timing(timing)
        .pending([JOB_RUNNING])
        .failure([JOB_FAILED]);
    tracing::debug!(job_id, "waiting for RDS job");
    wait_for_state(ctx, &spec, job_status(transport, project_id, job_id))
}
