//! CLI for the RDS retry and wait core.

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rdsw_core::config::{self, RdswConfig};
use rdsw_core::context::CallContext;
use rdsw_core::retry::ConflictKind;
use rdsw_core::transport::CurlTransport;
use rdsw_core::wait::PollTiming;
use std::time::Duration;

use commands::{run_classify, run_codes, run_wait_instance, run_wait_job};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rdsw")]
#[command(about = "RDSW: retry and wait helpers for Huawei Cloud RDS", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Which conflict classifier to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    MultiOperation,
    Deletion,
    CrossRegionBackup,
}

impl From<KindArg> for ConflictKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::MultiOperation => ConflictKind::MultiOperation,
            KindArg::Deletion => ConflictKind::Deletion,
            KindArg::CrossRegionBackup => ConflictKind::CrossRegionBackup,
        }
    }
}

/// Overrides for the `[wait]` section of config.toml.
#[derive(Debug, Clone, Default, Args)]
pub struct WaitArgs {
    /// Overall budget in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
    /// Grace period before the first probe, in seconds.
    #[arg(long, value_name = "SECS")]
    pub delay_secs: Option<u64>,
    /// Seconds between probes; 0 polls exponentially.
    #[arg(long, value_name = "SECS")]
    pub interval_secs: Option<u64>,
}

impl WaitArgs {
    pub fn timing(&self, defaults: PollTiming) -> PollTiming {
        PollTiming {
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            delay: self
                .delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.delay),
            poll_interval: self
                .interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Classify an RDS error response: would it be retried?
    Classify {
        /// HTTP status of the response.
        #[arg(long)]
        status: u16,
        /// Response body (JSON).
        #[arg(long)]
        body: String,
        /// Classifier to apply.
        #[arg(long, value_enum, default_value = "multi-operation")]
        kind: KindArg,
    },

    /// List the error codes treated as retryable conflicts.
    Codes,

    /// Wait until an instance reaches one of the target states.
    WaitInstance {
        /// Instance identifier.
        id: String,
        /// Target state (repeatable).
        #[arg(long = "target", default_value = "ACTIVE")]
        targets: Vec<String>,
        /// Expected intermediate state (repeatable). Any other state aborts the wait.
        #[arg(long = "pending")]
        pending: Vec<String>,
        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Wait until an RDS job completes.
    WaitJob {
        /// Job identifier.
        id: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Classify { status, body, kind } => run_classify(status, &body, kind.into()),
            CliCommand::Codes => run_codes(),
            CliCommand::WaitInstance {
                id,
                targets,
                pending,
                wait,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let transport = transport_for(&cfg)?;
                let timing = wait.timing(cfg.wait_timing());
                let ctx = cancel_on_ctrl_c();
                run_wait_instance(ctx, transport, cfg.project_id, id, targets, pending, timing)
                    .await
            }
            CliCommand::WaitJob { id, wait } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let transport = transport_for(&cfg)?;
                let timing = wait.timing(cfg.wait_timing());
                let ctx = cancel_on_ctrl_c();
                run_wait_job(ctx, transport, cfg.project_id, id, timing).await
            }
        }
    }
}

fn transport_for(cfg: &RdswConfig) -> Result<CurlTransport> {
    if cfg.project_id.trim().is_empty() {
        anyhow::bail!(
            "project_id is not set; edit {}",
            config::config_path()?.display()
        );
    }
    let transport = CurlTransport::new(&cfg.endpoint)
        .with_context(|| format!("configuring endpoint {}", cfg.endpoint))?;
    Ok(match cfg.token() {
        Some(token) => transport.with_token(&token),
        None => {
            tracing::warn!("no auth token in {:?}; requests are unauthenticated", cfg.token_env);
            transport
        }
    })
}

/// Context whose token flips on Ctrl-C so blocking waits return promptly.
fn cancel_on_ctrl_c() -> CallContext {
    let ctx = CallContext::new();
    let watcher = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted; cancelling wait");
            watcher.cancel();
        }
    });
    ctx
}

#[cfg(test)]
mod tests;
