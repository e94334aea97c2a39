//! One-off job execution through the local channel

use crate::cli::RunArgs;
use crate::ui;
use anyhow::{bail, Context, Result};
use remoting::{Job, JobChannel, LocalShellChannel, LogObserver, RemotingError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(args: RunArgs) -> Result<u8> {
    let script = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading script {}", args.script.display()))?;

    let mut job = Job::new(script);
    job.debug_logging = args.debug_logging;
    job.verbose_logging = args.verbose_logging;
    for pair in &args.vars {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("--var takes NAME=VALUE, got '{pair}'");
        };
        job = job.with_variable(name, value);
    }
    if args.all_outputs {
        job = job.collecting_all();
    } else if !args.outs.is_empty() {
        job = job.collecting(args.outs.clone());
    }

    let channel = LocalShellChannel::with_interpreter(args.interpreter.as_str(), ["-c"]);
    let observer = Arc::new(LogObserver::new(args.script.display().to_string()));

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    match channel.submit(job, observer, cancel).await {
        Ok(result) => {
            for (name, value) in &result.outputs {
                ui::kv(name, &value.to_string());
            }
            Ok(0)
        }
        Err(RemotingError::Cancelled) => {
            ui::warn("job cancelled");
            Ok(130)
        }
        Err(err) => {
            ui::error(&err.to_string());
            if let RemotingError::ExecutionFailed { log_tail, .. } = &err {
                for line in log_tail {
                    ui::dim(line);
                }
            }
            Ok(1)
        }
    }
}
