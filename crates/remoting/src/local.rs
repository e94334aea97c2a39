//! Local interpreter channel
//!
//! Runs job payloads in a local child process, streaming stdout line by
//! line. Lines starting with `::` are control markers:
//!
//! - `::out NAME=V` sets a text output variable
//! - `::out NAME[]=V` appends to a list output variable
//! - `::out NAME.KEY=V` sets an entry of a map output variable
//! - `::progress N [activity]` emits a progress event
//! - `::debug MSG` / `::verbose MSG` log at debug when the matching job
//!   flag is set
//!
//! Everything else logs at info when `log_output` is set; stderr lines log
//! at warn. Output markers are only honored when `collect_output` is set
//! and the name is requested.

use crate::channel::JobChannel;
use crate::error::RemotingError;
use crate::events::{JobObserver, LogEvent, LogLevel, ProgressEvent};
use crate::job::{Job, JobResult, JobStatus};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const LOG_TAIL_LINES: usize = 20;

/// Executes payloads with a local interpreter, `sh -c` by default.
///
/// Scalar job variables are exported as environment variables; lists are
/// space-joined and maps render as `key=value` pairs.
pub struct LocalShellChannel {
    program: String,
    args: Vec<String>,
}

impl LocalShellChannel {
    pub fn new() -> Self {
        Self::with_interpreter("sh", ["-c"])
    }

    /// Use a different interpreter, e.g. `pwsh -NoProfile -Command`
    pub fn with_interpreter<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for LocalShellChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobChannel for LocalShellChannel {
    async fn submit(
        &self,
        job: Job,
        observer: Arc<dyn JobObserver>,
        cancel: CancellationToken,
    ) -> Result<JobResult, RemotingError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&job.script_text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (name, value) in &job.variables {
            cmd.env(name, value.to_string());
        }

        let mut child = cmd.spawn().map_err(|e| RemotingError::ExecutionFailed {
            detail: format!("failed to spawn '{}': {e}", self.program),
            log_tail: Vec::new(),
        })?;

        let Some(stdout) = child.stdout.take() else {
            return Err(RemotingError::ExecutionFailed {
                detail: "child stdout was not captured".into(),
                log_tail: Vec::new(),
            });
        };
        let Some(stderr) = child.stderr.take() else {
            return Err(RemotingError::ExecutionFailed {
                detail: "child stderr was not captured".into(),
                log_tail: Vec::new(),
            });
        };
        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;

        let mut outputs: BTreeMap<String, Value> = BTreeMap::new();
        let mut tail: VecDeque<String> = VecDeque::new();

        let status = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(RemotingError::Cancelled);
                }
                line = stdout_lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        handle_stdout_line(&job, &line, observer.as_ref(), &mut outputs, &mut tail);
                    }
                    _ => stdout_open = false,
                },
                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        push_tail(&mut tail, &line);
                        observer.on_log(LogEvent::new(LogLevel::Warn, line));
                    }
                    _ => stderr_open = false,
                },
                status = child.wait(), if !stdout_open && !stderr_open => {
                    break status.map_err(|e| RemotingError::ExecutionFailed {
                        detail: format!("failed to reap child process: {e}"),
                        log_tail: tail.iter().cloned().collect(),
                    })?;
                }
            }
        };

        if status.success() {
            Ok(JobResult {
                exit_code: status.code(),
                outputs: if job.collect_output {
                    outputs
                } else {
                    BTreeMap::new()
                },
                status: JobStatus::Succeeded,
            })
        } else {
            // Captured outputs are discarded; a failed job must not expose
            // inconsistent state.
            Err(RemotingError::ExecutionFailed {
                detail: format!("script exited with {status}"),
                log_tail: tail.into_iter().collect(),
            })
        }
    }
}

fn handle_stdout_line(
    job: &Job,
    line: &str,
    observer: &dyn JobObserver,
    outputs: &mut BTreeMap<String, Value>,
    tail: &mut VecDeque<String>,
) {
    if let Some(rest) = line.strip_prefix("::out ") {
        if job.collect_output {
            record_output(outputs, rest, job);
        }
    } else if let Some(rest) = line.strip_prefix("::progress ") {
        observer.on_progress(parse_progress(rest));
    } else if let Some(rest) = line.strip_prefix("::debug ") {
        if job.debug_logging {
            push_tail(tail, rest);
            observer.on_log(LogEvent::new(LogLevel::Debug, rest));
        }
    } else if let Some(rest) = line.strip_prefix("::verbose ") {
        if job.verbose_logging {
            push_tail(tail, rest);
            observer.on_log(LogEvent::new(LogLevel::Debug, rest));
        }
    } else if job.log_output {
        push_tail(tail, line);
        observer.on_log(LogEvent::new(LogLevel::Info, line));
    }
}

fn record_output(outputs: &mut BTreeMap<String, Value>, spec: &str, job: &Job) {
    let Some((key, value)) = spec.split_once('=') else {
        return;
    };

    if let Some(name) = key.strip_suffix("[]") {
        if job.out_variables.wants(name) {
            let entry = outputs
                .entry(name.to_string())
                .or_insert_with(|| Value::List(Vec::new()));
            if let Value::List(items) = entry {
                items.push(Value::text(value));
            }
        }
    } else if let Some((name, sub_key)) = key.split_once('.') {
        if job.out_variables.wants(name) {
            let entry = outputs
                .entry(name.to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            if let Value::Map(entries) = entry {
                entries.insert(sub_key.to_string(), Value::text(value));
            }
        }
    } else if job.out_variables.wants(key) {
        outputs.insert(key.to_string(), Value::text(value));
    }
}

fn parse_progress(rest: &str) -> ProgressEvent {
    let rest = rest.trim();
    let mut parts = rest.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or_default();
    match first.trim_end_matches('%').parse::<u8>() {
        Ok(percent) => ProgressEvent {
            percent: Some(percent.min(100)),
            activity: parts
                .next()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        },
        Err(_) => ProgressEvent {
            percent: None,
            activity: Some(rest.to_string()),
        },
    }
}

fn push_tail(tail: &mut VecDeque<String>, line: &str) {
    if tail.len() == LOG_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NullObserver, ProgressSlot};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Observer recording every event, for assertions
    #[derive(Default)]
    struct RecordingObserver {
        logs: Mutex<Vec<LogEvent>>,
        progress: ProgressSlot,
    }

    impl JobObserver for RecordingObserver {
        fn on_log(&self, event: LogEvent) {
            self.logs.lock().unwrap().push(event);
        }

        fn on_progress(&self, event: ProgressEvent) {
            self.progress.replace(event);
        }
    }

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn captures_marked_outputs_in_all_shapes() {
        let channel = LocalShellChannel::new();
        let job = Job::new(
            "echo '::out greeting=hi'\n\
             echo '::out names[]=alpha'\n\
             echo '::out names[]=beta'\n\
             echo '::out flags.cfgA=true'",
        )
        .collecting_all();

        let result = channel
            .submit(job, Arc::new(NullObserver), token())
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Succeeded);
        assert_eq!(result.outputs["greeting"], Value::text("hi"));
        assert_eq!(
            result.outputs["names"],
            Value::string_list(["alpha", "beta"])
        );
        let flags = result.outputs["flags"].as_map().unwrap();
        assert_eq!(flags["cfgA"], Value::text("true"));
    }

    #[tokio::test]
    async fn only_requested_outputs_are_retained() {
        let channel = LocalShellChannel::new();
        let job = Job::new("echo '::out wanted=1'\necho '::out unwanted=2'")
            .collecting(["wanted"]);

        let result = channel
            .submit(job, Arc::new(NullObserver), token())
            .await
            .unwrap();

        assert!(result.outputs.contains_key("wanted"));
        assert!(!result.outputs.contains_key("unwanted"));
    }

    #[tokio::test]
    async fn variables_are_exported_to_the_environment() {
        let channel = LocalShellChannel::new();
        let job = Job::new("echo \"::out echoed=$NAME\"")
            .with_variable("NAME", "site-A")
            .collecting(["echoed"]);

        let result = channel
            .submit(job, Arc::new(NullObserver), token())
            .await
            .unwrap();
        assert_eq!(result.outputs["echoed"], Value::text("site-A"));
    }

    #[tokio::test]
    async fn failure_discards_outputs_and_carries_log_tail() {
        let channel = LocalShellChannel::new();
        let job = Job::new("echo '::out partial=1'\necho oops\nexit 3").collecting_all();

        let err = channel
            .submit(job, Arc::new(NullObserver), token())
            .await
            .unwrap_err();

        match err {
            RemotingError::ExecutionFailed { detail, log_tail } => {
                assert!(detail.contains("3"), "detail was: {detail}");
                assert!(log_tail.iter().any(|l| l.contains("oops")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cancellation_kills_the_child_and_surfaces_cancelled() {
        let channel = LocalShellChannel::new();
        let job = Job::new("sleep 30");
        let cancel = token();

        let cancel_after = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_after.cancel();
        });

        let started = std::time::Instant::now();
        let err = channel
            .submit(job, Arc::new(NullObserver), cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn progress_markers_overwrite_and_logs_stream_in_order() {
        let channel = LocalShellChannel::new();
        let observer = Arc::new(RecordingObserver::default());
        let job = Job::new(
            "echo first\n\
             echo '::progress 10 warming up'\n\
             echo '::progress 55'\n\
             echo '::progress 90 almost done'\n\
             echo second",
        );

        channel
            .submit(job, observer.clone(), token())
            .await
            .unwrap();

        let latest = observer.progress.latest().unwrap();
        assert_eq!(latest.percent, Some(90));
        assert_eq!(latest.activity.as_deref(), Some("almost done"));

        let logs = observer.logs.lock().unwrap();
        let messages: Vec<&str> = logs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn debug_lines_require_the_debug_flag() {
        let channel = LocalShellChannel::new();

        let observer = Arc::new(RecordingObserver::default());
        let quiet = Job::new("echo '::debug hidden'");
        channel
            .submit(quiet, observer.clone(), token())
            .await
            .unwrap();
        assert!(observer.logs.lock().unwrap().is_empty());

        let observer = Arc::new(RecordingObserver::default());
        let mut chatty = Job::new("echo '::debug shown'");
        chatty.debug_logging = true;
        channel
            .submit(chatty, observer.clone(), token())
            .await
            .unwrap();
        let logs = observer.logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Debug);
        assert_eq!(logs[0].message, "shown");
    }
}
