use std::{
    io::Write,
    path::PathBuf,
    process::Output,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{
    error::Result,
    output::{OutputMode, Progress},
    task::{Task, TaskKind},
    util::{CommandError, display_command, exit_code_of, parse_timeout, run_command_with_timeout},
    vcs::RepoRoot,
};

const COMPLETION_LINE: &str = "All steps completed successfully.";

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    /// Failed, but the task is fault-tolerant.
    Tolerated { exit_code: i32 },
    Failed { exit_code: i32 },
    Skipped,
}

#[derive(Debug, Serialize, Clone)]
pub struct StepReport {
    pub id: String,
    #[serde(flatten)]
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Aborted {
        step: String,
        exit_code: i32,
        #[serde(skip)]
        kind: TaskKind,
    },
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub steps: Vec<StepReport>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl RunReport {
    pub fn into_result(self) -> Result<()> {
        match self.outcome {
            Outcome::Done => Ok(()),
            Outcome::Aborted {
                step,
                exit_code,
                kind,
            } => Err(kind.failure(&step, exit_code)),
        }
    }
}

pub struct TaskRunner<'a> {
    tasks: &'a [Task],
    root: &'a RepoRoot,
    default_timeout: Option<String>,
    output_mode: OutputMode,
    progress: Progress,
}

impl<'a> TaskRunner<'a> {
    pub fn new(
        tasks: &'a [Task],
        root: &'a RepoRoot,
        default_timeout: Option<String>,
        output_mode: OutputMode,
        progress: Progress,
    ) -> Self {
        Self {
            tasks,
            root,
            default_timeout,
            output_mode,
            progress,
        }
    }

    /// Runs every task in declaration order, stopping at the first fail-fast
    /// task that exits non-zero.
    pub async fn run_tasks(&self) -> RunReport {
        let mut steps = Vec::with_capacity(self.tasks.len());

        for (index, task) in self.tasks.iter().enumerate() {
            self.progress.line(&task.description());

            let started = Instant::now();
            let result = self.execute_single_task(task).await;
            let duration = Some(format_elapsed(started.elapsed()));

            match result {
                Ok(()) => {
                    tracing::debug!(task = %task.id, "task succeeded");
                    steps.push(StepReport {
                        id: task.id.clone(),
                        status: StepStatus::Succeeded,
                        duration,
                    });
                }
                Err(exit_code) if task.is_fault_tolerant() => {
                    tracing::info!(task = %task.id, exit_code, "ignoring failure of best-effort task");
                    steps.push(StepReport {
                        id: task.id.clone(),
                        status: StepStatus::Tolerated { exit_code },
                        duration,
                    });
                }
                Err(exit_code) => {
                    tracing::debug!(task = %task.id, exit_code, "task failed, aborting");
                    steps.push(StepReport {
                        id: task.id.clone(),
                        status: StepStatus::Failed { exit_code },
                        duration,
                    });
                    steps.extend(self.tasks[index + 1..].iter().map(|skipped| StepReport {
                        id: skipped.id.clone(),
                        status: StepStatus::Skipped,
                        duration: None,
                    }));

                    return RunReport {
                        root: self.root.path().to_path_buf(),
                        steps,
                        outcome: Outcome::Aborted {
                            step: task.id.clone(),
                            exit_code,
                            kind: task.kind,
                        },
                    };
                }
            }
        }

        self.progress.line(COMPLETION_LINE);
        RunReport {
            root: self.root.path().to_path_buf(),
            steps,
            outcome: Outcome::Done,
        }
    }

    /// `Err` carries the exit code the task is treated as having.
    async fn execute_single_task(&self, task: &Task) -> std::result::Result<(), i32> {
        let timeout = parse_timeout(task.timeout.as_deref(), self.default_timeout.as_deref());
        let stream = self.output_mode == OutputMode::Stream;
        let severity = if task.is_fault_tolerant() {
            "Warning"
        } else {
            "Error"
        };

        tracing::debug!(
            task = %task.id,
            command = %display_command(&task.command),
            ?timeout,
            "running task"
        );

        match run_command_with_timeout(&task.command, Some(self.root.path()), timeout, stream).await
        {
            Ok(output) => {
                if !stream {
                    self.emit_grouped(&output);
                }
                if output.status.success() {
                    Ok(())
                } else {
                    Err(exit_code_of(output.status))
                }
            }
            Err(e @ CommandError::Timeout) => {
                eprintln!("{}: Task '{}' timed out", severity, task.id);
                Err(e.exit_code())
            }
            Err(e @ CommandError::Io(_)) => {
                eprintln!(
                    "{}: Task '{}' failed to execute '{}': {}",
                    severity,
                    task.id,
                    display_command(&task.command),
                    e
                );
                Err(e.exit_code())
            }
        }
    }

    fn emit_grouped(&self, output: &Output) {
        let stdout_result = match self.progress {
            Progress::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(&output.stdout).and_then(|_| out.flush())
            }
            Progress::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(&output.stdout).and_then(|_| err.flush())
            }
        };
        let mut err = std::io::stderr().lock();
        let stderr_result = err.write_all(&output.stderr).and_then(|_| err.flush());

        if let Err(e) = stdout_result.and(stderr_result) {
            tracing::warn!(error = %e, "failed to print task output");
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let millis = Duration::from_millis(elapsed.as_millis() as u64);
    humantime::format_duration(millis).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    use crate::error::TidyError;

    /// Task that appends its id to `log` and exits with `code`.
    fn logging_task(id: &str, kind: TaskKind, log: &Path, code: i32) -> Task {
        let script = format!("echo {} >> '{}'; exit {}", id, log.display(), code);
        Task::new(id, kind, &format!("Running {}...", id), &["sh", "-c", script.as_str()])
    }

    async fn resolved_root(dir: &TempDir) -> RepoRoot {
        let script = format!("echo '{}'", dir.path().display());
        let command = vec!["sh".to_string(), "-c".to_string(), script];
        RepoRoot::resolve(&command, None).await.unwrap()
    }

    fn read_log(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    async fn run(tasks: &[Task], root: &RepoRoot) -> RunReport {
        TaskRunner::new(tasks, root, None, OutputMode::Group, Progress::Stderr)
            .run_tasks()
            .await
    }

    #[tokio::test]
    async fn runs_steps_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let tasks = vec![
            logging_task("pre-commit", TaskKind::PreCheck, &log, 0),
            logging_task("lint", TaskKind::Lint, &log, 0),
            logging_task("format", TaskKind::Format, &log, 0),
        ];
        let root = resolved_root(&dir).await;

        let report = run(&tasks, &root).await;

        assert_eq!(read_log(&log), ["pre-commit", "lint", "format"]);
        assert_eq!(report.outcome, Outcome::Done);
        assert!(
            report
                .steps
                .iter()
                .all(|step| step.status == StepStatus::Succeeded)
        );
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn failing_pre_check_does_not_change_control_flow() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let tasks = vec![
            logging_task("pre-commit", TaskKind::PreCheck, &log, 1),
            logging_task("lint", TaskKind::Lint, &log, 0),
            logging_task("format", TaskKind::Format, &log, 0),
        ];
        let root = resolved_root(&dir).await;

        let report = run(&tasks, &root).await;

        assert_eq!(read_log(&log), ["pre-commit", "lint", "format"]);
        assert_eq!(report.steps[0].status, StepStatus::Tolerated { exit_code: 1 });
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn missing_pre_check_tool_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let tasks = vec![
            Task::new(
                "pre-commit",
                TaskKind::PreCheck,
                "hooks",
                &["tidyup-test-no-such-hook-runner", "run"],
            ),
            logging_task("lint", TaskKind::Lint, &log, 0),
        ];
        let root = resolved_root(&dir).await;

        let report = run(&tasks, &root).await;

        assert_eq!(report.steps[0].status, StepStatus::Tolerated { exit_code: 127 });
        assert_eq!(read_log(&log), ["lint"]);
        assert_eq!(report.outcome, Outcome::Done);
    }

    #[tokio::test]
    async fn failing_lint_skips_format_and_keeps_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let tasks = vec![
            logging_task("pre-commit", TaskKind::PreCheck, &log, 0),
            logging_task("lint", TaskKind::Lint, &log, 7),
            logging_task("format", TaskKind::Format, &log, 0),
        ];
        let root = resolved_root(&dir).await;

        let report = run(&tasks, &root).await;

        assert_eq!(read_log(&log), ["pre-commit", "lint"]);
        assert_eq!(report.steps[1].status, StepStatus::Failed { exit_code: 7 });
        assert_eq!(report.steps[2].status, StepStatus::Skipped);
        assert!(report.steps[2].duration.is_none());

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, TidyError::Lint { code: 7, .. }));
        assert_eq!(err.exit_code(), 7);
    }

    #[tokio::test]
    async fn failing_format_surfaces_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let tasks = vec![
            logging_task("lint", TaskKind::Lint, &log, 0),
            logging_task("format", TaskKind::Format, &log, 2),
        ];
        let root = resolved_root(&dir).await;

        let err = run(&tasks, &root).await.into_result().unwrap_err();

        assert!(matches!(err, TidyError::Format { code: 2, .. }));
    }

    #[tokio::test]
    async fn tasks_run_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = vec![Task::new(
            "touch",
            TaskKind::Other,
            "touch",
            &["sh", "-c", "touch marker"],
        )];
        let root = resolved_root(&dir).await;

        run(&tasks, &root).await.into_result().unwrap();

        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn timed_out_task_fails_with_124() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = Task::new("slow", TaskKind::Lint, "slow", &["sh", "-c", "sleep 5"]);
        task.timeout = Some("100ms".to_string());
        let tasks = vec![task];
        let root = resolved_root(&dir).await;

        let report = run(&tasks, &root).await;

        assert_eq!(
            report.outcome,
            Outcome::Aborted {
                step: "slow".to_string(),
                exit_code: 124,
                kind: TaskKind::Lint,
            }
        );
    }

    #[tokio::test]
    async fn report_serializes_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("log");
        let tasks = vec![
            logging_task("pre-commit", TaskKind::PreCheck, &log, 3),
            logging_task("lint", TaskKind::Lint, &log, 1),
            logging_task("format", TaskKind::Format, &log, 0),
        ];
        let root = resolved_root(&dir).await;

        let report = run(&tasks, &root).await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["outcome"], "aborted");
        assert_eq!(json["step"], "lint");
        assert_eq!(json["exit_code"], 1);
        assert!(json.get("kind").is_none());
        assert_eq!(json["steps"][0]["status"], "tolerated");
        assert_eq!(json["steps"][0]["exit_code"], 3);
        assert_eq!(json["steps"][2]["status"], "skipped");
        assert!(json["steps"][2].get("duration").is_none());
    }
}
