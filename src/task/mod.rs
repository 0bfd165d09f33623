pub mod config;
pub mod validation;

pub use config::load_configuration;

use serde::Deserialize;

use crate::error::TidyError;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Best-effort checks run before anything mutates the tree.
    PreCheck,
    Lint,
    Format,
    #[default]
    Other,
}

impl TaskKind {
    /// Error surfaced when a fail-fast task of this kind exits non-zero.
    pub fn failure(self, task: &str, code: i32) -> TidyError {
        let task = task.to_string();
        match self {
            TaskKind::Lint => TidyError::Lint { task, code },
            TaskKind::Format => TidyError::Format { task, code },
            TaskKind::PreCheck | TaskKind::Other => TidyError::Task { task, code },
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub kind: TaskKind,
    #[serde(default)]
    pub description: Option<String>,
    /// Program followed by its arguments. `${ROOT}` expands to the working-tree root.
    pub command: Vec<String>,
    /// Defaults to `true` for pre-checks and `false` for everything else.
    #[serde(default)]
    pub continue_on_error: Option<bool>,
    #[serde(default)]
    pub timeout: Option<String>,
}

impl Task {
    pub fn new(id: &str, kind: TaskKind, description: &str, command: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            kind,
            description: Some(description.to_string()),
            command: command.iter().map(|arg| arg.to_string()).collect(),
            continue_on_error: None,
            timeout: None,
        }
    }

    pub fn is_fault_tolerant(&self) -> bool {
        self.continue_on_error
            .unwrap_or(self.kind == TaskKind::PreCheck)
    }

    pub fn description(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => format!("Running {}...", self.id),
        }
    }
}

/// The pipeline run when no configuration file replaces it.
pub fn builtin_tasks() -> Vec<Task> {
    vec![
        Task::new(
            "pre-commit",
            TaskKind::PreCheck,
            "Running pre-commit hooks on all files...",
            &["pre-commit", "run", "--all-files"],
        ),
        Task::new(
            "lint",
            TaskKind::Lint,
            "Running linter with auto-fix...",
            &["ruff", "check", "--fix", "${ROOT}"],
        ),
        Task::new(
            "format",
            TaskKind::Format,
            "Running formatter...",
            &["ruff", "format", "${ROOT}"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_pipeline_order_and_policies() {
        let tasks = builtin_tasks();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["pre-commit", "lint", "format"]);

        assert!(tasks[0].is_fault_tolerant());
        assert!(!tasks[1].is_fault_tolerant());
        assert!(!tasks[2].is_fault_tolerant());
    }

    #[test]
    fn explicit_flag_overrides_kind_default() {
        let mut task = Task::new("hooks", TaskKind::PreCheck, "hooks", &["true"]);
        task.continue_on_error = Some(false);
        assert!(!task.is_fault_tolerant());

        let mut task = Task::new("docs", TaskKind::Other, "docs", &["true"]);
        assert!(!task.is_fault_tolerant());
        task.continue_on_error = Some(true);
        assert!(task.is_fault_tolerant());
    }

    #[test]
    fn description_falls_back_to_id() {
        let mut task = Task::new("typecheck", TaskKind::Other, "x", &["true"]);
        task.description = None;
        assert_eq!(task.description(), "Running typecheck...");
    }

    #[test]
    fn failure_maps_kind_to_error() {
        assert!(matches!(
            TaskKind::Lint.failure("lint", 1),
            TidyError::Lint { code: 1, .. }
        ));
        assert!(matches!(
            TaskKind::Format.failure("format", 2),
            TidyError::Format { code: 2, .. }
        ));
        assert!(matches!(
            TaskKind::Other.failure("docs", 3),
            TidyError::Task { code: 3, .. }
        ));
    }
}
