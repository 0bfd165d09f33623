use std::collections::HashSet;

use super::Task;
use crate::error::{Result, TidyError};

pub fn validate_tasks(tasks: &[Task]) -> Result<()> {
    if tasks.is_empty() {
        return Err(TidyError::Config("no tasks defined".to_string()));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        if task.id.trim().is_empty() {
            return Err(TidyError::Config("task with an empty id".to_string()));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(TidyError::Config(format!(
                "Task '{}' is defined more than once",
                task.id
            )));
        }
        if task.command.first().is_none_or(|program| program.is_empty()) {
            return Err(TidyError::Config(format!(
                "Task '{}' has an empty command",
                task.id
            )));
        }
    }

    Ok(())
}

pub fn validate_root_command(command: &[String]) -> Result<()> {
    if command.first().is_none_or(|program| program.is_empty()) {
        return Err(TidyError::Config(
            "root resolver command is empty".to_string(),
        ));
    }
    Ok(())
}
