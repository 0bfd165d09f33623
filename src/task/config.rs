use std::{
    collections::HashMap,
    env, fs,
    path::Path,
    sync::LazyLock,
};

use regex::Regex;
use serde::Deserialize;

use super::{
    Task, builtin_tasks,
    validation::{validate_root_command, validate_tasks},
};
use crate::error::{Result, TidyError};
use crate::output::OutputMode;

pub const DEFAULT_CONFIG_FILE: &str = "tidyup.toml";

/// `${NAME}` or `$NAME`, matched in one pass so substituted values are never rescanned.
static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*)\b)").unwrap()
});

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default, rename = "task")]
    tasks: Vec<Task>,
    config: Option<ConfigSection>,
    root: Option<RootSection>,
    #[serde(default)]
    variables: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ConfigSection {
    default_timeout: Option<String>,
    output: Option<OutputMode>,
}

#[derive(Debug, Deserialize)]
struct RootSection {
    command: Vec<String>,
}

#[derive(Debug)]
pub struct PipelineConfiguration {
    pub tasks: Vec<Task>,
    pub root_command: Vec<String>,
    pub variables: HashMap<String, String>,
    pub default_timeout: Option<String>,
    pub output: Option<OutputMode>,
}

impl Default for PipelineConfiguration {
    fn default() -> Self {
        Self {
            tasks: builtin_tasks(),
            root_command: default_root_command(),
            variables: HashMap::new(),
            default_timeout: None,
            output: None,
        }
    }
}

impl PipelineConfiguration {
    /// Tasks with every `${NAME}` / `$NAME` in their commands expanded.
    pub fn resolve_tasks(&self, root: &Path) -> Vec<Task> {
        let mut variables = self.variables.clone();
        add_builtin_variables(&mut variables, root);

        self.tasks
            .iter()
            .cloned()
            .map(|mut task| {
                substitute_variables_in_task(&mut task, &variables);
                task
            })
            .collect()
    }
}

fn default_root_command() -> Vec<String> {
    ["git", "rev-parse", "--show-toplevel"]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
}

/// Picks the explicit file, then `tidyup.toml` in the current directory,
/// then the built-in pipeline.
pub fn load_configuration(config_path: Option<&str>) -> Result<PipelineConfiguration> {
    match config_path {
        Some(path) => load_pipeline(path),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => load_pipeline(DEFAULT_CONFIG_FILE),
        None => {
            tracing::debug!("no configuration file, using built-in pipeline");
            Ok(PipelineConfiguration::default())
        }
    }
}

pub fn load_pipeline(config_path: &str) -> Result<PipelineConfiguration> {
    let contents = fs::read_to_string(config_path)
        .map_err(|e| TidyError::Config(format!("failed to read {}: {}", config_path, e)))?;
    tracing::debug!(path = config_path, "loaded configuration file");
    parse_pipeline(&contents)
}

pub fn parse_pipeline(contents: &str) -> Result<PipelineConfiguration> {
    let config: Config = toml::from_str(contents)?;
    process_config(config)
}

fn process_config(config: Config) -> Result<PipelineConfiguration> {
    let default_timeout = config
        .config
        .as_ref()
        .and_then(|c| c.default_timeout.clone());
    let output = config.config.as_ref().and_then(|c| c.output);

    let root_command = match config.root {
        Some(root) => root.command,
        None => default_root_command(),
    };
    validate_root_command(&root_command)?;

    let tasks = if config.tasks.is_empty() {
        builtin_tasks()
    } else {
        config.tasks
    };
    validate_tasks(&tasks)?;

    Ok(PipelineConfiguration {
        tasks,
        root_command,
        variables: config.variables,
        default_timeout,
        output,
    })
}

fn add_builtin_variables(variables: &mut HashMap<String, String>, root: &Path) {
    for (key, value) in env::vars_os() {
        variables.insert(
            format!("ENV_{}", key.to_string_lossy()),
            value.to_string_lossy().to_string(),
        );
    }

    if let Ok(pwd) = env::current_dir() {
        variables.insert("PWD".to_string(), pwd.to_string_lossy().to_string());
    }

    variables.insert("ROOT".to_string(), root.to_string_lossy().to_string());
}

fn substitute_variables_in_task(task: &mut Task, variables: &HashMap<String, String>) {
    task.command = task
        .command
        .iter()
        .map(|arg| substitute_variables(arg, variables))
        .collect();
}

fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> String {
    VARIABLE
        .replace_all(text, |caps: &regex::Captures| {
            let var_name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            variables
                .get(var_name)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}
