use std::fmt;

#[derive(Debug)]
pub enum TidyError {
    /// Not inside a working tree, or the root resolver is unusable.
    Environment { code: i32, detail: Option<String> },
    Lint { task: String, code: i32 },
    Format { task: String, code: i32 },
    Task { task: String, code: i32 },
    Config(String),
    Io(std::io::Error),
    Parse(String),
}

impl TidyError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            TidyError::Environment { code, .. }
            | TidyError::Lint { code, .. }
            | TidyError::Format { code, .. }
            | TidyError::Task { code, .. } => *code,
            TidyError::Config(_) | TidyError::Io(_) | TidyError::Parse(_) => 1,
        }
    }

    /// Whether an external tool already printed its own diagnostic.
    pub fn reported_by_tool(&self) -> bool {
        match self {
            TidyError::Environment { detail, .. } => detail.is_none(),
            TidyError::Lint { .. } | TidyError::Format { .. } | TidyError::Task { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for TidyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TidyError::Environment {
                detail: Some(detail),
                ..
            } => write!(f, "Environment error: {}", detail),
            TidyError::Environment { code, detail: None } => write!(
                f,
                "Environment error: not inside a working tree (exit code {})",
                code
            ),
            TidyError::Lint { task, code } => {
                write!(f, "Lint error: task '{}' exited with code {}", task, code)
            }
            TidyError::Format { task, code } => {
                write!(f, "Format error: task '{}' exited with code {}", task, code)
            }
            TidyError::Task { task, code } => {
                write!(f, "Task error: task '{}' exited with code {}", task, code)
            }
            TidyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TidyError::Io(err) => write!(f, "IO error: {}", err),
            TidyError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for TidyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TidyError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TidyError {
    fn from(err: std::io::Error) -> Self {
        TidyError::Io(err)
    }
}

impl From<toml::de::Error> for TidyError {
    fn from(err: toml::de::Error) -> Self {
        TidyError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for TidyError {
    fn from(err: serde_json::Error) -> Self {
        TidyError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TidyError>;
