//! Working-tree root resolution.
//!
//! The root is only ever obtained through [`RepoRoot::resolve`], so a
//! failed resolution short-circuits before any task can run.

use std::{
    env,
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    error::{Result, TidyError},
    util::{display_command, exit_code_of, run_command_with_timeout},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRoot {
    path: PathBuf,
}

impl RepoRoot {
    /// Runs `command` in `cwd` (or the current directory) and reads the
    /// working-tree root from its stdout.
    ///
    /// # Errors
    ///
    /// Returns [`TidyError::Environment`] if the resolver cannot be started,
    /// exits non-zero, or prints something that is not a directory. A
    /// non-zero exit keeps the resolver's exit code and forwards its stderr.
    pub async fn resolve(command: &[String], cwd: Option<&Path>) -> Result<Self> {
        let output = run_command_with_timeout(command, cwd, None, false)
            .await
            .map_err(|e| TidyError::Environment {
                code: e.exit_code(),
                detail: Some(format!(
                    "failed to run '{}': {}",
                    display_command(command),
                    e
                )),
            })?;

        if !output.status.success() {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(&output.stderr);
            let _ = stderr.flush();
            return Err(TidyError::Environment {
                code: exit_code_of(output.status),
                detail: None,
            });
        }

        let mut printed = output.stdout.as_slice();
        while let [rest @ .., b'\r' | b'\n'] = printed {
            printed = rest;
        }
        if printed.trim_ascii().is_empty() {
            return Err(TidyError::Environment {
                code: 1,
                detail: Some(format!(
                    "'{}' did not print a working-tree root",
                    display_command(command)
                )),
            });
        }

        let mut path = path_from_bytes(printed);
        if path.is_relative() {
            let base = match cwd {
                Some(dir) => dir.to_path_buf(),
                None => env::current_dir()?,
            };
            path = base.join(path);
        }

        if !path.is_dir() {
            return Err(TidyError::Environment {
                code: 1,
                detail: Some(format!(
                    "working-tree root '{}' is not a directory",
                    path.display()
                )),
            });
        }

        tracing::debug!(root = %path.display(), "resolved working-tree root");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Paths are raw bytes on unix; anything the resolver prints is kept as-is.
#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::{ffi::OsStr, os::unix::ffi::OsStrExt};
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
