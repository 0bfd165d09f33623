use clap::ValueEnum;
use serde::Deserialize;

#[derive(ValueEnum, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Stream tool output live.
    #[default]
    Stream,
    /// Print each tool's output as a single block after it completes.
    Group,
}

/// Where progress lines go. With `--json` stdout is reserved for the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    Stdout,
    Stderr,
}

impl Progress {
    pub fn line(self, message: &str) {
        match self {
            Progress::Stdout => println!("{}", message),
            Progress::Stderr => eprintln!("{}", message),
        }
    }
}
