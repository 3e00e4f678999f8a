//! Settings read from the environment once per invocation.

use std::{env, io::IsTerminal, path::PathBuf};

use clap::ValueEnum;

use crate::cli::Protocol;

pub const DEFAULT_HOST: &str = "github.com";

/// Snapshot of the environment variables hub honours.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    /// `HUB_PROTOCOL`
    pub protocol: Option<Protocol>,
    /// `HUB_CONFIG`
    pub config_path: Option<PathBuf>,
    /// `HUB_VERBOSE`
    pub verbose: bool,
    /// `BROWSER`
    pub browser: Option<String>,
    /// `GIT_EDITOR`, then `EDITOR`
    pub editor: Option<String>,
    /// `HUB_HOST`
    pub host: Option<String>,
    /// `GITHUB_TOKEN`
    pub github_token: Option<String>,
    /// `GITHUB_USER`
    pub github_user: Option<String>,
    /// `GITHUB_PASSWORD`
    pub github_password: Option<String>,
    pub stdout_is_tty: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        let protocol = non_empty_var("HUB_PROTOCOL").and_then(|value| {
            Protocol::from_str(&value, true)
                .inspect_err(|_| tracing::warn!("Ignoring unknown HUB_PROTOCOL '{value}'"))
                .ok()
        });

        Settings {
            protocol,
            config_path: non_empty_var("HUB_CONFIG").map(PathBuf::from),
            verbose: non_empty_var("HUB_VERBOSE").is_some(),
            browser: non_empty_var("BROWSER"),
            editor: non_empty_var("GIT_EDITOR").or_else(|| non_empty_var("EDITOR")),
            host: non_empty_var("HUB_HOST"),
            github_token: non_empty_var("GITHUB_TOKEN"),
            github_user: non_empty_var("GITHUB_USER"),
            github_password: non_empty_var("GITHUB_PASSWORD"),
            stdout_is_tty: std::io::stdout().is_terminal(),
        }
    }

    /// The host used when nothing else pins one down.
    pub fn default_host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
