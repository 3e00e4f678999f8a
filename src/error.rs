//! Error kinds surfaced to the user.

use std::fmt::Display;

use thiserror::Error;

/// Errors that carry a meaning for the process exit code.
///
/// Handlers return `anyhow::Result` and wrap these where the kind matters;
/// `main` looks for a `HubError` in the chain to pick the exit code.
#[derive(Debug, Error)]
pub enum HubError {
    /// Bad flag value, missing argument, non-numeric number etc.
    #[error("{0}")]
    UserInput(String),

    /// Malformed command line.
    #[error("{0}")]
    Usage(String),

    /// Repository, pull request or branch doesn't exist.
    #[error("{0}")]
    NotFound(String),

    /// Missing or rejected credentials.
    #[error("{0}")]
    Auth(String),

    /// Connection, DNS or timeout failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response from the forge.
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// The underlying git process exited unsuccessfully.
    #[error("`{command}` exited with status {code}")]
    Vcs { command: String, code: u8 },

    /// Terminate with the given code without printing anything.
    #[error("exit status {0}")]
    Exit(u8),

    /// The user aborted a prompt.
    #[error("interrupted")]
    Interrupted,
}

impl HubError {
    pub fn user_input(message: impl Display) -> Self {
        HubError::UserInput(message.to_string())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            HubError::Usage(_) => 2,
            HubError::Vcs { code, .. } | HubError::Exit(code) => *code,
            _ => 1,
        }
    }

    /// Whether `main` should stay silent for this error.
    pub fn is_silent(&self) -> bool {
        matches!(self, HubError::Exit(_))
    }
}

/// A decoded non-2xx forge response.
#[derive(Debug, Error)]
pub struct ForgeError {
    pub status: u16,
    pub url: String,
    pub message: String,
    pub errors: Vec<String>,
    pub rate_limit_remaining: Option<u32>,
}

impl ForgeError {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl Display for ForgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error HTTP {} ({})", self.status, self.url)?;

        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }

        for error in &self.errors {
            write!(f, "\n{error}")?;
        }

        if let Some(remaining) = self.rate_limit_remaining {
            write!(f, "\nRate limit remaining: {remaining}")?;
        }

        Ok(())
    }
}

/// Finds the exit code for an error chain.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<HubError>())
        .map(HubError::exit_code)
        .unwrap_or(1)
}

/// Whether the error chain asks for a silent exit.
pub fn is_silent(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<HubError>())
        .is_some_and(HubError::is_silent)
}

/// Returns the forge error in the chain, if any.
pub fn forge_error(err: &anyhow::Error) -> Option<&ForgeError> {
    err.chain().find_map(|cause| match cause.downcast_ref::<HubError>() {
        Some(HubError::Forge(forge_error)) => Some(forge_error),
        _ => cause.downcast_ref::<ForgeError>(),
    })
}

/// Whether the chain holds a missing-resource error, local or from the forge.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<HubError>(), Some(HubError::NotFound(_))))
        || forge_error(err).is_some_and(ForgeError::is_not_found)
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn test_exit_code_of_kinds() {
        assert_eq!(HubError::Usage("bad".to_string()).exit_code(), 2);
        assert_eq!(HubError::user_input("bad").exit_code(), 1);
        assert_eq!(
            HubError::Vcs {
                command: "git fetch".to_string(),
                code: 128
            }
            .exit_code(),
            128
        );
        assert_eq!(HubError::Exit(3).exit_code(), 3);
    }

    #[test]
    fn test_exit_code_looks_through_context() {
        let err: anyhow::Result<()> = Err(HubError::Usage("no".to_string()).into());
        let err = err.context("while parsing").unwrap_err();

        assert_eq!(exit_code(&err), 2);
        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 1);
    }

    #[test]
    fn test_forge_error_display_surfaces_rate_limit() {
        let err = ForgeError {
            status: 403,
            url: "https://api.github.com/repos/a/b".to_string(),
            message: "API rate limit exceeded".to_string(),
            errors: vec![],
            rate_limit_remaining: Some(0),
        };

        let text = err.to_string();

        assert!(text.starts_with("Error HTTP 403"));
        assert!(text.contains("API rate limit exceeded"));
        assert!(text.ends_with("Rate limit remaining: 0"));
    }

    #[test]
    fn test_forge_error_found_in_chain() {
        let err = anyhow::Error::from(HubError::Forge(ForgeError {
            status: 404,
            url: String::new(),
            message: "Not Found".to_string(),
            errors: vec![],
            rate_limit_remaining: None,
        }))
        .context("fetching repository");

        assert!(forge_error(&err).is_some_and(ForgeError::is_not_found));
        assert!(is_not_found(&err));
        assert!(is_not_found(&HubError::NotFound("gone".to_string()).into()));
        assert!(!is_not_found(&HubError::Auth("denied".to_string()).into()));
    }
}
