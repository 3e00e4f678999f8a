//! Forge configuration store: one entry per host with the account hub acts as.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use dialoguer::{Input, Password};
use serde::{Deserialize, Serialize};

use crate::{
    cli::forge::{ForgeConnector, Protocol},
    error::{HubError, forge_error},
    settings::Settings,
};

const APP_NAME: &str = std::env!("CARGO_PKG_NAME");
const CONFIG_NAME: &str = "hub";

// =============================================================================
// Domain Types
// =============================================================================

/// Account hub uses on one forge host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_socket: Option<String>,
    /// API base override, e.g. for Enterprise installations behind a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Basic auth password from `GITHUB_PASSWORD`; never written to disk.
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Host {
    pub fn new(host: &str) -> Self {
        Host {
            host: host.to_lowercase(),
            ..Default::default()
        }
    }
}

/// Configuration structure stored in TOML format.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub hosts: Vec<Host>,
    /// Keys hub doesn't know about, kept as they are on rewrite.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Asks the user for credentials of a host.
pub trait CredentialPrompt {
    /// Returns `(login, token)`.
    fn credentials(&self, host: &str) -> anyhow::Result<(String, String)>;
}

/// Line-based prompt on the terminal.
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn credentials(&self, host: &str) -> anyhow::Result<(String, String)> {
        let user: String = Input::new()
            .with_prompt(format!("{host} username"))
            .interact_text()
            .map_err(prompt_error)?;
        let token = Password::new()
            .with_prompt(format!("{host} personal access token"))
            .interact()
            .map_err(prompt_error)?;

        Ok((user, token))
    }
}

fn prompt_error(err: dialoguer::Error) -> anyhow::Error {
    match err {
        dialoguer::Error::IO(e) if e.kind() == ErrorKind::Interrupted => {
            HubError::Interrupted.into()
        }
        e => anyhow::Error::new(e).context("Failed to read credentials"),
    }
}

// =============================================================================
// Store
// =============================================================================

/// The configuration file, read once per invocation.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: HubConfig,
}

impl ConfigStore {
    /// Loads the file at `HUB_CONFIG` or the default location. A missing
    /// file yields an empty configuration and is not created.
    pub fn load(settings: &Settings) -> anyhow::Result<Self> {
        let path = match &settings.config_path {
            Some(path) => path.clone(),
            None => confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
                .context("Failed to determine configuration path")?,
        };

        Self::load_path(path)
    }

    pub fn load_path(path: PathBuf) -> anyhow::Result<Self> {
        let config = if path.exists() {
            confy::load_path(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        } else {
            HubConfig::default()
        };

        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hosts(&self) -> &[Host] {
        &self.config.hosts
    }

    pub fn find_host(&self, hostname: &str) -> Option<&Host> {
        self.config
            .hosts
            .iter()
            .find(|h| h.host.eq_ignore_ascii_case(hostname))
    }

    /// Replaces the entry of the same host, keeping its unknown keys.
    pub fn upsert_host(&mut self, host: Host) {
        match self
            .config
            .hosts
            .iter_mut()
            .find(|h| h.host.eq_ignore_ascii_case(&host.host))
        {
            Some(existing) => {
                let extra = std::mem::take(&mut existing.extra);
                *existing = Host { extra, ..host };
            }
            None => self.config.hosts.push(host),
        }
    }

    /// Writes the file through a temporary sibling and a rename.
    pub fn save(&self) -> anyhow::Result<()> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| CONFIG_NAME.to_string());
        let tmp_path = self
            .path
            .with_file_name(format!("{file_name}.tmp-{}", std::process::id()));

        confy::store_path(&tmp_path, &self.config)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);

            return Err(e).with_context(|| format!("Failed to replace {}", self.path.display()));
        }

        tracing::info!("Saved configuration to {}", self.path.display());

        Ok(())
    }

    /// Resolves the credential for `hostname`.
    ///
    /// Order: configured token, `GITHUB_TOKEN`, `GITHUB_USER` with
    /// `GITHUB_PASSWORD`, and finally an interactive prompt. Tokens are
    /// checked with the forge; a rejected one falls back to the prompt. Only
    /// prompted credentials are saved, and only after the forge accepted
    /// them.
    pub fn authenticate(
        &mut self,
        hostname: &str,
        settings: &Settings,
        connector: &dyn ForgeConnector,
        prompt: &dyn CredentialPrompt,
    ) -> anyhow::Result<Host> {
        let template = self
            .find_host(hostname)
            .cloned()
            .unwrap_or_else(|| Host::new(hostname));

        if template.oauth_token.is_some() {
            return match connector.connect(&template)?.current_user() {
                Ok(login) => Ok(Host {
                    user: non_empty_or(&template.user, login),
                    ..template
                }),
                Err(e) if is_unauthorized(&e) => {
                    tracing::warn!("Stored token for {hostname} was rejected");
                    self.prompt_for_host(template, connector, prompt)
                }
                Err(e) => Err(e),
            };
        }

        if let Some(token) = &settings.github_token {
            let host = Host {
                oauth_token: Some(token.clone()),
                ..template.clone()
            };

            return match connector.connect(&host)?.current_user() {
                Ok(login) => {
                    let user = settings.github_user.clone().unwrap_or(login);

                    Ok(Host { user, ..host })
                }
                Err(e) if is_unauthorized(&e) => {
                    tracing::warn!("GITHUB_TOKEN was rejected by {hostname}");
                    self.prompt_for_host(template, connector, prompt)
                }
                Err(e) => Err(e),
            };
        }

        if let (Some(user), Some(password)) = (&settings.github_user, &settings.github_password) {
            return Ok(Host {
                user: user.clone(),
                password: Some(password.clone()),
                ..template
            });
        }

        self.prompt_for_host(template, connector, prompt)
    }

    fn prompt_for_host(
        &mut self,
        template: Host,
        connector: &dyn ForgeConnector,
        prompt: &dyn CredentialPrompt,
    ) -> anyhow::Result<Host> {
        let mut retried = false;

        loop {
            let (user, token) = prompt.credentials(&template.host)?;
            let candidate = Host {
                user,
                oauth_token: Some(token),
                ..template.clone()
            };

            match connector.connect(&candidate)?.current_user() {
                Ok(login) => {
                    let host = Host {
                        user: login,
                        ..candidate
                    };

                    self.upsert_host(host.clone());
                    self.save()?;

                    return Ok(host);
                }
                Err(e) if is_unauthorized(&e) && !retried => {
                    eprintln!("Authentication to {} failed, try again.", template.host);
                    retried = true;
                }
                Err(e) if is_unauthorized(&e) => {
                    return Err(HubError::Auth(format!(
                        "authentication to {} failed",
                        template.host
                    ))
                    .into());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn non_empty_or(configured: &str, fallback: String) -> String {
    if configured.is_empty() {
        fallback
    } else {
        configured.to_string()
    }
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    forge_error(err).is_some_and(|e| e.status == 401)
}
