pub mod forge {
    mod forge_client;
    mod github;
    mod http_client;
    mod project;
    mod resolver;
    mod types;

    pub use forge_client::{
        Direction, ForgeClient, ForgeConnector, IssueFilters, IssueUpdate, NewIssue,
        NewPullRequest, PullRequestFilters, ReviewRequest, SortKey, StateFilter,
    };
    pub use github::GitHubConnector;
    pub use project::{Project, Protocol, Transport};
    pub use resolver::{
        Shorthand, is_cloneable, parse_owner_shorthand, parse_shorthand, resolve_clone_url,
        select_transport,
    };
    pub use types::{
        CommitStatus, Issue, IssueState, Label, Milestone, PrRef, PrRepo, PrState, PullRequest,
        Release, Repository, StatusEntry, User,
    };
}

pub mod args;
mod args_parser;
mod browse;
mod ci_status;
mod clone;
pub mod config;
mod fetch;
pub mod flags;
mod fork;
mod issue;
mod placeholders;
mod pr;
mod pull_request;
mod release;
mod remote;
pub mod runner;
mod sync;
#[cfg(test)]
pub mod test_support;

pub use forge::Protocol;

use std::{collections::HashMap, io::Write};

use clap::CommandFactory;

use crate::{
    cli::{
        args::Args,
        config::{ConfigStore, CredentialPrompt, Host, TerminalPrompt},
        forge::{ForgeClient, ForgeConnector, GitHubConnector, Project},
    },
    git::GitRepo,
    io::{ColorWhen, colorize_output},
    settings::{DEFAULT_HOST, Settings},
};

// =============================================================================
// Context
// =============================================================================

/// Everything a handler needs besides its arguments: settings, the local
/// repository, the configuration store and a way to reach the forge.
pub struct Context {
    pub settings: Settings,
    pub repo: GitRepo,
    config: Option<ConfigStore>,
    connector: Box<dyn ForgeConnector>,
    prompt: Box<dyn CredentialPrompt>,
    hosts: HashMap<String, Host>,
    out: Box<dyn Write>,
}

impl Context {
    pub fn new(settings: Settings, repo: GitRepo) -> Self {
        Context {
            settings,
            repo,
            config: None,
            connector: Box::new(GitHubConnector),
            prompt: Box::new(TerminalPrompt),
            hosts: HashMap::new(),
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn with_config(mut self, store: ConfigStore) -> Self {
        self.config = Some(store);
        self
    }

    pub fn with_forge(
        mut self,
        connector: Box<dyn ForgeConnector>,
        prompt: Box<dyn CredentialPrompt>,
    ) -> Self {
        self.connector = connector;
        self.prompt = prompt;
        self
    }

    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    /// Where command output goes.
    pub fn out(&mut self) -> &mut dyn Write {
        self.out.as_mut()
    }

    fn load_config(&mut self) -> anyhow::Result<&mut ConfigStore> {
        if self.config.is_none() {
            self.config = Some(ConfigStore::load(&self.settings)?);
        }

        self.config
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Configuration store is unavailable"))
    }

    /// Authenticated account on `hostname`, prompting if needed. Resolved
    /// once per invocation.
    pub fn host(&mut self, hostname: &str) -> anyhow::Result<Host> {
        let key = hostname.to_lowercase();

        if let Some(host) = self.hosts.get(&key) {
            return Ok(host.clone());
        }

        self.load_config()?;

        let Some(store) = self.config.as_mut() else {
            anyhow::bail!("Configuration store is unavailable");
        };
        let host = store.authenticate(
            &key,
            &self.settings,
            self.connector.as_ref(),
            self.prompt.as_ref(),
        )?;

        self.hosts.insert(key, host.clone());

        Ok(host)
    }

    pub fn client(&mut self, hostname: &str) -> anyhow::Result<Box<dyn ForgeClient>> {
        let host = self.host(hostname)?;

        self.connector.connect(&host)
    }

    pub fn current_user(&mut self, hostname: &str) -> anyhow::Result<String> {
        Ok(self.host(hostname)?.user)
    }

    /// Preferred clone protocol: `HUB_PROTOCOL`, then the host entry, then
    /// `git config hub.protocol`.
    pub fn protocol(&mut self, hostname: &str) -> anyhow::Result<Option<Protocol>> {
        if let Some(protocol) = self.settings.protocol {
            return Ok(Some(protocol));
        }

        let configured = self
            .load_config()?
            .find_host(hostname)
            .and_then(|host| host.protocol);

        if configured.is_some() {
            return Ok(configured);
        }

        Ok(self.repo.config("hub.protocol")?.and_then(|value| {
            clap::ValueEnum::from_str(&value, true)
                .inspect_err(|_| tracing::warn!("Ignoring unknown hub.protocol '{value}'"))
                .ok()
        }))
    }

    /// Hosts treated as GitHub: github.com, `HUB_HOST`, configured hosts and
    /// `hub.host` entries of git config.
    pub fn known_hosts(&mut self) -> anyhow::Result<Vec<String>> {
        let mut hosts = vec![DEFAULT_HOST.to_string()];

        hosts.extend(self.settings.host.clone());
        hosts.extend(self.load_config()?.hosts().iter().map(|h| h.host.clone()));
        hosts.extend(self.repo.config_all("hub.host")?);

        let mut seen = Vec::<String>::new();
        hosts.retain(|host| {
            let host = host.to_lowercase();
            let new = !seen.contains(&host);
            seen.push(host);
            new
        });

        Ok(hosts)
    }

    /// The project of the repository's preferred GitHub remote.
    pub fn main_project(&mut self) -> anyhow::Result<Project> {
        let known_hosts = self.known_hosts()?;

        Ok(self.repo.main_project(&known_hosts)?.1)
    }

    pub fn colorize(&self, when: Option<ColorWhen>) -> bool {
        colorize_output(when, self.settings.stdout_is_tty)
    }
}

// =============================================================================
// Command Registry
// =============================================================================

pub type Handler = fn(&mut Context, &mut Args) -> anyhow::Result<()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Hub-only command; must fulfil the request itself or replace it.
    Builtin,
    /// Git command hub rewrites before forwarding.
    GitExtension,
}

pub struct CommandSpec {
    pub key: &'static str,
    pub kind: CommandKind,
    pub run: Handler,
    /// Grammar parsed before `run`.
    pub known_flags: Option<fn() -> clap::Command>,
    /// Selected by the first parameter, which is then dropped.
    pub subcommands: &'static [CommandSpec],
}

const fn extension(key: &'static str, run: Handler) -> CommandSpec {
    CommandSpec {
        key,
        kind: CommandKind::GitExtension,
        run,
        known_flags: None,
        subcommands: &[],
    }
}

const fn builtin(
    key: &'static str,
    run: Handler,
    known_flags: fn() -> clap::Command,
    subcommands: &'static [CommandSpec],
) -> CommandSpec {
    CommandSpec {
        key,
        kind: CommandKind::Builtin,
        run,
        known_flags: Some(known_flags),
        subcommands,
    }
}

pub static COMMANDS: &[CommandSpec] = &[
    extension("clone", clone::clone),
    extension("submodule", clone::submodule),
    extension("remote", remote::remote),
    extension("fetch", fetch::fetch),
    builtin("version", runner::version, runner::VersionFlags::command, &[]),
    builtin(
        "pr",
        pr::pr,
        pr::PrFlags::command,
        &[
            builtin("list", pr::list, pr::PrListFlags::command, &[]),
            builtin("show", pr::show, pr::PrShowFlags::command, &[]),
            builtin("checkout", pr::checkout, pr::PrCheckoutFlags::command, &[]),
        ],
    ),
    builtin(
        "pull-request",
        pull_request::pull_request,
        pull_request::PullRequestFlags::command,
        &[],
    ),
    builtin(
        "issue",
        issue::list,
        issue::IssueListFlags::command,
        &[
            builtin("show", issue::show, issue::IssueShowFlags::command, &[]),
            builtin("create", issue::create, issue::IssueCreateFlags::command, &[]),
        ],
    ),
    builtin("fork", fork::fork, fork::ForkFlags::command, &[]),
    builtin("browse", browse::browse, browse::BrowseFlags::command, &[]),
    builtin("compare", browse::compare, browse::CompareFlags::command, &[]),
    builtin(
        "ci-status",
        ci_status::ci_status,
        ci_status::CiStatusFlags::command,
        &[],
    ),
    builtin(
        "release",
        release::list,
        release::ReleaseListFlags::command,
        &[builtin("show", release::show, release::ReleaseShowFlags::command, &[])],
    ),
    builtin("sync", sync::sync, sync::SyncFlags::command, &[]),
];

pub fn lookup(key: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.key == key)
}
