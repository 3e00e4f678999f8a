//! Local repository probe: configuration, remotes, branches and refs.

use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use anyhow::Context;

use crate::{cli::forge::Project, error::HubError};

const REFS_HEADS: &str = "refs/heads/";

/// Handle on the repository git commands run in.
///
/// `dir` is `None` for the process' working directory.
#[derive(Clone, Debug, Default)]
pub struct GitRepo {
    dir: Option<PathBuf>,
    /// `--git-dir`/`--work-tree` flags given to hub, passed to every git call.
    globals: Vec<String>,
}

/// A configured remote.
#[derive(Clone, Debug, PartialEq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

impl Remote {
    pub fn project(&self) -> Option<Project> {
        Project::from_url(&self.url)
    }
}

/// A local branch, identified by its full ref name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
}

impl Branch {
    pub fn new(name: &str) -> Self {
        if name.starts_with("refs/") {
            Branch {
                name: name.to_string(),
            }
        } else {
            Branch {
                name: format!("{REFS_HEADS}{name}"),
            }
        }
    }

    /// The name without `refs/heads/`.
    pub fn short_name(&self) -> &str {
        self.name.strip_prefix(REFS_HEADS).unwrap_or(&self.name)
    }
}

/// Where a branch pulls from, per `branch.<name>.remote` and
/// `branch.<name>.merge`.
#[derive(Clone, Debug, PartialEq)]
pub struct Upstream {
    /// Remote name, or `.` when tracking another local branch.
    pub remote: String,
    pub branch: Branch,
}

impl Upstream {
    pub fn is_local(&self) -> bool {
        self.remote == "."
    }

    /// `remote/branch`
    pub fn remote_ref_name(&self) -> String {
        format!("{}/{}", self.remote, self.branch.short_name())
    }
}

impl GitRepo {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            globals: Vec::new(),
        }
    }

    pub fn with_globals(mut self, globals: Vec<String>) -> Self {
        self.globals = globals;
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// A `git` command rooted in this repository.
    pub fn command(&self) -> Command {
        let mut command = Command::new("git");

        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }

        command.args(&self.globals);

        command
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<Output> {
        tracing::debug!("$ git {}", args.join(" "));

        self.command()
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute git {}", args.join(" ")))
    }

    /// Runs git and returns its trimmed stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if git exits unsuccessfully.
    pub fn output(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = self.run(args)?;

        if !output.status.success() {
            anyhow::bail!(
                "Git command failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Like [`GitRepo::output`] but maps an unsuccessful exit to `None`.
    fn optional_output(&self, args: &[&str]) -> anyhow::Result<Option<String>> {
        let output = self.run(args)?;

        if !output.status.success() {
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

        Ok((!stdout.is_empty()).then_some(stdout))
    }

    /// Runs git with the terminal attached, e.g. for fetches the user
    /// should see.
    pub fn spawn(&self, args: &[&str]) -> anyhow::Result<()> {
        tracing::debug!("$ git {}", args.join(" "));

        let status = self
            .command()
            .args(args)
            .status()
            .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

        if !status.success() {
            return Err(HubError::Vcs {
                command: format!("git {}", args.join(" ")),
                code: status.code().and_then(|c| u8::try_from(c).ok()).unwrap_or(1),
            }
            .into());
        }

        Ok(())
    }

    pub fn config(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.optional_output(&["config", "--get", key])
    }

    pub fn config_all(&self, key: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .optional_output(&["config", "--get-all", key])?
            .map(|values| values.lines().map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// Remotes with their fetch URLs, in git's order.
    pub fn remotes(&self) -> anyhow::Result<Vec<Remote>> {
        let Some(listing) = self.optional_output(&["remote", "-v"])? else {
            return Ok(Vec::new());
        };

        let remotes = listing
            .lines()
            .filter(|line| line.ends_with("(fetch)"))
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let name = fields.next()?;
                let url = fields.next()?;

                Some(Remote {
                    name: name.to_string(),
                    url: url.to_string(),
                })
            })
            .collect();

        Ok(remotes)
    }

    pub fn remote_by_name(&self, name: &str) -> anyhow::Result<Option<Remote>> {
        Ok(self.remotes()?.into_iter().find(|r| r.name == name))
    }

    /// Remotes pointing at a known forge host, ordered by preference:
    /// `upstream`, `github`, `origin`, then the rest.
    pub fn forge_remotes(&self, known_hosts: &[String]) -> anyhow::Result<Vec<(Remote, Project)>> {
        let mut remotes: Vec<(Remote, Project)> = self
            .remotes()?
            .into_iter()
            .filter_map(|remote| {
                let project = remote.project()?;

                known_hosts
                    .iter()
                    .any(|host| host.eq_ignore_ascii_case(&project.host))
                    .then_some((remote, project))
            })
            .collect();

        remotes.sort_by_key(|(remote, _)| match remote.name.as_str() {
            "upstream" => 0,
            "github" => 1,
            "origin" => 2,
            _ => 3,
        });

        Ok(remotes)
    }

    /// The project of the preferred forge remote.
    ///
    /// # Errors
    ///
    /// Fails if no remote points at a known forge host.
    pub fn main_project(&self, known_hosts: &[String]) -> anyhow::Result<(Remote, Project)> {
        self.forge_remotes(known_hosts)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                HubError::NotFound(
                    "Aborted: could not find any git remote pointing to a GitHub repository"
                        .to_string(),
                )
                .into()
            })
    }

    /// The remote whose URL resolves to `project`.
    pub fn remote_for_project(
        &self,
        project: &Project,
        known_hosts: &[String],
    ) -> anyhow::Result<Option<Remote>> {
        Ok(self
            .forge_remotes(known_hosts)?
            .into_iter()
            .find(|(_, p)| p == project)
            .map(|(remote, _)| remote))
    }

    /// # Errors
    ///
    /// Fails with a user error when HEAD is detached.
    pub fn current_branch(&self) -> anyhow::Result<Branch> {
        match self.optional_output(&["symbolic-ref", "-q", "HEAD"])? {
            Some(name) => Ok(Branch { name }),
            None => Err(HubError::user_input("Aborted: not currently on any branch.").into()),
        }
    }

    pub fn upstream(&self, branch: &Branch) -> anyhow::Result<Option<Upstream>> {
        let short_name = branch.short_name();
        let remote = self.config(&format!("branch.{short_name}.remote"))?;
        let merge = self.config(&format!("branch.{short_name}.merge"))?;

        Ok(remote.zip(merge).map(|(remote, merge)| Upstream {
            remote,
            branch: Branch::new(&merge),
        }))
    }

    /// Full names of all local branches.
    pub fn local_branches(&self) -> anyhow::Result<Vec<Branch>> {
        let listing = self.output(&["for-each-ref", "--format=%(refname)", "refs/heads"])?;

        Ok(listing.lines().map(Branch::new).collect())
    }

    pub fn ref_exists(&self, ref_name: &str) -> anyhow::Result<bool> {
        Ok(self
            .optional_output(&["rev-parse", "-q", "--verify", ref_name])?
            .is_some())
    }

    /// Resolves a commit-ish to its SHA.
    pub fn rev_parse(&self, rev: &str) -> anyhow::Result<String> {
        let commit = format!("{rev}^{{commit}}");

        self.optional_output(&["rev-parse", "-q", "--verify", &commit])?
            .ok_or_else(|| {
                HubError::NotFound(format!(
                    "Aborted: no revision could be determined from '{rev}'"
                ))
                .into()
            })
    }

    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> anyhow::Result<bool> {
        let output = self.run(&["merge-base", "--is-ancestor", ancestor, descendant])?;

        Ok(output.status.success())
    }

    /// The default branch of `remote` as recorded by `refs/remotes/<remote>/HEAD`.
    /// Without that ref, `main` unless only `master` was fetched.
    pub fn default_branch(&self, remote: &str) -> anyhow::Result<Branch> {
        let head = format!("refs/remotes/{remote}/HEAD");
        let prefix = format!("refs/remotes/{remote}/");

        if let Some(target) = self.optional_output(&["symbolic-ref", "-q", &head])?
            && let Some(name) = target.strip_prefix(&prefix)
        {
            return Ok(Branch::new(name));
        }

        let has_main = self.ref_exists(&format!("{prefix}main"))?;
        let has_master = self.ref_exists(&format!("{prefix}master"))?;

        Ok(Branch::new(if has_master && !has_main {
            "master"
        } else {
            "main"
        }))
    }

    /// Name of the work tree's top-level directory.
    pub fn dir_name(&self) -> anyhow::Result<String> {
        let top_level = self.output(&["rev-parse", "--show-toplevel"])?;

        Path::new(&top_level)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("Repository has no directory name")
    }

    /// Subjects and bodies of the commits in `range`, oldest first.
    pub fn commit_messages(&self, range: &str) -> anyhow::Result<Vec<(String, String)>> {
        let log = self.output(&[
            "log",
            "--no-color",
            "--reverse",
            "--format=%s%x1f%b%x1e",
            range,
        ])?;

        Ok(log
            .split('\x1e')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (subject, body) = entry.split_once('\x1f').unwrap_or((entry, ""));

                (subject.trim().to_string(), body.trim().to_string())
            })
            .collect())
    }

    /// `core.commentChar`, defaulting to `#`.
    pub fn comment_char(&self) -> anyhow::Result<String> {
        Ok(self
            .config("core.commentChar")?
            .filter(|c| c != "auto")
            .unwrap_or_else(|| "#".to_string()))
    }

    /// Path inside `.git`, e.g. for message files.
    pub fn git_path(&self, name: &str) -> anyhow::Result<PathBuf> {
        let path = PathBuf::from(self.output(&["rev-parse", "--git-path", name])?);

        Ok(match (&self.dir, path.is_relative()) {
            (Some(dir), true) => dir.join(path),
            _ => path,
        })
    }
}
