//! Fakes shared by the unit tests: an in-memory forge, throwaway git
//! repositories and a context wired to both.

use std::{
    cell::RefCell,
    collections::HashMap,
    io::Write,
    path::Path,
    process::Command,
    rc::Rc,
};

use tempfile::TempDir;

use crate::{
    cli::{
        Context,
        config::{ConfigStore, CredentialPrompt, Host},
        forge::{
            CommitStatus, ForgeClient, ForgeConnector, Issue, IssueFilters, IssueState,
            IssueUpdate, NewIssue, NewPullRequest, PrRef, PrRepo, Project, PullRequest,
            PullRequestFilters, Release, Repository, ReviewRequest, StateFilter,
        },
    },
    error::{ForgeError, HubError},
    git::GitRepo,
    settings::Settings,
};

pub const TOKEN: &str = "fake-token";

// =============================================================================
// Fake Forge
// =============================================================================

/// Forge state plus a log of what the code under test asked for.
#[derive(Default)]
pub struct FakeForge {
    pub user: String,
    /// Tokens the forge accepts; empty accepts any.
    pub valid_tokens: Vec<String>,
    pub repositories: Vec<Repository>,
    /// HTTP status every repository lookup fails with, if set.
    pub repository_failure: Option<u16>,
    pub pull_requests: Vec<PullRequest>,
    pub issues: Vec<Issue>,
    /// Keyed by commit SHA; tests fill it once their commits exist.
    pub statuses: RefCell<HashMap<String, CommitStatus>>,
    pub releases: Vec<Release>,

    pub repository_requests: RefCell<Vec<Project>>,
    pub pr_filters: RefCell<Vec<PullRequestFilters>>,
    pub issue_filters: RefCell<Vec<IssueFilters>>,
    pub created_pull_requests: RefCell<Vec<NewPullRequest>>,
    pub created_issues: RefCell<Vec<NewIssue>>,
    pub issue_updates: RefCell<Vec<(u64, IssueUpdate)>>,
    pub review_requests: RefCell<Vec<(u64, ReviewRequest)>>,
    pub forks: RefCell<Vec<(Project, Option<String>)>>,
}

pub struct FakeConnector {
    pub forge: Rc<FakeForge>,
}

impl FakeConnector {
    pub fn new(forge: FakeForge) -> Self {
        Self {
            forge: Rc::new(forge),
        }
    }
}

impl ForgeConnector for FakeConnector {
    fn connect(&self, host: &Host) -> anyhow::Result<Box<dyn ForgeClient>> {
        let authorized = self.forge.valid_tokens.is_empty()
            || host
                .oauth_token
                .as_ref()
                .is_some_and(|token| self.forge.valid_tokens.contains(token));

        Ok(Box::new(FakeClient {
            forge: Rc::clone(&self.forge),
            authorized,
        }))
    }
}

struct FakeClient {
    forge: Rc<FakeForge>,
    authorized: bool,
}

impl FakeClient {
    fn check_auth(&self) -> anyhow::Result<()> {
        if self.authorized {
            return Ok(());
        }

        Err(HubError::Forge(ForgeError {
            status: 401,
            url: "https://api.github.com/user".to_string(),
            message: "Bad credentials".to_string(),
            errors: vec![],
            rate_limit_remaining: None,
        })
        .into())
    }
}

fn matches_state(state: Option<StateFilter>, actual: IssueState) -> bool {
    match state {
        None | Some(StateFilter::Open) => actual == IssueState::Open,
        Some(StateFilter::Closed) => actual == IssueState::Closed,
        Some(StateFilter::All) => true,
    }
}

impl ForgeClient for FakeClient {
    fn current_user(&self) -> anyhow::Result<String> {
        self.check_auth()?;

        Ok(self.forge.user.clone())
    }

    fn repository(&self, project: &Project) -> anyhow::Result<Repository> {
        self.check_auth()?;
        self.forge
            .repository_requests
            .borrow_mut()
            .push(project.clone());

        if let Some(status) = self.forge.repository_failure {
            return Err(HubError::Forge(ForgeError {
                status,
                url: format!("https://api.github.com/repos/{project}"),
                message: "Server Error".to_string(),
                errors: vec![],
                rate_limit_remaining: None,
            })
            .into());
        }

        self.forge
            .repositories
            .iter()
            .find(|repo| &repo.project == project)
            .cloned()
            .ok_or_else(|| HubError::NotFound(format!("repository {project} doesn't exist")).into())
    }

    fn pull_request(&self, project: &Project, number: u64) -> anyhow::Result<PullRequest> {
        self.check_auth()?;

        self.forge
            .pull_requests
            .iter()
            .find(|pr| pr.number == number)
            .cloned()
            .ok_or_else(|| {
                HubError::NotFound(format!("pull request #{number} not found in {project}"))
                    .into()
            })
    }

    fn pull_requests(
        &self,
        _project: &Project,
        filters: &PullRequestFilters,
        limit: Option<usize>,
        keep: Option<&dyn Fn(&PullRequest) -> bool>,
    ) -> anyhow::Result<Vec<PullRequest>> {
        self.check_auth()?;
        self.forge.pr_filters.borrow_mut().push(filters.clone());

        Ok(self
            .forge
            .pull_requests
            .iter()
            .filter(|pr| matches_state(filters.state, pr.state))
            .filter(|pr| filters.head.as_ref().is_none_or(|head| &pr.head.label == head))
            .filter(|pr| filters.base.as_ref().is_none_or(|base| &pr.base.ref_name == base))
            .filter(|pr| keep.is_none_or(|keep| keep(pr)))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn create_pull_request(
        &self,
        project: &Project,
        options: &NewPullRequest,
    ) -> anyhow::Result<PullRequest> {
        self.check_auth()?;

        let mut created = self.forge.created_pull_requests.borrow_mut();
        created.push(options.clone());
        let number = 100 + created.len() as u64;

        Ok(PullRequest {
            number,
            title: options.title.clone(),
            body: options.body.clone(),
            url: project.web_url(&format!("pull/{number}")),
            ..Default::default()
        })
    }

    fn update_issue(
        &self,
        _project: &Project,
        number: u64,
        update: &IssueUpdate,
    ) -> anyhow::Result<()> {
        self.check_auth()?;
        self.forge
            .issue_updates
            .borrow_mut()
            .push((number, update.clone()));

        Ok(())
    }

    fn request_reviewers(
        &self,
        _project: &Project,
        number: u64,
        request: &ReviewRequest,
    ) -> anyhow::Result<()> {
        self.check_auth()?;
        self.forge
            .review_requests
            .borrow_mut()
            .push((number, request.clone()));

        Ok(())
    }

    fn issues(
        &self,
        _project: &Project,
        filters: &IssueFilters,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Issue>> {
        self.check_auth()?;
        self.forge.issue_filters.borrow_mut().push(filters.clone());

        Ok(self
            .forge
            .issues
            .iter()
            .filter(|issue| !issue.is_pull_request)
            .filter(|issue| matches_state(filters.state, issue.state))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn issue(&self, project: &Project, number: u64) -> anyhow::Result<Issue> {
        self.check_auth()?;

        self.forge
            .issues
            .iter()
            .find(|issue| issue.number == number)
            .cloned()
            .ok_or_else(|| {
                HubError::NotFound(format!("issue #{number} not found in {project}")).into()
            })
    }

    fn create_issue(&self, project: &Project, options: &NewIssue) -> anyhow::Result<Issue> {
        self.check_auth()?;

        let mut created = self.forge.created_issues.borrow_mut();
        created.push(options.clone());
        let number = 200 + created.len() as u64;

        Ok(Issue {
            number,
            title: options.title.clone(),
            body: options.body.clone(),
            url: project.web_url(&format!("issues/{number}")),
            ..Default::default()
        })
    }

    fn fork(&self, project: &Project, organization: Option<&str>) -> anyhow::Result<Repository> {
        self.check_auth()?;
        self.forge
            .forks
            .borrow_mut()
            .push((project.clone(), organization.map(str::to_string)));

        let owner = organization.unwrap_or(&self.forge.user);

        Ok(Repository {
            parent: Some(project.clone()),
            can_push: true,
            ..repository(project.with_owner(owner))
        })
    }

    fn commit_status(&self, _project: &Project, sha: &str) -> anyhow::Result<CommitStatus> {
        self.check_auth()?;

        Ok(self
            .forge
            .statuses
            .borrow()
            .get(sha)
            .cloned()
            .unwrap_or_else(|| CommitStatus {
                state: "pending".to_string(),
                statuses: vec![],
            }))
    }

    fn releases(&self, _project: &Project, limit: Option<usize>) -> anyhow::Result<Vec<Release>> {
        self.check_auth()?;

        Ok(self
            .forge
            .releases
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn release(&self, _project: &Project, tag: &str) -> anyhow::Result<Release> {
        self.check_auth()?;

        self.forge
            .releases
            .iter()
            .find(|release| release.tag_name == tag)
            .cloned()
            .ok_or_else(|| {
                HubError::NotFound(format!("Unable to find release with tag name `{tag}'")).into()
            })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A public repository the user can't push to.
pub fn repository(project: Project) -> Repository {
    Repository {
        project,
        private: false,
        can_push: false,
        has_wiki: true,
        default_branch: "main".to_string(),
        parent: None,
    }
}

/// An open pull request from `head_owner:head_ref` into `main` of
/// `base`.
pub fn pull_request(number: u64, base: &Project, head_owner: &str, head_ref: &str) -> PullRequest {
    let head_project = base.with_owner(head_owner);

    PullRequest {
        number,
        title: format!("PR {number}"),
        url: base.web_url(&format!("pull/{number}")),
        head: PrRef {
            label: format!("{head_owner}:{head_ref}"),
            ref_name: head_ref.to_string(),
            sha: format!("{number:040}"),
            repo: Some(PrRepo {
                project: head_project,
                private: false,
                default_branch: "main".to_string(),
            }),
        },
        base: PrRef {
            label: format!("{}:main", base.owner),
            ref_name: "main".to_string(),
            sha: "b".repeat(40),
            repo: Some(PrRepo {
                project: base.clone(),
                private: false,
                default_branch: "main".to_string(),
            }),
        },
        ..Default::default()
    }
}

// =============================================================================
// Git Repositories
// =============================================================================

/// Runs git in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");

    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// An empty repository on branch `main` in a fresh temporary directory.
pub fn init_repo() -> (TempDir, GitRepo) {
    let dir = TempDir::new().expect("failed to create temp dir");

    git(dir.path(), &["init", "-q"]);
    git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(dir.path(), &["config", "user.name", "Hub Test"]);
    git(dir.path(), &["config", "user.email", "hub@example.com"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);

    let repo = GitRepo::new(Some(dir.path().to_path_buf()));

    (dir, repo)
}

// =============================================================================
// Context
// =============================================================================

/// Output sink that tests can read back.
#[derive(Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct NoPrompt;

impl CredentialPrompt for NoPrompt {
    fn credentials(&self, _host: &str) -> anyhow::Result<(String, String)> {
        Err(HubError::Interrupted.into())
    }
}

/// A context on a temporary repository, logged in to github.com as the
/// fake forge's user.
pub struct Harness {
    pub repo_dir: TempDir,
    pub forge: Rc<FakeForge>,
    pub output: SharedOutput,
    pub ctx: Context,
    _config_dir: TempDir,
}

impl Harness {
    pub fn new(forge: FakeForge) -> Self {
        Self::with_settings(forge, Settings::default())
    }

    pub fn with_settings(forge: FakeForge, settings: Settings) -> Self {
        let (repo_dir, repo) = init_repo();
        let config_dir = TempDir::new().expect("failed to create temp dir");
        let mut store = ConfigStore::load_path(config_dir.path().join("hub.toml"))
            .expect("failed to load config");
        store.upsert_host(Host {
            user: forge.user.clone(),
            oauth_token: Some(TOKEN.to_string()),
            ..Host::new("github.com")
        });

        let connector = FakeConnector::new(forge);
        let forge = Rc::clone(&connector.forge);
        let output = SharedOutput::default();
        let ctx = Context::new(settings, repo)
            .with_config(store)
            .with_forge(Box::new(connector), Box::new(NoPrompt))
            .with_output(Box::new(output.clone()));

        Harness {
            repo_dir,
            forge,
            output,
            ctx,
            _config_dir: config_dir,
        }
    }

    pub fn git(&self, args: &[&str]) -> String {
        git(self.repo_dir.path(), args)
    }

    /// Adds `origin` pointing at `owner/name` on github.com.
    pub fn with_origin(self, owner: &str, name: &str) -> Self {
        self.git(&[
            "remote",
            "add",
            "origin",
            &format!("git@github.com:{owner}/{name}.git"),
        ]);

        self
    }
}
