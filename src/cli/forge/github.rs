use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::{
    cli::{
        config::Host,
        forge::{
            forge_client::{
                ForgeClient, ForgeConnector, IssueFilters, IssueUpdate, NewIssue, NewPullRequest,
                PullRequestFilters, ReviewRequest,
            },
            http_client::{Auth, HttpClient},
            project::Project,
            types::{
                CommitStatus, Issue, IssueState, Label, Milestone, PrRef, PrRepo, PullRequest,
                Release, Repository, StatusEntry, User,
            },
        },
    },
    error::{HubError, forge_error},
    settings::DEFAULT_HOST,
};

const MAX_PER_PAGE: u32 = 100;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

impl From<GitHubUser> for User {
    fn from(user: GitHubUser) -> Self {
        User { login: user.login }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GitHubPermissions {
    #[serde(default)]
    push: bool,
}

/// https://docs.github.com/en/rest/repos/repos
#[derive(Debug, Deserialize)]
struct GitHubRepository {
    name: String,
    owner: GitHubUser,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    permissions: Option<GitHubPermissions>,
    #[serde(default)]
    has_wiki: bool,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    parent: Option<Box<GitHubRepository>>,
}

impl GitHubRepository {
    fn into_repository(self, host: &str) -> Repository {
        Repository {
            project: Project::new(&self.owner.login, &self.name, host),
            private: self.private,
            can_push: self.permissions.unwrap_or_default().push,
            has_wiki: self.has_wiki,
            default_branch: self.default_branch,
            parent: self
                .parent
                .map(|parent| Project::new(&parent.owner.login, &parent.name, host)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
    #[serde(default)]
    color: String,
}

impl From<GitHubLabel> for Label {
    fn from(label: GitHubLabel) -> Self {
        Label {
            name: label.name,
            color: label.color,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubMilestone {
    number: u64,
    title: String,
}

impl From<GitHubMilestone> for Milestone {
    fn from(milestone: GitHubMilestone) -> Self {
        Milestone {
            number: milestone.number,
            title: milestone.title,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubTeam {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPrRef {
    #[serde(default)]
    label: String,
    #[serde(rename = "ref")]
    ref_name: String,
    #[serde(default)]
    sha: String,
    repo: Option<GitHubRepository>,
}

impl GitHubPrRef {
    fn into_pr_ref(self, host: &str) -> PrRef {
        PrRef {
            label: self.label,
            ref_name: self.ref_name,
            sha: self.sha,
            repo: self.repo.map(|repo| PrRepo {
                project: Project::new(&repo.owner.login, &repo.name, host),
                private: repo.private,
                default_branch: repo.default_branch,
            }),
        }
    }
}

/// https://docs.github.com/en/rest/pulls/pulls
#[derive(Debug, Deserialize)]
struct GitHubPullRequest {
    number: u64,
    state: String,
    #[serde(default)]
    draft: Option<bool>,
    title: String,
    #[serde(default)]
    body: Option<String>,
    html_url: String,
    head: GitHubPrRef,
    base: GitHubPrRef,
    user: GitHubUser,
    #[serde(default)]
    assignees: Vec<GitHubUser>,
    #[serde(default)]
    requested_reviewers: Vec<GitHubUser>,
    #[serde(default)]
    requested_teams: Vec<GitHubTeam>,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    #[serde(default)]
    milestone: Option<GitHubMilestone>,
    #[serde(default)]
    comments: Option<u64>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    merge_commit_sha: Option<String>,
    #[serde(default)]
    maintainer_can_modify: Option<bool>,
}

impl GitHubPullRequest {
    fn into_pull_request(self, host: &str) -> PullRequest {
        PullRequest {
            number: self.number,
            state: parse_state(&self.state),
            draft: self.draft.unwrap_or(false),
            title: self.title,
            body: self.body.unwrap_or_default(),
            url: self.html_url,
            head: self.head.into_pr_ref(host),
            base: self.base.into_pr_ref(host),
            author: self.user.into(),
            assignees: self.assignees.into_iter().map(Into::into).collect(),
            requested_reviewers: self.requested_reviewers.into_iter().map(Into::into).collect(),
            requested_teams: self.requested_teams.into_iter().map(|t| t.slug).collect(),
            labels: self.labels.into_iter().map(Into::into).collect(),
            milestone: self.milestone.map(Into::into),
            comments: self.comments.unwrap_or(0),
            created_at: self.created_at,
            updated_at: self.updated_at,
            merged_at: self.merged_at,
            merge_commit_sha: self.merge_commit_sha.unwrap_or_default(),
            maintainer_can_modify: self.maintainer_can_modify.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubIssuePrField {}

/// https://docs.github.com/en/rest/issues/issues
#[derive(Debug, Deserialize)]
struct GitHubIssue {
    number: u64,
    state: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    html_url: String,
    user: GitHubUser,
    #[serde(default)]
    assignees: Vec<GitHubUser>,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    #[serde(default)]
    milestone: Option<GitHubMilestone>,
    #[serde(default)]
    comments: u64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    pull_request: Option<GitHubIssuePrField>,
}

impl From<GitHubIssue> for Issue {
    fn from(issue: GitHubIssue) -> Self {
        Issue {
            number: issue.number,
            state: parse_state(&issue.state),
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            url: issue.html_url,
            author: issue.user.into(),
            assignees: issue.assignees.into_iter().map(Into::into).collect(),
            labels: issue.labels.into_iter().map(Into::into).collect(),
            milestone: issue.milestone.map(Into::into),
            comments: issue.comments,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            is_pull_request: issue.pull_request.is_some(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubStatus {
    state: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    target_url: Option<String>,
}

/// https://docs.github.com/en/rest/commits/statuses
#[derive(Debug, Deserialize)]
struct GitHubCombinedStatus {
    state: String,
    #[serde(default)]
    statuses: Vec<GitHubStatus>,
}

impl From<GitHubCombinedStatus> for CommitStatus {
    fn from(status: GitHubCombinedStatus) -> Self {
        CommitStatus {
            state: status.state,
            statuses: status
                .statuses
                .into_iter()
                .map(|s| StatusEntry {
                    state: s.state,
                    context: s.context,
                    target_url: s.target_url.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// https://docs.github.com/en/rest/releases/releases
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    html_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    created_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
}

impl From<GitHubRelease> for Release {
    fn from(release: GitHubRelease) -> Self {
        Release {
            tag_name: release.tag_name,
            name: release.name.unwrap_or_default(),
            body: release.body.unwrap_or_default(),
            url: release.html_url,
            draft: release.draft,
            prerelease: release.prerelease,
            created_at: release.created_at,
            published_at: release.published_at,
        }
    }
}

#[derive(Serialize)]
struct ForkRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a str>,
}

fn parse_state(state: &str) -> IssueState {
    match state {
        "closed" => IssueState::Closed,
        _ => IssueState::Open,
    }
}

// =============================================================================
// Client
// =============================================================================

/// [`ForgeClient`] backed by the GitHub REST API.
pub struct GitHubClient {
    http_client: HttpClient,
    host: String,
}

impl GitHubClient {
    pub fn new(host: &Host) -> anyhow::Result<Self> {
        if host.unix_socket.is_some() {
            tracing::warn!(
                "Connecting through unix_socket is not supported; using {} directly",
                host.host
            );
        }

        let auth = match (&host.oauth_token, &host.password) {
            (Some(token), _) => Auth::Token(token.clone()),
            (None, Some(password)) => Auth::Basic {
                user: host.user.clone(),
                password: password.clone(),
            },
            (None, None) => Auth::None,
        };

        Ok(Self {
            http_client: HttpClient::new(&api_base_url(host), auth)?,
            host: host.host.clone(),
        })
    }

    fn repo_path(project: &Project) -> String {
        format!("repos/{}/{}", project.owner, project.name)
    }

    fn not_found(&self, err: anyhow::Error, what: impl FnOnce() -> String) -> anyhow::Error {
        if forge_error(&err).is_some_and(|e| e.is_not_found()) {
            HubError::NotFound(what()).into()
        } else {
            err
        }
    }
}

pub fn api_base_url(host: &Host) -> String {
    if let Some(api_url) = &host.api_url {
        return api_url.clone();
    }

    if host.host == DEFAULT_HOST {
        "https://api.github.com".to_string()
    } else {
        format!("https://{}/api/v3", host.host)
    }
}

impl ForgeClient for GitHubClient {
    fn current_user(&self) -> anyhow::Result<String> {
        let user: GitHubUser = self.http_client.get("user")?;

        Ok(user.login)
    }

    fn repository(&self, project: &Project) -> anyhow::Result<Repository> {
        let repo: GitHubRepository = self
            .http_client
            .get(&Self::repo_path(project))
            .map_err(|e| {
                self.not_found(e, || format!("repository {project} doesn't exist"))
            })?;

        Ok(repo.into_repository(&self.host))
    }

    fn pull_request(&self, project: &Project, number: u64) -> anyhow::Result<PullRequest> {
        let pr: GitHubPullRequest = self
            .http_client
            .get(&format!("{}/pulls/{number}", Self::repo_path(project)))
            .map_err(|e| {
                self.not_found(e, || format!("pull request #{number} not found in {project}"))
            })?;

        Ok(pr.into_pull_request(&self.host))
    }

    fn pull_requests(
        &self,
        project: &Project,
        filters: &PullRequestFilters,
        limit: Option<usize>,
        keep: Option<&dyn Fn(&PullRequest) -> bool>,
    ) -> anyhow::Result<Vec<PullRequest>> {
        let pages = self.http_client.paginate::<GitHubPullRequest, _>(
            &format!("{}/pulls", Self::repo_path(project)),
            filters,
            per_page(limit, keep.is_some()),
        );
        let prs = pages.map(|pr| pr.map(|pr| pr.into_pull_request(&self.host)));

        collect_limited(prs, limit, |pr| keep.is_none_or(|keep| keep(pr)))
            .with_context(|| format!("Failed to list pull requests of {project}"))
    }

    fn create_pull_request(
        &self,
        project: &Project,
        options: &NewPullRequest,
    ) -> anyhow::Result<PullRequest> {
        let pr: GitHubPullRequest = self
            .http_client
            .post(&format!("{}/pulls", Self::repo_path(project)), options)
            .context("Error creating pull request")?;

        Ok(pr.into_pull_request(&self.host))
    }

    fn update_issue(
        &self,
        project: &Project,
        number: u64,
        update: &IssueUpdate,
    ) -> anyhow::Result<()> {
        self.http_client
            .send_json(
                Method::PATCH,
                &format!("{}/issues/{number}", Self::repo_path(project)),
                update,
            )
            .with_context(|| format!("Error updating #{number}"))?;

        Ok(())
    }

    fn request_reviewers(
        &self,
        project: &Project,
        number: u64,
        request: &ReviewRequest,
    ) -> anyhow::Result<()> {
        self.http_client
            .send_json(
                Method::POST,
                &format!(
                    "{}/pulls/{number}/requested_reviewers",
                    Self::repo_path(project)
                ),
                request,
            )
            .with_context(|| format!("Error requesting reviewers for #{number}"))?;

        Ok(())
    }

    fn issues(
        &self,
        project: &Project,
        filters: &IssueFilters,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Issue>> {
        // The endpoint mixes in pull requests, so pages are always filtered.
        let pages = self.http_client.paginate::<GitHubIssue, _>(
            &format!("{}/issues", Self::repo_path(project)),
            filters,
            MAX_PER_PAGE,
        );

        collect_limited(pages.map(|i| i.map(Issue::from)), limit, |issue| {
            !issue.is_pull_request
        })
        .with_context(|| format!("Failed to list issues of {project}"))
    }

    fn issue(&self, project: &Project, number: u64) -> anyhow::Result<Issue> {
        let issue: GitHubIssue = self
            .http_client
            .get(&format!("{}/issues/{number}", Self::repo_path(project)))
            .map_err(|e| self.not_found(e, || format!("issue #{number} not found in {project}")))?;

        Ok(issue.into())
    }

    fn create_issue(&self, project: &Project, options: &NewIssue) -> anyhow::Result<Issue> {
        let issue: GitHubIssue = self
            .http_client
            .post(&format!("{}/issues", Self::repo_path(project)), options)
            .context("Error creating issue")?;

        Ok(issue.into())
    }

    fn fork(&self, project: &Project, organization: Option<&str>) -> anyhow::Result<Repository> {
        let repo: GitHubRepository = self
            .http_client
            .post(
                &format!("{}/forks", Self::repo_path(project)),
                &ForkRequest { organization },
            )
            .with_context(|| format!("Error creating fork of {project}"))?;

        Ok(repo.into_repository(&self.host))
    }

    fn commit_status(&self, project: &Project, sha: &str) -> anyhow::Result<CommitStatus> {
        let status: GitHubCombinedStatus = self
            .http_client
            .get(&format!("{}/commits/{sha}/status", Self::repo_path(project)))
            .with_context(|| format!("Failed to fetch status of {sha}"))?;

        Ok(status.into())
    }

    fn releases(&self, project: &Project, limit: Option<usize>) -> anyhow::Result<Vec<Release>> {
        let pages = self.http_client.paginate::<GitHubRelease, _>(
            &format!("{}/releases", Self::repo_path(project)),
            &(),
            per_page(limit, false),
        );

        collect_limited(pages.map(|r| r.map(Release::from)), limit, |_| true)
            .with_context(|| format!("Failed to list releases of {project}"))
    }

    fn release(&self, project: &Project, tag: &str) -> anyhow::Result<Release> {
        let release: GitHubRelease = self
            .http_client
            .get(&format!(
                "{}/releases/tags/{}",
                Self::repo_path(project),
                path_segment(tag)
            ))
            .map_err(|e| self.not_found(e, || format!("Unable to find release with tag name `{tag}'")))?;

        Ok(release.into())
    }
}

/// Percent-encodes `value` for use as a single URL path segment.
fn path_segment(value: &str) -> String {
    // `+` itself is encoded as `%2B`, so the remaining ones stand for spaces.
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Page size: a limit smaller than a page only helps when nothing gets
/// filtered out client-side.
fn per_page(limit: Option<usize>, filtered: bool) -> u32 {
    match limit {
        Some(limit) if !filtered && limit < MAX_PER_PAGE as usize => limit.max(1) as u32,
        _ => MAX_PER_PAGE,
    }
}

/// Keeps the items matching `keep` until `limit` of them were collected.
fn collect_limited<T>(
    items: impl Iterator<Item = anyhow::Result<T>>,
    limit: Option<usize>,
    keep: impl Fn(&T) -> bool,
) -> anyhow::Result<Vec<T>> {
    items
        .filter(|item| item.as_ref().map_or(true, &keep))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Connects to GitHub.com or a GitHub Enterprise host.
pub struct GitHubConnector;

impl ForgeConnector for GitHubConnector {
    fn connect(&self, host: &Host) -> anyhow::Result<Box<dyn ForgeClient>> {
        Ok(Box::new(GitHubClient::new(host)?))
    }
}
