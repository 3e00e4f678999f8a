use serde::Serialize;

use crate::cli::{
    config::Host,
    forge::{
        project::Project,
        types::{CommitStatus, Issue, PullRequest, Release, Repository},
    },
};

/// Operations hub needs from the forge.
///
/// One client is bound to one host and one credential for the lifetime of a
/// subcommand.
pub trait ForgeClient {
    /// Login of the authenticated user.
    fn current_user(&self) -> anyhow::Result<String>;

    fn repository(&self, project: &Project) -> anyhow::Result<Repository>;

    fn pull_request(&self, project: &Project, number: u64) -> anyhow::Result<PullRequest>;

    /// Fetches pull requests page by page until `limit` of them satisfy
    /// `keep`, or the forge runs out of pages. `None` keeps everything.
    fn pull_requests(
        &self,
        project: &Project,
        filters: &PullRequestFilters,
        limit: Option<usize>,
        keep: Option<&dyn Fn(&PullRequest) -> bool>,
    ) -> anyhow::Result<Vec<PullRequest>>;

    fn create_pull_request(
        &self,
        project: &Project,
        options: &NewPullRequest,
    ) -> anyhow::Result<PullRequest>;

    /// Updates labels, assignees or milestone of an issue or pull request.
    fn update_issue(
        &self,
        project: &Project,
        number: u64,
        update: &IssueUpdate,
    ) -> anyhow::Result<()>;

    fn request_reviewers(
        &self,
        project: &Project,
        number: u64,
        request: &ReviewRequest,
    ) -> anyhow::Result<()>;

    /// Issues only; pull requests returned by the issues endpoint are skipped.
    fn issues(
        &self,
        project: &Project,
        filters: &IssueFilters,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Issue>>;

    fn issue(&self, project: &Project, number: u64) -> anyhow::Result<Issue>;

    fn create_issue(&self, project: &Project, options: &NewIssue) -> anyhow::Result<Issue>;

    /// Forks `project` into the authenticated user's account or into
    /// `organization`.
    fn fork(&self, project: &Project, organization: Option<&str>) -> anyhow::Result<Repository>;

    fn commit_status(&self, project: &Project, sha: &str) -> anyhow::Result<CommitStatus>;

    fn releases(&self, project: &Project, limit: Option<usize>) -> anyhow::Result<Vec<Release>>;

    fn release(&self, project: &Project, tag: &str) -> anyhow::Result<Release>;
}

/// Creates forge clients for configured hosts.
pub trait ForgeConnector {
    fn connect(&self, host: &Host) -> anyhow::Result<Box<dyn ForgeClient>>;
}

// =============================================================================
// Request Options
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    Open,
    Closed,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    Created,
    Updated,
    Popularity,
    LongRunning,
    Comments,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// Query parameters of the pull request listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PullRequestFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateFilter>,
    /// `owner:branch`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

/// Query parameters of the issue listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IssueFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentioned: Option<String>,
    /// Comma-separated label names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    /// ISO 8601 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
    pub draft: bool,
    pub maintainer_can_modify: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self == &IssueUpdate::default()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ReviewRequest {
    pub reviewers: Vec<String>,
    pub team_reviewers: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}
