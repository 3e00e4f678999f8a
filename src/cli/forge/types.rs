//! Snapshots returned by the forge client.

use std::fmt::Display;

use chrono::{DateTime, Utc};

use crate::cli::forge::project::Project;

/// Repository metadata, fetched fresh per invocation.
#[derive(Clone, Debug)]
pub struct Repository {
    pub project: Project,
    pub private: bool,
    pub can_push: bool,
    pub has_wiki: bool,
    pub default_branch: String,
    /// The repository this one was forked from.
    pub parent: Option<Project>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct User {
    pub login: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Label {
    pub name: String,
    /// Hex RGB without the leading `#`.
    pub color: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
}

/// Coarse state as the forge reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IssueState {
    #[default]
    Open,
    Closed,
}

impl Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueState::Open => write!(f, "open"),
            IssueState::Closed => write!(f, "closed"),
        }
    }
}

/// Fine-grained pull request state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrState {
    Open,
    Draft,
    Merged,
    Closed,
}

impl Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Draft => write!(f, "draft"),
            PrState::Merged => write!(f, "merged"),
            PrState::Closed => write!(f, "closed"),
        }
    }
}

/// One side (head or base) of a pull request.
#[derive(Clone, Debug, Default)]
pub struct PrRef {
    /// `owner:branch`
    pub label: String,
    pub ref_name: String,
    pub sha: String,
    /// Missing when the head repository was deleted.
    pub repo: Option<PrRepo>,
}

/// The repository a pull request side lives in.
#[derive(Clone, Debug)]
pub struct PrRepo {
    pub project: Project,
    pub private: bool,
    pub default_branch: String,
}

#[derive(Clone, Debug, Default)]
pub struct PullRequest {
    pub number: u64,
    pub state: IssueState,
    pub draft: bool,
    pub title: String,
    pub body: String,
    pub url: String,
    pub head: PrRef,
    pub base: PrRef,
    pub author: User,
    pub assignees: Vec<User>,
    pub requested_reviewers: Vec<User>,
    /// Team slugs, rendered as `org/slug`.
    pub requested_teams: Vec<String>,
    pub labels: Vec<Label>,
    pub milestone: Option<Milestone>,
    pub comments: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merge_commit_sha: String,
    pub maintainer_can_modify: bool,
}

impl PullRequest {
    pub fn fine_state(&self) -> PrState {
        match self.state {
            IssueState::Open if self.draft => PrState::Draft,
            IssueState::Open => PrState::Open,
            IssueState::Closed if self.merged_at.is_some() => PrState::Merged,
            IssueState::Closed => PrState::Closed,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    /// Whether head and base live in the same repository.
    pub fn is_same_repo(&self) -> bool {
        match (&self.head.repo, &self.base.repo) {
            (Some(head), Some(base)) => head.project == base.project,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Issue {
    pub number: u64,
    pub state: IssueState,
    pub title: String,
    pub body: String,
    pub url: String,
    pub author: User,
    pub assignees: Vec<User>,
    pub labels: Vec<Label>,
    pub milestone: Option<Milestone>,
    pub comments: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Issues endpoints return pull requests too.
    pub is_pull_request: bool,
}

/// Combined status of a commit.
#[derive(Clone, Debug, Default)]
pub struct CommitStatus {
    /// `success`, `failure`, `error` or `pending`
    pub state: String,
    pub statuses: Vec<StatusEntry>,
}

#[derive(Clone, Debug, Default)]
pub struct StatusEntry {
    pub state: String,
    pub context: String,
    pub target_url: String,
}

#[derive(Clone, Debug, Default)]
pub struct Release {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub url: String,
    pub draft: bool,
    pub prerelease: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}
