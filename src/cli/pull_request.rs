//! `pull-request`: open a pull request for the current branch.

use std::{
    fs,
    io::{Read, Write},
    path::Path,
};

use anyhow::Context as _;
use clap::{ArgAction, Parser};

use crate::{
    cli::{
        Context,
        args::Args,
        flags::HelpFlag,
        forge::{IssueUpdate, NewPullRequest, Project, ReviewRequest},
        pr::{deduce_push_target, find_push_target},
    },
    error::HubError,
    io::{Message, UrlAction, edit_message, present_url},
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Create a GitHub pull request.
#[derive(Parser)]
#[command(name = "hub pull-request", disable_help_flag = true)]
pub struct PullRequestFlags {
    /// Base branch, as `[<owner>:]<branch>`
    #[arg(short, long)]
    base: Option<String>,

    /// Head branch, as `[<owner>:]<branch>`
    #[arg(short = 'h', long)]
    head: Option<String>,

    /// Message paragraphs; the first is the title
    #[arg(short, long, action = ArgAction::Append)]
    message: Vec<String>,

    /// Read the message from a file (`-` for standard input)
    #[arg(short = 'F', long)]
    file: Option<String>,

    /// Use the commit message without opening an editor
    #[arg(long)]
    no_edit: bool,

    /// Create the pull request as a draft
    #[arg(short, long)]
    draft: bool,

    /// Push the current branch to the head before creating the pull request
    #[arg(short, long)]
    push: bool,

    /// Open the new pull request in a web browser
    #[arg(short = 'o', long)]
    browse: bool,

    /// Copy the new pull request's URL to the clipboard
    #[arg(short, long)]
    copy: bool,

    /// Comma-separated labels
    #[arg(short, long, action = ArgAction::Append)]
    labels: Vec<String>,

    /// Comma-separated assignee logins
    #[arg(short, long = "assign", action = ArgAction::Append)]
    assign: Vec<String>,

    /// Comma-separated reviewers; `<org>/<team>` requests a team
    #[arg(short, long, action = ArgAction::Append)]
    reviewer: Vec<String>,

    /// Milestone number
    #[arg(short = 'M', long)]
    milestone: Option<u64>,

    /// Don't let maintainers of the base repository push to the head branch
    #[arg(long)]
    no_maintainer_edits: bool,

    #[command(flatten)]
    help: HelpFlag,
}

/// One side of the new pull request.
#[derive(Debug)]
struct Side {
    project: Project,
    branch: String,
}

impl Side {
    /// `owner:branch`, or only the branch within `project`.
    fn label_for(&self, project: &Project) -> String {
        if self.project == *project {
            self.branch.clone()
        } else {
            format!("{}:{}", self.project.owner, self.branch)
        }
    }
}

// =============================================================================
// Command Logic
// =============================================================================

pub fn pull_request(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: PullRequestFlags = args.flag.typed()?;
    args.no_forward();

    let main_project = ctx.main_project()?;
    let base = resolve_base(ctx, &main_project, flags.base.as_deref())?;
    let head = resolve_head(ctx, &main_project, flags.head.as_deref())?;
    let head_label = head.label_for(&base.project);

    if head.project == base.project && head.branch == base.branch {
        return Err(HubError::user_input(format!(
            "Aborted: head branch is the same as base (\"{}\")",
            base.branch
        ))
        .into());
    }

    let base_label = format!("{}:{}", base.project.owner, base.branch);

    if args.noop {
        writeln!(
            ctx.out(),
            "Would request a pull request to {base_label} from {head_label}"
        )?;
        return Ok(());
    }

    if flags.push {
        push_head(ctx, &head)?;
    }

    let message = compose_message(ctx, &flags, &base, &base_label, &head_label)?;
    let options = NewPullRequest {
        title: message.title,
        body: message.body,
        head: head_label,
        base: base.branch.clone(),
        draft: flags.draft,
        maintainer_can_modify: !flags.no_maintainer_edits,
    };

    let client = ctx.client(&base.project.host)?;
    let pr = client
        .create_pull_request(&base.project, &options)
        .context("Error creating pull request")?;

    tracing::debug!("Created pull request #{}", pr.number);

    let update = IssueUpdate {
        labels: non_empty(split_values(&flags.labels)),
        assignees: non_empty(split_values(&flags.assign)),
        milestone: flags.milestone,
    };

    if !update.is_empty() {
        client.update_issue(&base.project, pr.number, &update)?;
    }

    let request = review_request(&flags.reviewer);

    if !(request.reviewers.is_empty() && request.team_reviewers.is_empty()) {
        client.request_reviewers(&base.project, pr.number, &request)?;
    }

    let action = if flags.copy {
        UrlAction::Copy
    } else if flags.browse {
        UrlAction::Open
    } else {
        UrlAction::Print
    };
    let browser = ctx.settings.browser.clone();

    present_url(&pr.url, action, browser.as_deref(), ctx.out())
}

// =============================================================================
// Private Helpers
// =============================================================================

fn split_owner(value: &str, project: &Project) -> (Project, String) {
    match value.split_once(':') {
        Some((owner, branch)) => (project.with_owner(owner), branch.to_string()),
        None => (project.clone(), value.to_string()),
    }
}

fn resolve_base(
    ctx: &mut Context,
    main_project: &Project,
    flag: Option<&str>,
) -> anyhow::Result<Side> {
    if let Some(value) = flag {
        let (project, branch) = split_owner(value, main_project);
        return Ok(Side { project, branch });
    }

    let client = ctx.client(&main_project.host)?;
    let repo = client.repository(main_project)?;

    Ok(Side {
        project: main_project.clone(),
        branch: repo.default_branch,
    })
}

fn resolve_head(
    ctx: &mut Context,
    main_project: &Project,
    flag: Option<&str>,
) -> anyhow::Result<Side> {
    if let Some(value) = flag {
        let (project, branch) = split_owner(value, main_project);
        return Ok(Side { project, branch });
    }

    let branch = ctx.repo.current_branch()?;

    if let Some((head_branch, project)) = find_push_target(ctx, &branch)? {
        return Ok(Side {
            project,
            branch: head_branch.short_name().to_string(),
        });
    }

    let user = ctx.current_user(&main_project.host)?;
    let project = deduce_push_target(ctx, &branch, &user)?.unwrap_or_else(|| main_project.clone());

    Ok(Side {
        project,
        branch: branch.short_name().to_string(),
    })
}

/// `git push --set-upstream <remote> HEAD:<branch>` to the head's remote.
fn push_head(ctx: &mut Context, head: &Side) -> anyhow::Result<()> {
    let known_hosts = ctx.known_hosts()?;
    let remote = ctx
        .repo
        .remote_for_project(&head.project, &known_hosts)?
        .ok_or_else(|| {
            HubError::NotFound(format!("could not find a git remote for '{}'", head.project))
        })?;
    let refspec = format!("HEAD:{}", head.branch);

    ctx.repo
        .spawn(&["push", "--set-upstream", &remote.name, &refspec])
}

fn compose_message(
    ctx: &mut Context,
    flags: &PullRequestFlags,
    base: &Side,
    base_label: &str,
    head_label: &str,
) -> anyhow::Result<Message> {
    if let Some(message) = message_from_flags(&flags.message, flags.file.as_deref())? {
        return require_title(message);
    }

    let commits = commits_since_base(ctx, base)?;
    let initial = match commits.as_slice() {
        [(subject, body)] if body.is_empty() => subject.clone(),
        [(subject, body)] => format!("{subject}\n\n{body}"),
        _ => String::new(),
    };

    if flags.no_edit {
        return require_title(Message::parse(&initial));
    }

    let mut help = format!(
        "Requesting a pull request to {base_label} from {head_label}\n\n\
         Write a message for this pull request. The first block\n\
         of text is the title and the rest is the description."
    );

    if !commits.is_empty() {
        help.push_str("\n\nChanges:\n");

        for (subject, _) in &commits {
            help.push_str(&format!("\n  {subject}"));
        }
    }

    let comment_char = ctx.repo.comment_char()?;

    edit_message(ctx.settings.editor.as_deref(), &initial, &help, &comment_char)
}

/// Commits on HEAD that the base branch doesn't have, oldest first. Empty
/// when the base was never fetched.
fn commits_since_base(ctx: &mut Context, base: &Side) -> anyhow::Result<Vec<(String, String)>> {
    let known_hosts = ctx.known_hosts()?;
    let Some(remote) = ctx.repo.remote_for_project(&base.project, &known_hosts)? else {
        return Ok(Vec::new());
    };
    let base_ref = format!("refs/remotes/{}/{}", remote.name, base.branch);

    if !ctx.repo.ref_exists(&base_ref)? || !ctx.repo.ref_exists("HEAD")? {
        return Ok(Vec::new());
    }

    ctx.repo.commit_messages(&format!("{base_ref}..HEAD"))
}

/// The message given through `-m` (paragraphs joined by blank lines) or
/// `-F`, if any. Shared with `issue create`.
pub fn message_from_flags(
    messages: &[String],
    file: Option<&str>,
) -> anyhow::Result<Option<Message>> {
    if !messages.is_empty() {
        return Ok(Some(Message::parse(&messages.join("\n\n"))));
    }

    let Some(file) = file else {
        return Ok(None);
    };

    let text = if file == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read message from standard input")?;
        text
    } else {
        fs::read_to_string(Path::new(file))
            .with_context(|| format!("Failed to read message file {file}"))?
    };

    Ok(Some(Message::parse(&text)))
}

fn require_title(message: Message) -> anyhow::Result<Message> {
    if message.title.is_empty() {
        return Err(HubError::user_input("Aborting due to empty pull request title").into());
    }

    Ok(message)
}

/// Flattens repeated, comma-separated flag values.
pub fn split_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

/// Splits reviewers into users and team slugs (`org/team`).
fn review_request(values: &[String]) -> ReviewRequest {
    let mut request = ReviewRequest::default();

    for value in split_values(values) {
        match value.split_once('/') {
            Some((_, team)) => request.team_reviewers.push(team.to_string()),
            None => request.reviewers.push(value),
        }
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{
        lookup,
        runner::dispatch,
        test_support::{FakeForge, Harness, repository},
    };

    fn base() -> Project {
        Project::new("github", "hub", "github.com")
    }

    fn harness() -> Harness {
        let h = Harness::new(FakeForge {
            user: "jingweno".to_string(),
            repositories: vec![repository(base())],
            ..Default::default()
        })
        .with_origin("github", "hub");
        h.git(&["symbolic-ref", "HEAD", "refs/heads/feature"]);
        h
    }

    fn run(h: &mut Harness, argv: &[&str]) -> anyhow::Result<Args> {
        let mut args = Args::new(argv);

        dispatch(&mut h.ctx, lookup("pull-request").unwrap(), &mut args)?;

        Ok(args)
    }

    #[test]
    fn test_creates_pull_request_from_current_branch() {
        let mut h = harness();

        let args = run(&mut h, &["pull-request", "-m", "Title", "-m", "Body"]).unwrap();

        let created = h.forge.created_pull_requests.borrow();
        assert_eq!(created[0].title, "Title");
        assert_eq!(created[0].body, "Body");
        assert_eq!(created[0].head, "feature");
        assert_eq!(created[0].base, "main");
        assert!(created[0].maintainer_can_modify);
        assert!(!created[0].draft);
        assert_eq!(h.output.contents(), "https://github.com/github/hub/pull/101\n");
        assert!(!args.is_forwarded());
    }

    #[test]
    fn test_explicit_base_and_head_across_forks() {
        let mut h = harness();

        run(
            &mut h,
            &[
                "pull-request",
                "-b",
                "mislav:develop",
                "-h",
                "jingweno:topic",
                "-d",
                "--no-maintainer-edits",
                "-m",
                "Title",
            ],
        )
        .unwrap();

        let created = h.forge.created_pull_requests.borrow();
        assert_eq!(created[0].head, "jingweno:topic");
        assert_eq!(created[0].base, "develop");
        assert!(created[0].draft);
        assert!(!created[0].maintainer_can_modify);
        assert_eq!(h.output.contents(), "https://github.com/mislav/hub/pull/101\n");
    }

    #[test]
    fn test_head_from_tracking_config() {
        let mut h = harness();
        h.git(&["remote", "add", "fork", "git@github.com:jingweno/hub.git"]);
        h.git(&["config", "branch.feature.remote", "fork"]);
        h.git(&["config", "branch.feature.merge", "refs/heads/remote-feature"]);

        run(&mut h, &["pull-request", "-m", "Title"]).unwrap();

        assert_eq!(
            h.forge.created_pull_requests.borrow()[0].head,
            "jingweno:remote-feature"
        );
    }

    #[test]
    fn test_labels_assignees_and_reviewers() {
        let mut h = harness();

        run(
            &mut h,
            &[
                "pull-request",
                "-m",
                "Title",
                "-l",
                "bug,ui",
                "-a",
                "mislav",
                "-M",
                "3",
                "-r",
                "defunkt,github/core",
            ],
        )
        .unwrap();

        assert_eq!(
            h.forge.issue_updates.borrow()[0],
            (
                101,
                IssueUpdate {
                    labels: Some(vec!["bug".to_string(), "ui".to_string()]),
                    assignees: Some(vec!["mislav".to_string()]),
                    milestone: Some(3),
                }
            )
        );

        let requests = h.forge.review_requests.borrow();
        assert_eq!(requests[0].0, 101);
        assert_eq!(requests[0].1.reviewers, vec!["defunkt"]);
        assert_eq!(requests[0].1.team_reviewers, vec!["core"]);
    }

    #[test]
    fn test_no_metadata_means_no_follow_up_requests() {
        let mut h = harness();

        run(&mut h, &["pull-request", "-m", "Title"]).unwrap();

        assert!(h.forge.issue_updates.borrow().is_empty());
        assert!(h.forge.review_requests.borrow().is_empty());
    }

    #[test]
    fn test_message_from_file() {
        let mut h = harness();
        let path = h.repo_dir.path().join("MESSAGE");
        fs::write(&path, "From a file\n\nWith a body\n").unwrap();

        run(&mut h, &["pull-request", "-F", path.to_str().unwrap()]).unwrap();

        let created = h.forge.created_pull_requests.borrow();
        assert_eq!(created[0].title, "From a file");
        assert_eq!(created[0].body, "With a body");
    }

    #[test]
    fn test_no_edit_uses_single_commit_message() {
        let mut h = harness();
        h.git(&["commit", "-q", "--allow-empty", "-m", "Base"]);
        h.git(&["update-ref", "refs/remotes/origin/main", "HEAD"]);
        h.git(&["commit", "-q", "--allow-empty", "-m", "Add feature", "-m", "Details"]);

        run(&mut h, &["pull-request", "--no-edit"]).unwrap();

        let created = h.forge.created_pull_requests.borrow();
        assert_eq!(created[0].title, "Add feature");
        assert_eq!(created[0].body, "Details");
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let mut h = harness();

        let err = run(&mut h, &["pull-request", "--no-edit"]).unwrap_err();

        assert_eq!(err.to_string(), "Aborting due to empty pull request title");
        assert!(h.forge.created_pull_requests.borrow().is_empty());
    }

    #[test]
    fn test_head_same_as_base_is_rejected() {
        let mut h = harness();
        h.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);

        let err = run(&mut h, &["pull-request", "-m", "Title"]).unwrap_err();

        assert!(err.to_string().contains("head branch is the same as base"));
    }

    #[test]
    fn test_noop_only_describes_the_request() {
        let mut h = harness();

        run(&mut h, &["--noop", "pull-request", "-m", "Title"]).unwrap();

        assert_eq!(
            h.output.contents(),
            "Would request a pull request to github:main from feature\n"
        );
        assert!(h.forge.created_pull_requests.borrow().is_empty());
    }

    #[test]
    fn test_split_values() {
        let values = vec!["a, b".to_string(), "c,".to_string()];

        assert_eq!(split_values(&values), vec!["a", "b", "c"]);
    }
}
