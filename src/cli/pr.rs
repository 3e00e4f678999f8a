//! The `pr` subcommand: list, show and check out pull requests.

use std::io::Write;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};

use crate::{
    cli::{
        Context,
        args::{Args, Cmd},
        flags::{ColorFlag, HelpFlag},
        forge::{
            Direction, Project, PullRequest, PullRequestFilters, SortKey, StateFilter,
            select_transport,
        },
        placeholders::format_pull_request,
    },
    error::HubError,
    git::Branch,
    io::{UrlAction, present_url},
};

// =============================================================================
// CLI Arguments
// =============================================================================

const DEFAULT_LIST_FORMAT: &str = "%pC%>(8)%i%Creset  %t%  l%n";

/// Manage GitHub pull requests: `hub pr list`, `hub pr show` and
/// `hub pr checkout`.
#[derive(Parser)]
#[command(name = "hub pr", disable_help_flag = true)]
pub struct PrFlags {
    #[command(flatten)]
    help: HelpFlag,

    words: Vec<String>,
}

/// List pull requests in the current repository.
#[derive(Parser)]
#[command(name = "hub pr list", disable_help_flag = true)]
pub struct PrListFlags {
    /// Filter by state
    #[arg(short, long, value_enum, default_value = "open")]
    state: ListState,

    /// Show pull requests from the `[<owner>:]<branch>` head
    #[arg(short = 'h', long)]
    head: Option<String>,

    /// Show pull requests based on this branch
    #[arg(short, long)]
    base: Option<String>,

    /// Sort order
    #[arg(short = 'o', long, value_enum)]
    sort: Option<ListSort>,

    /// Sort in ascending order instead of descending
    #[arg(short = '^', long)]
    sort_ascending: bool,

    /// Pretty print the pull requests with a template
    #[arg(short, long)]
    format: Option<String>,

    /// Display only the first N pull requests
    #[arg(short = 'L', long)]
    limit: Option<usize>,

    #[command(flatten)]
    color: ColorFlag,

    #[command(flatten)]
    help: HelpFlag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ListState {
    Open,
    Closed,
    Merged,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ListSort {
    Created,
    Updated,
    Popularity,
    LongRunning,
}

impl From<ListSort> for SortKey {
    fn from(sort: ListSort) -> Self {
        match sort {
            ListSort::Created => SortKey::Created,
            ListSort::Updated => SortKey::Updated,
            ListSort::Popularity => SortKey::Popularity,
            ListSort::LongRunning => SortKey::LongRunning,
        }
    }
}

/// Open a pull request page in the browser.
#[derive(Parser)]
#[command(name = "hub pr show", disable_help_flag = true)]
pub struct PrShowFlags {
    /// Show the pull request for this `[<owner>:]<branch>` head
    #[arg(short = 'h', long)]
    head: Option<String>,

    /// Print the URL instead of opening it
    #[arg(short, long)]
    url: bool,

    /// Copy the URL to the clipboard instead of opening it
    #[arg(short, long)]
    copy: bool,

    /// Pretty print the pull request with a template
    #[arg(short, long)]
    format: Option<String>,

    #[command(flatten)]
    color: ColorFlag,

    #[command(flatten)]
    help: HelpFlag,

    /// Pull request number
    words: Vec<String>,
}

/// Check out the head of a pull request as a local branch.
#[derive(Parser)]
#[command(name = "hub pr checkout", disable_help_flag = true)]
pub struct PrCheckoutFlags {
    #[command(flatten)]
    help: HelpFlag,

    /// `<number> [<branch>]`
    words: Vec<String>,
}

// =============================================================================
// Command Logic
// =============================================================================

pub fn pr(_ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: PrFlags = args.flag.typed()?;
    let usage = "Usage: hub pr list [-s <state>] [-h <head>] [-b <base>] [-f <format>]\n       \
                 hub pr checkout <number> [<branch>]\n       \
                 hub pr show [-uc] [-f <format>] [-h <head>]\n       \
                 hub pr show [-uc] [-f <format>] <number>";

    match flags.words.first() {
        Some(unknown) => Err(HubError::Usage(format!(
            "unknown pr subcommand '{unknown}'\n{usage}"
        ))
        .into()),
        None => Err(HubError::Usage(usage.to_string()).into()),
    }
}

pub fn list(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: PrListFlags = args.flag.typed()?;
    args.no_forward();

    let project = ctx.main_project()?;

    if args.noop {
        writeln!(ctx.out(), "Would request list of pull requests for {project}")?;
        return Ok(());
    }

    let (filters, merged_only) = list_filters(args, &flags, &project);
    let keep: Option<&dyn Fn(&PullRequest) -> bool> = if merged_only {
        Some(&PullRequest::is_merged)
    } else {
        None
    };

    let client = ctx.client(&project.host)?;
    let pulls = client.pull_requests(&project, &filters, flags.limit, keep)?;

    let format = flags.format.as_deref().unwrap_or(DEFAULT_LIST_FORMAT);
    let colorize = ctx.colorize(flags.color.color);

    for pr in &pulls {
        write!(ctx.out(), "{}", format_pull_request(pr, format, colorize))?;
    }

    Ok(())
}

pub fn show(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: PrShowFlags = args.flag.typed()?;
    args.no_forward();

    let project = ctx.main_project()?;

    let (url, number) = match flags.words.first() {
        Some(word) => {
            let number = parse_number(word)?;
            (project.web_url(&format!("pull/{number}")), number)
        }
        None => {
            let pr = find_current_pull_request(ctx, &project, flags.head.as_deref())?;
            (pr.url, pr.number)
        }
    };

    if let Some(format) = &flags.format {
        let client = ctx.client(&project.host)?;
        let pr = client.pull_request(&project, number)?;
        let colorize = ctx.colorize(flags.color.color);

        writeln!(ctx.out(), "{}", format_pull_request(&pr, format, colorize))?;
        return Ok(());
    }

    let browser = ctx.settings.browser.clone();
    let action = UrlAction::from_flags(flags.url, flags.copy);

    present_url(&url, action, browser.as_deref(), ctx.out())
}

pub fn checkout(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: PrCheckoutFlags = args.flag.typed()?;

    let Some(word) = flags.words.first() else {
        return Err(HubError::user_input("No pull request number given").into());
    };
    let number = parse_number(word)?;
    let new_branch = flags.words.get(1).map(String::as_str);

    let project = ctx.main_project()?;
    let client = ctx.client(&project.host)?;
    let pr = client.pull_request(&project, number)?;

    let params = transform_checkout_args(ctx, args, &pr, new_branch)?;
    args.replace("checkout", &params);

    Ok(())
}

// =============================================================================
// Push Targets
// =============================================================================

/// Where `branch` pushes to according to its `branch.<name>.remote` and
/// `branch.<name>.merge` config. Branches tracking another local branch have
/// no push target.
pub fn find_push_target(
    ctx: &mut Context,
    branch: &Branch,
) -> anyhow::Result<Option<(Branch, Project)>> {
    let Some(upstream) = ctx.repo.upstream(branch)? else {
        return Ok(None);
    };

    if upstream.is_local() {
        return Ok(None);
    }

    // `branch.<name>.remote` may hold a URL instead of a remote name.
    let project = match ctx.repo.remote_by_name(&upstream.remote)? {
        Some(remote) => remote.project(),
        None => Project::from_url(&upstream.remote),
    };

    Ok(project.map(|project| (upstream.branch, project)))
}

/// The project of a remote owned by `owner` that already has `branch`.
pub fn deduce_push_target(
    ctx: &mut Context,
    branch: &Branch,
    owner: &str,
) -> anyhow::Result<Option<Project>> {
    let known_hosts = ctx.known_hosts()?;

    for (remote, project) in ctx.repo.forge_remotes(&known_hosts)? {
        if !project.owner.eq_ignore_ascii_case(owner) {
            continue;
        }

        let tracking = format!("refs/remotes/{}/{}", remote.name, branch.short_name());

        if ctx.repo.ref_exists(&tracking)? {
            return Ok(Some(project));
        }
    }

    Ok(None)
}

/// `owner:branch` of the current branch's pull request head.
fn current_head(ctx: &mut Context, project: &Project) -> anyhow::Result<String> {
    let branch = ctx.repo.current_branch()?;

    if let Some((head_branch, head_project)) = find_push_target(ctx, &branch)? {
        return Ok(format!(
            "{}:{}",
            head_project.owner,
            head_branch.short_name()
        ));
    }

    let user = ctx.current_user(&project.host)?;

    if let Some(head_project) = deduce_push_target(ctx, &branch, &user)? {
        return Ok(format!("{}:{}", head_project.owner, branch.short_name()));
    }

    Ok(format!("{}:{}", project.owner, branch.short_name()))
}

fn find_current_pull_request(
    ctx: &mut Context,
    project: &Project,
    head: Option<&str>,
) -> anyhow::Result<PullRequest> {
    let head = match head {
        Some(head) => qualify_head(head, project),
        None => current_head(ctx, project)?,
    };

    tracing::debug!("Looking up the open pull request for {head}");

    let filters = PullRequestFilters {
        state: Some(StateFilter::Open),
        head: Some(head.clone()),
        ..Default::default()
    };
    let client = ctx.client(&project.host)?;

    client
        .pull_requests(project, &filters, Some(1), None)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            HubError::NotFound(format!("no open pull requests found for branch '{head}'")).into()
        })
}

// =============================================================================
// Private Helpers
// =============================================================================

pub fn parse_number(word: &str) -> anyhow::Result<u64> {
    word.parse()
        .map_err(|_| HubError::user_input(format!("invalid pull request number: '{word}'")).into())
}

/// Prefixes a bare branch name with the owner of `project`.
fn qualify_head(head: &str, project: &Project) -> String {
    if head.contains(':') {
        head.to_string()
    } else {
        format!("{}:{head}", project.owner)
    }
}

/// Query filters for `pr list`, and whether results must be post-filtered
/// to merged pull requests.
fn list_filters(
    args: &Args,
    flags: &PrListFlags,
    project: &Project,
) -> (PullRequestFilters, bool) {
    let mut filters = PullRequestFilters {
        direction: Some(if flags.sort_ascending {
            Direction::Asc
        } else {
            Direction::Desc
        }),
        ..Default::default()
    };
    let mut merged_only = false;

    if args.flag.has_received("state") {
        filters.state = Some(match flags.state {
            ListState::Open => StateFilter::Open,
            ListState::Closed => StateFilter::Closed,
            ListState::All => StateFilter::All,
            ListState::Merged => {
                merged_only = true;
                StateFilter::Closed
            }
        });
    }

    if args.flag.has_received("sort") {
        filters.sort = flags.sort.map(SortKey::from);
    }

    if args.flag.has_received("base") {
        filters.base = flags.base.clone();
    }

    if args.flag.has_received("head") {
        filters.head = flags.head.as_deref().map(|head| qualify_head(head, project));
    }

    (filters, merged_only)
}

/// Branch name used when `pr checkout` isn't given one. Forks pushing from
/// their default branch get the owner prefixed to avoid clobbering ours.
fn default_checkout_branch(pr: &PullRequest) -> String {
    let head = &pr.head;

    match &head.repo {
        Some(repo) if !pr.is_same_repo() && repo.default_branch == head.ref_name => {
            format!("{}-{}", repo.project.owner, head.ref_name)
        }
        _ => head.ref_name.clone(),
    }
}

fn configure_upstream(args: &mut Args, branch: &str, remote: &str, merge: &str) {
    args.after(Cmd::git(&[
        "config",
        &format!("branch.{branch}.remote"),
        remote,
    ]));
    args.after(Cmd::git(&["config", &format!("branch.{branch}.merge"), merge]));
}

/// Builds the `git checkout` params for `pr`: the head is fetched in the
/// before-chain and upstream tracking is configured in the after-chain.
///
/// With a local remote for the head repository the head branch is fetched
/// through it; otherwise `refs/pull/<n>/head` is fetched from the base
/// remote, and pushes go to the head repository only when the maintainer may
/// modify it.
fn transform_checkout_args(
    ctx: &mut Context,
    args: &mut Args,
    pr: &PullRequest,
    new_branch: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    let known_hosts = ctx.known_hosts()?;
    let base_project = pr
        .base
        .repo
        .as_ref()
        .map(|repo| repo.project.clone())
        .with_context(|| format!("Pull request #{} has no base repository", pr.number))?;
    let base_remote = ctx
        .repo
        .remote_for_project(&base_project, &known_hosts)?
        .ok_or_else(|| {
            HubError::NotFound(format!("could not find a git remote for '{base_project}'"))
        })?;

    let head_remote = if pr.is_same_repo() {
        Some(base_remote.clone())
    } else {
        match &pr.head.repo {
            Some(repo) => ctx.repo.remote_for_project(&repo.project, &known_hosts)?,
            None => None,
        }
    };

    let branch = new_branch.map_or_else(|| default_checkout_branch(pr), str::to_string);
    let head_ref = &pr.head.ref_name;
    let mut params = Vec::new();

    if let Some(remote) = head_remote {
        let tracking = format!("{}/{head_ref}", remote.name);
        let refspec = format!("+refs/heads/{head_ref}:refs/remotes/{tracking}");

        args.before(Cmd::git(&["fetch", &remote.name, &refspec]));

        if ctx.repo.ref_exists(&format!("refs/heads/{branch}"))? {
            params.push(branch);
            args.after(Cmd::git(&[
                "merge",
                "--ff-only",
                &format!("refs/remotes/{tracking}"),
            ]));
        } else {
            configure_upstream(args, &branch, &remote.name, &format!("refs/heads/{head_ref}"));
            params.extend(["-b".to_string(), branch, "--no-track".to_string(), tracking]);
        }

        return Ok(params);
    }

    let pull_ref = format!("refs/pull/{}/head", pr.number);
    args.before(Cmd::git(&[
        "fetch",
        &base_remote.name,
        &format!("{pull_ref}:{branch}"),
    ]));

    let (push_remote, merge) = match &pr.head.repo {
        Some(repo) if pr.maintainer_can_modify => {
            let protocol = ctx.protocol(&repo.project.host)?;
            let transport = select_transport(protocol, repo.private, true, false, true);

            (repo.project.git_url(transport), format!("refs/heads/{head_ref}"))
        }
        _ => (base_remote.name, pull_ref),
    };

    configure_upstream(args, &branch, &push_remote, &merge);
    params.push(branch);

    Ok(params)
}
