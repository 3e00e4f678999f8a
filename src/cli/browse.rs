//! The `browse` and `compare` subcommands.

use clap::Parser;

use crate::{
    cli::{
        Context,
        args::Args,
        flags::HelpFlag,
        forge::{Project, parse_shorthand},
    },
    error::HubError,
    io::{UrlAction, present_url},
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Open a GitHub repository in a web browser.
#[derive(Parser, Debug)]
#[command(name = "hub browse", disable_help_flag = true)]
pub struct BrowseFlags {
    /// Instead of opening the URL in your browser, print it to stdout
    #[arg(short, long)]
    url: bool,

    /// Copy the URL to the clipboard instead of opening it
    #[arg(short, long)]
    copy: bool,

    #[command(flatten)]
    help: HelpFlag,

    /// `[[<owner>/]<repo>] [<subpage>]`, or `-- <subpage>` for the current
    /// repository
    words: Vec<String>,
}

/// Open a GitHub compare page in a web browser.
#[derive(Parser, Debug)]
#[command(name = "hub compare", disable_help_flag = true)]
pub struct CompareFlags {
    /// Print the URL instead of opening it
    #[arg(short, long)]
    url: bool,

    /// Copy the URL to the clipboard instead of opening it
    #[arg(short, long)]
    copy: bool,

    /// Compare against this base branch
    #[arg(short, long)]
    base: Option<String>,

    #[command(flatten)]
    help: HelpFlag,

    /// `[<owner>] [[<start>...]<end>]`
    words: Vec<String>,
}

// =============================================================================
// Command Logic
// =============================================================================

pub fn browse(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: BrowseFlags = args.flag.typed()?;
    args.no_forward();

    let current_only = args.index_of_param("--").is_some();

    let (project, subpage) = match flags.words.first() {
        Some(repo) if !current_only => {
            let project = shorthand_project(ctx, repo)?;
            let subpage = match (flags.words.get(1), parse_shorthand(repo)) {
                (Some(subpage), _) => subpage.clone(),
                (None, Some(shorthand)) if shorthand.wiki => "wiki".to_string(),
                (None, _) => String::new(),
            };

            (project, subpage)
        }
        Some(subpage) => (ctx.main_project()?, subpage.clone()),
        None => current_branch_page(ctx)?,
    };

    print_or_open(ctx, &project.web_url(&subpage), flags.url, flags.copy)
}

pub fn compare(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: CompareFlags = args.flag.typed()?;
    args.no_forward();

    let (owner, range) = match flags.words.as_slice() {
        [] => (None, None),
        [range] => (None, Some(range.clone())),
        [owner, range] => (Some(owner.as_str()), Some(range.clone())),
        _ => {
            let usage = "Usage: hub compare [-uc] [-b <base>] [<owner>] [<start>...]<end>";
            return Err(HubError::Usage(usage.to_string()).into());
        }
    };

    let range = match range {
        Some(range) => range,
        None => pushed_branch_range(ctx, flags.base.as_deref())?,
    };

    let mut project = ctx.main_project()?;

    if let Some(owner) = owner {
        project = project.with_owner(owner);
    }

    let url = project.web_url(&format!("compare/{range}"));

    print_or_open(ctx, &url, flags.url, flags.copy)
}

// =============================================================================
// Private Helpers
// =============================================================================

fn print_or_open(ctx: &mut Context, url: &str, print: bool, copy: bool) -> anyhow::Result<()> {
    let browser = ctx.settings.browser.clone();

    present_url(
        url,
        UrlAction::from_flags(print, copy),
        browser.as_deref(),
        ctx.out(),
    )
}

/// `[owner/]name` on the current repository's host; a bare name belongs to
/// the authenticated user.
fn shorthand_project(ctx: &mut Context, token: &str) -> anyhow::Result<Project> {
    let Some(shorthand) = parse_shorthand(token) else {
        return Err(HubError::user_input(format!("invalid repository: '{token}'")).into());
    };

    let host = match ctx.main_project() {
        Ok(project) => project.host,
        Err(_) => ctx.settings.default_host().to_string(),
    };
    let owner = match shorthand.owner {
        Some(owner) => owner,
        None => ctx.current_user(&host)?,
    };

    Ok(Project::new(&owner, &shorthand.name, &host))
}

/// The repository the current branch is pushed to and `tree/<branch>` for
/// branches other than the remote's default; the main project otherwise.
fn current_branch_page(ctx: &mut Context) -> anyhow::Result<(Project, String)> {
    let main_project = ctx.main_project()?;

    let Ok(branch) = ctx.repo.current_branch() else {
        return Ok((main_project, String::new()));
    };

    let upstream = match ctx.repo.upstream(&branch)? {
        Some(upstream) if !upstream.is_local() => upstream,
        _ => return Ok((main_project, String::new())),
    };

    let project = ctx
        .repo
        .remote_by_name(&upstream.remote)?
        .and_then(|remote| remote.project())
        .unwrap_or(main_project);
    let name = upstream.branch.short_name();

    if ctx.repo.default_branch(&upstream.remote)? == upstream.branch {
        Ok((project, String::new()))
    } else {
        Ok((project, format!("tree/{name}")))
    }
}

/// `<upstream branch>` of the current branch, or `<base>...<branch>`.
fn pushed_branch_range(ctx: &mut Context, base: Option<&str>) -> anyhow::Result<String> {
    let branch = ctx.repo.current_branch()?;

    let upstream = match ctx.repo.upstream(&branch)? {
        Some(upstream) if !upstream.is_local() => upstream,
        _ => {
            return Err(HubError::user_input(format!(
                "the current branch '{}' doesn't seem pushed to a remote",
                branch.short_name()
            ))
            .into());
        }
    };
    let pushed = upstream.branch.short_name();

    Ok(match base {
        Some(base) => format!("{base}...{pushed}"),
        None => pushed.to_string(),
    })
}
