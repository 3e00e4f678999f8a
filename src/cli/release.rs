//! The `release` subcommand: list releases and show one release.

use std::io::Write;

use clap::Parser;

use crate::{
    cli::{
        Context,
        args::Args,
        flags::{ColorFlag, HelpFlag},
        forge::Release,
        placeholders::format_release,
    },
    error::HubError,
};

const DEFAULT_LIST_FORMAT: &str = "%T%n";
const DEFAULT_SHOW_FORMAT: &str = "%t%n%n%b%n";

/// List GitHub releases of the current repository.
#[derive(Parser)]
#[command(name = "hub release", disable_help_flag = true)]
pub struct ReleaseListFlags {
    /// Display only the first N releases
    #[arg(short = 'L', long)]
    limit: Option<usize>,

    /// Include draft releases
    #[arg(short = 'd', long)]
    include_drafts: bool,

    /// Leave out pre-releases
    #[arg(short = 'p', long)]
    exclude_prereleases: bool,

    /// Pretty print the releases with a template
    #[arg(short, long)]
    format: Option<String>,

    #[command(flatten)]
    color: ColorFlag,

    #[command(flatten)]
    help: HelpFlag,

    words: Vec<String>,
}

/// Show a single release by its tag name.
#[derive(Parser)]
#[command(name = "hub release show", disable_help_flag = true)]
pub struct ReleaseShowFlags {
    /// Pretty print the release with a template
    #[arg(short, long)]
    format: Option<String>,

    #[command(flatten)]
    color: ColorFlag,

    #[command(flatten)]
    help: HelpFlag,

    /// `<tag>`
    words: Vec<String>,
}

pub fn list(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: ReleaseListFlags = args.flag.typed()?;
    args.no_forward();

    if let Some(unknown) = flags.words.first() {
        return Err(HubError::Usage(format!(
            "unknown release subcommand '{unknown}'\n\
             Usage: hub release [-d] [-p] [-L <limit>] [-f <format>]\n       \
             hub release show [-f <format>] <tag>"
        ))
        .into());
    }

    let project = ctx.main_project()?;

    if args.noop {
        writeln!(ctx.out(), "Would request list of releases for {project}")?;
        return Ok(());
    }

    let client = ctx.client(&project.host)?;
    // Filtering happens locally, so the limit can't be handed to the forge.
    let releases = client.releases(&project, None)?;

    let format = flags.format.as_deref().unwrap_or(DEFAULT_LIST_FORMAT);
    let colorize = ctx.colorize(flags.color.color);
    let shown = releases
        .iter()
        .filter(|release| is_listed(release, flags.include_drafts, flags.exclude_prereleases))
        .take(flags.limit.unwrap_or(usize::MAX));

    for release in shown {
        write!(ctx.out(), "{}", format_release(release, format, colorize))?;
    }

    Ok(())
}

pub fn show(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: ReleaseShowFlags = args.flag.typed()?;
    args.no_forward();

    let Some(tag) = flags.words.first() else {
        return Err(HubError::Usage("Usage: hub release show [-f <format>] <tag>".to_string()).into());
    };

    let project = ctx.main_project()?;

    if args.noop {
        writeln!(ctx.out(), "Would request release {tag} of {project}")?;
        return Ok(());
    }

    let client = ctx.client(&project.host)?;
    let release = client.release(&project, tag)?;

    let format = flags.format.as_deref().unwrap_or(DEFAULT_SHOW_FORMAT);
    let colorize = ctx.colorize(flags.color.color);

    write!(ctx.out(), "{}", format_release(&release, format, colorize))?;

    Ok(())
}

fn is_listed(release: &Release, include_drafts: bool, exclude_prereleases: bool) -> bool {
    (include_drafts || !release.draft) && !(exclude_prereleases && release.prerelease)
}
