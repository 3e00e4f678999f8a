//! `ci-status`: the combined CI status of a commit.

use std::{collections::HashMap, io::Write};

use clap::Parser;
use crossterm::style::{Color, SetForegroundColor};

use crate::{
    cli::{
        Context,
        args::Args,
        flags::{ColorFlag, HelpFlag},
        forge::{CommitStatus, StatusEntry},
    },
    error::HubError,
    template::{ansi, expand},
};

const DEFAULT_VERBOSE_FORMAT: &str = "%sC%<(8)%S%Creset  %t%  U%n";
const NO_STATUS: &str = "no status";

/// Display the status of GitHub checks for a commit.
#[derive(Parser)]
#[command(name = "hub ci-status", disable_help_flag = true)]
pub struct CiStatusFlags {
    /// Print every status context with its URL
    #[arg(short, long)]
    verbose: bool,

    /// Pretty print each status context with a template
    #[arg(short, long)]
    format: Option<String>,

    #[command(flatten)]
    color: ColorFlag,

    #[command(flatten)]
    help: HelpFlag,

    /// Commit to check (defaults to HEAD)
    words: Vec<String>,
}

pub fn ci_status(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: CiStatusFlags = args.flag.typed()?;
    args.no_forward();

    let rev = flags.words.first().map_or("HEAD", String::as_str);
    let sha = ctx.repo.rev_parse(rev)?;
    let project = ctx.main_project()?;

    if args.noop {
        writeln!(ctx.out(), "Would request CI status for {sha}")?;
        return Ok(());
    }

    let client = ctx.client(&project.host)?;
    let status = client.commit_status(&project, &sha)?;
    let state = combined_state(&status);

    if flags.verbose || flags.format.is_some() {
        let format = flags.format.as_deref().unwrap_or(DEFAULT_VERBOSE_FORMAT);
        let colorize = ctx.colorize(flags.color.color);

        for entry in &status.statuses {
            write!(ctx.out(), "{}", format_status(entry, format, colorize))?;
        }

        if status.statuses.is_empty() {
            writeln!(ctx.out(), "{NO_STATUS}")?;
        }
    } else {
        writeln!(ctx.out(), "{state}")?;
    }

    match exit_code(state) {
        0 => Ok(()),
        code => Err(HubError::Exit(code).into()),
    }
}

/// The forge's combined state, or "no status" when nothing reported.
fn combined_state(status: &CommitStatus) -> &str {
    if status.statuses.is_empty() {
        NO_STATUS
    } else {
        &status.state
    }
}

fn exit_code(state: &str) -> u8 {
    match state {
        "success" => 0,
        "failure" | "error" => 1,
        "pending" => 2,
        _ => 3,
    }
}

fn format_status(entry: &StatusEntry, format: &str, colorize: bool) -> String {
    let color = match entry.state.as_str() {
        "success" => Color::Green,
        "failure" | "error" => Color::Red,
        _ => Color::Yellow,
    };
    let values = HashMap::from([
        ("S", entry.state.clone()),
        ("t", entry.context.clone()),
        ("U", entry.target_url.clone()),
        (
            "sC",
            if colorize {
                ansi(SetForegroundColor(color))
            } else {
                String::new()
            },
        ),
    ]);

    expand(format, &values, colorize)
}
