//! The `issue` subcommand: list, show and create issues.

use std::io::Write;

use clap::{ArgAction, Parser, ValueEnum};

use crate::{
    cli::{
        Context,
        args::Args,
        flags::{ColorFlag, HelpFlag},
        forge::{Direction, IssueFilters, NewIssue, SortKey, StateFilter},
        placeholders::format_issue,
        pull_request::{message_from_flags, split_values},
    },
    error::HubError,
    io::{UrlAction, edit_message, present_url},
};

// =============================================================================
// CLI Arguments
// =============================================================================

const DEFAULT_LIST_FORMAT: &str = "%sC%>(8)%i%Creset  %t%  l%n";
const DEFAULT_SHOW_FORMAT: &str = "# %t%n%n* %S * %au * %cr%n%n%b%n";

/// List issues in the current repository.
#[derive(Parser)]
#[command(name = "hub issue", disable_help_flag = true)]
pub struct IssueListFlags {
    /// Filter by state
    #[arg(short, long, value_enum, default_value = "open")]
    state: ListState,

    /// Only issues assigned to this login
    #[arg(short, long)]
    assignee: Option<String>,

    /// Only issues created by this login
    #[arg(short, long)]
    creator: Option<String>,

    /// Only issues mentioning this login
    #[arg(short = '@', long)]
    mentioned: Option<String>,

    /// Only issues with all of these comma-separated labels
    #[arg(short, long, action = ArgAction::Append)]
    labels: Vec<String>,

    /// Only issues updated at or after this ISO 8601 timestamp
    #[arg(short = 'd', long)]
    since: Option<String>,

    /// Sort order
    #[arg(short = 'o', long, value_enum)]
    sort: Option<ListSort>,

    /// Sort in ascending order instead of descending
    #[arg(short = '^', long)]
    sort_ascending: bool,

    /// Pretty print the issues with a template
    #[arg(short, long)]
    format: Option<String>,

    /// Display only the first N issues
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
    All,
}

impl From<ListState> for StateFilter {
    fn from(state: ListState) -> Self {
        match state {
            ListState::Open => StateFilter::Open,
            ListState::Closed => StateFilter::Closed,
            ListState::All => StateFilter::All,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ListSort {
    Created,
    Updated,
    Comments,
}

impl From<ListSort> for SortKey {
    fn from(sort: ListSort) -> Self {
        match sort {
            ListSort::Created => SortKey::Created,
            ListSort::Updated => SortKey::Updated,
            ListSort::Comments => SortKey::Comments,
        }
    }
}

/// Show an issue.
#[derive(Parser)]
#[command(name = "hub issue show", disable_help_flag = true)]
pub struct IssueShowFlags {
    /// Pretty print the issue with a template
    #[arg(short, long)]
    format: Option<String>,

    #[command(flatten)]
    color: ColorFlag,

    #[command(flatten)]
    help: HelpFlag,

    /// Issue number
    words: Vec<String>,
}

/// Create an issue.
#[derive(Parser)]
#[command(name = "hub issue create", disable_help_flag = true)]
pub struct IssueCreateFlags {
    /// Message paragraphs; the first is the title
    #[arg(short, long, action = ArgAction::Append)]
    message: Vec<String>,

    /// Read the message from a file (`-` for standard input)
    #[arg(short = 'F', long)]
    file: Option<String>,

    /// Comma-separated labels
    #[arg(short, long, action = ArgAction::Append)]
    labels: Vec<String>,

    /// Comma-separated assignee logins
    #[arg(short, long = "assign", action = ArgAction::Append)]
    assign: Vec<String>,

    /// Milestone number
    #[arg(short = 'M', long)]
    milestone: Option<u64>,

    /// Open the new issue in a web browser
    #[arg(short = 'o', long)]
    browse: bool,

    /// Copy the new issue's URL to the clipboard
    #[arg(short, long)]
    copy: bool,

    #[command(flatten)]
    help: HelpFlag,
}

// =============================================================================
// Command Logic
// =============================================================================

pub fn list(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: IssueListFlags = args.flag.typed()?;
    args.no_forward();

    let project = ctx.main_project()?;

    if args.noop {
        writeln!(ctx.out(), "Would request list of issues for {project}")?;
        return Ok(());
    }

    let labels = split_values(&flags.labels);
    let filters = IssueFilters {
        state: args
            .flag
            .has_received("state")
            .then_some(StateFilter::from(flags.state)),
        assignee: flags.assignee,
        creator: flags.creator,
        mentioned: flags.mentioned,
        labels: (!labels.is_empty()).then(|| labels.join(",")),
        sort: flags.sort.map(SortKey::from),
        direction: Some(if flags.sort_ascending {
            Direction::Asc
        } else {
            Direction::Desc
        }),
        since: flags.since,
    };

    let client = ctx.client(&project.host)?;
    let issues = client.issues(&project, &filters, flags.limit)?;

    let format = flags.format.as_deref().unwrap_or(DEFAULT_LIST_FORMAT);
    let colorize = ctx.colorize(flags.color.color);

    for issue in &issues {
        write!(ctx.out(), "{}", format_issue(issue, format, colorize))?;
    }

    Ok(())
}

pub fn show(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: IssueShowFlags = args.flag.typed()?;
    args.no_forward();

    let Some(word) = flags.words.first() else {
        let usage = "Usage: hub issue show [-f <format>] <number>";
        return Err(HubError::Usage(usage.to_string()).into());
    };
    let number: u64 = word
        .parse()
        .map_err(|_| HubError::user_input(format!("invalid issue number: '{word}'")))?;

    let project = ctx.main_project()?;
    let client = ctx.client(&project.host)?;
    let issue = client.issue(&project, number)?;

    let format = flags.format.as_deref().unwrap_or(DEFAULT_SHOW_FORMAT);
    let colorize = ctx.colorize(flags.color.color);

    write!(ctx.out(), "{}", format_issue(&issue, format, colorize))?;

    Ok(())
}

pub fn create(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: IssueCreateFlags = args.flag.typed()?;
    args.no_forward();

    let project = ctx.main_project()?;

    if args.noop {
        writeln!(ctx.out(), "Would create an issue for {project}")?;
        return Ok(());
    }

    let message = match message_from_flags(&flags.message, flags.file.as_deref())? {
        Some(message) => message,
        None => {
            let help = format!(
                "Creating an issue for {project}\n\n\
                 Write a message for this issue. The first block of\n\
                 text is the title and the rest is the description."
            );
            let comment_char = ctx.repo.comment_char()?;

            edit_message(ctx.settings.editor.as_deref(), "", &help, &comment_char)?
        }
    };

    if message.title.is_empty() {
        return Err(HubError::user_input("Aborting creation due to empty issue title").into());
    }

    let options = NewIssue {
        title: message.title,
        body: message.body,
        labels: split_values(&flags.labels),
        assignees: split_values(&flags.assign),
        milestone: flags.milestone,
    };

    let client = ctx.client(&project.host)?;
    let issue = client.create_issue(&project, &options)?;

    tracing::debug!("Created issue #{}", issue.number);

    let action = if flags.copy {
        UrlAction::Copy
    } else if flags.browse {
        UrlAction::Open
    } else {
        UrlAction::Print
    };
    let browser = ctx.settings.browser.clone();

    present_url(&issue.url, action, browser.as_deref(), ctx.out())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{
        forge::{Issue, IssueState, Label, User},
        lookup,
        runner::dispatch,
        test_support::{FakeForge, Harness},
    };

    fn issue(number: u64, state: IssueState) -> Issue {
        Issue {
            number,
            state,
            title: format!("Issue {number}"),
            body: "Steps to reproduce".to_string(),
            url: format!("https://github.com/github/hub/issues/{number}"),
            author: User {
                login: "mislav".to_string(),
            },
            labels: vec![Label {
                name: "bug".to_string(),
                color: "ee0701".to_string(),
            }],
            ..Default::default()
        }
    }

    fn harness(issues: Vec<Issue>) -> Harness {
        Harness::new(FakeForge {
            user: "jingweno".to_string(),
            issues,
            ..Default::default()
        })
        .with_origin("github", "hub")
    }

    fn run(h: &mut Harness, argv: &[&str]) -> anyhow::Result<Args> {
        let mut args = Args::new(argv);

        dispatch(&mut h.ctx, lookup("issue").unwrap(), &mut args)?;

        Ok(args)
    }

    #[test]
    fn test_list_skips_pull_requests() {
        let pull = Issue {
            is_pull_request: true,
            ..issue(2, IssueState::Open)
        };
        let mut h = harness(vec![issue(1, IssueState::Open), pull]);

        let args = run(&mut h, &["issue"]).unwrap();

        assert_eq!(h.output.contents(), "      #1  Issue 1  bug\n");
        assert!(!args.is_forwarded());
    }

    #[test]
    fn test_list_filters_from_flags() {
        let mut h = harness(vec![]);

        run(
            &mut h,
            &[
                "issue", "-s", "all", "-a", "mislav", "-c", "defunkt", "-@", "jingweno", "-l",
                "bug,ui", "-l", "docs", "-o", "comments", "-^", "-d", "2020-01-01T00:00:00Z",
            ],
        )
        .unwrap();

        assert_eq!(
            h.forge.issue_filters.borrow()[0],
            IssueFilters {
                state: Some(StateFilter::All),
                assignee: Some("mislav".to_string()),
                creator: Some("defunkt".to_string()),
                mentioned: Some("jingweno".to_string()),
                labels: Some("bug,ui,docs".to_string()),
                sort: Some(SortKey::Comments),
                direction: Some(Direction::Asc),
                since: Some("2020-01-01T00:00:00Z".to_string()),
            }
        );
    }

    #[test]
    fn test_list_with_format_and_limit() {
        let mut h = harness(vec![
            issue(1, IssueState::Open),
            issue(2, IssueState::Open),
            issue(3, IssueState::Closed),
        ]);

        run(&mut h, &["issue", "-L", "1", "-f", "%I %S %au%n"]).unwrap();

        assert_eq!(h.output.contents(), "1 open mislav\n");
    }

    #[test]
    fn test_show_with_format() {
        let mut h = harness(vec![issue(4, IssueState::Closed)]);

        run(&mut h, &["issue", "show", "4", "-f", "%i %S %t%n"]).unwrap();

        assert_eq!(h.output.contents(), "#4 closed Issue 4\n");
    }

    #[test]
    fn test_show_requires_a_number() {
        let mut h = harness(vec![]);

        let err = run(&mut h, &["issue", "show", "four"]).unwrap_err();

        assert_eq!(err.to_string(), "invalid issue number: 'four'");
    }

    #[test]
    fn test_create_with_message_and_metadata() {
        let mut h = harness(vec![]);

        run(
            &mut h,
            &[
                "issue", "create", "-m", "Crash on start", "-m", "Details", "-l", "bug", "-a",
                "mislav,defunkt", "-M", "2",
            ],
        )
        .unwrap();

        let created = h.forge.created_issues.borrow();
        assert_eq!(created[0].title, "Crash on start");
        assert_eq!(created[0].body, "Details");
        assert_eq!(created[0].labels, vec!["bug"]);
        assert_eq!(created[0].assignees, vec!["mislav", "defunkt"]);
        assert_eq!(created[0].milestone, Some(2));
        assert_eq!(h.output.contents(), "https://github.com/github/hub/issues/201\n");
    }

    #[test]
    fn test_create_rejects_empty_title() {
        let mut h = harness(vec![]);

        let err = run(&mut h, &["issue", "create", "-m", ""]).unwrap_err();

        assert_eq!(err.to_string(), "Aborting creation due to empty issue title");
    }
}
