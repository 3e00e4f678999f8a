//! Placeholder values of issues, pull requests and releases for the
//! template expander.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use crossterm::style::{Color, ResetColor, SetBackgroundColor, SetForegroundColor};

use crate::{
    cli::forge::{Issue, IssueState, Label, PrState, PullRequest, Release, User},
    template::{ansi, expand},
};

type Placeholders = HashMap<&'static str, String>;

pub fn format_issue(issue: &Issue, format: &str, colorize: bool) -> String {
    expand(format, &issue_placeholders(issue, colorize, Utc::now()), colorize)
}

pub fn format_pull_request(pr: &PullRequest, format: &str, colorize: bool) -> String {
    expand(
        format,
        &pull_request_placeholders(pr, colorize, Utc::now()),
        colorize,
    )
}

pub fn format_release(release: &Release, format: &str, colorize: bool) -> String {
    expand(
        format,
        &release_placeholders(release, colorize, Utc::now()),
        colorize,
    )
}

// =============================================================================
// Tables
// =============================================================================

pub fn issue_placeholders(issue: &Issue, colorize: bool, now: DateTime<Utc>) -> Placeholders {
    let mut values = common_placeholders(
        &Common {
            number: issue.number,
            state: issue.state,
            title: &issue.title,
            body: &issue.body,
            url: &issue.url,
            author: &issue.author,
            assignees: &issue.assignees,
            labels: &issue.labels,
            milestone: issue.milestone.as_ref().map(|m| (m.number, m.title.as_str())),
        },
        colorize,
    );

    values.insert("NC", issue.comments.to_string());
    values.insert(
        "Nc",
        if issue.comments > 0 {
            format!("({})", issue.comments)
        } else {
            String::new()
        },
    );
    insert_dates(&mut values, ["cD", "cr", "ct", "cI"], issue.created_at, now);
    insert_dates(&mut values, ["uD", "ur", "ut", "uI"], issue.updated_at, now);

    values
}

pub fn pull_request_placeholders(
    pr: &PullRequest,
    colorize: bool,
    now: DateTime<Utc>,
) -> Placeholders {
    let mut values = common_placeholders(
        &Common {
            number: pr.number,
            state: pr.state,
            title: &pr.title,
            body: &pr.body,
            url: &pr.url,
            author: &pr.author,
            assignees: &pr.assignees,
            labels: &pr.labels,
            milestone: pr.milestone.as_ref().map(|m| (m.number, m.title.as_str())),
        },
        colorize,
    );

    let fine_state = pr.fine_state();
    let head = if pr.is_same_repo() || pr.head.label.is_empty() {
        pr.head.ref_name.clone()
    } else {
        pr.head.label.clone()
    };
    let team_owner = pr
        .base
        .repo
        .as_ref()
        .map(|repo| repo.project.owner.clone())
        .unwrap_or_default();
    let reviewers = pr
        .requested_reviewers
        .iter()
        .map(|user| user.login.clone())
        .chain(
            pr.requested_teams
                .iter()
                .map(|slug| format!("{team_owner}/{slug}")),
        )
        .collect::<Vec<_>>()
        .join(", ");

    values.insert("pS", fine_state.to_string());
    values.insert(
        "pC",
        color_if(colorize, match fine_state {
            PrState::Open => Color::Green,
            PrState::Draft => Color::DarkGrey,
            PrState::Merged => Color::Magenta,
            PrState::Closed => Color::Red,
        }),
    );
    values.insert("B", pr.base.ref_name.clone());
    values.insert("H", head);
    values.insert("sB", pr.base.sha.clone());
    values.insert("sH", pr.head.sha.clone());
    values.insert("sm", pr.merge_commit_sha.clone());
    values.insert("rs", reviewers);
    insert_dates(&mut values, ["cD", "cr", "ct", "cI"], pr.created_at, now);
    insert_dates(&mut values, ["uD", "ur", "ut", "uI"], pr.updated_at, now);
    insert_dates(&mut values, ["mD", "mr", "mt", "mI"], pr.merged_at, now);

    values
}

pub fn release_placeholders(release: &Release, colorize: bool, now: DateTime<Utc>) -> Placeholders {
    let (state, color) = if release.draft {
        ("draft", Color::DarkGrey)
    } else if release.prerelease {
        ("pre-release", Color::Yellow)
    } else {
        ("", Color::Green)
    };
    let mut values = Placeholders::from([
        ("U", release.url.clone()),
        ("T", release.tag_name.clone()),
        ("t", release.name.clone()),
        ("b", release.body.clone()),
        ("S", state.to_string()),
        ("sC", color_if(colorize, color)),
    ]);

    insert_dates(&mut values, ["cD", "cr", "ct", "cI"], release.created_at, now);
    insert_dates(&mut values, ["pD", "pr", "pt", "pI"], release.published_at, now);

    values
}

struct Common<'a> {
    number: u64,
    state: IssueState,
    title: &'a str,
    body: &'a str,
    url: &'a str,
    author: &'a User,
    assignees: &'a [User],
    labels: &'a [Label],
    milestone: Option<(u64, &'a str)>,
}

fn common_placeholders(item: &Common<'_>, colorize: bool) -> Placeholders {
    let state_color = match item.state {
        IssueState::Open => Color::Green,
        IssueState::Closed => Color::Red,
    };

    Placeholders::from([
        ("I", item.number.to_string()),
        ("i", format!("#{}", item.number)),
        ("U", item.url.to_string()),
        ("S", item.state.to_string()),
        ("sC", color_if(colorize, state_color)),
        ("t", item.title.to_string()),
        ("b", item.body.to_string()),
        ("au", item.author.login.clone()),
        ("as", join_logins(item.assignees)),
        ("l", format_labels(item.labels, colorize)),
        (
            "L",
            item.labels
                .iter()
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        (
            "Mn",
            item.milestone
                .map(|(number, _)| number.to_string())
                .unwrap_or_default(),
        ),
        (
            "Mt",
            item.milestone
                .map(|(_, title)| title.to_string())
                .unwrap_or_default(),
        ),
    ])
}

fn join_logins(users: &[User]) -> String {
    users
        .iter()
        .map(|user| user.login.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn color_if(colorize: bool, color: Color) -> String {
    if colorize {
        ansi(SetForegroundColor(color))
    } else {
        String::new()
    }
}

/// Labels joined with `", "`; coloured labels get their forge colour as
/// background and a readable foreground.
fn format_labels(labels: &[Label], colorize: bool) -> String {
    labels
        .iter()
        .map(|label| match (colorize, parse_rgb(&label.color)) {
            (true, Some((r, g, b))) => {
                let foreground = if is_light(r, g, b) {
                    Color::Black
                } else {
                    Color::White
                };

                format!(
                    "{}{}{}{}",
                    ansi(SetBackgroundColor(Color::Rgb { r, g, b })),
                    ansi(SetForegroundColor(foreground)),
                    label.name,
                    ansi(ResetColor)
                )
            }
            _ => label.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');

    if hex.len() != 6 {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();

    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Perceived brightness above the midpoint.
fn is_light(r: u8, g: u8, b: u8) -> bool {
    let luma = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);

    luma > 127.5
}

fn insert_dates(
    values: &mut Placeholders,
    keys: [&'static str; 4],
    date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    let [day, relative, unix, iso] = keys;
    let formatted = date.map(|date| {
        (
            date.format("%d %b %Y").to_string(),
            time_ago(date, now),
            date.timestamp().to_string(),
            date.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    });
    let (d, r, t, i) = formatted.unwrap_or_default();

    values.insert(day, d);
    values.insert(relative, r);
    values.insert(unix, t);
    values.insert(iso, i);
}

fn time_ago(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(date);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();
    let months = days / 30;
    let years = months / 12;

    let (value, unit) = if minutes < 1 {
        return "now".to_string();
    } else if hours < 1 {
        (minutes, "minute")
    } else if days < 1 {
        (hours, "hour")
    } else if months < 1 {
        (days, "day")
    } else if years < 1 {
        (months, "month")
    } else {
        (years, "year")
    };
    let plural = if value > 1 { "s" } else { "" };

    format!("{value} {unit}{plural} ago")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        cli::forge::{Milestone, PrRef, PrRepo, Project},
        template::strip_ansi,
    };

    /// Every placeholder documented for `pr list --format`.
    const PR_KEYS: &[&str] = &[
        "I", "i", "U", "S", "pS", "sC", "pC", "t", "l", "L", "b", "B", "sB", "H", "sH", "sm",
        "au", "as", "rs", "Mn", "Mt", "cD", "cr", "ct", "cI", "uD", "ur", "ut", "uI", "mD",
        "mr", "mt", "mI",
    ];

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn sample_pr() -> PullRequest {
        let repo = |owner: &str| PrRepo {
            project: Project::new(owner, "hub", "github.com"),
            private: false,
            default_branch: "main".to_string(),
        };

        PullRequest {
            number: 42,
            title: "Add feature".to_string(),
            url: "https://github.com/github/hub/pull/42".to_string(),
            head: PrRef {
                label: "mislav:feature".to_string(),
                ref_name: "feature".to_string(),
                sha: "abc".to_string(),
                repo: Some(repo("mislav")),
            },
            base: PrRef {
                label: "github:main".to_string(),
                ref_name: "main".to_string(),
                sha: "def".to_string(),
                repo: Some(repo("github")),
            },
            author: User {
                login: "mislav".to_string(),
            },
            requested_reviewers: vec![User {
                login: "jingweno".to_string(),
            }],
            requested_teams: vec!["core".to_string()],
            labels: vec![
                Label {
                    name: "bug".to_string(),
                    color: "ee0701".to_string(),
                },
                Label {
                    name: "docs".to_string(),
                    color: "not-a-color".to_string(),
                },
            ],
            milestone: Some(Milestone {
                number: 3,
                title: "v3".to_string(),
            }),
            created_at: Some(date(1)),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_pr_placeholder_expands() {
        let now = date(3);

        for pr in [sample_pr(), PullRequest::default()] {
            let values = pull_request_placeholders(&pr, true, now);

            for key in PR_KEYS {
                assert!(values.contains_key(key), "missing %{key}");
            }
        }
    }

    #[test]
    fn test_pr_values() {
        let values = pull_request_placeholders(&sample_pr(), false, date(3));

        assert_eq!(values["i"], "#42");
        assert_eq!(values["H"], "mislav:feature");
        assert_eq!(values["B"], "main");
        assert_eq!(values["rs"], "jingweno, github/core");
        assert_eq!(values["L"], "bug, docs");
        assert_eq!(values["Mn"], "3");
        assert_eq!(values["cD"], "01 Jan 2024");
        assert_eq!(values["cr"], "2 days ago");
        assert_eq!(values["cI"], "2024-01-01T12:00:00Z");
        assert_eq!(values["mD"], "");
        assert_eq!(values["pC"], "");
    }

    #[test]
    fn test_colorless_rendering_is_stripped_colored_rendering() {
        let format = "%pC%>(8)%i%Creset  %t%  l%n%sC%S %au %rs%Creset";
        let pr = sample_pr();
        let now = date(3);

        let colored = expand(format, &pull_request_placeholders(&pr, true, now), true);
        let plain = expand(format, &pull_request_placeholders(&pr, false, now), false);

        assert_ne!(colored, plain);
        assert_eq!(strip_ansi(&colored), plain);
        assert_eq!(plain, "     #42  Add feature  bug, docs\nopen mislav jingweno, github/core");
    }

    #[test]
    fn test_issue_comment_counts() {
        let mut issue = Issue {
            number: 7,
            ..Default::default()
        };

        assert_eq!(issue_placeholders(&issue, false, date(1))["Nc"], "");

        issue.comments = 4;
        let values = issue_placeholders(&issue, false, date(1));

        assert_eq!(values["NC"], "4");
        assert_eq!(values["Nc"], "(4)");
    }

    #[test]
    fn test_release_state() {
        let release = Release {
            tag_name: "v1.0".to_string(),
            prerelease: true,
            ..Default::default()
        };

        assert_eq!(
            format_release(&release, "%T %S", false),
            "v1.0 pre-release"
        );
    }

    #[test]
    fn test_time_ago() {
        let now = date(10);

        assert_eq!(time_ago(now, now), "now");
        assert_eq!(time_ago(now - chrono::Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - chrono::Duration::hours(5), now), "5 hours ago");
        assert_eq!(time_ago(now - chrono::Duration::days(65), now), "2 months ago");
        assert_eq!(time_ago(now - chrono::Duration::days(800), now), "2 years ago");
    }

    #[test]
    fn test_label_foreground_follows_brightness() {
        assert!(is_light(0xff, 0xff, 0xff));
        assert!(!is_light(0x00, 0x00, 0x66));
        assert_eq!(parse_rgb("#0e8a16"), Some((0x0e, 0x8a, 0x16)));
        assert_eq!(parse_rgb("zz"), None);
    }
}
