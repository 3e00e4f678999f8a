//! Input/Output utilities.

use std::{
    io::Write,
    process::{Command, Stdio},
};

use anyhow::Context;
use clap::ValueEnum;
use dialoguer::Editor;

use crate::error::HubError;

const CUT_LINE: &str = "------------------------ >8 ------------------------";

/// A title and body composed by the user.
#[derive(Debug, Default, PartialEq)]
pub struct Message {
    pub title: String,
    pub body: String,
}

impl Message {
    /// Splits text into a title (the first paragraph, joined into one line)
    /// and a body (everything after the first blank line).
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (title, body) = match text.split_once("\n\n") {
            Some((title, body)) => (title, body.trim()),
            None => (text, ""),
        };

        Message {
            title: title
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" "),
            body: body.to_string(),
        }
    }
}

/// Opens the editor on `initial` followed by a cut marker and `help`, and
/// parses what's left above the marker.
///
/// Lines starting with `comment_char` are dropped.
pub fn edit_message(
    editor: Option<&str>,
    initial: &str,
    help: &str,
    comment_char: &str,
) -> anyhow::Result<Message> {
    let template = message_template(initial, help, comment_char);
    let mut dialog = Editor::new();

    if let Some(executable) = editor {
        dialog.executable(executable);
    }

    let Some(content) = dialog
        .edit(&template)
        .context("Failed opening text editor to enter message")?
    else {
        return Err(HubError::user_input("Aborting due to empty message").into());
    };

    let message = strip_message(&content, comment_char);

    if message.title.is_empty() {
        return Err(HubError::user_input("Aborting due to empty message").into());
    }

    Ok(message)
}

fn message_template(initial: &str, help: &str, comment_char: &str) -> String {
    let help = help
        .lines()
        .map(|line| {
            if line.is_empty() {
                comment_char.to_string()
            } else {
                format!("{comment_char} {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{initial}\n\n{comment_char} {CUT_LINE}\n\
         {comment_char} Do not modify or remove the line above.\n\
         {comment_char} Everything below it will be ignored.\n{help}\n"
    )
}

fn strip_message(content: &str, comment_char: &str) -> Message {
    let above_cut = content
        .split_once(&format!("{comment_char} {CUT_LINE}"))
        .map_or(content, |(above, _)| above);
    let text = above_cut
        .lines()
        .filter(|line| !line.starts_with(comment_char))
        .collect::<Vec<_>>()
        .join("\n");

    Message::parse(&text)
}

// =============================================================================
// Colour Policy
// =============================================================================

/// Value of a `--color` flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorWhen {
    Always,
    Never,
    #[default]
    Auto,
}

/// Whether to emit colour escapes: always for `always`, never for `never`,
/// and for `auto` (or no flag at all) only when stdout is a terminal.
pub fn colorize_output(when: Option<ColorWhen>, stdout_is_tty: bool) -> bool {
    match when.unwrap_or_default() {
        ColorWhen::Always => true,
        ColorWhen::Never => false,
        ColorWhen::Auto => stdout_is_tty,
    }
}

// =============================================================================
// URL Presentation
// =============================================================================

/// What to do with a web URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlAction {
    Open,
    Print,
    Copy,
}

impl UrlAction {
    /// `-u` prints, `-c` copies, otherwise the browser opens.
    pub fn from_flags(print: bool, copy: bool) -> Self {
        if copy {
            UrlAction::Copy
        } else if print {
            UrlAction::Print
        } else {
            UrlAction::Open
        }
    }
}

/// Prints the URL to `out`, copies it or opens it in the browser.
pub fn present_url(
    url: &str,
    action: UrlAction,
    browser: Option<&str>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match action {
        UrlAction::Print => writeln!(out, "{url}")?,
        UrlAction::Copy => copy_to_clipboard(url)?,
        UrlAction::Open => open_in_browser(url, browser)?,
    }

    Ok(())
}

/// Opens `url` with `$BROWSER` when set, otherwise with the system handler.
pub fn open_in_browser(url: &str, browser: Option<&str>) -> anyhow::Result<()> {
    let Some(browser) = browser else {
        return open::that(url).with_context(|| format!("Failed to open {url}"));
    };

    let status = Command::new(browser)
        .arg(url)
        .status()
        .with_context(|| format!("Failed to launch browser '{browser}'"))?;

    if !status.success() {
        anyhow::bail!("Browser '{browser}' exited with {status}");
    }

    Ok(())
}

fn clipboard_command() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("pbcopy", &[])
    } else if cfg!(windows) {
        ("clip", &[])
    } else {
        ("xclip", &["-selection", "clipboard"])
    }
}

pub fn copy_to_clipboard(text: &str) -> anyhow::Result<()> {
    let (program, args) = clipboard_command();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to run {program} to copy to the clipboard"))?;

    child
        .stdin
        .take()
        .context("Clipboard process has no stdin")?
        .write_all(text.as_bytes())
        .context("Failed to write to the clipboard")?;

    let status = child.wait().context("Failed to wait for clipboard process")?;

    if !status.success() {
        anyhow::bail!("{program} exited with {status}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_parse_title_and_body() {
        let message = Message::parse("Fix the thing\n\nIt was broken.\n\nReally.");

        assert_eq!(message.title, "Fix the thing");
        assert_eq!(message.body, "It was broken.\n\nReally.");
    }

    #[test]
    fn test_message_parse_joins_first_paragraph() {
        let message = Message::parse("  Long\ntitle  \n");

        assert_eq!(message.title, "Long title");
        assert_eq!(message.body, "");
    }

    #[test]
    fn test_strip_message_cuts_and_drops_comments() {
        let template = message_template("Title\n\nBody", "Help line\n\nMore help", "#");
        let edited = format!("# a comment\n{template}");

        let message = strip_message(&edited, "#");

        assert_eq!(
            message,
            Message {
                title: "Title".to_string(),
                body: "Body".to_string()
            }
        );
    }

    #[test]
    fn test_strip_message_with_custom_comment_char() {
        let template = message_template("", "help", ";");
        let edited = template.replacen("\n\n", "Hello\n\nWorld\n", 1);

        let message = strip_message(&edited, ";");

        assert_eq!(message.title, "Hello");
        assert_eq!(message.body, "World");
    }

    #[test]
    fn test_colorize_output() {
        assert!(colorize_output(Some(ColorWhen::Always), false));
        assert!(!colorize_output(Some(ColorWhen::Never), true));
        assert!(colorize_output(Some(ColorWhen::Auto), true));
        assert!(!colorize_output(None, false));
        assert!(colorize_output(None, true));
    }

    #[test]
    fn test_url_action_from_flags() {
        assert_eq!(UrlAction::from_flags(false, false), UrlAction::Open);
        assert_eq!(UrlAction::from_flags(true, false), UrlAction::Print);
        assert_eq!(UrlAction::from_flags(true, true), UrlAction::Copy);
    }

    #[test]
    fn test_present_url_print_writes_a_line() {
        let mut out = Vec::new();

        present_url("https://github.com/a/b", UrlAction::Print, None, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "https://github.com/a/b\n");
    }
}
