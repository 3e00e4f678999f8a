//! Expansion of `%`-placeholder format strings, modelled after
//! `git log --pretty=format:`.
//!
//! The expander knows about layout (`%n`, `%%`, alignment and the
//! `%C...` colour directives); every other placeholder is looked up in a
//! value table supplied by the caller.

use std::collections::HashMap;

use crossterm::style::{Color, ResetColor, SetForegroundColor};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Renders a crossterm command to its escape sequence.
pub fn ansi(command: impl crossterm::Command) -> String {
    let mut escape = String::new();
    // Writing into a String cannot fail.
    let _ = command.write_ansi(&mut escape);

    escape
}

/// Removes CSI escape sequences.
pub fn strip_ansi(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            // Parameters and intermediates up to the final byte.
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        } else {
            stripped.push(c);
        }
    }

    stripped
}

/// Display width in terminal cells, ignoring escapes.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(text).as_str())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    Center,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Truncate {
    None,
    Right,
    Left,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Alignment {
    width: usize,
    side: Side,
    truncate: Truncate,
}

impl Alignment {
    fn apply(&self, value: &str) -> String {
        let width = display_width(value);

        if width > self.width {
            return match self.truncate {
                Truncate::None => value.to_string(),
                Truncate::Right => truncate_right(&strip_ansi(value), self.width),
                Truncate::Left => truncate_left(&strip_ansi(value), self.width),
                Truncate::Middle => truncate_middle(&strip_ansi(value), self.width),
            };
        }

        let padding = self.width - width;

        match self.side {
            Side::Left => format!("{value}{}", " ".repeat(padding)),
            Side::Right => format!("{}{value}", " ".repeat(padding)),
            Side::Center => {
                let left = padding / 2;

                format!(
                    "{}{value}{}",
                    " ".repeat(left),
                    " ".repeat(padding - left)
                )
            }
        }
    }
}

/// Longest prefix of `text` fitting in `width` cells.
fn take_width(text: &str, width: usize) -> &str {
    let mut used = 0;

    for (i, c) in text.char_indices() {
        used += c.width().unwrap_or(0);

        if used > width {
            return &text[..i];
        }
    }

    text
}

/// Longest suffix of `text` fitting in `width` cells.
fn take_width_from_end(text: &str, width: usize) -> &str {
    let mut used = 0;

    for (i, c) in text.char_indices().rev() {
        used += c.width().unwrap_or(0);

        if used > width {
            return &text[i + c.len_utf8()..];
        }
    }

    text
}

fn truncate_right(text: &str, width: usize) -> String {
    format!("{}..", take_width(text, width.saturating_sub(2)))
}

fn truncate_left(text: &str, width: usize) -> String {
    format!("..{}", take_width_from_end(text, width.saturating_sub(2)))
}

fn truncate_middle(text: &str, width: usize) -> String {
    let available = width.saturating_sub(2);
    let left = available / 2;

    format!(
        "{}..{}",
        take_width(text, left),
        take_width_from_end(text, available - left)
    )
}

/// Parses the body of an alignment directive such as `<(8,trunc)` and
/// returns it with the number of bytes consumed.
fn parse_alignment(spec: &str) -> Option<(Alignment, usize)> {
    let (side, rest, prefix_len) = if let Some(rest) = spec.strip_prefix("><(") {
        (Side::Center, rest, 3)
    } else if let Some(rest) = spec.strip_prefix("<(") {
        (Side::Left, rest, 2)
    } else if let Some(rest) = spec.strip_prefix(">(") {
        (Side::Right, rest, 2)
    } else {
        return None;
    };

    let close = rest.find(')')?;
    let (width, truncate) = match rest[..close].split_once(',') {
        Some((width, mode)) => (width, mode.trim()),
        None => (&rest[..close], ""),
    };
    let truncate = match truncate {
        "" => Truncate::None,
        "trunc" => Truncate::Right,
        "ltrunc" => Truncate::Left,
        "mtrunc" => Truncate::Middle,
        _ => return None,
    };
    let width = width.trim().parse().ok()?;

    Some((
        Alignment {
            width,
            side,
            truncate,
        },
        prefix_len + close + 1,
    ))
}

/// Escape for a named colour directive, e.g. `red` or `reset`.
fn color_escape(name: &str) -> Option<String> {
    if name == "reset" {
        return Some(ansi(ResetColor));
    }

    Color::try_from(name).ok().map(|c| ansi(SetForegroundColor(c)))
}

/// Parses `%C...` after the `C` and returns the escape and consumed bytes.
fn parse_color(spec: &str) -> Option<(String, usize)> {
    if let Some(rest) = spec.strip_prefix('(') {
        let close = rest.find(')')?;

        return color_escape(rest[..close].trim()).map(|escape| (escape, close + 2));
    }

    ["reset", "red", "green", "blue"]
        .into_iter()
        .find(|name| spec.starts_with(name))
        .and_then(|name| color_escape(name).map(|escape| (escape, name.len())))
}

/// Expands `format` with `values`.
///
/// Unknown placeholders are emitted literally, so the expansion never fails.
/// Colour directives produce nothing unless `colorize` is set.
pub fn expand(format: &str, values: &HashMap<&str, String>, colorize: bool) -> String {
    let mut out = String::with_capacity(format.len());
    let mut alignment: Option<Alignment> = None;
    let mut rest = format;

    while let Some(percent) = rest.find('%') {
        out.push_str(&rest[..percent]);
        let directive = &rest[percent + 1..];

        // Modifier: a run of spaces, `+` or `-`.
        let spaces = directive.len() - directive.trim_start_matches(' ').len();
        let (modifier, body) = match directive.as_bytes().first() {
            Some(b'+') => (Some("+"), &directive[1..]),
            Some(b'-') => (Some("-"), &directive[1..]),
            Some(b' ') => (Some(&directive[..spaces]), &directive[spaces..]),
            _ => (None, directive),
        };

        let Some(first) = body.chars().next() else {
            out.push('%');
            out.push_str(directive);
            rest = "";
            break;
        };

        match first {
            'n' if modifier.is_none() => {
                out.push('\n');
                rest = &body[1..];
                continue;
            }
            '%' if modifier.is_none() => {
                out.push('%');
                rest = &body[1..];
                continue;
            }
            'C' if modifier.is_none() => {
                if let Some((escape, consumed)) = parse_color(&body[1..]) {
                    if colorize {
                        out.push_str(&escape);
                    }
                    rest = &body[1 + consumed..];
                    continue;
                }
            }
            '<' | '>' if modifier.is_none() => {
                if let Some((parsed, consumed)) = parse_alignment(body) {
                    alignment = Some(parsed);
                    rest = &body[consumed..];
                    continue;
                }
            }
            _ => {}
        }

        let lookup = [2, 1].into_iter().find_map(|len| {
            let key = body.get(..len)?;

            values.get(key).map(|value| (value, len))
        });

        let Some((value, key_len)) = lookup else {
            out.push('%');
            rest = directive;
            continue;
        };

        let value = match alignment.take() {
            Some(alignment) => alignment.apply(value),
            None => value.clone(),
        };

        match modifier {
            Some("-") if value.is_empty() => {
                let trimmed = out.trim_end_matches('\n').len();
                out.truncate(trimmed);
            }
            Some("+") if !value.is_empty() => out.push('\n'),
            Some(spaces) if !value.is_empty() && spaces.starts_with(' ') => out.push_str(spaces),
            _ => {}
        }

        out.push_str(&value);
        rest = &body[key_len..];
    }

    out.push_str(rest);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_expand_literals_and_newlines() {
        let v = values(&[("t", "title")]);

        assert_eq!(expand("%t%n100%%", &v, false), "title\n100%");
    }

    #[test]
    fn test_two_char_keys_win_over_one_char_keys() {
        let v = values(&[("s", "short"), ("sH", "abc123")]);

        assert_eq!(expand("%sH %s", &v, false), "abc123 short");
    }

    #[test]
    fn test_unknown_placeholder_is_literal() {
        let v = values(&[("t", "x")]);

        assert_eq!(expand("%Z%t%", &v, false), "%Zx%");
    }

    #[test]
    fn test_right_alignment() {
        let v = values(&[("i", "#12")]);

        assert_eq!(expand("%>(6)%i|", &v, false), "   #12|");
        assert_eq!(expand("%<(6)%i|", &v, false), "#12   |");
        assert_eq!(expand("%><(7)%i|", &v, false), "  #12  |");
    }

    #[test]
    fn test_alignment_applies_to_next_placeholder_only() {
        let v = values(&[("i", "1"), ("t", "t")]);

        assert_eq!(expand("%>(3)%i %t", &v, false), "  1 t");
    }

    #[test]
    fn test_truncation() {
        let v = values(&[("t", "abcdefghij")]);

        assert_eq!(expand("%<(6,trunc)%t", &v, false), "abcd..");
        assert_eq!(expand("%<(6,ltrunc)%t", &v, false), "..ghij");
        assert_eq!(expand("%<(6,mtrunc)%t", &v, false), "ab..ij");
    }

    #[test]
    fn test_width_counts_wide_characters() {
        let v = values(&[("t", "日本")]);

        assert_eq!(expand("%>(6)%t", &v, false), "  日本");
    }

    #[test]
    fn test_space_modifier() {
        let v = values(&[("t", "title"), ("l", "bug"), ("e", "")]);

        assert_eq!(expand("%t%  l", &v, false), "title  bug");
        assert_eq!(expand("%t%  e", &v, false), "title");
    }

    #[test]
    fn test_plus_and_minus_modifiers() {
        let v = values(&[("b", "body"), ("e", "")]);

        assert_eq!(expand("x%+b", &v, false), "x\nbody");
        assert_eq!(expand("x%+e", &v, false), "x");
        assert_eq!(expand("x%n%n%-e|", &v, false), "x|");
        assert_eq!(expand("x%n%-b", &v, false), "x\nbody");
    }

    #[test]
    fn test_color_directives() {
        let v = values(&[("t", "t")]);
        let colored = expand("%Cred%t%Creset%C(blue)!", &v, true);

        assert!(colored.starts_with('\x1b'));
        assert_eq!(strip_ansi(&colored), "t!");
        assert_eq!(expand("%Cred%t%Creset%C(blue)!", &v, false), "t!");
    }

    #[test]
    fn test_colorless_output_equals_stripped_colored_output() {
        let v = values(&[("i", "#3"), ("t", "title")]);
        let format = "%Cgreen%>(8)%i%Creset  %t%n";

        assert_eq!(
            strip_ansi(&expand(format, &v, true)),
            expand(format, &v, false)
        );
    }

    #[test]
    fn test_alignment_ignores_escapes() {
        let colored = format!("{}x{}", ansi(SetForegroundColor(Color::Red)), ansi(ResetColor));
        let v = values(&[("x", &colored)]);

        assert_eq!(strip_ansi(&expand("%>(3)%x", &v, false)), "  x");
    }
}
