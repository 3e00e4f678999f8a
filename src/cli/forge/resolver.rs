//! Turns `[owner/]name` shorthands into clone URLs.

use std::path::Path;

use crate::{
    cli::{
        Context,
        forge::project::{Project, Protocol, Transport},
    },
    error::HubError,
};

const WIKI_SUFFIX: &str = ".wiki";

/// A parsed `[owner/]name[.wiki]` token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shorthand {
    pub owner: Option<String>,
    pub name: String,
    pub wiki: bool,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_owner_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-')
}

/// Whether `token` is already something git can clone: a URL, an scp-like
/// address, or an existing local path (relative to `base` when given).
pub fn is_cloneable(token: &str, base: Option<&Path>) -> bool {
    if token.contains("://") || token.starts_with("git@") {
        return true;
    }

    let path = Path::new(token);

    match base {
        Some(base) if path.is_relative() => base.join(path).exists(),
        _ => path.exists(),
    }
}

/// Parses `[owner/]name[.wiki]`.
pub fn parse_shorthand(token: &str) -> Option<Shorthand> {
    let (owner, name) = match token.split_once('/') {
        Some((owner, name)) => (Some(owner), name),
        None => (None, token),
    };

    if name.is_empty() || !name.chars().all(is_name_char) {
        return None;
    }

    if owner.is_some_and(|owner| owner.is_empty() || !owner.chars().all(is_name_char)) {
        return None;
    }

    let (name, wiki) = match name.strip_suffix(WIKI_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => (stripped, true),
        _ => (name, false),
    };

    Some(Shorthand {
        owner: owner.map(str::to_string),
        name: name.to_string(),
        wiki,
    })
}

/// Parses `owner[/name]` as accepted by `remote add` and `fetch`, where the
/// owner comes first and the name is optional.
pub fn parse_owner_shorthand(token: &str) -> Option<(String, Option<String>)> {
    let (owner, name) = match token.split_once('/') {
        Some((owner, name)) => (owner, Some(name)),
        None => (token, None),
    };

    if owner.is_empty() || !owner.chars().all(is_owner_char) {
        return None;
    }

    if name.is_some_and(|name| name.is_empty() || !name.chars().all(is_name_char)) {
        return None;
    }

    Some((owner.to_string(), name.map(str::to_string)))
}

/// Picks the transport of a generated URL.
///
/// An explicit `-p` forces SSH; otherwise an `https` or `ssh` preference
/// wins; otherwise SSH is used when allowed and the repository is private or
/// writable, and `git://` in all remaining cases.
pub fn select_transport(
    protocol: Option<Protocol>,
    private: bool,
    can_push: bool,
    force_ssh: bool,
    allow_ssh: bool,
) -> Transport {
    if force_ssh {
        return Transport::Ssh;
    }

    match protocol {
        Some(Protocol::Https) => Transport::Https,
        Some(Protocol::Ssh) => Transport::Ssh,
        Some(Protocol::Git) | None if allow_ssh && (private || can_push) => Transport::Ssh,
        Some(Protocol::Git) | None => Transport::Git,
    }
}

/// Resolves a clone shorthand to a URL, or `None` when `token` should be
/// left alone.
///
/// # Errors
///
/// Fails when the repository doesn't exist or has no wiki while one was
/// asked for.
pub fn resolve_clone_url(
    ctx: &mut Context,
    token: &str,
    force_ssh: bool,
    allow_ssh: bool,
) -> anyhow::Result<Option<String>> {
    if is_cloneable(token, ctx.repo.dir()) {
        return Ok(None);
    }

    let Some(shorthand) = parse_shorthand(token) else {
        return Ok(None);
    };

    let hostname = ctx.settings.default_host().to_string();
    let client = ctx.client(&hostname)?;
    let owner = match shorthand.owner {
        Some(owner) => owner,
        None => ctx.current_user(&hostname)?,
    };

    let repo = client.repository(&Project::new(&owner, &shorthand.name, &hostname))?;
    let mut project = repo.project.clone();

    if shorthand.wiki {
        if !repo.has_wiki {
            return Err(HubError::NotFound(format!("{project} doesn't have a wiki")).into());
        }

        project.name.push_str(WIKI_SUFFIX);
    }

    let transport = select_transport(
        ctx.protocol(&hostname)?,
        repo.private,
        repo.can_push,
        force_ssh,
        allow_ssh,
    );
    let url = project.git_url(transport);

    tracing::debug!("Resolved {token} to {url}");

    Ok(Some(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        assert_eq!(
            parse_shorthand("rtomayko/ronn"),
            Some(Shorthand {
                owner: Some("rtomayko".to_string()),
                name: "ronn".to_string(),
                wiki: false
            })
        );
        assert_eq!(
            parse_shorthand("hub.wiki"),
            Some(Shorthand {
                owner: None,
                name: "hub".to_string(),
                wiki: true
            })
        );
        assert_eq!(parse_shorthand("a/b/c"), None);
        assert_eq!(parse_shorthand("git@github.com:a/b"), None);
        assert_eq!(parse_shorthand("/b"), None);
        assert_eq!(parse_shorthand("a/"), None);
    }

    #[test]
    fn test_parse_owner_shorthand() {
        assert_eq!(
            parse_owner_shorthand("mislav"),
            Some(("mislav".to_string(), None))
        );
        assert_eq!(
            parse_owner_shorthand("mislav/hub.js"),
            Some(("mislav".to_string(), Some("hub.js".to_string())))
        );
        assert_eq!(parse_owner_shorthand("git@github.com:jingweno/gh.git"), None);
        assert_eq!(parse_owner_shorthand("https://github.com/a/b"), None);
    }

    #[test]
    fn test_urls_and_existing_paths_are_cloneable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ronn")).unwrap();

        assert!(is_cloneable("git://github.com/a/b.git", None));
        assert!(is_cloneable("git@github.com:a/b.git", None));
        assert!(is_cloneable("ronn", Some(dir.path())));
        assert!(!is_cloneable("hub", Some(dir.path())));
    }

    #[test]
    fn test_select_transport() {
        use Transport::*;

        assert_eq!(select_transport(None, false, false, false, true), Git);
        assert_eq!(select_transport(Some(Protocol::Git), true, false, false, true), Ssh);
        assert_eq!(select_transport(None, false, true, false, true), Ssh);
        assert_eq!(select_transport(None, true, true, false, false), Git);
        assert_eq!(select_transport(Some(Protocol::Https), true, true, false, true), Https);
        assert_eq!(select_transport(Some(Protocol::Https), false, false, true, true), Ssh);
        assert_eq!(select_transport(Some(Protocol::Ssh), false, false, false, false), Ssh);
    }
}
