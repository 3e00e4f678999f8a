//! The `(host, owner, name)` triple and the URLs derived from it.

use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::settings::DEFAULT_HOST;

/// Preferred clone protocol, as configured by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum Protocol {
    Https,
    Ssh,
    Git,
}

/// Concrete transport of a generated URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// Unauthenticated `git://`.
    Git,
    /// Encrypted `git@host:` (or `ssh://` when a port is involved).
    Ssh,
    /// `https://`, authenticated by git's credential helpers.
    Https,
}

/// A repository on a forge host.
///
/// Owner and name compare case-insensitively but keep their casing for
/// display.
#[derive(Clone, Debug, Eq)]
pub struct Project {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.host.eq_ignore_ascii_case(&other.host)
            && self.owner.eq_ignore_ascii_case(&other.owner)
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl Project {
    pub fn new(owner: &str, name: &str, host: &str) -> Self {
        let host = if host.is_empty() { DEFAULT_HOST } else { host };

        Project {
            host: host.to_lowercase(),
            owner: owner.to_string(),
            name: name.strip_suffix(".git").unwrap_or(name).to_string(),
        }
    }

    /// Recovers the project from a git remote URL.
    ///
    /// Supports the following formats:
    /// - scp-like: `git@<host>:<owner>/<name>[.git]`
    /// - `ssh://git@<host>[:<port>]/<owner>/<name>[.git]`
    /// - `https://<host>[:<port>]/<owner>/<name>[.git]` (and `http://`)
    /// - `git://<host>/<owner>/<name>[.git]`
    pub fn from_url(url: &str) -> Option<Project> {
        let url = url.trim();

        if let Some((user_host, path)) = split_scp_like(url) {
            let host = user_host
                .rsplit_once('@')
                .map_or(user_host, |(_, host)| host);

            return project_from_path(host, path);
        }

        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let host = match (parsed.scheme(), parsed.port()) {
            ("https" | "http", Some(port)) => format!("{host}:{port}"),
            _ => host.to_string(),
        };

        match parsed.scheme() {
            "https" | "http" | "ssh" | "git" | "git+ssh" | "ssh+git" => {
                project_from_path(&host, parsed.path())
            }
            _ => None,
        }
    }

    /// `owner/name`
    pub fn name_with_owner(&self) -> String {
        self.to_string()
    }

    pub fn git_url(&self, transport: Transport) -> String {
        let (host, owner, name) = (&self.host, &self.owner, &self.name);

        match transport {
            Transport::Https => format!("https://{host}/{owner}/{name}.git"),
            Transport::Ssh if host.contains(':') => {
                format!("ssh://git@{host}/{owner}/{name}.git")
            }
            Transport::Ssh => format!("git@{host}:{owner}/{name}.git"),
            Transport::Git => format!("git://{host}/{owner}/{name}.git"),
        }
    }

    /// Web URL of the project, optionally pointing at a sub page such as
    /// `pull/42` or `issues`.
    pub fn web_url(&self, path: &str) -> String {
        let base = format!("https://{}/{}/{}", self.host, self.owner, self.name);
        let path = path.trim_start_matches('/');

        if path.is_empty() {
            base
        } else {
            format!("{base}/{path}")
        }
    }

    /// Same repository name on another owner's account.
    pub fn with_owner(&self, owner: &str) -> Project {
        Project::new(owner, &self.name, &self.host)
    }
}

/// Splits `[user@]host:path` where the part before the colon contains no
/// slash. URLs with a scheme are not scp-like.
fn split_scp_like(url: &str) -> Option<(&str, &str)> {
    if url.contains("://") {
        return None;
    }

    let (user_host, path) = url.split_once(':')?;

    if user_host.is_empty() || user_host.contains('/') || path.is_empty() {
        return None;
    }

    Some((user_host, path))
}

fn project_from_path(host: &str, path: &str) -> Option<Project> {
    let mut segments = path.trim_matches('/').splitn(3, '/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let name = segments.next().filter(|s| !s.is_empty())?;

    Some(Project::new(owner, name, host))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(owner: &str, name: &str, host: &str) -> Project {
        Project::new(owner, name, host)
    }

    #[test]
    fn test_from_url_https() {
        assert_eq!(
            Project::from_url("https://github.com/user/repo.git"),
            Some(project("user", "repo", "github.com"))
        );
        assert_eq!(
            Project::from_url("https://github.com/user/repo"),
            Some(project("user", "repo", "github.com"))
        );
    }

    #[test]
    fn test_from_url_https_with_port() {
        let result = Project::from_url("https://git.example.com:8443/user/repo.git").unwrap();

        assert_eq!(result.host, "git.example.com:8443");
        assert_eq!(result.name_with_owner(), "user/repo");
    }

    #[test]
    fn test_from_url_ssh() {
        assert_eq!(
            Project::from_url("ssh://git@github.com/user/repo.git"),
            Some(project("user", "repo", "github.com"))
        );

        // The ssh port is not part of the web host.
        let result = Project::from_url("ssh://git@ghe.example.com:2222/user/repo").unwrap();
        assert_eq!(result.host, "ghe.example.com");
    }

    #[test]
    fn test_from_url_scp_like() {
        assert_eq!(
            Project::from_url("git@github.com:user/repo.git"),
            Some(project("user", "repo", "github.com"))
        );
        assert_eq!(
            Project::from_url("github.com:user/repo"),
            Some(project("user", "repo", "github.com"))
        );
    }

    #[test]
    fn test_from_url_git_protocol() {
        assert_eq!(
            Project::from_url("git://github.com/defunkt/hub.git"),
            Some(project("defunkt", "hub", "github.com"))
        );
    }

    #[test]
    fn test_from_url_rejects_local_paths() {
        assert_eq!(Project::from_url("/tmp/some/repo"), None);
        assert_eq!(Project::from_url("../repo"), None);
        assert_eq!(Project::from_url("https://github.com/only-owner"), None);
    }

    #[test]
    fn test_equality_ignores_case_but_display_keeps_it() {
        let a = project("Mislav", "Hub", "GitHub.com");
        let b = project("mislav", "hub", "github.com");

        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Mislav/Hub");
    }

    #[test]
    fn test_git_url_per_transport() {
        let p = project("rtomayko", "ronn", "github.com");

        assert_eq!(p.git_url(Transport::Git), "git://github.com/rtomayko/ronn.git");
        assert_eq!(p.git_url(Transport::Ssh), "git@github.com:rtomayko/ronn.git");
        assert_eq!(
            p.git_url(Transport::Https),
            "https://github.com/rtomayko/ronn.git"
        );
        assert_eq!(
            project("a", "b", "ghe.local:8080").git_url(Transport::Ssh),
            "ssh://git@ghe.local:8080/a/b.git"
        );
    }

    #[test]
    fn test_web_url() {
        let p = project("jingweno", "gh", "github.com");

        assert_eq!(p.web_url(""), "https://github.com/jingweno/gh");
        assert_eq!(p.web_url("pull/12"), "https://github.com/jingweno/gh/pull/12");
    }
}
