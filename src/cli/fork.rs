//! `fork`: fork the current repository and add a remote for the fork.

use std::io::Write;

use clap::Parser;

use crate::{
    cli::{
        Context,
        args::{Args, Cmd},
        flags::HelpFlag,
        forge::{Project, select_transport},
    },
    error::{HubError, is_not_found},
};

/// Make a fork of the current repository on GitHub and add it as a git
/// remote.
#[derive(Parser)]
#[command(name = "hub fork", disable_help_flag = true)]
pub struct ForkFlags {
    /// Skip adding a git remote for the fork
    #[arg(long)]
    no_remote: bool,

    /// Name of the new remote (defaults to the fork's owner)
    #[arg(long, value_name = "NAME")]
    remote_name: Option<String>,

    /// Fork into this organization instead of the user's account
    #[arg(long, value_name = "ORGANIZATION")]
    org: Option<String>,

    #[command(flatten)]
    help: HelpFlag,
}

pub fn fork(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let flags: ForkFlags = args.flag.typed()?;
    args.no_forward();

    let known_hosts = ctx.known_hosts()?;
    let (main_remote, project) = ctx.repo.main_project(&known_hosts)?;
    let user = ctx.current_user(&project.host)?;
    let owner = flags.org.clone().unwrap_or(user);

    if project.owner.eq_ignore_ascii_case(&owner) {
        return Err(HubError::user_input(format!(
            "Error creating fork: {project} is already owned by {owner}"
        ))
        .into());
    }

    let remote_name = flags.remote_name.clone().unwrap_or_else(|| owner.clone());

    if !flags.no_remote && ctx.repo.remote_by_name(&remote_name)?.is_some() {
        return Err(HubError::user_input(format!("remote '{remote_name}' already exists")).into());
    }

    let (fork_project, private) = if args.noop {
        (project.with_owner(&owner), false)
    } else {
        find_or_create_fork(ctx, &project, &owner, flags.org.as_deref())?
    };

    if flags.no_remote {
        writeln!(ctx.out(), "new fork: {fork_project}")?;
        return Ok(());
    }

    let protocol = ctx.protocol(&fork_project.host)?;
    let url = fork_project.git_url(select_transport(protocol, private, true, false, true));

    args.before(Cmd::git(&[
        "remote",
        "add",
        "-f",
        &remote_name,
        &main_remote.url,
    ]));
    args.before(Cmd::git(&["remote", "set-url", &remote_name, &url]));

    writeln!(ctx.out(), "new remote: {remote_name}")?;

    Ok(())
}

/// Reuses `owner`'s existing fork of `project`, or asks the forge for a new
/// one. Returns the fork and whether it's private.
fn find_or_create_fork(
    ctx: &mut Context,
    project: &Project,
    owner: &str,
    org: Option<&str>,
) -> anyhow::Result<(Project, bool)> {
    let client = ctx.client(&project.host)?;
    let candidate = project.with_owner(owner);

    match client.repository(&candidate) {
        Ok(existing) if existing.parent.as_ref() == Some(project) => {
            tracing::debug!("Reusing existing fork {}", existing.project);
            return Ok((existing.project, existing.private));
        }
        Ok(existing) => {
            return Err(HubError::user_input(format!(
                "Error creating fork: {} already exists on {}",
                existing.project, existing.project.host
            ))
            .into());
        }
        Err(e) if is_not_found(&e) => {}
        Err(e) => return Err(e),
    }

    let fork = client.fork(project, org)?;

    Ok((fork.project, fork.private))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{
        forge::Repository,
        lookup,
        runner::dispatch,
        test_support::{FakeForge, Harness, repository},
    };

    fn upstream() -> Project {
        Project::new("github", "hub", "github.com")
    }

    fn harness(repos: Vec<Repository>) -> Harness {
        Harness::new(FakeForge {
            user: "jingweno".to_string(),
            repositories: repos,
            ..Default::default()
        })
        .with_origin("github", "hub")
    }

    fn run(h: &mut Harness, argv: &[&str]) -> anyhow::Result<Args> {
        let mut args = Args::new(argv);

        dispatch(&mut h.ctx, lookup("fork").unwrap(), &mut args)?;

        Ok(args)
    }

    fn commands(args: &Args) -> Vec<String> {
        args.commands().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_fork_creates_fork_and_remote() {
        let mut h = harness(vec![]);

        let args = run(&mut h, &["fork"]).unwrap();

        assert_eq!(h.forge.forks.borrow()[0], (upstream(), None));
        assert_eq!(
            commands(&args),
            vec![
                "git remote add -f jingweno git@github.com:github/hub.git",
                "git remote set-url jingweno git@github.com:jingweno/hub.git",
            ]
        );
        assert_eq!(h.output.contents(), "new remote: jingweno\n");
    }

    #[test]
    fn test_fork_into_org_with_remote_name() {
        let mut h = harness(vec![]);

        let args = run(&mut h, &["fork", "--org", "acme", "--remote-name", "mine"]).unwrap();

        assert_eq!(
            h.forge.forks.borrow()[0],
            (upstream(), Some("acme".to_string()))
        );
        assert_eq!(
            commands(&args)[1],
            "git remote set-url mine git@github.com:acme/hub.git"
        );
    }

    #[test]
    fn test_existing_fork_is_reused() {
        let existing = Repository {
            parent: Some(upstream()),
            ..repository(upstream().with_owner("jingweno"))
        };
        let mut h = harness(vec![existing]);

        run(&mut h, &["fork", "--no-remote"]).unwrap();

        assert!(h.forge.forks.borrow().is_empty());
        assert_eq!(h.output.contents(), "new fork: jingweno/hub\n");
    }

    #[test]
    fn test_unrelated_repository_with_same_name_is_an_error() {
        let mut h = harness(vec![repository(upstream().with_owner("jingweno"))]);

        let err = run(&mut h, &["fork"]).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Error creating fork: jingweno/hub already exists on github.com"
        );
    }

    #[test]
    fn test_existing_remote_name_is_an_error() {
        let mut h = harness(vec![]);
        h.git(&["remote", "add", "jingweno", "git@github.com:jingweno/hub.git"]);

        let err = run(&mut h, &["fork"]).unwrap_err();

        assert_eq!(err.to_string(), "remote 'jingweno' already exists");
        assert!(h.forge.forks.borrow().is_empty());
    }

    #[test]
    fn test_forking_own_repository_is_an_error() {
        let mut h = Harness::new(FakeForge {
            user: "jingweno".to_string(),
            ..Default::default()
        })
        .with_origin("jingweno", "hub");

        let err = run(&mut h, &["fork"]).unwrap_err();

        assert!(err.to_string().contains("already owned by jingweno"));
    }
}
