//! `sync`: bring local branches up to date with the main remote.

use std::io::Write;

use clap::Parser;

use crate::{
    cli::{Context, args::Args, flags::HelpFlag},
    git::Branch,
};

/// Fetch the main remote and update local branches that track it.
#[derive(Parser)]
#[command(name = "hub sync", disable_help_flag = true)]
pub struct SyncFlags {
    #[command(flatten)]
    help: HelpFlag,
}

pub fn sync(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let _flags: SyncFlags = args.flag.typed()?;
    args.no_forward();

    let known_hosts = ctx.known_hosts()?;
    let (remote, _) = ctx.repo.main_project(&known_hosts)?;

    if args.noop {
        writeln!(ctx.out(), "Would fetch {} and update local branches", remote.name)?;
        return Ok(());
    }

    ctx.repo.spawn(&["fetch", "--prune", "--quiet", &remote.name])?;

    sync_branches(ctx, &remote.name)
}

/// Fast-forwards branches tracking `remote` and deletes the ones whose
/// upstream is gone once they're merged into the default branch.
fn sync_branches(ctx: &mut Context, remote: &str) -> anyhow::Result<()> {
    let default = ctx.repo.default_branch(remote)?;
    let default_ref = format!("refs/remotes/{remote}/{}", default.short_name());
    let current = ctx.repo.current_branch().ok();

    for branch in ctx.repo.local_branches()? {
        let Some(upstream) = ctx.repo.upstream(&branch)? else {
            continue;
        };

        if upstream.remote != remote {
            continue;
        }

        let name = branch.short_name();
        let local_sha = ctx.repo.rev_parse(&branch.name)?;
        let remote_ref = format!("refs/remotes/{}", upstream.remote_ref_name());
        let is_current = current.as_ref() == Some(&branch);

        if ctx.repo.ref_exists(&remote_ref)? {
            let remote_sha = ctx.repo.rev_parse(&remote_ref)?;

            if local_sha == remote_sha {
                continue;
            }

            if !ctx.repo.is_ancestor(&local_sha, &remote_sha)? {
                writeln!(ctx.out(), "warning: '{name}' seems to contain unpushed commits")?;
                continue;
            }

            if is_current {
                ctx.repo.output(&["merge", "--ff-only", "--quiet", &remote_ref])?;
            } else {
                ctx.repo.output(&["update-ref", &branch.name, &remote_sha])?;
            }

            writeln!(
                ctx.out(),
                "Updated branch {name} (was {}).",
                short_sha(&local_sha)
            )?;
        } else if branch != default && ctx.repo.is_ancestor(&local_sha, &default_ref)? {
            if is_current {
                checkout(ctx, &default)?;
            }

            ctx.repo.output(&["branch", "-D", name])?;
            writeln!(
                ctx.out(),
                "Deleted branch {name} (was {}).",
                short_sha(&local_sha)
            )?;
        } else {
            writeln!(
                ctx.out(),
                "warning: '{name}' was deleted on {remote}, but appears not merged into '{}'",
                default.short_name()
            )?;
        }
    }

    Ok(())
}

fn checkout(ctx: &mut Context, branch: &Branch) -> anyhow::Result<()> {
    tracing::debug!("Leaving branch about to be deleted for {}", branch.short_name());
    ctx.repo.output(&["checkout", "--quiet", branch.short_name()])?;

    Ok(())
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
