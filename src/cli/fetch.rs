//! `fetch <owner>[,<owner>...]`: add missing remotes for forks before
//! fetching from them.

use crate::{
    cli::{
        Context,
        args::{Args, Cmd},
        forge::{is_cloneable, parse_owner_shorthand, select_transport},
    },
    error::is_not_found,
};

const MULTIPLE_FLAG: &str = "--multiple";

pub fn fetch(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    let names = remote_names(args);
    let mut missing = Vec::new();

    for name in names {
        let is_owner = parse_owner_shorthand(&name).is_some_and(|(_, repo)| repo.is_none());

        if !is_owner || is_cloneable(&name, ctx.repo.dir()) {
            continue;
        }

        if ctx.repo.remote_by_name(&name)?.is_none() {
            missing.push(name);
        }
    }

    if missing.is_empty() {
        return Ok(());
    }

    let main_project = ctx.main_project()?;
    let client = ctx.client(&main_project.host)?;
    let protocol = ctx.protocol(&main_project.host)?;

    for owner in missing {
        let project = main_project.with_owner(&owner);

        let repo = match client.repository(&project) {
            Ok(repo) => repo,
            Err(e) if is_not_found(&e) => {
                tracing::debug!("Skipping {project}: {e:#}");
                continue;
            }
            Err(e) => return Err(e),
        };

        let transport = select_transport(protocol, repo.private, repo.can_push, false, true);
        let url = repo.project.git_url(transport);

        args.before(Cmd::git(&["remote", "add", &owner, &url]));
    }

    Ok(())
}

/// Remote names being fetched. A comma-separated list is expanded in place
/// into `--multiple a b c`.
fn remote_names(args: &mut Args) -> Vec<String> {
    if args.index_of_param(MULTIPLE_FLAG).is_some() {
        return args.words();
    }

    let Some(&index) = args.positional_indices().first() else {
        return Vec::new();
    };
    let first = args.params()[index].clone();

    let names: Vec<String> = first.split(',').map(str::to_string).collect();
    let is_list = names.len() > 1
        && names
            .iter()
            .all(|name| parse_owner_shorthand(name).is_some_and(|(_, repo)| repo.is_none()));

    if is_list {
        args.remove_param(index);

        let mut replacement = vec![MULTIPLE_FLAG.to_string()];
        replacement.extend(names.iter().cloned());
        args.insert_params(index, &replacement);
    }

    if is_list { names } else { vec![first] }
}
