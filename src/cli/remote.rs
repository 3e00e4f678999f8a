//! `remote add` and `remote set-url`: synthesise the URL from an owner.

use crate::{
    cli::{
        Context,
        args::Args,
        forge::{Project, parse_owner_shorthand, select_transport},
    },
    settings::DEFAULT_HOST,
};

const PRIVATE_FLAG: &str = "-p";

/// Rewrites `remote add [-p] <owner>[/<repo>]`,
/// `remote add [-p] <name> <owner>[/<repo>]` and the same forms of
/// `set-url` by appending a URL.
///
/// The forge isn't queried: SSH is picked for `-p`, for the authenticated
/// user's own repositories and for hosts other than github.com.
pub fn remote(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    if !(args.has_subcommand("add") || args.has_subcommand("set-url")) {
        return Ok(());
    }

    args.register_value_flags(&["-t"]);
    args.register_value_flags(&["-m"]);

    let words = args.words();

    if !(2..=3).contains(&words.len()) {
        return Ok(());
    }

    let Some((mut owner, name)) = words.last().and_then(|w| parse_owner_shorthand(w)) else {
        return Ok(());
    };

    let mut force_ssh = match args.index_of_param(PRIVATE_FLAG) {
        Some(index) => {
            args.remove_param(index);
            true
        }
        None => false,
    };

    let (repo_name, hostname) = match ctx.main_project() {
        Ok(project) => (project.name, project.host),
        Err(_) => (ctx.repo.dir_name()?, ctx.settings.default_host().to_string()),
    };
    let mut name = name.unwrap_or_else(|| repo_name.clone());
    let user = ctx.current_user(&hostname)?;

    if words.len() == 2 && words[1] == "origin" {
        owner = user.clone();
        name = repo_name;
    } else if words.len() == 2 {
        // `remote add mislav/hub` names the remote after the owner.
        if let Some(index) = args.index_of_param(&words[1]) {
            args.replace_param(index, owner.clone());
        }
    } else if let Some(&index) = args.positional_indices().last() {
        args.remove_param(index);
    }

    if owner.eq_ignore_ascii_case(&user) {
        owner = user;
        force_ssh = true;
    }

    if hostname != DEFAULT_HOST {
        force_ssh = true;
    }

    let project = Project::new(&owner, &name, &hostname);
    let transport = select_transport(ctx.protocol(&hostname)?, false, false, force_ssh, false);

    args.append_params(&[project.git_url(transport)]);

    Ok(())
}
