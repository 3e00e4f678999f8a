//! `clone` and `submodule add`: expand `[owner/]name` into a clone URL.

use crate::cli::{Context, args::Args, forge::resolve_clone_url};

const PRIVATE_FLAG: &str = "-p";

/// Value-taking flags shared by `clone` and `submodule add`.
const COMMON_VALUE_FLAGS: &[&[&str]] = &[&["--branch", "-b"], &["--depth"], &["--reference"]];

const CLONE_VALUE_FLAGS: &[&[&str]] = &[
    &["--config", "-c"],
    &["--jobs", "-j"],
    &["--origin", "-o"],
    &["--reference-if-able"],
    &["--separate-git-dir"],
    &["--shallow-exclude"],
    &["--shallow-since"],
    &["--template"],
    &["--upload-pack", "-u"],
];

const SUBMODULE_VALUE_FLAGS: &[&[&str]] = &[&["--name"]];

pub fn clone(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    transform_clone_args(ctx, args, CLONE_VALUE_FLAGS, 0, true)
}

/// Only `submodule add` is rewritten; SSH is never picked automatically
/// because submodule URLs are fetched by non-interactive processes.
pub fn submodule(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    if !args.has_subcommand("add") {
        return Ok(());
    }

    transform_clone_args(ctx, args, SUBMODULE_VALUE_FLAGS, 1, false)
}

/// Rewrites the repository positional (the `skip`-th word). Only that one
/// positional is touched; the directory argument after it stays as given.
fn transform_clone_args(
    ctx: &mut Context,
    args: &mut Args,
    value_flags: &[&[&str]],
    skip: usize,
    allow_ssh: bool,
) -> anyhow::Result<()> {
    let force_ssh = match args.index_of_param(PRIVATE_FLAG) {
        Some(index) => {
            args.remove_param(index);
            true
        }
        None => false,
    };

    for names in COMMON_VALUE_FLAGS.iter().chain(value_flags) {
        args.register_value_flags(names);
    }

    let Some(&index) = args.positional_indices().get(skip) else {
        return Ok(());
    };
    let token = args.params()[index].clone();

    if let Some(url) = resolve_clone_url(ctx, &token, force_ssh, allow_ssh)? {
        args.replace_param(index, url);
    }

    Ok(())
}
