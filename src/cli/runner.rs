//! Dispatch to command handlers and execution of the resulting git commands.

use std::{io::Write, process::Command};

use anyhow::Context as _;
use clap::{Parser, error::ErrorKind};

use crate::{
    cli::{
        CommandKind, CommandSpec, Context,
        args::{Args, Cmd},
        flags::{FlagSet, HelpFlag, value_flag_names},
    },
    error::HubError,
};

/// Runs the handler for `root`, or for its subcommand named by the first
/// parameter.
///
/// # Errors
///
/// Fails with a usage error when the known flags don't parse, and with a
/// silent exit after printing help for `--help`.
pub fn dispatch(
    ctx: &mut Context,
    root: &'static CommandSpec,
    args: &mut Args,
) -> anyhow::Result<()> {
    let subcommand = args
        .first_param()
        .and_then(|first| root.subcommands.iter().find(|spec| spec.key == first));
    let spec = match subcommand {
        Some(spec) => {
            args.remove_param(0);
            spec
        }
        None => root,
    };

    if let Some(grammar) = spec.known_flags {
        let grammar = grammar();

        for names in value_flag_names(&grammar) {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            args.register_value_flags(&names);
        }

        args.flag = match FlagSet::parse(grammar, args.params()) {
            Ok(flags) => flags,
            Err(e) if e.kind() == ErrorKind::DisplayHelp => {
                write!(ctx.out(), "{}", e.render())?;
                return Err(HubError::Exit(0).into());
            }
            Err(e) => {
                let message = e.render().to_string();
                return Err(HubError::Usage(message.trim().to_string()).into());
            }
        };
    }

    tracing::debug!("Running `{}` handler", spec.key);
    (spec.run)(ctx, args)?;

    if root.kind == CommandKind::Builtin && args.is_forwarded() && args.command == root.key {
        anyhow::bail!(
            "Internal error: `{}` neither handled the request nor replaced it",
            root.key
        );
    }

    Ok(())
}

/// Runs the before-chain, the main command unless it isn't forwarded, and
/// the after-chain. With `--noop` the commands are printed instead.
///
/// Without an after-chain the main command replaces the process on Unix.
pub fn execute(ctx: &mut Context, args: &Args) -> anyhow::Result<()> {
    let commands = args.commands();

    if args.noop {
        for cmd in &commands {
            writeln!(ctx.out(), "{cmd}")?;
        }

        return Ok(());
    }

    let before_len = args.before_chain().len();
    let (before, rest) = commands.split_at(before_len);

    for cmd in before {
        run(cmd)?;
    }

    let after = if args.is_forwarded() {
        let Some((main, after)) = rest.split_first() else {
            return Ok(());
        };

        ctx.out().flush()?;

        if after.is_empty() {
            return exec(main);
        }

        run(main)?;
        after
    } else {
        rest
    };

    for cmd in after {
        run(cmd)?;
    }

    Ok(())
}

fn command(cmd: &Cmd) -> Command {
    let mut command = Command::new(&cmd.program);
    command.args(&cmd.args);

    command
}

fn run(cmd: &Cmd) -> anyhow::Result<()> {
    tracing::debug!("$ {cmd}");

    let status = command(cmd)
        .status()
        .with_context(|| format!("Failed to execute {cmd}"))?;

    if !status.success() {
        return Err(HubError::Vcs {
            command: cmd.to_string(),
            code: status.code().and_then(|c| u8::try_from(c).ok()).unwrap_or(1),
        }
        .into());
    }

    Ok(())
}

#[cfg(unix)]
fn exec(cmd: &Cmd) -> anyhow::Result<()> {
    use std::os::unix::process::CommandExt;

    tracing::debug!("exec {cmd}");

    // Only returns on failure.
    let err = command(cmd).exec();

    Err(err).with_context(|| format!("Failed to execute {cmd}"))
}

#[cfg(not(unix))]
fn exec(cmd: &Cmd) -> anyhow::Result<()> {
    let status = command(cmd)
        .status()
        .with_context(|| format!("Failed to execute {cmd}"))?;

    match status.code().and_then(|c| u8::try_from(c).ok()) {
        Some(0) => Ok(()),
        code => Err(HubError::Exit(code.unwrap_or(1)).into()),
    }
}

// =============================================================================
// Version
// =============================================================================

/// Show git's and hub's versions.
#[derive(Parser)]
#[command(name = "hub version", disable_help_flag = true)]
pub struct VersionFlags {
    #[command(flatten)]
    help: HelpFlag,
}

pub fn version(ctx: &mut Context, args: &mut Args) -> anyhow::Result<()> {
    args.no_forward();

    let git_version = ctx.repo.output(&["version"])?;

    writeln!(ctx.out(), "{git_version}")?;
    writeln!(ctx.out(), "hub version {}", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
