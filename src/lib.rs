mod cli;
mod error;
mod git;
mod io;
mod logging;
mod settings;
mod template;

pub use error::{exit_code, is_silent};

use std::ffi::OsString;

use crate::{
    cli::{Context, args::Args, runner},
    error::HubError,
    git::GitRepo,
    settings::Settings,
};

/// Rewrites the command line, runs hub's handler for it if there is one, and
/// executes the resulting git commands.
pub fn run() -> anyhow::Result<()> {
    let settings = Settings::from_env();
    logging::init_logging(settings.verbose);

    let argv = utf8_args(std::env::args_os().skip(1))?;
    let mut args = Args::new(&argv);
    let repo = GitRepo::new(args.work_dir()).with_globals(args.repo_flags());
    let mut ctx = Context::new(settings, repo);

    if let Some(spec) = cli::lookup(&args.command) {
        runner::dispatch(&mut ctx, spec, &mut args)?;
    }

    runner::execute(&mut ctx, &args)
}

/// Command-line arguments as strings; hub rewrites them textually, so
/// anything that isn't UTF-8 is rejected rather than altered.
fn utf8_args(argv: impl IntoIterator<Item = OsString>) -> anyhow::Result<Vec<String>> {
    argv.into_iter()
        .map(|arg| {
            arg.into_string().map_err(|arg| {
                HubError::Usage(format!(
                    "argument is not valid UTF-8: {}",
                    arg.to_string_lossy()
                ))
                .into()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_args() {
        let argv = utf8_args(["clone".into(), "ronn".into()]).unwrap();

        assert_eq!(argv, ["clone", "ronn"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_argument_is_a_usage_error() {
        use std::os::unix::ffi::OsStringExt;

        let argv = [OsString::from("clone"), OsString::from_vec(vec![0x66, 0x80])];

        let err = utf8_args(argv).unwrap_err();

        assert_eq!(exit_code(&err), 2);
        assert!(err.to_string().starts_with("argument is not valid UTF-8"));
    }
}
