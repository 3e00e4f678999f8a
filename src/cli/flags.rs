//! Known-flags grammars of hub's own commands, parsed with `clap`.

use clap::{ArgAction, ArgMatches, Command, FromArgMatches, parser::ValueSource};

use crate::io::ColorWhen;

/// `--help` only, since several commands use `-h` for `--head`.
#[derive(clap::Args, Debug)]
pub struct HelpFlag {
    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

/// `--color[=WHEN]`
#[derive(clap::Args, Debug)]
pub struct ColorFlag {
    /// Colorize output: always, never or auto (the default, only on a terminal)
    #[arg(
        long,
        value_name = "WHEN",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "always"
    )]
    pub color: Option<ColorWhen>,
}

/// Flags parsed from a command's known-flags grammar.
///
/// Lookups by id never panic: ids the grammar doesn't define read as unset.
#[derive(Debug, Default)]
pub struct FlagSet {
    matches: Option<ArgMatches>,
}

impl FlagSet {
    /// Parses `params` against `grammar`.
    pub fn parse(grammar: Command, params: &[String]) -> Result<Self, clap::Error> {
        let matches = grammar
            .no_binary_name(true)
            .try_get_matches_from(params)?;

        Ok(FlagSet {
            matches: Some(matches),
        })
    }

    /// Converts the parsed flags into the grammar's typed form.
    pub fn typed<T: FromArgMatches>(&self) -> anyhow::Result<T> {
        let Some(matches) = &self.matches else {
            anyhow::bail!("Flags were not parsed for this command");
        };

        Ok(T::from_arg_matches(matches)?)
    }

    pub fn value(&self, id: &str) -> Option<String> {
        self.matches
            .as_ref()?
            .try_get_one::<String>(id)
            .ok()
            .flatten()
            .cloned()
    }

    /// All values of a repeatable flag, in command-line order.
    pub fn values(&self, id: &str) -> Vec<String> {
        self.matches
            .as_ref()
            .and_then(|m| m.try_get_many::<String>(id).ok().flatten())
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    }

    pub fn bool(&self, id: &str) -> bool {
        self.matches
            .as_ref()
            .and_then(|m| m.try_get_one::<bool>(id).ok().flatten())
            .copied()
            .unwrap_or(false)
    }

    pub fn int(&self, id: &str) -> Option<usize> {
        self.matches
            .as_ref()?
            .try_get_one::<usize>(id)
            .ok()
            .flatten()
            .copied()
    }

    /// Whether the flag was given on the command line, as opposed to
    /// defaulted.
    pub fn has_received(&self, id: &str) -> bool {
        let Some(matches) = &self.matches else {
            return false;
        };

        matches.try_contains_id(id).unwrap_or(false)
            && matches.value_source(id) == Some(ValueSource::CommandLine)
    }
}

/// Names of the flags in `grammar` that consume the following token, so that
/// the argument model can tell their values apart from positionals.
pub fn value_flag_names(grammar: &Command) -> Vec<Vec<String>> {
    grammar
        .get_arguments()
        .filter(|arg| {
            !arg.is_positional() && arg.get_action().takes_values() && !arg.is_require_equals_set()
        })
        .map(|arg| {
            arg.get_short()
                .map(|short| format!("-{short}"))
                .into_iter()
                .chain(arg.get_long().map(|long| format!("--{long}")))
                .collect()
        })
        .collect()
}
