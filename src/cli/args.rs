//! The mutable command line hub forwards to git.

use std::{fmt::Display, path::PathBuf};

use crate::cli::{args_parser::ArgsParser, flags::FlagSet};

const GIT: &str = "git";

/// Global git flags that take a separate value.
const GLOBAL_VALUE_FLAGS: &[&str] = &["-C", "-c", "--namespace", "--git-dir", "--work-tree"];

/// A command to run before or after the main command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
}

impl Cmd {
    pub fn git<S: AsRef<str>>(args: &[S]) -> Self {
        Cmd {
            program: GIT.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
        }
    }
}

impl Display for Cmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;

        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }

        Ok(())
    }
}

/// One invocation: global flags, subcommand and its parameters, plus
/// commands chained around it.
#[derive(Debug)]
pub struct Args {
    pub executable: String,
    pub global_flags: Vec<String>,
    pub command: String,
    pub noop: bool,
    /// Flags parsed from the subcommand's known-flags grammar.
    pub flag: FlagSet,
    params: Vec<String>,
    parser: ArgsParser,
    positionals: Vec<usize>,
    no_forward: bool,
    before: Vec<Cmd>,
    after: Vec<Cmd>,
}

impl Args {
    /// Splits the command line (without the program name) into global flags,
    /// the subcommand and its parameters.
    ///
    /// `--noop` is consumed; `--version` and `--help` given before any
    /// subcommand become the `version` and `help` subcommands.
    pub fn new<S: AsRef<str>>(argv: &[S]) -> Self {
        let mut global_flags = Vec::new();
        let mut noop = false;
        let mut command = None;
        let mut tokens = argv.iter().map(|a| a.as_ref().to_string());

        while let Some(token) = tokens.next() {
            match token.as_str() {
                "--noop" => noop = true,
                "--version" => {
                    command = Some("version".to_string());
                    break;
                }
                "--help" | "-h" => {
                    command = Some("help".to_string());
                    break;
                }
                flag if GLOBAL_VALUE_FLAGS.contains(&flag) => {
                    global_flags.push(token.clone());
                    global_flags.extend(tokens.next());
                }
                flag if flag.starts_with('-') => global_flags.push(token),
                _ => {
                    command = Some(token);
                    break;
                }
            }
        }

        let mut args = Args {
            executable: GIT.to_string(),
            global_flags,
            command: command.unwrap_or_default(),
            noop,
            flag: FlagSet::default(),
            params: tokens.collect(),
            parser: ArgsParser::new(),
            positionals: Vec::new(),
            no_forward: false,
            before: Vec::new(),
            after: Vec::new(),
        };

        args.reparse();

        args
    }

    fn reparse(&mut self) {
        self.positionals = self.parser.parse(&self.params);
    }

    /// Registers value-taking flags so that their values aren't mistaken for
    /// positionals.
    pub fn register_value_flags(&mut self, names: &[&str]) {
        self.parser.register_value(names);
        self.reparse();
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn params_size(&self) -> usize {
        self.params.len()
    }

    pub fn is_params_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn first_param(&self) -> Option<&str> {
        self.params.first().map(String::as_str)
    }

    pub fn last_param(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    pub fn get_param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn index_of_param(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p == name)
    }

    /// Positional parameters.
    pub fn words(&self) -> Vec<String> {
        self.positionals
            .iter()
            .map(|&i| self.params[i].clone())
            .collect()
    }

    /// Index in `params` of each positional.
    pub fn positional_indices(&self) -> &[usize] {
        &self.positionals
    }

    /// Whether the first parameter is the subcommand `key`.
    pub fn has_subcommand(&self, key: &str) -> bool {
        self.first_param() == Some(key)
    }

    /// Replaces the parameter at `index`; other indices stay valid.
    pub fn replace_param(&mut self, index: usize, value: impl Into<String>) {
        if let Some(param) = self.params.get_mut(index) {
            *param = value.into();
            self.reparse();
        }
    }

    pub fn remove_param(&mut self, index: usize) -> Option<String> {
        if index >= self.params.len() {
            return None;
        }

        let removed = self.params.remove(index);
        self.reparse();

        Some(removed)
    }

    /// Inserts `values` so that the first of them ends up at `index`.
    pub fn insert_params<S: AsRef<str>>(&mut self, index: usize, values: &[S]) {
        let index = index.min(self.params.len());

        self.params.splice(
            index..index,
            values.iter().map(|v| v.as_ref().to_string()),
        );
        self.reparse();
    }

    pub fn append_params<S: AsRef<str>>(&mut self, values: &[S]) {
        self.insert_params(self.params.len(), values);
    }

    /// Replaces the whole invocation.
    pub fn replace<S: AsRef<str>>(&mut self, command: &str, params: &[S]) {
        self.command = command.to_string();
        self.params = params.iter().map(|p| p.as_ref().to_string()).collect();
        self.parser = ArgsParser::new();
        self.reparse();
    }

    /// Marks the request as fulfilled so git isn't invoked.
    pub fn no_forward(&mut self) {
        self.no_forward = true;
    }

    pub fn is_forwarded(&self) -> bool {
        !self.no_forward
    }

    pub fn before(&mut self, cmd: Cmd) {
        self.before.push(cmd);
    }

    pub fn after(&mut self, cmd: Cmd) {
        self.after.push(cmd);
    }

    pub fn before_chain(&self) -> &[Cmd] {
        &self.before
    }

    pub fn after_chain(&self) -> &[Cmd] {
        &self.after
    }

    /// The command git is invoked with.
    pub fn main_command(&self) -> Cmd {
        let mut args = self.global_flags.clone();

        if !self.command.is_empty() {
            args.push(self.command.clone());
        }

        args.extend(self.params.iter().cloned());

        Cmd {
            program: self.executable.clone(),
            args,
        }
    }

    /// Everything that runs, in order. Chained git commands get the same
    /// global flags as the main command.
    pub fn commands(&self) -> Vec<Cmd> {
        let mut commands: Vec<Cmd> = self.before.iter().map(|c| self.with_globals(c)).collect();

        if self.is_forwarded() {
            commands.push(self.main_command());
        }

        commands.extend(self.after.iter().map(|c| self.with_globals(c)));

        commands
    }

    fn with_globals(&self, cmd: &Cmd) -> Cmd {
        if cmd.program != GIT {
            return cmd.clone();
        }

        Cmd {
            program: self.executable.clone(),
            args: self.global_flags.iter().chain(&cmd.args).cloned().collect(),
        }
    }

    /// `--git-dir` and `--work-tree` flags in both the `--flag value` and
    /// `--flag=value` forms, normalised to the latter.
    pub fn repo_flags(&self) -> Vec<String> {
        let mut repo_flags = Vec::new();
        let mut flags = self.global_flags.iter();

        while let Some(flag) = flags.next() {
            for name in ["--git-dir", "--work-tree"] {
                if flag == name {
                    if let Some(value) = flags.next() {
                        repo_flags.push(format!("{name}={value}"));
                    }
                } else if flag.starts_with(&format!("{name}=")) {
                    repo_flags.push(flag.clone());
                }
            }
        }

        repo_flags
    }

    /// Directory given with `-C`, if any; repeated flags compose.
    pub fn work_dir(&self) -> Option<PathBuf> {
        let mut dir: Option<PathBuf> = None;
        let mut flags = self.global_flags.iter();

        while let Some(flag) = flags.next() {
            if flag != "-C" {
                continue;
            }

            if let Some(path) = flags.next() {
                dir = Some(match dir {
                    Some(dir) => dir.join(path),
                    None => PathBuf::from(path),
                });
            }
        }

        dir
    }
}
