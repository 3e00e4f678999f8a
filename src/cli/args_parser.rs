//! Flag grammar registry used to tell positionals apart from flags and their
//! values without knowing every flag git accepts.

use std::collections::HashMap;

#[derive(Clone, Debug)]
struct FlagSpec {
    takes_value: bool,
}

/// Registered flags of one subcommand.
///
/// Each flag may have several names (`-b`, `--branch`); every name maps to
/// the same entry.
#[derive(Clone, Debug, Default)]
pub struct ArgsParser {
    specs: Vec<FlagSpec>,
    names: HashMap<String, usize>,
}

impl ArgsParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a flag that consumes the following token as its value.
    pub fn register_value(&mut self, names: &[&str]) {
        self.register(names, true);
    }

    pub fn register_bool(&mut self, names: &[&str]) {
        self.register(names, false);
    }

    fn register(&mut self, names: &[&str], takes_value: bool) {
        let index = self.specs.len();

        self.specs.push(FlagSpec { takes_value });

        for name in names {
            self.names.insert((*name).to_string(), index);
        }
    }

    pub fn takes_value(&self, name: &str) -> bool {
        self.names
            .get(name)
            .is_some_and(|&index| self.specs[index].takes_value)
    }

    /// Returns the indices of the positional tokens, in increasing order.
    ///
    /// - `--name=value` is a single token.
    /// - A registered value flag consumes the next token.
    /// - In a short cluster such as `-vb main`, the first value-taking flag
    ///   takes the rest of the cluster, or the next token if it ends it.
    /// - Unknown `--name` flags are booleans.
    /// - Everything after `--` is positional.
    pub fn parse(&self, tokens: &[String]) -> Vec<usize> {
        let mut positionals = Vec::new();
        let mut index = 0;
        let mut terminated = false;

        while index < tokens.len() {
            let token = tokens[index].as_str();

            if terminated {
                positionals.push(index);
                index += 1;
            } else if token == "--" {
                terminated = true;
                index += 1;
            } else if token.starts_with("--") {
                let consumes_next = !token.contains('=') && self.takes_value(token);

                index += if consumes_next { 2 } else { 1 };
            } else if token.len() > 1 && token.starts_with('-') {
                index += if self.cluster_consumes_next(&token[1..]) {
                    2
                } else {
                    1
                };
            } else {
                positionals.push(index);
                index += 1;
            }
        }

        positionals
    }

    fn cluster_consumes_next(&self, cluster: &str) -> bool {
        for (position, flag) in cluster.char_indices() {
            if self.takes_value(&format!("-{flag}")) {
                return position + flag.len_utf8() == cluster.len();
            }
        }

        false
    }
}
