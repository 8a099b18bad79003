//! Structured commands
//!
//! Every command the engine runs, locally or over ssh, is built as a program
//! plus a list of words. Values that come from configuration (paths, database
//! names, hosts) pass an allow-list check while the command is built; secrets
//! are carried as separate words that never appear in logs.

use std::fmt;

use crate::error::{BackupError, Result};

/// A single argument word
#[derive(Debug, Clone)]
enum Word {
    Plain(String),
    Secret(String),
}

impl Word {
    fn value(&self) -> &str {
        match self {
            Word::Plain(v) | Word::Secret(v) => v,
        }
    }
}

/// A program invocation with its arguments and extra environment
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<Word>,
    env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Appends a literal word chosen by the engine itself
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Word::Plain(arg.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|a| Word::Plain(a.into())));
        self
    }

    /// Appends a filesystem path after checking it against the path allow-list
    pub fn path(self, path: &str) -> Result<Self> {
        let path = check_path(path)?;
        Ok(self.arg(path))
    }

    /// Appends a database or similar identifier after checking it
    pub fn ident(self, ident: &str) -> Result<Self> {
        let ident = check_identifier(ident)?;
        Ok(self.arg(ident))
    }

    /// Appends a word that is redacted from every display form
    pub fn secret(mut self, value: impl Into<String>) -> Self {
        self.args.push(Word::Secret(value.into()));
        self
    }

    /// Sets an environment variable on the spawned local process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Runs this command through a wrapper program, e.g. `sshpass -e <cmd>`
    pub fn wrapped_in<I, S>(self, wrapper: impl Into<String>, wrapper_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args: Vec<Word> = wrapper_args
            .into_iter()
            .map(|a| Word::Plain(a.into()))
            .collect();
        args.push(Word::Plain(self.program));
        args.extend(self.args);

        Self {
            program: wrapper.into(),
            args,
            env: self.env,
        }
    }

    pub fn has_secrets(&self) -> bool {
        self.args.iter().any(|w| matches!(w, Word::Secret(_)))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Raw argument values, secrets included, for process spawning
    pub fn argv(&self) -> Vec<&str> {
        self.args.iter().map(Word::value).collect()
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.env
    }

    /// Renders one POSIX shell line with every word single-quoted
    ///
    /// Used as the command string handed to ssh, which the remote login shell
    /// splits back into the original words.
    pub fn to_remote_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(Word::value))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for word in &self.args {
            match word {
                Word::Plain(v) => write!(f, " {}", v)?,
                Word::Secret(_) => write!(f, " ****")?,
            }
        }
        Ok(())
    }
}

/// Quotes a word for a POSIX shell
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

// =============================================================================
// Allow-lists
// =============================================================================

/// Checks a filesystem path: `[A-Za-z0-9_./@:+=,~-]`
pub fn check_path(value: &str) -> Result<&str> {
    check(value, "path", |c| {
        c.is_ascii_alphanumeric() || "_./@:+=,~-".contains(c)
    })
}

/// Checks a database name or similar identifier: `[A-Za-z0-9_$-]`
pub fn check_identifier(value: &str) -> Result<&str> {
    check(value, "identifier", |c| {
        c.is_ascii_alphanumeric() || "_$-".contains(c)
    })
}

/// Checks a host name, IP address or user name: `[A-Za-z0-9_.@:-]`
pub fn check_host(value: &str) -> Result<&str> {
    check(value, "host", |c| c.is_ascii_alphanumeric() || "_.@:-".contains(c))
}

fn check<'a>(value: &'a str, kind: &'static str, allowed: impl Fn(char) -> bool) -> Result<&'a str> {
    let unsafe_arg = || BackupError::UnsafeArgument {
        kind,
        value: value.to_string(),
    };

    if value.is_empty() || value.starts_with('-') {
        return Err(unsafe_arg());
    }

    if !value.chars().all(allowed) {
        return Err(unsafe_arg());
    }

    Ok(value)
}
