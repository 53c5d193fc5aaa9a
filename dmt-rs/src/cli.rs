//! Command-line argument parsing.
//!
//! Usage:
//!   dmt [-n] [-p] [-c <file>] [-v] [<input>]

use std::path::{Path, PathBuf};

use clap::Parser;
use directories::ProjectDirs;

use crate::message::NullPolicy;

const CONTEXT_FILE: &str = "context.json";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "dmt", author, version, about = "Render a message template to JSON")]
pub struct CliArgs {
    /// Keep absent members as `null` in the output.
    #[arg(short, long)]
    pub nulls: bool,

    /// Pretty-print the JSON document.
    #[arg(short, long)]
    pub pretty: bool,

    /// Context file whose entries become template constants.
    #[arg(short, long, value_name = "FILE", env = "DMT_CONTEXT")]
    pub context: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,

    /// Template file; `-` or nothing reads stdin.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,
}

impl CliArgs {
    pub fn null_policy(&self) -> NullPolicy {
        if self.nulls {
            NullPolicy::Include
        } else {
            NullPolicy::Omit
        }
    }

    /// The template path, or `None` for stdin.
    pub fn input_path(&self) -> Option<&Path> {
        self.input.as_deref().filter(|p| *p != Path::new("-"))
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()`; exits with usage on error.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("dmt").chain(argv.iter().map(String::as_str)))
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Determine the context file to load.
///
/// Priority: `--context` flag or `DMT_CONTEXT` → `./context.json` → the
/// per-user config directory's `context.json`.  Returns `None` when no
/// candidate is known; later candidates are only chosen if they exist.
pub fn resolve_context_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_owned());
    }
    let local = PathBuf::from(CONTEXT_FILE);
    if local.exists() {
        return Some(local);
    }
    user_context_path().filter(|p| p.exists())
}

/// `context.json` in the per-user config directory.
pub fn user_context_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "dmt", "dmt").map(|dirs| dirs.config_dir().join(CONTEXT_FILE))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert!(!a.nulls && !a.pretty && !a.verbose);
        assert!(a.input_path().is_none());
        assert_eq!(a.null_policy(), NullPolicy::Omit);
    }

    #[test]
    fn input_positional() {
        let a = parse_argv(&argv(&["hello.dmt"])).unwrap();
        assert_eq!(a.input_path(), Some(Path::new("hello.dmt")));
    }

    #[test]
    fn dash_means_stdin() {
        let a = parse_argv(&argv(&["-"])).unwrap();
        assert!(a.input_path().is_none());
    }

    #[test]
    fn bool_flags() {
        let a = parse_argv(&argv(&["-n", "-p", "-v"])).unwrap();
        assert!(a.nulls && a.pretty && a.verbose);
        assert_eq!(a.null_policy(), NullPolicy::Include);
    }

    #[test]
    fn combined_bool_flags() {
        let a = parse_argv(&argv(&["-npv"])).unwrap();
        assert!(a.nulls && a.pretty && a.verbose);
    }

    #[test]
    fn long_flags() {
        let a = parse_argv(&argv(&["--nulls", "--pretty", "--verbose"])).unwrap();
        assert!(a.nulls && a.pretty && a.verbose);
    }

    #[test]
    fn context_separate() {
        let a = parse_argv(&argv(&["-c", "ctx.json", "t.dmt"])).unwrap();
        assert_eq!(a.context, Some(PathBuf::from("ctx.json")));
        assert_eq!(a.input, Some(PathBuf::from("t.dmt")));
    }

    #[test]
    fn context_long_equals() {
        let a = parse_argv(&argv(&["--context=ctx.json"])).unwrap();
        assert_eq!(a.context, Some(PathBuf::from("ctx.json")));
    }

    #[test]
    fn explicit_context_wins() {
        let p = Path::new("/nowhere/ctx.json");
        assert_eq!(resolve_context_path(Some(p)), Some(p.to_owned()));
    }

    #[test]
    fn user_context_file_name() {
        if let Some(p) = user_context_path() {
            assert!(p.ends_with(CONTEXT_FILE));
        }
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }
}
