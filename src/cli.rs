//! CLI definitions for xprofiles.
//!
//! Uses clap for argument parsing with derive macros.

use crate::config::Config;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// xprofiles - Collect public X profiles and tweets into JSON and CSV
#[derive(Parser, Debug)]
#[command(name = "xprofiles")]
#[command(version)]
#[command(about = "Resilient batch collector for public X profiles and tweets")]
#[command(long_about = r#"
xprofiles reads a list of X handles, fetches each profile together with its
recent and highlighted tweets, and writes everything to one JSON document and
three CSV files.

Handles are processed one at a time with a randomized pause between them.
Rate limits and transient failures are retried with exponential backoff; a
handle that still fails is logged and skipped.

Quick start:
  1. Put one handle per line in usernames.txt
  2. Set AUTH_INFO_1, AUTH_INFO_2 and PASSWORD (or provide cookies.json)
  3. Run: xprofiles run
"#)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, short = 'c', env = "XPROFILES_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format for summaries
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect profiles and tweets for every handle in the list
    Run(RunArgs),

    /// Establish a session and save its cookies
    Login(LoginArgs),

    /// Regenerate the CSV files from a JSON output document
    Convert(ConvertArgs),

    /// Show configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Handle list, one screen name per line
    #[arg(long, short = 'i')]
    pub handles: Option<PathBuf>,

    /// Directory for the JSON, CSV and log files
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,

    /// Cookies file used to persist the session
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Maximum recent tweets per handle
    #[arg(long)]
    pub tweet_limit: Option<usize>,

    /// Maximum highlighted tweets per handle
    #[arg(long)]
    pub highlight_limit: Option<usize>,

    /// Attempts per remote call before giving up
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Backoff delay in seconds after the first failed attempt
    #[arg(long)]
    pub base_delay: Option<f64>,

    /// Skip the pauses between handles and pages
    #[arg(long)]
    pub no_delay: bool,

    /// Base URL of the remote API
    #[arg(long)]
    pub api_url: Option<String>,

    /// Don't append to the run log file
    #[arg(long)]
    pub no_log_file: bool,
}

impl RunArgs {
    /// Command-line values take precedence over every other source.
    pub fn apply(&self, config: &mut Config) {
        if let Some(p) = &self.handles {
            config.paths.handles.clone_from(p);
        }
        if let Some(p) = &self.output_dir {
            config.paths.output_dir.clone_from(p);
        }
        if let Some(p) = &self.cookies {
            config.paths.cookies.clone_from(p);
        }
        if let Some(n) = self.tweet_limit {
            config.fetch.tweet_limit = n;
        }
        if let Some(n) = self.highlight_limit {
            config.fetch.highlight_limit = n;
        }
        if let Some(n) = self.max_attempts {
            config.retry.max_attempts = n;
        }
        if let Some(secs) = self.base_delay {
            config.retry.base_delay_secs = secs;
        }
        if let Some(url) = &self.api_url {
            config.api.base_url.clone_from(url);
        }
        if self.no_delay {
            config.disable_delays();
        }
    }
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Ignore stored cookies and log in with credentials
    #[arg(long, short = 'F')]
    pub force: bool,

    /// Cookies file to validate or write
    #[arg(long)]
    pub cookies: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// JSON document produced by a previous run
    pub input: PathBuf,

    /// Directory for the CSV files (defaults to the JSON file's directory)
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration
    #[arg(long)]
    pub show: bool,

    /// Print a default configuration file
    #[arg(long, conflicts_with = "show")]
    pub default: bool,

    /// Print a single value, e.g. retry.max_attempts
    #[arg(long, value_name = "KEY", conflicts_with_all = ["show", "default"])]
    pub get: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "xprofiles",
            "run",
            "--handles",
            "list.txt",
            "--tweet-limit",
            "50",
            "--no-delay",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };

        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.paths.handles, PathBuf::from("list.txt"));
        assert_eq!(config.fetch.tweet_limit, 50);
        assert_eq!(config.fetch.highlight_limit, 200);
        assert!(config.delay.max_secs.abs() < f64::EPSILON);
    }

    #[test]
    fn config_flags_conflict() {
        assert!(Cli::try_parse_from(["xprofiles", "config", "--show", "--default"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["xprofiles", "login", "--force", "-q"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Login(LoginArgs { force: true, .. })));
    }
}
