use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ExportConfig;

#[derive(Parser, Debug)]
#[command(name = "feedzip")]
#[command(version)]
#[command(about = "Stream captured posts and their media into a ZIP archive", long_about = None)]
#[command(after_help = "Examples:\n  \
  feedzip export posts.json                      archive posts and download their photos\n  \
  feedzip export posts.json --since 2024-01-01   only posts from 2024 on\n  \
  feedzip text posts.json -o posts.txt           plain-text export, no downloads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// More log output (-vv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (-qq => errors only)
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Export posts to a ZIP archive, downloading attached photos
    Export(ExportArgs),
    /// Export posts to a single text file
    Text(TextArgs),
    /// List the entries an export would contain, without downloading
    Plan(InputArgs),
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// JSON file with captured posts
    #[arg(value_name = "POSTS")]
    pub input: PathBuf,

    /// Only posts created on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub since: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output archive (default: <user>_posts_<timestamp>.zip)
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// TOML file with export settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base pause between downloads in milliseconds
    #[arg(long, value_name = "MS")]
    pub rate_ms: Option<u64>,

    /// Download attempts per item
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Give up on the whole export after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub struct TextArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output file (default: <user>_posts_<timestamp>.txt)
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    /// Default log directive when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (q, _) if q > 1 => "error",
            (1, _) => "warn",
            (_, 0) => "info",
            (_, 1) => "debug",
            _ => "trace",
        }
    }
}

impl ExportArgs {
    /// Config file (if any) with command-line overrides applied.
    pub fn resolve_config(&self) -> anyhow::Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => ExportConfig::load(path)?,
            None => ExportConfig::default(),
        };
        if let Some(rate) = self.rate_ms {
            config.remote_rate_ms = rate;
        }
        if let Some(retries) = self.retries {
            config.max_attempts = retries;
        }
        if let Some(timeout) = self.timeout_secs {
            config.overall_timeout_secs = timeout;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "feedzip", "export", "posts.json", "--since", "2024-01-31", "--rate-ms", "0", "--retries", "5",
        ]);
        let Command::Export(args) = &cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.input.since, NaiveDate::from_ymd_opt(2024, 1, 31));

        let config = args.resolve_config().unwrap();
        assert_eq!(config.remote_rate_ms, 0);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.overall_timeout_secs, 180);
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(Cli::parse_from(["feedzip", "plan", "p.json"]).log_level(), "info");
        assert_eq!(Cli::parse_from(["feedzip", "-vv", "plan", "p.json"]).log_level(), "trace");
        assert_eq!(Cli::parse_from(["feedzip", "plan", "p.json", "-q"]).log_level(), "warn");
    }
}
