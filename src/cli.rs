//! Command-line interface definition.
//!
//! Flags override values from the optional `--config` file, which in turn
//! override the built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::config::Config;
use crate::error::Result;
use crate::quality::Quality;

/// Download tracks from music links at a chosen quality
#[derive(Debug, Parser)]
#[command(name = "qmdown", version, about)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Links to resolve: platform pages, direct audio URLs or JSON manifests
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Output directory (created if missing)
    #[arg(short, long, env = "QMDOWN_OUTPUT", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Highest quality to download; lower tiers are used when it is unavailable
    #[arg(long, value_enum)]
    pub quality: Option<Quality>,

    /// Number of concurrent downloads
    #[arg(short = 'n', long, env = "QMDOWN_NUM_WORKERS", value_name = "N")]
    pub num_workers: Option<usize>,

    /// Disable the progress display
    #[arg(long)]
    pub no_progress: bool,

    /// Replace files that already exist instead of skipping them
    #[arg(long)]
    pub overwrite: bool,

    /// Total attempts per track, including the first
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Delay before the first retry, in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_delay: Option<u64>,

    /// Longest delay between retries, in milliseconds
    #[arg(long, value_name = "MS")]
    pub max_retry_delay: Option<u64>,

    /// Connect and stall timeout, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// JSON configuration file
    #[arg(short, long, env = "QMDOWN_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print shell completions to stdout
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then flags
    ///
    /// # Errors
    ///
    /// Fails if the config file cannot be read or the result is invalid.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Override `config` with every flag that was given
    pub fn apply(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.download.output_dir = output.clone();
        }
        if let Some(quality) = self.quality {
            config.download.quality = quality;
        }
        if let Some(n) = self.num_workers {
            config.download.num_workers = n;
        }
        if self.overwrite {
            config.download.overwrite = true;
        }
        if let Some(secs) = self.timeout {
            config.download.request_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = self.retries {
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = self.max_retry_delay {
            config.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_delay {
            config.retry.initial_delay = Duration::from_millis(ms);
            // A long first delay lifts the cap unless the cap was given too
            if self.max_retry_delay.is_none() {
                config.retry.max_delay = config.retry.max_delay.max(config.retry.initial_delay);
            }
        }
        if self.no_progress {
            config.display.progress = false;
        }
    }

    /// Write completions for `shell` to `out`
    pub fn write_completions(shell: Shell, out: &mut dyn std::io::Write) {
        use clap::CommandFactory;

        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, bin_name, out);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "qmdown",
            "https://cdn.example.com/a.mp3",
            "https://cdn.example.com/b.mp3",
            "-o",
            "/tmp/music",
            "--quality",
            "flac",
            "-n",
            "3",
            "--no-progress",
            "--overwrite",
            "--retries",
            "5",
            "--retry-delay",
            "250",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.urls.len(), 2);

        let config = cli.load_config().unwrap();
        assert_eq!(config.download.output_dir, PathBuf::from("/tmp/music"));
        assert_eq!(config.download.quality, Quality::Flac);
        assert_eq!(config.download.num_workers, 3);
        assert!(config.download.overwrite);
        assert_eq!(config.download.request_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
        assert!(!config.display.progress);
    }

    #[test]
    fn no_flags_keeps_defaults() {
        let cli = Cli::try_parse_from(["qmdown", "https://cdn.example.com/a.mp3"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        let defaults = Config::default();
        assert_eq!(config.download.num_workers, defaults.download.num_workers);
        assert_eq!(config.download.quality, defaults.download.quality);
        assert!(config.display.progress);
    }

    #[test]
    fn unknown_quality_is_rejected_at_parse_time() {
        let err = Cli::try_parse_from(["qmdown", "--quality", "wav", "x"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn zero_workers_fails_validation() {
        let cli = Cli::try_parse_from(["qmdown", "-n", "0", "x"]).unwrap();
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let cli = Cli::try_parse_from(["qmdown", "--timeout", "0", "x"]).unwrap();
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn long_retry_delay_raises_the_cap() {
        let cli = Cli::try_parse_from(["qmdown", "--retry-delay", "30000", "x"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.retry.initial_delay, Duration::from_secs(30));
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));

        let cli = Cli::try_parse_from([
            "qmdown",
            "--retry-delay",
            "2000",
            "--max-retry-delay",
            "60000",
            "x",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.retry.initial_delay, Duration::from_secs(2));
        assert_eq!(config.retry.max_delay, Duration::from_secs(60));

        // An explicit cap below the first delay is still a mistake
        let cli = Cli::try_parse_from([
            "qmdown",
            "--retry-delay",
            "5000",
            "--max-retry-delay",
            "1000",
            "x",
        ])
        .unwrap();
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["qmdown", "-v", "-q", "x"]).is_err());
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("qmdown.json");
        std::fs::write(
            &path,
            r#"{"download": {"num_workers": 2, "quality": "flac"}, "retry": {"max_attempts": 7}}"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "qmdown",
            "--config",
            path.to_str().unwrap(),
            "-n",
            "6",
            "x",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.download.num_workers, 6);
        assert_eq!(config.download.quality, Quality::Flac);
        assert_eq!(config.retry.max_attempts, 7);
    }

    #[test]
    fn completions_subcommand() {
        let cli = Cli::try_parse_from(["qmdown", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Completions { shell: Shell::Bash })
        ));

        let mut out = Vec::new();
        Cli::write_completions(Shell::Bash, &mut out);
        assert!(String::from_utf8(out).unwrap().contains("qmdown"));
    }
}
