//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Batch download media URLs into an organized music folder.
///
/// URLs are taken from the arguments, or one per line from stdin. Items that
/// fail with an access denial (HTTP 403) are retried in waves after the
/// rest of the batch.
#[derive(Parser, Debug)]
#[command(name = "mixtape")]
#[command(author, version, about)]
pub struct Args {
    /// Media URLs to download (reads stdin when omitted)
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output directory (default: current directory)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Target audio quality passed to the processor (default: 320k)
    #[arg(long)]
    pub quality: Option<String>,

    /// Maximum retries per access-denied item, 0 for unlimited (0-100)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub max_retries: Option<u32>,

    /// Do not retry access-denied items
    #[arg(long)]
    pub no_auto_retry: bool,

    /// Pause between retry waves in milliseconds (max 600000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub retry_backoff_ms: Option<u64>,

    /// Config file path (default: $XDG_CONFIG_HOME/mixtape/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["mixtape"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.urls.is_empty());
        assert!(args.max_retries.is_none());
        assert!(!args.no_auto_retry);
        assert!(args.output_dir.is_none());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["mixtape", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["mixtape", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["mixtape", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["mixtape", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["mixtape", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_positional_urls() {
        let args = Args::try_parse_from([
            "mixtape",
            "https://example.com/a.mp3",
            "https://example.com/b.mp3",
        ])
        .unwrap();
        assert_eq!(args.urls.len(), 2);
    }

    // ==================== Retry Flag Tests ====================

    #[test]
    fn test_cli_max_retries_short_flag() {
        let args = Args::try_parse_from(["mixtape", "-r", "5"]).unwrap();
        assert_eq!(args.max_retries, Some(5));
    }

    #[test]
    fn test_cli_max_retries_over_max_rejected() {
        let err = Args::try_parse_from(["mixtape", "-r", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_retry_backoff_over_max_rejected() {
        let err = Args::try_parse_from(["mixtape", "--retry-backoff-ms", "600001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_no_auto_retry_and_output_dir() {
        let args = Args::try_parse_from([
            "mixtape",
            "--no-auto-retry",
            "-o",
            "/tmp/music",
            "--quality",
            "192k",
        ])
        .unwrap();
        assert!(args.no_auto_retry);
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/music")));
        assert_eq!(args.quality.as_deref(), Some("192k"));
    }
}
