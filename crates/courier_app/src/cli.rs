use std::path::PathBuf;

use clap::Parser;
use courier_engine::OutputFormat;
use engine_logging::LogDestination;
use log::LevelFilter;

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Debug, Parser)]
#[command(
    name = "kindle-courier",
    version,
    about = "Send unarchived Karakeep bookmarks to a Kindle and archive them"
)]
pub struct Cli {
    /// Path to the JSON config file. Created with defaults when missing.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Report what would be sent without writing, sending or archiving.
    #[arg(long)]
    pub dry_run: bool,

    /// Output format (html, pdf, epub, mobi). Overrides the config file.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Bundle every unarchived article into one document.
    #[arg(long)]
    pub compilation: bool,

    /// Delete generated files after a successful delivery.
    #[arg(long)]
    pub cleanup: bool,

    /// Email an existing file to the Kindle and exit.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["compilation", "purge_output"])]
    pub send_email: Option<PathBuf>,

    /// Delete regular files in the output directory and exit.
    #[arg(long)]
    pub purge_output: bool,

    /// With --purge-output, keep files modified within the last hour.
    #[arg(long, requires = "purge_output")]
    pub keep_recent: bool,

    /// Log to the log file only.
    #[arg(short, long)]
    pub quiet: bool,

    /// More log detail; repeat for trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// What a single invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Purge { keep_recent: bool },
    SendFile { file: PathBuf },
    Run,
}

impl Cli {
    pub fn command(&self) -> Command {
        if self.purge_output {
            Command::Purge {
                keep_recent: self.keep_recent,
            }
        } else if let Some(file) = &self.send_email {
            Command::SendFile { file: file.clone() }
        } else {
            Command::Run
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        if self.quiet {
            LogDestination::File
        } else {
            LogDestination::Both
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kindle-courier").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_run_the_pipeline() {
        let cli = parse(&[]);
        assert_eq!(cli.command(), Command::Run);
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.format, None);
        assert_eq!(cli.log_level(), LevelFilter::Info);
        assert_eq!(cli.log_destination(), LogDestination::Both);
    }

    #[test]
    fn format_flag_is_case_insensitive() {
        assert_eq!(parse(&["--format", "EPUB"]).format, Some(OutputFormat::Epub));
        assert!(Cli::try_parse_from(["kindle-courier", "--format", "docx"]).is_err());
    }

    #[test]
    fn purge_takes_precedence_and_keep_recent_needs_it() {
        let cli = parse(&["--purge-output", "--keep-recent"]);
        assert_eq!(cli.command(), Command::Purge { keep_recent: true });
        assert!(Cli::try_parse_from(["kindle-courier", "--keep-recent"]).is_err());
    }

    #[test]
    fn send_email_selects_file_mode() {
        let cli = parse(&["--send-email", "out/book.mobi", "--cleanup", "--dry-run"]);
        assert_eq!(
            cli.command(),
            Command::SendFile {
                file: PathBuf::from("out/book.mobi")
            }
        );
        assert!(cli.cleanup && cli.dry_run);
    }

    #[test]
    fn verbosity_and_quiet() {
        let cli = parse(&["-vv", "--quiet"]);
        assert_eq!(cli.log_level(), LevelFilter::Trace);
        assert_eq!(cli.log_destination(), LogDestination::File);
    }
}
