use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod error;
mod ui;
mod upload;
mod version;

mod auth;
mod client;
mod handout;
mod store;
mod subject;
mod utils;

#[cfg(test)]
mod tests;

use cli::CliHandler;
use version::CURRENT_VERSION;

#[derive(Parser)]
#[command(
    name = "hvault",
    about = "Browse, upload and download handouts in Handout Vault",
    long_about = "Handout Vault CLI - share course handouts by subject

OVERVIEW:
  Handouts are documents filed under a subject. Every upload of a handout
  creates a new version; versions keep their checksum, size, type and
  download/preview counters.

QUICK START:
  hvault login                          # Sign in with email and password
  hvault subjects                       # Subjects and handout counts
  hvault handouts Physics               # Handouts filed under a subject
  hvault versions <HANDOUT_ID>          # Version history of a handout
  hvault download <HANDOUT_ID> -V 2     # Download a specific version
  hvault upload notes.pdf -s Physics -t \"Week 1\"
  hvault status                         # Session and server status",
    version = CURRENT_VERSION,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default one
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login(LoginArgs),

    /// Remove the stored session
    Logout,

    /// Show session and server status
    #[command(aliases = &["st"])]
    Status,

    /// List subjects with handout counts
    ///
    /// Configured subjects come first, including those with no handouts yet.
    /// Subjects that only exist on the server are listed after them.
    #[command(aliases = &["ls"])]
    Subjects,

    /// List handouts filed under a subject
    Handouts(HandoutsArgs),

    /// List the versions of a handout
    Versions(VersionsArgs),

    /// Show details of one version
    Show(ShowArgs),

    /// Download a version
    #[command(aliases = &["dl"])]
    Download(DownloadArgs),

    /// Print or save the preview of a version
    Preview(PreviewArgs),

    /// Upload a file as a new handout version
    #[command(aliases = &["up"])]
    Upload(UploadArgs),

    /// Configure settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),

    /// Show the signed-in user and current settings
    Settings,
}

#[derive(Args)]
pub struct LoginArgs {
    #[arg(short, long)]
    pub email: Option<String>,

    /// Store an already issued bearer token instead of signing in
    #[arg(long, conflicts_with = "email")]
    pub token: Option<String>,
}

#[derive(Args)]
pub struct HandoutsArgs {
    pub subject: String,
}

#[derive(Args)]
pub struct VersionsArgs {
    pub handout_id: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub handout_id: String,

    /// Version number; defaults to the first listed version
    #[arg(short = 'V', long)]
    pub version: Option<u32>,
}

#[derive(Args)]
pub struct DownloadArgs {
    pub handout_id: String,

    #[arg(short = 'V', long)]
    pub version: Option<u32>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,

    /// Compare the SHA-256 of the download with the stored checksum
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args)]
pub struct PreviewArgs {
    pub handout_id: String,

    #[arg(short = 'V', long)]
    pub version: Option<u32>,

    /// Save the preview to this file instead of printing its URL
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct UploadArgs {
    pub file: Option<PathBuf>,

    #[arg(short, long)]
    pub subject: Option<String>,

    #[arg(short, long)]
    pub title: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    SetEndpoint { url: String },
    SetTimeout { seconds: u64 },
    SetVerbose { enabled: String },
    SetIdentityKey { key: String },
    SetDownloadDir { path: PathBuf },
    AddSubject { name: String },
    RemoveSubject { name: String },
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut handler = CliHandler::with_config_path(cli.config);

    let verbose = cli.verbose || handler.config_verbose().await;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = handler.execute(cli.command).await {
        tracing::debug!(code = %e.code(), error = ?e, "command failed");
        ui::UI::new().error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}

fn log_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("hvault={}", level)
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "hvault", "download", "h1", "-V", "2", "-o", "out", "--force", "--verify",
        ])
        .unwrap();
        match cli.command {
            Commands::Download(args) => {
                assert_eq!(args.handout_id, "h1");
                assert_eq!(args.version, Some(2));
                assert_eq!(args.output, Some(PathBuf::from("out")));
                assert!(args.force && args.verify);
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn test_parse_upload_and_aliases() {
        let cli = Cli::try_parse_from([
            "hvault", "up", "notes.pdf", "-s", "Physics", "-t", "Week 1", "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Upload(args) => {
                assert_eq!(args.file, Some(PathBuf::from("notes.pdf")));
                assert_eq!(args.subject.as_deref(), Some("Physics"));
                assert_eq!(args.title.as_deref(), Some("Week 1"));
            }
            _ => panic!("expected upload"),
        }

        let cli = Cli::try_parse_from(["hvault", "ls"]).unwrap();
        assert!(matches!(cli.command, Commands::Subjects));
    }

    #[test]
    fn test_subjects_help_mentions_server_subjects() {
        let mut command = Cli::command();
        let subjects = command
            .find_subcommand_mut("subjects")
            .expect("subjects subcommand");
        let help = subjects.render_long_help().to_string();
        assert!(help.contains("only exist on the server"));
    }

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive(false), "hvault=info");
        assert_eq!(log_directive(true), "hvault=debug");
    }

    #[test]
    fn test_login_token_conflicts_with_email() {
        assert!(Cli::try_parse_from(["hvault", "login", "--token", "t", "-e", "a@b.c"]).is_err());
    }
}
