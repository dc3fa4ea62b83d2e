//! Command-line interface definitions for confluence-publish.
//!
//! Notes are published by passing their ids (or file names, or paths) as
//! positional arguments. Subcommands cover credential checks, build
//! information and shell completions.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

use crate::color::ColorScheme;
use crate::commands::auth::handle_auth_command;
use crate::commands::completions::handle_completions_command;
use crate::commands::publish::handle_publish_command;
use crate::commands::version::handle_version_command;

/// confluence-publish - Publish knowledge-base notes to Confluence
#[derive(Debug, Parser)]
#[command(
  name = "confluence-publish",
  version,
  about = "Publish knowledge-base notes to Confluence",
  long_about = "A command-line tool for publishing markdown notes to Confluence pages.\n\
                Creates pages on first publish, updates them in place afterwards, and\n\
                uploads referenced images as page attachments.",
  styles = get_clap_styles()
)]
pub struct Cli {
  /// Note ids, file names or paths to publish
  #[arg(value_name = "NOTE")]
  pub notes: Vec<String>,

  /// Subcommand to execute
  #[command(subcommand)]
  pub command: Option<Command>,

  /// Authentication options
  #[command(flatten)]
  pub auth: AuthOptions,

  /// Publish target options
  #[command(flatten)]
  pub target: TargetOptions,

  /// Vault options
  #[command(flatten)]
  pub vault: VaultOptions,

  /// Behavior options
  #[command(flatten)]
  pub behavior: BehaviorOptions,

  /// Performance options
  #[command(flatten)]
  pub performance: PerformanceOptions,
}

/// Subcommands for introspection and setup
#[derive(Debug, Subcommand)]
pub enum Command {
  /// Authentication testing and inspection
  Auth {
    #[command(subcommand)]
    subcommand: AuthCommand,
  },

  /// Display version and build information
  Version {
    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Show only version number
    #[arg(long)]
    short: bool,
  },

  /// Generate shell completion scripts
  Completions {
    /// Target shell for completions
    #[arg(value_enum)]
    shell: Shell,
  },
}

/// Authentication subcommands
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum AuthCommand {
  /// Call the Confluence API with the configured credentials
  Test,
  /// Show the resolved connection settings
  Show,
}

/// Normalize a URL by adding https:// if no scheme is present
fn normalize_url(url: &str) -> Result<String, String> {
  let trimmed = url.trim();

  let parsed = match Url::parse(trimmed) {
    Ok(parsed) if parsed.has_host() => parsed,
    _ => Url::parse(&format!("https://{trimmed}")).map_err(|e| format!("Invalid URL: {e}"))?,
  };

  Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Authentication options
#[derive(Debug, Parser)]
pub struct AuthOptions {
  /// Confluence base URL
  #[arg(long, env = "CONFLUENCE_URL", value_name = "URL", value_parser = normalize_url)]
  pub url: Option<String>,

  /// Confluence user email
  #[arg(long, env = "CONFLUENCE_USER", value_name = "EMAIL")]
  pub user: Option<String>,

  /// Confluence API token
  #[arg(long, env = "CONFLUENCE_TOKEN", value_name = "TOKEN", hide_env_values = true)]
  pub token: Option<String>,
}

/// Where pages are published
#[derive(Debug, Parser)]
pub struct TargetOptions {
  /// Key of the space pages are created in
  #[arg(long, env = "CONFLUENCE_SPACE", value_name = "KEY")]
  pub space: Option<String>,

  /// Page that new pages are created under
  #[arg(long, env = "CONFLUENCE_PARENT_PAGE_ID", value_name = "PAGE_ID")]
  pub parent_page_id: Option<String>,

  /// Prepend an "exported from" info banner to every page
  #[arg(long)]
  pub banner: bool,

  /// Create a new page when a note's recorded page no longer exists
  #[arg(long)]
  pub recreate_missing: bool,
}

/// Vault options
#[derive(Debug, Parser)]
pub struct VaultOptions {
  /// Directory holding the notes
  #[arg(long, env = "VAULT_DIR", default_value = ".", value_name = "DIR")]
  pub vault: PathBuf,
}

/// Behavior options
#[derive(Debug, Parser)]
pub struct BehaviorOptions {
  /// Print the rendered pages and attachments without contacting Confluence
  #[arg(long)]
  pub dry_run: bool,

  /// Increase verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  pub verbose: u8,

  /// Suppress all output except errors
  #[arg(short, long, conflicts_with = "verbose")]
  pub quiet: bool,

  /// Colorize output
  #[arg(long, value_enum, default_value = "auto", value_name = "WHEN")]
  pub color: ColorOption,
}

/// Color output options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
  Auto,
  Always,
  Never,
}

/// Performance options
#[derive(Debug, Parser)]
pub struct PerformanceOptions {
  /// Number of parallel attachment uploads per page (`-1` uses available cores)
  #[arg(long, default_value = "4", value_name = "N", allow_negative_numbers = true)]
  pub parallel: isize,

  /// Max requests per second
  #[arg(long, default_value = "10", value_name = "N")]
  pub rate_limit: usize,

  /// Request timeout in seconds
  #[arg(long, default_value = "30", value_name = "SECONDS")]
  pub timeout: u64,
}

impl PerformanceOptions {
  /// Resolve the parallel upload limit into a concrete positive value.
  pub fn resolved_parallel(&self) -> usize {
    match self.parallel {
      value if value > 0 => value as usize,
      -1 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
      _ => 1,
    }
  }
}

impl Cli {
  /// Validate CLI arguments
  ///
  /// Returns an error if the CLI configuration is invalid.
  pub fn validate(&self) -> Result<(), String> {
    if self.notes.is_empty() && self.command.is_none() {
      return Err("Provide at least one note to publish or use a subcommand".to_string());
    }

    if !self.notes.is_empty() && !self.behavior.dry_run {
      let required = [
        ("--url", "CONFLUENCE_URL", self.auth.url.is_some()),
        ("--user", "CONFLUENCE_USER", self.auth.user.is_some()),
        ("--token", "CONFLUENCE_TOKEN", self.auth.token.is_some()),
        ("--space", "CONFLUENCE_SPACE", self.target.space.is_some()),
      ];
      if let Some((flag, env, _)) = required.iter().find(|(_, _, present)| !present) {
        return Err(format!("{flag} (or {env}) is required to publish"));
      }
    }

    if self.performance.parallel == 0 || self.performance.parallel < -1 {
      return Err("--parallel must be at least 1 or -1 to use available cores".to_string());
    }

    if self.performance.rate_limit == 0 {
      return Err("--rate-limit must be at least 1 request per second".to_string());
    }

    if self.performance.timeout == 0 {
      return Err("--timeout must be at least 1 second".to_string());
    }

    Ok(())
  }
}

/// Parse CLI arguments, initialize shared services, and dispatch to the chosen
/// command.
pub async fn run() {
  let cli = Cli::parse();

  init_tracing(&cli.behavior);

  let colors = ColorScheme::new(cli.behavior.color);

  if let Err(e) = cli.validate() {
    eprintln!("{} {}", colors.error("Error:"), e);
    process::exit(4); // Invalid arguments exit code
  }

  match &cli.command {
    Some(Command::Auth { subcommand }) => handle_auth_command(*subcommand, &cli, &colors).await,
    Some(Command::Version { json, short }) => handle_version_command(*json, *short, &colors),
    Some(Command::Completions { shell }) => handle_completions_command(*shell),
    None => handle_publish_command(&cli, &colors).await,
  }
}

fn init_tracing(behavior: &BehaviorOptions) {
  let level = if behavior.quiet {
    LevelFilter::ERROR
  } else {
    match behavior.verbose {
      0 => LevelFilter::WARN,
      1 => LevelFilter::INFO,
      2 => LevelFilter::DEBUG,
      _ => LevelFilter::TRACE,
    }
  };

  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  let _ = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .try_init();
}

/// Get custom styles for clap help output
fn get_clap_styles() -> clap::builder::Styles {
  use clap::builder::styling::{AnsiColor, Effects};

  clap::builder::Styles::styled()
    .header(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
    .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
    .literal(AnsiColor::BrightGreen.on_default())
    .placeholder(AnsiColor::BrightCyan.on_default())
    .error(AnsiColor::BrightRed.on_default() | Effects::BOLD)
    .valid(AnsiColor::BrightGreen.on_default())
    .invalid(AnsiColor::BrightRed.on_default())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["confluence-publish"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
  }

  const FULL: &[&str] = &[
    "--url",
    "https://acme.atlassian.net",
    "--user",
    "you@example.com",
    "--token",
    "secret",
    "--space",
    "DOCS",
  ];

  #[test]
  fn test_cli_validation_requires_note_or_command() {
    let cli = parse(FULL);
    let result = cli.validate();
    assert!(result.unwrap_err().contains("Provide at least one note"));
  }

  #[test]
  fn test_cli_validation_publish_requires_space() {
    let cli = parse(&[
      "--url",
      "https://acme.atlassian.net",
      "--user",
      "you@example.com",
      "--token",
      "secret",
      "daily.journal",
    ]);
    if cli.target.space.is_none() {
      assert!(cli.validate().unwrap_err().contains("--space"));
    }
  }

  #[test]
  fn test_cli_validation_dry_run_needs_no_credentials() {
    let cli = Cli {
      notes: vec!["daily.journal".to_string()],
      command: None,
      auth: AuthOptions {
        url: None,
        user: None,
        token: None,
      },
      target: TargetOptions {
        space: None,
        parent_page_id: None,
        banner: false,
        recreate_missing: false,
      },
      vault: VaultOptions {
        vault: PathBuf::from("."),
      },
      behavior: BehaviorOptions {
        dry_run: true,
        verbose: 0,
        quiet: false,
        color: ColorOption::Never,
      },
      performance: PerformanceOptions {
        parallel: 4,
        rate_limit: 10,
        timeout: 30,
      },
    };

    assert!(cli.validate().is_ok());
  }

  #[test]
  fn test_cli_full_publish_is_valid() {
    let mut args = FULL.to_vec();
    args.extend(["--parent-page-id", "0123456789", "--banner", "daily.journal", "root"]);
    let cli = parse(&args);

    assert!(cli.validate().is_ok());
    assert_eq!(cli.notes, vec!["daily.journal", "root"]);
    assert_eq!(cli.target.parent_page_id.as_deref(), Some("0123456789"));
    assert!(cli.target.banner);
    assert!(!cli.target.recreate_missing);
  }

  #[test]
  fn test_cli_validation_parallel_must_be_positive_or_auto() {
    let mut args = FULL.to_vec();
    args.extend(["--parallel", "0", "note"]);
    assert!(
      parse(&args)
        .validate()
        .unwrap_err()
        .contains("--parallel must be at least 1 or -1")
    );

    let mut args = FULL.to_vec();
    args.extend(["--parallel", "-1", "note"]);
    let cli = parse(&args);
    assert!(cli.validate().is_ok());
    assert!(cli.performance.resolved_parallel() >= 1);
  }

  #[test]
  fn test_cli_version_command_is_valid() {
    let cli = parse(&["version", "--short"]);
    assert!(matches!(cli.command, Some(Command::Version { short: true, .. })));
    assert!(cli.validate().is_ok());
  }

  #[test]
  fn test_url_normalization_adds_https_when_missing() {
    let cli = parse(&["--url", "example.atlassian.net", "auth", "test"]);
    assert_eq!(cli.auth.url.as_deref(), Some("https://example.atlassian.net"));
  }

  #[test]
  fn test_url_normalization_preserves_scheme() {
    let cli = parse(&["--url", "http://localhost:8080/", "auth", "show"]);
    assert_eq!(cli.auth.url.as_deref(), Some("http://localhost:8080"));
    assert!(matches!(
      cli.command,
      Some(Command::Auth {
        subcommand: AuthCommand::Show
      })
    ));
  }
}
