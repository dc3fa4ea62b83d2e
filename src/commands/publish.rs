//! Note publishing handler.
//!
//! Resolves the notes named on the command line, then either prints what
//! would be published (`--dry-run`) or publishes each note in turn.

use std::process;

use anyhow::{Context, Result};

use crate::cli::Cli;
use crate::color::ColorScheme;
use crate::commands::auth::load_credentials;
use crate::config::PublisherConfig;
use crate::confluence::ConfluenceClient;
use crate::note::Note;
use crate::publisher::{PublishReport, Publisher, attachment_references, render_note};
use crate::vault::Vault;

/// Exit code when every note published but some attachments failed.
const EXIT_ATTACHMENT_FAILURES: i32 = 3;

/// Publish (or preview) the notes named on the command line.
///
/// # Arguments
/// * `cli` - Parsed CLI settings, including the note arguments.
/// * `colors` - Shared color scheme used to render output consistently.
pub(crate) async fn handle_publish_command(cli: &Cli, colors: &ColorScheme) {
  let vault = match open_vault(cli) {
    Ok(vault) => vault,
    Err(e) => {
      eprintln!("{} {e:#}", colors.error("✗"));
      process::exit(1);
    }
  };

  let notes = match resolve_notes(&vault, &cli.notes) {
    Ok(notes) => notes,
    Err(e) => {
      eprintln!("{} {e:#}", colors.error("✗"));
      process::exit(1);
    }
  };

  let config = match publisher_config(cli) {
    Ok(config) => config,
    Err(e) if cli.behavior.dry_run => {
      tracing::debug!("Using placeholder configuration for dry run: {e:#}");
      PublisherConfig {
        include_provenance_banner: cli.target.banner,
        ..PublisherConfig::new("", "", "", "")
      }
    }
    Err(e) => {
      eprintln!("{} {e:#}", colors.error("Error:"));
      process::exit(4);
    }
  };

  if cli.behavior.dry_run {
    if let Err(e) = preview(&vault, &notes, &config, colors) {
      eprintln!("{} {e:#}", colors.error("✗"));
      process::exit(1);
    }
    return;
  }

  let client = match ConfluenceClient::from_config(&config) {
    Ok(client) => client,
    Err(e) => {
      eprintln!("{} {}", colors.error("✗"), colors.error("Failed to create API client"));
      eprintln!("  {e}");
      process::exit(1);
    }
  };

  let publisher = Publisher::new(&client, &vault, &config);
  let mut failed = false;
  let mut partial = false;

  for mut note in notes {
    if !cli.behavior.quiet {
      println!("{} Publishing {}", colors.info("→"), colors.emphasis(&note.title));
    }

    match publisher.publish(&mut note).await {
      Ok(report) => {
        if !cli.behavior.quiet {
          print_report(&report, &config, colors);
        }
        partial |= report.has_failures();

        if let Some(version) = report.page.version_number()
          && let Err(e) = vault.record_page_version(&mut note, version).await
        {
          tracing::warn!("Failed to record page version for note '{}': {e}", note.id);
        }
      }
      Err(e) => {
        eprintln!("{} {:#}", colors.error("✗"), anyhow::Error::from(e));
        failed = true;
      }
    }
  }

  // A hard failure outranks attachment warnings.
  if failed {
    process::exit(1);
  }
  if partial {
    process::exit(EXIT_ATTACHMENT_FAILURES);
  }
}

fn open_vault(cli: &Cli) -> Result<Vault> {
  let root = &cli.vault.vault;
  Vault::open(root).with_context(|| format!("Failed to open vault {}", root.display()))
}

/// Look up every note argument, failing on the first unknown one.
fn resolve_notes(vault: &Vault, references: &[String]) -> Result<Vec<Note>> {
  references
    .iter()
    .map(|reference| {
      vault
        .resolve(reference)
        .with_context(|| format!("No note named '{reference}' in {}", vault.root().display()))
    })
    .collect()
}

/// Build the publisher configuration from CLI flags and environment.
pub(crate) fn publisher_config(cli: &Cli) -> Result<PublisherConfig> {
  let base_url = cli
    .auth
    .url
    .clone()
    .context("Confluence URL not provided. Use --url or set CONFLUENCE_URL")?;
  let (username, token) = load_credentials(cli)?;
  let space = cli
    .target
    .space
    .clone()
    .context("Space key not provided. Use --space or set CONFLUENCE_SPACE")?;

  let config = PublisherConfig {
    parent_page_id: cli.target.parent_page_id.clone(),
    include_provenance_banner: cli.target.banner,
    recreate_missing_pages: cli.target.recreate_missing,
    timeout_secs: cli.performance.timeout,
    rate_limit: cli.performance.rate_limit,
    upload_concurrency: cli.performance.resolved_parallel(),
    ..PublisherConfig::new(base_url, username, token, space)
  };
  config.validate().context("Invalid publish configuration")?;

  Ok(config)
}

/// Print the storage format and attachment list for each note.
fn preview(vault: &Vault, notes: &[Note], config: &PublisherConfig, colors: &ColorScheme) -> Result<()> {
  let options = config.storage_options();

  for note in notes {
    let content = render_note(vault, note, &options).with_context(|| format!("Failed to preview '{}'", note.id))?;

    let target = match note.page_id() {
      Some(page_id) => format!("update page {}", colors.number(page_id)),
      None => colors.warning("create new page"),
    };
    println!(
      "{} {} ({}) → {}",
      colors.info("→"),
      colors.emphasis(&note.title),
      colors.dimmed(&note.id),
      target
    );
    println!("{content}");

    for reference in attachment_references(note, &content) {
      let status = if reference.path.is_file() {
        colors.success("✓")
      } else {
        colors.error("missing")
      };
      println!(
        "  {} {} {}",
        colors.dimmed("attachment"),
        colors.path(reference.path.display()),
        status
      );
    }
    println!();
  }

  Ok(())
}

fn print_report(report: &PublishReport, config: &PublisherConfig, colors: &ColorScheme) {
  let action = if report.created { "Created" } else { "Updated" };
  let version = report
    .page
    .version_number()
    .map_or_else(|| "?".to_string(), |number| number.to_string());

  println!(
    "{} {action} page {} (version {})",
    colors.success("✓"),
    colors.number(&report.page.id),
    colors.number(version)
  );

  if let Some(web_ui) = report.page.links.as_ref().and_then(|links| links.web_ui.as_deref()) {
    println!("  {}", colors.link(format!("{}/wiki{web_ui}", config.base_url)));
  }

  if !report.uploaded.is_empty() {
    println!(
      "  {} {} attachment(s) uploaded",
      colors.success("✓"),
      colors.number(report.uploaded.len())
    );
  }

  for failure in &report.failed_uploads {
    println!(
      "  {} {} ({})",
      colors.warning("⚠"),
      colors.path(&failure.reference.title),
      failure.error
    );
  }
}
