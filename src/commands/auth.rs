//! Authentication subcommand handlers.
//!
//! Covers `confluence-publish auth test`, which performs a live API call, and
//! `confluence-publish auth show`, which prints the resolved connection
//! settings and where each came from.

use std::process;

use anyhow::Context;

use crate::cli::{AuthCommand, Cli};
use crate::color::ColorScheme;
use crate::confluence::{ConfluenceClient, PageDefaults};

const API_TOKEN_URL: &str = "https://id.atlassian.com/manage-profile/security/api-tokens";

/// Dispatch the authentication subcommands defined under
/// `confluence-publish auth`.
///
/// # Arguments
/// * `subcommand` - Auth-specific variant to execute.
/// * `cli` - Parsed CLI settings.
/// * `colors` - Shared color scheme used to render output consistently.
pub(crate) async fn handle_auth_command(subcommand: AuthCommand, cli: &Cli, colors: &ColorScheme) {
  match subcommand {
    AuthCommand::Test => test_auth(cli, colors).await,
    AuthCommand::Show => show_auth_config(cli, colors),
  }
}

async fn test_auth(cli: &Cli, colors: &ColorScheme) {
  let Some(base_url) = cli.auth.url.as_deref() else {
    eprintln!("{} {}", colors.error("✗"), colors.error("Base URL not provided"));
    eprintln!("\n{}", colors.info("Please provide the Confluence URL:"));
    eprintln!("  confluence-publish auth test --url https://your-instance.atlassian.net");
    eprintln!("  Or set CONFLUENCE_URL environment variable");
    process::exit(1);
  };

  println!("{} {}", colors.info("→"), colors.info("Testing authentication"));
  println!("  {}: {}", colors.emphasis("URL"), colors.link(base_url));

  let (username, token) = match load_credentials(cli) {
    Ok(creds) => creds,
    Err(e) => {
      eprintln!("\n{} {}", colors.error("✗"), colors.error("Failed to load credentials"));
      eprintln!("  {e}");
      eprintln!("\n{}", colors.info("Setup instructions:"));
      eprintln!("  1. Create an API token at: {}", colors.link(API_TOKEN_URL));
      eprintln!("  2. Provide credentials via --user and --token, or");
      eprintln!("     CONFLUENCE_USER and CONFLUENCE_TOKEN");
      process::exit(2);
    }
  };

  println!("  {}: {}", colors.emphasis("Username"), username);

  let defaults = PageDefaults::new(
    cli.target.space.clone().unwrap_or_default(),
    cli.target.parent_page_id.as_deref(),
  );
  let client = match ConfluenceClient::new(
    base_url,
    username,
    token,
    defaults,
    cli.performance.timeout,
    cli.performance.rate_limit,
  ) {
    Ok(client) => client,
    Err(e) => {
      eprintln!("\n{} {}", colors.error("✗"), colors.error("Failed to create API client"));
      eprintln!("  {e}");
      process::exit(1);
    }
  };

  println!("\n{} {}", colors.info("→"), colors.info("Calling Confluence API..."));
  match client.current_user().await {
    Ok(user_info) => {
      println!("\n{} {}", colors.success("✓"), colors.success("Authentication successful!"));
      println!("\n{}", colors.emphasis("User Information:"));
      println!("  {}: {}", colors.emphasis("Display Name"), user_info.display_name);
      println!("  {}: {}", colors.emphasis("Account ID"), colors.dimmed(&user_info.account_id));
      if let Some(email) = user_info.email {
        println!("  {}: {}", colors.emphasis("Email"), email);
      }
    }
    Err(e) => {
      eprintln!("\n{} {}", colors.error("✗"), colors.error("Authentication failed"));
      eprintln!("  {e}");
      eprintln!("\n{}", colors.info("Common issues:"));
      eprintln!("  1. Invalid API token - verify at {}", colors.link(API_TOKEN_URL));
      eprintln!("  2. Incorrect username - should be your email address");
      eprintln!("  3. Wrong base URL - should be https://your-instance.atlassian.net");
      eprintln!(
        "\n{}",
        colors.dimmed("Run 'confluence-publish auth show' to see your current configuration")
      );
      process::exit(2);
    }
  }
}

/// Display the resolved connection settings and where each one came from.
fn show_auth_config(cli: &Cli, colors: &ColorScheme) {
  println!("{}\n", colors.emphasis("Publish Configuration"));

  let settings = [
    ("Base URL", "CONFLUENCE_URL", cli.auth.url.clone()),
    ("Username", "CONFLUENCE_USER", cli.auth.user.clone()),
    ("API Token", "CONFLUENCE_TOKEN", cli.auth.token.as_deref().map(mask_token)),
    ("Space", "CONFLUENCE_SPACE", cli.target.space.clone()),
    ("Parent Page", "CONFLUENCE_PARENT_PAGE_ID", cli.target.parent_page_id.clone()),
  ];

  for (label, env, value) in &settings {
    match value {
      Some(value) => {
        println!("{}: {}", colors.emphasis(label), value);
        println!("  {}: {}", colors.dimmed("Source"), colors.dimmed(setting_source(env)));
      }
      None => println!("{}: {}", colors.emphasis(label), colors.dimmed("(not set)")),
    }
  }

  println!("{}: {}", colors.emphasis("Vault"), colors.path(cli.vault.vault.display()));

  let missing: Vec<&str> = settings
    .iter()
    .filter(|(label, _, value)| value.is_none() && *label != "Parent Page")
    .map(|(_, env, _)| *env)
    .collect();

  if missing.is_empty() {
    println!("\n{} {}", colors.success("✓"), colors.success("Ready to publish"));
  } else {
    println!("\n{} {}", colors.warning("⚠"), colors.warning("Configuration incomplete"));
    for env in missing {
      println!("  Missing: {env}");
    }
  }
}

fn setting_source(env: &str) -> &'static str {
  if std::env::var_os(env).is_some() {
    "environment variable"
  } else {
    "command-line flag"
  }
}

/// Mask all but the first four characters of long tokens, and all of short
/// ones.
fn mask_token(token: &str) -> String {
  let len = token.chars().count();
  if len > 8 {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}{}", "*".repeat(len - 4))
  } else {
    "*".repeat(len)
  }
}

/// Resolve Confluence credentials from CLI flags or environment variables.
///
/// # Returns
/// A tuple of `(username, token)`.
///
/// # Errors
/// Returns an error naming whichever credential is missing.
pub(crate) fn load_credentials(cli: &Cli) -> anyhow::Result<(String, String)> {
  let username = cli
    .auth
    .user
    .clone()
    .context("Username not found. Provide --user or set CONFLUENCE_USER")?;
  let token = cli
    .auth
    .token
    .clone()
    .context("API token not found. Provide --token or set CONFLUENCE_TOKEN")?;
  Ok((username, token))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_mask_token() {
    assert_eq!(mask_token("abcdefghijkl"), "abcd********");
    assert_eq!(mask_token("short"), "*****");
    assert_eq!(mask_token(""), "");
  }
}
