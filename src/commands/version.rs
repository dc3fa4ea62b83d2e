//! Version/metadata reporting.
//!
//! Implements the `confluence-publish version` subcommand, which prints
//! either a human-readable summary or a JSON document describing the build.

use serde_json::json;

use crate::color::ColorScheme;

/// Render version and build metadata in JSON or human-readable form.
///
/// # Arguments
/// * `json` - When `true`, emit a JSON document instead of colored text.
/// * `short` - When `true`, print only the semantic version string.
/// * `colors` - Shared color palette for styled terminal output.
pub(crate) fn handle_version_command(json: bool, short: bool, colors: &ColorScheme) {
  let version = env!("CARGO_PKG_VERSION");

  if short {
    println!("{version}");
    return;
  }

  let built = format_timestamp(env!("BUILD_TIMESTAMP"));

  if json {
    let document = json!({
      "version": version,
      "git_commit": env!("GIT_HASH"),
      "build_timestamp": built,
      "target": env!("TARGET"),
      "rust_version": env!("RUSTC_VERSION"),
    });
    println!("{document:#}");
    return;
  }

  println!("{} {}", colors.emphasis("confluence-publish"), colors.number(version));
  println!("{}: {}", colors.emphasis("Git commit"), colors.code(env!("GIT_HASH")));
  println!("{}: {}", colors.emphasis("Built"), colors.dimmed(built));
  println!("{}: {}", colors.emphasis("Target"), env!("TARGET"));
  println!("{}: {}", colors.emphasis("Rust version"), env!("RUSTC_VERSION"));
}

/// Convert the embedded build timestamp (Unix seconds) into an ISO-8601
/// string, or return the raw input when it does not parse.
fn format_timestamp(timestamp: &str) -> String {
  timestamp
    .parse::<i64>()
    .ok()
    .and_then(|secs| chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0))
    .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    .unwrap_or_else(|| timestamp.to_string())
}
