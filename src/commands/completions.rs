//! Shell completion generation.

use std::io;

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::Cli;

/// Write a completion script for `shell` to stdout.
pub(crate) fn handle_completions_command(shell: Shell) {
  let mut cmd = Cli::command();
  let bin_name = cmd.get_name().to_string();
  generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_completions_mention_subcommands() {
    let mut cmd = Cli::command();
    let mut out = Vec::new();
    generate(Shell::Bash, &mut cmd, "confluence-publish", &mut out);

    let script = String::from_utf8(out).unwrap();
    assert!(script.contains("confluence-publish"));
    assert!(script.contains("--recreate-missing"));
  }
}
