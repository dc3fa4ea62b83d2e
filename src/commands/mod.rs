//! CLI subcommand handlers.
//!
//! One module per `confluence-publish` command, keeping `cli.rs` down to
//! argument definitions and dispatch.

pub mod auth;
pub mod completions;
pub mod publish;
pub mod version;
