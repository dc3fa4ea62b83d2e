//! confluence-publish - Publish knowledge-base notes to Confluence
//!
//! This is the main entry point for the CLI application.

#[tokio::main]
async fn main() {
  confluence_publish::cli::run().await;
}
