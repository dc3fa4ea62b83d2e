//! Confluence publishing library
//!
//! Renders knowledge-base notes into Confluence storage format and publishes
//! them as pages, uploading referenced images as attachments.
//!
//! # Architecture
//!
//! - [`markup`] - document tree, markdown front end and storage-format rewrite
//! - [`attachments`] - finds local files referenced by rendered content
//! - [`confluence`] - REST client and the [`confluence::ConfluenceApi`] seam
//! - [`publisher`] - create-or-update pipeline for a single note
//! - [`note`] and [`vault`] - notes and the filesystem store backing them

pub mod attachments;
pub mod cli;
pub mod color;
pub mod commands;
pub mod config;
pub mod confluence;
pub mod markup;
pub mod note;
pub mod publisher;
pub mod vault;
