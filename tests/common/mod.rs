//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod fake_confluence;
pub mod fixtures;
pub mod memory_store;
