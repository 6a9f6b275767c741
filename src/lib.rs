//! appdeck - a TUI for installing and removing curated applications
//!
//! This library exposes the core modules for use by the TUI binary, the
//! debug CLI and tests.

pub mod config;
pub mod core;
pub mod logo;
pub mod metadata;
pub mod provider;
pub mod task;
pub mod types;
