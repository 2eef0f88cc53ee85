//! pg-panel - Administrative client for local and remote PostgreSQL instances.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
