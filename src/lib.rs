//! Maverick - A development orchestrator for JavaScript monorepos
//!
//! Maverick turns a monorepo's package graph plus a `maverick.yml` file into a
//! docker-compose manifest and drives the compose tool through it:
//!
//! - Layered service configuration with defaults, overrides and builtins
//! - Package graph discovery for Lerna workspaces
//! - Cross-unit template references inside unit configuration
//! - Dependency-aware, phased startup and shutdown

pub mod compose;
pub mod config;
pub mod error;
pub mod process;
pub mod project;
pub mod tools;

pub use error::{MaverickError, Result};
