//! Compose topology engine
//!
//! Turns `maverick.yml` and the discovered package graph into a compose
//! manifest, and drives lifecycle commands against it in phase order.

pub mod builder;
pub mod builtins;
pub mod config;
pub mod driver;
pub mod generator;
pub mod merge;
pub mod orchestrator;
pub mod phase;
pub mod synthesizer;
pub mod template;

pub use builder::{CategoryLists, ComposeBuilder};
pub use config::{Category, ComposeDefinition, ServiceDeclaration};
pub use driver::{ComposeBinary, RuntimeDriver};
pub use generator::ManifestGenerator;
pub use orchestrator::{ComposeOrchestrator, UnitSummary};
