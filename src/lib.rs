//! jvm-rebuild - rebuild lifecycle controller for JVM dependencies
//!
//! Drives dependency builds from a source coordinate to a finished rebuild.
//! Each build walks through recipe selection, build attempts and retries
//! across builder images. Builds whose output embeds third-party artifacts are
//! marked contaminated and linked to artifact build requests. A Bloom filter
//! over every rebuilt artifact answers "has this coordinate been rebuilt?".
//!
//! # Core Concepts
//!
//! - **Dependency build**: a request to build one source checkout, identified
//!   by a digest of its URL, tag and path
//! - **Build recipe**: a named builder image; builds try recipes in order
//! - **Build attempt**: one submission of a build with one recipe
//! - **Contaminant**: an artifact coordinate embedded in a successful build's
//!   output that must itself be rebuilt first
//!
//! # Example Usage
//!
//! ```no_run
//! use jvm_rebuild::events::LoggingHandler;
//! use jvm_rebuild::model::{DependencyBuild, ScmInfo};
//! use jvm_rebuild::store::{MemoryStore, Store};
//! use jvm_rebuild::{Controller, ServiceConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//! let config = ServiceConfig::default();
//! let scm = ScmInfo::new("https://github.com/apache/commons-lang", "rel/3.12", "");
//! store
//!     .create(&DependencyBuild::new(&config.namespace, "commons-lang", scm))
//!     .await?;
//!
//! let controller = Controller::new(Arc::new(config), store, Arc::new(LoggingHandler));
//! let summary = controller.run_once().await?;
//! println!("{} transitions", summary.transitions);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`model`]: persisted record types
//! - [`store`]: record store with optimistic concurrency
//! - [`reconciler`]: state machine, contamination resolver and membership filter
//! - [`controller`]: passes over the namespace

pub mod cli;
pub mod config;
pub mod controller;
pub mod events;
pub mod identity;
pub mod model;
pub mod recipe;
pub mod reconciler;
pub mod store;
pub mod tracker;
pub mod util;

pub use config::{ConfigError, ServiceConfig};
pub use controller::{Controller, PassSummary};
pub use events::{EventHandler, ReconcileEvent};
pub use reconciler::{BloomFilter, ReconcileError, ReconcileOutcome, Reconciler};
pub use store::{Store, StoreError};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_jvm_rebuild() {
        assert_eq!(NAME, "jvm-rebuild");
    }
}
