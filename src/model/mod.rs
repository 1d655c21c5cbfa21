//! Persisted record types
//!
//! Every record carries an [`ObjectMeta`] under `metadata` and implements
//! [`Resource`] so the generic store can persist it.

pub mod artifact;
pub mod build_attempt;
pub mod dependency_build;
pub mod meta;
pub mod recipe;

pub use artifact::{ArtifactBuildRequest, BinaryBlob, RebuiltArtifact};
pub use build_attempt::{BuildAttempt, RESULT_CONTAMINANTS};
pub use dependency_build::{DependencyBuild, DependencyBuildState, DependencyBuildStatus, ScmInfo};
pub use meta::{LabelSelector, ObjectKey, ObjectMeta, Resource};
pub use recipe::BuildRecipe;
