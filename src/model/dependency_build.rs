//! DependencyBuild: one rebuild campaign for a (source url, revision, subpath) triple

use super::meta::{ObjectMeta, Resource};
use super::recipe::BuildRecipe;
use crate::identity::{self, DEPENDENCY_BUILD_ID_LABEL};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a DependencyBuild
///
/// Persisted as a plain string. An empty string is read as `New` so records
/// created without a status start at the beginning of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DependencyBuildState {
    #[default]
    #[serde(rename = "DependencyBuildStateNew", alias = "")]
    New,
    #[serde(rename = "DependencyBuildStateDetect")]
    Detect,
    #[serde(rename = "DependencyBuildStateBuilding")]
    Building,
    #[serde(rename = "DependencyBuildStateComplete")]
    Complete,
    #[serde(rename = "DependencyBuildStateFailed")]
    Failed,
    #[serde(rename = "DependencyBuildStateContaminated")]
    Contaminated,
}

impl DependencyBuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "DependencyBuildStateNew",
            Self::Detect => "DependencyBuildStateDetect",
            Self::Building => "DependencyBuildStateBuilding",
            Self::Complete => "DependencyBuildStateComplete",
            Self::Failed => "DependencyBuildStateFailed",
            Self::Contaminated => "DependencyBuildStateContaminated",
        }
    }

    /// Short human label (`New`, `Building`, ...)
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Detect => "Detect",
            Self::Building => "Building",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
            Self::Contaminated => "Contaminated",
        }
    }

    /// Accepts both the persisted form and the short label, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Some(Self::New);
        }
        let short = trimmed
            .strip_prefix("DependencyBuildState")
            .unwrap_or(trimmed)
            .to_lowercase();
        match short.as_str() {
            "new" => Some(Self::New),
            "detect" => Some(Self::Detect),
            "building" => Some(Self::Building),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            "contaminated" => Some(Self::Contaminated),
            _ => None,
        }
    }

    /// Complete and Failed never change again without an identity edit
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for DependencyBuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Source coordinates of the code being rebuilt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScmInfo {
    #[serde(rename = "scmURL")]
    pub scm_url: String,
    pub tag: String,
    #[serde(default)]
    pub path: String,
}

impl ScmInfo {
    pub fn new(scm_url: impl Into<String>, tag: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scm_url: scm_url.into(),
            tag: tag.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyBuildSpec {
    #[serde(rename = "scm")]
    pub scm_info: ScmInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyBuildStatus {
    #[serde(default)]
    pub state: DependencyBuildState,

    /// Coordinates found embedded in the output of the last consumed attempt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contaminants: Vec<String>,

    /// Recipe of the in-flight or most recently evaluated attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_build_recipe: Option<BuildRecipe>,

    /// Untried candidates, in the order they will be attempted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub potential_build_recipes: Vec<BuildRecipe>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_build_recipes: Vec<BuildRecipe>,

    /// Name of the last build attempt whose outcome has been consumed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_build_attempt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyBuild {
    pub metadata: ObjectMeta,
    pub spec: DependencyBuildSpec,
    #[serde(default)]
    pub status: DependencyBuildStatus,
}

impl Resource for DependencyBuild {
    const KIND: &'static str = "DependencyBuild";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl DependencyBuild {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, scm_info: ScmInfo) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec: DependencyBuildSpec { scm_info },
            status: DependencyBuildStatus::default(),
        }
    }

    /// Identity persisted on the record at its last evaluation
    pub fn identity(&self) -> Option<&str> {
        self.metadata
            .labels
            .get(DEPENDENCY_BUILD_ID_LABEL)
            .map(String::as_str)
    }

    /// Identity derived from the current source coordinates
    pub fn computed_identity(&self) -> String {
        identity::dependency_id(&self.spec.scm_info)
    }

    /// Stamp a new identity and forget all recipe and attempt history
    pub fn reset_identity(&mut self, identity: String) {
        self.metadata
            .labels
            .insert(DEPENDENCY_BUILD_ID_LABEL.to_string(), identity);
        self.status = DependencyBuildStatus::default();
    }
}
