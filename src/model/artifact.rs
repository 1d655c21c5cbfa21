//! Artifact-level records: rebuild requests, rebuilt artifacts and the filter blob

use super::meta::{ObjectMeta, Resource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request to rebuild a single artifact coordinate from source
///
/// Keyed deterministically from the coordinate, so repeated contamination
/// reports converge on one record. Back-references to contaminated builds live
/// in annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBuildRequest {
    pub metadata: ObjectMeta,
    pub spec: ArtifactBuildRequestSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBuildRequestSpec {
    pub gav: String,
}

impl Resource for ArtifactBuildRequest {
    const KIND: &'static str = "ArtifactBuildRequest";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl ArtifactBuildRequest {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, gav: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec: ArtifactBuildRequestSpec { gav: gav.into() },
        }
    }
}

/// An artifact coordinate that has been rebuilt from source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuiltArtifact {
    pub metadata: ObjectMeta,
    pub spec: RebuiltArtifactSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuiltArtifactSpec {
    pub gav: String,
    /// Image holding the rebuilt output
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

impl Resource for RebuiltArtifact {
    const KIND: &'static str = "RebuiltArtifact";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl RebuiltArtifact {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, gav: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec: RebuiltArtifactSpec {
                gav: gav.into(),
                image: String::new(),
            },
        }
    }
}

/// Named binary object (config-map style) holding raw bytes under string keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryBlob {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub binary_data: BTreeMap<String, Vec<u8>>,
}

impl Resource for BinaryBlob {
    const KIND: &'static str = "BinaryBlob";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl BinaryBlob {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            binary_data: BTreeMap::new(),
        }
    }
}
