//! Build attempt records: one execution of a recipe by the pipeline engine

use super::dependency_build::DependencyBuild;
use super::meta::{ObjectMeta, Resource};
use super::recipe::BuildRecipe;
use crate::identity::{DEPENDENCY_BUILD_ID_LABEL, PIPELINE_RUN_LABEL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pipeline the engine runs for every dependency build attempt
pub const BUILD_PIPELINE: &str = "run-component-build";

pub const PARAM_SCM_URL: &str = "url";
pub const PARAM_SCM_TAG: &str = "tag";
pub const PARAM_PATH: &str = "context";
pub const PARAM_IMAGE: &str = "image";

/// Result carrying the comma-separated contaminant coordinates
pub const RESULT_CONTAMINANTS: &str = "contaminants";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAttemptSpec {
    pub pipeline_ref: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAttemptStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,

    /// Success condition; `None` while the engine has not decided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAttempt {
    pub metadata: ObjectMeta,
    pub spec: BuildAttemptSpec,
    #[serde(default)]
    pub status: BuildAttemptStatus,
}

impl Resource for BuildAttempt {
    const KIND: &'static str = "BuildAttempt";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl BuildAttempt {
    /// Submission request for `recipe` against the source coordinates of `db`
    ///
    /// The name is left to the store (`<db>-build-<suffix>`); the identity label
    /// is what correlates the attempt back to its dependency build.
    pub fn for_dependency_build(db: &DependencyBuild, identity: &str, recipe: &BuildRecipe) -> Self {
        let mut metadata = ObjectMeta::generated(
            &db.metadata.namespace,
            format!("{}-build-", db.metadata.name),
        );
        metadata
            .labels
            .insert(DEPENDENCY_BUILD_ID_LABEL.to_string(), identity.to_string());
        metadata
            .labels
            .insert(PIPELINE_RUN_LABEL.to_string(), String::new());
        metadata.owner = Some(db.metadata.name.clone());

        let scm = &db.spec.scm_info;
        let params = BTreeMap::from([
            (PARAM_SCM_URL.to_string(), scm.scm_url.clone()),
            (PARAM_SCM_TAG.to_string(), scm.tag.clone()),
            (PARAM_PATH.to_string(), scm.path.clone()),
            (PARAM_IMAGE.to_string(), recipe.image.clone()),
        ]);

        Self {
            metadata,
            spec: BuildAttemptSpec {
                pipeline_ref: BUILD_PIPELINE.to_string(),
                params,
            },
            status: BuildAttemptStatus::default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.completion_time.is_some()
    }

    pub fn is_successful(&self) -> bool {
        self.status.succeeded == Some(true)
    }

    pub fn result(&self, name: &str) -> Option<&str> {
        self.status.results.get(name).map(String::as_str)
    }

    pub fn image(&self) -> Option<&str> {
        self.spec.params.get(PARAM_IMAGE).map(String::as_str)
    }

    /// Mark the attempt finished, as the pipeline engine would
    pub fn complete(&mut self, succeeded: bool, contaminants: Option<&str>) {
        self.status.completion_time = Some(Utc::now());
        self.status.succeeded = Some(succeeded);
        if let Some(value) = contaminants {
            self.status
                .results
                .insert(RESULT_CONTAMINANTS.to_string(), value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScmInfo;

    #[test]
    fn test_attempt_carries_submission_contract() {
        let db = DependencyBuild::new(
            "ns",
            "commons-io",
            ScmInfo::new("https://github.com/apache/commons-io", "rel/2.11", "core"),
        );
        let recipe = BuildRecipe::new("jdk11", "quay.io/builders/jdk11:latest");

        let attempt = BuildAttempt::for_dependency_build(&db, "abc123", &recipe);

        assert!(attempt.metadata.name.is_empty());
        assert_eq!(attempt.metadata.generate_name, "commons-io-build-");
        assert_eq!(attempt.metadata.owner.as_deref(), Some("commons-io"));
        assert_eq!(
            attempt.metadata.labels.get(DEPENDENCY_BUILD_ID_LABEL).map(String::as_str),
            Some("abc123")
        );
        assert_eq!(attempt.spec.pipeline_ref, BUILD_PIPELINE);
        assert_eq!(attempt.spec.params[PARAM_SCM_URL], "https://github.com/apache/commons-io");
        assert_eq!(attempt.spec.params[PARAM_SCM_TAG], "rel/2.11");
        assert_eq!(attempt.spec.params[PARAM_PATH], "core");
        assert_eq!(attempt.image(), Some("quay.io/builders/jdk11:latest"));
        assert!(!attempt.is_complete());
    }

    #[test]
    fn test_complete_records_outcome() {
        let mut attempt = BuildAttempt::default();
        attempt.complete(true, Some("com.x:y:1.0"));

        assert!(attempt.is_complete());
        assert!(attempt.is_successful());
        assert_eq!(attempt.result(RESULT_CONTAMINANTS), Some("com.x:y:1.0"));
    }
}
