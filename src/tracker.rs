//! Build attempt tracking
//!
//! Finds the most recent attempt submitted for a dependency identity and
//! decides whether its outcome is still waiting to be consumed.

use crate::identity::DEPENDENCY_BUILD_ID_LABEL;
use crate::model::{BuildAttempt, LabelSelector, RESULT_CONTAMINANTS};
use crate::store::{Store, StoreError};
use std::collections::HashSet;

/// What the latest attempt means for its dependency build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    /// The outcome was already recorded on the dependency build
    AlreadyConsumed,
    /// The pipeline engine has not finished the attempt yet
    Running,
    Finished(AttemptOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub attempt: String,
    pub succeeded: bool,
    pub contaminants: Vec<String>,
}

impl AttemptOutcome {
    pub fn is_clean(&self) -> bool {
        self.succeeded && self.contaminants.is_empty()
    }
}

/// Selector matching every attempt carrying `identity`
pub fn attempts_selector(identity: &str) -> LabelSelector {
    LabelSelector::everything().with_label(DEPENDENCY_BUILD_ID_LABEL, identity)
}

/// All attempts submitted for `identity` in `namespace`
pub async fn list_attempts(
    store: &dyn Store,
    namespace: &str,
    identity: &str,
) -> Result<Vec<BuildAttempt>, StoreError> {
    store.list(namespace, &attempts_selector(identity)).await
}

/// Attempt with the latest creation timestamp, ties broken by the greater name
pub fn latest_attempt(attempts: &[BuildAttempt]) -> Option<&BuildAttempt> {
    attempts.iter().max_by(|a, b| {
        a.metadata
            .creation_timestamp
            .cmp(&b.metadata.creation_timestamp)
            .then_with(|| a.metadata.name.cmp(&b.metadata.name))
    })
}

/// Split a comma-separated contaminant result
///
/// Entries are trimmed; empty entries and repeats are dropped, first
/// occurrence order is kept.
pub fn parse_contaminants(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(*c))
        .map(str::to_string)
        .collect()
}

/// Classify `attempt` against the last outcome already consumed
pub fn classify(attempt: &BuildAttempt, last_completed: Option<&str>) -> AttemptStatus {
    if last_completed == Some(attempt.metadata.name.as_str()) {
        return AttemptStatus::AlreadyConsumed;
    }
    if !attempt.is_complete() {
        return AttemptStatus::Running;
    }

    AttemptStatus::Finished(AttemptOutcome {
        attempt: attempt.metadata.name.clone(),
        succeeded: attempt.is_successful(),
        contaminants: attempt
            .result(RESULT_CONTAMINANTS)
            .map(parse_contaminants)
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildRecipe, DependencyBuild, ScmInfo};
    use chrono::{Duration, TimeZone, Utc};
    use yare::parameterized;

    fn attempt(name: &str, offset_secs: i64) -> BuildAttempt {
        let db = DependencyBuild::new("ns", "db", ScmInfo::new("u", "t", ""));
        let mut attempt =
            BuildAttempt::for_dependency_build(&db, "id", &BuildRecipe::new("jdk11", "img"));
        attempt.metadata.name = name.to_string();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        attempt.metadata.creation_timestamp = Some(base + Duration::seconds(offset_secs));
        attempt
    }

    #[test]
    fn test_latest_attempt_by_timestamp() {
        let attempts = vec![attempt("b", 1), attempt("c", 3), attempt("a", 2)];
        assert_eq!(latest_attempt(&attempts).unwrap().metadata.name, "c");
    }

    #[test]
    fn test_latest_attempt_tie_breaks_on_name() {
        let attempts = vec![attempt("db-build-aaaaa", 5), attempt("db-build-zzzzz", 5)];
        assert_eq!(
            latest_attempt(&attempts).unwrap().metadata.name,
            "db-build-zzzzz"
        );

        let reversed = vec![attempt("db-build-zzzzz", 5), attempt("db-build-aaaaa", 5)];
        assert_eq!(
            latest_attempt(&reversed).unwrap().metadata.name,
            "db-build-zzzzz"
        );
    }

    #[test]
    fn test_latest_attempt_of_nothing() {
        assert!(latest_attempt(&[]).is_none());
    }

    #[parameterized(
        empty = { "", &[] },
        single = { "com.x:y:1.0", &["com.x:y:1.0"] },
        blanks = { " , ,", &[] },
        duplicates = { "com.x:y:1.0,com.x:y:1.0,", &["com.x:y:1.0"] },
        spaced = { "a:b:1 , c:d:2", &["a:b:1", "c:d:2"] },
    )]
    fn test_parse_contaminants(raw: &str, expected: &[&str]) {
        assert_eq!(parse_contaminants(raw), expected);
    }

    #[test]
    fn test_classify_running() {
        let running = attempt("a", 0);
        assert_eq!(classify(&running, None), AttemptStatus::Running);
    }

    #[test]
    fn test_classify_consumed_before_completion_check() {
        let running = attempt("a", 0);
        assert_eq!(classify(&running, Some("a")), AttemptStatus::AlreadyConsumed);
    }

    #[test]
    fn test_classify_finished() {
        let mut done = attempt("a", 0);
        done.complete(true, Some("com.x:y:1.0,"));

        match classify(&done, Some("older")) {
            AttemptStatus::Finished(outcome) => {
                assert_eq!(outcome.attempt, "a");
                assert!(outcome.succeeded);
                assert_eq!(outcome.contaminants, vec!["com.x:y:1.0"]);
                assert!(!outcome.is_clean());
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn test_classify_failure_without_results() {
        let mut done = attempt("a", 0);
        done.complete(false, None);

        let AttemptStatus::Finished(outcome) = classify(&done, None) else {
            panic!("attempt should be finished");
        };
        assert!(!outcome.succeeded);
        assert!(outcome.contaminants.is_empty());
    }
}
