//! Stable identities and deterministic record names
//!
//! All deduplication rests on these functions: one DependencyBuild per source
//! triple, one ArtifactBuildRequest per coordinate, one back-reference
//! annotation per contaminated build.

use crate::model::ScmInfo;
use regex::Regex;
use std::sync::OnceLock;

/// Label carrying the dependency identity on DependencyBuilds and their attempts
pub const DEPENDENCY_BUILD_ID_LABEL: &str = "jvmbuildservice.io/dependencybuild-id";

/// Marker label present on every build attempt submitted for a dependency build
pub const PIPELINE_RUN_LABEL: &str = "jvmbuildservice.io/dependencybuild-pipelinerun";

/// Annotation key prefix linking a rebuild request back to a contaminated build
pub const CONTAMINATED_BY_PREFIX: &str = "contaminated-by-";

/// Hex characters of the annotation key suffix
pub const ANNOTATION_SUFFIX_LEN: usize = 12;

/// Maximum length of a generated record name
pub const MAX_NAME_LEN: usize = 63;

const NAME_HASH_LEN: usize = 8;

/// Hex-encoded md5 digest of `unique` (32 characters)
pub fn hash_to_string(unique: &str) -> String {
    format!("{:x}", md5::compute(unique.as_bytes()))
}

/// Identity of a dependency build: digest of url + revision + subpath
pub fn dependency_id(scm: &ScmInfo) -> String {
    hash_to_string(&format!("{}{}{}", scm.scm_url, scm.tag, scm.path))
}

fn invalid_name_chars() -> &'static Regex {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    INVALID.get_or_init(|| Regex::new(r"[^a-z0-9.-]+").expect("static regex"))
}

/// Deterministic ArtifactBuildRequest name for a GAV coordinate
///
/// The group is dropped (`artifact:version` is kept), the remainder is folded to
/// lowercase DNS-safe characters and suffixed with a digest of the whole
/// coordinate so distinct groups never share a name.
pub fn artifact_build_request_name(gav: &str) -> String {
    let digest = hash_to_string(gav);
    let tail = gav.split_once(':').map(|(_, rest)| rest).unwrap_or(gav);
    let lowered = tail.to_lowercase();
    let sanitized = invalid_name_chars().replace_all(&lowered, ".");
    let trim = |c: char| c == '.' || c == '-';

    let max_base = MAX_NAME_LEN - NAME_HASH_LEN - 1;
    let base: String = sanitized.trim_matches(trim).chars().take(max_base).collect();
    let base = base.trim_end_matches(trim);

    if base.is_empty() {
        format!("artifact-{}", &digest[..NAME_HASH_LEN])
    } else {
        format!("{}-{}", base, &digest[..NAME_HASH_LEN])
    }
}

/// Annotation key recording that `dependency_build` is contaminated by an artifact
///
/// Keyed by a truncated digest of the build name so several builds can each
/// keep their own back-reference on one shared rebuild request.
pub fn contaminated_by_key(dependency_build: &str) -> String {
    format!(
        "{}{}",
        CONTAMINATED_BY_PREFIX,
        &hash_to_string(dependency_build)[..ANNOTATION_SUFFIX_LEN]
    )
}

/// Collision fallback for [`contaminated_by_key`] using the full digest
pub fn contaminated_by_key_full(dependency_build: &str) -> String {
    format!("{}{}", CONTAMINATED_BY_PREFIX, hash_to_string(dependency_build))
}

/// DNS-safe slug for a source url, used to name dependency builds
pub fn dependency_build_name(scm: &ScmInfo) -> String {
    let id = dependency_id(scm);
    let repo = scm
        .scm_url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let sanitized = invalid_name_chars().replace_all(&repo, "-");
    let trim = |c: char| c == '.' || c == '-';
    let max_base = MAX_NAME_LEN - NAME_HASH_LEN - 1;
    let base: String = sanitized.trim_matches(trim).chars().take(max_base).collect();
    let base = base.trim_end_matches(trim);

    if base.is_empty() {
        format!("build-{}", &id[..NAME_HASH_LEN])
    } else {
        format!("{}-{}", base, &id[..NAME_HASH_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_dependency_id_is_deterministic() {
        let scm = ScmInfo::new("https://github.com/apache/commons-lang", "rel/3.12", "");
        assert_eq!(dependency_id(&scm), dependency_id(&scm.clone()));
        assert_eq!(dependency_id(&scm).len(), 32);
        assert!(dependency_id(&scm).chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_dependency_id_known_value() {
        // md5("") is the well known empty digest
        let scm = ScmInfo::new("", "", "");
        assert_eq!(dependency_id(&scm), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_dependency_id_distinct_triples() {
        let triples = [
            ScmInfo::new("https://github.com/apache/commons-lang", "rel/3.12", ""),
            ScmInfo::new("https://github.com/apache/commons-lang", "rel/3.13", ""),
            ScmInfo::new("https://github.com/apache/commons-lang", "rel/3.12", "core"),
            ScmInfo::new("https://github.com/apache/commons-io", "rel/3.12", ""),
            ScmInfo::new("https://github.com/google/guava", "v31.1", "guava"),
        ];
        let ids: HashSet<String> = triples.iter().map(dependency_id).collect();
        assert_eq!(ids.len(), triples.len());
    }

    #[test]
    fn test_request_name_is_deterministic_and_dns_safe() {
        let name = artifact_build_request_name("com.google.guava:guava:31.1-jre");
        assert_eq!(name, artifact_build_request_name("com.google.guava:guava:31.1-jre"));
        assert!(name.starts_with("guava.31.1-jre-"));
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'));
    }

    #[test]
    fn test_request_name_distinguishes_groups() {
        let a = artifact_build_request_name("org.a:util:1.0");
        let b = artifact_build_request_name("org.b:util:1.0");
        assert_ne!(a, b);
        assert!(a.starts_with("util.1.0-"));
    }

    #[test]
    fn test_request_name_truncates_long_coordinates() {
        let gav = format!("org.example:{}:1.0", "x".repeat(200));
        let name = artifact_build_request_name(&gav);
        assert_eq!(name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_request_name_for_unusable_input() {
        let name = artifact_build_request_name(":::");
        assert!(name.starts_with("artifact-"));
    }

    #[test]
    fn test_contaminated_by_key_shape() {
        let key = contaminated_by_key("commons-lang-1a2b3c4d");
        assert!(key.starts_with(CONTAMINATED_BY_PREFIX));
        assert_eq!(key.len(), CONTAMINATED_BY_PREFIX.len() + ANNOTATION_SUFFIX_LEN);
        assert_ne!(key, contaminated_by_key("commons-io-1a2b3c4d"));
        assert!(contaminated_by_key_full("commons-lang-1a2b3c4d").starts_with(&key));
    }

    #[test]
    fn test_dependency_build_name() {
        let scm = ScmInfo::new("https://github.com/apache/Commons-Lang.git", "rel/3.12", "");
        let name = dependency_build_name(&scm);
        assert!(name.starts_with("commons-lang-"));
        assert!(name.ends_with(&dependency_id(&scm)[..8]));
    }
}
