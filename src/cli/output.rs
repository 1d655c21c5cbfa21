//! Output formatting for multiple formats
//!
//! Dependency builds and configuration can be rendered as JSON, YAML or
//! human-readable text.

use anyhow::{Context, Result};
use std::fmt::Write as _;

use crate::config::ServiceConfig;
use crate::controller::PassSummary;
use crate::model::DependencyBuild;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_builds(&self, builds: &[DependencyBuild]) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(builds)
                .context("Failed to serialize dependency builds to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(builds)
                .context("Failed to serialize dependency builds to YAML"),
            OutputFormat::Human => Ok(self.format_builds_human(builds)),
        }
    }

    pub fn format_config(&self, config: &ServiceConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&config.to_display_map())
                .context("Failed to serialize config to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(&config.to_display_map())
                .context("Failed to serialize config to YAML"),
            OutputFormat::Human => Ok(config.to_string()),
        }
    }

    fn format_builds_human(&self, builds: &[DependencyBuild]) -> String {
        if builds.is_empty() {
            return "No dependency builds found\n".to_string();
        }

        let mut output = String::new();
        for db in builds {
            let status = &db.status;
            let scm = &db.spec.scm_info;
            let _ = writeln!(output, "{} [{}]", db.metadata.name, status.state);
            let _ = writeln!(output, "  Source: {} @ {}", scm.scm_url, scm.tag);
            if !scm.path.is_empty() {
                let _ = writeln!(output, "  Path: {}", scm.path);
            }
            if let Some(recipe) = &status.current_build_recipe {
                let _ = writeln!(output, "  Current recipe: {}", recipe);
            }
            if !status.potential_build_recipes.is_empty() {
                let _ = writeln!(
                    output,
                    "  Remaining recipes: {}",
                    join(status.potential_build_recipes.iter().map(|r| r.to_string()))
                );
            }
            if !status.failed_build_recipes.is_empty() {
                let _ = writeln!(
                    output,
                    "  Failed recipes: {}",
                    join(status.failed_build_recipes.iter().map(|r| r.to_string()))
                );
            }
            if let Some(attempt) = &status.last_completed_build_attempt {
                let _ = writeln!(output, "  Last completed attempt: {}", attempt);
            }
            if !status.contaminants.is_empty() {
                let _ = writeln!(output, "  Contaminants: {}", status.contaminants.join(", "));
            }
        }
        output
    }
}

/// One-line human summary of a controller pass
pub fn format_summary(summary: &PassSummary) -> String {
    format!(
        "Reconciled {} dependency builds: {} evaluations, {} transitions, {} errors{}",
        summary.builds,
        summary.evaluations,
        summary.transitions,
        summary.errors,
        if summary.filter_written {
            ", filter updated"
        } else {
            ""
        }
    )
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildRecipe, DependencyBuildState, ScmInfo};

    fn sample() -> DependencyBuild {
        let mut db = DependencyBuild::new(
            "ns",
            "commons-lang-1a2b3c4d",
            ScmInfo::new("https://github.com/apache/commons-lang", "rel/3.12", ""),
        );
        db.status.state = DependencyBuildState::Contaminated;
        db.status.current_build_recipe = Some(BuildRecipe::new("jdk11", "registry/jdk11:1"));
        db.status.failed_build_recipes = vec![BuildRecipe::new("jdk8", "registry/jdk8:1")];
        db.status.contaminants = vec!["com.x:y:1.0".to_string()];
        db
    }

    #[test]
    fn test_human_builds() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_builds(&[sample()])
            .unwrap();

        assert!(output.contains("commons-lang-1a2b3c4d [Contaminated]"));
        assert!(output.contains("Current recipe: jdk11 (registry/jdk11:1)"));
        assert!(output.contains("Failed recipes: jdk8 (registry/jdk8:1)"));
        assert!(output.contains("Contaminants: com.x:y:1.0"));
        assert!(!output.contains("Path:"));
    }

    #[test]
    fn test_human_no_builds() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format_builds(&[])
            .unwrap();
        assert_eq!(output, "No dependency builds found\n");
    }

    #[test]
    fn test_json_builds_use_persisted_state_names() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format_builds(&[sample()])
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            parsed[0]["status"]["state"],
            "DependencyBuildStateContaminated"
        );
    }

    #[test]
    fn test_yaml_builds() {
        let output = OutputFormatter::new(OutputFormat::Yaml)
            .format_builds(&[sample()])
            .unwrap();
        assert!(output.contains("DependencyBuildStateContaminated"));
    }

    #[test]
    fn test_summary() {
        let summary = PassSummary {
            builds: 2,
            evaluations: 8,
            transitions: 4,
            errors: 0,
            filter_written: true,
        };
        assert_eq!(
            format_summary(&summary),
            "Reconciled 2 dependency builds: 8 evaluations, 4 transitions, 0 errors, filter updated"
        );
    }
}
