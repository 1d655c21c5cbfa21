//! Command handlers
//!
//! Each handler works against an opened [`CliContext`] and returns the text to
//! print; `main` owns printing and exit codes.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::commands::{
    CheckArgs, CliArgs, Commands, CompleteArgs, ConfigArgs, ReconcileArgs, RebuiltArgs,
    StatusArgs, SubmitArgs,
};
use super::output::{format_summary, OutputFormatter};
use crate::config::ServiceConfig;
use crate::controller::Controller;
use crate::events::LoggingHandler;
use crate::identity::{artifact_build_request_name, dependency_build_name, dependency_id};
use crate::model::{
    BuildAttempt, DependencyBuild, DependencyBuildState, LabelSelector, ObjectKey,
    RebuiltArtifact, Resource, ScmInfo,
};
use crate::reconciler::Reconciler;
use crate::store::{FileStore, Store, StoreError};

/// Opened configuration and store shared by every command
pub struct CliContext {
    pub config: Arc<ServiceConfig>,
    pub store: Arc<dyn Store>,
}

impl CliContext {
    /// Validate `config` and open its file-backed store
    pub async fn open(config: ServiceConfig) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let store = FileStore::open(&config.store_path).await.with_context(|| {
            format!("Failed to open store {}", config.store_path.display())
        })?;
        debug!(store = %config.store_path.display(), "Opened record store");

        Ok(Self::from_parts(config, Arc::new(store)))
    }

    pub fn from_parts(config: ServiceConfig, store: Arc<dyn Store>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn controller(&self) -> Controller {
        Controller::new(
            self.config.clone(),
            self.store.clone(),
            Arc::new(LoggingHandler),
        )
    }
}

/// Effective configuration: environment first, then global flags
pub fn config_from_args(args: &CliArgs) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    if let Some(store) = &args.store {
        config.store_path = store.clone();
    }
    if let Some(namespace) = &args.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.to_lowercase();
    } else if args.verbose {
        config.log_level = "debug".to_string();
    } else if args.quiet {
        config.log_level = "error".to_string();
    }
    config
}

pub async fn run(args: &CliArgs) -> Result<String> {
    let context = CliContext::open(config_from_args(args)).await?;
    dispatch(&context, &args.command).await
}

pub async fn dispatch(context: &CliContext, command: &Commands) -> Result<String> {
    match command {
        Commands::Submit(args) => handle_submit(context, args).await,
        Commands::Reconcile(args) => handle_reconcile(context, args).await,
        Commands::Status(args) => handle_status(context, args).await,
        Commands::Complete(args) => handle_complete(context, args).await,
        Commands::Check(args) => handle_check(context, args).await,
        Commands::Rebuilt(args) => handle_rebuilt(context, args).await,
        Commands::Config(args) => handle_config(context, args),
    }
}

pub async fn handle_submit(context: &CliContext, args: &SubmitArgs) -> Result<String> {
    let scm = ScmInfo::new(&args.url, &args.tag, &args.path);
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| dependency_build_name(&scm));
    let identity = dependency_id(&scm);

    let db = DependencyBuild::new(context.namespace(), name, scm);
    let created = match context.store.create(&db).await {
        Ok(created) => created,
        Err(StoreError::AlreadyExists { .. }) => {
            bail!("Dependency build {} already exists", db.key())
        }
        Err(e) => return Err(e).context("Failed to create dependency build"),
    };

    info!(build = %created.key(), identity = %identity, "Submitted dependency build");
    Ok(format!(
        "Created dependency build {} (identity {})",
        created.key(),
        identity
    ))
}

pub async fn handle_reconcile(context: &CliContext, args: &ReconcileArgs) -> Result<String> {
    let controller = context.controller();
    if let Some(path) = &args.builders {
        let system_config = read_system_config(path)?;
        let loaded = controller.reload_builders(&system_config);
        if loaded == 0 {
            bail!("No usable builder images in {}", path.display());
        }
    }

    if args.watch {
        controller.run().await;
        return Ok("Controller stopped".to_string());
    }

    let summary = controller
        .run_once()
        .await
        .context("Controller pass failed")?;
    Ok(format_summary(&summary))
}

/// Flat `key: value` map; YAML also accepts JSON documents
fn read_system_config(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read builder config {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse builder config {}", path.display()))
}

pub async fn handle_status(context: &CliContext, args: &StatusArgs) -> Result<String> {
    let state = match &args.state {
        Some(name) => match DependencyBuildState::from_name(name) {
            Some(state) => Some(state),
            None => bail!("Unknown dependency build state '{}'", name),
        },
        None => None,
    };

    let mut builds: Vec<DependencyBuild> = context
        .store
        .list(context.namespace(), &LabelSelector::everything())
        .await
        .context("Failed to list dependency builds")?;
    if let Some(state) = state {
        builds.retain(|db| db.status.state == state);
    }

    OutputFormatter::new(args.format.into()).format_builds(&builds)
}

pub async fn handle_complete(context: &CliContext, args: &CompleteArgs) -> Result<String> {
    let key = ObjectKey::new(context.namespace(), &args.attempt);
    let mut attempt: BuildAttempt = context
        .store
        .get(&key)
        .await
        .with_context(|| format!("Failed to load build attempt {}", key))?;
    if attempt.is_complete() {
        bail!("Build attempt {} is already complete", key);
    }

    attempt.complete(args.success, args.contaminants.as_deref());
    context
        .store
        .update(&attempt)
        .await
        .with_context(|| format!("Failed to update build attempt {}", key))?;

    let controller = context.controller();
    let builds = controller.builds_for_attempt(&attempt).await?;
    let mut lines = vec![format!(
        "Recorded {} for build attempt {}",
        if args.success { "success" } else { "failure" },
        key
    )];
    for build in builds {
        controller
            .settle(&build)
            .await
            .with_context(|| format!("Failed to reconcile {}", build))?;
        let db: DependencyBuild = context.store.get(&build).await?;
        lines.push(format!("{} is now {}", build, db.status.state));
    }
    Ok(lines.join("\n"))
}

pub async fn handle_check(context: &CliContext, args: &CheckArgs) -> Result<String> {
    let controller = context.controller();
    let present = controller
        .artifacts()
        .contains(context.namespace(), &args.gav)
        .await
        .context("Failed to read membership filter")?;

    Ok(match present {
        Some(true) => format!("{}: possibly rebuilt", args.gav),
        Some(false) => format!("{}: not rebuilt", args.gav),
        None => format!(
            "No membership filter in namespace {}",
            context.namespace()
        ),
    })
}

pub async fn handle_rebuilt(context: &CliContext, args: &RebuiltArgs) -> Result<String> {
    let mut artifact = RebuiltArtifact::new(
        context.namespace(),
        artifact_build_request_name(&args.gav),
        &args.gav,
    );
    if let Some(image) = &args.image {
        artifact.spec.image = image.clone();
    }

    let key = match context.store.create(&artifact).await {
        Ok(created) => created.key(),
        Err(StoreError::AlreadyExists { .. }) => artifact.key(),
        Err(e) => return Err(e).context("Failed to register rebuilt artifact"),
    };

    let controller = context.controller();
    controller
        .artifacts()
        .reconcile(&key)
        .await
        .context("Failed to rebuild membership filter")?;
    Ok(format!("Registered rebuilt artifact {} as {}", args.gav, key))
}

pub fn handle_config(context: &CliContext, args: &ConfigArgs) -> Result<String> {
    OutputFormatter::new(args.format.into()).format_config(&context.config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::OutputFormatArg;
    use crate::model::ArtifactBuildRequest;
    use crate::recipe::BuilderImage;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ServiceConfig {
        ServiceConfig {
            namespace: "builds".to_string(),
            reconcile_timeout_secs: 30,
            poll_interval_secs: 1,
            filter_name: "jvm-build-service-filter".to_string(),
            store_path: dir.path().join("store.json"),
            builder_images: vec![
                BuilderImage::new("jdk11", "registry/jdk11:1"),
                BuilderImage::new("jdk17", "registry/jdk17:1"),
            ],
            log_level: "info".to_string(),
        }
    }

    fn submit_args() -> SubmitArgs {
        SubmitArgs {
            url: "https://github.com/apache/commons-lang".to_string(),
            tag: "rel/3.12".to_string(),
            path: String::new(),
            name: None,
        }
    }

    async fn latest_attempt(context: &CliContext) -> BuildAttempt {
        let attempts: Vec<BuildAttempt> = context
            .store
            .list("builds", &LabelSelector::everything())
            .await
            .unwrap();
        crate::tracker::latest_attempt(&attempts).unwrap().clone()
    }

    #[tokio::test]
    async fn test_submit_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let context = CliContext::open(config(&dir)).await.unwrap();

        let output = handle_submit(&context, &submit_args()).await.unwrap();
        assert!(output.starts_with("Created dependency build builds/commons-lang-"));
        assert!(handle_submit(&context, &submit_args()).await.is_err());
    }

    #[tokio::test]
    async fn test_lifecycle_across_reopened_store() {
        let dir = TempDir::new().unwrap();
        {
            let context = CliContext::open(config(&dir)).await.unwrap();
            handle_submit(&context, &submit_args()).await.unwrap();
            let output = handle_reconcile(
                &context,
                &ReconcileArgs {
                    watch: false,
                    builders: None,
                },
            )
            .await
            .unwrap();
            assert!(output.starts_with("Reconciled 1 dependency builds"));
        }

        let context = CliContext::open(config(&dir)).await.unwrap();
        let attempt = latest_attempt(&context).await;
        assert_eq!(attempt.image(), Some("registry/jdk11:1"));

        let output = handle_complete(
            &context,
            &CompleteArgs {
                attempt: attempt.metadata.name.clone(),
                success: false,
                failure: true,
                contaminants: None,
            },
        )
        .await
        .unwrap();
        assert!(output.contains("is now Building"));
        assert_eq!(latest_attempt(&context).await.image(), Some("registry/jdk17:1"));

        let second = latest_attempt(&context).await;
        let output = handle_complete(
            &context,
            &CompleteArgs {
                attempt: second.metadata.name.clone(),
                success: true,
                failure: false,
                contaminants: Some("com.x:y:1.0,com.x:y:1.0,".to_string()),
            },
        )
        .await
        .unwrap();
        assert!(output.contains("is now Contaminated"));

        let requests: Vec<ArtifactBuildRequest> = context
            .store
            .list("builds", &LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].spec.gav, "com.x:y:1.0");

        let status = handle_status(
            &context,
            &StatusArgs {
                format: OutputFormatArg::Human,
                state: None,
            },
        )
        .await
        .unwrap();
        assert!(status.contains("[Contaminated]"));
        assert!(status.contains("Failed recipes: jdk11 (registry/jdk11:1)"));

        let again = handle_complete(
            &context,
            &CompleteArgs {
                attempt: second.metadata.name.clone(),
                success: true,
                failure: false,
                contaminants: None,
            },
        )
        .await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_rebuilt_then_check() {
        let dir = TempDir::new().unwrap();
        let context = CliContext::open(config(&dir)).await.unwrap();

        let output = handle_check(
            &context,
            &CheckArgs {
                gav: "com.google.guava:guava:31.1-jre".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(output, "No membership filter in namespace builds");

        handle_rebuilt(
            &context,
            &RebuiltArgs {
                gav: "com.google.guava:guava:31.1-jre".to_string(),
                image: Some("registry/guava:31.1".to_string()),
            },
        )
        .await
        .unwrap();

        let output = handle_check(
            &context,
            &CheckArgs {
                gav: "com.google.guava:guava:31.1-jre".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(output, "com.google.guava:guava:31.1-jre: possibly rebuilt");
    }

    #[tokio::test]
    async fn test_reconcile_with_builder_config_file() {
        let dir = TempDir::new().unwrap();
        let builders = dir.path().join("builders.yaml");
        std::fs::write(
            &builders,
            "builder-image.names: jdk21\nbuilder-image.jdk21.image: registry/jdk21:1\n",
        )
        .unwrap();

        let context = CliContext::open(config(&dir)).await.unwrap();
        handle_submit(&context, &submit_args()).await.unwrap();
        handle_reconcile(
            &context,
            &ReconcileArgs {
                watch: false,
                builders: Some(builders),
            },
        )
        .await
        .unwrap();

        let attempt = latest_attempt(&context).await;
        assert_eq!(attempt.image(), Some("registry/jdk21:1"));

        let builds: Vec<DependencyBuild> = context
            .store
            .list("builds", &LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(builds[0].status.state, DependencyBuildState::Building);
    }

    #[tokio::test]
    async fn test_status_filters_by_state() {
        let dir = TempDir::new().unwrap();
        let context = CliContext::open(config(&dir)).await.unwrap();
        handle_submit(&context, &submit_args()).await.unwrap();

        let status = |state: &str| StatusArgs {
            format: OutputFormatArg::Human,
            state: Some(state.to_string()),
        };

        let output = handle_status(&context, &status("new")).await.unwrap();
        assert!(output.contains("[New]"));

        let output = handle_status(&context, &status("DependencyBuildStateFailed"))
            .await
            .unwrap();
        assert_eq!(output, "No dependency builds found\n");

        assert!(handle_status(&context, &status("SubmitBuild")).await.is_err());
    }

    #[tokio::test]
    async fn test_config_output() {
        let dir = TempDir::new().unwrap();
        let context = CliContext::open(config(&dir)).await.unwrap();

        let output = handle_config(
            &context,
            &ConfigArgs {
                format: OutputFormatArg::Json,
            },
        )
        .unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["namespace"], "builds");
        assert_eq!(parsed["builder_images"], "jdk11,jdk17");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.reconcile_timeout_secs = 0;
        assert!(CliContext::open(config).await.is_err());
    }
}
