use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Rebuild JVM dependencies from source and track every build attempt
#[derive(Parser, Debug)]
#[command(
    name = "jvm-rebuild",
    about = "Rebuild JVM dependencies from source and track every build attempt",
    version,
    author,
    long_about = "jvm-rebuild drives dependency builds through recipe selection, build \
                  attempts, retries and contamination tracking, and maintains a membership \
                  filter of rebuilt artifacts. State lives in a file-backed record store."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Record store file (defaults to JVM_REBUILD_STORE or the user data dir)"
    )]
    pub store: Option<PathBuf>,

    #[arg(long, global = true, value_name = "NAMESPACE", help = "Namespace to operate on")]
    pub namespace: Option<String>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Create a dependency build for a source checkout",
        long_about = "Creates a DependencyBuild record for the given source coordinates. \
                      The record is picked up by the next reconcile pass.\n\n\
                      Examples:\n  \
                      jvm-rebuild submit --url https://github.com/apache/commons-lang --tag rel/commons-lang-3.12.0\n  \
                      jvm-rebuild submit --url https://github.com/google/guava --tag v31.1 --path guava"
    )]
    Submit(SubmitArgs),

    #[command(
        about = "Run a controller pass over all dependency builds",
        long_about = "Evaluates every dependency build until it stops making progress and \
                      refreshes the rebuilt artifact filter.\n\n\
                      Examples:\n  \
                      jvm-rebuild reconcile\n  \
                      jvm-rebuild reconcile --watch\n  \
                      jvm-rebuild reconcile --builders builders.yaml"
    )]
    Reconcile(ReconcileArgs),

    #[command(about = "Show dependency builds and their state")]
    Status(StatusArgs),

    #[command(
        about = "Record the outcome of a build attempt",
        long_about = "Marks a build attempt as finished, standing in for the pipeline engine, \
                      and re-evaluates the dependency builds it belongs to.\n\n\
                      Examples:\n  \
                      jvm-rebuild complete commons-lang-1a2b3c4d-build-x7k2q --success\n  \
                      jvm-rebuild complete commons-lang-1a2b3c4d-build-x7k2q --success --contaminants com.x:y:1.0\n  \
                      jvm-rebuild complete commons-lang-1a2b3c4d-build-x7k2q --failure"
    )]
    Complete(CompleteArgs),

    #[command(about = "Test a coordinate against the rebuilt artifact filter")]
    Check(CheckArgs),

    #[command(about = "Register a rebuilt artifact")]
    Rebuilt(RebuiltArgs),

    #[command(about = "Show the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct SubmitArgs {
    #[arg(long, value_name = "URL", help = "Source repository URL")]
    pub url: String,

    #[arg(long, value_name = "TAG", help = "Revision to build")]
    pub tag: String,

    #[arg(long, value_name = "PATH", default_value = "", help = "Subdirectory holding the build")]
    pub path: String,

    #[arg(long, value_name = "NAME", help = "Record name (derived from the URL by default)")]
    pub name: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ReconcileArgs {
    #[arg(short = 'w', long, help = "Keep reconciling on the poll interval until Ctrl-C")]
    pub watch: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "YAML or JSON system config map with builder-image.* keys"
    )]
    pub builders: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        long,
        value_name = "STATE",
        help = "Only show builds in this state (e.g. building, DependencyBuildStateFailed)"
    )]
    pub state: Option<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("outcome").required(true).args(["success", "failure"])))]
pub struct CompleteArgs {
    #[arg(value_name = "ATTEMPT", help = "Build attempt name")]
    pub attempt: String,

    #[arg(long, help = "The attempt succeeded")]
    pub success: bool,

    #[arg(long, help = "The attempt failed")]
    pub failure: bool,

    #[arg(
        long,
        value_name = "GAVS",
        help = "Comma-separated coordinates embedded in the build output"
    )]
    pub contaminants: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    #[arg(value_name = "GAV", help = "Artifact coordinate, e.g. com.google.guava:guava:31.1-jre")]
    pub gav: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RebuiltArgs {
    #[arg(value_name = "GAV", help = "Artifact coordinate that was rebuilt")]
    pub gav: String,

    #[arg(long, value_name = "IMAGE", help = "Image holding the rebuilt artifact")]
    pub image: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
