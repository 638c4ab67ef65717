//! kubedispatch CLI - Kubernetes operations through kubectl or the API
//!
//! Creates, inspects and removes pods, deployments and namespaces. Each
//! operation goes to the configured primary backend and falls back to the
//! other one when the primary is unavailable. Helm releases and chart
//! repositories are managed through the `helm` binary.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kubedispatch_core::{
    ClusterService, ConfigStore, ExecutionMode, HelmService, PortMapping, Settings,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kubedispatch")]
#[command(author, version, about = "Kubernetes operations with kubectl/SDK fallback")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Namespace for namespaced resources (default from config)
    #[arg(short = 'n', long, global = true)]
    namespace: Option<String>,

    #[command(flatten)]
    overrides: Overrides,
}

/// Settings that can be overridden for one invocation.
#[derive(Args)]
struct Overrides {
    /// Backend to try first: cli or sdk
    #[arg(long, global = true)]
    primary: Option<ExecutionMode>,

    /// Do not fall back to the other backend
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Path to the kubectl binary
    #[arg(long, global = true)]
    kubectl: Option<PathBuf>,

    /// Path to the helm binary
    #[arg(long, global = true)]
    helm: Option<PathBuf>,

    /// Timeout for each backend call, in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Cluster(ClusterCommand),

    /// Manage helm releases and chart repositories
    Helm {
        #[command(subcommand)]
        action: HelmAction,
    },

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ClusterCommand {
    /// Manage pods
    #[command(alias = "po")]
    Pod {
        #[command(subcommand)]
        action: PodAction,
    },

    /// Manage deployments
    #[command(alias = "deploy")]
    Deployment {
        #[command(subcommand)]
        action: DeploymentAction,
    },

    /// Manage namespaces
    #[command(alias = "ns")]
    Namespace {
        #[command(subcommand)]
        action: NamespaceAction,
    },

    /// Check that the cluster answers
    Ping,

    /// Run a read-only query written in plain words
    Query {
        /// e.g. "list pods in namespace prod"
        text: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective settings (the default)
    Show,
    /// Change one stored setting, e.g. `config set primary cli`
    Set { key: String, value: String },
    /// Write a settings file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Container settings shared by pod and deployment creation.
#[derive(Args)]
struct ContainerArgs {
    /// Container image
    #[arg(long)]
    image: Option<String>,

    /// Label as KEY=VALUE (repeatable)
    #[arg(short, long = "label", value_parser = commands::parse_key_val)]
    labels: Vec<(String, String)>,

    /// Environment variable as KEY=VALUE (repeatable)
    #[arg(short, long = "env", value_parser = commands::parse_key_val)]
    env: Vec<(String, String)>,

    /// Container port
    #[arg(long)]
    port: Option<u16>,

    /// Resource request as NAME=QUANTITY, e.g. cpu=100m (repeatable)
    #[arg(long = "request", value_parser = commands::parse_key_val)]
    requests: Vec<(String, String)>,

    /// Resource limit as NAME=QUANTITY, e.g. memory=128Mi (repeatable)
    #[arg(long = "limit", value_parser = commands::parse_key_val)]
    limits: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum PodAction {
    /// Create a pod
    Create {
        name: String,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Show a pod
    Get { name: String },
    /// Merge labels into a pod
    Label {
        name: String,
        /// Label as KEY=VALUE (repeatable)
        #[arg(short, long = "label", value_parser = commands::parse_key_val, required = true)]
        labels: Vec<(String, String)>,
    },
    /// Delete a pod
    #[command(alias = "rm")]
    Delete {
        name: String,
        /// Seconds to wait before killing; 0 forces immediate deletion
        #[arg(long)]
        grace_period: Option<u32>,
    },
    /// List pods
    #[command(alias = "ls")]
    List {
        /// Label selector, e.g. app=web
        #[arg(short = 'l', long)]
        selector: Option<String>,
    },
    /// Forward a local port to a pod until interrupted
    #[command(alias = "pf")]
    Forward {
        name: String,
        /// LOCAL:REMOTE
        ports: PortMapping,
    },
}

#[derive(Subcommand)]
enum DeploymentAction {
    /// Create a deployment
    Create {
        name: String,
        /// Number of replicas
        #[arg(long, allow_negative_numbers = true)]
        replicas: Option<i64>,
        #[command(flatten)]
        container: ContainerArgs,
    },
    /// Show a deployment
    Get { name: String },
    /// Change replicas, image or labels
    Update {
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        replicas: Option<i64>,
        #[arg(long)]
        image: Option<String>,
        /// Label as KEY=VALUE (repeatable)
        #[arg(short, long = "label", value_parser = commands::parse_key_val)]
        labels: Vec<(String, String)>,
    },
    /// Delete a deployment
    #[command(alias = "rm")]
    Delete { name: String },
    /// List deployments
    #[command(alias = "ls")]
    List {
        /// Label selector, e.g. app=api
        #[arg(short = 'l', long)]
        selector: Option<String>,
    },
    /// Set the replica count
    Scale {
        name: String,
        #[arg(allow_negative_numbers = true)]
        replicas: i64,
    },
}

#[derive(Subcommand)]
enum NamespaceAction {
    /// Create a namespace
    Create {
        name: String,
        /// Label as KEY=VALUE (repeatable)
        #[arg(short, long = "label", value_parser = commands::parse_key_val)]
        labels: Vec<(String, String)>,
    },
    /// Show a namespace
    Get { name: String },
    /// Delete a namespace and everything in it
    #[command(alias = "rm")]
    Delete { name: String },
    /// List namespaces
    #[command(alias = "ls")]
    List {
        /// Label selector
        #[arg(short = 'l', long)]
        selector: Option<String>,
    },
}

/// Chart reference and values for install and upgrade.
#[derive(Args)]
struct ChartOpts {
    /// Chart reference: repo/chart, a path, or an oci:// URL
    chart: String,

    /// Chart version constraint
    #[arg(long)]
    version: Option<String>,

    /// Values as a JSON object
    #[arg(long = "values-json")]
    values_json: Option<String>,

    /// Value as PATH=VALUE, e.g. image.tag=1.25 (repeatable)
    #[arg(long = "set", value_parser = commands::parse_key_val)]
    set: Vec<(String, String)>,
}

#[derive(Subcommand)]
enum HelmAction {
    /// List releases
    #[command(alias = "ls")]
    List {
        /// Releases in every namespace
        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },
    /// Install a chart as a new release
    Install {
        name: String,
        #[command(flatten)]
        chart: ChartOpts,
    },
    /// Upgrade a release
    Upgrade {
        name: String,
        #[command(flatten)]
        chart: ChartOpts,
        /// Install the release if it does not exist
        #[arg(short, long)]
        install: bool,
    },
    /// Remove a release
    #[command(alias = "rm")]
    Uninstall {
        name: String,
        /// Keep the release history
        #[arg(long)]
        keep_history: bool,
    },
    /// Show the values of a release
    Values {
        name: String,
        /// Include computed chart defaults
        #[arg(short, long)]
        all: bool,
    },
    /// Roll a release back to a revision (the previous one by default)
    Rollback { name: String, revision: Option<u32> },
    /// Search the configured repositories for charts
    Search {
        keyword: Option<String>,
        /// Treat the keyword as a regular expression
        #[arg(short, long)]
        regexp: bool,
    },
    /// Manage chart repositories
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },
}

#[derive(Subcommand)]
enum RepoAction {
    /// Add a chart repository
    Add { name: String, url: String },
    /// List chart repositories
    #[command(alias = "ls")]
    List,
    /// Refresh the chart index of every repository
    Update,
    /// Remove a chart repository
    #[command(alias = "rm")]
    Remove { name: String },
}

impl Overrides {
    /// Loads stored settings and applies the command-line overrides.
    async fn settings(&self, store: &ConfigStore) -> anyhow::Result<Settings> {
        let mut settings = store.load().await?;
        if let Some(primary) = self.primary {
            settings.primary = primary;
        }
        if self.no_fallback {
            settings.fallback_enabled = false;
        }
        if let Some(kubectl) = &self.kubectl {
            settings.kubectl_path = Some(kubectl.clone());
        }
        if let Some(helm) = &self.helm {
            settings.helm_path = Some(helm.clone());
        }
        if let Some(timeout) = self.timeout {
            settings.command_timeout_secs = timeout;
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        command,
        json,
        namespace,
        overrides,
    } = Cli::parse();
    let namespace = namespace.as_deref();
    let store = ConfigStore::new()?;

    match command {
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => {
                let settings = overrides.settings(&store).await?;
                commands::config::show(&store, &settings, json)?
            }
            ConfigAction::Set { key, value } => {
                let settings = commands::config::set(&store, &key, &value).await?;
                commands::config::show(&store, &settings, json)?
            }
            ConfigAction::Init { force } => {
                commands::config::init(&store, force).await?;
                commands::config::show(&store, &Settings::default(), json)?
            }
        },
        Commands::Helm { action } => {
            let settings = overrides.settings(&store).await?;
            let service = HelmService::from_settings(&settings);
            run_helm(&service, action, namespace, json).await?
        }
        Commands::Cluster(command) => {
            let settings = overrides.settings(&store).await?;
            let service = ClusterService::from_settings(&settings).await;
            run_cluster(&service, command, namespace, json).await?
        }
    }

    Ok(())
}

async fn run_cluster(
    service: &ClusterService<kubedispatch_core::AnyBackend>,
    command: ClusterCommand,
    namespace: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        ClusterCommand::Pod { action } => match action {
            PodAction::Create { name, container } => {
                commands::pod::create(service, &name, namespace, container.into_attributes(None), json).await
            }
            PodAction::Get { name } => commands::pod::get(service, &name, namespace, json).await,
            PodAction::Label { name, labels } => {
                commands::pod::label(service, &name, namespace, labels, json).await
            }
            PodAction::Delete { name, grace_period } => {
                commands::pod::delete(service, &name, namespace, grace_period, json).await
            }
            PodAction::List { selector } => {
                commands::pod::list(service, namespace, selector.as_deref(), json).await
            }
            PodAction::Forward { name, ports } => {
                commands::pod::forward(service, &name, namespace, ports, json).await
            }
        },
        ClusterCommand::Deployment { action } => match action {
            DeploymentAction::Create {
                name,
                replicas,
                container,
            } => {
                commands::deployment::create(service, &name, namespace, container.into_attributes(replicas), json)
                    .await
            }
            DeploymentAction::Get { name } => {
                commands::deployment::get(service, &name, namespace, json).await
            }
            DeploymentAction::Update {
                name,
                replicas,
                image,
                labels,
            } => {
                commands::deployment::update(service, &name, namespace, replicas, image, labels, json)
                    .await
            }
            DeploymentAction::Delete { name } => {
                commands::deployment::delete(service, &name, namespace, json).await
            }
            DeploymentAction::List { selector } => {
                commands::deployment::list(service, namespace, selector.as_deref(), json).await
            }
            DeploymentAction::Scale { name, replicas } => {
                commands::deployment::scale(service, &name, namespace, replicas, json).await
            }
        },
        ClusterCommand::Namespace { action } => match action {
            NamespaceAction::Create { name, labels } => {
                commands::namespace::create(service, &name, labels, json).await
            }
            NamespaceAction::Get { name } => commands::namespace::get(service, &name, json).await,
            NamespaceAction::Delete { name } => {
                commands::namespace::delete(service, &name, json).await
            }
            NamespaceAction::List { selector } => {
                commands::namespace::list(service, selector.as_deref(), json).await
            }
        },
        ClusterCommand::Ping => commands::cluster::ping(service, json).await,
        ClusterCommand::Query { text } => {
            commands::cluster::query(service, &text.join(" "), namespace, json).await
        }
    }
}

async fn run_helm(
    service: &HelmService,
    action: HelmAction,
    namespace: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    match action {
        HelmAction::List { all_namespaces } => {
            commands::helm::list(service, namespace, all_namespaces, json).await
        }
        HelmAction::Install { name, chart } => {
            commands::helm::install(service, &name, namespace, chart.into_chart_args(), json).await
        }
        HelmAction::Upgrade {
            name,
            chart,
            install,
        } => {
            commands::helm::upgrade(service, &name, namespace, chart.into_chart_args(), install, json)
                .await
        }
        HelmAction::Uninstall { name, keep_history } => {
            commands::helm::uninstall(service, &name, namespace, keep_history, json).await
        }
        HelmAction::Values { name, all } => {
            commands::helm::values(service, &name, namespace, all, json).await
        }
        HelmAction::Rollback { name, revision } => {
            commands::helm::rollback(service, &name, revision, namespace, json).await
        }
        HelmAction::Search { keyword, regexp } => {
            commands::helm::search(service, keyword.as_deref(), regexp, json).await
        }
        HelmAction::Repo { action } => match action {
            RepoAction::Add { name, url } => commands::helm::repo_add(service, &name, &url, json).await,
            RepoAction::List => commands::helm::repo_list(service, json).await,
            RepoAction::Update => commands::helm::repo_update(service, json).await,
            RepoAction::Remove { name } => commands::helm::repo_remove(service, &name, json).await,
        },
    }
}

impl ChartOpts {
    fn into_chart_args(self) -> commands::helm::ChartArgs {
        commands::helm::ChartArgs {
            chart: self.chart,
            version: self.version,
            values_json: self.values_json,
            set: self.set,
        }
    }
}

impl ContainerArgs {
    fn into_attributes(self, replicas: Option<i64>) -> kubedispatch_core::Attributes {
        let resources = kubedispatch_core::domain::ResourceLimits {
            requests: self.requests.into_iter().collect(),
            limits: self.limits.into_iter().collect(),
        };

        kubedispatch_core::Attributes {
            image: self.image,
            replicas,
            labels: self.labels.into_iter().collect(),
            env: self.env.into_iter().collect(),
            container_port: self.port,
            resources: (!resources.is_empty()).then_some(resources),
            ..Default::default()
        }
    }
}
