//! Paradox - Kubernetes operator for InfluxDB organizations, buckets and tokens

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt, Resource};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use paradox::config::{ControllerConfig, LogFormat};
use paradox::controller::{
    authorization_error_policy, authorizations_for_bucket, authorizations_for_organization,
    bucket_error_policy, buckets_for_organization, organization_error_policy,
    reconcile_authorization, reconcile_bucket, reconcile_organization, Context,
};
use paradox::crd::{Authorization, Bucket, Instance, Organization};

/// Paradox - reconciles InfluxDB resources across many instances
#[derive(Parser, Debug)]
#[command(name = "paradox", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Log output format (text or json)
    #[arg(long, env = "PARADOX_LOG_FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches Organizations, Buckets and Authorizations and reconciles
    /// them against every InfluxDB instance their Organization targets.
    Controller(ControllerArgs),
}

/// Controller mode arguments
#[derive(Args, Debug)]
struct ControllerArgs {
    /// Only watch resources in this namespace (default: all namespaces)
    #[arg(long, env = "PARADOX_NAMESPACE")]
    namespace: Option<String>,

    /// Seconds between reconciles of a healthy resource
    #[arg(long, env = "PARADOX_REQUEUE_SUCCESS_SECS", default_value = "300")]
    requeue_success_secs: u64,

    /// Seconds before retrying a failed reconcile
    #[arg(long, env = "PARADOX_REQUEUE_ERROR_SECS", default_value = "30")]
    requeue_error_secs: u64,

    /// Timeout for each request against an InfluxDB instance, in seconds
    #[arg(long, env = "PARADOX_REQUEST_TIMEOUT_SECS", default_value = "10")]
    request_timeout_secs: u64,

    /// Field manager for status patches and token Secrets
    #[arg(long, env = "PARADOX_FIELD_MANAGER", default_value = paradox::DEFAULT_FIELD_MANAGER)]
    field_manager: String,
}

impl ControllerArgs {
    fn into_config(self, log_format: LogFormat) -> ControllerConfig {
        ControllerConfig {
            namespace: self.namespace,
            requeue_success: Duration::from_secs(self.requeue_success_secs),
            requeue_error: Duration::from_secs(self.requeue_error_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            field_manager: self.field_manager,
            log_format,
        }
    }
}

/// Runtime settings for the selected mode; no subcommand means controller defaults
fn controller_config(command: Option<Commands>, log_format: LogFormat) -> ControllerConfig {
    match command {
        Some(Commands::Controller(args)) => args.into_config(log_format),
        None => ControllerConfig {
            log_format,
            ..ControllerConfig::default()
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = controller_config(cli.command, cli.log_format);

    init_tracing(config.log_format);

    if cli.crd {
        print!("{}", paradox::crd::crds_yaml()?);
        return Ok(());
    }

    run_controller(config).await
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,paradox=debug,kube=info"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }
}

/// Install or update the Paradox CRDs
///
/// This ensures the CRD versions always match the operator version.
async fn ensure_crds_installed(client: &Client, field_manager: &str) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(field_manager).force();

    for crd in [
        Instance::crd(),
        Organization::crd(),
        Bucket::crd(),
        Authorization::crd(),
    ] {
        let name = crd.meta().name.clone().unwrap_or_default();
        tracing::info!(crd = %name, "Installing CRD");
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("All Paradox CRDs installed/updated");
    Ok(())
}

fn api_for<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run_controller(config: ControllerConfig) -> anyhow::Result<()> {
    tracing::info!("Paradox controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client, &config.field_manager).await?;

    let namespace = config.namespace.clone();
    let ns = namespace.as_deref();
    let ctx = Arc::new(
        Context::new(client.clone(), config)
            .map_err(|e| anyhow::anyhow!("Failed to create controller context: {}", e))?,
    );

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    let organizations: Api<Organization> = api_for(&client, ns);
    let buckets: Api<Bucket> = api_for(&client, ns);
    let authorizations: Api<Authorization> = api_for(&client, ns);

    tracing::info!(namespace = ns.unwrap_or("<all>"), "Starting Paradox controllers...");

    let organization_controller = Controller::new(organizations.clone(), WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile_organization, organization_error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(organization = %obj.name, ?action, "Organization reconciliation completed");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Organization reconciliation error");
                }
            }
        });

    let bucket_controller = Controller::new(buckets.clone(), WatcherConfig::default());
    let bucket_store = bucket_controller.store();
    let bucket_controller = bucket_controller
        .watches(organizations.clone(), WatcherConfig::default(), move |org| {
            buckets_for_organization(&bucket_store, &org)
        })
        .shutdown_on_signal()
        .run(reconcile_bucket, bucket_error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(bucket = %obj.name, ?action, "Bucket reconciliation completed");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Bucket reconciliation error");
                }
            }
        });

    let authorization_controller = Controller::new(authorizations, WatcherConfig::default());
    let by_organization = authorization_controller.store();
    let by_bucket = authorization_controller.store();
    let authorization_controller = authorization_controller
        .watches(organizations, WatcherConfig::default(), move |org| {
            authorizations_for_organization(&by_organization, &org)
        })
        .watches(buckets, WatcherConfig::default(), move |bucket| {
            authorizations_for_bucket(&by_bucket, &bucket)
        })
        .shutdown_on_signal()
        .run(
            reconcile_authorization,
            authorization_error_policy,
            ctx.clone(),
        )
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(authorization = %obj.name, ?action, "Authorization reconciliation completed");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Authorization reconciliation error");
                }
            }
        });

    // Run all controllers concurrently
    tokio::select! {
        _ = organization_controller => {
            tracing::info!("Organization controller completed");
        }
        _ = bucket_controller => {
            tracing::info!("Bucket controller completed");
        }
        _ = authorization_controller => {
            tracing::info!("Authorization controller completed");
        }
    }

    ctx.cancel.cancel();
    tracing::info!("Paradox controller shutting down");
    Ok(())
}
