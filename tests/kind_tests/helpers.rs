//! Test helpers for integration tests
//!
//! Provides utilities for managing kind clusters and Kubernetes resources.

use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::config::KubeConfigOptions;
use kube::{Client, Config, CustomResourceExt};
use tokio::sync::OnceCell;
use tokio::time::sleep;

use paradox::crd::{Authorization, Bucket, Instance, Organization};

/// Name of the kind cluster used for integration tests
pub const TEST_CLUSTER_NAME: &str = "paradox-integration-test";

/// Field manager used by the tests when applying CRDs
const TEST_FIELD_MANAGER: &str = "paradox-integration-test";

/// Global lock to ensure cluster is created only once
static CLUSTER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Track if CRDs have been installed (async-safe)
static CRDS_INSTALLED: OnceCell<Result<(), String>> = OnceCell::const_new();

/// Create the kind cluster unless `kind get clusters` already lists it
fn ensure_kind_cluster(name: &str) -> Result<(), String> {
    let run = |args: &[&str]| {
        Command::new("kind")
            .args(args)
            .output()
            .map_err(|e| format!("failed to run kind: {e}"))
    };

    let listed = run(&["get", "clusters"])?;
    if String::from_utf8_lossy(&listed.stdout)
        .lines()
        .any(|line| line.trim() == name)
    {
        return Ok(());
    }

    let created = run(&["create", "cluster", "--name", name, "--wait", "60s"])?;
    if !created.status.success() {
        return Err(format!(
            "kind create cluster {name}: {}",
            String::from_utf8_lossy(&created.stderr)
        ));
    }
    Ok(())
}

/// Install every Paradox CRD with server-side apply
async fn install_crds(client: &Client) -> Result<(), kube::Error> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(TEST_FIELD_MANAGER).force();

    for crd in [
        Instance::crd(),
        Organization::crd(),
        Bucket::crd(),
        Authorization::crd(),
    ] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        crds.patch(&name, &params, &Patch::Apply(&crd)).await?;
    }

    // Established condition lags the apply
    sleep(Duration::from_secs(2)).await;
    Ok(())
}

/// Create the namespace if it does not exist yet
pub async fn ensure_namespace(client: &Client, name: &str) -> Result<(), kube::Error> {
    let api: Api<Namespace> = Api::all(client.clone());
    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    match api.create(&PostParams::default(), &namespace).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
        Err(e) => Err(e),
    }
}

/// Client bound to the kind context, leaving the current context untouched
async fn kind_client() -> Result<Client, String> {
    let options = KubeConfigOptions {
        context: Some(format!("kind-{TEST_CLUSTER_NAME}")),
        ..Default::default()
    };
    let config = Config::from_kubeconfig(&options)
        .await
        .map_err(|e| format!("kubeconfig for kind-{TEST_CLUSTER_NAME}: {e}"))?;
    Client::try_from(config).map_err(|e| format!("client for kind-{TEST_CLUSTER_NAME}: {e}"))
}

/// Ensure the test cluster is ready (thread-safe, cluster created once)
///
/// Returns a fresh Client for each call - clients should not be shared across test threads.
pub async fn ensure_test_cluster() -> Result<Client, String> {
    CLUSTER_INIT
        .get_or_init(|| ensure_kind_cluster(TEST_CLUSTER_NAME))
        .clone()?;

    let client = kind_client().await?;
    CRDS_INSTALLED
        .get_or_init(|| async {
            install_crds(&kind_client().await?)
                .await
                .map_err(|e| format!("failed to install CRDs: {e}"))
        })
        .await
        .clone()?;

    Ok(client)
}
