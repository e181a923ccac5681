//! Reconciliation controllers for Paradox CRDs
//!
//! Each kind follows the same shape: resolve the organization's instances,
//! synchronize against them one at a time, then replace the status with the
//! identifiers gathered. The first failing instance aborts the attempt and
//! leaves the last persisted status in place.

mod authorization;
mod bucket;
mod organization;
mod watches;

use std::sync::Arc;

use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::crd::{HasInstances, InfluxId, InstanceKey, Instances, Organization};
use crate::influx::{ClientFactory, HttpClientFactory, InfluxClient, InfluxError};
use crate::resolver::{resolve_instances, InstanceBinding};
use crate::store::{KubeSecretSink, KubeStore, ResourceStore, SecretSink};
use crate::template::NameRenderer;
use crate::{Error, Result};

pub use authorization::{
    error_policy as authorization_error_policy, reconcile as reconcile_authorization,
};
pub use bucket::{error_policy as bucket_error_policy, reconcile as reconcile_bucket};
pub use organization::{
    error_policy as organization_error_policy, reconcile as reconcile_organization,
};
pub use watches::{
    authorizations_for_bucket, authorizations_for_organization, buckets_for_organization,
};

/// Shared state handed to every reconcile call
pub struct Context {
    /// Declared resources and their status
    pub store: Arc<dyn ResourceStore>,
    /// Builds a client per resolved instance
    pub clients: Arc<dyn ClientFactory>,
    /// Destination for created authorization tokens
    pub secrets: Arc<dyn SecretSink>,
    /// Renders token secret names
    pub renderer: NameRenderer,
    /// Runtime settings
    pub config: ControllerConfig,
    /// Cancelled at shutdown; checked before each instance step
    pub cancel: CancellationToken,
}

impl Context {
    /// Create a context backed by the Kubernetes API and InfluxDB over HTTP
    pub fn new(client: Client, config: ControllerConfig) -> std::result::Result<Self, InfluxError> {
        let clients = HttpClientFactory::new(config.request_timeout)?;
        Ok(Self {
            store: Arc::new(KubeStore::new(client.clone(), &config.field_manager)),
            clients: Arc::new(clients),
            secrets: Arc::new(KubeSecretSink::new(client, &config.field_manager)),
            renderer: NameRenderer::new(),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Create a context for testing with mock collaborators
    #[cfg(test)]
    pub fn for_testing(
        store: Arc<dyn ResourceStore>,
        clients: Arc<dyn ClientFactory>,
        secrets: Arc<dyn SecretSink>,
    ) -> Self {
        Self {
            store,
            clients,
            secrets,
            renderer: NameRenderer::new(),
            config: ControllerConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Fail with [`Error::Cancelled`] once shutdown has begun
    fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Client for one resolved instance
    fn connect(&self, binding: &InstanceBinding) -> Result<Arc<dyn InfluxClient>> {
        self.clients
            .connect(binding)
            .map_err(|e| Error::remote(&binding.key.namespace, &binding.key.name, e))
    }

    /// Fetch the referenced organization and resolve the instances it targets
    async fn organization_targets(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(Organization, Vec<InstanceBinding>)> {
        let org = self.store.get_organization(namespace, name).await?;
        let bindings = resolve_instances(self.store.as_ref(), &org).await?;
        Ok((org, bindings))
    }
}

/// The identifier an instance assigned to the organization
///
/// Children cannot be synchronized until the organization has been.
fn organization_id(org: &Organization, instance: &InstanceKey) -> Result<InfluxId> {
    org.id_for(instance)
        .cloned()
        .ok_or_else(|| Error::MissingDependency {
            kind: "Organization",
            dependency: org.name_any(),
            namespace: instance.namespace.clone(),
            name: instance.name.clone(),
        })
}

/// Whether `next` differs from what is already persisted
fn status_changed(prior: Option<&Instances>, next: &Instances) -> bool {
    prior != Some(next)
}
