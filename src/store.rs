//! Object store and secret materialization
//!
//! The orchestrator and resolver only reach Kubernetes through
//! [`ResourceStore`] and [`SecretSink`], so tests can substitute mocks.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::{
    Authorization, AuthorizationStatus, Bucket, BucketStatus, HasInstances, Instance, Instances,
    Organization, OrganizationStatus,
};
use crate::{Error, Result, LABEL_MANAGED_BY, LABEL_MANAGED_BY_PARADOX};

/// Read access to declared resources and write access to their status
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an Instance by namespace and name
    async fn get_instance(&self, namespace: &str, name: &str) -> Result<Instance>;

    /// Fetch an Organization by namespace and name
    async fn get_organization(&self, namespace: &str, name: &str) -> Result<Organization>;

    /// Fetch a Bucket by namespace and name
    async fn get_bucket(&self, namespace: &str, name: &str) -> Result<Bucket>;

    /// Replace an Organization's status
    async fn update_organization_status(
        &self,
        org: &Organization,
        status: &OrganizationStatus,
    ) -> Result<()>;

    /// Replace a Bucket's status
    async fn update_bucket_status(&self, bucket: &Bucket, status: &BucketStatus) -> Result<()>;

    /// Replace an Authorization's status
    async fn update_authorization_status(
        &self,
        auth: &Authorization,
        status: &AuthorizationStatus,
    ) -> Result<()>;
}

/// Destination for one-time tokens returned by an instance
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretSink: Send + Sync {
    /// Store `value` under `key` in the named secret
    async fn put(&self, namespace: &str, name: &str, key: &str, value: &str) -> Result<()>;
}

/// [`ResourceStore`] backed by the Kubernetes API
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    /// Create a store using the given client and field manager
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    async fn get<K>(&self, kind: &'static str, namespace: &str, name: &str) -> Result<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(obj) => Ok(obj),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                Err(Error::not_found(kind, namespace, name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_instances<K>(&self, obj: &K, next: &Instances) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + HasInstances
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let namespace = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);

        let patch = status_patch(
            obj.instances(),
            next,
            obj.meta().resource_version.as_deref(),
        );
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };

        api.patch_status(&name, &params, &Patch::Merge(&patch))
            .await?;
        debug!(namespace = %namespace, name = %name, instances = next.len(), "status updated");
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_instance(&self, namespace: &str, name: &str) -> Result<Instance> {
        self.get("Instance", namespace, name).await
    }

    async fn get_organization(&self, namespace: &str, name: &str) -> Result<Organization> {
        self.get("Organization", namespace, name).await
    }

    async fn get_bucket(&self, namespace: &str, name: &str) -> Result<Bucket> {
        self.get("Bucket", namespace, name).await
    }

    async fn update_organization_status(
        &self,
        org: &Organization,
        status: &OrganizationStatus,
    ) -> Result<()> {
        self.patch_instances(org, &status.instances).await
    }

    async fn update_bucket_status(&self, bucket: &Bucket, status: &BucketStatus) -> Result<()> {
        self.patch_instances(bucket, &status.instances).await
    }

    async fn update_authorization_status(
        &self,
        auth: &Authorization,
        status: &AuthorizationStatus,
    ) -> Result<()> {
        self.patch_instances(auth, &status.instances).await
    }
}

/// Build a merge patch that replaces `prior` with `next`
///
/// Entries missing from `next` are written as `null`, which deletes them
/// under merge-patch semantics; a namespace left without entries is deleted
/// as a whole. When a resource version is given the API server rejects the
/// patch with a conflict if the object changed since it was read.
pub(crate) fn status_patch(
    prior: Option<&Instances>,
    next: &Instances,
    resource_version: Option<&str>,
) -> Value {
    let mut namespaces: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

    for (key, _) in prior.into_iter().flat_map(|p| p.entries()) {
        namespaces
            .entry(key.namespace)
            .or_default()
            .insert(key.name, Value::Null);
    }
    for (key, id) in next.iter() {
        namespaces
            .entry(key.namespace)
            .or_default()
            .insert(key.name, json!({ "id": id }));
    }

    let instances: Map<String, Value> = namespaces
        .into_iter()
        .map(|(namespace, names)| {
            if names.values().all(Value::is_null) {
                (namespace, Value::Null)
            } else {
                (namespace, Value::Object(names))
            }
        })
        .collect();

    let mut patch = json!({ "status": { "instances": instances } });
    if let Some(rv) = resource_version {
        patch["metadata"] = json!({ "resourceVersion": rv });
    }
    patch
}

/// [`SecretSink`] writing Kubernetes Secrets via server-side apply
pub struct KubeSecretSink {
    client: Client,
    field_manager: String,
}

impl KubeSecretSink {
    /// Create a sink using the given client and field manager
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

/// The Secret applied for one materialized token
fn token_secret(namespace: &str, name: &str, key: &str, value: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                LABEL_MANAGED_BY.to_string(),
                LABEL_MANAGED_BY_PARADOX.to_string(),
            )])),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
        ..Default::default()
    }
}

#[async_trait]
impl SecretSink for KubeSecretSink {
    async fn put(&self, namespace: &str, name: &str, key: &str, value: &str) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = token_secret(namespace, name, key, value);
        let params = PatchParams::apply(&self.field_manager).force();

        api.patch(name, &params, &Patch::Apply(&secret))
            .await
            .map_err(|e| Error::SecretMaterialization {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: e.to_string(),
            })?;

        debug!(namespace = %namespace, name = %name, key = %key, "token secret applied");
        Ok(())
    }
}
