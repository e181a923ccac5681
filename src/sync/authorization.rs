//! Authorization synchronizer
//!
//! Authorizations have no natural key on the instance, so the identifier
//! recorded in the resource's own status is the only idempotence signal:
//! once recorded, no remote call is made for that instance again.

use kube::ResourceExt;
use tracing::{debug, error, info};

use crate::crd::{
    Authorization, HasInstances, InfluxId, InstanceKey, Permission, ResourceType, SecretSpec,
};
use crate::influx::{AuthorizationCreate, InfluxClient, RemotePermission, RemoteResource};
use crate::store::{ResourceStore, SecretSink};
use crate::template::NameRenderer;
use crate::Error;

/// Failure of one authorization sync
///
/// `created` carries the identifier when the authorization was created on
/// the instance before a later step failed, so it can still be recorded.
#[derive(Debug)]
pub struct SyncFailure {
    /// Identifier of an authorization created before the failure
    pub created: Option<InfluxId>,
    /// What went wrong
    pub error: Error,
}

impl From<Error> for SyncFailure {
    fn from(error: Error) -> Self {
        Self {
            created: None,
            error,
        }
    }
}

/// Collaborators needed to create an authorization and store its token
pub struct AuthorizationSync<'a> {
    /// Source of the referenced Buckets' recorded identifiers
    pub store: &'a dyn ResourceStore,
    /// Destination for the one-time token
    pub sink: &'a dyn SecretSink,
    /// Renders the token secret name per instance
    pub renderer: &'a NameRenderer,
}

impl AuthorizationSync<'_> {
    /// Ensure the authorization exists on one instance
    pub async fn sync(
        &self,
        client: &dyn InfluxClient,
        instance: &InstanceKey,
        auth: &Authorization,
        org_id: &InfluxId,
    ) -> Result<InfluxId, SyncFailure> {
        if let Some(id) = auth.id_for(instance) {
            debug!(authorization = %auth.name_any(), instance = %instance, id = %id, "authorization already provisioned");
            return Ok(id.clone());
        }

        let permissions = self.resolve_permissions(instance, auth, org_id).await?;

        let request = AuthorizationCreate {
            org_id: org_id.to_string(),
            description: auth.spec.description.clone(),
            permissions,
        };
        let created = client
            .create_authorization(&request)
            .await
            .map_err(|e| Error::remote(&instance.namespace, &instance.name, e))?;

        let id = InfluxId::from(created.id.clone());
        info!(authorization = %auth.name_any(), instance = %instance, id = %id, "authorization created");

        if let Some(secret) = &auth.spec.token.secret_spec {
            if let Err(e) = self
                .materialize(instance, secret, created.token.as_deref())
                .await
            {
                error!(
                    authorization = %auth.name_any(),
                    instance = %instance,
                    id = %id,
                    error = %e,
                    "token could not be stored and cannot be read again"
                );
                return Err(SyncFailure {
                    created: Some(id),
                    error: e,
                });
            }
        }

        Ok(id)
    }

    /// Resolve every permission or none
    ///
    /// Resource types are checked before any bucket is looked up, so an
    /// unsupported type is reported even when a bucket is also missing.
    async fn resolve_permissions(
        &self,
        instance: &InstanceKey,
        auth: &Authorization,
        org_id: &InfluxId,
    ) -> Result<Vec<RemotePermission>, Error> {
        for permission in &auth.spec.permissions {
            match &permission.resource.type_ {
                ResourceType::Buckets => {}
                ResourceType::Unsupported(other) => {
                    return Err(Error::UnsupportedResourceType(other.clone()))
                }
            }
        }

        let namespace = auth.namespace().unwrap_or_default();
        let mut resolved = Vec::with_capacity(auth.spec.permissions.len());
        for permission in &auth.spec.permissions {
            resolved.push(
                self.resolve_permission(instance, &namespace, permission, org_id)
                    .await?,
            );
        }
        Ok(resolved)
    }

    async fn resolve_permission(
        &self,
        instance: &InstanceKey,
        namespace: &str,
        permission: &Permission,
        org_id: &InfluxId,
    ) -> Result<RemotePermission, Error> {
        let resource_id = match &permission.resource.type_ {
            ResourceType::Buckets => {
                let bucket = self
                    .store
                    .get_bucket(namespace, &permission.resource.name)
                    .await?;
                bucket
                    .id_for(instance)
                    .cloned()
                    .ok_or_else(|| Error::MissingDependency {
                        kind: "Bucket",
                        dependency: permission.resource.name.clone(),
                        namespace: instance.namespace.clone(),
                        name: instance.name.clone(),
                    })?
            }
            ResourceType::Unsupported(other) => {
                return Err(Error::UnsupportedResourceType(other.clone()))
            }
        };

        Ok(RemotePermission {
            action: permission.action,
            resource: RemoteResource {
                type_: permission.resource.type_.to_string(),
                id: Some(resource_id.to_string()),
                org_id: Some(org_id.to_string()),
            },
        })
    }

    async fn materialize(
        &self,
        instance: &InstanceKey,
        secret: &SecretSpec,
        token: Option<&str>,
    ) -> Result<(), Error> {
        let name = self.renderer.render(&secret.name_template, instance)?;
        let token = token.ok_or_else(|| Error::SecretMaterialization {
            namespace: secret.namespace.clone(),
            name: name.clone(),
            message: "instance returned no token".to_string(),
        })?;

        self.sink
            .put(&secret.namespace, &name, &secret.key, token)
            .await?;
        info!(instance = %instance, secret = %name, namespace = %secret.namespace, "token stored");
        Ok(())
    }
}
