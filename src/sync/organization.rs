//! Organization synchronizer
//!
//! Organizations are observe-only: a missing organization is reported, never
//! created. Only the description is kept in sync.

use tracing::{debug, info};

use crate::crd::{InfluxId, InstanceKey, OrganizationSpec};
use crate::influx::{InfluxClient, RemoteOrganization};
use crate::{Error, Result};

/// Bring an organization's description in line on one instance
pub async fn sync_organization(
    client: &dyn InfluxClient,
    instance: &InstanceKey,
    spec: &OrganizationSpec,
) -> Result<InfluxId> {
    let remote = match client.find_organization(&spec.name).await {
        Ok(org) => org,
        Err(e) if e.is_not_found() => {
            return Err(Error::OrganizationNotFound {
                organization: spec.name.clone(),
                namespace: instance.namespace.clone(),
                name: instance.name.clone(),
            })
        }
        Err(e) => return Err(Error::remote(&instance.namespace, &instance.name, e)),
    };

    if remote.description.as_deref().unwrap_or_default() == spec.description {
        debug!(organization = %spec.name, instance = %instance, id = %remote.id, "organization up to date");
        return Ok(InfluxId::from(remote.id));
    }

    let desired = RemoteOrganization {
        description: Some(spec.description.clone()),
        ..remote
    };
    let updated = client
        .update_organization(&desired)
        .await
        .map_err(|e| Error::remote(&instance.namespace, &instance.name, e))?;

    info!(organization = %spec.name, instance = %instance, id = %updated.id, "organization description updated");
    Ok(InfluxId::from(updated.id))
}
