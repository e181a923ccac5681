//! Bucket synchronizer
//!
//! Creates missing buckets with the declared retention and schema type.
//! Existing buckets only have their description reconciled.

use tracing::{debug, info};

use super::parse_retention;
use crate::crd::{BucketSpec, InfluxId, InstanceKey};
use crate::influx::{BucketCreate, InfluxClient, InfluxError, RemoteBucket};
use crate::{Error, Result};

/// Create or update a bucket on one instance
///
/// `org_id` is the identifier the same instance assigned to the bucket's
/// organization.
pub async fn sync_bucket(
    client: &dyn InfluxClient,
    instance: &InstanceKey,
    spec: &BucketSpec,
    org_id: &InfluxId,
) -> Result<InfluxId> {
    let remote_err = |e: InfluxError| Error::remote(&instance.namespace, &instance.name, e);

    let existing = match client.find_bucket(&spec.name, org_id.as_str()).await {
        Ok(bucket) => bucket,
        Err(e) if e.is_not_found() => {
            let create = BucketCreate {
                name: spec.name.clone(),
                org_id: org_id.to_string(),
                description: spec.description.clone(),
                retention_rules: parse_retention(&spec.retention_policy).into_iter().collect(),
                schema_type: spec.schema_type,
            };
            let created = client.create_bucket(&create).await.map_err(remote_err)?;

            info!(
                bucket = %spec.name,
                instance = %instance,
                id = %created.id,
                retention = ?create.retention_rules.first().map(|r| r.every_seconds),
                "bucket created"
            );
            return Ok(InfluxId::from(created.id));
        }
        Err(e) => return Err(remote_err(e)),
    };

    if existing.description.as_deref().unwrap_or_default() == spec.description {
        debug!(bucket = %spec.name, instance = %instance, id = %existing.id, "bucket up to date");
        return Ok(InfluxId::from(existing.id));
    }

    let desired = RemoteBucket {
        description: Some(spec.description.clone()),
        ..existing
    };
    let updated = client.update_bucket(&desired).await.map_err(remote_err)?;

    info!(bucket = %spec.name, instance = %instance, id = %updated.id, "bucket description updated");
    Ok(InfluxId::from(updated.id))
}
