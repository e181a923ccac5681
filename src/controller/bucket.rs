//! Bucket controller

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

use super::{organization_id, status_changed, Context};
use crate::crd::{Bucket, BucketStatus, HasInstances, Instances};
use crate::sync::sync_bucket;
use crate::{Error, Result};

/// Reconcile a Bucket across every instance its organization targets
#[instrument(skip(bucket, ctx), fields(bucket = %bucket.name_any(), namespace = %bucket.namespace().unwrap_or_default()))]
pub async fn reconcile(bucket: Arc<Bucket>, ctx: Arc<Context>) -> Result<Action> {
    bucket.spec.validate()?;

    let namespace = bucket.namespace().unwrap_or_default();
    let (org, bindings) = ctx
        .organization_targets(&namespace, &bucket.spec.organization)
        .await?;

    let mut instances = Instances::new();
    for binding in &bindings {
        ctx.ensure_active()?;
        let org_id = organization_id(&org, &binding.key)?;
        let client = ctx.connect(binding)?;
        let id = sync_bucket(client.as_ref(), &binding.key, &bucket.spec, &org_id).await?;
        instances.add_instance(&binding.key, Some(id));
    }

    if status_changed(bucket.instances(), &instances) {
        ctx.store
            .update_bucket_status(&bucket, &BucketStatus::new(instances))
            .await?;
        info!(instances = bindings.len(), "bucket status updated");
    } else {
        debug!(instances = bindings.len(), "bucket in sync");
    }

    Ok(Action::requeue(ctx.config.requeue_success))
}

/// Error policy for the Bucket controller
pub fn error_policy(bucket: Arc<Bucket>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        bucket = %bucket.name_any(),
        instance = %error.instance().unwrap_or_default(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ctx.config.requeue_after(error))
}
