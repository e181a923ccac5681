//! Organization controller

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

use super::{status_changed, Context};
use crate::crd::{HasInstances, Instances, Organization, OrganizationStatus};
use crate::resolver::resolve_instances;
use crate::sync::sync_organization;
use crate::{Error, Result};

/// Reconcile an Organization across every instance it targets
#[instrument(skip(org, ctx), fields(organization = %org.name_any(), namespace = %org.namespace().unwrap_or_default()))]
pub async fn reconcile(org: Arc<Organization>, ctx: Arc<Context>) -> Result<Action> {
    org.spec.validate()?;

    let bindings = resolve_instances(ctx.store.as_ref(), &org).await?;

    let mut instances = Instances::new();
    for binding in &bindings {
        ctx.ensure_active()?;
        let client = ctx.connect(binding)?;
        let id = sync_organization(client.as_ref(), &binding.key, &org.spec).await?;
        instances.add_instance(&binding.key, Some(id));
    }

    if status_changed(org.instances(), &instances) {
        ctx.store
            .update_organization_status(&org, &OrganizationStatus::new(instances))
            .await?;
        info!(instances = bindings.len(), "organization status updated");
    } else {
        debug!(instances = bindings.len(), "organization in sync");
    }

    Ok(Action::requeue(ctx.config.requeue_success))
}

/// Error policy for the Organization controller
pub fn error_policy(org: Arc<Organization>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        organization = %org.name_any(),
        instance = %error.instance().unwrap_or_default(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ctx.config.requeue_after(error))
}
