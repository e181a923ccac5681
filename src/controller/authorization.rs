//! Authorization controller
//!
//! Identical to the other kinds except for one case: when an authorization
//! was created on an instance but its token could not be stored, the new
//! identifier is persisted before the error is returned. Without it the next
//! attempt would create a duplicate authorization.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

use super::{organization_id, status_changed, Context};
use crate::crd::{Authorization, AuthorizationStatus, HasInstances, Instances};
use crate::resolver::InstanceBinding;
use crate::sync::{AuthorizationSync, SyncFailure};
use crate::{Error, Result};

/// Reconcile an Authorization across every instance its organization targets
#[instrument(skip(auth, ctx), fields(authorization = %auth.name_any(), namespace = %auth.namespace().unwrap_or_default()))]
pub async fn reconcile(auth: Arc<Authorization>, ctx: Arc<Context>) -> Result<Action> {
    auth.spec.validate()?;

    let namespace = auth.namespace().unwrap_or_default();
    let (org, bindings) = ctx
        .organization_targets(&namespace, &auth.spec.organization)
        .await?;

    let sync = AuthorizationSync {
        store: ctx.store.as_ref(),
        sink: ctx.secrets.as_ref(),
        renderer: &ctx.renderer,
    };

    let mut instances = Instances::new();
    for binding in &bindings {
        ctx.ensure_active()?;
        let org_id = organization_id(&org, &binding.key)?;
        let client = ctx.connect(binding)?;

        match sync.sync(client.as_ref(), &binding.key, &auth, &org_id).await {
            Ok(id) => instances.add_instance(&binding.key, Some(id)),
            Err(SyncFailure {
                created: Some(id),
                error,
            }) => {
                instances.add_instance(&binding.key, Some(id));
                persist_created(&ctx, &auth, &bindings, &instances).await;
                return Err(error);
            }
            Err(SyncFailure {
                created: None,
                error,
            }) => return Err(error),
        }
    }

    if status_changed(auth.instances(), &instances) {
        ctx.store
            .update_authorization_status(&auth, &AuthorizationStatus::new(instances))
            .await?;
        info!(instances = bindings.len(), "authorization status updated");
    } else {
        debug!(instances = bindings.len(), "authorization in sync");
    }

    Ok(Action::requeue(ctx.config.requeue_success))
}

/// Record identifiers gathered before a post-creation failure
///
/// The prior status is kept (pruned to current targets) and overlaid with
/// what this pass gathered. A failed write is logged; the original error is
/// what the caller reports.
async fn persist_created(
    ctx: &Context,
    auth: &Authorization,
    bindings: &[InstanceBinding],
    gathered: &Instances,
) {
    let mut instances = auth.instances().cloned().unwrap_or_default();
    instances.retain_targets(bindings.iter().map(|b| &b.key));
    instances.merge(gathered);

    if let Err(e) = ctx
        .store
        .update_authorization_status(auth, &AuthorizationStatus::new(instances))
        .await
    {
        error!(
            authorization = %auth.name_any(),
            error = %e,
            "failed to record created authorization; a retry may create a duplicate"
        );
    }
}

/// Error policy for the Authorization controller
pub fn error_policy(auth: Arc<Authorization>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        authorization = %auth.name_any(),
        instance = %error.instance().unwrap_or_default(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ctx.config.requeue_after(error))
}
