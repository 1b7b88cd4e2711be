use crate::api::{Connector, Stack};
use crate::metrics::ReconcileObserver;
use crate::registry::HttpRegistryClient;
use crate::state::ControllerContext;
use crate::version::{Collaborators, VersionReconciler};
use anyhow::Context;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

static FIELD_MANAGER: &str = "kube-component-versions";

/// A custom resource whose status carries component versions.
pub trait VersionedResource
where
    Self: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Send
        + Sync
        + DeserializeOwned
        + 'static,
{
    /// Registry the components of this resource are resolved against.
    fn registry_client(&self, ctx: &ControllerContext) -> HttpRegistryClient;

    fn version_reconciler<'a>(
        &'a mut self,
        collaborators: Collaborators<'a>,
        observer: &'a dyn ReconcileObserver,
    ) -> VersionReconciler<'a>;

    /// Merge patch that writes the whole status, including cleared fields.
    fn status_patch(&self) -> serde_json::Value;
}

impl VersionedResource for Stack {
    fn registry_client(&self, ctx: &ControllerContext) -> HttpRegistryClient {
        HttpRegistryClient::new(
            ctx.http_client.clone(),
            &self.spec.api_url,
            ctx.config.registry.token.clone(),
        )
    }

    fn version_reconciler<'a>(
        &'a mut self,
        collaborators: Collaborators<'a>,
        observer: &'a dyn ReconcileObserver,
    ) -> VersionReconciler<'a> {
        VersionReconciler::for_stack(self, collaborators, observer)
    }

    fn status_patch(&self) -> serde_json::Value {
        json!({ "status": self.status })
    }
}

impl VersionedResource for Connector {
    fn registry_client(&self, ctx: &ControllerContext) -> HttpRegistryClient {
        HttpRegistryClient::new(
            ctx.http_client.clone(),
            &ctx.config.registry.public_url,
            ctx.config.registry.token.clone(),
        )
    }

    fn version_reconciler<'a>(
        &'a mut self,
        collaborators: Collaborators<'a>,
        observer: &'a dyn ReconcileObserver,
    ) -> VersionReconciler<'a> {
        VersionReconciler::for_connector(self, collaborators, observer)
    }

    fn status_patch(&self) -> serde_json::Value {
        json!({ "status": self.status })
    }
}

pub async fn patch_version_status<K: VersionedResource>(
    api: &Api<K>,
    resource_name: &str,
    patch: &serde_json::Value,
) -> anyhow::Result<()> {
    let kind = K::kind(&());
    debug!("Patching status of {} {} with patch {}", kind, resource_name, patch);
    api.patch_status(
        resource_name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await
    .with_context(|| format!("Failed to patch status of {} {}", kind, resource_name))?;
    Ok(())
}
