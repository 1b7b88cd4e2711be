use super::{Collaborators, VersionStatusUpdater};
use crate::api::stack::{non_empty, tenant_registry_host};
use crate::api::{AgentSpec, Features, ResolvedVersion, VersionSource, VersionStatus};
use crate::error::VersionError;
use crate::image_reference::ImageReference;
use crate::registry::Component;
use async_trait::async_trait;

pub struct AgentUpdater<'a> {
    features: Features<'a>,
    api_url: &'a str,
    spec: &'a AgentSpec,
    status: &'a mut VersionStatus,
    collaborators: Collaborators<'a>,
}

impl<'a> AgentUpdater<'a> {
    pub fn new(
        features: Features<'a>,
        api_url: &'a str,
        spec: &'a AgentSpec,
        status: &'a mut VersionStatus,
        collaborators: Collaborators<'a>,
    ) -> Self {
        Self {
            features,
            api_url,
            spec,
            status,
            collaborators,
        }
    }
}

#[async_trait]
impl VersionStatusUpdater for AgentUpdater<'_> {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn component(&self) -> Component {
        Component::Agent
    }

    fn is_enabled(&self) -> bool {
        match self.spec.enabled {
            Some(enabled) => enabled && self.spec.mode.is_some(),
            None => self.spec.mode.is_some(),
        }
    }

    fn custom_image(&self) -> Option<&str> {
        non_empty(&self.spec.image)
    }

    fn custom_version(&self) -> Option<&str> {
        non_empty(&self.spec.version)
    }

    fn auto_update_requested(&self) -> bool {
        self.spec.auto_update.unwrap_or(true)
    }

    fn is_public_registry_enabled(&self) -> bool {
        self.features.public_registry()
    }

    fn default_image(&self, version: &str) -> Result<ImageReference, VersionError> {
        let host = tenant_registry_host(self.api_url)?;
        Ok(ImageReference::tagged(&format!("{}/linux/agent", host), version)?)
    }

    fn status(&self) -> &VersionStatus {
        self.status
    }

    fn status_mut(&mut self) -> &mut VersionStatus {
        self.status
    }

    fn collaborators(&self) -> Collaborators<'_> {
        self.collaborators
    }

    /// The tenant only publishes agent versions, the image is always built from the default template.
    async fn resolve_from_tenant_registry(&self) -> Result<ResolvedVersion, VersionError> {
        let version = self
            .collaborators
            .registry
            .latest_version(Component::Agent)
            .await?;
        let image = self.default_image(&version)?;
        Ok(ResolvedVersion {
            version,
            image,
            source: VersionSource::TenantRegistry,
        })
    }
}
