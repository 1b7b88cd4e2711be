use super::{Collaborators, VersionStatusUpdater};
use crate::api::stack::{non_empty, tenant_registry_host};
use crate::api::{Features, GatewaySpec, VersionStatus};
use crate::error::VersionError;
use crate::image_reference::ImageReference;
use crate::registry::Component;
use async_trait::async_trait;

pub struct GatewayUpdater<'a> {
    features: Features<'a>,
    api_url: &'a str,
    spec: &'a GatewaySpec,
    status: &'a mut VersionStatus,
    collaborators: Collaborators<'a>,
}

impl<'a> GatewayUpdater<'a> {
    pub fn new(
        features: Features<'a>,
        api_url: &'a str,
        spec: &'a GatewaySpec,
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
impl VersionStatusUpdater for GatewayUpdater<'_> {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn component(&self) -> Component {
        Component::Gateway
    }

    fn is_enabled(&self) -> bool {
        !self.features.gateway_disabled() && !self.spec.capabilities.is_empty()
    }

    fn custom_image(&self) -> Option<&str> {
        non_empty(&self.spec.image)
    }

    fn custom_version(&self) -> Option<&str> {
        non_empty(&self.spec.version)
    }

    fn auto_update_requested(&self) -> bool {
        !self.features.gateway_updates_disabled()
    }

    fn is_public_registry_enabled(&self) -> bool {
        self.features.public_registry()
    }

    fn default_image(&self, version: &str) -> Result<ImageReference, VersionError> {
        let host = tenant_registry_host(self.api_url)?;
        Ok(ImageReference::tagged(
            &format!("{}/linux/gateway", host),
            version,
        )?)
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
}
