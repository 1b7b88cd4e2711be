use super::{Collaborators, VersionStatusUpdater};
use crate::api::stack::non_empty;
use crate::api::{ConnectorSpec, VersionStatus};
use crate::error::VersionError;
use crate::image_reference::ImageReference;
use crate::registry::Component;
use async_trait::async_trait;

pub const DEFAULT_CONNECTOR_REPOSITORY: &str = "docker.io/kube-components/connector";

/// Connectors are always served from the public registry.
pub struct ConnectorUpdater<'a> {
    spec: &'a ConnectorSpec,
    status: &'a mut VersionStatus,
    collaborators: Collaborators<'a>,
}

impl<'a> ConnectorUpdater<'a> {
    pub fn new(
        spec: &'a ConnectorSpec,
        status: &'a mut VersionStatus,
        collaborators: Collaborators<'a>,
    ) -> Self {
        Self {
            spec,
            status,
            collaborators,
        }
    }
}

#[async_trait]
impl VersionStatusUpdater for ConnectorUpdater<'_> {
    fn name(&self) -> &'static str {
        "connector"
    }

    fn component(&self) -> Component {
        Component::Connector
    }

    fn is_enabled(&self) -> bool {
        true
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
        true
    }

    fn default_image(&self, version: &str) -> Result<ImageReference, VersionError> {
        Ok(ImageReference::tagged(DEFAULT_CONNECTOR_REPOSITORY, version)?)
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
