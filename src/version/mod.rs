//! Version resolution for managed components.
//!
//! Every component kind has one [`VersionStatusUpdater`] implementation that only answers questions about its own
//! spec (is it enabled, which overrides are set, what is its default image). The precedence between overrides,
//! registries and the previously persisted status is shared by all kinds and lives in the provided trait methods.

mod agent;
mod connector;
mod gateway;
mod reconciler;

pub use agent::AgentUpdater;
pub use connector::ConnectorUpdater;
pub use gateway::GatewayUpdater;
pub use reconciler::VersionReconciler;

use crate::api::{ResolvedVersion, VersionSource, VersionStatus};
use crate::clock::Clock;
use crate::error::VersionError;
use crate::image_reference::ImageReference;
use crate::registry::{Component, LatestImageInfo, RegistryClient};
use async_trait::async_trait;
use chrono::Duration;
use tracing::{debug, info};

/// Registry recheck interval used when none is configured.
pub const DEFAULT_PROBE_INTERVAL_MINUTES: i64 = 15;

/// External collaborators an updater borrows for one reconcile pass.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub registry: &'a dyn RegistryClient,
    pub clock: &'a dyn Clock,
    pub probe_interval: Duration,
}

impl<'a> Collaborators<'a> {
    pub fn new(registry: &'a dyn RegistryClient, clock: &'a dyn Clock) -> Self {
        Collaborators {
            registry,
            clock,
            probe_interval: Duration::minutes(DEFAULT_PROBE_INTERVAL_MINUTES),
        }
    }

    pub fn with_probe_interval(mut self, probe_interval: Duration) -> Self {
        self.probe_interval = probe_interval;
        self
    }
}

#[async_trait]
pub trait VersionStatusUpdater: Send + Sync {
    fn name(&self) -> &'static str;

    fn component(&self) -> Component;

    fn is_enabled(&self) -> bool;

    fn custom_image(&self) -> Option<&str>;

    fn custom_version(&self) -> Option<&str>;

    /// The auto-update toggle as configured, before overrides are taken into account.
    fn auto_update_requested(&self) -> bool;

    fn is_public_registry_enabled(&self) -> bool;

    fn default_image(&self, version: &str) -> Result<ImageReference, VersionError>;

    fn status(&self) -> &VersionStatus;

    fn status_mut(&mut self) -> &mut VersionStatus;

    fn collaborators(&self) -> Collaborators<'_>;

    async fn latest_image_info(&self) -> Result<LatestImageInfo, VersionError> {
        self.collaborators()
            .registry
            .latest_image_info(self.component())
            .await
    }

    async fn resolve_from_tenant_registry(&self) -> Result<ResolvedVersion, VersionError> {
        let info = self.latest_image_info().await?;
        let image = self.default_image(&info.tag)?;
        Ok(ResolvedVersion {
            version: info.tag,
            image,
            source: VersionSource::TenantRegistry,
        })
    }

    async fn resolve_from_public_registry(&self) -> Result<ResolvedVersion, VersionError> {
        let info = self.latest_image_info().await?;
        let image = info.image_reference()?;
        Ok(ResolvedVersion {
            version: info.tag,
            image,
            source: VersionSource::PublicRegistry,
        })
    }

    fn is_auto_update_enabled(&self) -> bool {
        self.custom_image().is_none()
            && self.custom_version().is_none()
            && self.auto_update_requested()
    }

    /// What the component currently resolves to according to its status, empty while disabled.
    fn target(&self) -> String {
        if !self.is_enabled() {
            return String::new();
        }
        let status = self.status();
        if status.image_id.is_empty() {
            status.version.clone()
        } else {
            status.image_id.clone()
        }
    }

    fn registry_source(&self) -> VersionSource {
        if self.is_public_registry_enabled() {
            VersionSource::PublicRegistry
        } else {
            VersionSource::TenantRegistry
        }
    }

    /// The version fixed by the spec, `None` when a registry decides.
    ///
    /// A custom image wins over a custom version.
    fn spec_override(&self) -> Result<Option<ResolvedVersion>, VersionError> {
        if let Some(image) = self.custom_image() {
            let image = ImageReference::parse(image)?;
            return Ok(Some(ResolvedVersion {
                version: image.version_label().to_string(),
                image,
                source: VersionSource::CustomImage,
            }));
        }
        if let Some(version) = self.custom_version() {
            return Ok(Some(ResolvedVersion {
                version: version.to_string(),
                image: self.default_image(version)?,
                source: VersionSource::CustomVersion,
            }));
        }
        Ok(None)
    }

    fn requires_reconcile(&self) -> bool {
        let status = self.status();
        if !self.is_enabled() {
            return status.is_set();
        }

        match self.spec_override() {
            // let update surface the error
            Err(_) => true,
            Ok(Some(resolved)) => !status.matches(&resolved),
            Ok(None) => {
                if !status.is_set() || status.source != Some(self.registry_source()) {
                    return true;
                }
                if !self.auto_update_requested() {
                    return false;
                }
                let collaborators = self.collaborators();
                status.is_outdated(collaborators.clock.now(), collaborators.probe_interval)
            }
        }
    }

    /// Resolves the version and writes it to the status. On error the status is left untouched.
    async fn update(&mut self) -> Result<(), VersionError> {
        if !self.is_enabled() {
            info!(updater = self.name(), "component disabled, clearing version status");
            self.status_mut().clear();
            return Ok(());
        }

        let resolved = match self.spec_override()? {
            Some(resolved) => resolved,
            None => {
                let source = self.registry_source();
                let status = self.status();
                if !self.auto_update_requested() && status.is_set() && status.source == Some(source) {
                    debug!(
                        updater = self.name(),
                        version = %status.version,
                        "auto-update disabled, keeping resolved version"
                    );
                    return Ok(());
                }
                match source {
                    VersionSource::PublicRegistry => self.resolve_from_public_registry().await?,
                    _ => self.resolve_from_tenant_registry().await?,
                }
            }
        };

        info!(
            updater = self.name(),
            version = %resolved.version,
            image = %resolved.image,
            source = ?resolved.source,
            "resolved version"
        );
        let now = self.collaborators().clock.now();
        self.status_mut().set(resolved, now);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::clock::FixedClock;
    use crate::registry::MockRegistryClient;

    pub const NOW: &str = "2026-03-01T12:00:00Z";

    pub fn image_info(source: &str, tag: &str) -> LatestImageInfo {
        LatestImageInfo {
            source: source.to_string(),
            tag: tag.to_string(),
        }
    }

    /// A registry that must not be called.
    pub fn unused_registry() -> MockRegistryClient {
        let mut registry = MockRegistryClient::new();
        registry.expect_latest_version().never();
        registry.expect_latest_image_info().never();
        registry
    }

    pub fn registry_returning(info: LatestImageInfo) -> MockRegistryClient {
        let mut registry = MockRegistryClient::new();
        registry
            .expect_latest_image_info()
            .returning(move |_| Ok(info.clone()));
        registry
    }

    pub fn failing_registry() -> MockRegistryClient {
        let mut registry = MockRegistryClient::new();
        registry
            .expect_latest_image_info()
            .returning(|component| Err(VersionError::registry_unavailable(component, "connection refused")));
        registry
            .expect_latest_version()
            .returning(|component| Err(VersionError::registry_unavailable(component, "connection refused")));
        registry
    }

    pub fn clock() -> FixedClock {
        FixedClock::at(NOW)
    }
}
