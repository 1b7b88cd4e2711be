use super::{AgentUpdater, Collaborators, ConnectorUpdater, GatewayUpdater, VersionStatusUpdater};
use crate::api::{Connector, Features, Stack, StackStatus, VersionStatus};
use crate::error::VersionError;
use crate::metrics::ReconcileObserver;
use tracing::info;

/// Drives the updaters of one resource for one reconcile pass.
///
/// At most one component is updated per pass. The remaining ones are picked up by the following passes, which keeps
/// the registry traffic of a single pass bounded.
pub struct VersionReconciler<'a> {
    updaters: Vec<Box<dyn VersionStatusUpdater + 'a>>,
    observer: &'a dyn ReconcileObserver,
}

impl<'a> VersionReconciler<'a> {
    pub fn new(
        updaters: Vec<Box<dyn VersionStatusUpdater + 'a>>,
        observer: &'a dyn ReconcileObserver,
    ) -> Self {
        Self { updaters, observer }
    }

    pub fn for_stack(
        stack: &'a mut Stack,
        collaborators: Collaborators<'a>,
        observer: &'a dyn ReconcileObserver,
    ) -> Self {
        let features = Features::from_meta(&stack.metadata);
        let spec = &stack.spec;
        let status = stack.status.get_or_insert_with(StackStatus::default);
        let updaters: Vec<Box<dyn VersionStatusUpdater + 'a>> = vec![
            Box::new(GatewayUpdater::new(
                features,
                &spec.api_url,
                &spec.gateway,
                &mut status.gateway,
                collaborators,
            )),
            Box::new(AgentUpdater::new(
                features,
                &spec.api_url,
                &spec.agent,
                &mut status.agent,
                collaborators,
            )),
        ];
        Self::new(updaters, observer)
    }

    pub fn for_connector(
        connector: &'a mut Connector,
        collaborators: Collaborators<'a>,
        observer: &'a dyn ReconcileObserver,
    ) -> Self {
        let spec = &connector.spec;
        let status = connector.status.get_or_insert_with(VersionStatus::default);
        let updaters: Vec<Box<dyn VersionStatusUpdater + 'a>> =
            vec![Box::new(ConnectorUpdater::new(spec, status, collaborators))];
        Self::new(updaters, observer)
    }

    /// Returns the name of the updater that changed its status, if any.
    pub async fn reconcile(&mut self) -> Result<Option<&'static str>, VersionError> {
        for updater in self.updaters.iter_mut() {
            let name = updater.name();
            info!(updater = name, "updating version status");

            if updater.requires_reconcile() {
                return match updater.update().await {
                    Ok(()) => {
                        self.observer.updated(name);
                        Ok(Some(name))
                    }
                    Err(e) => {
                        self.observer.failed(name, &e);
                        Err(e)
                    }
                };
            }

            info!(updater = name, "no reconcile required");
            self.observer.skipped(name);
        }

        Ok(None)
    }
}
