use crate::image_reference::ParseError;
use crate::registry::Component;
use thiserror::Error;

/// Errors raised while resolving a component version.
///
/// None of them are fatal to the process: a failed pass leaves the status untouched and the resource is retried on
/// the next controller tick.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("invalid image format: {0}")]
    InvalidImageFormat(#[from] ParseError),

    #[error("registry unavailable for component {component}: {reason}")]
    RegistryUnavailable { component: Component, reason: String },

    #[error("invalid API URL {url}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

impl VersionError {
    pub fn registry_unavailable(component: Component, reason: impl ToString) -> Self {
        VersionError::RegistryUnavailable {
            component,
            reason: reason.to_string(),
        }
    }
}
