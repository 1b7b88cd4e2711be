use crate::image_reference::ImageReference;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Which source produced a resolved version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionSource {
    TenantRegistry,
    PublicRegistry,
    CustomImage,
    CustomVersion,
}

/// A version and image decided for one component, not yet written to a status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: String,
    pub image: ImageReference,
    pub source: VersionSource,
}

/// Persisted version decision of one component.
///
/// `version`, `imageID`, `source` and `lastProbeTimestamp` are only ever written together through [`set`](Self::set)
/// and [`clear`](Self::clear). Cleared fields serialize as `""`/`null` so that a merge patch removes stale values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatus {
    #[serde(default)]
    pub version: String,

    #[serde(default, rename = "imageID")]
    pub image_id: String,

    #[serde(default)]
    pub source: Option<VersionSource>,

    #[serde(default)]
    pub last_probe_timestamp: Option<DateTime<Utc>>,
}

impl VersionStatus {
    pub fn is_set(&self) -> bool {
        !self.version.is_empty() || !self.image_id.is_empty()
    }

    pub fn clear(&mut self) {
        *self = VersionStatus::default();
    }

    pub fn set(&mut self, resolved: ResolvedVersion, probed_at: DateTime<Utc>) {
        *self = VersionStatus {
            version: resolved.version,
            image_id: resolved.image.to_string(),
            source: Some(resolved.source),
            last_probe_timestamp: Some(probed_at),
        };
    }

    pub fn matches(&self, resolved: &ResolvedVersion) -> bool {
        self.version == resolved.version
            && self.image_id == resolved.image.to_string()
            && self.source == Some(resolved.source)
    }

    /// True when the registry has not been asked within `interval` of `now`.
    pub fn is_outdated(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        self.last_probe_timestamp
            .is_none_or(|probed_at| now - probed_at >= interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolved() -> ResolvedVersion {
        ResolvedVersion {
            version: "1.2.3".to_string(),
            image: ImageReference::parse("tenant.example.com/linux/gateway:1.2.3").unwrap(),
            source: VersionSource::TenantRegistry,
        }
    }

    #[test]
    fn test_set_and_clear_move_all_fields_together() {
        let now = Utc::now();
        let mut status = VersionStatus::default();
        assert!(!status.is_set());

        status.set(resolved(), now);
        assert!(status.is_set());
        assert_eq!(status.version, "1.2.3");
        assert_eq!(status.image_id, "tenant.example.com/linux/gateway:1.2.3");
        assert_eq!(status.source, Some(VersionSource::TenantRegistry));
        assert_eq!(status.last_probe_timestamp, Some(now));
        assert!(status.matches(&resolved()));

        status.clear();
        assert_eq!(status, VersionStatus::default());
    }

    #[test]
    fn test_is_outdated() {
        let now = Utc::now();
        let interval = Duration::minutes(15);
        let mut status = VersionStatus::default();
        assert!(status.is_outdated(now, interval));

        status.set(resolved(), now);
        assert!(!status.is_outdated(now + Duration::minutes(14), interval));
        assert!(status.is_outdated(now + Duration::minutes(15), interval));
    }

    #[test]
    fn test_cleared_status_serializes_explicit_empty_values() {
        let value = serde_json::to_value(VersionStatus::default()).unwrap();
        assert_eq!(
            value,
            json!({ "version": "", "imageID": "", "source": null, "lastProbeTimestamp": null })
        );
    }

    #[test]
    fn test_deserialize_status() {
        let status: VersionStatus = serde_json::from_value(json!({
            "version": "1.2.3",
            "imageID": "registry.io/agent:1.2.3",
            "source": "custom-version",
            "lastProbeTimestamp": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(status.source, Some(VersionSource::CustomVersion));
        assert_eq!(status.image_id, "registry.io/agent:1.2.3");

        let empty: VersionStatus = serde_json::from_value(json!({})).unwrap();
        assert!(!empty.is_set());
    }
}
