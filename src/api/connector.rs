use crate::api::status::VersionStatus;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// The Connector CustomResource
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize)]
#[kube(
    group = "versions.kube-components.io",
    version = "v1beta1",
    kind = "Connector",
    shortname = "conn",
    namespaced,
    schema = "disabled",
    status = "VersionStatus",
    printcolumn = r#"{"name":"Version", "jsonPath":".status.version", "type":"string"}"#,
    printcolumn = r#"{"name":"Image", "jsonPath":".status.imageID", "type":"string"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<bool>,
}
