use crate::api::status::VersionStatus;
use crate::error::VersionError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub static ANNOTATION_DISABLE_GATEWAY: &str = "feature.versions.kube-components.io/disable-gateway";
pub static ANNOTATION_DISABLE_GATEWAY_UPDATES: &str =
    "feature.versions.kube-components.io/disable-gateway-updates";
pub static ANNOTATION_PUBLIC_REGISTRY: &str = "feature.versions.kube-components.io/public-registry";

/// How the agent is deployed. Any mode enables the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentMode {
    CloudNative,
    HostMonitoring,
    ApplicationMonitoring,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Capabilities the gateway serves. An empty list disables the gateway.
    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// Explicit switch, takes precedence over `mode`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<AgentMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StackStatus {
    #[serde(default)]
    pub gateway: VersionStatus,

    #[serde(default)]
    pub agent: VersionStatus,
}

/// The Stack CustomResource
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize)]
#[kube(
    group = "versions.kube-components.io",
    version = "v1beta1",
    kind = "Stack",
    shortname = "stk",
    namespaced,
    schema = "disabled",
    status = "StackStatus",
    printcolumn = r#"{"name":"API URL", "jsonPath":".spec.apiUrl", "type":"string"}"#,
    printcolumn = r#"{"name":"Gateway", "jsonPath":".status.gateway.version", "type":"string"}"#,
    printcolumn = r#"{"name":"Agent", "jsonPath":".status.agent.version", "type":"string"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StackSpec {
    /// Tenant API endpoint, its host doubles as the tenant image registry
    pub api_url: String,

    #[serde(default)]
    pub gateway: GatewaySpec,

    #[serde(default)]
    pub agent: AgentSpec,
}

/// Feature annotations of a resource.
#[derive(Clone, Copy, Debug, Default)]
pub struct Features<'a> {
    annotations: Option<&'a BTreeMap<String, String>>,
}

impl<'a> Features<'a> {
    pub fn from_meta(metadata: &'a ObjectMeta) -> Self {
        Features {
            annotations: metadata.annotations.as_ref(),
        }
    }

    fn is_true(&self, annotation: &str) -> bool {
        self.annotations
            .and_then(|a| a.get(annotation))
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    pub fn gateway_disabled(&self) -> bool {
        self.is_true(ANNOTATION_DISABLE_GATEWAY)
    }

    pub fn gateway_updates_disabled(&self) -> bool {
        self.is_true(ANNOTATION_DISABLE_GATEWAY_UPDATES)
    }

    pub fn public_registry(&self) -> bool {
        self.is_true(ANNOTATION_PUBLIC_REGISTRY)
    }
}

/// `host[:port]` of the tenant API, used as the registry of default images.
pub fn tenant_registry_host(api_url: &str) -> Result<String, VersionError> {
    let invalid = |reason: &str| VersionError::InvalidApiUrl {
        url: api_url.to_string(),
        reason: reason.to_string(),
    };
    let url = reqwest::Url::parse(api_url).map_err(|e| invalid(&e.to_string()))?;
    let host = url.host_str().ok_or_else(|| invalid("URL has no host"))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Returns `value` unless it is unset or blank.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
