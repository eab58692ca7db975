//! The cloud API seam.
//!
//! [`TeoApi`] is the client every resource handler talks to. It is injected
//! into the provider explicitly; there is no global client. Implementations
//! wrap a real SDK or, in tests, [`crate::testing::FakeTeoApi`].
//!
//! Mutations return `Ok(None)` when the API answered without a response
//! body; the converge step treats that as a malformed response. Describe
//! calls return `Ok(None)` when the object does not exist.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::status::{DomainStatus, ProxyStatus};

/// Result of a mutating API call.
pub type ApiResult<T> = Result<Option<T>, ProviderError>;

/// Acknowledgement returned by calls that carry no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse {
    /// Request identifier assigned by the API.
    pub request_id: String,
}

/// A site managed by TEO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Zone {
    /// Zone identifier, e.g. `zone-2o0i41pv2h8c`.
    pub zone_id: String,
    /// The apex domain.
    pub zone_name: String,
    /// Access mode: `full`, `partial` or `noDomainAccess`.
    #[serde(rename = "Type")]
    pub zone_type: String,
    /// Acceleration area: `global`, `mainland` or `overseas`.
    pub area: String,
    /// Plan the zone is attached to.
    pub plan_id: String,
    /// Optional alias used to tell apart zones sharing a name.
    #[serde(default)]
    pub alias_zone_name: Option<String>,
    /// Raw status string.
    pub status: String,
    /// Whether the owner took the zone out of service.
    #[serde(default)]
    pub paused: bool,
    /// Name servers assigned for NS delegation.
    #[serde(default)]
    pub name_servers: Vec<String>,
}

/// Parameters of `CreateZone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateZoneRequest {
    pub zone_name: String,
    #[serde(rename = "Type")]
    pub zone_type: String,
    pub area: String,
    pub plan_id: String,
    pub alias_zone_name: Option<String>,
}

/// Response of `CreateZone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateZoneResponse {
    pub zone_id: String,
}

/// Parameters of `ModifyZone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyZoneRequest {
    pub zone_id: String,
    #[serde(rename = "Type")]
    pub zone_type: String,
    pub area: String,
    pub alias_zone_name: Option<String>,
}

/// Where an acceleration domain fetches content from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginInfo {
    /// `IP_DOMAIN`, `COS`, `ORIGIN_GROUP`, ...
    pub origin_type: String,
    /// Origin address; meaning depends on `origin_type`.
    pub origin: String,
    /// Backup origin, only meaningful for origin groups.
    #[serde(default)]
    pub backup_origin: Option<String>,
}

/// A host accelerated by TEO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccelerationDomain {
    pub zone_id: String,
    pub domain_name: String,
    /// Raw status string.
    pub domain_status: String,
    /// CNAME target the host should point at.
    #[serde(default)]
    pub cname: String,
    pub origin_detail: OriginInfo,
}

/// Parameters of `CreateAccelerationDomain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateAccelerationDomainRequest {
    pub zone_id: String,
    pub domain_name: String,
    pub origin_info: OriginInfo,
}

/// Parameters of `ModifyAccelerationDomain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAccelerationDomainRequest {
    pub zone_id: String,
    pub domain_name: String,
    pub origin_info: OriginInfo,
}

/// A layer-4 proxy instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct L4Proxy {
    pub zone_id: String,
    pub proxy_id: String,
    pub proxy_name: String,
    pub area: String,
    /// `on` or `off`.
    pub ipv6: String,
    /// Raw status string.
    pub status: String,
}

/// Parameters of `CreateL4Proxy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateL4ProxyRequest {
    pub zone_id: String,
    pub proxy_name: String,
    pub area: String,
    pub ipv6: String,
}

/// Response of `CreateL4Proxy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateL4ProxyResponse {
    pub proxy_id: String,
}

/// Parameters of `ModifyL4Proxy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyL4ProxyRequest {
    pub zone_id: String,
    pub proxy_id: String,
    pub ipv6: String,
}

/// Whether a binding call attaches or detaches entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindOperation {
    Bind,
    Unbind,
}

/// Parameters of `BindSecurityTemplateToEntity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BindSecurityTemplateRequest {
    pub zone_id: String,
    pub template_id: String,
    /// Hosts to (un)bind; at most 200 per call.
    pub entities: Vec<String>,
    pub operate: BindOperation,
}

/// One entity a security template is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateBinding {
    pub entity: String,
    /// Raw status string.
    pub status: String,
}

/// The TEO API operations used by the resource handlers.
#[async_trait]
pub trait TeoApi: Send + Sync {
    async fn create_zone(&self, request: &CreateZoneRequest) -> ApiResult<CreateZoneResponse>;

    async fn describe_zone(&self, zone_id: &str) -> Result<Option<Zone>, ProviderError>;

    async fn modify_zone(&self, request: &ModifyZoneRequest) -> ApiResult<ApiResponse>;

    /// Pause (`true`) or resume (`false`) a zone.
    async fn modify_zone_status(&self, zone_id: &str, paused: bool) -> ApiResult<ApiResponse>;

    async fn delete_zone(&self, zone_id: &str) -> ApiResult<ApiResponse>;

    async fn create_acceleration_domain(
        &self,
        request: &CreateAccelerationDomainRequest,
    ) -> ApiResult<ApiResponse>;

    async fn describe_acceleration_domain(
        &self,
        zone_id: &str,
        domain_name: &str,
    ) -> Result<Option<AccelerationDomain>, ProviderError>;

    async fn modify_acceleration_domain(
        &self,
        request: &ModifyAccelerationDomainRequest,
    ) -> ApiResult<ApiResponse>;

    /// Switch domains on or off. Only `Online` and `Offline` are accepted.
    async fn modify_acceleration_domain_statuses(
        &self,
        zone_id: &str,
        domain_names: &[String],
        status: DomainStatus,
    ) -> ApiResult<ApiResponse>;

    async fn delete_acceleration_domains(
        &self,
        zone_id: &str,
        domain_names: &[String],
    ) -> ApiResult<ApiResponse>;

    async fn create_l4_proxy(
        &self,
        request: &CreateL4ProxyRequest,
    ) -> ApiResult<CreateL4ProxyResponse>;

    async fn describe_l4_proxy(
        &self,
        zone_id: &str,
        proxy_id: &str,
    ) -> Result<Option<L4Proxy>, ProviderError>;

    async fn modify_l4_proxy(&self, request: &ModifyL4ProxyRequest) -> ApiResult<ApiResponse>;

    /// Start or stop a proxy. Only `Online` and `Offline` are accepted.
    async fn modify_l4_proxy_status(
        &self,
        zone_id: &str,
        proxy_id: &str,
        status: ProxyStatus,
    ) -> ApiResult<ApiResponse>;

    async fn delete_l4_proxy(&self, zone_id: &str, proxy_id: &str) -> ApiResult<ApiResponse>;

    async fn bind_security_template(
        &self,
        request: &BindSecurityTemplateRequest,
    ) -> ApiResult<ApiResponse>;

    /// List the entities a template is bound to. `None` when the template
    /// itself does not exist.
    async fn describe_security_template_bindings(
        &self,
        zone_id: &str,
        template_id: &str,
    ) -> Result<Option<Vec<TemplateBinding>>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requests_use_api_field_names() {
        let request = CreateZoneRequest {
            zone_name: "example.com".into(),
            zone_type: "partial".into(),
            area: "global".into(),
            plan_id: "edgeone-2unuvzjmmn2q".into(),
            alias_zone_name: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["ZoneName"], "example.com");
        assert_eq!(value["Type"], "partial");
        assert_eq!(value["PlanId"], "edgeone-2unuvzjmmn2q");
    }

    #[test]
    fn test_bind_operation_is_lowercase() {
        let request = BindSecurityTemplateRequest {
            zone_id: "zone-1".into(),
            template_id: "temp-1".into(),
            entities: vec!["a.example.com".into()],
            operate: BindOperation::Unbind,
        };
        assert_eq!(serde_json::to_value(&request).unwrap()["Operate"], "unbind");
    }

    #[test]
    fn test_zone_defaults() {
        let zone: Zone = serde_json::from_value(json!({
            "ZoneId": "zone-1",
            "ZoneName": "example.com",
            "Type": "full",
            "Area": "overseas",
            "PlanId": "plan-1",
            "Status": "pending"
        }))
        .unwrap();
        assert!(!zone.paused);
        assert!(zone.name_servers.is_empty());
        assert_eq!(zone.alias_zone_name, None);
    }
}
