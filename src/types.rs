//! Convenience types shared by the provider surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// The resource types this provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `tencentcloud_teo_zone`
    Zone,
    /// `tencentcloud_teo_acceleration_domain`
    AccelerationDomain,
    /// `tencentcloud_teo_l4_proxy`
    L4Proxy,
    /// `tencentcloud_teo_security_template_binding`
    SecurityTemplateBinding,
}

impl ResourceKind {
    /// Every supported kind.
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::Zone,
        ResourceKind::AccelerationDomain,
        ResourceKind::L4Proxy,
        ResourceKind::SecurityTemplateBinding,
    ];

    /// The resource type name used in configurations.
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Zone => "tencentcloud_teo_zone",
            ResourceKind::AccelerationDomain => "tencentcloud_teo_acceleration_domain",
            ResourceKind::L4Proxy => "tencentcloud_teo_l4_proxy",
            ResourceKind::SecurityTemplateBinding => "tencentcloud_teo_security_template_binding",
        }
    }

    /// The import ID layout, parts joined by
    /// [`ID_SEPARATOR`](crate::resources::ID_SEPARATOR).
    pub fn import_id_format(self) -> &'static str {
        match self {
            ResourceKind::Zone => "zone_id",
            ResourceKind::AccelerationDomain => "zone_id#domain_name",
            ResourceKind::L4Proxy => "zone_id#proxy_id",
            ResourceKind::SecurityTemplateBinding => "zone_id#template_id",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.type_name() == s)
            .ok_or_else(|| ProviderError::UnknownResource(s.to_string()))
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}
