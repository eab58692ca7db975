//! The provider surface.
//!
//! [`ProviderService`] is the trait a plugin host drives: configuration
//! followed by CRUD and import calls on JSON state. [`TeoProvider`]
//! implements it by decoding the state into the typed struct of the
//! requested [`ResourceKind`] and handing it to that kind's
//! [`Resource`] handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::api::TeoApi;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::resources::acceleration_domain::AccelerationDomainResource;
use crate::resources::l4_proxy::L4ProxyResource;
use crate::resources::security_template_binding::SecurityTemplateBindingResource;
use crate::resources::zone::ZoneResource;
use crate::resources::{Context, Resource};
use crate::types::{ImportedResource, ResourceKind};

/// Trait that provider implementations must implement.
///
/// States cross this boundary as JSON values. `read` returns `None` when the
/// object no longer exists, which tells the host to drop it from state.
#[async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Resource type names this provider serves.
    fn resource_types(&self) -> Vec<String>;

    /// Configure the provider from its configuration block.
    async fn configure(&self, config: Value) -> Result<(), ProviderError>;

    /// Validate a resource's configuration before any API call.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), ProviderError> {
        let _ = (resource_type, config);
        Ok(())
    }

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// Run `$body` with `$resource` bound to the handler for `$kind`.
macro_rules! with_resource {
    ($kind:expr, $resource:ident => $body:expr) => {
        match $kind {
            ResourceKind::Zone => {
                let $resource = &ZoneResource;
                $body
            },
            ResourceKind::AccelerationDomain => {
                let $resource = &AccelerationDomainResource;
                $body
            },
            ResourceKind::L4Proxy => {
                let $resource = &L4ProxyResource;
                $body
            },
            ResourceKind::SecurityTemplateBinding => {
                let $resource = &SecurityTemplateBindingResource;
                $body
            },
        }
    };
}

/// The TEO provider.
pub struct TeoProvider {
    api: Arc<dyn TeoApi>,
    config: RwLock<ProviderConfig>,
}

impl TeoProvider {
    /// Build a provider around an API client. The configuration stays at its
    /// defaults until [`ProviderService::configure`] is called.
    pub fn new(api: Arc<dyn TeoApi>) -> Self {
        Self {
            api,
            config: RwLock::new(ProviderConfig::default()),
        }
    }

    /// A snapshot of the active configuration.
    pub async fn config(&self) -> ProviderConfig {
        self.config.read().await.clone()
    }

    async fn context(&self) -> Context {
        Context::new(self.api.clone(), self.config().await)
    }
}

fn decode<R: Resource>(resource: &R, value: Value) -> Result<R::State, ProviderError> {
    serde_json::from_value(value).map_err(|e| {
        ProviderError::Validation(format!("invalid {} state: {}", resource.type_name(), e))
    })
}

fn encode<S: Serialize>(state: &S) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

async fn create_with<R: Resource>(
    resource: &R,
    ctx: &Context,
    planned: Value,
) -> Result<Value, ProviderError> {
    let planned = decode(resource, planned)?;
    resource.validate(&planned)?;
    encode(&resource.create(ctx, planned).await?)
}

async fn read_with<R: Resource>(
    resource: &R,
    ctx: &Context,
    current: Value,
) -> Result<Option<Value>, ProviderError> {
    let current = decode(resource, current)?;
    resource
        .read(ctx, current)
        .await?
        .map(|state| encode(&state))
        .transpose()
}

async fn update_with<R: Resource>(
    resource: &R,
    ctx: &Context,
    prior: Value,
    planned: Value,
) -> Result<Value, ProviderError> {
    let prior = decode(resource, prior)?;
    let planned = decode(resource, planned)?;
    resource.validate(&planned)?;
    encode(&resource.update(ctx, prior, planned).await?)
}

async fn delete_with<R: Resource>(
    resource: &R,
    ctx: &Context,
    current: Value,
) -> Result<(), ProviderError> {
    let current = decode(resource, current)?;
    resource.delete(ctx, current).await
}

async fn import_with<R: Resource>(
    resource: &R,
    ctx: &Context,
    kind: ResourceKind,
    id: &str,
) -> Result<Vec<ImportedResource>, ProviderError> {
    let seed = resource.import_state(id).map_err(|e| match e {
        ProviderError::Validation(_) => ProviderError::Validation(format!(
            "invalid import ID `{}` for {}, expected `{}`",
            id,
            kind,
            kind.import_id_format()
        )),
        other => other,
    })?;
    match resource.read(ctx, seed).await? {
        Some(state) => Ok(vec![ImportedResource::new(kind.type_name(), encode(&state)?)]),
        None => Err(ProviderError::NotFound(format!(
            "cannot import non-existent remote object {} `{}`",
            kind, id
        ))),
    }
}

fn validate_with<R: Resource>(resource: &R, config: Value) -> Result<(), ProviderError> {
    let state = decode(resource, config)?;
    resource.validate(&state)
}

#[async_trait]
impl ProviderService for TeoProvider {
    fn resource_types(&self) -> Vec<String> {
        ResourceKind::ALL
            .iter()
            .map(|kind| kind.type_name().to_string())
            .collect()
    }

    async fn configure(&self, config: Value) -> Result<(), ProviderError> {
        let config = ProviderConfig::from_value(config)?;
        info!(
            region = config.region.as_deref().unwrap_or("unset"),
            batch_size = config.batch_size,
            "provider configured"
        );
        *self.config.write().await = config;
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        with_resource!(kind, resource => validate_with(resource, config))
    }

    #[instrument(skip(self, planned_state))]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let ctx = self.context().await;
        debug!("dispatching create");
        with_resource!(kind, resource => create_with(resource, &ctx, planned_state).await)
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let ctx = self.context().await;
        with_resource!(kind, resource => read_with(resource, &ctx, current_state).await)
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let ctx = self.context().await;
        debug!("dispatching update");
        with_resource!(kind, resource => {
            update_with(resource, &ctx, prior_state, planned_state).await
        })
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let ctx = self.context().await;
        debug!("dispatching delete");
        with_resource!(kind, resource => delete_with(resource, &ctx, current_state).await)
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let kind: ResourceKind = resource_type.parse()?;
        let ctx = self.context().await;
        with_resource!(kind, resource => import_with(resource, &ctx, kind, id).await)
    }
}
