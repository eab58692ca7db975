//! Resource lifecycle handlers.
//!
//! Each submodule maps one resource type onto the TEO API. Handlers work on
//! typed state structs; conversion to and from JSON state happens once, in
//! the provider. All waiting goes through [`crate::converge`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::TeoApi;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::poller::ConvergenceRequest;
use crate::status::RemoteStatus;

pub mod acceleration_domain;
pub mod l4_proxy;
pub mod security_template_binding;
pub mod zone;

/// Separator between the parts of a composite import ID.
pub const ID_SEPARATOR: char = '#';

/// Everything a handler needs for one call.
#[derive(Clone)]
pub struct Context {
    api: Arc<dyn TeoApi>,
    config: ProviderConfig,
}

impl Context {
    /// Bundle a client with the active configuration.
    pub fn new(api: Arc<dyn TeoApi>, config: ProviderConfig) -> Self {
        Self { api, config }
    }

    /// The injected API client.
    pub fn api(&self) -> &dyn TeoApi {
        self.api.as_ref()
    }

    /// The active configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// A wait bounded by the create budget.
    pub fn create_wait<S: RemoteStatus>(&self, id: &str, targets: &[S]) -> ConvergenceRequest<S> {
        self.wait(id, targets, self.config.timeouts.create())
    }

    /// A wait bounded by the update budget.
    pub fn update_wait<S: RemoteStatus>(&self, id: &str, targets: &[S]) -> ConvergenceRequest<S> {
        self.wait(id, targets, self.config.timeouts.update())
    }

    /// A wait bounded by the delete budget.
    pub fn delete_wait<S: RemoteStatus>(&self, id: &str, targets: &[S]) -> ConvergenceRequest<S> {
        self.wait(id, targets, self.config.timeouts.delete())
    }

    /// Wait for `id` to disappear, bounded by the delete budget.
    pub fn vanish_wait<S: RemoteStatus>(&self, id: &str) -> ConvergenceRequest<S> {
        ConvergenceRequest::to_vanish(id)
            .with_timeout(self.config.timeouts.delete())
            .with_interval(self.config.timeouts.poll_interval())
    }

    fn wait<S: RemoteStatus>(
        &self,
        id: &str,
        targets: &[S],
        timeout: Duration,
    ) -> ConvergenceRequest<S> {
        ConvergenceRequest::to_reach(id, targets)
            .with_timeout(timeout)
            .with_interval(self.config.timeouts.poll_interval())
    }
}

/// One resource type's lifecycle.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Typed state, (de)serialised to the JSON state the host stores.
    type State: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// The resource type name, e.g. `tencentcloud_teo_zone`.
    fn type_name(&self) -> &'static str;

    /// Check a planned state before any API call is made.
    fn validate(&self, state: &Self::State) -> Result<(), ProviderError> {
        let _ = state;
        Ok(())
    }

    /// Create the object and wait until it is usable.
    async fn create(
        &self,
        ctx: &Context,
        planned: Self::State,
    ) -> Result<Self::State, ProviderError>;

    /// Refresh state. `None` means the object no longer exists.
    async fn read(
        &self,
        ctx: &Context,
        current: Self::State,
    ) -> Result<Option<Self::State>, ProviderError>;

    /// Apply the difference between `prior` and `planned`.
    async fn update(
        &self,
        ctx: &Context,
        prior: Self::State,
        planned: Self::State,
    ) -> Result<Self::State, ProviderError>;

    /// Delete the object and wait until it is gone.
    async fn delete(&self, ctx: &Context, current: Self::State) -> Result<(), ProviderError>;

    /// Build the minimal state a subsequent read needs from an import ID.
    fn import_state(&self, id: &str) -> Result<Self::State, ProviderError>;
}

/// Split a composite import ID into exactly `N` non-empty parts.
pub fn split_id<const N: usize>(id: &str, format: &str) -> Result<[String; N], ProviderError> {
    let parts: Vec<&str> = id.split(ID_SEPARATOR).collect();
    if parts.len() != N || parts.iter().any(|p| p.is_empty()) {
        return Err(ProviderError::Validation(format!(
            "invalid import ID `{}`, expected `{}`",
            id, format
        )));
    }
    Ok(std::array::from_fn(|i| parts[i].to_string()))
}

/// Reject a change to an attribute the API cannot modify in place.
pub(crate) fn ensure_unchanged<T: PartialEq + std::fmt::Debug>(
    attribute: &str,
    prior: &T,
    planned: &T,
) -> Result<(), ProviderError> {
    if prior == planned {
        Ok(())
    } else {
        Err(ProviderError::Validation(format!(
            "`{}` cannot be changed in place ({:?} -> {:?}); recreate the resource",
            attribute, prior, planned
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_id() {
        let [zone, proxy] = split_id::<2>("zone-1#sid-1", "zone_id#proxy_id").unwrap();
        assert_eq!(zone, "zone-1");
        assert_eq!(proxy, "sid-1");

        assert!(split_id::<2>("zone-1", "zone_id#proxy_id").is_err());
        assert!(split_id::<2>("zone-1#", "zone_id#proxy_id").is_err());
        assert!(split_id::<2>("a#b#c", "zone_id#proxy_id").is_err());
    }

    #[test]
    fn test_ensure_unchanged() {
        assert!(ensure_unchanged("area", &"global", &"global").is_ok());
        let err = ensure_unchanged("zone_name", &"a.com", &"b.com").unwrap_err();
        assert!(err.to_string().contains("zone_name"));
    }
}
