//! `tencentcloud_teo_l4_proxy`.
//!
//! A proxy is deployed asynchronously (`progress`) and must be stopped
//! (`stopping` -> `offline`) before it can be deleted. The proxy ID is only
//! known from the create response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::{
    ApiResponse, CreateL4ProxyRequest, CreateL4ProxyResponse, L4Proxy, ModifyL4ProxyRequest,
    TeoApi,
};
use crate::converge::{converge, converge_created};
use crate::error::ProviderError;
use crate::poller::{poll, ConvergenceRequest};
use crate::resources::{ensure_unchanged, split_id, Context, Resource};
use crate::status::{parse_status, Observation, ProxyStatus, RemoteStatus};

const SETTLED: &[ProxyStatus] = &[ProxyStatus::Online, ProxyStatus::Offline];

fn default_status() -> String {
    ProxyStatus::Online.as_str().to_string()
}

fn default_ipv6() -> String {
    "off".to_string()
}

/// State of a layer-4 proxy resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L4ProxyState {
    pub zone_id: String,
    pub proxy_name: String,
    pub area: String,
    #[serde(default = "default_ipv6")]
    pub ipv6: String,
    /// Desired state, `online` or `offline`.
    #[serde(default = "default_status")]
    pub status: String,
    /// Assigned by the API.
    #[serde(default)]
    pub proxy_id: String,
}

impl L4ProxyState {
    fn from_api(proxy: L4Proxy) -> Self {
        Self {
            zone_id: proxy.zone_id,
            proxy_name: proxy.proxy_name,
            area: proxy.area,
            ipv6: proxy.ipv6,
            status: proxy.status,
            proxy_id: proxy.proxy_id,
        }
    }

    fn desired(&self) -> Result<ProxyStatus, ProviderError> {
        match ProxyStatus::parse(&self.status) {
            Some(status @ (ProxyStatus::Online | ProxyStatus::Offline)) => Ok(status),
            _ => Err(ProviderError::Validation(format!(
                "status must be `online` or `offline`, got `{}`",
                self.status
            ))),
        }
    }

    fn validate(&self) -> Result<(), ProviderError> {
        if !matches!(self.ipv6.as_str(), "on" | "off") {
            return Err(ProviderError::Validation(format!(
                "ipv6 must be `on` or `off`, got `{}`",
                self.ipv6
            )));
        }
        self.desired().map(|_| ())
    }
}

/// Observe one proxy.
pub async fn observe(
    api: &dyn TeoApi,
    zone_id: &str,
    proxy_id: &str,
) -> Result<Observation<ProxyStatus>, ProviderError> {
    match api.describe_l4_proxy(zone_id, proxy_id).await? {
        None => Ok(Observation::Absent),
        Some(proxy) => parse_status(proxy_id, &proxy.status).map(Observation::Found),
    }
}

/// Handler for layer-4 proxies.
#[derive(Debug, Default, Clone, Copy)]
pub struct L4ProxyResource;

impl L4ProxyResource {
    async fn switch(
        &self,
        api: &dyn TeoApi,
        zone_id: &str,
        proxy_id: &str,
        status: ProxyStatus,
        wait: ConvergenceRequest<ProxyStatus>,
    ) -> Result<(), ProviderError> {
        info!(zone_id, proxy_id, %status, "switching l4 proxy");
        converge(
            "ModifyL4ProxyStatus",
            &wait,
            move || api.modify_l4_proxy_status(zone_id, proxy_id, status),
            move |_: &ApiResponse| observe(api, zone_id, proxy_id),
        )
        .await?;
        Ok(())
    }

    async fn refresh(
        &self,
        api: &dyn TeoApi,
        zone_id: &str,
        proxy_id: &str,
    ) -> Result<L4ProxyState, ProviderError> {
        api.describe_l4_proxy(zone_id, proxy_id)
            .await?
            .map(L4ProxyState::from_api)
            .ok_or_else(|| ProviderError::NotFound(format!("l4 proxy {}/{}", zone_id, proxy_id)))
    }
}

#[async_trait]
impl Resource for L4ProxyResource {
    type State = L4ProxyState;

    fn type_name(&self) -> &'static str {
        "tencentcloud_teo_l4_proxy"
    }

    fn validate(&self, state: &L4ProxyState) -> Result<(), ProviderError> {
        state.validate()
    }

    #[instrument(skip_all, fields(zone_id = %planned.zone_id, proxy_name = %planned.proxy_name))]
    async fn create(
        &self,
        ctx: &Context,
        planned: L4ProxyState,
    ) -> Result<L4ProxyState, ProviderError> {
        planned.validate()?;
        let desired = planned.desired()?;
        let api = ctx.api();
        let zone_id = planned.zone_id.as_str();
        let request = CreateL4ProxyRequest {
            zone_id: zone_id.to_string(),
            proxy_name: planned.proxy_name.clone(),
            area: planned.area.clone(),
            ipv6: planned.ipv6.clone(),
        };
        let request = &request;

        let applied = converge_created(
            "CreateL4Proxy",
            &ctx.create_wait(&planned.proxy_name, &[ProxyStatus::Online]),
            move || api.create_l4_proxy(request),
            |created: &CreateL4ProxyResponse| created.proxy_id.clone(),
            move |created: &CreateL4ProxyResponse| {
                let proxy_id = created.proxy_id.clone();
                async move { observe(api, zone_id, &proxy_id).await }
            },
        )
        .await?;
        let proxy_id = applied.response.proxy_id;
        info!(%proxy_id, "l4 proxy created");

        if desired == ProxyStatus::Offline {
            let wait = ctx.create_wait(&proxy_id, &[ProxyStatus::Offline]);
            self.switch(api, zone_id, &proxy_id, desired, wait).await?;
        }
        self.refresh(api, zone_id, &proxy_id).await
    }

    #[instrument(skip_all, fields(zone_id = %current.zone_id, proxy_id = %current.proxy_id))]
    async fn read(
        &self,
        ctx: &Context,
        current: L4ProxyState,
    ) -> Result<Option<L4ProxyState>, ProviderError> {
        Ok(ctx
            .api()
            .describe_l4_proxy(&current.zone_id, &current.proxy_id)
            .await?
            .map(L4ProxyState::from_api))
    }

    #[instrument(skip_all, fields(zone_id = %prior.zone_id, proxy_id = %prior.proxy_id))]
    async fn update(
        &self,
        ctx: &Context,
        prior: L4ProxyState,
        planned: L4ProxyState,
    ) -> Result<L4ProxyState, ProviderError> {
        ensure_unchanged("zone_id", &prior.zone_id, &planned.zone_id)?;
        ensure_unchanged("proxy_name", &prior.proxy_name, &planned.proxy_name)?;
        ensure_unchanged("area", &prior.area, &planned.area)?;
        planned.validate()?;
        let desired = planned.desired()?;

        let api = ctx.api();
        let zone_id = prior.zone_id.as_str();
        let proxy_id = prior.proxy_id.as_str();

        if prior.ipv6 != planned.ipv6 {
            let request = ModifyL4ProxyRequest {
                zone_id: zone_id.to_string(),
                proxy_id: proxy_id.to_string(),
                ipv6: planned.ipv6.clone(),
            };
            let request = &request;
            converge(
                "ModifyL4Proxy",
                &ctx.update_wait(proxy_id, SETTLED),
                move || api.modify_l4_proxy(request),
                move |_: &ApiResponse| observe(api, zone_id, proxy_id),
            )
            .await?;
        }

        if prior.status != planned.status {
            let wait = ctx.update_wait(proxy_id, &[desired]);
            self.switch(api, zone_id, proxy_id, desired, wait).await?;
        }

        self.refresh(api, zone_id, proxy_id).await
    }

    #[instrument(skip_all, fields(zone_id = %current.zone_id, proxy_id = %current.proxy_id))]
    async fn delete(&self, ctx: &Context, current: L4ProxyState) -> Result<(), ProviderError> {
        let api = ctx.api();
        let zone_id = current.zone_id.as_str();
        let proxy_id = current.proxy_id.as_str();

        match observe(api, zone_id, proxy_id).await? {
            Observation::Absent => return Ok(()),
            // A failed deployment cannot be stopped; it is deleted as is.
            Observation::Found(ProxyStatus::Offline | ProxyStatus::Fail) => {},
            // Someone else already asked it to stop.
            Observation::Found(ProxyStatus::Stopping) => {
                let wait = ctx.delete_wait(proxy_id, &[ProxyStatus::Offline]);
                poll(&wait, move || observe(api, zone_id, proxy_id)).await?;
            },
            Observation::Found(_) => {
                let wait = ctx.delete_wait(proxy_id, &[ProxyStatus::Offline]);
                self.switch(api, zone_id, proxy_id, ProxyStatus::Offline, wait)
                    .await?;
            },
        }

        converge(
            "DeleteL4Proxy",
            &ctx.vanish_wait(proxy_id),
            move || api.delete_l4_proxy(zone_id, proxy_id),
            move |_: &ApiResponse| observe(api, zone_id, proxy_id),
        )
        .await?;
        info!("l4 proxy deleted");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<L4ProxyState, ProviderError> {
        let [zone_id, proxy_id] = split_id::<2>(id, "zone_id#proxy_id")?;
        Ok(L4ProxyState {
            zone_id,
            proxy_name: String::new(),
            area: String::new(),
            ipv6: default_ipv6(),
            status: default_status(),
            proxy_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::testing::FakeTeoApi;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn planned() -> L4ProxyState {
        serde_json::from_value(json!({
            "zone_id": "zone-1",
            "proxy_name": "game-proxy",
            "area": "overseas"
        }))
        .unwrap()
    }

    fn context(api: &Arc<FakeTeoApi>) -> Context {
        Context::new(api.clone(), ProviderConfig::default())
    }

    #[test]
    fn test_defaults_and_validation() {
        let state = planned();
        assert_eq!(state.ipv6, "off");
        assert_eq!(state.status, "online");
        assert!(state.validate().is_ok());

        let mut state = state;
        state.ipv6 = "yes".into();
        assert!(matches!(state.validate(), Err(ProviderError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_online() {
        let api = Arc::new(FakeTeoApi::new().with_settle_after(4));
        let state = L4ProxyResource.create(&context(&api), planned()).await.unwrap();

        assert!(state.proxy_id.starts_with("sid-"));
        assert_eq!(state.status, "online");
        assert!(api.calls("DescribeL4Proxy") >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_survives_visibility_lag() {
        let api = Arc::new(FakeTeoApi::new().with_visibility_lag(2));
        let state = L4ProxyResource.create(&context(&api), planned()).await.unwrap();
        assert_eq!(state.status, "online");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_fail_status_is_fatal() {
        let api = Arc::new(FakeTeoApi::new().with_settled_status("CreateL4Proxy", "fail"));
        let err = L4ProxyResource
            .create(&context(&api), planned())
            .await
            .unwrap_err();

        match &err {
            ProviderError::FatalStatus { id, status } => {
                assert!(id.starts_with("sid-"), "wait labelled {id}");
                assert_eq!(status, "fail");
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out() {
        let api = Arc::new(FakeTeoApi::new().with_settle_after(u32::MAX));
        let config = ProviderConfig::from_value(json!({
            "timeouts": {"create": 30, "poll_interval": 3}
        }))
        .unwrap();
        let ctx = Context::new(api.clone(), config);

        let started = tokio::time::Instant::now();
        let err = L4ProxyResource.create(&ctx, planned()).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("last observed: progress"));
        assert!(err.to_string().starts_with("timeout waiting for sid-"));
        assert!(!err.to_string().contains("game-proxy"));
        assert!(started.elapsed() <= Duration::from_secs(33));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_via_update() {
        let api = Arc::new(FakeTeoApi::new());
        let ctx = context(&api);
        let prior = L4ProxyResource.create(&ctx, planned()).await.unwrap();
        let mut next = prior.clone();
        next.status = "offline".into();
        next.ipv6 = "on".into();

        let state = L4ProxyResource.update(&ctx, prior, next).await.unwrap();
        assert_eq!(state.status, "offline");
        assert_eq!(state.ipv6, "on");
        assert_eq!(
            api.mutations(),
            vec![
                "CreateL4Proxy".to_string(),
                "ModifyL4Proxy".to_string(),
                "ModifyL4ProxyStatus".to_string()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_stops_then_deletes() {
        let api = Arc::new(FakeTeoApi::new().with_settle_after(2));
        let ctx = context(&api);
        let state = L4ProxyResource.create(&ctx, planned()).await.unwrap();
        let proxy_id = state.proxy_id.clone();

        L4ProxyResource.delete(&ctx, state).await.unwrap();
        assert_eq!(
            api.mutations(),
            vec![
                "CreateL4Proxy".to_string(),
                "ModifyL4ProxyStatus".to_string(),
                "DeleteL4Proxy".to_string()
            ]
        );
        assert!(api
            .describe_l4_proxy("zone-1", &proxy_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_of_stopped_proxy_skips_stop() {
        let api = Arc::new(FakeTeoApi::new());
        let ctx = context(&api);
        let mut planned = planned();
        planned.status = "offline".into();
        let state = L4ProxyResource.create(&ctx, planned).await.unwrap();

        L4ProxyResource.delete(&ctx, state).await.unwrap();
        assert_eq!(api.calls("ModifyL4ProxyStatus"), 1);
        assert_eq!(api.calls("DeleteL4Proxy"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_for_pending_stop() {
        let api = Arc::new(FakeTeoApi::new());
        let ctx = context(&api);
        let state = L4ProxyResource.create(&ctx, planned()).await.unwrap();
        api.modify_l4_proxy_status("zone-1", &state.proxy_id, ProxyStatus::Offline)
            .await
            .unwrap();

        L4ProxyResource.delete(&ctx, state).await.unwrap();
        assert_eq!(api.calls("ModifyL4ProxyStatus"), 1);
        assert_eq!(api.calls("DeleteL4Proxy"), 1);
    }

    #[test]
    fn test_import_state() {
        let state = L4ProxyResource.import_state("zone-1#sid-2").unwrap();
        assert_eq!(state.zone_id, "zone-1");
        assert_eq!(state.proxy_id, "sid-2");
        assert!(L4ProxyResource.import_state("sid-2").is_err());
    }
}
