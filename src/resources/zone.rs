//! `tencentcloud_teo_zone`.
//!
//! A zone settles in `pending` until ownership is verified and `active`
//! afterwards; both count as created. Pausing is a separate call that
//! converges to `paused`. A zone must be paused before it can be deleted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::{
    ApiResponse, CreateZoneRequest, CreateZoneResponse, ModifyZoneRequest, TeoApi, Zone,
};
use crate::converge::{converge, converge_created};
use crate::error::ProviderError;
use crate::resources::{ensure_unchanged, Context, Resource};
use crate::status::{parse_status, Observation, ZoneStatus};

/// Statuses in which a zone is considered provisioned.
const SERVING: &[ZoneStatus] = &[ZoneStatus::Pending, ZoneStatus::Active];

/// State of a zone resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneState {
    /// Assigned by the API.
    #[serde(default)]
    pub zone_id: String,
    pub zone_name: String,
    #[serde(rename = "type")]
    pub zone_type: String,
    pub area: String,
    pub plan_id: String,
    #[serde(default)]
    pub alias_zone_name: Option<String>,
    #[serde(default)]
    pub paused: bool,
    /// Last observed status.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub name_servers: Vec<String>,
}

impl ZoneState {
    fn from_api(zone: Zone) -> Self {
        Self {
            zone_id: zone.zone_id,
            zone_name: zone.zone_name,
            zone_type: zone.zone_type,
            area: zone.area,
            plan_id: zone.plan_id,
            alias_zone_name: zone.alias_zone_name,
            paused: zone.paused,
            status: zone.status,
            name_servers: zone.name_servers,
        }
    }
}

/// Observe a zone, folding the paused flag into [`ZoneStatus::Paused`].
pub async fn observe(
    api: &dyn TeoApi,
    zone_id: &str,
) -> Result<Observation<ZoneStatus>, ProviderError> {
    match api.describe_zone(zone_id).await? {
        None => Ok(Observation::Absent),
        Some(zone) if zone.paused => Ok(Observation::Found(ZoneStatus::Paused)),
        Some(zone) => parse_status(zone_id, &zone.status).map(Observation::Found),
    }
}

/// Handler for zones.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZoneResource;

impl ZoneResource {
    async fn set_paused(
        &self,
        ctx: &Context,
        zone_id: &str,
        paused: bool,
        wait: crate::poller::ConvergenceRequest<ZoneStatus>,
    ) -> Result<(), ProviderError> {
        let api = ctx.api();
        info!(zone_id, paused, "changing zone status");
        converge(
            "ModifyZoneStatus",
            &wait,
            move || api.modify_zone_status(zone_id, paused),
            move |_: &ApiResponse| observe(api, zone_id),
        )
        .await?;
        Ok(())
    }

    async fn refresh(&self, ctx: &Context, zone_id: &str) -> Result<ZoneState, ProviderError> {
        ctx.api()
            .describe_zone(zone_id)
            .await?
            .map(ZoneState::from_api)
            .ok_or_else(|| ProviderError::NotFound(format!("zone {}", zone_id)))
    }
}

#[async_trait]
impl Resource for ZoneResource {
    type State = ZoneState;

    fn type_name(&self) -> &'static str {
        "tencentcloud_teo_zone"
    }

    #[instrument(skip(self, ctx, planned), fields(zone_name = %planned.zone_name))]
    async fn create(&self, ctx: &Context, planned: ZoneState) -> Result<ZoneState, ProviderError> {
        let api = ctx.api();
        let request = CreateZoneRequest {
            zone_name: planned.zone_name.clone(),
            zone_type: planned.zone_type.clone(),
            area: planned.area.clone(),
            plan_id: planned.plan_id.clone(),
            alias_zone_name: planned.alias_zone_name.clone(),
        };
        let request = &request;

        let applied = converge_created(
            "CreateZone",
            &ctx.create_wait(&planned.zone_name, SERVING),
            move || api.create_zone(request),
            |created: &CreateZoneResponse| created.zone_id.clone(),
            move |created: &CreateZoneResponse| {
                let zone_id = created.zone_id.clone();
                async move { observe(api, &zone_id).await }
            },
        )
        .await?;
        let zone_id = applied.response.zone_id;
        info!(%zone_id, "zone created");

        if planned.paused {
            let wait = ctx.create_wait(&zone_id, &[ZoneStatus::Paused]);
            self.set_paused(ctx, &zone_id, true, wait).await?;
        }
        self.refresh(ctx, &zone_id).await
    }

    #[instrument(skip(self, ctx, current), fields(zone_id = %current.zone_id))]
    async fn read(
        &self,
        ctx: &Context,
        current: ZoneState,
    ) -> Result<Option<ZoneState>, ProviderError> {
        Ok(ctx
            .api()
            .describe_zone(&current.zone_id)
            .await?
            .map(ZoneState::from_api))
    }

    #[instrument(skip(self, ctx, prior, planned), fields(zone_id = %prior.zone_id))]
    async fn update(
        &self,
        ctx: &Context,
        prior: ZoneState,
        planned: ZoneState,
    ) -> Result<ZoneState, ProviderError> {
        ensure_unchanged("zone_name", &prior.zone_name, &planned.zone_name)?;
        ensure_unchanged("plan_id", &prior.plan_id, &planned.plan_id)?;

        let api = ctx.api();
        let zone_id = prior.zone_id.as_str();

        if prior.zone_type != planned.zone_type
            || prior.area != planned.area
            || prior.alias_zone_name != planned.alias_zone_name
        {
            let request = ModifyZoneRequest {
                zone_id: zone_id.to_string(),
                zone_type: planned.zone_type.clone(),
                area: planned.area.clone(),
                alias_zone_name: planned.alias_zone_name.clone(),
            };
            let request = &request;
            let settled = if prior.paused {
                &[ZoneStatus::Paused][..]
            } else {
                SERVING
            };
            converge(
                "ModifyZone",
                &ctx.update_wait(zone_id, settled),
                move || api.modify_zone(request),
                move |_: &ApiResponse| observe(api, zone_id),
            )
            .await?;
        }

        if prior.paused != planned.paused {
            let targets = if planned.paused {
                &[ZoneStatus::Paused][..]
            } else {
                SERVING
            };
            let wait = ctx.update_wait(zone_id, targets);
            self.set_paused(ctx, zone_id, planned.paused, wait).await?;
        }

        self.refresh(ctx, zone_id).await
    }

    #[instrument(skip(self, ctx, current), fields(zone_id = %current.zone_id))]
    async fn delete(&self, ctx: &Context, current: ZoneState) -> Result<(), ProviderError> {
        let api = ctx.api();
        let zone_id = current.zone_id.as_str();

        match observe(api, zone_id).await? {
            Observation::Absent => return Ok(()),
            Observation::Found(ZoneStatus::Paused) => {},
            Observation::Found(_) => {
                let wait = ctx.delete_wait(zone_id, &[ZoneStatus::Paused]);
                self.set_paused(ctx, zone_id, true, wait).await?;
            },
        }

        converge(
            "DeleteZone",
            &ctx.vanish_wait(zone_id),
            move || api.delete_zone(zone_id),
            move |_: &ApiResponse| observe(api, zone_id),
        )
        .await?;
        info!("zone deleted");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<ZoneState, ProviderError> {
        if id.is_empty() || id.contains(crate::resources::ID_SEPARATOR) {
            return Err(ProviderError::Validation(format!(
                "invalid import ID `{}`, expected `zone_id`",
                id
            )));
        }
        Ok(ZoneState {
            zone_id: id.to_string(),
            zone_name: String::new(),
            zone_type: String::new(),
            area: String::new(),
            plan_id: String::new(),
            alias_zone_name: None,
            paused: false,
            status: String::new(),
            name_servers: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::testing::FakeTeoApi;
    use std::sync::Arc;

    fn planned() -> ZoneState {
        serde_json::from_value(serde_json::json!({
            "zone_name": "example.com",
            "type": "partial",
            "area": "global",
            "plan_id": "edgeone-2unuvzjmmn2q"
        }))
        .unwrap()
    }

    fn context(api: &Arc<FakeTeoApi>) -> Context {
        Context::new(api.clone(), ProviderConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_pending() {
        let api = Arc::new(FakeTeoApi::new().with_settle_after(2));
        let state = ZoneResource.create(&context(&api), planned()).await.unwrap();

        assert!(state.zone_id.starts_with("zone-"));
        assert_eq!(state.status, "pending");
        assert!(!state.paused);
        assert_eq!(api.calls("CreateZone"), 1);
        assert!(api.calls("DescribeZone") >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_paused_zone() {
        let api = Arc::new(FakeTeoApi::new());
        let mut planned = planned();
        planned.paused = true;

        let state = ZoneResource.create(&context(&api), planned).await.unwrap();
        assert!(state.paused);
        assert_eq!(api.calls("ModifyZoneStatus"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_rejects_new_name() {
        let api = Arc::new(FakeTeoApi::new());
        let ctx = context(&api);
        let prior = ZoneResource.create(&ctx, planned()).await.unwrap();
        let mut next = prior.clone();
        next.zone_name = "other.com".into();

        let err = ZoneResource.update(&ctx, prior, next).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(api.calls("ModifyZone"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_area_and_pause() {
        let api = Arc::new(FakeTeoApi::new());
        let ctx = context(&api);
        let prior = ZoneResource.create(&ctx, planned()).await.unwrap();
        let mut next = prior.clone();
        next.area = "overseas".into();
        next.paused = true;

        let state = ZoneResource.update(&ctx, prior, next).await.unwrap();
        assert_eq!(state.area, "overseas");
        assert!(state.paused);
        assert_eq!(api.calls("ModifyZone"), 1);
        assert_eq!(api.calls("ModifyZoneStatus"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_pauses_first() {
        let api = Arc::new(FakeTeoApi::new());
        let ctx = context(&api);
        let state = ZoneResource.create(&ctx, planned()).await.unwrap();
        let zone_id = state.zone_id.clone();

        ZoneResource.delete(&ctx, state).await.unwrap();
        assert_eq!(
            api.mutations(),
            vec![
                "CreateZone".to_string(),
                "ModifyZoneStatus".to_string(),
                "DeleteZone".to_string()
            ]
        );
        assert!(api.describe_zone(&zone_id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_of_missing_zone_is_noop() {
        let api = Arc::new(FakeTeoApi::new());
        let state = ZoneResource.import_state("zone-missing").unwrap();
        ZoneResource.delete(&context(&api), state).await.unwrap();
        assert!(api.mutations().is_empty());
    }

    #[test]
    fn test_import_state() {
        let state = ZoneResource.import_state("zone-2o0i41pv2h8c").unwrap();
        assert_eq!(state.zone_id, "zone-2o0i41pv2h8c");
        assert!(ZoneResource.import_state("").is_err());
        assert!(ZoneResource.import_state("zone-1#x").is_err());
    }
}
