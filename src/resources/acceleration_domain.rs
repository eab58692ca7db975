//! `tencentcloud_teo_acceleration_domain`.
//!
//! A domain goes `init`/`process` while its configuration deploys and settles
//! `online` or `offline`. Deleting an online domain is refused by the API, so
//! delete takes it offline first.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::{
    AccelerationDomain, ApiResponse, CreateAccelerationDomainRequest,
    ModifyAccelerationDomainRequest, OriginInfo, TeoApi,
};
use crate::converge::converge;
use crate::error::ProviderError;
use crate::poller::ConvergenceRequest;
use crate::resources::{ensure_unchanged, split_id, Context, Resource};
use crate::status::{parse_status, DomainStatus, Observation, RemoteStatus};

const SETTLED: &[DomainStatus] = &[DomainStatus::Online, DomainStatus::Offline];

fn default_status() -> String {
    DomainStatus::Online.as_str().to_string()
}

/// Origin configuration of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginState {
    pub origin_type: String,
    pub origin: String,
    #[serde(default)]
    pub backup_origin: Option<String>,
}

impl From<&OriginState> for OriginInfo {
    fn from(origin: &OriginState) -> Self {
        OriginInfo {
            origin_type: origin.origin_type.clone(),
            origin: origin.origin.clone(),
            backup_origin: origin.backup_origin.clone(),
        }
    }
}

/// State of an acceleration domain resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelerationDomainState {
    pub zone_id: String,
    pub domain_name: String,
    pub origin_info: OriginState,
    /// Desired switch, `online` or `offline`.
    #[serde(default = "default_status")]
    pub status: String,
    /// Assigned by the API.
    #[serde(default)]
    pub cname: String,
}

impl AccelerationDomainState {
    fn from_api(domain: AccelerationDomain) -> Self {
        Self {
            zone_id: domain.zone_id,
            domain_name: domain.domain_name,
            origin_info: OriginState {
                origin_type: domain.origin_detail.origin_type,
                origin: domain.origin_detail.origin,
                backup_origin: domain.origin_detail.backup_origin,
            },
            status: domain.domain_status,
            cname: domain.cname,
        }
    }

    fn id(&self) -> String {
        format!("{}/{}", self.zone_id, self.domain_name)
    }

    /// The requested switch position.
    fn desired(&self) -> Result<DomainStatus, ProviderError> {
        match DomainStatus::parse(&self.status) {
            Some(status @ (DomainStatus::Online | DomainStatus::Offline)) => Ok(status),
            _ => Err(ProviderError::Validation(format!(
                "status must be `online` or `offline`, got `{}`",
                self.status
            ))),
        }
    }
}

/// Observe one domain.
pub async fn observe(
    api: &dyn TeoApi,
    zone_id: &str,
    domain_name: &str,
) -> Result<Observation<DomainStatus>, ProviderError> {
    match api.describe_acceleration_domain(zone_id, domain_name).await? {
        None => Ok(Observation::Absent),
        Some(domain) => parse_status(domain_name, &domain.domain_status).map(Observation::Found),
    }
}

/// Handler for acceleration domains.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccelerationDomainResource;

impl AccelerationDomainResource {
    async fn switch(
        &self,
        api: &dyn TeoApi,
        zone_id: &str,
        domain_name: &str,
        status: DomainStatus,
        wait: ConvergenceRequest<DomainStatus>,
    ) -> Result<(), ProviderError> {
        info!(zone_id, domain_name, %status, "switching acceleration domain");
        let names = [domain_name.to_string()];
        let names = &names[..];
        converge(
            "ModifyAccelerationDomainStatuses",
            &wait,
            move || api.modify_acceleration_domain_statuses(zone_id, names, status),
            move |_: &ApiResponse| observe(api, zone_id, domain_name),
        )
        .await?;
        Ok(())
    }

    async fn refresh(
        &self,
        api: &dyn TeoApi,
        zone_id: &str,
        domain_name: &str,
    ) -> Result<AccelerationDomainState, ProviderError> {
        api.describe_acceleration_domain(zone_id, domain_name)
            .await?
            .map(AccelerationDomainState::from_api)
            .ok_or_else(|| {
                ProviderError::NotFound(format!("acceleration domain {}/{}", zone_id, domain_name))
            })
    }
}

#[async_trait]
impl Resource for AccelerationDomainResource {
    type State = AccelerationDomainState;

    fn type_name(&self) -> &'static str {
        "tencentcloud_teo_acceleration_domain"
    }

    fn validate(&self, state: &AccelerationDomainState) -> Result<(), ProviderError> {
        if state.origin_info.origin.is_empty() {
            return Err(ProviderError::Validation(
                "origin_info.origin must not be empty".to_string(),
            ));
        }
        state.desired().map(|_| ())
    }

    #[instrument(skip_all, fields(zone_id = %planned.zone_id, domain_name = %planned.domain_name))]
    async fn create(
        &self,
        ctx: &Context,
        planned: AccelerationDomainState,
    ) -> Result<AccelerationDomainState, ProviderError> {
        let desired = planned.desired()?;
        let api = ctx.api();
        let zone_id = planned.zone_id.as_str();
        let domain_name = planned.domain_name.as_str();
        let request = CreateAccelerationDomainRequest {
            zone_id: zone_id.to_string(),
            domain_name: domain_name.to_string(),
            origin_info: (&planned.origin_info).into(),
        };
        let request = &request;

        converge(
            "CreateAccelerationDomain",
            &ctx.create_wait(&planned.id(), &[DomainStatus::Online]),
            move || api.create_acceleration_domain(request),
            move |_: &ApiResponse| observe(api, zone_id, domain_name),
        )
        .await?;

        if desired == DomainStatus::Offline {
            let wait = ctx.create_wait(&planned.id(), &[DomainStatus::Offline]);
            self.switch(api, zone_id, domain_name, desired, wait).await?;
        }
        self.refresh(api, zone_id, domain_name).await
    }

    #[instrument(skip_all, fields(zone_id = %current.zone_id, domain_name = %current.domain_name))]
    async fn read(
        &self,
        ctx: &Context,
        current: AccelerationDomainState,
    ) -> Result<Option<AccelerationDomainState>, ProviderError> {
        Ok(ctx
            .api()
            .describe_acceleration_domain(&current.zone_id, &current.domain_name)
            .await?
            .map(AccelerationDomainState::from_api))
    }

    #[instrument(skip_all, fields(zone_id = %prior.zone_id, domain_name = %prior.domain_name))]
    async fn update(
        &self,
        ctx: &Context,
        prior: AccelerationDomainState,
        planned: AccelerationDomainState,
    ) -> Result<AccelerationDomainState, ProviderError> {
        ensure_unchanged("zone_id", &prior.zone_id, &planned.zone_id)?;
        ensure_unchanged("domain_name", &prior.domain_name, &planned.domain_name)?;
        let desired = planned.desired()?;

        let api = ctx.api();
        let zone_id = prior.zone_id.as_str();
        let domain_name = prior.domain_name.as_str();

        if prior.origin_info != planned.origin_info {
            let request = ModifyAccelerationDomainRequest {
                zone_id: zone_id.to_string(),
                domain_name: domain_name.to_string(),
                origin_info: (&planned.origin_info).into(),
            };
            let request = &request;
            converge(
                "ModifyAccelerationDomain",
                &ctx.update_wait(&prior.id(), SETTLED),
                move || api.modify_acceleration_domain(request),
                move |_: &ApiResponse| observe(api, zone_id, domain_name),
            )
            .await?;
        }

        if prior.status != planned.status {
            let wait = ctx.update_wait(&prior.id(), &[desired]);
            self.switch(api, zone_id, domain_name, desired, wait).await?;
        }

        self.refresh(api, zone_id, domain_name).await
    }

    #[instrument(skip_all, fields(zone_id = %current.zone_id, domain_name = %current.domain_name))]
    async fn delete(
        &self,
        ctx: &Context,
        current: AccelerationDomainState,
    ) -> Result<(), ProviderError> {
        let api = ctx.api();
        let zone_id = current.zone_id.as_str();
        let domain_name = current.domain_name.as_str();

        match observe(api, zone_id, domain_name).await? {
            Observation::Absent => return Ok(()),
            Observation::Found(DomainStatus::Offline) => {},
            // A domain in a failed status cannot be switched; it is deleted as is.
            Observation::Found(status) if status.is_fatal() => {},
            Observation::Found(_) => {
                let wait = ctx.delete_wait(&current.id(), &[DomainStatus::Offline]);
                self.switch(api, zone_id, domain_name, DomainStatus::Offline, wait)
                    .await?;
            },
        }

        let names = [domain_name.to_string()];
        let names = &names[..];
        converge(
            "DeleteAccelerationDomains",
            &ctx.vanish_wait(&current.id()),
            move || api.delete_acceleration_domains(zone_id, names),
            move |_: &ApiResponse| observe(api, zone_id, domain_name),
        )
        .await?;
        info!("acceleration domain deleted");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<AccelerationDomainState, ProviderError> {
        let [zone_id, domain_name] = split_id::<2>(id, "zone_id#domain_name")?;
        Ok(AccelerationDomainState {
            zone_id,
            domain_name,
            origin_info: OriginState {
                origin_type: String::new(),
                origin: String::new(),
                backup_origin: None,
            },
            status: default_status(),
            cname: String::new(),
        })
    }
}
