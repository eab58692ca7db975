//! `tencentcloud_teo_security_template_binding`.
//!
//! Binds a security policy template to a set of hosts. One bind call accepts
//! a limited number of entities, so the entity list goes out in batches and
//! each batch is converged before the next is sent.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::{BindOperation, BindSecurityTemplateRequest, TeoApi, TemplateBinding};
use crate::batch::apply_in_batches;
use crate::error::ProviderError;
use crate::poller::{Absence, ConvergenceRequest};
use crate::resources::{ensure_unchanged, split_id, Context, Resource};
use crate::status::{parse_status, BindingStatus, Observation, RemoteStatus, StatusClass};

/// State of a template binding resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityTemplateBindingState {
    pub zone_id: String,
    pub template_id: String,
    /// Hosts the template applies to.
    pub entities: Vec<String>,
}

impl SecurityTemplateBindingState {
    fn id(&self) -> String {
        format!("{}/{}", self.zone_id, self.template_id)
    }

    fn validate(&self) -> Result<(), ProviderError> {
        if self.entities.is_empty() {
            return Err(ProviderError::Validation(
                "entities must contain at least one host".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for entity in &self.entities {
            if entity.is_empty() {
                return Err(ProviderError::Validation(
                    "entities must not contain empty names".to_string(),
                ));
            }
            if !seen.insert(entity.as_str()) {
                return Err(ProviderError::Validation(format!(
                    "entity `{}` is listed more than once",
                    entity
                )));
            }
        }
        Ok(())
    }
}

/// Fold the bindings of `chunk` into one observation.
///
/// Nothing bound is absent. Any failed entity fails the chunk. The chunk is
/// online only when every entity is; anything else is still in progress.
pub fn summarize(
    template_id: &str,
    chunk: &[String],
    bindings: &[TemplateBinding],
) -> Result<Observation<BindingStatus>, ProviderError> {
    let by_entity: HashMap<&str, &str> = bindings
        .iter()
        .map(|b| (b.entity.as_str(), b.status.as_str()))
        .collect();

    let mut found = 0usize;
    let mut unbinding = false;
    let mut settled = true;
    for entity in chunk {
        let Some(raw) = by_entity.get(entity.as_str()) else {
            settled = false;
            continue;
        };
        found += 1;
        let status: BindingStatus = parse_status(entity, raw)?;
        match status.class() {
            StatusClass::Failed => {
                warn!(template_id, entity = %entity, "binding failed");
                return Ok(Observation::Found(status));
            },
            StatusClass::Transient => {
                settled = false;
                unbinding |= status == BindingStatus::Unbinding;
            },
            StatusClass::Settled => {},
        }
    }

    Ok(match (found, settled, unbinding) {
        (0, _, _) => Observation::Absent,
        (_, true, _) => Observation::Found(BindingStatus::Online),
        (_, false, true) => Observation::Found(BindingStatus::Unbinding),
        (_, false, false) => Observation::Found(BindingStatus::Process),
    })
}

/// Observe the bindings of one chunk of entities.
///
/// A missing template takes its bindings with it: that is absence when the
/// wait accepts it, and `NotFound` otherwise.
pub async fn observe(
    api: &dyn TeoApi,
    zone_id: &str,
    template_id: &str,
    chunk: &[String],
    absence: Absence,
) -> Result<Observation<BindingStatus>, ProviderError> {
    match api
        .describe_security_template_bindings(zone_id, template_id)
        .await?
    {
        Some(bindings) => summarize(template_id, chunk, &bindings),
        None if absence == Absence::Converged => Ok(Observation::Absent),
        None => Err(ProviderError::NotFound(format!(
            "security template {}/{}",
            zone_id, template_id
        ))),
    }
}

/// Handler for template bindings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityTemplateBindingResource;

impl SecurityTemplateBindingResource {
    async fn apply(
        &self,
        ctx: &Context,
        zone_id: &str,
        template_id: &str,
        entities: &[String],
        operate: BindOperation,
        wait: ConvergenceRequest<BindingStatus>,
    ) -> Result<(), ProviderError> {
        if entities.is_empty() {
            return Ok(());
        }
        let api = ctx.api();
        let absence = wait.absence();
        info!(zone_id, template_id, ?operate, count = entities.len(), "applying bindings");

        apply_in_batches(
            "BindSecurityTemplateToEntity",
            entities,
            ctx.config().batch_size,
            &wait,
            move |chunk| async move {
                let request = BindSecurityTemplateRequest {
                    zone_id: zone_id.to_string(),
                    template_id: template_id.to_string(),
                    entities: chunk.to_vec(),
                    operate,
                };
                api.bind_security_template(&request).await
            },
            move |chunk, _| observe(api, zone_id, template_id, chunk, absence),
        )
        .await?;
        Ok(())
    }

    async fn bound_entities(
        &self,
        ctx: &Context,
        zone_id: &str,
        template_id: &str,
    ) -> Result<Option<Vec<TemplateBinding>>, ProviderError> {
        ctx.api()
            .describe_security_template_bindings(zone_id, template_id)
            .await
    }
}

#[async_trait]
impl Resource for SecurityTemplateBindingResource {
    type State = SecurityTemplateBindingState;

    fn type_name(&self) -> &'static str {
        "tencentcloud_teo_security_template_binding"
    }

    fn validate(&self, state: &SecurityTemplateBindingState) -> Result<(), ProviderError> {
        state.validate()
    }

    #[instrument(skip_all, fields(zone_id = %planned.zone_id, template_id = %planned.template_id))]
    async fn create(
        &self,
        ctx: &Context,
        planned: SecurityTemplateBindingState,
    ) -> Result<SecurityTemplateBindingState, ProviderError> {
        planned.validate()?;
        let entities = planned.entities.as_slice();
        let wait = ctx.create_wait(&planned.id(), &[BindingStatus::Online]);
        self.apply(
            ctx,
            &planned.zone_id,
            &planned.template_id,
            entities,
            BindOperation::Bind,
            wait,
        )
        .await?;
        info!(count = entities.len(), "template bound");
        Ok(planned)
    }

    #[instrument(skip_all, fields(zone_id = %current.zone_id, template_id = %current.template_id))]
    async fn read(
        &self,
        ctx: &Context,
        current: SecurityTemplateBindingState,
    ) -> Result<Option<SecurityTemplateBindingState>, ProviderError> {
        let Some(bindings) = self
            .bound_entities(ctx, &current.zone_id, &current.template_id)
            .await?
        else {
            return Ok(None);
        };

        // Known entities keep their configured order; extras follow in API order.
        let remote: HashSet<&str> = bindings.iter().map(|b| b.entity.as_str()).collect();
        let mut entities: Vec<String> = current
            .entities
            .iter()
            .filter(|e| remote.contains(e.as_str()))
            .cloned()
            .collect();
        for binding in &bindings {
            if !current.entities.contains(&binding.entity) {
                entities.push(binding.entity.clone());
            }
        }

        if entities.is_empty() {
            return Ok(None);
        }
        Ok(Some(SecurityTemplateBindingState {
            entities,
            ..current
        }))
    }

    #[instrument(skip_all, fields(zone_id = %prior.zone_id, template_id = %prior.template_id))]
    async fn update(
        &self,
        ctx: &Context,
        prior: SecurityTemplateBindingState,
        planned: SecurityTemplateBindingState,
    ) -> Result<SecurityTemplateBindingState, ProviderError> {
        ensure_unchanged("zone_id", &prior.zone_id, &planned.zone_id)?;
        ensure_unchanged("template_id", &prior.template_id, &planned.template_id)?;
        planned.validate()?;

        let removed: Vec<String> = prior
            .entities
            .iter()
            .filter(|e| !planned.entities.contains(e))
            .cloned()
            .collect();
        let added: Vec<String> = planned
            .entities
            .iter()
            .filter(|e| !prior.entities.contains(e))
            .cloned()
            .collect();

        let id = prior.id();
        self.apply(
            ctx,
            &prior.zone_id,
            &prior.template_id,
            &removed,
            BindOperation::Unbind,
            ctx.update_wait(&id, &[]).absent_means(Absence::Converged),
        )
        .await?;
        self.apply(
            ctx,
            &prior.zone_id,
            &prior.template_id,
            &added,
            BindOperation::Bind,
            ctx.update_wait(&id, &[BindingStatus::Online]),
        )
        .await?;
        Ok(planned)
    }

    #[instrument(skip_all, fields(zone_id = %current.zone_id, template_id = %current.template_id))]
    async fn delete(
        &self,
        ctx: &Context,
        current: SecurityTemplateBindingState,
    ) -> Result<(), ProviderError> {
        let Some(bindings) = self
            .bound_entities(ctx, &current.zone_id, &current.template_id)
            .await?
        else {
            info!("template already gone");
            return Ok(());
        };

        let bound: Vec<String> = current
            .entities
            .iter()
            .filter(|e| bindings.iter().any(|b| &b.entity == *e))
            .cloned()
            .collect();
        self.apply(
            ctx,
            &current.zone_id,
            &current.template_id,
            &bound,
            BindOperation::Unbind,
            ctx.vanish_wait(&current.id()),
        )
        .await
    }

    fn import_state(&self, id: &str) -> Result<SecurityTemplateBindingState, ProviderError> {
        let [zone_id, template_id] = split_id::<2>(id, "zone_id#template_id")?;
        Ok(SecurityTemplateBindingState {
            zone_id,
            template_id,
            entities: Vec::new(),
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

    fn hosts(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("h{}.example.com", i)).collect()
    }

    fn binding(entity: &str, status: &str) -> TemplateBinding {
        TemplateBinding {
            entity: entity.to_string(),
            status: status.to_string(),
        }
    }

    fn planned(entities: Vec<String>) -> SecurityTemplateBindingState {
        SecurityTemplateBindingState {
            zone_id: "zone-1".into(),
            template_id: "temp-1".into(),
            entities,
        }
    }

    fn context(api: &Arc<FakeTeoApi>, batch_size: usize) -> Context {
        let config = ProviderConfig::from_value(json!({"batch_size": batch_size})).unwrap();
        Context::new(api.clone(), config)
    }

    #[test]
    fn test_summarize() {
        let chunk = hosts(0..2);
        let summary = |bindings: &[TemplateBinding]| summarize("temp-1", &chunk, bindings).unwrap();

        assert_eq!(summary(&[]), Observation::Absent);
        assert_eq!(
            summary(&[binding("h0.example.com", "online")]),
            Observation::Found(BindingStatus::Process)
        );
        assert_eq!(
            summary(&[
                binding("h0.example.com", "online"),
                binding("h1.example.com", "online"),
                binding("other.example.com", "fail"),
            ]),
            Observation::Found(BindingStatus::Online)
        );
        assert_eq!(
            summary(&[
                binding("h0.example.com", "online"),
                binding("h1.example.com", "fail"),
            ]),
            Observation::Found(BindingStatus::Fail)
        );
        assert_eq!(
            summary(&[binding("h1.example.com", "unbinding")]),
            Observation::Found(BindingStatus::Unbinding)
        );
        assert!(summarize("temp-1", &chunk, &[binding("h0.example.com", "gone")]).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(planned(hosts(0..3)).validate().is_ok());
        assert!(planned(vec![]).validate().is_err());
        let mut entities = hosts(0..2);
        entities.push("h0.example.com".into());
        let err = planned(entities).validate().unwrap_err();
        assert!(err.to_string().contains("h0.example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_binds_in_batches() {
        let api = Arc::new(FakeTeoApi::new().with_security_template("zone-1", "temp-1"));
        let state = SecurityTemplateBindingResource
            .create(&context(&api, 200), planned(hosts(0..450)))
            .await
            .unwrap();

        assert_eq!(state.entities.len(), 450);
        assert_eq!(api.calls("BindSecurityTemplateToEntity"), 3);
        assert_eq!(api.batch_sizes("BindSecurityTemplateToEntity"), vec![200, 200, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_stops_later_batches() {
        let api = Arc::new(
            FakeTeoApi::new()
                .with_security_template("zone-1", "temp-1")
                .with_failing_entity("h5.example.com"),
        );
        let err = SecurityTemplateBindingResource
            .create(&context(&api, 2), planned(hosts(0..8)))
            .await
            .unwrap_err();

        match err {
            ProviderError::Batch {
                index,
                total,
                source,
            } => {
                assert_eq!(index, 2);
                assert_eq!(total, 4);
                assert!(matches!(*source, ProviderError::FatalStatus { .. }));
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(api.batch_sizes("BindSecurityTemplateToEntity"), vec![2, 2, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_template_is_not_found() {
        let api = Arc::new(FakeTeoApi::new());
        let err = SecurityTemplateBindingResource
            .create(&context(&api, 200), planned(hosts(0..1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Batch { ref source, .. } if matches!(**source, ProviderError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_template_removed_during_unbind_counts_as_unbound() {
        let api = Arc::new(
            FakeTeoApi::new()
                .with_settle_after(5)
                .with_security_template("zone-1", "temp-1"),
        );
        let ctx = context(&api, 200);
        let state = SecurityTemplateBindingResource
            .create(&ctx, planned(hosts(0..2)))
            .await
            .unwrap();

        let remove_template = async {
            tokio::time::sleep(std::time::Duration::from_secs(4)).await;
            api.remove_security_template("zone-1", "temp-1");
        };
        let (deleted, ()) = tokio::join!(
            SecurityTemplateBindingResource.delete(&ctx, state),
            remove_template
        );
        deleted.unwrap();
        assert_eq!(api.batch_sizes("BindSecurityTemplateToEntity"), vec![2, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbind_during_update_uses_update_budget() {
        let api = Arc::new(
            FakeTeoApi::new()
                .with_settle_after(100)
                .with_security_template("zone-1", "temp-1"),
        );
        let config = ProviderConfig::from_value(json!({
            "timeouts": {"create": 600, "update": 30, "delete": 600, "poll_interval": 3}
        }))
        .unwrap();
        let ctx = Context::new(api.clone(), config);
        let prior = planned(hosts(0..2));
        api.bind_security_template(&BindSecurityTemplateRequest {
            zone_id: "zone-1".into(),
            template_id: "temp-1".into(),
            entities: prior.entities.clone(),
            operate: BindOperation::Bind,
        })
        .await
        .unwrap();

        let start = tokio::time::Instant::now();
        let err = SecurityTemplateBindingResource
            .update(&ctx, prior, planned(hosts(1..2)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() <= std::time::Duration::from_secs(33));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_unbinds_before_binding() {
        let api = Arc::new(FakeTeoApi::new().with_security_template("zone-1", "temp-1"));
        let ctx = context(&api, 200);
        let prior = SecurityTemplateBindingResource
            .create(&ctx, planned(hosts(0..3)))
            .await
            .unwrap();

        let next = planned(hosts(1..5));
        let state = SecurityTemplateBindingResource
            .update(&ctx, prior, next.clone())
            .await
            .unwrap();
        assert_eq!(state, next);
        assert_eq!(api.batch_sizes("BindSecurityTemplateToEntity"), vec![3, 1, 2]);

        let read = SecurityTemplateBindingResource
            .read(&ctx, state)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.entities, hosts(1..5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_reports_drift() {
        let api = Arc::new(FakeTeoApi::new().with_security_template("zone-1", "temp-1"));
        let ctx = context(&api, 200);
        let state = SecurityTemplateBindingResource
            .create(&ctx, planned(hosts(0..2)))
            .await
            .unwrap();

        let mut stale = state.clone();
        stale.entities = vec!["h1.example.com".into(), "h9.example.com".into()];
        let read = SecurityTemplateBindingResource
            .read(&ctx, stale)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.entities, vec!["h1.example.com", "h0.example.com"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_unbinds_everything() {
        let api = Arc::new(FakeTeoApi::new().with_security_template("zone-1", "temp-1"));
        let ctx = context(&api, 2);
        let state = SecurityTemplateBindingResource
            .create(&ctx, planned(hosts(0..3)))
            .await
            .unwrap();

        SecurityTemplateBindingResource
            .delete(&ctx, state.clone())
            .await
            .unwrap();
        assert_eq!(
            SecurityTemplateBindingResource.read(&ctx, state).await.unwrap(),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_without_template_is_noop() {
        let api = Arc::new(FakeTeoApi::new());
        let state = SecurityTemplateBindingResource
            .import_state("zone-1#temp-9")
            .unwrap();
        SecurityTemplateBindingResource
            .delete(&context(&api, 200), state)
            .await
            .unwrap();
        assert!(api.mutations().is_empty());
    }
}
