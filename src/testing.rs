//! Testing utilities for the provider.
//!
//! [`FakeTeoApi`] is an in-memory TEO backend. Every mutation leaves the
//! object in a transitional status for a configurable number of describe
//! calls before it settles, which is enough to drive the converge machinery
//! through realistic sequences without a network. [`ProviderTester`] wraps a
//! [`ProviderService`] and runs whole lifecycles against it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use teo_provider::testing::{FakeTeoApi, ProviderTester};
//! use teo_provider::TeoProvider;
//! use serde_json::json;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_zone() {
//!     let api = Arc::new(FakeTeoApi::new().with_settle_after(2));
//!     let tester = ProviderTester::new(TeoProvider::new(api.clone()));
//!     tester.configure(json!({})).await.unwrap();
//!
//!     let state = tester.lifecycle_create("tencentcloud_teo_zone", json!({
//!         "zone_name": "example.com",
//!         "type": "partial",
//!         "area": "global",
//!         "plan_id": "edgeone-2unuvzjmmn2q"
//!     })).await.unwrap();
//!
//!     assert_eq!(state["status"], "pending");
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{
    AccelerationDomain, ApiResponse, ApiResult, BindOperation, BindSecurityTemplateRequest,
    CreateAccelerationDomainRequest, CreateL4ProxyRequest, CreateL4ProxyResponse,
    CreateZoneRequest, CreateZoneResponse, L4Proxy, ModifyAccelerationDomainRequest,
    ModifyL4ProxyRequest, ModifyZoneRequest, TeoApi, TemplateBinding, Zone,
};
use crate::error::{ErrorClass, ProviderError};
use crate::provider::ProviderService;
use crate::status::{DomainStatus, ProxyStatus, RemoteStatus};
use crate::types::ImportedResource;

/// An object whose describe result lags behind the last mutation.
#[derive(Debug)]
struct Tracked<T> {
    /// What describe currently returns.
    value: Option<T>,
    /// Where the object ends up once the transition settles.
    next: Option<Option<T>>,
    /// Describe calls left before `next` is applied.
    reads_left: u32,
    /// Describe calls left that still report the object as missing.
    hidden_reads: u32,
}

impl<T: Clone> Tracked<T> {
    fn created(transient: T, settled: T, settle_after: u32, hidden_reads: u32) -> Self {
        Self {
            value: Some(transient),
            next: Some(Some(settled)),
            reads_left: settle_after,
            hidden_reads,
        }
    }

    fn is_present(&self) -> bool {
        self.value.is_some()
    }

    fn flush(&mut self) {
        if let Some(next) = self.next.take() {
            self.value = next;
        }
        self.hidden_reads = 0;
    }

    /// Start a transition: `during` is visible until it settles into `after`.
    fn change(
        &mut self,
        settle_after: u32,
        during: impl FnOnce(&mut T),
        after: impl FnOnce(&mut T),
    ) {
        self.flush();
        if let Some(current) = self.value.as_mut() {
            let mut settled = current.clone();
            after(&mut settled);
            during(current);
            self.next = Some(Some(settled));
            self.reads_left = settle_after;
        }
    }

    /// Start a removal: `during` is visible until the object disappears.
    fn remove(&mut self, settle_after: u32, during: impl FnOnce(&mut T)) {
        self.flush();
        if let Some(current) = self.value.as_mut() {
            during(current);
            self.next = Some(None);
            self.reads_left = settle_after;
        }
    }

    fn observe(&mut self) -> Option<T> {
        if self.hidden_reads > 0 {
            self.hidden_reads -= 1;
            return None;
        }
        if self.next.is_some() {
            if self.reads_left == 0 {
                self.flush();
            } else {
                self.reads_left -= 1;
            }
        }
        self.value.clone()
    }
}

type Bindings = BTreeMap<String, Tracked<TemplateBinding>>;

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    zones: HashMap<String, Tracked<Zone>>,
    domains: HashMap<(String, String), Tracked<AccelerationDomain>>,
    proxies: HashMap<(String, String), Tracked<L4Proxy>>,
    templates: HashMap<(String, String), Bindings>,
    calls: HashMap<String, usize>,
    mutations: Vec<String>,
    batch_sizes: HashMap<String, Vec<usize>>,
    failures: HashMap<String, VecDeque<ProviderError>>,
    empty_responses: HashSet<String>,
}

impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:012}", prefix, self.next_id)
    }

    fn request_id(&mut self) -> ApiResponse {
        ApiResponse {
            request_id: self.id("req"),
        }
    }
}

/// An in-memory TEO backend.
///
/// Objects move through a transitional status for `settle_after` describe
/// calls after each mutation. Calls can be made to fail or to return an empty
/// body, and every call is counted.
#[derive(Debug)]
pub struct FakeTeoApi {
    settle_after: u32,
    visibility_lag: u32,
    settled_statuses: HashMap<String, String>,
    failing_entities: HashSet<String>,
    state: Mutex<FakeState>,
}

impl Default for FakeTeoApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTeoApi {
    /// A backend where every transition settles after one describe.
    pub fn new() -> Self {
        Self {
            settle_after: 1,
            visibility_lag: 0,
            settled_statuses: HashMap::new(),
            failing_entities: HashSet::new(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Number of describe calls that still see the transitional status.
    pub fn with_settle_after(mut self, reads: u32) -> Self {
        self.settle_after = reads;
        self
    }

    /// Number of describe calls that do not see a freshly created object.
    pub fn with_visibility_lag(mut self, reads: u32) -> Self {
        self.visibility_lag = reads;
        self
    }

    /// Make objects created by `operation` settle in `status`.
    pub fn with_settled_status(mut self, operation: &str, status: &str) -> Self {
        self.settled_statuses
            .insert(operation.to_string(), status.to_string());
        self
    }

    /// Make bindings of `entity` settle in `fail`.
    pub fn with_failing_entity(mut self, entity: &str) -> Self {
        self.failing_entities.insert(entity.to_string());
        self
    }

    /// Register a security template with no bindings.
    pub fn with_security_template(mut self, zone_id: &str, template_id: &str) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .templates
            .insert((zone_id.to_string(), template_id.to_string()), Bindings::new());
        self
    }

    /// Drop a security template and every binding it carries.
    pub fn remove_security_template(&self, zone_id: &str, template_id: &str) {
        self.state()
            .templates
            .remove(&(zone_id.to_string(), template_id.to_string()));
    }

    /// Fail the next call to `operation` with `error`.
    pub fn fail_next(&self, operation: &str, error: ProviderError) {
        self.state()
            .failures
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    /// Make every call to `operation` answer without a body.
    pub fn respond_empty(&self, operation: &str) {
        self.state().empty_responses.insert(operation.to_string());
    }

    /// Number of calls made to `operation`.
    pub fn calls(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }

    /// Mutating calls in the order they were made.
    pub fn mutations(&self) -> Vec<String> {
        self.state().mutations.clone()
    }

    /// Number of targets sent by each call to a batched `operation`.
    pub fn batch_sizes(&self, operation: &str) -> Vec<usize> {
        self.state()
            .batch_sizes
            .get(operation)
            .cloned()
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settled_status<'a>(&'a self, operation: &str, default: &'a str) -> &'a str {
        self.settled_statuses
            .get(operation)
            .map(String::as_str)
            .unwrap_or(default)
    }

    /// Count a call and pop an injected failure, if any.
    fn begin(
        &self,
        operation: &str,
        mutates: bool,
    ) -> Result<MutexGuard<'_, FakeState>, ProviderError> {
        let mut state = self.state();
        *state.calls.entry(operation.to_string()).or_default() += 1;
        if mutates {
            state.mutations.push(operation.to_string());
        }
        let failure = state.failures.get_mut(operation).and_then(VecDeque::pop_front);
        match failure {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn mutate<R>(
        &self,
        operation: &str,
        apply: impl FnOnce(&mut FakeState) -> Result<R, ProviderError>,
    ) -> ApiResult<R> {
        let mut state = self.begin(operation, true)?;
        let response = apply(&mut *state)?;
        if state.empty_responses.contains(operation) {
            return Ok(None);
        }
        Ok(Some(response))
    }
}

fn not_found(what: &str, id: &str) -> ProviderError {
    ProviderError::from_api_code(
        "ResourceNotFound",
        format!("{} {} does not exist", what, id),
    )
}

#[async_trait]
impl TeoApi for FakeTeoApi {
    async fn create_zone(&self, request: &CreateZoneRequest) -> ApiResult<CreateZoneResponse> {
        let settled = self.settled_status("CreateZone", "pending").to_string();
        self.mutate("CreateZone", |state| {
            let zone_id = state.id("zone");
            let zone = Zone {
                zone_id: zone_id.clone(),
                zone_name: request.zone_name.clone(),
                zone_type: request.zone_type.clone(),
                area: request.area.clone(),
                plan_id: request.plan_id.clone(),
                alias_zone_name: request.alias_zone_name.clone(),
                status: "initializing".to_string(),
                paused: false,
                name_servers: vec![
                    "ns1.example-teo.net".to_string(),
                    "ns2.example-teo.net".to_string(),
                ],
            };
            let ready = Zone {
                status: settled,
                ..zone.clone()
            };
            state.zones.insert(
                zone_id.clone(),
                Tracked::created(zone, ready, self.settle_after, self.visibility_lag),
            );
            Ok(CreateZoneResponse { zone_id })
        })
    }

    async fn describe_zone(&self, zone_id: &str) -> Result<Option<Zone>, ProviderError> {
        let mut state = self.begin("DescribeZone", false)?;
        let zone = state.zones.get_mut(zone_id).and_then(Tracked::observe);
        Ok(zone)
    }

    async fn modify_zone(&self, request: &ModifyZoneRequest) -> ApiResult<ApiResponse> {
        self.mutate("ModifyZone", |state| {
            let zone = state
                .zones
                .get_mut(&request.zone_id)
                .filter(|z| z.is_present())
                .ok_or_else(|| not_found("zone", &request.zone_id))?;
            zone.change(
                self.settle_after,
                |_| {},
                |z| {
                    z.zone_type = request.zone_type.clone();
                    z.area = request.area.clone();
                    z.alias_zone_name = request.alias_zone_name.clone();
                },
            );
            Ok(state.request_id())
        })
    }

    async fn modify_zone_status(&self, zone_id: &str, paused: bool) -> ApiResult<ApiResponse> {
        self.mutate("ModifyZoneStatus", |state| {
            let zone = state
                .zones
                .get_mut(zone_id)
                .filter(|z| z.is_present())
                .ok_or_else(|| not_found("zone", zone_id))?;
            zone.change(self.settle_after, |_| {}, |z| z.paused = paused);
            Ok(state.request_id())
        })
    }

    async fn delete_zone(&self, zone_id: &str) -> ApiResult<ApiResponse> {
        self.mutate("DeleteZone", |state| {
            let zone = state
                .zones
                .get_mut(zone_id)
                .filter(|z| z.is_present())
                .ok_or_else(|| not_found("zone", zone_id))?;
            if zone.value.as_ref().is_some_and(|z| !z.paused) {
                return Err(ProviderError::from_api_code(
                    "OperationDenied",
                    "zone must be paused before deletion",
                ));
            }
            zone.remove(self.settle_after, |_| {});
            Ok(state.request_id())
        })
    }

    async fn create_acceleration_domain(
        &self,
        request: &CreateAccelerationDomainRequest,
    ) -> ApiResult<ApiResponse> {
        let settled = self
            .settled_status("CreateAccelerationDomain", DomainStatus::Online.as_str())
            .to_string();
        self.mutate("CreateAccelerationDomain", |state| {
            let key = (request.zone_id.clone(), request.domain_name.clone());
            if state.domains.get(&key).is_some_and(Tracked::is_present) {
                return Err(ProviderError::from_api_code(
                    "ResourceInUse.Duplicated",
                    format!("{} already exists", request.domain_name),
                ));
            }
            let domain = AccelerationDomain {
                zone_id: request.zone_id.clone(),
                domain_name: request.domain_name.clone(),
                domain_status: DomainStatus::Process.as_str().to_string(),
                cname: format!("{}.eo.dnse1.com", request.domain_name),
                origin_detail: request.origin_info.clone(),
            };
            let ready = AccelerationDomain {
                domain_status: settled,
                ..domain.clone()
            };
            state.domains.insert(
                key,
                Tracked::created(domain, ready, self.settle_after, self.visibility_lag),
            );
            Ok(state.request_id())
        })
    }

    async fn describe_acceleration_domain(
        &self,
        zone_id: &str,
        domain_name: &str,
    ) -> Result<Option<AccelerationDomain>, ProviderError> {
        let mut state = self.begin("DescribeAccelerationDomains", false)?;
        let key = (zone_id.to_string(), domain_name.to_string());
        let domain = state.domains.get_mut(&key).and_then(Tracked::observe);
        Ok(domain)
    }

    async fn modify_acceleration_domain(
        &self,
        request: &ModifyAccelerationDomainRequest,
    ) -> ApiResult<ApiResponse> {
        self.mutate("ModifyAccelerationDomain", |state| {
            let key = (request.zone_id.clone(), request.domain_name.clone());
            let domain = state
                .domains
                .get_mut(&key)
                .filter(|d| d.is_present())
                .ok_or_else(|| not_found("domain", &request.domain_name))?;
            domain.change(
                self.settle_after,
                |d| d.domain_status = DomainStatus::Process.as_str().to_string(),
                |d| d.origin_detail = request.origin_info.clone(),
            );
            Ok(state.request_id())
        })
    }

    async fn modify_acceleration_domain_statuses(
        &self,
        zone_id: &str,
        domain_names: &[String],
        status: DomainStatus,
    ) -> ApiResult<ApiResponse> {
        self.mutate("ModifyAccelerationDomainStatuses", |state| {
            for name in domain_names {
                let key = (zone_id.to_string(), name.clone());
                let domain = state
                    .domains
                    .get_mut(&key)
                    .filter(|d| d.is_present())
                    .ok_or_else(|| not_found("domain", name))?;
                domain.change(
                    self.settle_after,
                    |d| d.domain_status = DomainStatus::Process.as_str().to_string(),
                    |d| d.domain_status = status.as_str().to_string(),
                );
            }
            Ok(state.request_id())
        })
    }

    async fn delete_acceleration_domains(
        &self,
        zone_id: &str,
        domain_names: &[String],
    ) -> ApiResult<ApiResponse> {
        self.mutate("DeleteAccelerationDomains", |state| {
            for name in domain_names {
                let key = (zone_id.to_string(), name.clone());
                if let Some(domain) = state.domains.get_mut(&key) {
                    if domain
                        .value
                        .as_ref()
                        .is_some_and(|d| d.domain_status == DomainStatus::Online.as_str())
                    {
                        return Err(ProviderError::from_api_code(
                            "OperationDenied",
                            format!("{} must be offline before deletion", name),
                        ));
                    }
                    domain.remove(self.settle_after, |_| {});
                }
            }
            Ok(state.request_id())
        })
    }

    async fn create_l4_proxy(
        &self,
        request: &CreateL4ProxyRequest,
    ) -> ApiResult<CreateL4ProxyResponse> {
        let settled = self
            .settled_status("CreateL4Proxy", ProxyStatus::Online.as_str())
            .to_string();
        self.mutate("CreateL4Proxy", |state| {
            let proxy_id = state.id("sid");
            let proxy = L4Proxy {
                zone_id: request.zone_id.clone(),
                proxy_id: proxy_id.clone(),
                proxy_name: request.proxy_name.clone(),
                area: request.area.clone(),
                ipv6: request.ipv6.clone(),
                status: ProxyStatus::Progress.as_str().to_string(),
            };
            let ready = L4Proxy {
                status: settled,
                ..proxy.clone()
            };
            state.proxies.insert(
                (request.zone_id.clone(), proxy_id.clone()),
                Tracked::created(proxy, ready, self.settle_after, self.visibility_lag),
            );
            Ok(CreateL4ProxyResponse { proxy_id })
        })
    }

    async fn describe_l4_proxy(
        &self,
        zone_id: &str,
        proxy_id: &str,
    ) -> Result<Option<L4Proxy>, ProviderError> {
        let mut state = self.begin("DescribeL4Proxy", false)?;
        let key = (zone_id.to_string(), proxy_id.to_string());
        let proxy = state.proxies.get_mut(&key).and_then(Tracked::observe);
        Ok(proxy)
    }

    async fn modify_l4_proxy(&self, request: &ModifyL4ProxyRequest) -> ApiResult<ApiResponse> {
        self.mutate("ModifyL4Proxy", |state| {
            let key = (request.zone_id.clone(), request.proxy_id.clone());
            let proxy = state
                .proxies
                .get_mut(&key)
                .filter(|p| p.is_present())
                .ok_or_else(|| not_found("proxy", &request.proxy_id))?;
            proxy.change(
                self.settle_after,
                |p| p.status = ProxyStatus::Progress.as_str().to_string(),
                |p| p.ipv6 = request.ipv6.clone(),
            );
            Ok(state.request_id())
        })
    }

    async fn modify_l4_proxy_status(
        &self,
        zone_id: &str,
        proxy_id: &str,
        status: ProxyStatus,
    ) -> ApiResult<ApiResponse> {
        self.mutate("ModifyL4ProxyStatus", |state| {
            let key = (zone_id.to_string(), proxy_id.to_string());
            let proxy = state
                .proxies
                .get_mut(&key)
                .filter(|p| p.is_present())
                .ok_or_else(|| not_found("proxy", proxy_id))?;
            let during = match status {
                ProxyStatus::Offline => ProxyStatus::Stopping,
                _ => ProxyStatus::Progress,
            };
            proxy.change(
                self.settle_after,
                |p| p.status = during.as_str().to_string(),
                |p| p.status = status.as_str().to_string(),
            );
            Ok(state.request_id())
        })
    }

    async fn delete_l4_proxy(&self, zone_id: &str, proxy_id: &str) -> ApiResult<ApiResponse> {
        self.mutate("DeleteL4Proxy", |state| {
            let key = (zone_id.to_string(), proxy_id.to_string());
            let proxy = state
                .proxies
                .get_mut(&key)
                .filter(|p| p.is_present())
                .ok_or_else(|| not_found("proxy", proxy_id))?;
            if proxy
                .value
                .as_ref()
                .is_some_and(|p| p.status == ProxyStatus::Online.as_str())
            {
                return Err(ProviderError::from_api_code(
                    "OperationDenied",
                    format!("{} must be stopped before deletion", proxy_id),
                ));
            }
            proxy.remove(self.settle_after, |_| {});
            Ok(state.request_id())
        })
    }

    async fn bind_security_template(
        &self,
        request: &BindSecurityTemplateRequest,
    ) -> ApiResult<ApiResponse> {
        self.mutate("BindSecurityTemplateToEntity", |state| {
            state
                .batch_sizes
                .entry("BindSecurityTemplateToEntity".to_string())
                .or_default()
                .push(request.entities.len());
            let key = (request.zone_id.clone(), request.template_id.clone());
            let bindings = state
                .templates
                .get_mut(&key)
                .ok_or_else(|| not_found("template", &request.template_id))?;
            for entity in &request.entities {
                match request.operate {
                    BindOperation::Bind => {
                        if bindings.get(entity).is_some_and(Tracked::is_present) {
                            continue;
                        }
                        let settled = if self.failing_entities.contains(entity) {
                            "fail"
                        } else {
                            "online"
                        };
                        let binding = TemplateBinding {
                            entity: entity.clone(),
                            status: "process".to_string(),
                        };
                        let ready = TemplateBinding {
                            status: settled.to_string(),
                            ..binding.clone()
                        };
                        let tracked = Tracked::created(
                            binding,
                            ready,
                            self.settle_after,
                            self.visibility_lag,
                        );
                        bindings.insert(entity.clone(), tracked);
                    },
                    BindOperation::Unbind => {
                        if let Some(binding) = bindings.get_mut(entity) {
                            binding.remove(self.settle_after, |b| {
                                b.status = "unbinding".to_string()
                            });
                        }
                    },
                }
            }
            Ok(state.request_id())
        })
    }

    async fn describe_security_template_bindings(
        &self,
        zone_id: &str,
        template_id: &str,
    ) -> Result<Option<Vec<TemplateBinding>>, ProviderError> {
        let mut state = self.begin("DescribeSecurityTemplateBindings", false)?;
        let key = (zone_id.to_string(), template_id.to_string());
        let bindings = state
            .templates
            .get_mut(&key)
            .map(|bindings| bindings.values_mut().filter_map(Tracked::observe).collect());
        Ok(bindings)
    }
}

/// A test harness for provider implementations.
///
/// Wraps a [`ProviderService`] and adds lifecycle helpers that chain the
/// individual calls the way a host would.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.resource_types()
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), ProviderError> {
        self.provider.configure(config).await
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), ProviderError> {
        self.provider
            .validate_resource_config(resource_type, config)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Run a full create lifecycle: validate → create → read.
    ///
    /// Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let created = self.create(resource_type, config).await?;
        self.read_existing(resource_type, created).await
    }

    /// Run a full update lifecycle: validate → update → read.
    ///
    /// Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        self.validate_resource_config(resource_type, proposed_state.clone())
            .await?;
        let updated = self
            .update(resource_type, prior_state, proposed_state)
            .await?;
        self.read_existing(resource_type, updated).await
    }

    /// Run a full delete lifecycle: delete → read, which must find nothing.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.delete(resource_type, current_state.clone()).await?;
        match self.read(resource_type, current_state).await? {
            None => Ok(()),
            Some(state) => Err(ProviderError::Api {
                code: "Test.StillPresent".to_string(),
                message: format!("{} still exists after delete: {}", resource_type, state),
            }),
        }
    }

    /// Run a full CRUD lifecycle: create → read → update → read → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: impl FnOnce(Value) -> Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let proposed = updated_config(created.clone());
        let updated = self
            .lifecycle_update(resource_type, created, proposed)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }

    async fn read_existing(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.read(resource_type, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("{} vanished after apply", resource_type))
        })
    }
}

/// Assert that an error belongs to the given class.
///
/// # Panics
///
/// Panics if the class differs.
pub fn assert_error_class(err: &ProviderError, class: ErrorClass) {
    assert_eq!(
        err.class(),
        class,
        "Expected a {:?} error, but got {:?}: {}",
        class,
        err.class(),
        err
    );
}
