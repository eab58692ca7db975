//! TEO Provider
//!
//! Infrastructure-as-code resources for Tencent Cloud EdgeOne (TEO): zones,
//! acceleration domains, layer-4 proxies and security template bindings.
//!
//! # Overview
//!
//! Every TEO mutation is accepted immediately but takes effect
//! asynchronously. Each lifecycle handler therefore follows one protocol:
//! issue the mutation, then poll the object until it reaches a target status
//! or a failure status, or until the time budget runs out.
//!
//! - **[`retry`]**: bounded retry loop distinguishing retryable from fatal
//!   outcomes.
//! - **[`poller`]**: polls a describe call until a [`ConvergenceRequest`] is
//!   satisfied.
//! - **[`converge`]**: mutation followed by polling under one shared deadline.
//! - **[`batch`]**: the same, applied chunk by chunk to long target lists.
//! - **[`resources`]**: the lifecycle handlers built on top.
//! - **[`provider`]**: the [`ProviderService`] surface a plugin host drives.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use teo_provider::{init_logging, ProviderService, TeoProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = TeoProvider::new(Arc::new(MyTeoClient::from_env()?));
//!     provider.configure(serde_json::json!({"region": "ap-guangzhou"})).await?;
//!
//!     let state = provider
//!         .create("tencentcloud_teo_l4_proxy", serde_json::json!({
//!             "zone_id": "zone-2o0i41pv2h8c",
//!             "proxy_name": "game",
//!             "area": "overseas"
//!         }))
//!         .await?;
//!     tracing::info!(proxy_id = %state["proxy_id"], "proxy online");
//!     Ok(())
//! }
//! ```
//!
//! # Status Handling
//!
//! Each resource kind has a closed status enum whose variants are classified
//! as transient, settled or failed (see [`status`]). A failed status ends the
//! wait at once with [`ProviderError::FatalStatus`]; a status string outside
//! the enum is rejected as [`ProviderError::UnexpectedStatus`].

#![warn(missing_docs)]
#![warn(clippy::all)]

#[allow(missing_docs)]
pub mod api;
pub mod batch;
pub mod config;
pub mod converge;
pub mod error;
pub mod logging;
pub mod poller;
pub mod provider;
#[allow(missing_docs)]
pub mod resources;
pub mod retry;
pub mod status;
pub mod testing;
pub mod types;

// Re-export main types at crate root
pub use api::TeoApi;
pub use batch::{apply_in_batches, DEFAULT_BATCH_SIZE};
pub use config::{ProviderConfig, Timeouts};
pub use converge::{converge, converge_created, Applied};
pub use error::{ErrorClass, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use poller::{poll, Absence, ConvergenceRequest, Converged};
pub use provider::{ProviderService, TeoProvider};
pub use status::{
    BindingStatus, DomainStatus, Observation, ProxyStatus, RemoteStatus, StatusClass, ZoneStatus,
};
pub use types::{ImportedResource, ResourceKind};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tonic;
pub use tracing;
