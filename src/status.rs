//! Status enums for remote objects.
//!
//! Each resource kind has its own closed set of statuses. Every variant maps
//! to exactly one [`StatusClass`], which the poller uses to decide whether a
//! non-target status means "keep waiting" or "stop, this failed". Raw API
//! strings are matched exactly and case-sensitively.

use std::fmt;

use crate::error::ProviderError;

/// How a status behaves while converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The backend is still working; another transition is expected.
    Transient,
    /// Terminal and healthy. May or may not be the target of a given wait.
    Settled,
    /// Terminal and failed. Polling stops when observed.
    Failed,
}

/// A closed enum of statuses for one kind of remote object.
pub trait RemoteStatus:
    Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    /// The exact string the API uses for this status.
    fn as_str(self) -> &'static str;

    /// The class of this status.
    fn class(self) -> StatusClass;

    /// Parse a raw API string. Returns `None` for unknown values.
    fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == raw)
    }

    /// Shorthand for `class() == StatusClass::Failed`.
    fn is_fatal(self) -> bool {
        self.class() == StatusClass::Failed
    }
}

/// Parse `raw` for the object `id`, failing with
/// [`ProviderError::UnexpectedStatus`] on unknown values.
pub fn parse_status<S: RemoteStatus>(id: &str, raw: &str) -> Result<S, ProviderError> {
    S::parse(raw).ok_or_else(|| ProviderError::UnexpectedStatus {
        id: id.to_string(),
        status: raw.to_string(),
    })
}

/// Result of one describe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation<S> {
    /// The object exists and reports this status.
    Found(S),
    /// The object is not visible (not yet created, or deleted).
    Absent,
}

impl<S: RemoteStatus> Observation<S> {
    /// Label used in logs and timeout errors.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Found(s) => s.as_str(),
            Self::Absent => "absent",
        }
    }
}

/// Write a status list as `a|b|c`.
pub(crate) fn join_statuses<S: RemoteStatus>(statuses: &[S]) -> String {
    if statuses.is_empty() {
        return "absent".to_string();
    }
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("|")
}

/// Status of a site (zone).
///
/// The API reports pausing as a separate flag; the zone resource folds that
/// flag into [`ZoneStatus::Paused`] when observing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneStatus {
    /// Being provisioned.
    Initializing,
    /// Created, waiting for ownership verification or NS delegation.
    Pending,
    /// Serving traffic.
    Active,
    /// Taken out of service by the owner.
    Paused,
    /// Taken over by another account.
    Moved,
    /// Disabled by the platform.
    Deactivated,
}

impl RemoteStatus for ZoneStatus {
    const ALL: &'static [Self] = &[
        Self::Initializing,
        Self::Pending,
        Self::Active,
        Self::Paused,
        Self::Moved,
        Self::Deactivated,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Moved => "moved",
            Self::Deactivated => "deactivated",
        }
    }

    fn class(self) -> StatusClass {
        match self {
            Self::Initializing => StatusClass::Transient,
            Self::Pending | Self::Active | Self::Paused => StatusClass::Settled,
            Self::Moved | Self::Deactivated => StatusClass::Failed,
        }
    }
}

/// Status of an acceleration domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainStatus {
    /// Accepting traffic.
    Online,
    /// Not accepting traffic.
    Offline,
    /// A configuration change is being deployed.
    Process,
    /// Just created, not yet deployed.
    Init,
    /// Blocked by the platform.
    Forbidden,
}

impl RemoteStatus for DomainStatus {
    const ALL: &'static [Self] = &[
        Self::Online,
        Self::Offline,
        Self::Process,
        Self::Init,
        Self::Forbidden,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Process => "process",
            Self::Init => "init",
            Self::Forbidden => "forbidden",
        }
    }

    fn class(self) -> StatusClass {
        match self {
            Self::Online | Self::Offline => StatusClass::Settled,
            Self::Process | Self::Init => StatusClass::Transient,
            Self::Forbidden => StatusClass::Failed,
        }
    }
}

/// Status of an L4 proxy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyStatus {
    /// Running.
    Online,
    /// Stopped.
    Offline,
    /// Deploying.
    Progress,
    /// Shutting down.
    Stopping,
    /// Deployment failed.
    Fail,
}

impl RemoteStatus for ProxyStatus {
    const ALL: &'static [Self] = &[
        Self::Online,
        Self::Offline,
        Self::Progress,
        Self::Stopping,
        Self::Fail,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Progress => "progress",
            Self::Stopping => "stopping",
            Self::Fail => "fail",
        }
    }

    fn class(self) -> StatusClass {
        match self {
            Self::Online | Self::Offline => StatusClass::Settled,
            Self::Progress | Self::Stopping => StatusClass::Transient,
            Self::Fail => StatusClass::Failed,
        }
    }
}

/// Status of a security template bound to one entity (host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingStatus {
    /// The template is in effect for the entity.
    Online,
    /// The binding is being applied.
    Process,
    /// The binding is being removed.
    Unbinding,
    /// The binding could not be applied.
    Fail,
}

impl RemoteStatus for BindingStatus {
    const ALL: &'static [Self] = &[Self::Online, Self::Process, Self::Unbinding, Self::Fail];

    fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Process => "process",
            Self::Unbinding => "unbinding",
            Self::Fail => "fail",
        }
    }

    fn class(self) -> StatusClass {
        match self {
            Self::Online => StatusClass::Settled,
            Self::Process | Self::Unbinding => StatusClass::Transient,
            Self::Fail => StatusClass::Failed,
        }
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
