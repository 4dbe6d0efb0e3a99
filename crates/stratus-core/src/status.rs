//! Contract and resource status vocabulary.
//!
//! The control plane acknowledges every mutating call immediately and
//! converges in the background, so callers observe two independent status
//! axes: the *contract* status (billing/subscription lifecycle) and the
//! *resource* status (operational lifecycle). A wait target may wildcard
//! either axis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The billing/subscription lifecycle state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    /// The contract is being prepared and the resource is not yet usable.
    InPreparation,
    /// The contract is active.
    InService,
}

/// The operational lifecycle state of a resource.
///
/// The set is kind-specific: servers report `Stopped`/`Running`, appliances
/// report `Initialized`/`Configuring`/`Configured`/…, storage volumes
/// report `Attached`/`NotAttached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// Provisioned but never configured.
    Initialized,
    /// Transitioning to `Running`.
    Starting,
    /// Powered off.
    Stopped,
    /// Powered on and serving.
    Running,
    /// A configuration change is being applied.
    Configuring,
    /// Configuration has converged.
    Configured,
    /// Administratively locked.
    Locked,
    /// A contract change is being applied.
    Updating,
    /// Attached to a virtual server.
    Attached,
    /// Not attached to any virtual server.
    NotAttached,
}

macro_rules! status_strings {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $ty {
            /// The control plane's wire word for this status.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(Self::$variant),)+
                    other => Err(UnknownStatus(other.to_string())),
                }
            }
        }
    };
}

status_strings!(ContractStatus { InPreparation, InService });
status_strings!(ResourceStatus {
    Initialized,
    Starting,
    Stopped,
    Running,
    Configuring,
    Configured,
    Locked,
    Updating,
    Attached,
    NotAttached,
});

/// A status word the vocabulary does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// One observed (contract, resource) status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPair {
    /// The contract status axis.
    pub contract: ContractStatus,
    /// The resource status axis.
    pub resource: ResourceStatus,
}

impl StatusPair {
    /// Construct a snapshot.
    #[must_use]
    pub const fn new(contract: ContractStatus, resource: ResourceStatus) -> Self {
        Self { contract, resource }
    }
}

impl fmt::Display for StatusPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.contract, self.resource)
    }
}

/// A wait target: each axis is compared independently, `None` always
/// matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTarget {
    /// Required contract status, or `None` to ignore the axis.
    pub contract: Option<ContractStatus>,
    /// Required resource status, or `None` to ignore the axis.
    pub resource: Option<ResourceStatus>,
}

impl StatusTarget {
    /// Construct a target from per-axis requirements.
    #[must_use]
    pub const fn new(contract: Option<ContractStatus>, resource: Option<ResourceStatus>) -> Self {
        Self { contract, resource }
    }

    /// A target requiring `InService` plus the given resource status.
    #[must_use]
    pub const fn in_service(resource: ResourceStatus) -> Self {
        Self::new(Some(ContractStatus::InService), Some(resource))
    }

    /// A target constraining only the contract axis.
    #[must_use]
    pub const fn contract_only(contract: ContractStatus) -> Self {
        Self::new(Some(contract), None)
    }

    /// Whether both axes are wildcards (matches any snapshot).
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.contract.is_none() && self.resource.is_none()
    }

    /// Whether the snapshot satisfies both axes.
    #[must_use]
    pub fn matches(&self, observed: StatusPair) -> bool {
        self.contract.is_none_or(|c| c == observed.contract)
            && self.resource.is_none_or(|r| r == observed.resource)
    }
}

impl fmt::Display for StatusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let contract = self.contract.map_or("*", ContractStatus::as_str);
        let resource = self.resource.map_or("*", ResourceStatus::as_str);
        write!(f, "{contract}/{resource}")
    }
}
