//! Strongly-typed resource identifiers.
//!
//! Every resource the control plane manages is addressed by an opaque
//! *service code* whose textual prefix names the resource kind (for
//! example `ivm…` for a virtual server, `ifl…` for a load balancer).
//! The prefix is inspected exactly once, when a [`ResourceId`] is parsed;
//! after that the kind travels as a tag and is never re-derived from the
//! string at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when parsing a service code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// The service code was empty.
    #[error("empty service code")]
    Empty,

    /// The service code prefix does not name a known resource kind.
    #[error("unknown service code prefix: {0}")]
    UnknownPrefix(String),
}

/// The kind of a managed resource, derived from its service code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A virtual server (`ivm`).
    VirtualServer,
    /// A bootable system storage volume (`iba`, `ica`).
    SystemStorage,
    /// An additional data storage volume (`ibg`, `ibb`, `icg`, `icb`).
    AdditionalStorage,
    /// A private network segment (`ivl`).
    PrivateNetwork,
    /// A firewall/load-balancer appliance (`ifl`).
    LoadBalancer,
    /// A storage archive contract (`iar`).
    StorageArchive,
    /// A global IP address contract (`iga`).
    GlobalIpAddress,
}

impl ResourceKind {
    /// Derive the kind from a service code prefix.
    #[must_use]
    pub fn from_prefix(code: &str) -> Option<Self> {
        let prefix = code.get(..3)?;
        match prefix {
            "ivm" => Some(Self::VirtualServer),
            "iba" | "ica" => Some(Self::SystemStorage),
            "ibg" | "ibb" | "icg" | "icb" => Some(Self::AdditionalStorage),
            "ivl" => Some(Self::PrivateNetwork),
            "ifl" => Some(Self::LoadBalancer),
            "iar" => Some(Self::StorageArchive),
            "iga" => Some(Self::GlobalIpAddress),
            _ => None,
        }
    }

    /// The control-plane operation that reports this kind's status pair.
    #[must_use]
    pub const fn status_operation(self) -> &'static str {
        match self {
            Self::VirtualServer => "VMGet",
            Self::SystemStorage => "SystemStorageGet",
            Self::AdditionalStorage => "StorageGet",
            Self::PrivateNetwork => "PrivateNetworkVGet",
            Self::LoadBalancer => "FwLbGet",
            Self::StorageArchive => "StorageArchiveGet",
            Self::GlobalIpAddress => "GlobalAddressVGet",
        }
    }

    /// The parameter name carrying this kind's service code in API calls.
    #[must_use]
    pub const fn code_parameter(self) -> &'static str {
        match self {
            Self::VirtualServer => "ivm_service_code",
            Self::SystemStorage => "iba_service_code",
            Self::AdditionalStorage => "storage_service_code",
            Self::PrivateNetwork => "ivl_service_code",
            Self::LoadBalancer => "ifl_service_code",
            Self::StorageArchive => "iar_service_code",
            Self::GlobalIpAddress => "iga_service_code",
        }
    }
}

/// The device class of a storage service code.
///
/// The control plane keys attach requests by the storage contract family,
/// so the class picks the parameter name used in connect calls. Decided at
/// parse time alongside [`ResourceKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    /// `iba`: system storage, standard family.
    Iba,
    /// `ica`: system storage, custom-image family.
    Ica,
    /// `ibg`: additional storage, standard family.
    Ibg,
    /// `ibb`: additional storage, bulk family.
    Ibb,
    /// `icg`: additional storage, custom standard family.
    Icg,
    /// `icb`: additional storage, custom bulk family.
    Icb,
}

impl StorageClass {
    fn from_prefix(code: &str) -> Option<Self> {
        match code.get(..3)? {
            "iba" => Some(Self::Iba),
            "ica" => Some(Self::Ica),
            "ibg" => Some(Self::Ibg),
            "ibb" => Some(Self::Ibb),
            "icg" => Some(Self::Icg),
            "icb" => Some(Self::Icb),
            _ => None,
        }
    }

    /// The parameter name carrying this class's service code in connect
    /// calls.
    #[must_use]
    pub const fn parameter(self) -> &'static str {
        match self {
            Self::Iba => "iba_service_code",
            Self::Ica => "ica_service_code",
            Self::Ibg => "ibg_service_code",
            Self::Ibb => "ibb_service_code",
            Self::Icg => "icg_service_code",
            Self::Icb => "icb_service_code",
        }
    }
}

/// A vendor-assigned service code identifying one managed resource.
///
/// Assigned once by the control plane at allocation and immutable
/// thereafter. The kind tag is fixed at parse time.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    code: String,
    kind: ResourceKind,
}

impl ResourceId {
    /// Parse a service code, deciding the kind from its prefix.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Empty`] for an empty string and
    /// [`IdError::UnknownPrefix`] when the prefix names no known kind.
    pub fn parse(code: &str) -> Result<Self, IdError> {
        if code.is_empty() {
            return Err(IdError::Empty);
        }
        let kind =
            ResourceKind::from_prefix(code).ok_or_else(|| IdError::UnknownPrefix(code.into()))?;
        Ok(Self {
            code: code.to_string(),
            kind,
        })
    }

    /// The raw service code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// The resource kind decided at parse time.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The storage device class, for storage service codes.
    ///
    /// Returns `None` for non-storage kinds.
    #[must_use]
    pub fn storage_class(&self) -> Option<StorageClass> {
        match self.kind {
            ResourceKind::SystemStorage | ResourceKind::AdditionalStorage => {
                StorageClass::from_prefix(&self.code)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.code)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl FromStr for ResourceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.code
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.code
    }
}
