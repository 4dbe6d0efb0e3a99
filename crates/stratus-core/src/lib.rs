//! Core types for the stratus orchestrator.
//!
//! This crate provides the foundational vocabulary shared by every other
//! stratus crate:
//!
//! - **Identifiers**: vendor service codes, strongly typed by resource kind
//! - **Status types**: the contract/resource status axes and wait targets
//!
//! # Example
//!
//! ```
//! use stratus_core::{ResourceId, ResourceKind, StatusTarget, ContractStatus, ResourceStatus};
//!
//! // Parse a service code; the kind is decided once, from the prefix.
//! let id: ResourceId = "ivm00012345".parse().unwrap();
//! assert_eq!(id.kind(), ResourceKind::VirtualServer);
//!
//! // A wait target may wildcard either axis.
//! let target = StatusTarget::new(Some(ContractStatus::InService), Some(ResourceStatus::Stopped));
//! assert!(!target.is_wildcard());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod status;

pub use ids::{IdError, ResourceId, ResourceKind, StorageClass};
pub use status::{ContractStatus, ResourceStatus, StatusPair, StatusTarget, UnknownStatus};
