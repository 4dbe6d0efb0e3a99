//! Resource lifecycle orchestration for stratus.
//!
//! This crate turns the asynchronous, acknowledge-then-converge control
//! plane exposed by [`stratus_api`] into synchronous-feeling lifecycles:
//! every mutating operation is driven to a settled status before the
//! next one starts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Orchestrators                          │
//! │  VirtualServers  LoadBalancers  SystemStorages  DataStorages │
//! │  PrivateNetworks GlobalAddresses StorageArchives             │
//! └──────────────────────────────────────────────────────────────┘
//!          │ per-resource create / read / update / delete / find
//!          ▼
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐
//! │ StatusPoller │  │  PowerGate   │  │  select() over listings  │
//! │ (wait until  │  │ (batch power │  │  (filters, patterns,     │
//! │  converged)  │  │  cycles)     │  │   recency tie-break)     │
//! └──────────────┘  └──────────────┘  └──────────────────────────┘
//!          │
//!          ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │            ControlPlane trait  (invoke + get_status)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use stratus_api::{ApiConfig, ControlPlane, HttpControlPlane};
//! use stratus_control::{VirtualServers, VmSpec};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::from_env().ok_or("missing credentials")?;
//! let account = config.account_code.clone();
//! let client: Arc<dyn ControlPlane> = Arc::new(HttpControlPlane::new(config));
//!
//! let servers = VirtualServers::new(client, account);
//! let spec = VmSpec {
//!     machine_type: "VB0-1".to_string(),
//!     os_type: "Linux".to_string(),
//!     server_group: None,
//!     label: Some("web-1".to_string()),
//!     system_storage: Some("iba00000001".parse()?),
//!     data_storage: Vec::new(),
//!     private_network: Vec::new(),
//!     enable_global_ip: true,
//! };
//! let created = servers.create(&spec).await?;
//! println!("provisioned {}", created.id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod address;
pub mod archive;
pub mod error;
pub mod loadbalancer;
pub mod network;
pub mod poller;
pub mod reconcile;
pub mod selector;
pub mod server;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use address::GlobalAddresses;
pub use archive::StorageArchives;
pub use error::{ControlError, ProvisionError, Result, SelectError};
pub use loadbalancer::{LoadBalancers, LB_DEADLINE};
pub use network::PrivateNetworks;
pub use poller::{StatusPoller, DEFAULT_DEADLINE, DEFAULT_POLL_INTERVAL};
pub use reconcile::PowerGate;
pub use selector::{select, FieldValue, Filter, Selectable, RECENCY_SENTINEL};
pub use server::VirtualServers;
pub use storage::{DataStorages, SystemStorages};
pub use types::{
    ArchiveSpec, ArchiveState, AttachedNetwork, AttachedStorage, CreatedVm, DataStorageSpec,
    DataStorageState, FilterRule, GlobalAddressSpec, GlobalAddressState, ImageSummary, IpAddress,
    LbHost, LbSpec, LbState, LegAddressing, NetworkKind, NetworkLeg, PrivateNetworkSpec,
    PrivateNetworkState, StaticRoute, StorageSummary, SystemStorageSpec, SystemStorageState,
    TrafficIp, TrafficIpState, VmSpec, VmState, VmSummary,
};

// Re-export the identifier/status vocabulary alongside the orchestrators.
pub use stratus_core::{
    ContractStatus, ResourceId, ResourceKind, ResourceStatus, StatusPair, StatusTarget,
    StorageClass,
};
