//! Virtual server lifecycle.
//!
//! Provisioning is a strict sequence: allocate the contract, wait for it
//! to settle stopped, then label, boot device, data devices, private
//! networks, address assignment, and finally power-on when the server has
//! a boot device. Every attachment is acknowledged asynchronously, so
//! each one is followed by a wait for the server to settle again before
//! the next is issued.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use stratus_api::ControlPlane;
use stratus_core::{ResourceId, ResourceKind, ResourceStatus, StatusTarget};

use crate::error::{ControlError, ProvisionError, Result, SelectError};
use crate::poller::StatusPoller;
use crate::reconcile::{power, PowerGate};
use crate::selector::{select, Filter};
use crate::types::{
    decode, is_yes, parse_id, require_str, AttachedNetwork, AttachedStorage, CreatedVm, IpAddress,
    NetworkKind, VmSpec, VmState, VmSummary,
};

/// Orchestrates virtual server lifecycles.
pub struct VirtualServers {
    client: Arc<dyn ControlPlane>,
    account: String,
    poller: StatusPoller,
}

impl VirtualServers {
    /// Create an orchestrator scoped to `account`.
    pub fn new(client: Arc<dyn ControlPlane>, account: impl Into<String>) -> Self {
        Self {
            client,
            account: account.into(),
            poller: StatusPoller::default(),
        }
    }

    /// Override the convergence poller.
    #[must_use]
    pub const fn with_poller(mut self, poller: StatusPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Provision a server from `spec`.
    ///
    /// # Errors
    ///
    /// Malformed specs are rejected before the first remote call. A
    /// failure after allocation carries the allocated identifier in the
    /// returned [`ProvisionError`] so the caller can record the
    /// partially provisioned server; no rollback is attempted.
    pub async fn create(&self, spec: &VmSpec) -> std::result::Result<CreatedVm, ProvisionError> {
        validate_spec(spec).map_err(ProvisionError::before_allocation)?;

        let mut params = json!({
            "gis_service_code": self.account,
            "type": spec.machine_type,
            "os_type": spec.os_type,
        });
        if let Some(group) = &spec.server_group {
            params["server_group"] = Value::String(group.clone());
        }

        tracing::info!(machine_type = %spec.machine_type, "allocating virtual server");
        let body = self
            .client
            .invoke("VMAdd", params)
            .await
            .map_err(|err| ProvisionError::before_allocation(err.into()))?;
        let code = require_str("VMAdd", &body, "service_code")
            .map_err(ProvisionError::before_allocation)?;
        let id = parse_id("VMAdd", &code).map_err(ProvisionError::before_allocation)?;

        match self.provision(&id, spec, &body).await {
            Ok(ssh_host) => {
                tracing::info!(%id, "virtual server provisioned");
                Ok(CreatedVm { id, ssh_host })
            }
            Err(source) => Err(ProvisionError::after_allocation(id, source)),
        }
    }

    /// Everything after allocation, in order.
    async fn provision(
        &self,
        id: &ResourceId,
        spec: &VmSpec,
        add_body: &Value,
    ) -> Result<Option<String>> {
        self.wait_stopped(id).await?;

        if let Some(label) = &spec.label {
            if !label.is_empty() {
                self.set_label(id, label).await?;
            }
        }

        if let Some(storage) = &spec.system_storage {
            self.attach_boot_device(id, storage).await?;
        }

        for storage in &spec.data_storage {
            self.attach_data_device(id, storage).await?;
        }

        for network in &spec.private_network {
            self.connect_private_network(id, network).await?;
        }

        let ssh_host = if spec.enable_global_ip {
            Some(self.allocate_global_ip(id).await?)
        } else {
            first_private_standard_address(add_body)
        };

        if spec.bootable() {
            power(self.client.as_ref(), &self.poller, &self.account, id, true).await?;
        }

        Ok(ssh_host)
    }

    /// Snapshot the server's observed state.
    ///
    /// # Errors
    ///
    /// Transport and decode failures.
    pub async fn read(&self, id: &ResourceId) -> Result<VmState> {
        let body = self
            .client
            .invoke(
                "VMGet",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                }),
            )
            .await?;
        let wire: VmGetResponse = decode("VMGet", &body)?;
        Ok(wire.into_state())
    }

    /// Reconcile the server toward `desired`.
    ///
    /// Fields are applied in a fixed order: label first (the server can
    /// stay running for it), then plan change, boot device, data-device
    /// set, private-network set and global address, each behind a shared
    /// power gate; the server is restarted at the end only if the gate
    /// fired and the desired state is bootable. Each applied field is
    /// written back to `observed` immediately, so a partial failure
    /// leaves the already committed fields visible and a re-invocation
    /// only touches what is left.
    ///
    /// The raw storage and network lists in `observed` go stale once an
    /// attachment changes; re-read before reconciling again.
    ///
    /// # Errors
    ///
    /// Transport, timeout and decode failures; the power restore is
    /// skipped when a field fails.
    pub async fn update(
        &self,
        id: &ResourceId,
        observed: &mut VmState,
        desired: &VmSpec,
    ) -> Result<()> {
        let mut gate = PowerGate::new();

        if desired.label != observed.label {
            let label = desired.label.clone().unwrap_or_default();
            self.set_label(id, &label).await?;
            observed.label.clone_from(&desired.label);
        }

        if desired.machine_type != observed.machine_type {
            tracing::debug!(%id, plan = %desired.machine_type, "changing server plan");
            self.gate_off(&mut gate, id).await?;
            self.client
                .invoke(
                    "VMItemChange",
                    json!({
                        "gis_service_code": self.account,
                        "ivm_service_code": id.as_str(),
                        "type": desired.machine_type,
                    }),
                )
                .await?;
            self.wait_stopped(id).await?;
            observed.machine_type.clone_from(&desired.machine_type);
        }

        if desired.system_storage != observed.system_storage {
            tracing::debug!(%id, "swapping boot device");
            self.gate_off(&mut gate, id).await?;
            self.detach_boot_device(id).await?;
            if let Some(storage) = &desired.system_storage {
                self.attach_boot_device(id, storage).await?;
            }
            observed.system_storage.clone_from(&desired.system_storage);
        }

        if !same_set(&desired.data_storage, &observed.data_storage) {
            tracing::debug!(%id, "reconfiguring data devices");
            self.gate_off(&mut gate, id).await?;
            for entry in &observed.storages {
                if !entry.boot {
                    self.detach_data_device_slot(id, &entry.pci_slot).await?;
                }
            }
            for storage in &desired.data_storage {
                self.attach_data_device(id, storage).await?;
            }
            observed.data_storage.clone_from(&desired.data_storage);
        }

        if !same_set(&desired.private_network, &observed.private_network) {
            tracing::debug!(%id, "reconfiguring private networks");
            self.gate_off(&mut gate, id).await?;
            for nic in &observed.networks {
                if nic.network_type == NetworkKind::Private {
                    self.disconnect_private_network(id, &nic.mac_address).await?;
                }
            }
            for network in &desired.private_network {
                self.connect_private_network(id, network).await?;
            }
            observed.private_network.clone_from(&desired.private_network);
        }

        if desired.enable_global_ip != observed.enable_global_ip {
            self.gate_off(&mut gate, id).await?;
            if desired.enable_global_ip {
                self.allocate_global_ip(id).await?;
            } else {
                self.release_global_ip(id).await?;
            }
            observed.enable_global_ip = desired.enable_global_ip;
        }

        gate.restore(
            self.client.as_ref(),
            &self.poller,
            &self.account,
            id,
            desired.bootable(),
        )
        .await
    }

    /// Cancel the server contract.
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        tracing::info!(%id, "cancelling virtual server");
        self.client
            .invoke(
                "VMCancel",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    /// Resolve exactly one server from the account-wide listing.
    ///
    /// Filterable fields: `os_type`, `category` and `type` by equality,
    /// `label` by pattern. Recency is the contract start date.
    ///
    /// # Errors
    ///
    /// [`SelectError`] variants wrapped in [`ControlError::Select`], plus
    /// transport and decode failures from the listing call.
    pub async fn find(
        &self,
        direct_id: Option<&str>,
        filters: &[Filter],
        most_recent: bool,
    ) -> Result<VmSummary> {
        if direct_id.is_none() && filters.is_empty() {
            return Err(SelectError::EmptyQuery.into());
        }
        let body = self
            .client
            .invoke("VMListGet", json!({ "gis_service_code": self.account }))
            .await?;
        let listing: VmListResponse = decode("VMListGet", &body)?;
        let summaries: Vec<VmSummary> = listing
            .virtual_server_list
            .into_iter()
            .map(Into::into)
            .collect();
        let picked = select(&summaries, direct_id, filters, most_recent)?;
        Ok(picked.clone())
    }

    async fn gate_off(&self, gate: &mut PowerGate, id: &ResourceId) -> Result<()> {
        gate.ensure_off(self.client.as_ref(), &self.poller, &self.account, id)
            .await
    }

    async fn wait_stopped(&self, id: &ResourceId) -> Result<()> {
        self.poller
            .wait(
                self.client.as_ref(),
                id,
                StatusTarget::in_service(ResourceStatus::Stopped),
            )
            .await
    }

    async fn set_label(&self, id: &ResourceId, label: &str) -> Result<()> {
        self.client
            .invoke(
                "VMLabelSet",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                    "name": label,
                }),
            )
            .await?;
        Ok(())
    }

    async fn attach_boot_device(&self, id: &ResourceId, storage: &ResourceId) -> Result<()> {
        self.client
            .invoke(
                "BootDeviceStorageConnect",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                    (storage_parameter(storage, "boot device")?): storage.as_str(),
                }),
            )
            .await?;
        self.wait_stopped(id).await
    }

    async fn detach_boot_device(&self, id: &ResourceId) -> Result<()> {
        self.client
            .invoke(
                "BootDeviceStorageDisconnect",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                }),
            )
            .await?;
        self.wait_stopped(id).await
    }

    async fn attach_data_device(&self, id: &ResourceId, storage: &ResourceId) -> Result<()> {
        self.client
            .invoke(
                "DataDeviceStorageConnect",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                    (storage_parameter(storage, "data device")?): storage.as_str(),
                }),
            )
            .await?;
        self.wait_stopped(id).await
    }

    async fn detach_data_device_slot(&self, id: &ResourceId, pci_slot: &str) -> Result<()> {
        self.client
            .invoke(
                "DataDeviceStorageDisconnect",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                    "pci_slot": pci_slot,
                }),
            )
            .await?;
        self.wait_stopped(id).await
    }

    async fn connect_private_network(&self, id: &ResourceId, network: &ResourceId) -> Result<()> {
        self.client
            .invoke(
                "PrivateNetworkConnect",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                    "ivl_service_code": network.as_str(),
                }),
            )
            .await?;
        self.wait_stopped(id).await
    }

    async fn disconnect_private_network(&self, id: &ResourceId, mac: &str) -> Result<()> {
        self.client
            .invoke(
                "PrivateNetworkDisconnect",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                    "mac_address": mac,
                }),
            )
            .await?;
        self.wait_stopped(id).await
    }

    async fn allocate_global_ip(&self, id: &ResourceId) -> Result<String> {
        let body = self
            .client
            .invoke(
                "GlobalAddressAllocate",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                }),
            )
            .await?;
        self.wait_stopped(id).await?;
        require_str("GlobalAddressAllocate", &body, "ip_address")
    }

    async fn release_global_ip(&self, id: &ResourceId) -> Result<()> {
        self.client
            .invoke(
                "GlobalAddressRelease",
                json!({
                    "gis_service_code": self.account,
                    "ivm_service_code": id.as_str(),
                }),
            )
            .await?;
        self.wait_stopped(id).await
    }
}

/// Reject malformed attachments before any remote call.
fn validate_spec(spec: &VmSpec) -> Result<()> {
    if let Some(storage) = &spec.system_storage {
        if storage.kind() != ResourceKind::SystemStorage {
            return Err(ControlError::InvalidSpec {
                what: "system storage",
                message: format!("{storage} is not a system storage contract"),
            });
        }
    }
    for storage in &spec.data_storage {
        storage_parameter(storage, "data device")?;
    }
    for network in &spec.private_network {
        if network.kind() != ResourceKind::PrivateNetwork {
            return Err(ControlError::InvalidSpec {
                what: "private network",
                message: format!("{network} is not a private network contract"),
            });
        }
    }
    Ok(())
}

/// Wire parameter a storage attachment is keyed by.
fn storage_parameter(storage: &ResourceId, what: &'static str) -> Result<&'static str> {
    storage
        .storage_class()
        .map(|class| class.parameter())
        .ok_or_else(|| ControlError::InvalidSpec {
            what,
            message: format!("{storage} is not a storage contract"),
        })
}

/// Order-insensitive attachment comparison.
fn same_set(a: &[ResourceId], b: &[ResourceId]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&str> = a.iter().map(ResourceId::as_str).collect();
    let mut b: Vec<&str> = b.iter().map(ResourceId::as_str).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// The address provisioning hands back when no global address is
/// requested: the first address on the standard private segment.
fn first_private_standard_address(body: &Value) -> Option<String> {
    body.get("network_list")?
        .as_array()?
        .iter()
        .find(|nic| nic.get("network_type").and_then(Value::as_str) == Some("PrivateStandard"))?
        .get("ip_address_list")?
        .as_array()?
        .first()?
        .get("ipv4_address")?
        .as_str()
        .map(str::to_owned)
}

#[derive(Debug, Deserialize, Default)]
struct ServerSpecWire {
    #[serde(default)]
    cpu: String,
    #[serde(default)]
    memory: String,
}

#[derive(Debug, Deserialize)]
struct StorageEntryWire {
    #[serde(default)]
    boot: String,
    #[serde(default)]
    pci_slot: String,
    #[serde(default)]
    service_code: String,
    #[serde(default)]
    os_type: String,
    #[serde(rename = "type", default)]
    storage_type: String,
}

#[derive(Debug, Deserialize)]
struct NetworkEntryWire {
    #[serde(default)]
    mac_address: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    service_code: String,
    network_type: NetworkKind,
    #[serde(default)]
    ipv6_enabled: String,
    #[serde(default)]
    ip_address_list: Vec<IpAddress>,
}

#[derive(Debug, Deserialize)]
struct VmGetResponse {
    #[serde(rename = "type")]
    machine_type: String,
    #[serde(default)]
    os_type: String,
    #[serde(default)]
    server_group: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    server_spec: ServerSpecWire,
    #[serde(default)]
    storage_list: Vec<StorageEntryWire>,
    #[serde(default)]
    network_list: Vec<NetworkEntryWire>,
}

impl VmGetResponse {
    fn into_state(self) -> VmState {
        let storages: Vec<AttachedStorage> = self
            .storage_list
            .into_iter()
            .map(|entry| AttachedStorage {
                boot: is_yes(&entry.boot),
                pci_slot: entry.pci_slot,
                service_code: entry.service_code,
                os_type: entry.os_type,
                storage_type: entry.storage_type,
            })
            .collect();
        let networks: Vec<AttachedNetwork> = self
            .network_list
            .into_iter()
            .map(|entry| AttachedNetwork {
                mac_address: entry.mac_address,
                label: entry.label,
                service_code: entry.service_code,
                network_type: entry.network_type,
                ipv6_enabled: entry.ipv6_enabled,
                ip_addresses: entry.ip_address_list,
            })
            .collect();

        let system_storage = storages
            .iter()
            .find(|entry| entry.boot)
            .and_then(|entry| entry.service_code.parse().ok());
        let data_storage = storages
            .iter()
            .filter(|entry| !entry.boot)
            .filter_map(|entry| entry.service_code.parse().ok())
            .collect();
        let private_network = networks
            .iter()
            .filter(|nic| nic.network_type == NetworkKind::Private)
            .filter_map(|nic| nic.service_code.parse().ok())
            .collect();
        let enable_global_ip = networks
            .iter()
            .any(|nic| nic.network_type == NetworkKind::Global);

        VmState {
            machine_type: self.machine_type,
            os_type: self.os_type,
            server_group: self.server_group,
            label: (!self.label.is_empty()).then_some(self.label),
            category: self.category,
            cpu: self.server_spec.cpu,
            memory: self.server_spec.memory,
            system_storage,
            data_storage,
            private_network,
            enable_global_ip,
            storages,
            networks,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VmSummaryWire {
    service_code: String,
    #[serde(default)]
    os_type: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    category: String,
    #[serde(rename = "type", default)]
    machine_type: String,
    #[serde(default)]
    start_date: String,
}

impl From<VmSummaryWire> for VmSummary {
    fn from(wire: VmSummaryWire) -> Self {
        Self {
            service_code: wire.service_code,
            os_type: wire.os_type,
            label: wire.label,
            category: wire.category,
            machine_type: wire.machine_type,
            start_date: wire.start_date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VmListResponse {
    #[serde(default)]
    virtual_server_list: Vec<VmSummaryWire>,
}
