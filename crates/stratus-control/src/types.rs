//! Desired-state and observed-state models for every resource kind.
//!
//! Spec types describe what the caller wants and are deserializable from
//! JSON; state types are snapshots decoded from control-plane responses.
//! Reconciliation diffs a spec against a state, so both sides carry the
//! linkage fields (boot device, data devices, networks, global address)
//! in the same shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use stratus_core::ResourceId;

use crate::error::{ControlError, Result};
use crate::selector::{FieldValue, Selectable};

/// Which kind of network a NIC or load-balancer leg sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkKind {
    /// The shared global segment.
    Global,
    /// The account's standard private segment.
    PrivateStandard,
    /// A dedicated private network contract.
    Private,
}

impl NetworkKind {
    /// Wire spelling of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::PrivateStandard => "PrivateStandard",
            Self::Private => "Private",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Virtual servers
// ---------------------------------------------------------------------------

/// Desired state of a virtual server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSpec {
    /// Plan name, e.g. `"VB0-1"`.
    pub machine_type: String,
    /// Guest OS family the plan is provisioned for.
    pub os_type: String,
    /// Optional placement group.
    #[serde(default)]
    pub server_group: Option<String>,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Boot device to attach, when any.
    #[serde(default)]
    pub system_storage: Option<ResourceId>,
    /// Data devices to attach.
    #[serde(default)]
    pub data_storage: Vec<ResourceId>,
    /// Dedicated private networks to connect.
    #[serde(default)]
    pub private_network: Vec<ResourceId>,
    /// Whether to allocate a global address to the server itself.
    #[serde(default)]
    pub enable_global_ip: bool,
}

impl VmSpec {
    /// A server only boots once it has a boot device.
    #[must_use]
    pub const fn bootable(&self) -> bool {
        self.system_storage.is_some()
    }
}

/// An entry of a server's storage list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedStorage {
    /// Whether this device is the boot device.
    pub boot: bool,
    /// PCI slot the device occupies; detach is addressed by slot.
    pub pci_slot: String,
    /// Contract identifier of the device.
    pub service_code: String,
    /// OS family baked onto the device, if any.
    pub os_type: String,
    /// Storage plan name.
    pub storage_type: String,
}

/// An address pair on a NIC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IpAddress {
    /// IPv4 address, empty when unassigned.
    pub ipv4_address: String,
    /// IPv4 assignment type.
    pub ipv4_type: String,
    /// IPv6 address, empty when unassigned.
    pub ipv6_address: String,
    /// IPv6 assignment type.
    pub ipv6_type: String,
}

/// An entry of a server's network list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedNetwork {
    /// MAC address of the NIC; detach is addressed by MAC.
    pub mac_address: String,
    /// NIC label.
    pub label: String,
    /// Contract identifier of the connected network, empty for the
    /// built-in segments.
    pub service_code: String,
    /// Segment kind the NIC sits on.
    pub network_type: NetworkKind,
    /// Wire-level IPv6 toggle.
    pub ipv6_enabled: String,
    /// Addresses assigned to the NIC.
    pub ip_addresses: Vec<IpAddress>,
}

/// Observed state of a virtual server.
///
/// Carries both the raw component lists and the linkage fields derived
/// from them; the derived fields are what reconciliation diffs against a
/// [`VmSpec`], the raw lists are what detach calls are addressed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmState {
    /// Plan name.
    pub machine_type: String,
    /// Guest OS family.
    pub os_type: String,
    /// Placement group.
    pub server_group: String,
    /// Display label.
    pub label: Option<String>,
    /// Plan category.
    pub category: String,
    /// CPU allocation of the plan.
    pub cpu: String,
    /// Memory allocation of the plan.
    pub memory: String,
    /// Attached boot device, derived from the storage list.
    pub system_storage: Option<ResourceId>,
    /// Attached data devices, derived from the storage list.
    pub data_storage: Vec<ResourceId>,
    /// Connected dedicated private networks, derived from the network
    /// list.
    pub private_network: Vec<ResourceId>,
    /// Whether the server holds a global address.
    pub enable_global_ip: bool,
    /// Full storage list as reported.
    pub storages: Vec<AttachedStorage>,
    /// Full network list as reported.
    pub networks: Vec<AttachedNetwork>,
}

/// Connection metadata handed back from a successful server create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedVm {
    /// The allocated contract identifier.
    pub id: ResourceId,
    /// Address to reach the server at, when one was assigned during
    /// provisioning.
    pub ssh_host: Option<String>,
}

/// A server as it appears in the account-wide listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSummary {
    /// Contract identifier.
    pub service_code: String,
    /// Guest OS family.
    pub os_type: String,
    /// Display label.
    pub label: String,
    /// Plan category.
    pub category: String,
    /// Plan name.
    pub machine_type: String,
    /// Contract start date, used as the recency marker.
    pub start_date: String,
}

impl Selectable for VmSummary {
    fn id(&self) -> &str {
        &self.service_code
    }

    fn recency(&self) -> &str {
        &self.start_date
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "os_type" => Some(FieldValue::Exact(&self.os_type)),
            "label" => Some(FieldValue::Pattern(&self.label)),
            "category" => Some(FieldValue::Exact(&self.category)),
            "type" => Some(FieldValue::Exact(&self.machine_type)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Load balancers
// ---------------------------------------------------------------------------

/// Addressing detail for a load-balancer leg on a dedicated private
/// network, where nothing can be auto-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegAddressing {
    /// Traffic IP address on this leg.
    pub traffic_ip_address: String,
    /// Netmask of the segment.
    pub netmask: String,
    /// Address of the master appliance host.
    pub master_host_address: String,
    /// Address of the slave appliance host.
    pub slave_host_address: String,
}

/// One leg of a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLeg {
    /// Segment kind the leg sits on.
    pub kind: NetworkKind,
    /// Backing network contract, required for `Private` legs.
    #[serde(default)]
    pub service_code: Option<ResourceId>,
    /// Explicit addressing, required for `Private` legs.
    #[serde(default)]
    pub addressing: Option<LegAddressing>,
}

/// A named traffic IP binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficIp {
    /// Binding name.
    pub name: String,
    /// Explicit address; auto-assigned when absent.
    #[serde(default)]
    pub address: Option<String>,
}

/// A firewall filter rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// Source network in `addr/mask` form, or `ANY`.
    pub source_network: String,
    /// Destination network in `addr/mask` form, or `ANY`.
    pub destination_network: String,
    /// Destination port number, or `ANY`.
    pub destination_port: String,
    /// `TCP` or `UDP`.
    pub protocol: String,
    /// `ACCEPT`, `DROP` or `REJECT`.
    pub action: String,
    /// Rule label.
    #[serde(default)]
    pub label: String,
}

/// A static route entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    /// Destination network.
    pub destination: String,
    /// Next-hop gateway address.
    pub gateway: String,
}

/// Desired state of a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbSpec {
    /// Throughput plan, e.g. `"D100M"`.
    pub lb_type: String,
    /// Whether the appliance pair is redundant.
    pub redundant: bool,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Client-facing leg.
    pub external: NetworkLeg,
    /// Server-facing leg.
    pub internal: NetworkLeg,
    /// Traffic IP bindings; at least one is required.
    pub traffic_ips: Vec<TrafficIp>,
    /// Administration panel password to set after setup.
    #[serde(default)]
    pub admin_password: Option<String>,
    /// Inbound filter rules.
    #[serde(default)]
    pub filters_in: Vec<FilterRule>,
    /// Outbound filter rules.
    #[serde(default)]
    pub filters_out: Vec<FilterRule>,
    /// Networks allowed to reach the administration panel.
    #[serde(default)]
    pub admin_allow_networks: Vec<String>,
    /// Static routes.
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
}

/// One appliance host of a load balancer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbHost {
    /// Administration URL of this host.
    pub url: String,
    /// Appliance software version.
    pub version: String,
    /// Whether this host is the master.
    pub master: bool,
    /// External-leg IPv4 address.
    pub external_ipv4_address: String,
    /// External-leg IPv6 address.
    pub external_ipv6_address: String,
    /// Internal-leg IPv4 address.
    pub internal_ipv4_address: String,
}

/// A traffic IP binding as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrafficIpState {
    /// IPv4 binding name.
    pub ipv4_name: String,
    /// IPv4 binding address.
    pub ipv4_address: String,
    /// IPv4 domain name.
    pub ipv4_domainname: String,
    /// IPv6 binding name.
    pub ipv6_name: String,
    /// IPv6 binding address.
    pub ipv6_address: String,
    /// IPv6 domain name.
    pub ipv6_domainname: String,
}

/// Observed state of a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbState {
    /// Throughput plan.
    pub lb_type: String,
    /// Whether the appliance pair is redundant.
    pub redundant: bool,
    /// Display label.
    pub label: Option<String>,
    /// External leg kind.
    pub external_type: NetworkKind,
    /// External leg backing contract, when any.
    pub external_service_code: String,
    /// Internal leg kind.
    pub internal_type: NetworkKind,
    /// Internal leg backing contract, when any.
    pub internal_service_code: String,
    /// Traffic IP address on the internal leg.
    pub internal_traffic_ip_address: String,
    /// Traffic IP bindings.
    pub traffic_ips: Vec<TrafficIpState>,
    /// Appliance hosts.
    pub hosts: Vec<LbHost>,
    /// Inbound filter rules.
    pub filters_in: Vec<FilterRule>,
    /// Outbound filter rules.
    pub filters_out: Vec<FilterRule>,
    /// Administration panel allow list.
    pub admin_allow_networks: Vec<String>,
    /// Static routes last applied by the caller; the control plane does
    /// not report them back.
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
}

// ---------------------------------------------------------------------------
// Storages
// ---------------------------------------------------------------------------

/// Desired state of a system storage (boot device).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStorageSpec {
    /// Storage plan, e.g. `"S30GB_CENTOS7"`.
    pub storage_type: String,
    /// Optional placement group.
    #[serde(default)]
    pub storage_group: Option<String>,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Root account public key to install.
    #[serde(default)]
    pub root_ssh_key: Option<String>,
    /// Root account password to set.
    #[serde(default)]
    pub root_password: Option<String>,
    /// Cloud-init style user data.
    #[serde(default)]
    pub user_data: Option<String>,
}

/// Observed state of a system storage.
///
/// The control plane never reads credentials back; the credential fields
/// here mirror what the caller last applied and are only meaningful when
/// the caller persists this record between reconciliations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStorageState {
    /// Storage plan.
    pub storage_type: String,
    /// Placement group.
    pub storage_group: String,
    /// OS family baked onto the device.
    pub os_type: String,
    /// Device size.
    pub storage_size: String,
    /// Display label.
    pub label: Option<String>,
    /// The server the device is attached to, when attached.
    pub attached_server: Option<ResourceId>,
    /// Last applied root public key.
    #[serde(default)]
    pub root_ssh_key: Option<String>,
    /// Last applied root password.
    #[serde(default)]
    pub root_password: Option<String>,
    /// Last applied user data.
    #[serde(default)]
    pub user_data: Option<String>,
}

/// Desired state of a data storage (additional device).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStorageSpec {
    /// Storage plan, e.g. `"B100GB"` or the extended `"BX..."`/`"GX..."`
    /// plans.
    pub storage_type: String,
    /// Optional placement group.
    #[serde(default)]
    pub storage_group: Option<String>,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Encrypt the device; only honored by the extended plans.
    #[serde(default)]
    pub encrypted: bool,
}

impl DataStorageSpec {
    /// Extended plans carry the encryption parameter; the classic ones
    /// reject it.
    #[must_use]
    pub fn extended(&self) -> bool {
        self.storage_type.starts_with("BX") || self.storage_type.starts_with("GX")
    }
}

/// Observed state of a data storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStorageState {
    /// Storage plan.
    pub storage_type: String,
    /// Placement group.
    pub storage_group: String,
    /// OS family, when formatted.
    pub os_type: String,
    /// Device size.
    pub storage_size: String,
    /// Display label.
    pub label: Option<String>,
    /// Device mode.
    pub mode: String,
    /// Encryption state, reported only for extended plans.
    pub encryption: Option<String>,
}

/// A storage as it appears in the account-wide listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSummary {
    /// Contract identifier.
    pub service_code: String,
    /// OS family.
    pub os_type: String,
    /// Display label.
    pub label: String,
    /// Storage plan.
    pub storage_type: String,
    /// Contract start date, used as the recency marker.
    pub start_date: String,
}

impl Selectable for StorageSummary {
    fn id(&self) -> &str {
        &self.service_code
    }

    fn recency(&self) -> &str {
        &self.start_date
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "os_type" => Some(FieldValue::Exact(&self.os_type)),
            "label" => Some(FieldValue::Pattern(&self.label)),
            "type" => Some(FieldValue::Exact(&self.storage_type)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Private networks, global addresses, archives
// ---------------------------------------------------------------------------

/// Desired state of a dedicated private network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrivateNetworkSpec {
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
}

/// Observed state of a dedicated private network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateNetworkState {
    /// Display label.
    pub label: Option<String>,
    /// Assigned network address.
    pub network_address: String,
}

/// Desired state of a global address contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAddressSpec {
    /// Number of addresses under the contract.
    pub address_count: u32,
}

/// Observed state of a global address contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAddressState {
    /// Number of addresses under the contract.
    pub address_count: u32,
}

/// Desired state of a storage archive contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSpec {
    /// Archive capacity, e.g. `"100GB"`.
    pub archive_size: String,
}

/// Observed state of a storage archive contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveState {
    /// Archive capacity.
    pub archive_size: String,
}

/// A custom OS image stored in the account's archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    /// Image identifier.
    pub image_id: String,
    /// OS family of the imaged device.
    pub os_type: String,
    /// Display label.
    pub label: String,
    /// Image plan.
    pub image_type: String,
    /// Archiving timestamp, used as the recency marker.
    pub archived_at: String,
    /// The device the image was taken from.
    pub source_service_code: String,
    /// Image size.
    pub image_size: String,
}

impl Selectable for ImageSummary {
    fn id(&self) -> &str {
        &self.image_id
    }

    fn recency(&self) -> &str {
        &self.archived_at
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "os_type" => Some(FieldValue::Exact(&self.os_type)),
            "label" => Some(FieldValue::Pattern(&self.label)),
            "image_id" => Some(FieldValue::Exact(&self.image_id)),
            "type" => Some(FieldValue::Exact(&self.image_type)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

/// Deserialize a response body, attributing failures to `operation`.
pub(crate) fn decode<T: DeserializeOwned>(operation: &str, body: &Value) -> Result<T> {
    serde_json::from_value(body.clone()).map_err(|err| ControlError::Decode {
        operation: operation.to_owned(),
        message: err.to_string(),
    })
}

/// Parse a contract identifier out of a response, attributing failures
/// to `operation`.
pub(crate) fn parse_id(operation: &str, code: &str) -> Result<ResourceId> {
    code.parse().map_err(|err| ControlError::Decode {
        operation: operation.to_owned(),
        message: format!("service code {code:?}: {err}"),
    })
}

/// Wire spelling of a boolean flag.
pub(crate) const fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Interpret a wire boolean flag.
pub(crate) fn is_yes(value: &str) -> bool {
    value == "Yes"
}

/// Pull a mandatory string field out of a response body.
pub(crate) fn require_str(operation: &str, body: &Value, key: &str) -> Result<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ControlError::Decode {
            operation: operation.to_owned(),
            message: format!("missing field {key:?}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vm_spec_defaults_leave_attachments_empty() {
        let spec: VmSpec = serde_json::from_value(json!({
            "machine_type": "VB0-1",
            "os_type": "Linux",
        }))
        .unwrap();
        assert!(!spec.bootable());
        assert!(spec.data_storage.is_empty());
        assert!(!spec.enable_global_ip);
    }

    #[test]
    fn extended_plans_carry_encryption() {
        let mut spec: DataStorageSpec = serde_json::from_value(json!({
            "storage_type": "BX002GB",
        }))
        .unwrap();
        assert!(spec.extended());
        spec.storage_type = "B100GB".into();
        assert!(!spec.extended());
    }

    #[test]
    fn require_str_reports_the_missing_key() {
        let body = json!({"service_code": "ivm00000001"});
        assert_eq!(
            require_str("VMAdd", &body, "service_code").unwrap(),
            "ivm00000001"
        );
        let err = require_str("VMAdd", &body, "label").unwrap_err();
        assert!(err.to_string().contains("\"label\""));
    }
}
