//! System and data storage lifecycles.
//!
//! System storages are boot devices and carry guest credentials; the
//! control plane applies a credential while the device is attached only
//! if the owning server is powered off, so credential changes borrow the
//! power gate of the attached server. Data storages are plain block
//! devices with a much smaller surface.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use stratus_api::ControlPlane;
use stratus_core::{ResourceId, ResourceStatus, StatusTarget};

use crate::error::{ControlError, ProvisionError, Result, SelectError};
use crate::poller::StatusPoller;
use crate::reconcile::PowerGate;
use crate::selector::{select, Filter};
use crate::types::{
    decode, parse_id, require_str, yes_no, DataStorageSpec, DataStorageState, StorageSummary,
    SystemStorageSpec, SystemStorageState,
};

/// Orchestrates system storage (boot device) lifecycles.
pub struct SystemStorages {
    client: Arc<dyn ControlPlane>,
    account: String,
    poller: StatusPoller,
}

impl SystemStorages {
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

    /// Provision a boot device from `spec`.
    ///
    /// Credentials are applied one by one after the device settles; each
    /// credential call re-converges on whatever attach status the device
    /// currently has.
    ///
    /// # Errors
    ///
    /// A failure after allocation carries the allocated identifier; no
    /// rollback is attempted.
    pub async fn create(
        &self,
        spec: &SystemStorageSpec,
    ) -> std::result::Result<ResourceId, ProvisionError> {
        let mut params = json!({
            "gis_service_code": self.account,
            "type": spec.storage_type,
        });
        if let Some(group) = &spec.storage_group {
            params["storage_group"] = Value::String(group.clone());
        }

        tracing::info!(plan = %spec.storage_type, "allocating system storage");
        let body = self
            .client
            .invoke("SystemStorageAdd", params)
            .await
            .map_err(|err| ProvisionError::before_allocation(err.into()))?;
        let code = require_str("SystemStorageAdd", &body, "service_code")
            .map_err(ProvisionError::before_allocation)?;
        let id = parse_id("SystemStorageAdd", &code).map_err(ProvisionError::before_allocation)?;

        match self.provision(&id, spec).await {
            Ok(()) => {
                tracing::info!(%id, "system storage provisioned");
                Ok(id)
            }
            Err(source) => Err(ProvisionError::after_allocation(id, source)),
        }
    }

    async fn provision(&self, id: &ResourceId, spec: &SystemStorageSpec) -> Result<()> {
        self.wait_for(id, ResourceStatus::NotAttached).await?;

        if let Some(label) = &spec.label {
            if !label.is_empty() {
                self.set_label(id, label).await?;
            }
        }
        if let Some(key) = &spec.root_ssh_key {
            if !key.is_empty() {
                self.apply_credential(id, "PublicKeyAdd", "public_key", key)
                    .await?;
            }
        }
        if let Some(password) = &spec.root_password {
            if !password.is_empty() {
                self.apply_credential(id, "PasswordSet", "password", password)
                    .await?;
            }
        }
        if let Some(data) = &spec.user_data {
            self.apply_credential(id, "UserDataSet", "user_data", data)
                .await?;
        }
        Ok(())
    }

    /// Snapshot the device's observed state.
    ///
    /// The credential mirror fields stay `None`; the control plane never
    /// reads credentials back.
    ///
    /// # Errors
    ///
    /// Transport and decode failures.
    pub async fn read(&self, id: &ResourceId) -> Result<SystemStorageState> {
        let body = self
            .client
            .invoke(
                "SystemStorageGet",
                json!({
                    "gis_service_code": self.account,
                    "iba_service_code": id.as_str(),
                }),
            )
            .await?;
        let wire: SystemStorageGetResponse = decode("SystemStorageGet", &body)?;
        Ok(wire.into_state())
    }

    /// Reconcile the device toward `desired`.
    ///
    /// The label is applied freely. Credential changes on an attached
    /// device power the owning server off first, at most once, and power
    /// it back on at the end; a detached device takes credentials
    /// directly. Each applied field is written back to `observed`.
    /// Clearing a credential has no remote form: the control plane only
    /// exposes set operations, so a field dropped from `desired` is
    /// committed locally and the device keeps its last value.
    ///
    /// # Errors
    ///
    /// Transport and timeout failures; the power restore is skipped when
    /// a field fails.
    pub async fn update(
        &self,
        id: &ResourceId,
        observed: &mut SystemStorageState,
        desired: &SystemStorageSpec,
    ) -> Result<()> {
        let mut gate = PowerGate::new();
        let attached_server = observed.attached_server.clone();

        if desired.label != observed.label {
            let label = desired.label.clone().unwrap_or_default();
            self.set_label(id, &label).await?;
            observed.label.clone_from(&desired.label);
        }

        // Credentials can only be set, never unset; a `None` drift is
        // committed without a call.
        if desired.root_ssh_key != observed.root_ssh_key {
            if let Some(key) = &desired.root_ssh_key {
                self.gate_off(&mut gate, attached_server.as_ref()).await?;
                self.apply_credential(id, "PublicKeyAdd", "public_key", key)
                    .await?;
            }
            observed.root_ssh_key.clone_from(&desired.root_ssh_key);
        }

        if desired.root_password != observed.root_password {
            if let Some(password) = &desired.root_password {
                self.gate_off(&mut gate, attached_server.as_ref()).await?;
                self.apply_credential(id, "PasswordSet", "password", password)
                    .await?;
            }
            observed.root_password.clone_from(&desired.root_password);
        }

        if desired.user_data != observed.user_data {
            if let Some(data) = &desired.user_data {
                self.gate_off(&mut gate, attached_server.as_ref()).await?;
                self.apply_credential(id, "UserDataSet", "user_data", data)
                    .await?;
            }
            observed.user_data.clone_from(&desired.user_data);
        }

        if let Some(server) = &attached_server {
            gate.restore(
                self.client.as_ref(),
                &self.poller,
                &self.account,
                server,
                true,
            )
            .await?;
        }
        Ok(())
    }

    /// Cancel the device contract, waiting for it to be detached first.
    ///
    /// # Errors
    ///
    /// Transport and timeout failures.
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.wait_for(id, ResourceStatus::NotAttached).await?;
        tracing::info!(%id, "cancelling system storage");
        self.client
            .invoke(
                "SystemStorageCancel",
                json!({
                    "gis_service_code": self.account,
                    "iba_service_code": id.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    /// Resolve exactly one device from the account-wide listing.
    ///
    /// Filterable fields: `os_type` and `type` by equality, `label` by
    /// pattern. Recency is the contract start date.
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
    ) -> Result<StorageSummary> {
        if direct_id.is_none() && filters.is_empty() {
            return Err(SelectError::EmptyQuery.into());
        }
        let body = self
            .client
            .invoke(
                "SystemStorageListGet",
                json!({ "gis_service_code": self.account }),
            )
            .await?;
        let listing: SystemStorageListResponse = decode("SystemStorageListGet", &body)?;
        let summaries: Vec<StorageSummary> = listing
            .system_storage_list
            .into_iter()
            .map(Into::into)
            .collect();
        let picked = select(&summaries, direct_id, filters, most_recent)?;
        Ok(picked.clone())
    }

    /// Power the attached server off, once, when there is one; detached
    /// devices take credentials without any power dance.
    async fn gate_off(&self, gate: &mut PowerGate, server: Option<&ResourceId>) -> Result<()> {
        if let Some(server) = server {
            gate.ensure_off(self.client.as_ref(), &self.poller, &self.account, server)
                .await?;
        }
        Ok(())
    }

    /// Apply one credential and re-converge on the device's current
    /// attach status.
    async fn apply_credential(
        &self,
        id: &ResourceId,
        operation: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let observed = self.client.get_status(id).await?;
        let settle = if observed.resource == ResourceStatus::Attached {
            ResourceStatus::Attached
        } else {
            ResourceStatus::NotAttached
        };

        self.client
            .invoke(
                operation,
                json!({
                    "gis_service_code": self.account,
                    "iba_service_code": id.as_str(),
                    (key): value,
                }),
            )
            .await?;
        self.wait_for(id, settle).await
    }

    async fn wait_for(&self, id: &ResourceId, resource: ResourceStatus) -> Result<()> {
        self.poller
            .wait(
                self.client.as_ref(),
                id,
                StatusTarget::in_service(resource),
            )
            .await
    }

    async fn set_label(&self, id: &ResourceId, label: &str) -> Result<()> {
        self.client
            .invoke(
                "SystemStorageLabelSet",
                json!({
                    "gis_service_code": self.account,
                    "iba_service_code": id.as_str(),
                    "name": label,
                }),
            )
            .await?;
        Ok(())
    }
}

/// Orchestrates data storage (additional device) lifecycles.
pub struct DataStorages {
    client: Arc<dyn ControlPlane>,
    account: String,
    poller: StatusPoller,
}

impl DataStorages {
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

    /// Provision a data device from `spec`.
    ///
    /// Only the extended plans take the encryption parameter; asking for
    /// encryption on a classic plan is rejected before the first remote
    /// call.
    ///
    /// # Errors
    ///
    /// A failure after allocation carries the allocated identifier; no
    /// rollback is attempted.
    pub async fn create(
        &self,
        spec: &DataStorageSpec,
    ) -> std::result::Result<ResourceId, ProvisionError> {
        if spec.encrypted && !spec.extended() {
            return Err(ProvisionError::before_allocation(
                ControlError::InvalidSpec {
                    what: "data storage",
                    message: format!("plan {} cannot be encrypted", spec.storage_type),
                },
            ));
        }

        let mut params = json!({
            "gis_service_code": self.account,
            "type": spec.storage_type,
        });
        if let Some(group) = &spec.storage_group {
            params["storage_group"] = Value::String(group.clone());
        }
        if spec.extended() {
            params["encryption"] = Value::String(yes_no(spec.encrypted).to_owned());
        }

        tracing::info!(plan = %spec.storage_type, "allocating data storage");
        let body = self
            .client
            .invoke("StorageAdd", params)
            .await
            .map_err(|err| ProvisionError::before_allocation(err.into()))?;
        let code = require_str("StorageAdd", &body, "service_code")
            .map_err(ProvisionError::before_allocation)?;
        let id = parse_id("StorageAdd", &code).map_err(ProvisionError::before_allocation)?;

        match self.finish(&id, spec).await {
            Ok(()) => {
                tracing::info!(%id, "data storage provisioned");
                Ok(id)
            }
            Err(source) => Err(ProvisionError::after_allocation(id, source)),
        }
    }

    async fn finish(&self, id: &ResourceId, spec: &DataStorageSpec) -> Result<()> {
        self.poller
            .wait(
                self.client.as_ref(),
                id,
                StatusTarget::in_service(ResourceStatus::NotAttached),
            )
            .await?;
        if let Some(label) = &spec.label {
            if !label.is_empty() {
                self.set_label(id, label).await?;
            }
        }
        Ok(())
    }

    /// Snapshot the device's observed state.
    ///
    /// # Errors
    ///
    /// Transport and decode failures.
    pub async fn read(&self, id: &ResourceId) -> Result<DataStorageState> {
        let body = self
            .client
            .invoke(
                "StorageGet",
                json!({
                    "gis_service_code": self.account,
                    "storage_service_code": id.as_str(),
                }),
            )
            .await?;
        let wire: StorageGetResponse = decode("StorageGet", &body)?;
        Ok(wire.into_state())
    }

    /// Reconcile the device toward `desired`.
    ///
    /// Only the label can change after provisioning.
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn update(
        &self,
        id: &ResourceId,
        observed: &mut DataStorageState,
        desired: &DataStorageSpec,
    ) -> Result<()> {
        if desired.label != observed.label {
            let label = desired.label.clone().unwrap_or_default();
            self.set_label(id, &label).await?;
            observed.label.clone_from(&desired.label);
        }
        Ok(())
    }

    /// Cancel the device contract, waiting for it to be detached first.
    ///
    /// # Errors
    ///
    /// Transport and timeout failures.
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.poller
            .wait(
                self.client.as_ref(),
                id,
                StatusTarget::in_service(ResourceStatus::NotAttached),
            )
            .await?;
        tracing::info!(%id, "cancelling data storage");
        self.client
            .invoke(
                "StorageCancel",
                json!({
                    "gis_service_code": self.account,
                    "storage_service_code": id.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    /// Resolve exactly one device from the account-wide listing.
    ///
    /// Filterable fields: `os_type` and `type` by equality, `label` by
    /// pattern. Recency is the contract start date.
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
    ) -> Result<StorageSummary> {
        if direct_id.is_none() && filters.is_empty() {
            return Err(SelectError::EmptyQuery.into());
        }
        let body = self
            .client
            .invoke("StorageListGet", json!({ "gis_service_code": self.account }))
            .await?;
        let listing: StorageListResponse = decode("StorageListGet", &body)?;
        let summaries: Vec<StorageSummary> = listing
            .additional_storage_list
            .into_iter()
            .map(Into::into)
            .collect();
        let picked = select(&summaries, direct_id, filters, most_recent)?;
        Ok(picked.clone())
    }

    async fn set_label(&self, id: &ResourceId, label: &str) -> Result<()> {
        self.client
            .invoke(
                "StorageLabelSet",
                json!({
                    "gis_service_code": self.account,
                    "storage_service_code": id.as_str(),
                    "name": label,
                }),
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct AttachedServerWire {
    #[serde(default)]
    service_code: String,
}

#[derive(Debug, Deserialize)]
struct SystemStorageGetResponse {
    #[serde(rename = "type")]
    storage_type: String,
    #[serde(default)]
    storage_group: String,
    #[serde(default)]
    os_type: String,
    #[serde(default)]
    storage_size: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    attached_virtual_server: AttachedServerWire,
}

impl SystemStorageGetResponse {
    fn into_state(self) -> SystemStorageState {
        SystemStorageState {
            storage_type: self.storage_type,
            storage_group: self.storage_group,
            os_type: self.os_type,
            storage_size: self.storage_size,
            label: (!self.label.is_empty()).then_some(self.label),
            attached_server: self.attached_virtual_server.service_code.parse().ok(),
            root_ssh_key: None,
            root_password: None,
            user_data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StorageGetResponse {
    #[serde(rename = "type")]
    storage_type: String,
    #[serde(default)]
    storage_group: String,
    #[serde(default)]
    os_type: String,
    #[serde(default)]
    storage_size: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    mode: String,
    #[serde(default)]
    encryption: Option<String>,
}

impl StorageGetResponse {
    fn into_state(self) -> DataStorageState {
        DataStorageState {
            storage_type: self.storage_type,
            storage_group: self.storage_group,
            os_type: self.os_type,
            storage_size: self.storage_size,
            label: (!self.label.is_empty()).then_some(self.label),
            mode: self.mode,
            encryption: self.encryption,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StorageSummaryWire {
    service_code: String,
    #[serde(default)]
    os_type: String,
    #[serde(default)]
    label: String,
    #[serde(rename = "type", default)]
    storage_type: String,
    #[serde(default)]
    start_date: String,
}

impl From<StorageSummaryWire> for StorageSummary {
    fn from(wire: StorageSummaryWire) -> Self {
        Self {
            service_code: wire.service_code,
            os_type: wire.os_type,
            label: wire.label,
            storage_type: wire.storage_type,
            start_date: wire.start_date,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SystemStorageListResponse {
    #[serde(default)]
    system_storage_list: Vec<StorageSummaryWire>,
}

#[derive(Debug, Deserialize)]
struct StorageListResponse {
    #[serde(default)]
    additional_storage_list: Vec<StorageSummaryWire>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;
    use stratus_core::{ContractStatus, StatusPair};

    const ACCOUNT: &str = "gis00000001";

    fn detached_plane() -> Arc<MockControlPlane> {
        Arc::new(MockControlPlane::new(StatusPair::new(
            ContractStatus::InService,
            ResourceStatus::NotAttached,
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn system_storage_create_applies_credentials_in_order() {
        let plane = detached_plane();
        plane.queue_response(
            "SystemStorageAdd",
            json!({ "service_code": "iba00000001" }),
        );

        let spec = SystemStorageSpec {
            storage_type: "S30GB_CENTOS7".into(),
            storage_group: None,
            label: Some("boot-1".into()),
            root_ssh_key: Some("ssh-ed25519 AAAA...".into()),
            root_password: Some("hunter2".into()),
            user_data: Some("#cloud-config\n".into()),
        };
        let id = SystemStorages::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .create(&spec)
            .await
            .unwrap();

        assert_eq!(id.as_str(), "iba00000001");
        assert_eq!(
            plane.call_sequence(),
            [
                "SystemStorageAdd",
                "SystemStorageLabelSet",
                "PublicKeyAdd",
                "PasswordSet",
                "UserDataSet",
            ]
        );
        assert_eq!(
            plane.calls_for("PublicKeyAdd")[0]["public_key"],
            "ssh-ed25519 AAAA..."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn credential_change_on_attached_device_cycles_the_server() {
        let plane = Arc::new(MockControlPlane::default());
        plane.set_status_for(
            "iba00000001",
            StatusPair::new(ContractStatus::InService, ResourceStatus::Attached),
        );
        plane.set_status_for(
            "ivm00000009",
            StatusPair::new(ContractStatus::InService, ResourceStatus::Running),
        );

        let id: ResourceId = "iba00000001".parse().unwrap();
        let mut observed = SystemStorageState {
            storage_type: "S30GB_CENTOS7".into(),
            storage_group: String::new(),
            os_type: "Linux".into(),
            storage_size: "30GB".into(),
            label: Some("boot-1".into()),
            attached_server: Some("ivm00000009".parse().unwrap()),
            root_ssh_key: None,
            root_password: Some("old".into()),
            user_data: None,
        };
        let desired = SystemStorageSpec {
            storage_type: "S30GB_CENTOS7".into(),
            storage_group: None,
            label: Some("boot-1".into()),
            root_ssh_key: None,
            root_password: Some("new".into()),
            user_data: None,
        };

        SystemStorages::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .update(&id, &mut observed, &desired)
            .await
            .unwrap();

        assert_eq!(plane.call_sequence(), ["VMPower", "PasswordSet", "VMPower"]);
        let powers = plane.calls_for("VMPower");
        assert_eq!(powers[0]["power"], "Off");
        assert_eq!(powers[0]["ivm_service_code"], "ivm00000009");
        assert_eq!(powers[1]["power"], "On");
        assert_eq!(observed.root_password.as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn detached_device_takes_credentials_without_power_calls() {
        let plane = detached_plane();
        let id: ResourceId = "iba00000001".parse().unwrap();
        let mut observed = SystemStorageState {
            storage_type: "S30GB_CENTOS7".into(),
            storage_group: String::new(),
            os_type: "Linux".into(),
            storage_size: "30GB".into(),
            label: None,
            attached_server: None,
            root_ssh_key: None,
            root_password: None,
            user_data: None,
        };
        let desired = SystemStorageSpec {
            storage_type: "S30GB_CENTOS7".into(),
            storage_group: None,
            label: None,
            root_ssh_key: Some("ssh-ed25519 BBBB...".into()),
            root_password: None,
            user_data: None,
        };

        SystemStorages::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .update(&id, &mut observed, &desired)
            .await
            .unwrap();

        assert_eq!(plane.call_sequence(), ["PublicKeyAdd"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_credential_is_committed_without_a_call() {
        let plane = detached_plane();
        let id: ResourceId = "iba00000001".parse().unwrap();
        let mut observed = SystemStorageState {
            storage_type: "S30GB_CENTOS7".into(),
            storage_group: String::new(),
            os_type: "Linux".into(),
            storage_size: "30GB".into(),
            label: None,
            attached_server: None,
            root_ssh_key: None,
            root_password: Some("old".into()),
            user_data: None,
        };
        let desired = SystemStorageSpec {
            storage_type: "S30GB_CENTOS7".into(),
            storage_group: None,
            label: None,
            root_ssh_key: None,
            root_password: None,
            user_data: None,
        };

        SystemStorages::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .update(&id, &mut observed, &desired)
            .await
            .unwrap();

        // No unset operation exists, so the drift settles locally.
        assert!(plane.calls().is_empty());
        assert_eq!(observed.root_password, None);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_for_detachment_first() {
        let plane = detached_plane();
        plane.script_statuses(vec![StatusPair::new(
            ContractStatus::InService,
            ResourceStatus::Attached,
        )]);
        let id: ResourceId = "iba00000001".parse().unwrap();

        SystemStorages::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .delete(&id)
            .await
            .unwrap();

        assert_eq!(plane.call_sequence(), ["SystemStorageCancel"]);
        assert_eq!(plane.status_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn encrypted_classic_plan_is_rejected_before_any_call() {
        let plane = detached_plane();
        let spec = DataStorageSpec {
            storage_type: "B100GB".into(),
            storage_group: None,
            label: None,
            encrypted: true,
        };

        let err = DataStorages::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .create(&spec)
            .await
            .unwrap_err();

        assert!(err.id.is_none());
        assert!(plane.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn extended_plan_sends_the_encryption_parameter() {
        let plane = detached_plane();
        plane.queue_response("StorageAdd", json!({ "service_code": "ibg00000001" }));

        let spec = DataStorageSpec {
            storage_type: "BX002GB".into(),
            storage_group: None,
            label: None,
            encrypted: true,
        };
        DataStorages::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .create(&spec)
            .await
            .unwrap();

        assert_eq!(plane.calls_for("StorageAdd")[0]["encryption"], "Yes");
    }

    #[tokio::test(start_paused = true)]
    async fn find_uses_the_additional_storage_listing() {
        let plane = detached_plane();
        plane.queue_response(
            "StorageListGet",
            json!({
                "additional_storage_list": [
                    { "service_code": "ibg00000001", "os_type": "",
                      "label": "scratch", "type": "B100GB",
                      "start_date": "2019-05-01" },
                ],
            }),
        );

        let picked = DataStorages::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .find(None, &[Filter::new("label", "^scratch$")], false)
            .await
            .unwrap();

        assert_eq!(picked.service_code, "ibg00000001");
    }
}
