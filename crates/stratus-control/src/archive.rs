//! Storage archive lifecycles and custom OS image lookup.
//!
//! An account carries at most one archive contract; custom OS images
//! live inside it, so image lookup first resolves the contract and then
//! searches its image listing.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use stratus_api::ControlPlane;
use stratus_core::{ContractStatus, ResourceId, StatusTarget};

use crate::error::{ControlError, ProvisionError, Result, SelectError};
use crate::poller::StatusPoller;
use crate::selector::{select, Filter};
use crate::types::{decode, parse_id, require_str, ArchiveSpec, ArchiveState, ImageSummary};

/// Orchestrates storage archive lifecycles.
pub struct StorageArchives {
    client: Arc<dyn ControlPlane>,
    account: String,
    poller: StatusPoller,
}

impl StorageArchives {
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

    /// Contract an archive of `spec.archive_size`.
    ///
    /// # Errors
    ///
    /// A failure after allocation carries the allocated identifier; no
    /// rollback is attempted.
    pub async fn create(&self, spec: &ArchiveSpec) -> std::result::Result<ResourceId, ProvisionError> {
        tracing::info!(size = %spec.archive_size, "allocating storage archive");
        let body = self
            .client
            .invoke(
                "StorageArchiveAdd",
                json!({
                    "gis_service_code": self.account,
                    "archive_size": spec.archive_size,
                }),
            )
            .await
            .map_err(|err| ProvisionError::before_allocation(err.into()))?;
        let code = require_str("StorageArchiveAdd", &body, "service_code")
            .map_err(ProvisionError::before_allocation)?;
        let id = parse_id("StorageArchiveAdd", &code).map_err(ProvisionError::before_allocation)?;

        match self.settle(&id).await {
            Ok(()) => {
                tracing::info!(%id, "storage archive provisioned");
                Ok(id)
            }
            Err(source) => Err(ProvisionError::after_allocation(id, source)),
        }
    }

    /// Snapshot the archive's observed state.
    ///
    /// # Errors
    ///
    /// Transport and decode failures.
    pub async fn read(&self, id: &ResourceId) -> Result<ArchiveState> {
        let body = self
            .client
            .invoke(
                "StorageArchiveGet",
                json!({
                    "gis_service_code": self.account,
                    "iar_service_code": id.as_str(),
                }),
            )
            .await?;
        let wire: ArchiveGetResponse = decode("StorageArchiveGet", &body)?;
        Ok(ArchiveState {
            archive_size: wire.archive_size,
        })
    }

    /// Reconcile the archive toward `desired`, resizing it on drift.
    ///
    /// # Errors
    ///
    /// Transport and timeout failures.
    pub async fn update(
        &self,
        id: &ResourceId,
        observed: &mut ArchiveState,
        desired: &ArchiveSpec,
    ) -> Result<()> {
        if desired.archive_size != observed.archive_size {
            tracing::info!(
                %id,
                from = %observed.archive_size,
                to = %desired.archive_size,
                "resizing storage archive"
            );
            self.client
                .invoke(
                    "StorageArchiveSizeChange",
                    json!({
                        "gis_service_code": self.account,
                        "iar_service_code": id.as_str(),
                        "archive_size": desired.archive_size,
                    }),
                )
                .await?;
            self.settle(id).await?;
            observed.archive_size.clone_from(&desired.archive_size);
        }
        Ok(())
    }

    /// Cancel the archive contract.
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        tracing::info!(%id, "cancelling storage archive");
        self.client
            .invoke(
                "StorageArchiveCancel",
                json!({
                    "gis_service_code": self.account,
                    "iar_service_code": id.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    /// Resolve exactly one custom OS image from the account's archive.
    ///
    /// Filterable fields: `os_type`, `image_id` and `type` by equality,
    /// `label` by pattern. Recency is the archiving timestamp.
    ///
    /// # Errors
    ///
    /// [`ControlError::NoArchiveContract`] when the account has no
    /// archive, [`SelectError`] variants wrapped in
    /// [`ControlError::Select`], plus transport and decode failures.
    pub async fn find_image(
        &self,
        direct_id: Option<&str>,
        filters: &[Filter],
        most_recent: bool,
    ) -> Result<ImageSummary> {
        if direct_id.is_none() && filters.is_empty() {
            return Err(SelectError::EmptyQuery.into());
        }

        let body = self
            .client
            .invoke(
                "P2PUBContractGetForSA",
                json!({ "gis_service_code": self.account }),
            )
            .await?;
        let contract: ContractResponse = decode("P2PUBContractGetForSA", &body)?;
        let archive = contract.storage_archive.service_code;
        if archive.is_empty() {
            return Err(ControlError::NoArchiveContract);
        }

        let body = self
            .client
            .invoke(
                "CustomOSImageListGet",
                json!({
                    "gis_service_code": self.account,
                    "iar_service_code": archive,
                }),
            )
            .await?;
        let listing: ImageListResponse = decode("CustomOSImageListGet", &body)?;
        let images: Vec<ImageSummary> = listing.image_list.into_iter().map(Into::into).collect();
        let picked = select(&images, direct_id, filters, most_recent)?;
        Ok(picked.clone())
    }

    async fn settle(&self, id: &ResourceId) -> Result<()> {
        self.poller
            .wait(
                self.client.as_ref(),
                id,
                StatusTarget::contract_only(ContractStatus::InService),
            )
            .await
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveGetResponse {
    #[serde(default)]
    archive_size: String,
}

#[derive(Debug, Deserialize, Default)]
struct ArchiveContractWire {
    #[serde(default)]
    service_code: String,
}

#[derive(Debug, Deserialize)]
struct ContractResponse {
    #[serde(default)]
    storage_archive: ArchiveContractWire,
}

#[derive(Debug, Deserialize)]
struct ImageWire {
    image_id: String,
    #[serde(default)]
    os_type: String,
    #[serde(default)]
    label: String,
    #[serde(rename = "type", default)]
    image_type: String,
    #[serde(default)]
    archived_at: String,
    #[serde(default)]
    source_service_code: String,
    #[serde(default)]
    image_size: String,
}

impl From<ImageWire> for ImageSummary {
    fn from(wire: ImageWire) -> Self {
        Self {
            image_id: wire.image_id,
            os_type: wire.os_type,
            label: wire.label,
            image_type: wire.image_type,
            archived_at: wire.archived_at,
            source_service_code: wire.source_service_code,
            image_size: wire.image_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageListResponse {
    #[serde(default)]
    image_list: Vec<ImageWire>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;
    use stratus_core::{ContractStatus, ResourceStatus, StatusPair};

    const ACCOUNT: &str = "gis00000001";

    fn in_service_plane() -> Arc<MockControlPlane> {
        Arc::new(MockControlPlane::new(StatusPair::new(
            ContractStatus::InService,
            ResourceStatus::Initialized,
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn resize_fires_only_on_drift() {
        let plane = in_service_plane();
        let id: ResourceId = "iar00000001".parse().unwrap();
        let archives = StorageArchives::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT);
        let mut observed = ArchiveState {
            archive_size: "100GB".into(),
        };

        let same = ArchiveSpec {
            archive_size: "100GB".into(),
        };
        archives.update(&id, &mut observed, &same).await.unwrap();
        assert!(plane.calls().is_empty());

        let grown = ArchiveSpec {
            archive_size: "500GB".into(),
        };
        archives.update(&id, &mut observed, &grown).await.unwrap();
        assert_eq!(plane.call_sequence(), ["StorageArchiveSizeChange"]);
        assert_eq!(observed.archive_size, "500GB");
    }

    #[tokio::test(start_paused = true)]
    async fn image_lookup_resolves_the_archive_contract_first() {
        let plane = in_service_plane();
        plane.queue_response(
            "P2PUBContractGetForSA",
            json!({ "storage_archive": { "service_code": "iar00000001" } }),
        );
        plane.queue_response(
            "CustomOSImageListGet",
            json!({
                "image_list": [
                    { "image_id": "1", "os_type": "Linux", "label": "base",
                      "type": "Custom", "archived_at": "2019-08-01 10:00:00",
                      "source_service_code": "iba00000001", "image_size": "30" },
                    { "image_id": "2", "os_type": "Linux", "label": "base",
                      "type": "Custom", "archived_at": "2019-06-01 10:00:00",
                      "source_service_code": "iba00000001", "image_size": "30" },
                ],
            }),
        );

        let picked = StorageArchives::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .find_image(None, &[Filter::new("label", "^base$")], true)
            .await
            .unwrap();

        assert_eq!(picked.image_id, "2");
        assert_eq!(
            plane.calls_for("CustomOSImageListGet")[0]["iar_service_code"],
            "iar00000001"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_archive_contract_is_its_own_error() {
        let plane = in_service_plane();
        plane.queue_response(
            "P2PUBContractGetForSA",
            json!({ "storage_archive": { "service_code": "" } }),
        );

        let err = StorageArchives::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .find_image(Some("1"), &[], false)
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::NoArchiveContract));
    }
}
