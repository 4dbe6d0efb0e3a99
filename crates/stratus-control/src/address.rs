//! Standalone global address block lifecycles.
//!
//! These are routable address blocks contracted on their own, distinct
//! from the per-server global address a virtual server can allocate
//! through its own lifecycle.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use stratus_api::ControlPlane;
use stratus_core::{ContractStatus, ResourceId, StatusTarget};

use crate::error::{ProvisionError, Result};
use crate::poller::StatusPoller;
use crate::types::{decode, parse_id, require_str, GlobalAddressSpec, GlobalAddressState};

/// Orchestrates global address block lifecycles.
pub struct GlobalAddresses {
    client: Arc<dyn ControlPlane>,
    account: String,
    poller: StatusPoller,
}

impl GlobalAddresses {
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

    /// Contract an address block of `spec.address_count` addresses.
    ///
    /// # Errors
    ///
    /// A failure after allocation carries the allocated identifier; no
    /// rollback is attempted.
    pub async fn create(
        &self,
        spec: &GlobalAddressSpec,
    ) -> std::result::Result<ResourceId, ProvisionError> {
        tracing::info!(count = spec.address_count, "allocating global address block");
        let body = self
            .client
            .invoke(
                "GlobalAddressVAdd",
                json!({
                    "gis_service_code": self.account,
                    "address_num": spec.address_count.to_string(),
                }),
            )
            .await
            .map_err(|err| ProvisionError::before_allocation(err.into()))?;
        let code = require_str("GlobalAddressVAdd", &body, "service_code")
            .map_err(ProvisionError::before_allocation)?;
        let id = parse_id("GlobalAddressVAdd", &code).map_err(ProvisionError::before_allocation)?;

        match self.settle(&id).await {
            Ok(()) => {
                tracing::info!(%id, "global address block provisioned");
                Ok(id)
            }
            Err(source) => Err(ProvisionError::after_allocation(id, source)),
        }
    }

    /// Snapshot the block's observed state.
    ///
    /// # Errors
    ///
    /// Transport and decode failures.
    pub async fn read(&self, id: &ResourceId) -> Result<GlobalAddressState> {
        let body = self
            .client
            .invoke(
                "GlobalAddressVGet",
                json!({
                    "gis_service_code": self.account,
                    "iga_service_code": id.as_str(),
                }),
            )
            .await?;
        let wire: GlobalAddressGetResponse = decode("GlobalAddressVGet", &body)?;
        let address_count = wire
            .address_num
            .parse()
            .map_err(|_| crate::error::ControlError::Decode {
                operation: "GlobalAddressVGet".into(),
                message: format!("address_num is not a number: {:?}", wire.address_num),
            })?;
        Ok(GlobalAddressState { address_count })
    }

    /// Reconcile the block toward `desired`, resizing it on drift.
    ///
    /// # Errors
    ///
    /// Transport and timeout failures.
    pub async fn update(
        &self,
        id: &ResourceId,
        observed: &mut GlobalAddressState,
        desired: &GlobalAddressSpec,
    ) -> Result<()> {
        if desired.address_count != observed.address_count {
            tracing::info!(
                %id,
                from = observed.address_count,
                to = desired.address_count,
                "resizing global address block"
            );
            self.client
                .invoke(
                    "GlobalAddressVAddIPAddressNumChange",
                    json!({
                        "gis_service_code": self.account,
                        "iga_service_code": id.as_str(),
                        "address_num": desired.address_count.to_string(),
                    }),
                )
                .await?;
            self.settle(id).await?;
            observed.address_count = desired.address_count;
        }
        Ok(())
    }

    /// Cancel the block contract.
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        tracing::info!(%id, "cancelling global address block");
        self.client
            .invoke(
                "GlobalAddressVCancel",
                json!({
                    "gis_service_code": self.account,
                    "iga_service_code": id.as_str(),
                }),
            )
            .await?;
        Ok(())
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
struct GlobalAddressGetResponse {
    #[serde(default)]
    address_num: String,
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
    async fn create_sends_the_count_as_a_string() {
        let plane = in_service_plane();
        plane.queue_response("GlobalAddressVAdd", json!({ "service_code": "iga00000001" }));

        let id = GlobalAddresses::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .create(&GlobalAddressSpec { address_count: 4 })
            .await
            .unwrap();

        assert_eq!(id.as_str(), "iga00000001");
        assert_eq!(plane.calls_for("GlobalAddressVAdd")[0]["address_num"], "4");
    }

    #[tokio::test(start_paused = true)]
    async fn resize_only_fires_on_drift() {
        let plane = in_service_plane();
        let id: ResourceId = "iga00000001".parse().unwrap();
        let blocks = GlobalAddresses::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT);
        let mut observed = GlobalAddressState { address_count: 4 };

        blocks
            .update(&id, &mut observed, &GlobalAddressSpec { address_count: 4 })
            .await
            .unwrap();
        assert!(plane.calls().is_empty());

        blocks
            .update(&id, &mut observed, &GlobalAddressSpec { address_count: 8 })
            .await
            .unwrap();
        assert_eq!(
            plane.call_sequence(),
            ["GlobalAddressVAddIPAddressNumChange"]
        );
        assert_eq!(observed.address_count, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn read_parses_the_reported_count() {
        let plane = in_service_plane();
        plane.queue_response("GlobalAddressVGet", json!({ "address_num": "8" }));
        let id: ResourceId = "iga00000001".parse().unwrap();

        let state = GlobalAddresses::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .read(&id)
            .await
            .unwrap();

        assert_eq!(state.address_count, 8);
    }
}
