//! Shared reconciliation helpers.
//!
//! Several update paths have to stop a running server before touching a
//! field and restart it once every field has been applied. [`PowerGate`]
//! makes that explicit: each field that needs the server stopped asks the
//! gate, the gate powers off at most once per reconciliation, and the
//! restore at the end only fires when the gate did.

use serde_json::json;

use stratus_api::ControlPlane;
use stratus_core::{ResourceId, ResourceStatus, StatusTarget};

use crate::error::Result;
use crate::poller::StatusPoller;

/// Power a server on or off and converge before returning.
///
/// A server already in the requested power state is left alone, so this
/// is safe to call without checking first.
///
/// # Errors
///
/// Propagates status-query and power-call failures, and times out like
/// any other [`StatusPoller::wait`].
pub async fn power(
    client: &dyn ControlPlane,
    poller: &StatusPoller,
    account: &str,
    server: &ResourceId,
    on: bool,
) -> Result<()> {
    let settled = if on {
        ResourceStatus::Running
    } else {
        ResourceStatus::Stopped
    };

    let observed = client.get_status(server).await?;
    if observed.resource == settled {
        return Ok(());
    }

    tracing::debug!(%server, on, "changing power state");
    client
        .invoke(
            "VMPower",
            json!({
                "gis_service_code": account,
                "ivm_service_code": server.as_str(),
                "power": if on { "On" } else { "Off" },
            }),
        )
        .await?;
    poller
        .wait(client, server, StatusTarget::in_service(settled))
        .await
}

/// Batches the power cycling of a reconciliation pass.
///
/// Power off happens at most once no matter how many fields request it,
/// and the closing restart only happens if the gate actually powered the
/// server off.
#[derive(Debug, Default)]
pub struct PowerGate {
    fired: bool,
}

impl PowerGate {
    /// A gate that has not fired yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { fired: false }
    }

    /// Whether the gate has powered the server off.
    #[must_use]
    pub const fn fired(&self) -> bool {
        self.fired
    }

    /// Power the server off, once.
    ///
    /// # Errors
    ///
    /// Same as [`power`]; the gate stays unfired on failure.
    pub async fn ensure_off(
        &mut self,
        client: &dyn ControlPlane,
        poller: &StatusPoller,
        account: &str,
        server: &ResourceId,
    ) -> Result<()> {
        if !self.fired {
            power(client, poller, account, server, false).await?;
            self.fired = true;
        }
        Ok(())
    }

    /// Restart the server if the gate fired and it is bootable.
    ///
    /// A server without a boot device cannot run; restoring one would
    /// only trade a stopped server for a power-on failure.
    ///
    /// # Errors
    ///
    /// Same as [`power`].
    pub async fn restore(
        &self,
        client: &dyn ControlPlane,
        poller: &StatusPoller,
        account: &str,
        server: &ResourceId,
        bootable: bool,
    ) -> Result<()> {
        if self.fired && bootable {
            power(client, poller, account, server, true).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;
    use stratus_core::{ContractStatus, StatusPair};

    const ACCOUNT: &str = "gis00000001";

    fn running_plane() -> MockControlPlane {
        MockControlPlane::new(StatusPair::new(
            ContractStatus::InService,
            ResourceStatus::Running,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn power_is_a_noop_when_state_already_matches() {
        let plane = running_plane();
        let id: ResourceId = "ivm00000001".parse().unwrap();

        power(&plane, &StatusPoller::default(), ACCOUNT, &id, true)
            .await
            .unwrap();

        assert!(plane.calls_for("VMPower").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_issues_one_call_and_converges() {
        let plane = running_plane();
        let id: ResourceId = "ivm00000001".parse().unwrap();

        power(&plane, &StatusPoller::default(), ACCOUNT, &id, false)
            .await
            .unwrap();

        let calls = plane.calls_for("VMPower");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["power"], "Off");
        assert_eq!(calls[0]["ivm_service_code"], "ivm00000001");
    }

    #[tokio::test(start_paused = true)]
    async fn gate_powers_off_once_for_many_fields() {
        let plane = running_plane();
        let id: ResourceId = "ivm00000001".parse().unwrap();
        let poller = StatusPoller::default();

        let mut gate = PowerGate::new();
        for _ in 0..3 {
            gate.ensure_off(&plane, &poller, ACCOUNT, &id).await.unwrap();
        }
        gate.restore(&plane, &poller, ACCOUNT, &id, true)
            .await
            .unwrap();

        let powers: Vec<_> = plane
            .calls_for("VMPower")
            .into_iter()
            .map(|p| p["power"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(powers, ["Off", "On"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unfired_gate_restores_nothing() {
        let plane = running_plane();
        let id: ResourceId = "ivm00000001".parse().unwrap();

        let gate = PowerGate::new();
        gate.restore(&plane, &StatusPoller::default(), ACCOUNT, &id, true)
            .await
            .unwrap();

        assert!(plane.calls_for("VMPower").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn gate_leaves_non_bootable_servers_stopped() {
        let plane = running_plane();
        let id: ResourceId = "ivm00000001".parse().unwrap();
        let poller = StatusPoller::default();

        let mut gate = PowerGate::new();
        gate.ensure_off(&plane, &poller, ACCOUNT, &id).await.unwrap();
        gate.restore(&plane, &poller, ACCOUNT, &id, false)
            .await
            .unwrap();

        let calls = plane.calls_for("VMPower");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["power"], "Off");
    }
}
