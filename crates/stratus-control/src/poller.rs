//! Status convergence polling.
//!
//! Every mutating control-plane call is acknowledged immediately while the
//! resource transitions in the background, so each step of an orchestration
//! sequence blocks on a [`StatusPoller`] until the resource reaches its
//! target status pair or a deadline elapses. Polling is fixed-interval by
//! design; there is no backoff and no retry of failed status queries; a
//! transport error aborts the wait immediately.

use std::time::Duration;

use stratus_api::ControlPlane;
use stratus_core::{ContractStatus, ResourceId, ResourceStatus, StatusTarget};

use crate::error::{ControlError, Result};

/// Interval between consecutive status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default convergence deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Blocks an orchestration sequence until a resource converges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPoller {
    /// Sleep between polls.
    pub interval: Duration,
    /// Maximum time to keep polling before giving up.
    pub deadline: Duration,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl StatusPoller {
    /// Create a poller with the given interval and deadline.
    #[must_use]
    pub const fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    /// Poll until `id` matches `target` or the deadline elapses.
    ///
    /// Each axis of the target is compared independently; a wildcard axis
    /// always matches. The deadline is measured from the start of this
    /// call and checked after every unsuccessful comparison, so the call
    /// returns [`ControlError::Timeout`] only once at least `deadline` has
    /// elapsed without a matching snapshot.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from the status query immediately and
    /// returns [`ControlError::Timeout`] when the deadline elapses.
    pub async fn wait(
        &self,
        client: &dyn ControlPlane,
        id: &ResourceId,
        target: StatusTarget,
    ) -> Result<()> {
        let started = tokio::time::Instant::now();
        loop {
            let observed = client.get_status(id).await?;
            if target.matches(observed) {
                tracing::debug!(%id, %observed, "status converged");
                return Ok(());
            }
            if started.elapsed() > self.deadline {
                tracing::warn!(%id, %target, %observed, "status convergence timed out");
                return Err(ControlError::Timeout {
                    id: id.clone(),
                    target,
                    waited: started.elapsed(),
                });
            }
            tracing::trace!(%id, %target, %observed, "still converging");
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Two-phase wait: converge the contract axis first, then the full
    /// pair.
    ///
    /// Appliance provisioning reports a meaningless resource status until
    /// the contract reaches its terminal value, so the resource axis is
    /// wildcarded for the first phase. Each phase is granted the full
    /// deadline.
    ///
    /// # Errors
    ///
    /// Same as [`StatusPoller::wait`], for whichever phase fails.
    pub async fn wait_two_phase(
        &self,
        client: &dyn ControlPlane,
        id: &ResourceId,
        contract: ContractStatus,
        resource: ResourceStatus,
    ) -> Result<()> {
        self.wait(client, id, StatusTarget::contract_only(contract))
            .await?;
        self.wait(client, id, StatusTarget::new(Some(contract), Some(resource)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;
    use stratus_core::StatusPair;

    fn pair(contract: ContractStatus, resource: ResourceStatus) -> StatusPair {
        StatusPair::new(contract, resource)
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_both_axes_match() {
        let plane = MockControlPlane::new(pair(ContractStatus::InService, ResourceStatus::Stopped));
        plane.script_statuses(vec![
            pair(ContractStatus::InPreparation, ResourceStatus::Initialized),
            pair(ContractStatus::InService, ResourceStatus::Starting),
        ]);

        let id: ResourceId = "ivm00000001".parse().unwrap();
        let poller = StatusPoller::default();
        poller
            .wait(&plane, &id, StatusTarget::in_service(ResourceStatus::Stopped))
            .await
            .unwrap();

        // Two scripted non-matching snapshots, then the standing state.
        assert_eq!(plane.status_queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wildcard_axis_matches_anything() {
        let plane =
            MockControlPlane::new(pair(ContractStatus::InService, ResourceStatus::Configuring));
        let id: ResourceId = "ifl00000001".parse().unwrap();

        StatusPoller::default()
            .wait(
                &plane,
                &id,
                StatusTarget::contract_only(ContractStatus::InService),
            )
            .await
            .unwrap();

        assert_eq!(plane.status_queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_deadline() {
        let plane =
            MockControlPlane::new(pair(ContractStatus::InService, ResourceStatus::Configuring));
        let id: ResourceId = "ivm00000001".parse().unwrap();

        let poller = StatusPoller::new(Duration::from_secs(10), Duration::from_secs(60));
        let started = tokio::time::Instant::now();
        let err = poller
            .wait(&plane, &id, StatusTarget::in_service(ResourceStatus::Running))
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::Timeout { .. }));
        // At least the full deadline elapsed before giving up.
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_aborts_immediately() {
        let plane = MockControlPlane::new(pair(ContractStatus::InService, ResourceStatus::Stopped));
        plane.fail_status("ServiceUnavailable", "maintenance window");

        let id: ResourceId = "ivm00000001".parse().unwrap();
        let err = StatusPoller::default()
            .wait(&plane, &id, StatusTarget::in_service(ResourceStatus::Running))
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::Transport(_)));
        assert_eq!(plane.status_queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn two_phase_converges_contract_first() {
        let plane =
            MockControlPlane::new(pair(ContractStatus::InService, ResourceStatus::Initialized));
        plane.script_statuses(vec![
            // Phase one sees the contract still being prepared; the
            // resource axis is ignored until it converges.
            pair(ContractStatus::InPreparation, ResourceStatus::Configured),
            pair(ContractStatus::InService, ResourceStatus::Configuring),
            // Phase two begins here.
            pair(ContractStatus::InService, ResourceStatus::Initialized),
        ]);

        let id: ResourceId = "ifl00000001".parse().unwrap();
        StatusPoller::default()
            .wait_two_phase(
                &plane,
                &id,
                ContractStatus::InService,
                ResourceStatus::Initialized,
            )
            .await
            .unwrap();

        assert_eq!(plane.status_queries(), 3);
    }
}
