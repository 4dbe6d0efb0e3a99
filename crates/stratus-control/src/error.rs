//! Error types for the orchestration layer.
//!
//! The taxonomy mirrors the failure modes of driving an asynchronous
//! control plane: transport failures propagate untouched, convergence
//! deadlines become [`ControlError::Timeout`], and everything the caller
//! got wrong is rejected before the first remote call.

use std::time::Duration;

use stratus_api::ApiError;
use stratus_core::{ResourceId, StatusTarget};
use thiserror::Error;

use crate::types::NetworkKind;

/// A result type using [`ControlError`].
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while orchestrating a resource lifecycle.
#[derive(Debug, Error)]
pub enum ControlError {
    /// A remote call failed; aborts the current sequence immediately.
    #[error(transparent)]
    Transport(#[from] ApiError),

    /// A poll deadline elapsed before the target status was reached.
    ///
    /// The resource may be left mid-transition; no cleanup is attempted.
    #[error("timed out after {waited:?} waiting for {id} to reach {target}")]
    Timeout {
        /// The resource being polled.
        id: ResourceId,
        /// The status pair that was never reached.
        target: StatusTarget,
        /// How long the poller waited.
        waited: Duration,
    },

    /// A lookup query failed (no match, ambiguous, or bad filter).
    #[error(transparent)]
    Select(#[from] SelectError),

    /// The requested change targets a field the control plane cannot
    /// mutate in place.
    #[error("updating {field} is not supported")]
    UnsupportedUpdate {
        /// The immutable field.
        field: &'static str,
    },

    /// The requested network topology combination is not implemented.
    #[error("load balancer topology external={external} internal={internal} is not implemented")]
    UnsupportedTopology {
        /// Requested external leg type.
        external: NetworkKind,
        /// Requested internal leg type.
        internal: NetworkKind,
    },

    /// The desired state is malformed or incomplete.
    #[error("invalid {what}: {message}")]
    InvalidSpec {
        /// Which part of the desired state is wrong.
        what: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// The account has no storage archive contract to list images from.
    #[error("account has no storage archive contract")]
    NoArchiveContract,

    /// A control-plane response did not have the expected shape.
    #[error("malformed response from {operation}: {message}")]
    Decode {
        /// The operation whose response was malformed.
        operation: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Errors raised by candidate selection (lookup queries).
#[derive(Debug, Error)]
pub enum SelectError {
    /// The query carried neither an identifier nor any filters.
    #[error("an identifier or at least one filter is required")]
    EmptyQuery,

    /// No candidate satisfied every filter.
    #[error("no resources matched the query")]
    NoMatch,

    /// Two or more candidates matched and no tie-break was requested.
    #[error("two or more resources matched; narrow the filters down or set most_recent")]
    Ambiguous,

    /// A filter named a field that cannot be filtered on.
    #[error("invalid filter: {0:?} is not a filterable field")]
    InvalidFilter(String),

    /// A label filter's pattern failed to compile.
    #[error("invalid pattern for filter {name:?}: {source}")]
    InvalidPattern {
        /// The filter whose value was rejected.
        name: String,
        /// The regex compile error.
        #[source]
        source: regex::Error,
    },
}

/// A provisioning failure that may have happened after allocation.
///
/// The control plane assigns the identifier at allocation time; every step
/// after that can fail while the resource keeps existing. The identifier
/// is therefore surfaced alongside the error so the caller can record the
/// partially provisioned resource instead of leaking it. No rollback is
/// attempted.
#[derive(Debug, Error)]
#[error("provisioning failed{}: {source}", id_suffix(.id))]
pub struct ProvisionError {
    /// The already-allocated identifier, if allocation succeeded.
    pub id: Option<ResourceId>,
    /// The step failure.
    #[source]
    pub source: ControlError,
}

impl ProvisionError {
    /// A failure before allocation (no identifier exists yet).
    #[must_use]
    pub const fn before_allocation(source: ControlError) -> Self {
        Self { id: None, source }
    }

    /// A failure after allocation of `id`.
    #[must_use]
    pub const fn after_allocation(id: ResourceId, source: ControlError) -> Self {
        Self {
            id: Some(id),
            source,
        }
    }
}

fn id_suffix(id: &Option<ResourceId>) -> String {
    id.as_ref()
        .map_or_else(String::new, |id| format!(" (allocated {id})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_error_carries_allocated_id() {
        let id: ResourceId = "ivm00000042".parse().unwrap();
        let err = ProvisionError::after_allocation(
            id.clone(),
            ControlError::UnsupportedUpdate { field: "type" },
        );
        assert_eq!(err.id.as_ref(), Some(&id));
        assert!(err.to_string().contains("ivm00000042"));

        let early = ProvisionError::before_allocation(ControlError::NoArchiveContract);
        assert!(early.id.is_none());
        assert!(!early.to_string().contains("allocated"));
    }
}
