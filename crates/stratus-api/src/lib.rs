//! Control-plane API client for stratus.
//!
//! The remote control plane is asynchronous: every mutating call returns an
//! acknowledgement immediately while the resource converges in the
//! background. This crate provides the thin, opaque boundary to it:
//!
//! - [`ControlPlane`]: the two-method client trait (`invoke` + `get_status`)
//!   the orchestration layer is written against
//! - [`HttpControlPlane`]: the reqwest implementation
//! - [`ApiConfig`]: credentials, account scope and endpoint
//!
//! Request/response shapes are deliberately untyped parameter bags
//! (`serde_json::Value`); the orchestration layer owns the typed views.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;

pub use client::{ApiError, ControlPlane, HttpControlPlane, Result};
pub use config::ApiConfig;
