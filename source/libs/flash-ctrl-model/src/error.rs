// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Error taxonomy for the flash controller access model
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 2 unit tests

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::phase::Phase;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Why an authorization request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// No rule exists for the addressed page/region in the current phase.
    PhaseMismatch,
    /// A rule matched but does not grant the requested operation.
    OpNotPermitted,
    /// Seed material is not provisioned or provisioning is disabled.
    NotProvisioned,
    /// The power manager has not released the controller from init.
    NotReady,
    /// Phase input is `None` or `Invalid`.
    InvalidPhase,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::PhaseMismatch => "phase-mismatch",
            DenyReason::OpNotPermitted => "op-not-permitted",
            DenyReason::NotProvisioned => "not-provisioned",
            DenyReason::NotReady => "not-ready",
            DenyReason::InvalidPhase => "invalid-phase",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the model.
#[derive(Debug, Error)]
pub enum Error {
    /// An address component or rule bound exceeds the configured geometry.
    #[error("{what} out of range: {value} (limit {limit})")]
    OutOfRange { what: &'static str, value: u64, limit: u64 },
    /// Authorization refused the request.
    #[error("access denied: {0}")]
    Denied(DenyReason),
    /// The phase input cannot authorize anything.
    #[error("invalid life-cycle phase: {0}")]
    InvalidPhase(Phase),
    /// Request arguments are inconsistent with the requested operation.
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    /// The backend violated the response contract.
    #[error("backend protocol violation: {0}")]
    Protocol(&'static str),
    /// A transaction is already in flight on the channel.
    #[error("backend channel busy")]
    Busy,
    #[error("failed to read flash config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse flash config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// Topology parameters are unusable.
    #[error("invalid topology: {0}")]
    Topology(String),
    /// A rule violates its bounds or cannot be parsed.
    #[error("invalid rule: {0}")]
    Rule(String),
}

impl Error {
    pub(crate) fn out_of_range(what: &'static str, value: u64, limit: u64) -> Self {
        Error::OutOfRange { what, value, limit }
    }

    /// Returns the denial reason if this error blocked a request on policy grounds.
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Error::Denied(reason) => Some(*reason),
            Error::InvalidPhase(_) => Some(DenyReason::InvalidPhase),
            _ => None,
        }
    }
}
