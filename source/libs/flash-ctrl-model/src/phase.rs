// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Life-cycle phase as observed by the flash controller
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 2 unit tests
//!
//! The phase is produced by the external life-cycle authority. This crate only
//! reads it; every evaluation takes it as an explicit parameter.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Seed material may be read by hardware.
    Seed,
    /// Return-to-manufacturer: broadened erase access for decommissioning.
    Rma,
    /// No phase asserted.
    None,
    /// Conflicting or corrupted life-cycle input.
    Invalid,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Seed, Phase::Rma, Phase::None, Phase::Invalid];

    /// Only `Seed` and `Rma` can ever match a rule.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Seed | Phase::Rma)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Seed => "seed",
            Phase::Rma => "rma",
            Phase::None => "none",
            Phase::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seed" => Ok(Phase::Seed),
            "rma" => Ok(Phase::Rma),
            "none" => Ok(Phase::None),
            "invalid" => Ok(Phase::Invalid),
            other => Err(Error::Rule(format!("unknown phase '{other}'"))),
        }
    }
}
