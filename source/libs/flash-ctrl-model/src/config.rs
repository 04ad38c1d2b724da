// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Build-time topology and software rule configuration (TOML)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 5 unit tests, directory loading in tests/config_load.rs
//!
//! DEPENDENCIES:
//!   - serde + toml: raw document parsing
//!   - std::fs: file and directory loading

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::address::AddressSpace;
use crate::error::{Error, Result};
use crate::partition::{PartitionKind, PartitionModel};
use crate::phase::Phase;
use crate::policy::{DataRegionRule, InfoPageRule, MpPerm, RuleOwner, RuleSet};

/// Physical layout parameters. Counts other than `info_pages_per_bank` must be
/// powers of two so they map onto address bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Topology {
    pub banks: u32,
    pub pages_per_bank: u32,
    pub info_pages_per_bank: u32,
    pub words_per_page: u32,
    pub bus_words_per_word: u32,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            banks: 2,
            pages_per_bank: 256,
            info_pages_per_bank: 4,
            words_per_page: 128,
            bus_words_per_word: 2,
        }
    }
}

impl Topology {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("banks", self.banks),
            ("pages_per_bank", self.pages_per_bank),
            ("words_per_page", self.words_per_page),
            ("bus_words_per_word", self.bus_words_per_word),
        ] {
            if !value.is_power_of_two() {
                return Err(Error::Topology(format!("{name} must be a non-zero power of two, got {value}")));
            }
        }
        if self.info_pages_per_bank == 0 || self.info_pages_per_bank > self.pages_per_bank {
            return Err(Error::Topology(format!(
                "info_pages_per_bank must be in 1..={}, got {}",
                self.pages_per_bank, self.info_pages_per_bank
            )));
        }
        if self.banks.checked_mul(self.pages_per_bank).is_none() {
            return Err(Error::Topology(format!(
                "{} banks of {} pages overflow a 32-bit page count",
                self.banks, self.pages_per_bank
            )));
        }
        AddressSpace::from_topology(self)
            .map_err(|err| Error::Topology(err.to_string()))
            .map(|_| ())
    }
}

/// Validated configuration: topology plus software-owned rules.
#[derive(Debug, Clone)]
pub struct FlashConfig {
    pub topology: Topology,
    pub software_rules: RuleSet,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self { topology: Topology::default(), software_rules: RuleSet::empty(RuleOwner::Software) }
    }
}

impl FlashConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Self::from_sources([(PathBuf::from("<inline>"), input.to_string())])
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = read(path)?;
        Self::from_sources([(path.to_path_buf(), data)])
    }

    /// Loads every `*.toml` in `dir` in name order. Rules accumulate; the last
    /// file that declares `[topology]` wins.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|source| Error::Read { path: dir.to_path_buf(), source })? {
            let entry = entry.map_err(|source| Error::Read { path: dir.to_path_buf(), source })?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let data = read(&path)?;
            sources.push((path, data));
        }
        Self::from_sources(sources)
    }

    fn from_sources(sources: impl IntoIterator<Item = (PathBuf, String)>) -> Result<Self> {
        let mut topology = None;
        let mut info = Vec::new();
        let mut data = Vec::new();
        for (path, text) in sources {
            let raw: RawConfig = toml::from_str(&text).map_err(|source| Error::Parse { path, source })?;
            if raw.topology.is_some() {
                topology = raw.topology;
            }
            for rule in raw.info_rule {
                info.push(InfoPageRule::new(rule.page, rule.phase, MpPerm::from_names(&rule.perm)?));
            }
            for region in raw.data_region {
                data.push(DataRegionRule::new(
                    region.phase,
                    MpPerm::from_names(&region.perm)?,
                    region.base,
                    region.size,
                ));
            }
        }

        let topology = topology.unwrap_or_default();
        let partitions = PartitionModel::new(&topology)?;
        let software_rules = RuleSet::new(RuleOwner::Software, info, data);
        software_rules.validate(&partitions)?;
        log::debug!(
            "flash config: {} banks, {} software info rules, {} software data regions",
            topology.banks,
            software_rules.info().len(),
            software_rules.data().len()
        );
        Ok(Self { topology, software_rules })
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read { path: path.to_path_buf(), source })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    topology: Option<Topology>,
    #[serde(default)]
    info_rule: Vec<RawInfoRule>,
    #[serde(default)]
    data_region: Vec<RawDataRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInfoRule {
    page: u32,
    phase: Phase,
    perm: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDataRegion {
    phase: Phase,
    base: u32,
    size: u32,
    perm: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = FlashConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.topology, Topology::default());
        assert!(cfg.software_rules.info().is_empty());
        assert!(cfg.software_rules.data().is_empty());
    }

    #[test]
    fn parses_topology_and_rules() {
        let cfg = FlashConfig::from_toml_str(
            r#"
            [topology]
            banks = 1
            pages_per_bank = 64
            info_pages_per_bank = 8
            words_per_page = 32
            bus_words_per_word = 1

            [[info_rule]]
            page = 7
            phase = "rma"
            perm = ["en", "rd", "erase"]

            [[data_region]]
            phase = "seed"
            base = 4
            size = 8
            perm = ["EN", "rd"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.topology.pages_per_bank, 64);
        assert_eq!(cfg.software_rules.info()[0].page(), 7);
        assert_eq!(cfg.software_rules.info()[0].perm(), MpPerm::EN | MpPerm::RD | MpPerm::ERASE);
        assert_eq!(cfg.software_rules.data()[0].base(), 4);
        assert_eq!(cfg.software_rules.data()[0].perm(), MpPerm::EN | MpPerm::RD);
    }

    #[test]
    fn rejects_non_power_of_two_topology() {
        let err = FlashConfig::from_toml_str(
            "[topology]\nbanks = 3\npages_per_bank = 256\ninfo_pages_per_bank = 4\nwords_per_page = 128\nbus_words_per_word = 2\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }

    #[test]
    fn rejects_page_count_overflow() {
        // 16 + 16 address bits fit, but 2^32 pages do not.
        let err = FlashConfig::from_toml_str(
            "[topology]\nbanks = 65536\npages_per_bank = 65536\ninfo_pages_per_bank = 1\nwords_per_page = 1\nbus_words_per_word = 1\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Topology(_)));

        let widest = Topology {
            banks: 32768,
            pages_per_bank: 65536,
            info_pages_per_bank: 1,
            words_per_page: 1,
            bus_words_per_word: 1,
        };
        assert!(widest.validate().is_ok());
        assert_eq!(PartitionModel::new(&widest).unwrap().total_pages(PartitionKind::Data), 1 << 31);
    }

    #[test]
    fn rejects_rules_outside_partition() {
        let err = FlashConfig::from_toml_str("[[info_rule]]\npage = 8\nphase = \"seed\"\nperm = [\"en\", \"rd\"]\n")
            .unwrap_err();
        assert!(matches!(err, Error::Rule(_)));

        let err = FlashConfig::from_toml_str(
            "[[data_region]]\nphase = \"rma\"\nbase = 500\nsize = 13\nperm = [\"en\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Rule(_)));

        let err = FlashConfig::from_toml_str("[[info_rule]]\npage = 1\nphase = \"seed\"\nperm = [\"write\"]\n")
            .unwrap_err();
        assert!(matches!(err, Error::Rule(_)));
    }
}
