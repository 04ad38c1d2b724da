// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Phase-gated memory protection rule tables and evaluation
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 9 unit tests, default-table and property tests in tests/policy_table.rs
//!
//! PUBLIC API:
//!   - MpPerm: permitted-operations bits
//!   - InfoPageRule / DataRegionRule: single rule entries
//!   - RuleSource: provider of rules (hardware-fixed, software-owned)
//!   - PolicyTable: immutable set of sources evaluated by OR over matching rules
//!
//! INVARIANTS:
//!   - No matching rule means every operation is denied
//!   - `Phase::None` and `Phase::Invalid` never match, whatever the table holds
//!   - Matching rules combine additively; a source can grant, never revoke
//!   - `EN` must be set alongside the operation bit

use std::fmt;

use bitflags::bitflags;

use crate::address::FlashAddr;
use crate::error::{DenyReason, Error, Result};
use crate::partition::{PartitionKind, PartitionModel};
use crate::phase::Phase;
use crate::transaction::FlashOp;

/// Info page holding the creator root seed (bank 0).
pub const CREATOR_SEED_PAGE: u32 = 1;
/// Info page holding the owner root seed (bank 0).
pub const OWNER_SEED_PAGE: u32 = 2;

bitflags! {
    /// Permitted-operations configuration carried by every rule.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MpPerm: u8 {
        /// Rule is in effect. Without it no other bit grants anything.
        const EN = 1 << 0;
        const RD = 1 << 1;
        const PROG = 1 << 2;
        /// Page erase.
        const ERASE = 1 << 3;
        const BANK_ERASE = 1 << 4;
    }
}

impl MpPerm {
    const NAMES: [(&'static str, MpPerm); 5] = [
        ("en", MpPerm::EN),
        ("rd", MpPerm::RD),
        ("prog", MpPerm::PROG),
        ("erase", MpPerm::ERASE),
        ("bank_erase", MpPerm::BANK_ERASE),
    ];

    /// Parses configuration names (`en`, `rd`, `prog`, `erase`, `bank_erase`).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut perm = MpPerm::empty();
        for name in names {
            let key = name.as_ref().trim().to_ascii_lowercase();
            let bit = Self::NAMES
                .iter()
                .find(|(label, _)| *label == key)
                .map(|(_, bit)| *bit)
                .ok_or_else(|| Error::Rule(format!("unknown permission '{key}'")))?;
            perm |= bit;
        }
        Ok(perm)
    }

    /// Operation bit required for `op`; `FlashOp::None` needs a bit nothing grants.
    pub fn required_for(op: FlashOp) -> Option<MpPerm> {
        match op {
            FlashOp::None => None,
            FlashOp::Read => Some(MpPerm::RD),
            FlashOp::Program => Some(MpPerm::PROG),
            FlashOp::PageErase => Some(MpPerm::ERASE),
            FlashOp::BankErase => Some(MpPerm::BANK_ERASE),
        }
    }

    pub fn allows(self, op: FlashOp) -> bool {
        self.contains(MpPerm::EN) && Self::required_for(op).is_some_and(|bit| self.contains(bit))
    }
}

impl fmt::Display for MpPerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> =
            Self::NAMES.iter().filter(|(_, bit)| self.contains(*bit)).map(|(label, _)| *label).collect();
        if names.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// Grants `perm` on one info page (bank-major index over all banks) in `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoPageRule {
    page: u32,
    phase: Phase,
    perm: MpPerm,
}

impl InfoPageRule {
    pub const fn new(page: u32, phase: Phase, perm: MpPerm) -> Self {
        Self { page, phase, perm }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn perm(&self) -> MpPerm {
        self.perm
    }

    fn matches(&self, page: u32, phase: Phase) -> bool {
        self.page == page && self.phase == phase
    }
}

/// Grants `perm` on data pages `base..base + size` in `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRegionRule {
    phase: Phase,
    perm: MpPerm,
    base: u32,
    size: u32,
}

impl DataRegionRule {
    pub const fn new(phase: Phase, perm: MpPerm, base: u32, size: u32) -> Self {
        Self { phase, perm, base, size }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn perm(&self) -> MpPerm {
        self.perm
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Zero-sized regions contain nothing.
    pub fn contains(&self, page: u32) -> bool {
        page >= self.base && page - self.base < self.size
    }

    fn matches(&self, page: u32, phase: Phase) -> bool {
        self.phase == phase && self.contains(page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOwner {
    Hardware,
    Software,
}

impl fmt::Display for RuleOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOwner::Hardware => f.write_str("hardware"),
            RuleOwner::Software => f.write_str("software"),
        }
    }
}

/// A provider of protection rules. Sources are combined by [`PolicyTable`].
pub trait RuleSource: fmt::Debug + Send + Sync {
    fn owner(&self) -> RuleOwner;
    fn info_rules(&self) -> &[InfoPageRule];
    fn data_rules(&self) -> &[DataRegionRule];
}

/// Checks every rule of `source` against the partition extents.
pub fn validate_source(source: &dyn RuleSource, partitions: &PartitionModel) -> Result<()> {
    let info_total = partitions.total_pages(PartitionKind::Info);
    for rule in source.info_rules() {
        if rule.page >= info_total {
            return Err(Error::Rule(format!(
                "{} info rule page {} exceeds {} info pages",
                source.owner(),
                rule.page,
                info_total
            )));
        }
    }
    let data_total = u64::from(partitions.total_pages(PartitionKind::Data));
    for rule in source.data_rules() {
        let end = u64::from(rule.base) + u64::from(rule.size);
        if end > data_total {
            return Err(Error::Rule(format!(
                "{} data region {}+{} exceeds {} data pages",
                source.owner(),
                rule.base,
                rule.size,
                data_total
            )));
        }
    }
    Ok(())
}

/// Owned rule list, e.g. software rules loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    owner: RuleOwner,
    info: Vec<InfoPageRule>,
    data: Vec<DataRegionRule>,
}

impl RuleSet {
    pub fn new(owner: RuleOwner, info: Vec<InfoPageRule>, data: Vec<DataRegionRule>) -> Self {
        Self { owner, info, data }
    }

    pub fn empty(owner: RuleOwner) -> Self {
        Self::new(owner, Vec::new(), Vec::new())
    }

    pub fn info(&self) -> &[InfoPageRule] {
        &self.info
    }

    pub fn data(&self) -> &[DataRegionRule] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty() && self.data.is_empty()
    }

    pub fn validate(&self, partitions: &PartitionModel) -> Result<()> {
        validate_source(self, partitions)
    }
}

impl RuleSource for RuleSet {
    fn owner(&self) -> RuleOwner {
        self.owner
    }

    fn info_rules(&self) -> &[InfoPageRule] {
        &self.info
    }

    fn data_rules(&self) -> &[DataRegionRule] {
        &self.data
    }
}

const SEED_READ: MpPerm = MpPerm::EN.union(MpPerm::RD);
const SEED_RMA: MpPerm = SEED_READ.union(MpPerm::ERASE);
const DATA_RMA: MpPerm = SEED_READ.union(MpPerm::BANK_ERASE);

/// The hardware-fixed rule set shipped with the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareRules {
    info: [InfoPageRule; 3],
    data: [DataRegionRule; 1],
}

impl HardwareRules {
    pub fn new(partitions: &PartitionModel) -> Result<Self> {
        let rules = Self {
            info: [
                InfoPageRule::new(CREATOR_SEED_PAGE, Phase::Seed, SEED_READ),
                InfoPageRule::new(OWNER_SEED_PAGE, Phase::Seed, SEED_READ),
                InfoPageRule::new(OWNER_SEED_PAGE, Phase::Rma, SEED_RMA),
            ],
            data: [DataRegionRule::new(Phase::Rma, DATA_RMA, 0, partitions.total_pages(PartitionKind::Data))],
        };
        validate_source(&rules, partitions)?;
        Ok(rules)
    }
}

impl RuleSource for HardwareRules {
    fn owner(&self) -> RuleOwner {
        RuleOwner::Hardware
    }

    fn info_rules(&self) -> &[InfoPageRule] {
        &self.info
    }

    fn data_rules(&self) -> &[DataRegionRule] {
        &self.data
    }
}

/// Operation addressed at one partition location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequest {
    pub op: FlashOp,
    pub partition: PartitionKind,
    pub addr: FlashAddr,
}

impl AccessRequest {
    pub const fn new(op: FlashOp, partition: PartitionKind, addr: FlashAddr) -> Self {
        Self { op, partition, addr }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Permitted,
    Denied(DenyReason),
}

impl Decision {
    pub fn is_permitted(self) -> bool {
        matches!(self, Decision::Permitted)
    }

    /// Converts a denial into the matching error; `phase` is reported for
    /// `InvalidPhase` denials.
    pub fn into_result(self, phase: Phase) -> Result<()> {
        match self {
            Decision::Permitted => Ok(()),
            Decision::Denied(DenyReason::InvalidPhase) => Err(Error::InvalidPhase(phase)),
            Decision::Denied(reason) => Err(Error::Denied(reason)),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Permitted => f.write_str("permitted"),
            Decision::Denied(reason) => write!(f, "denied: {reason}"),
        }
    }
}

/// Immutable collection of rule sources bound to one partition layout.
#[derive(Debug)]
pub struct PolicyTable {
    partitions: PartitionModel,
    sources: Vec<Box<dyn RuleSource>>,
}

pub struct PolicyTableBuilder {
    partitions: PartitionModel,
    sources: Vec<Box<dyn RuleSource>>,
}

impl PolicyTableBuilder {
    /// Registers a source after checking its rules against the partition extents.
    pub fn source(mut self, source: impl RuleSource + 'static) -> Result<Self> {
        validate_source(&source, &self.partitions)?;
        self.sources.push(Box::new(source));
        Ok(self)
    }

    pub fn build(self) -> PolicyTable {
        PolicyTable { partitions: self.partitions, sources: self.sources }
    }
}

impl PolicyTable {
    pub fn builder(partitions: PartitionModel) -> PolicyTableBuilder {
        PolicyTableBuilder { partitions, sources: Vec::new() }
    }

    /// Table holding only the hardware-fixed rules.
    pub fn with_defaults(partitions: PartitionModel) -> Result<Self> {
        let hardware = HardwareRules::new(&partitions)?;
        Ok(Self::builder(partitions).source(hardware)?.build())
    }

    pub fn partitions(&self) -> &PartitionModel {
        &self.partitions
    }

    pub fn sources(&self) -> impl Iterator<Item = &dyn RuleSource> {
        self.sources.iter().map(|source| &**source)
    }

    /// OR of every info rule matching `page` in `phase`; `None` when nothing matches.
    pub fn permitted_info(&self, page: u32, phase: Phase) -> Option<MpPerm> {
        if !phase.is_active() {
            return None;
        }
        self.sources
            .iter()
            .flat_map(|source| source.info_rules())
            .filter(|rule| rule.matches(page, phase))
            .map(|rule| rule.perm)
            .reduce(|acc, perm| acc | perm)
    }

    /// OR of every data region containing `page` in `phase`; `None` when nothing matches.
    pub fn permitted_data(&self, page: u32, phase: Phase) -> Option<MpPerm> {
        if !phase.is_active() {
            return None;
        }
        self.sources
            .iter()
            .flat_map(|source| source.data_rules())
            .filter(|rule| rule.matches(page, phase))
            .map(|rule| rule.perm)
            .reduce(|acc, perm| acc | perm)
    }

    /// Evaluates `request` under `phase`. Out-of-range coordinates are errors and
    /// are reported before any rule is consulted.
    pub fn authorize(&self, request: &AccessRequest, phase: Phase) -> Result<Decision> {
        let page = self.partitions.global_page(request.partition, request.addr)?;
        if !phase.is_active() {
            return Ok(Decision::Denied(DenyReason::InvalidPhase));
        }
        let perm = match request.partition {
            PartitionKind::Info => self.permitted_info(page, phase),
            PartitionKind::Data => self.permitted_data(page, phase),
        };
        Ok(match perm {
            None => Decision::Denied(DenyReason::PhaseMismatch),
            Some(perm) if perm.allows(request.op) => Decision::Permitted,
            Some(_) => Decision::Denied(DenyReason::OpNotPermitted),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Topology;

    fn partitions() -> PartitionModel {
        PartitionModel::new(&Topology::default()).unwrap()
    }

    fn info(page: u32, op: FlashOp) -> AccessRequest {
        AccessRequest::new(op, PartitionKind::Info, FlashAddr::new(page / 4, page % 4, 0))
    }

    #[test]
    fn enable_bit_gates_every_operation() {
        let perm = MpPerm::RD | MpPerm::PROG | MpPerm::ERASE | MpPerm::BANK_ERASE;
        for op in FlashOp::ALL {
            assert!(!perm.allows(op));
        }
        assert!((perm | MpPerm::EN).allows(FlashOp::Read));
        assert!(!MpPerm::all().allows(FlashOp::None));
    }

    #[test]
    fn perm_names_parse_and_display() {
        let perm = MpPerm::from_names(&["en", "RD", " bank_erase "]).unwrap();
        assert_eq!(perm, MpPerm::EN | MpPerm::RD | MpPerm::BANK_ERASE);
        assert_eq!(perm.to_string(), "en,rd,bank_erase");
        assert_eq!(MpPerm::empty().to_string(), "-");
        assert!(MpPerm::from_names(&["scramble"]).is_err());
    }

    #[test]
    fn zero_size_region_matches_nothing() {
        let rule = DataRegionRule::new(Phase::Rma, MpPerm::all(), 0, 0);
        assert!(!rule.contains(0));
        let rule = DataRegionRule::new(Phase::Rma, MpPerm::all(), 10, 2);
        assert!(!rule.contains(9));
        assert!(rule.contains(10));
        assert!(rule.contains(11));
        assert!(!rule.contains(12));
    }

    #[test]
    fn hardware_rules_reproduce_default_table() {
        let hw = HardwareRules::new(&partitions()).unwrap();
        assert_eq!(hw.info_rules().len(), 3);
        assert_eq!(hw.info_rules()[2].perm(), MpPerm::EN | MpPerm::RD | MpPerm::ERASE);
        let data = hw.data_rules()[0];
        assert_eq!((data.phase(), data.base(), data.size()), (Phase::Rma, 0, 512));
        assert_eq!(data.perm(), MpPerm::EN | MpPerm::RD | MpPerm::BANK_ERASE);
    }

    #[test]
    fn hardware_rules_need_seed_pages() {
        let topology = Topology { banks: 1, info_pages_per_bank: 2, ..Topology::default() };
        let partitions = PartitionModel::new(&topology).unwrap();
        assert!(matches!(HardwareRules::new(&partitions), Err(Error::Rule(_))));
    }

    #[test]
    fn unmatched_phase_is_phase_mismatch() {
        let table = PolicyTable::with_defaults(partitions()).unwrap();
        let decision = table.authorize(&info(CREATOR_SEED_PAGE, FlashOp::Read), Phase::Rma).unwrap();
        assert_eq!(decision, Decision::Denied(DenyReason::PhaseMismatch));
        let decision = table.authorize(&info(OWNER_SEED_PAGE, FlashOp::Program), Phase::Seed).unwrap();
        assert_eq!(decision, Decision::Denied(DenyReason::OpNotPermitted));
    }

    #[test]
    fn sources_combine_additively() {
        let extra = RuleSet::new(
            RuleOwner::Software,
            vec![InfoPageRule::new(OWNER_SEED_PAGE, Phase::Seed, MpPerm::PROG)],
            Vec::new(),
        );
        let table = PolicyTable::builder(partitions())
            .source(HardwareRules::new(&partitions()).unwrap())
            .unwrap()
            .source(extra)
            .unwrap()
            .build();
        assert_eq!(
            table.permitted_info(OWNER_SEED_PAGE, Phase::Seed),
            Some(MpPerm::EN | MpPerm::RD | MpPerm::PROG)
        );
        assert!(table.authorize(&info(OWNER_SEED_PAGE, FlashOp::Program), Phase::Seed).unwrap().is_permitted());
        assert_eq!(table.sources().count(), 2);
    }

    #[test]
    fn builder_rejects_out_of_range_sources() {
        let bad = RuleSet::new(
            RuleOwner::Software,
            Vec::new(),
            vec![DataRegionRule::new(Phase::Rma, MpPerm::all(), 511, 2)],
        );
        assert!(matches!(PolicyTable::builder(partitions()).source(bad), Err(Error::Rule(_))));
    }

    #[test]
    fn decision_maps_to_errors() {
        assert!(Decision::Permitted.into_result(Phase::Seed).is_ok());
        assert!(matches!(
            Decision::Denied(DenyReason::InvalidPhase).into_result(Phase::None),
            Err(Error::InvalidPhase(Phase::None))
        ));
        assert!(matches!(
            Decision::Denied(DenyReason::OpNotPermitted).into_result(Phase::Rma),
            Err(Error::Denied(DenyReason::OpNotPermitted))
        ));
        assert_eq!(Decision::Denied(DenyReason::PhaseMismatch).to_string(), "denied: phase-mismatch");
    }
}
