// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Request pipeline: bounds -> phase policy -> trust gate -> envelope
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 4 unit tests, scenarios in tests/scenarios.rs
//!
//! Nothing is cached between calls. Phase and trust signals are re-read for
//! every request.

use log::{debug, warn};

use crate::address::{AddressSpace, FlashAddr};
use crate::config::{FlashConfig, Topology};
use crate::error::{DenyReason, Result};
use crate::partition::{PartitionKind, PartitionModel};
use crate::phase::Phase;
use crate::policy::{AccessRequest, Decision, HardwareRules, PolicyTable};
use crate::transaction::{self, FlashOp, FlashReq};
use crate::trust::TrustSignals;

#[derive(Debug)]
pub struct FlashCtrl {
    space: AddressSpace,
    policy: PolicyTable,
}

impl FlashCtrl {
    /// Controller with only the hardware-fixed rules.
    pub fn new(topology: &Topology) -> Result<Self> {
        let partitions = PartitionModel::new(topology)?;
        Ok(Self { space: AddressSpace::from_topology(topology)?, policy: PolicyTable::with_defaults(partitions)? })
    }

    /// Controller with hardware rules followed by the configured software rules.
    pub fn from_config(config: FlashConfig) -> Result<Self> {
        let partitions = PartitionModel::new(&config.topology)?;
        let mut builder = PolicyTable::builder(partitions).source(HardwareRules::new(&partitions)?)?;
        if !config.software_rules.is_empty() {
            builder = builder.source(config.software_rules)?;
        }
        Ok(Self { space: AddressSpace::from_topology(&config.topology)?, policy: builder.build() })
    }

    pub fn address_space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn partitions(&self) -> &PartitionModel {
        self.policy.partitions()
    }

    /// Full authorization: phase policy, then the power-manager ready flag and
    /// the Seed-phase provisioning gate.
    pub fn authorize(&self, request: &AccessRequest, phase: Phase, trust: &TrustSignals) -> Result<Decision> {
        let decision = self.policy.authorize(request, phase)?;
        let decision = if !trust.ready() {
            Decision::Denied(DenyReason::NotReady)
        } else {
            match decision {
                Decision::Permitted => trust.seed_gate(phase).map_or(Decision::Permitted, Decision::Denied),
                denied => denied,
            }
        };
        match decision {
            Decision::Permitted => debug!(
                "flash: permit {} {} bank={} page={} phase={}",
                request.op, request.partition, request.addr.bank, request.addr.page, phase
            ),
            Decision::Denied(reason) => warn!(
                "flash: deny {} {} bank={} page={} phase={} reason={}",
                request.op, request.partition, request.addr.bank, request.addr.page, phase, reason
            ),
        }
        Ok(decision)
    }

    /// Authorizes `request` and packages it for the backend.
    pub fn prepare(
        &self,
        request: &AccessRequest,
        payload: Option<u64>,
        scramble_en: bool,
        phase: Phase,
        trust: &TrustSignals,
    ) -> Result<FlashReq> {
        self.authorize(request, phase, trust)?.into_result(phase)?;
        self.warn_placeholder_keys(scramble_en, trust);
        transaction::encode(
            &self.space,
            self.partitions(),
            request.op,
            request.partition,
            request.addr,
            payload,
            scramble_en,
            trust.keys(),
        )
    }

    /// Authorizes a program burst starting at `start` and packages every word.
    pub fn prepare_program_burst(
        &self,
        partition: PartitionKind,
        start: FlashAddr,
        words: &[u64],
        scramble_en: bool,
        phase: Phase,
        trust: &TrustSignals,
    ) -> Result<Vec<FlashReq>> {
        let request = AccessRequest::new(FlashOp::Program, partition, start);
        self.authorize(&request, phase, trust)?.into_result(phase)?;
        self.warn_placeholder_keys(scramble_en, trust);
        transaction::encode_program_burst(
            &self.space,
            self.partitions(),
            partition,
            start,
            words,
            scramble_en,
            trust.keys(),
        )
    }

    fn warn_placeholder_keys(&self, scramble_en: bool, trust: &TrustSignals) {
        if scramble_en && !trust.keys().is_provisioned() {
            warn!("flash: scrambling with placeholder keys; OTP has not provisioned key material");
        }
    }
}
