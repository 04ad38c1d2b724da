// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Flash controller access model: partitions, phase-gated protection,
//! address translation and backend transaction envelopes
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: Unit tests per module; integration + proptest suites in tests/
//!
//! PUBLIC API:
//!   - AddressSpace / FlashAddr: flat and bus address decomposition
//!   - PartitionModel / PartitionKind: data + info partition extents
//!   - PolicyTable / RuleSource / HardwareRules: phase-gated permission rules
//!   - FlashReq / FlashRsp / BackendChannel: backend request/response envelope
//!   - TrustSignals: OTP, life-cycle and power-manager inputs with safe defaults
//!   - FlashCtrl: the whole request pipeline
//!
//! DEPENDENCIES:
//!   - bitflags: permission bits
//!   - thiserror: error types
//!   - serde + toml: topology and software rule configuration
//!   - log: grant/deny diagnostics
//!
//! The model is synchronous and keeps no state between requests apart from the
//! explicit in-flight slot of a `BackendChannel`.

#![forbid(unsafe_code)]

pub mod address;
pub mod config;
pub mod ctrl;
pub mod error;
pub mod partition;
pub mod phase;
pub mod policy;
pub mod transaction;
pub mod trust;

pub use address::{AddressSpace, FlashAddr};
pub use config::{FlashConfig, Topology};
pub use ctrl::FlashCtrl;
pub use error::{DenyReason, Error, Result};
pub use partition::{PartitionInfo, PartitionKind, PartitionModel, INFO_TYPES};
pub use phase::Phase;
pub use policy::{
    AccessRequest, DataRegionRule, Decision, HardwareRules, InfoPageRule, MpPerm, PolicyTable,
    PolicyTableBuilder, RuleOwner, RuleSet, RuleSource, CREATOR_SEED_PAGE, OWNER_SEED_PAGE,
};
pub use transaction::{
    decode, encode, encode_program_burst, BackendChannel, Completion, Done, FlashOp, FlashReq, FlashRsp,
};
pub use trust::{
    Key128, KeyMaterial, LcSignals, OtpKeys, PwrSignals, RmaAck, ScrambleKeys, TrustSignals,
    DEFAULT_ADDR_KEY, DEFAULT_DATA_KEY,
};
