// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Externally owned trust inputs (OTP keys, life-cycle, power manager)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 5 unit tests
//!
//! Every value here is produced by another block. The `disconnected()` /
//! `unprovisioned()` constructors give the placeholder values used until that
//! block is wired up. Placeholder keys are public constants and are never a
//! basis for an authorization decision.

use std::fmt;

use crate::error::DenyReason;
use crate::phase::Phase;

/// Opaque 128-bit key value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key128([u8; 16]);

impl Key128 {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_u128(&self) -> u128 {
        u128::from_be_bytes(self.0)
    }
}

impl fmt::Debug for Key128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key128(..)")
    }
}

/// Placeholder address-scrambling key. Public, not a secret.
pub const DEFAULT_ADDR_KEY: Key128 = Key128::from_u128(0xb6d4_8a62_5fe5_9b32_d5a2_bcd1_5dba_1e66);
/// Placeholder data-scrambling key. Public, not a secret.
pub const DEFAULT_DATA_KEY: Key128 = Key128::from_u128(0x8e0f_3a91_c4b7_2d06_7f59_e1a8_03cd_94b5);

/// Key slot contents, tagged with where they came from.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum KeyMaterial {
    /// Fixed default used before OTP delivers real keys.
    Placeholder(Key128),
    /// Key delivered by the trust authority.
    Provisioned(Key128),
}

impl KeyMaterial {
    pub fn key(&self) -> &Key128 {
        match self {
            KeyMaterial::Placeholder(key) | KeyMaterial::Provisioned(key) => key,
        }
    }

    pub fn is_provisioned(&self) -> bool {
        matches!(self, KeyMaterial::Provisioned(_))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Placeholder(key) => write!(f, "Placeholder({:#034x})", key.to_u128()),
            KeyMaterial::Provisioned(_) => f.write_str("Provisioned(<redacted>)"),
        }
    }
}

/// Address and data scrambling keys forwarded with each transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrambleKeys {
    pub addr_key: KeyMaterial,
    pub data_key: KeyMaterial,
}

impl ScrambleKeys {
    pub const fn unprovisioned() -> Self {
        Self {
            addr_key: KeyMaterial::Placeholder(DEFAULT_ADDR_KEY),
            data_key: KeyMaterial::Placeholder(DEFAULT_DATA_KEY),
        }
    }

    pub const fn provisioned(addr_key: Key128, data_key: Key128) -> Self {
        Self { addr_key: KeyMaterial::Provisioned(addr_key), data_key: KeyMaterial::Provisioned(data_key) }
    }

    pub fn is_provisioned(&self) -> bool {
        self.addr_key.is_provisioned() && self.data_key.is_provisioned()
    }
}

impl Default for ScrambleKeys {
    fn default() -> Self {
        Self::unprovisioned()
    }
}

/// Inputs from OTP fuse storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpKeys {
    pub keys: ScrambleKeys,
    pub seed_valid: bool,
}

impl OtpKeys {
    /// Placeholder keys with `seed_valid` asserted. Unsafe outside bring-up;
    /// real provisioning overrides it.
    pub const fn unprovisioned() -> Self {
        Self { keys: ScrambleKeys::unprovisioned(), seed_valid: true }
    }
}

impl Default for OtpKeys {
    fn default() -> Self {
        Self::unprovisioned()
    }
}

/// Inputs from the life-cycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcSignals {
    pub rma_req: bool,
    pub rma_req_token: u32,
    pub provision_en: bool,
}

impl LcSignals {
    pub const fn disconnected() -> Self {
        Self { rma_req: false, rma_req_token: 0, provision_en: true }
    }
}

impl Default for LcSignals {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// RMA acknowledge returned to the life-cycle controller. The token is carried
/// as given; its derivation belongs to the life-cycle side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RmaAck {
    pub ack: bool,
    pub token: u32,
}

impl RmaAck {
    pub const fn idle() -> Self {
        Self { ack: false, token: 0 }
    }

    pub const fn acknowledge(token: u32) -> Self {
        Self { ack: true, token }
    }
}

/// Inputs from the power manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwrSignals {
    pub init: bool,
}

impl PwrSignals {
    pub const fn disconnected() -> Self {
        Self { init: true }
    }
}

impl Default for PwrSignals {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Snapshot of every externally owned input consulted for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrustSignals {
    pub otp: OtpKeys,
    pub lc: LcSignals,
    pub pwr: PwrSignals,
}

impl TrustSignals {
    /// All externals at their placeholder values.
    pub const fn placeholder() -> Self {
        Self { otp: OtpKeys::unprovisioned(), lc: LcSignals::disconnected(), pwr: PwrSignals::disconnected() }
    }

    pub fn provisioning_enabled(&self) -> bool {
        self.lc.provision_en
    }

    pub fn seed_valid(&self) -> bool {
        self.otp.seed_valid
    }

    pub fn ready(&self) -> bool {
        self.pwr.init
    }

    pub fn rma_requested(&self) -> bool {
        self.lc.rma_req
    }

    pub fn keys(&self) -> ScrambleKeys {
        self.otp.keys
    }

    /// Extra condition on Seed-phase operations: provisioning enabled and seed
    /// valid. Other phases pass through.
    pub fn seed_gate(&self, phase: Phase) -> Option<DenyReason> {
        if phase == Phase::Seed && !(self.provisioning_enabled() && self.seed_valid()) {
            Some(DenyReason::NotProvisioned)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_defaults_match_documented_values() {
        let trust = TrustSignals::default();
        assert_eq!(trust, TrustSignals::placeholder());
        assert!(trust.seed_valid());
        assert!(trust.provisioning_enabled());
        assert!(trust.ready());
        assert!(!trust.rma_requested());
        assert_eq!(trust.keys().addr_key.key(), &DEFAULT_ADDR_KEY);
        assert_eq!(trust.keys().data_key.key(), &DEFAULT_DATA_KEY);
        assert!(!trust.keys().is_provisioned());
    }

    #[test]
    fn placeholder_is_distinct_from_provisioned_with_same_bytes() {
        let provisioned = ScrambleKeys::provisioned(DEFAULT_ADDR_KEY, DEFAULT_DATA_KEY);
        assert_ne!(provisioned, ScrambleKeys::unprovisioned());
        assert!(provisioned.is_provisioned());
    }

    #[test]
    fn provisioned_keys_are_redacted_in_debug() {
        let key = Key128::from_u128(0x0123_4567_89ab_cdef_0011_2233_4455_6677);
        let text = format!("{:?}", KeyMaterial::Provisioned(key));
        assert!(!text.contains("0123"));
        assert!(format!("{:?}", KeyMaterial::Placeholder(DEFAULT_ADDR_KEY)).contains("b6d48a62"));
    }

    #[test]
    fn seed_gate_requires_both_flags() {
        let mut trust = TrustSignals::placeholder();
        assert_eq!(trust.seed_gate(Phase::Seed), None);
        trust.otp.seed_valid = false;
        assert_eq!(trust.seed_gate(Phase::Seed), Some(DenyReason::NotProvisioned));
        assert_eq!(trust.seed_gate(Phase::Rma), None);
        trust.otp.seed_valid = true;
        trust.lc.provision_en = false;
        assert_eq!(trust.seed_gate(Phase::Seed), Some(DenyReason::NotProvisioned));
    }

    #[test]
    fn rma_ack_carries_token() {
        assert_eq!(RmaAck::default(), RmaAck::idle());
        assert_eq!(RmaAck::acknowledge(0xdead_beef), RmaAck { ack: true, token: 0xdead_beef });
    }
}
