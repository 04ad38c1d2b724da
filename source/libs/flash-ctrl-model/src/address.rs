// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Flat/bus address <-> (bank, page, word) translation
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 5 unit tests, proptest round trips in tests/address_space.rs
//!
//! INVARIANTS:
//!   - Native address layout is `bank | page | word`, most significant first
//!   - Bus address is `native << bus_bits | sub_word`
//!   - Every component is checked against its width; nothing is masked silently

use crate::config::Topology;
use crate::error::{Error, Result};

/// Widest address this model will produce, in bits.
pub const MAX_ADDR_BITS: u32 = 32;

/// Decomposed native word coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlashAddr {
    pub bank: u32,
    pub page: u32,
    pub word: u32,
}

impl FlashAddr {
    pub const fn new(bank: u32, page: u32, word: u32) -> Self {
        Self { bank, page, word }
    }
}

/// Address arithmetic for one controller configuration. Pure; no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    bank_bits: u32,
    page_bits: u32,
    word_bits: u32,
    bus_bits: u32,
}

impl AddressSpace {
    /// Builds an address space from explicit component widths.
    ///
    /// `bus_bits` is log2 of the number of bus-visible words per native word.
    pub fn new(bank_bits: u32, page_bits: u32, word_bits: u32, bus_bits: u32) -> Result<Self> {
        let total = u64::from(bank_bits) + u64::from(page_bits) + u64::from(word_bits) + u64::from(bus_bits);
        if total > u64::from(MAX_ADDR_BITS) {
            return Err(Error::out_of_range("address width", total, u64::from(MAX_ADDR_BITS)));
        }
        Ok(Self { bank_bits, page_bits, word_bits, bus_bits })
    }

    /// Derives widths from a validated topology.
    pub fn from_topology(topology: &Topology) -> Result<Self> {
        Self::new(
            topology.banks.trailing_zeros(),
            topology.pages_per_bank.trailing_zeros(),
            topology.words_per_page.trailing_zeros(),
            topology.bus_words_per_word.trailing_zeros(),
        )
    }

    pub fn bank_bits(&self) -> u32 {
        self.bank_bits
    }

    pub fn page_bits(&self) -> u32 {
        self.page_bits
    }

    pub fn word_bits(&self) -> u32 {
        self.word_bits
    }

    pub fn bus_bits(&self) -> u32 {
        self.bus_bits
    }

    /// Number of native-word address bits (`bank + page + word`).
    pub fn native_bits(&self) -> u32 {
        self.bank_bits + self.page_bits + self.word_bits
    }

    /// Number of bus-word address bits.
    pub fn bus_addr_bits(&self) -> u32 {
        self.native_bits() + self.bus_bits
    }

    pub fn bus_words_per_word(&self) -> u32 {
        1 << self.bus_bits
    }

    /// Packs coordinates into a flat native-word address.
    pub fn compose(&self, addr: FlashAddr) -> Result<u32> {
        check("bank", addr.bank, self.bank_bits)?;
        check("page", addr.page, self.page_bits)?;
        check("word", addr.word, self.word_bits)?;
        let flat = (u64::from(addr.bank) << (self.page_bits + self.word_bits))
            | (u64::from(addr.page) << self.word_bits)
            | u64::from(addr.word);
        Ok(flat as u32)
    }

    /// Splits a flat native-word address into coordinates.
    pub fn decompose(&self, flat: u32) -> Result<FlashAddr> {
        check("address", flat, self.native_bits())?;
        let flat = u64::from(flat);
        Ok(FlashAddr {
            bank: ((flat >> (self.page_bits + self.word_bits)) & mask(self.bank_bits)) as u32,
            page: ((flat >> self.word_bits) & mask(self.page_bits)) as u32,
            word: (flat & mask(self.word_bits)) as u32,
        })
    }

    /// Packs coordinates plus a sub-word index into a bus address.
    pub fn compose_bus(&self, addr: FlashAddr, sub_word: u32) -> Result<u32> {
        check("sub-word", sub_word, self.bus_bits)?;
        let native = u64::from(self.compose(addr)?);
        Ok(((native << self.bus_bits) | u64::from(sub_word)) as u32)
    }

    /// Splits a bus address into native coordinates and the sub-word index.
    pub fn decompose_bus(&self, bus: u32) -> Result<(FlashAddr, u32)> {
        check("bus address", bus, self.bus_addr_bits())?;
        let sub_word = (u64::from(bus) & mask(self.bus_bits)) as u32;
        let native = (u64::from(bus) >> self.bus_bits) as u32;
        Ok((self.decompose(native)?, sub_word))
    }

    /// Bank-major page number: `bank * pages_per_bank + page`.
    pub fn page_index(&self, addr: FlashAddr) -> u32 {
        (addr.bank << self.page_bits) | addr.page
    }
}

fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

fn check(what: &'static str, value: u32, bits: u32) -> Result<()> {
    let limit = mask(bits);
    if u64::from(value) > limit {
        return Err(Error::out_of_range(what, u64::from(value), limit));
    }
    Ok(())
}
