// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Request/response envelope exchanged with the flash backend
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 9 unit tests, burst/channel flows in tests/transactions.rs
//!
//! INVARIANTS:
//!   - A request carries at most one operation bit; it is derived from `FlashOp`
//!   - `prog_last` is set on exactly the final word of a program burst
//!   - A channel holds at most one request in flight

use std::fmt;
use std::str::FromStr;

use crate::address::{AddressSpace, FlashAddr};
use crate::error::{Error, Result};
use crate::partition::{PartitionKind, PartitionModel};
use crate::trust::ScrambleKeys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashOp {
    None,
    Read,
    Program,
    PageErase,
    BankErase,
}

impl FlashOp {
    pub const ALL: [FlashOp; 5] =
        [FlashOp::None, FlashOp::Read, FlashOp::Program, FlashOp::PageErase, FlashOp::BankErase];

    pub fn as_str(self) -> &'static str {
        match self {
            FlashOp::None => "none",
            FlashOp::Read => "read",
            FlashOp::Program => "program",
            FlashOp::PageErase => "page-erase",
            FlashOp::BankErase => "bank-erase",
        }
    }

    fn done_kind(self) -> Option<Done> {
        match self {
            FlashOp::None => None,
            FlashOp::Read => Some(Done::Read),
            FlashOp::Program => Some(Done::Program),
            FlashOp::PageErase | FlashOp::BankErase => Some(Done::Erase),
        }
    }
}

impl fmt::Display for FlashOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlashOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        FlashOp::ALL
            .into_iter()
            .find(|op| op.as_str() == key)
            .ok_or_else(|| Error::Rule(format!("unknown operation '{key}'")))
    }
}

/// Request envelope presented to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashReq {
    req: bool,
    rd: bool,
    prog: bool,
    pg_erase: bool,
    bk_erase: bool,
    partition: PartitionKind,
    addr: u32,
    prog_data: u64,
    prog_last: bool,
    scramble_en: bool,
    keys: ScrambleKeys,
}

impl FlashReq {
    /// Request with `req` deasserted.
    pub fn idle(keys: ScrambleKeys) -> Self {
        Self {
            req: false,
            rd: false,
            prog: false,
            pg_erase: false,
            bk_erase: false,
            partition: PartitionKind::Data,
            addr: 0,
            prog_data: 0,
            prog_last: false,
            scramble_en: false,
            keys,
        }
    }

    pub fn req(&self) -> bool {
        self.req
    }

    pub fn rd(&self) -> bool {
        self.rd
    }

    pub fn prog(&self) -> bool {
        self.prog
    }

    pub fn pg_erase(&self) -> bool {
        self.pg_erase
    }

    pub fn bk_erase(&self) -> bool {
        self.bk_erase
    }

    pub fn partition(&self) -> PartitionKind {
        self.partition
    }

    /// Bus address of the first addressed bus word.
    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn prog_data(&self) -> u64 {
        self.prog_data
    }

    pub fn prog_last(&self) -> bool {
        self.prog_last
    }

    pub fn scramble_en(&self) -> bool {
        self.scramble_en
    }

    pub fn keys(&self) -> &ScrambleKeys {
        &self.keys
    }

    pub fn op(&self) -> FlashOp {
        match (self.req, self.rd, self.prog, self.pg_erase, self.bk_erase) {
            (true, true, _, _, _) => FlashOp::Read,
            (true, _, true, _, _) => FlashOp::Program,
            (true, _, _, true, _) => FlashOp::PageErase,
            (true, _, _, _, true) => FlashOp::BankErase,
            _ => FlashOp::None,
        }
    }
}

/// Response envelope reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlashRsp {
    pub rd_done: bool,
    pub prog_done: bool,
    pub erase_done: bool,
    pub rd_data: u64,
    pub init_busy: bool,
}

/// Completion class as visible on the response; erase kinds share one bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Done {
    Read,
    Program,
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub done: Option<Done>,
    /// Present only when `done == Some(Done::Read)`.
    pub data: Option<u64>,
    pub busy: bool,
}

/// Packages one authorized operation. `addr` must lie inside `partition`.
#[allow(clippy::too_many_arguments)]
pub fn encode(
    space: &AddressSpace,
    partitions: &PartitionModel,
    op: FlashOp,
    partition: PartitionKind,
    addr: FlashAddr,
    payload: Option<u64>,
    scramble_en: bool,
    keys: ScrambleKeys,
) -> Result<FlashReq> {
    match (op, payload) {
        (FlashOp::Program, None) => return Err(Error::Malformed("program requires a payload word")),
        (FlashOp::Program, Some(_)) => {}
        (_, Some(_)) => return Err(Error::Malformed("payload supplied for non-program operation")),
        (_, None) => {}
    }
    if op == FlashOp::None {
        return Ok(FlashReq::idle(keys));
    }
    partitions.global_page(partition, addr)?;
    let bus_addr = space.compose_bus(addr, 0)?;
    Ok(FlashReq {
        req: true,
        rd: op == FlashOp::Read,
        prog: op == FlashOp::Program,
        pg_erase: op == FlashOp::PageErase,
        bk_erase: op == FlashOp::BankErase,
        partition,
        addr: bus_addr,
        prog_data: payload.unwrap_or_default(),
        prog_last: op == FlashOp::Program,
        scramble_en,
        keys,
    })
}

/// Packages a multi-word program starting at `start`. The burst must stay
/// within one page; only the final request carries `prog_last`.
pub fn encode_program_burst(
    space: &AddressSpace,
    partitions: &PartitionModel,
    partition: PartitionKind,
    start: FlashAddr,
    words: &[u64],
    scramble_en: bool,
    keys: ScrambleKeys,
) -> Result<Vec<FlashReq>> {
    if words.is_empty() {
        return Err(Error::Malformed("empty program burst"));
    }
    let words_per_page = 1u64 << space.word_bits();
    let end = u64::from(start.word) + words.len() as u64;
    if end > words_per_page {
        return Err(Error::out_of_range("program burst end word", end - 1, words_per_page - 1));
    }

    let last = words.len() - 1;
    words
        .iter()
        .enumerate()
        .map(|(idx, word)| {
            let addr = FlashAddr { word: start.word + idx as u32, ..start };
            let mut req =
                encode(space, partitions, FlashOp::Program, partition, addr, Some(*word), scramble_en, keys)?;
            req.prog_last = idx == last;
            Ok(req)
        })
        .collect()
}

/// Interprets a backend response.
pub fn decode(rsp: &FlashRsp) -> Result<Completion> {
    let done = match (rsp.rd_done, rsp.prog_done, rsp.erase_done) {
        (false, false, false) => None,
        (true, false, false) => Some(Done::Read),
        (false, true, false) => Some(Done::Program),
        (false, false, true) => Some(Done::Erase),
        _ => return Err(Error::Protocol("more than one done bit asserted")),
    };
    let data = (done == Some(Done::Read)).then_some(rsp.rd_data);
    Ok(Completion { done, data, busy: rsp.init_busy })
}

/// Tracks the single in-flight request of one backend channel.
#[derive(Debug, Default)]
pub struct BackendChannel {
    in_flight: Option<FlashOp>,
    backend_busy: bool,
}

impl BackendChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> Option<FlashOp> {
        self.in_flight
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && !self.backend_busy
    }

    /// Hands `req` to the backend. Rejected while a request is outstanding or
    /// the backend last reported `init_busy`.
    pub fn submit(&mut self, req: &FlashReq) -> Result<()> {
        if !self.is_idle() {
            return Err(Error::Busy);
        }
        match req.op() {
            FlashOp::None => Err(Error::Malformed("idle request submitted")),
            op => {
                self.in_flight = Some(op);
                Ok(())
            }
        }
    }

    /// Feeds one response; returns the completion once the in-flight request finishes.
    pub fn poll(&mut self, rsp: &FlashRsp) -> Result<Option<Completion>> {
        let completion = decode(rsp)?;
        self.backend_busy = completion.busy;
        let Some(done) = completion.done else {
            return Ok(None);
        };
        match self.in_flight.and_then(FlashOp::done_kind) {
            Some(expected) if expected == done => {
                self.in_flight = None;
                Ok(Some(completion))
            }
            Some(_) => Err(Error::Protocol("completion does not match in-flight request")),
            None => Err(Error::Protocol("completion with no request in flight")),
        }
    }
}
