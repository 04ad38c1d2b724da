// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host CLI for flash controller protection rules
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 3 unit tests, 6 integration tests (tests/cli.rs)
//!
//! Subcommands:
//!   - table: list every rule per source, then the effective permissions
//!   - check: evaluate one access under a phase and trust state
//!   - addr: translate between flat, bus and (bank, page, word) addresses
//!
//! DEPENDENCIES:
//!   - clap: argument parsing
//!   - anyhow: error context for operator-facing failures
//!   - flash-ctrl-model: rule evaluation
//!   - log: config loading diagnostics (enabled through env_logger in main)

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{error::ErrorKind, Parser, Subcommand};
use flash_ctrl_model::{
    AccessRequest, FlashAddr, FlashConfig, FlashCtrl, FlashOp, MpPerm, PartitionKind, Phase, RuleSource,
    TrustSignals,
};

#[derive(Debug, Parser)]
#[command(name = "flash-policy", about = "Inspect and evaluate flash controller protection rules")]
struct Cli {
    /// TOML config file or directory of `*.toml` files.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every rule of every source.
    Table,
    /// Evaluate a single access.
    Check {
        #[arg(long)]
        phase: Phase,
        #[arg(long)]
        partition: PartitionKind,
        #[arg(long, default_value_t = 0)]
        bank: u32,
        #[arg(long)]
        page: u32,
        #[arg(long, default_value_t = 0)]
        word: u32,
        #[arg(long)]
        op: FlashOp,
        /// Simulate OTP reporting the seed as invalid.
        #[arg(long)]
        no_seed_valid: bool,
        /// Simulate life-cycle disabling provisioning.
        #[arg(long)]
        no_provision: bool,
        /// Simulate the power manager holding init.
        #[arg(long)]
        not_ready: bool,
    },
    /// Translate addresses.
    Addr {
        #[arg(long, conflicts_with_all = ["bus", "bank", "page", "word"])]
        flat: Option<u32>,
        #[arg(long, conflicts_with_all = ["bank", "page", "word"])]
        bus: Option<u32>,
        #[arg(long)]
        bank: Option<u32>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        word: Option<u32>,
        #[arg(long, default_value_t = 0)]
        sub: u32,
    },
}

/// Runs the CLI on `args` (including the program name) and returns its output.
pub fn execute<S: AsRef<str>>(args: &[S]) -> Result<String> {
    let cli = match Cli::try_parse_from(args.iter().map(|arg| arg.as_ref())) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return Ok(err.to_string());
        }
        Err(err) => return Err(err.into()),
    };
    let config = load_config(cli.config.as_deref())?;
    let ctrl = FlashCtrl::from_config(config).context("building flash controller model")?;

    match cli.command {
        Command::Table => Ok(render_table(&ctrl)),
        Command::Check { phase, partition, bank, page, word, op, no_seed_valid, no_provision, not_ready } => {
            let mut trust = TrustSignals::placeholder();
            trust.otp.seed_valid = !no_seed_valid;
            trust.lc.provision_en = !no_provision;
            trust.pwr.init = !not_ready;
            let request = AccessRequest::new(op, partition, FlashAddr::new(bank, page, word));
            let decision = ctrl.authorize(&request, phase, &trust).context("evaluating access")?;
            Ok(decision.to_string())
        }
        Command::Addr { flat, bus, bank, page, word, sub } => translate(&ctrl, flat, bus, bank, page, word, sub),
    }
}

fn load_config(path: Option<&Path>) -> Result<FlashConfig> {
    let Some(path) = path else {
        return Ok(FlashConfig::default());
    };
    let config = if path.is_dir() { FlashConfig::load_dir(path) } else { FlashConfig::load(path) };
    let config = config.with_context(|| format!("loading config from {}", path.display()))?;
    log::debug!(
        "flash-policy: loaded {} ({} info rules, {} data regions)",
        path.display(),
        config.software_rules.info().len(),
        config.software_rules.data().len()
    );
    Ok(config)
}

fn render_table(ctrl: &FlashCtrl) -> String {
    let partitions = ctrl.partitions();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "banks={} data_pages={} info_pages={}",
        partitions.banks(),
        partitions.total_pages(PartitionKind::Data),
        partitions.total_pages(PartitionKind::Info)
    );
    for source in ctrl.policy().sources() {
        render_source(&mut out, source);
    }
    render_effective(&mut out, ctrl);
    out.trim_end().to_string()
}

/// Combined permission per active phase for every info page named by a rule,
/// and for each data page span over which the matching regions do not change.
fn render_effective(out: &mut String, ctrl: &FlashCtrl) {
    let policy = ctrl.policy();
    let phases = Phase::ALL.into_iter().filter(|phase| phase.is_active());
    let data_total = ctrl.partitions().total_pages(PartitionKind::Data);

    let mut info_pages = BTreeSet::new();
    let mut bounds = BTreeSet::from([0, data_total]);
    for source in policy.sources() {
        info_pages.extend(source.info_rules().iter().map(|rule| rule.page()));
        for rule in source.data_rules() {
            bounds.insert(rule.base().min(data_total));
            bounds.insert(rule.base().saturating_add(rule.size()).min(data_total));
        }
    }

    for page in &info_pages {
        for phase in phases.clone() {
            let perm = policy.permitted_info(*page, phase).unwrap_or(MpPerm::empty());
            let _ = writeln!(out, "effective info page={page} phase={phase} perm={perm}");
        }
    }
    let bounds: Vec<u32> = bounds.into_iter().collect();
    for span in bounds.windows(2) {
        for phase in phases.clone() {
            let perm = policy.permitted_data(span[0], phase).unwrap_or(MpPerm::empty());
            let _ = writeln!(out, "effective data pages={}..{} phase={phase} perm={perm}", span[0], span[1]);
        }
    }
}

fn render_source(out: &mut String, source: &dyn RuleSource) {
    for rule in source.info_rules() {
        let _ = writeln!(
            out,
            "{} info page={} phase={} perm={}",
            source.owner(),
            rule.page(),
            rule.phase(),
            rule.perm()
        );
    }
    for rule in source.data_rules() {
        let _ = writeln!(
            out,
            "{} data base={} size={} phase={} perm={}",
            source.owner(),
            rule.base(),
            rule.size(),
            rule.phase(),
            rule.perm()
        );
    }
}

fn translate(
    ctrl: &FlashCtrl,
    flat: Option<u32>,
    bus: Option<u32>,
    bank: Option<u32>,
    page: Option<u32>,
    word: Option<u32>,
    sub: u32,
) -> Result<String> {
    let space = ctrl.address_space();
    let (addr, sub) = match (flat, bus) {
        (Some(flat), _) => (space.decompose(flat)?, 0),
        (None, Some(bus)) => space.decompose_bus(bus)?,
        (None, None) => {
            let (Some(page), bank, word) = (page, bank.unwrap_or(0), word.unwrap_or(0)) else {
                bail!("addr needs --flat, --bus or --page");
            };
            (FlashAddr::new(bank, page, word), sub)
        }
    };
    Ok(format!(
        "bank={} page={} word={} sub={} flat={:#x} bus={:#x}",
        addr.bank,
        addr.page,
        addr.word,
        sub,
        space.compose(addr)?,
        space.compose_bus(addr, sub)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_names_the_tool() {
        let out = execute(&["flash-policy", "--help"]).unwrap();
        assert!(out.contains("flash-policy"));
    }

    #[test]
    fn addr_requires_a_coordinate() {
        assert!(execute(&["flash-policy", "addr"]).is_err());
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let args = ["flash-policy", "check", "--phase", "prod", "--partition", "data", "--page", "0", "--op", "read"];
        assert!(execute(&args).is_err());
    }
}
