//! CONTEXT: Program bursts and single-in-flight backend channel behavior
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 4 integration tests
//!
//! TEST_SCENARIOS:
//!   - burst_sets_last_exactly_once(): prog_last on the final word only
//!   - channel_rejects_second_submit(): one request in flight per channel
//!   - channel_waits_for_init(): init_busy blocks submission until cleared
//!   - channel_rejects_mismatched_completion(): done bit must match request

use flash_ctrl_model::{
    BackendChannel, Done, Error, FlashAddr, FlashConfig, FlashCtrl, FlashOp, FlashRsp,
    PartitionKind, Phase, TrustSignals,
};

fn rma_writable_ctrl() -> FlashCtrl {
    let config = FlashConfig::from_toml_str(
        "[[data_region]]\nphase = \"rma\"\nbase = 8\nsize = 1\nperm = [\"en\", \"prog\"]\n",
    )
    .unwrap();
    FlashCtrl::from_config(config).unwrap()
}

#[test]
fn burst_sets_last_exactly_once() {
    let ctrl = rma_writable_ctrl();
    let words = [0x11, 0x22, 0x33, 0x44];
    let burst = ctrl
        .prepare_program_burst(
            PartitionKind::Data,
            FlashAddr::new(0, 8, 10),
            &words,
            false,
            Phase::Rma,
            &TrustSignals::placeholder(),
        )
        .unwrap();
    assert_eq!(burst.len(), 4);
    assert_eq!(burst.iter().filter(|req| req.prog_last()).count(), 1);
    assert!(burst[3].prog_last());
    for (idx, req) in burst.iter().enumerate() {
        assert_eq!(req.op(), FlashOp::Program);
        assert_eq!(req.prog_data(), words[idx]);
        let (addr, sub) = ctrl.address_space().decompose_bus(req.addr()).unwrap();
        assert_eq!(addr, FlashAddr::new(0, 8, 10 + idx as u32));
        assert_eq!(sub, 0);
    }

    let denied = ctrl.prepare_program_burst(
        PartitionKind::Data,
        FlashAddr::new(0, 9, 0),
        &words,
        false,
        Phase::Rma,
        &TrustSignals::placeholder(),
    );
    assert!(matches!(denied, Err(Error::Denied(_))));
}

#[test]
fn channel_rejects_second_submit() {
    let ctrl = rma_writable_ctrl();
    let burst = ctrl
        .prepare_program_burst(
            PartitionKind::Data,
            FlashAddr::new(0, 8, 0),
            &[1, 2],
            false,
            Phase::Rma,
            &TrustSignals::placeholder(),
        )
        .unwrap();

    let mut channel = BackendChannel::new();
    channel.submit(&burst[0]).unwrap();
    assert!(matches!(channel.submit(&burst[1]), Err(Error::Busy)));
    assert_eq!(channel.poll(&FlashRsp::default()).unwrap(), None);
    assert_eq!(channel.in_flight(), Some(FlashOp::Program));

    let done = channel.poll(&FlashRsp { prog_done: true, ..FlashRsp::default() }).unwrap().unwrap();
    assert_eq!(done.done, Some(Done::Program));
    assert!(channel.is_idle());
    channel.submit(&burst[1]).unwrap();
}

#[test]
fn channel_waits_for_init() {
    let ctrl = rma_writable_ctrl();
    let read = ctrl
        .prepare(
            &flash_ctrl_model::AccessRequest::new(FlashOp::Read, PartitionKind::Data, FlashAddr::new(1, 0, 0)),
            None,
            false,
            Phase::Rma,
            &TrustSignals::placeholder(),
        )
        .unwrap();
    let mut channel = BackendChannel::new();
    assert_eq!(channel.poll(&FlashRsp { init_busy: true, ..FlashRsp::default() }).unwrap(), None);
    assert!(matches!(channel.submit(&read), Err(Error::Busy)));
    channel.poll(&FlashRsp::default()).unwrap();
    channel.submit(&read).unwrap();
    let done = channel.poll(&FlashRsp { rd_done: true, rd_data: 0x5a5a, ..FlashRsp::default() }).unwrap().unwrap();
    assert_eq!(done.data, Some(0x5a5a));
}

#[test]
fn channel_rejects_mismatched_completion() {
    let ctrl = rma_writable_ctrl();
    let erase = ctrl
        .prepare(
            &flash_ctrl_model::AccessRequest::new(FlashOp::BankErase, PartitionKind::Data, FlashAddr::new(0, 0, 0)),
            None,
            false,
            Phase::Rma,
            &TrustSignals::placeholder(),
        )
        .unwrap();
    let mut channel = BackendChannel::new();
    assert!(matches!(
        channel.poll(&FlashRsp { erase_done: true, ..FlashRsp::default() }),
        Err(Error::Protocol(_))
    ));
    channel.submit(&erase).unwrap();
    assert!(matches!(
        channel.poll(&FlashRsp { rd_done: true, ..FlashRsp::default() }),
        Err(Error::Protocol(_))
    ));
    assert!(channel.poll(&FlashRsp { erase_done: true, ..FlashRsp::default() }).unwrap().is_some());
}
