mod support;

use rfp_core::addon::{AddonState, TestModeRequest};
use rfp_core::config::{Capabilities, OperatingMode};
use rfp_core::endpoint::NvmTestError;
use rfp_core::error::RfpError;
use rfp_core::message::{
    ApplicationMessageType, KeyType, MessageStatus, TestFlag, TestParameters, Uplink,
};
use rfp_core::modes::{DOWNLINK_PATTERN, ROUND_TRIP_PATTERN, TestModeReference};
use rfp_core::progress::ProgressStatus;
use rfp_core::regulatory::{RC1, RC2, RC3, RadioConfiguration};
use rfp_core::signals::RfpSignals;
use rfp_core::telemetry::JournalEvent;

use support::{
    application, completions, downlinks, last_downlink, on_completion, on_downlink,
    open_blocking, open_callback,
};

const UL: u8 = MessageStatus::UL_FRAME_1;
const DL: u8 = MessageStatus::UL_FRAME_1 | MessageStatus::DL_FRAME;

fn blocking() -> Capabilities {
    Capabilities::full(OperatingMode::Blocking)
}

fn run(addon: &mut support::Addon<'_>, mode: TestModeReference) {
    addon
        .test_mode(TestModeRequest::new(mode).with_completion(on_completion))
        .unwrap_or_else(|err| panic!("mode {mode} failed to run: {err}"));
    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(completions(), 1);
}

#[test]
fn mode_a_sweeps_nine_carriers_in_100_hz_steps() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    run(&mut addon, TestModeReference::A);

    let sent = &addon.endpoint().sent;
    assert_eq!(sent.len(), 9);
    for (index, frame) in (0u32..).zip(sent.iter()) {
        assert_eq!(frame.test.tx_frequency_hz, RC1.f_ul_hz + 100 * index);
        assert_eq!(frame.uplink.common().number_of_frames, 1);
        assert_eq!(application(frame).payload.len(), 12);
        assert_eq!(application(frame).payload[0], 0x40);
    }
    assert_eq!(addon.timer_mut().started, vec![9_000; 9]);
    assert_eq!(addon.timer_mut().waits, 9);
    assert!(addon.progress_status().is_complete());
}

#[test]
fn mode_a_reports_progress_per_frame() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);
    addon
        .test_mode(TestModeRequest::new(TestModeReference::A))
        .expect("mode A");

    signals.notify_message_complete();
    addon.process().expect("message only");
    assert_eq!(addon.progress_status().progress, 0, "timer still pending");

    signals.notify_timer_complete();
    addon.process().expect("frame done");
    assert_eq!(addon.progress_status(), ProgressStatus::new(false, 11));
    assert_eq!(addon.endpoint().sent.len(), 2);
}

#[test]
fn mode_b_keeps_channel_access_enabled() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC3, blocking());

    run(&mut addon, TestModeReference::B);

    let sent = &addon.endpoint().sent;
    assert_eq!(sent.len(), 16);
    assert!(sent.iter().all(|frame| frame.test == TestParameters::DEFAULT));
    assert!(matches!(sent[15].uplink, Uplink::Control(_)));
    assert_eq!(addon.timer_mut().started, vec![18_000; 16]);
}

#[test]
fn mode_j_walks_the_catalogue_with_access_controls_off() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking().with_payload_size(Some(0)));

    run(&mut addon, TestModeReference::J);

    let kinds: Vec<_> = addon
        .endpoint()
        .sent
        .iter()
        .map(|frame| match &frame.uplink {
            Uplink::Application(message) => Some(message.kind),
            Uplink::Control(_) => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(ApplicationMessageType::Bit0),
            Some(ApplicationMessageType::Bit1),
            Some(ApplicationMessageType::Empty),
            None,
        ]
    );
    let flags = addon.endpoint().sent[0].test.flags;
    assert!(!flags.contains(TestFlag::TxControlFhEnable));
    assert!(!flags.contains(TestFlag::TxControlLbtEnable));
    assert!(!flags.contains(TestFlag::TxControlLdcEnable));
}

#[test]
fn mode_c_repeats_the_longest_frame_three_times() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC2, blocking());

    run(&mut addon, TestModeReference::C);

    let sent = &addon.endpoint().sent;
    assert_eq!(sent.len(), 3);
    for frame in sent {
        assert_eq!(frame.test.tx_frequency_hz, RC2.f_ul_hz);
        assert_eq!(application(frame).payload.as_slice(), &[0xAA; 12]);
    }
    assert_eq!(addon.timer_mut().started, vec![1_000; 2]);
    assert!(addon.progress_status().is_complete());
}

#[test]
fn mode_c_sends_once_on_single_frame_builds() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking().with_single_frame(true));

    run(&mut addon, TestModeReference::C);

    assert_eq!(addon.endpoint().sent.len(), 1);
    assert!(addon.timer_mut().started.is_empty());
}

#[test]
fn execution_error_fails_the_run_but_still_completes() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    addon.endpoint_mut().script(&[MessageStatus::EXECUTION_ERROR]);

    run(&mut addon, TestModeReference::C);

    assert_eq!(addon.endpoint().sent.len(), 1);
    assert_eq!(addon.progress_status(), ProgressStatus::new(true, 0));
    assert_eq!(
        addon.journal().latest().map(|record| record.event),
        Some(JournalEvent::ModeFailed(TestModeReference::C))
    );
}

fn network_error_aborts(mode: TestModeReference, rc: &'static RadioConfiguration) {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, rc, blocking());
    addon.endpoint_mut().script(&[UL, MessageStatus::NETWORK_ERROR]);

    run(&mut addon, mode);

    assert_eq!(addon.endpoint().sent.len(), 2, "mode {mode} stops at the failed frame");
    let status = addon.progress_status();
    assert!(status.error, "mode {mode} must flag the network error");
    assert!(status.progress < 100, "mode {mode} reported {status:?}");
    assert_eq!(
        addon.journal().latest().map(|record| record.event),
        Some(JournalEvent::ModeFailed(mode))
    );
}

#[test]
fn mode_a_fails_on_network_error() {
    network_error_aborts(TestModeReference::A, &RC1);
}

#[test]
fn mode_b_fails_on_network_error() {
    network_error_aborts(TestModeReference::B, &RC3);
}

#[test]
fn mode_c_fails_on_network_error() {
    network_error_aborts(TestModeReference::C, &RC2);
}

#[test]
fn mode_j_fails_on_network_error() {
    network_error_aborts(TestModeReference::J, &RC1);
}

#[test]
fn progress_never_decreases_across_a_sweep() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);
    addon
        .test_mode(TestModeRequest::new(TestModeReference::A).with_completion(on_completion))
        .expect("mode A");

    let mut seen = vec![addon.progress_status().progress];
    while addon.state() == AddonState::Processing {
        assert!(seen.len() <= 9, "sweep did not finish after nine frames");
        signals.notify_message_complete();
        signals.notify_timer_complete();
        addon.process().expect("frame tick");
        seen.push(addon.progress_status().progress);
    }

    assert!(
        seen.windows(2).all(|pair| pair[0] <= pair[1]),
        "progress went backwards: {seen:?}"
    );
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert_eq!(completions(), 1);
}

#[test]
fn new_run_resets_progress_left_by_a_failed_one() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);
    addon
        .endpoint_mut()
        .script(&[UL, MessageStatus::EXECUTION_ERROR]);
    addon
        .test_mode(TestModeRequest::new(TestModeReference::C))
        .expect("mode C");

    signals.notify_message_complete();
    addon.process().expect("first frame done");
    signals.notify_timer_complete();
    addon.process().expect("second frame sent");
    signals.notify_message_complete();
    addon.process().expect("failure is reported through progress");
    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(addon.progress_status(), ProgressStatus::new(true, 33));

    addon
        .test_mode(TestModeRequest::new(TestModeReference::A))
        .expect("mode A");
    assert_eq!(addon.state(), AddonState::Processing);
    assert_eq!(addon.progress_status(), ProgressStatus::new(false, 0));
}

#[test]
fn mode_d_reports_only_matching_downlinks() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    let mut wrong = DOWNLINK_PATTERN;
    wrong[7] ^= 0xFF;
    {
        let endpoint = addon.endpoint_mut();
        endpoint.script(&[DL, DL, MessageStatus::NETWORK_ERROR]);
        endpoint.queue_downlink(wrong, -80);
        endpoint.queue_downlink(DOWNLINK_PATTERN, -95);
    }

    addon
        .test_mode(
            TestModeRequest::new(TestModeReference::D)
                .with_completion(on_completion)
                .with_downlink(on_downlink),
        )
        .expect("mode D");

    assert_eq!(downlinks(), 1);
    assert_eq!(last_downlink(), Some((DOWNLINK_PATTERN, -95)));
    assert_eq!(addon.endpoint().sent.len(), 3, "listening resumes after each frame");
    assert!(addon.progress_status().is_complete());

    let listen = &addon.endpoint().sent[0].test;
    assert_eq!(listen.rx_frequency_hz, RC1.f_dl_hz);
    assert_eq!(listen.dl_t_rx_ms, 30_000);
    assert!(!listen.flags.contains(TestFlag::UlEnable));
    assert!(listen.flags.contains(TestFlag::DlEnable));
    assert!(
        addon
            .journal()
            .oldest_first()
            .any(|record| record.event == JournalEvent::DownlinkMatched(TestModeReference::D))
    );
}

#[test]
fn mode_e_flags_whether_the_previous_downlink_arrived() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    addon.endpoint_mut().script(&[UL, DL, UL, UL]);

    run(&mut addon, TestModeReference::E);

    let sent = &addon.endpoint().sent;
    assert_eq!(sent.len(), 602, "301 loops of uplink then listening window");
    assert_eq!(application(&sent[0]).payload[0], 1);
    assert_eq!(application(&sent[2]).payload[0], 1, "first window received");
    assert_eq!(application(&sent[4]).payload[0], 0, "second window stayed silent");
    assert_eq!(sent[1].test.dl_t_rx_ms, 4_000);
    assert!(sent[1].test.flags.contains(TestFlag::DlDecodingEnable));
    assert!(!sent[1].test.flags.contains(TestFlag::UlEnable));
    assert!(addon.progress_status().is_complete());
}

#[test]
fn mode_e_holds_progress_below_100_until_the_end() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);
    addon
        .test_mode(TestModeRequest::new(TestModeReference::E))
        .expect("mode E");

    for _ in 0..300 {
        signals.notify_message_complete();
        addon.process().expect("uplink done");
        signals.notify_message_complete();
        addon.process().expect("window done");
        signals.notify_timer_complete();
        addon.process().expect("wait done");
    }
    assert_eq!(addon.state(), AddonState::Processing);
    assert_eq!(addon.progress_status().progress, 99);

    signals.notify_message_complete();
    addon.process().expect("last uplink");
    signals.notify_message_complete();
    addon.process().expect("last window");
    assert_eq!(addon.progress_status().progress, 99);
    signals.notify_timer_complete();
    addon.process().expect("last wait");

    assert_eq!(addon.state(), AddonState::Ready);
    assert!(addon.progress_status().is_complete());
}

#[test]
fn mode_f_reports_a_matching_round_trip() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    addon.endpoint_mut().script(&[DL]);
    addon.endpoint_mut().queue_downlink(ROUND_TRIP_PATTERN, -100);

    run(&mut addon, TestModeReference::F);

    let sent = &addon.endpoint().sent;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].uplink.is_bidirectional());
    assert_eq!(application(&sent[1]).payload[0], 1);
    assert!(application(&sent[1]).payload[1..].iter().all(|&byte| byte == 0));
    assert!(addon.progress_status().is_complete());
}

#[test]
fn mode_f_reports_a_corrupted_round_trip() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    let mut corrupted = ROUND_TRIP_PATTERN;
    corrupted[3] = 0x00;
    addon.endpoint_mut().script(&[DL]);
    addon.endpoint_mut().queue_downlink(corrupted, -100);

    run(&mut addon, TestModeReference::F);

    assert_eq!(application(&addon.endpoint().sent[1]).payload[0], 0);
    assert!(addon.progress_status().is_complete());
}

#[test]
fn mode_f_fails_without_a_downlink() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    addon.endpoint_mut().script(&[MessageStatus::NETWORK_ERROR]);

    run(&mut addon, TestModeReference::F);

    assert_eq!(addon.endpoint().sent.len(), 1);
    assert_eq!(addon.progress_status(), ProgressStatus::new(true, 50));
}

#[test]
fn mode_g_forces_listen_before_talk() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC3, blocking());

    run(&mut addon, TestModeReference::G);

    let sent = &addon.endpoint().sent;
    assert_eq!(sent.len(), 2);
    for frame in sent {
        assert!(frame.test.flags.contains(TestFlag::TxControlLbtEnable));
        assert_eq!(frame.test.lbt_cs_max_duration_first_frame_ms, 12_000);
    }
}

#[test]
fn mode_k_uses_the_public_key() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    run(&mut addon, TestModeReference::K);

    let sent = &addon.endpoint().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].uplink.common().ep_key_type, KeyType::Public);
    assert_eq!(sent[0].uplink.common().number_of_frames, 3);
}

#[test]
fn mode_k_fails_on_network_error() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    addon.endpoint_mut().script(&[MessageStatus::NETWORK_ERROR]);

    run(&mut addon, TestModeReference::K);

    assert!(addon.progress_status().error);
}

#[test]
fn mode_l_mirrors_the_nvm_outcome() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    run(&mut addon, TestModeReference::L);
    assert!(addon.progress_status().is_complete());
    assert!(addon.endpoint().sent.is_empty());

    addon.nvm_mut().result = Err(NvmTestError::Failed);
    addon
        .test_mode(TestModeRequest::new(TestModeReference::L))
        .expect("failed test still completes");
    assert!(addon.progress_status().error);

    addon.nvm_mut().result = Err(NvmTestError::Unavailable);
    assert_eq!(
        addon.test_mode(TestModeRequest::new(TestModeReference::L)),
        Err(RfpError::TestModeStart)
    );
    assert_eq!(addon.nvm_mut().runs, 3);
}
