mod support;

use rfp_core::addon::{AddonState, OpenConfig, TestModeRequest, VERSION};
use rfp_core::config::{Capabilities, OperatingMode, SpectrumAccessSet};
use rfp_core::endpoint::NvmTestError;
use rfp_core::error::RfpError;
use rfp_core::message::{KeyType, UlBitRate};
use rfp_core::modes::TestModeReference;
use rfp_core::progress::ProgressStatus;
use rfp_core::regulatory::{RC1, RC2, RC3};
use rfp_core::signals::{RfpSignals, Signal};
use rfp_core::telemetry::JournalEvent;

use support::{
    build, completions, on_completion, open_blocking, open_callback, process_requests,
};

fn blocking() -> Capabilities {
    Capabilities::full(OperatingMode::Blocking)
}

#[test]
fn closed_addon_rejects_runs_and_version() {
    let signals = RfpSignals::new();
    let mut addon = build(&signals, blocking());

    assert_eq!(addon.state(), AddonState::Closed);
    assert_eq!(
        addon.test_mode(TestModeRequest::new(TestModeReference::C)),
        Err(RfpError::State)
    );
    assert_eq!(addon.version(), Err(RfpError::State));
    assert_eq!(addon.process(), Ok(()), "idle ticks are harmless");
    assert_eq!(addon.progress_status(), ProgressStatus::default());
    assert!(addon.endpoint().sent.is_empty());
}

#[test]
fn open_moves_to_ready_and_reports_version() {
    let signals = RfpSignals::new();
    let mut addon = build(&signals, blocking());

    addon.open(&OpenConfig::new(&RC2)).expect("open");

    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(addon.endpoint().opened, Some("RC2"));
    assert_eq!(addon.radio_configuration().map(|rc| rc.name), Some("RC2"));
    assert_eq!(addon.version(), Ok(VERSION));
    assert_eq!(
        addon.open(&OpenConfig::new(&RC1)),
        Err(RfpError::State),
        "a second open must be refused"
    );
    assert_eq!(addon.endpoint().open_calls, 1);
}

#[test]
fn refused_open_leaves_addon_closed() {
    let signals = RfpSignals::new();
    let mut addon = build(&signals, blocking());
    addon.endpoint_mut().refuse_open = true;

    assert_eq!(addon.open(&OpenConfig::new(&RC1)), Err(RfpError::EpApi));
    assert_eq!(addon.state(), AddonState::Closed);
    assert!(addon.radio_configuration().is_none());
}

#[test]
fn blocking_run_completes_before_test_mode_returns() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    addon
        .test_mode(TestModeRequest::new(TestModeReference::K).with_completion(on_completion))
        .expect("mode K");

    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(completions(), 1);
    assert_eq!(addon.progress_status(), ProgressStatus::new(false, 100));
    assert_eq!(addon.last_mode(), Some(TestModeReference::K));
    assert_eq!(addon.active_mode(), None);
    assert!(signals.pending().is_empty(), "no signal may linger after a run");
}

#[test]
fn callback_run_advances_only_on_process() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);

    addon
        .test_mode(TestModeRequest::new(TestModeReference::K).with_completion(on_completion))
        .expect("mode K");

    assert_eq!(addon.state(), AddonState::Processing);
    assert_eq!(addon.active_mode(), Some(TestModeReference::K));
    assert_eq!(addon.endpoint().sent.len(), 1);
    assert_eq!(completions(), 0);

    addon.process().expect("idle tick");
    assert_eq!(addon.state(), AddonState::Processing);

    let before = process_requests();
    signals.notify_message_complete();
    assert!(process_requests() > before, "host hook fires on every signal");

    addon.process().expect("completion tick");
    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(completions(), 1);
    assert_eq!(addon.progress_status(), ProgressStatus::new(false, 100));
}

#[test]
fn callback_build_without_hook_drives_itself() {
    let signals = RfpSignals::new();
    let mut addon = build(&signals, Capabilities::full(OperatingMode::CallbackDriven));
    addon.open(&OpenConfig::new(&RC1)).expect("open");

    addon
        .test_mode(TestModeRequest::new(TestModeReference::L).with_completion(on_completion))
        .expect("mode L");

    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(completions(), 1);
    assert_eq!(addon.nvm_mut().runs, 1);
}

#[test]
fn run_in_progress_refuses_a_second_mode() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);

    addon
        .test_mode(TestModeRequest::new(TestModeReference::C))
        .expect("mode C");
    assert_eq!(
        addon.test_mode(TestModeRequest::new(TestModeReference::K)),
        Err(RfpError::State)
    );
    assert_eq!(addon.active_mode(), Some(TestModeReference::C));
}

#[test]
fn unsupported_mode_is_rejected_without_side_effects() {
    let signals = RfpSignals::new();
    let caps = blocking().with_spectrum_access(SpectrumAccessSet::NONE);
    let mut addon = open_blocking(&signals, &RC3, caps);

    assert_eq!(
        addon.test_mode(TestModeRequest::new(TestModeReference::G)),
        Err(RfpError::TestMode)
    );
    assert_eq!(addon.state(), AddonState::Ready);
    assert!(addon.endpoint().sent.is_empty());
    assert_eq!(addon.last_mode(), None);
}

#[test]
fn downlink_modes_need_a_bidirectional_build() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking().with_bidirectional(false));

    for mode in [TestModeReference::D, TestModeReference::E, TestModeReference::F] {
        assert_eq!(
            addon.test_mode(TestModeRequest::new(mode)),
            Err(RfpError::TestMode),
            "mode {mode} should be refused"
        );
    }
}

#[test]
fn start_failure_stays_ready_without_completion() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    addon.nvm_mut().result = Err(NvmTestError::Unavailable);

    assert_eq!(
        addon.test_mode(TestModeRequest::new(TestModeReference::L).with_completion(on_completion)),
        Err(RfpError::TestModeStart)
    );
    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(completions(), 0);
    assert!(signals.pending().is_empty());
}

#[test]
fn refused_submission_mid_run_aborts_and_completes_once() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);
    addon.endpoint_mut().accept_limit = Some(1);

    addon
        .test_mode(TestModeRequest::new(TestModeReference::C).with_completion(on_completion))
        .expect("first frame accepted");

    signals.notify_message_complete();
    addon.process().expect("pacing timer armed");
    assert_eq!(addon.timer_mut().started, vec![1_000]);

    signals.notify_timer_complete();
    assert_eq!(addon.process(), Err(RfpError::EpApi));

    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(completions(), 1);
    assert!(addon.progress_status().error);

    addon.process().expect("nothing left to report");
    assert_eq!(completions(), 1, "completion fires exactly once");
}

#[test]
fn refused_first_frame_reports_the_submission_error() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());
    addon.endpoint_mut().accept_limit = Some(0);
    addon.timer_mut().refuse_stop = true;

    for mode in [TestModeReference::A, TestModeReference::J] {
        assert_eq!(
            addon.test_mode(TestModeRequest::new(mode).with_completion(on_completion)),
            Err(RfpError::EpApi),
            "mode {mode} should surface the refused submission"
        );
        assert_eq!(addon.state(), AddonState::Ready);
    }
    assert_eq!(addon.timer_mut().started, vec![9_000, 18_000]);
    assert_eq!(addon.timer_mut().stops, 2, "window timer is cancelled each time");
    assert_eq!(completions(), 0);
    assert!(signals.pending().is_empty());
}

#[test]
fn close_abandons_run_without_completion() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);

    addon
        .test_mode(TestModeRequest::new(TestModeReference::A).with_completion(on_completion))
        .expect("mode A");
    assert_eq!(addon.timer_mut().started, vec![9_000]);

    addon.close().expect("close");

    assert_eq!(addon.state(), AddonState::Closed);
    assert_eq!(addon.timer_mut().stops, 1, "pending pacing timer is cancelled");
    assert_eq!(completions(), 0);
    assert!(signals.pending().is_empty());
    assert!(!signals.has_process_callback());

    signals.notify_message_complete();
    addon.process().expect("closed ticks are ignored");
    assert_eq!(addon.state(), AddonState::Closed);
    assert_eq!(completions(), 0);
}

#[test]
fn close_from_ready_is_allowed() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    addon.close().expect("close");
    addon.close().expect("closing twice is harmless");

    assert_eq!(addon.state(), AddonState::Closed);
    assert_eq!(addon.endpoint().close_calls, 2);
    assert_eq!(addon.timer_mut().stops, 0);
}

#[test]
fn stack_process_requests_are_forwarded() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    signals.notify_ep_api_process();
    assert!(signals.is_pending(Signal::EpApiProcess));
    addon.process().expect("tick");

    assert_eq!(addon.endpoint().process_calls, 1);
    assert!(!signals.is_pending(Signal::EpApiProcess));
}

#[test]
fn request_overrides_reach_the_radio() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    addon
        .test_mode(
            TestModeRequest::new(TestModeReference::K)
                .with_bit_rate(UlBitRate::Bps600)
                .with_power(10),
        )
        .expect("mode K");

    let common = *addon.endpoint().sent[0].uplink.common();
    assert_eq!(common.ul_bit_rate, UlBitRate::Bps600);
    assert_eq!(common.tx_power_dbm_eirp, 10);
    assert_eq!(common.ep_key_type, KeyType::Public);
}

#[test]
fn default_power_is_the_rc_maximum() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    addon
        .test_mode(TestModeRequest::new(TestModeReference::K))
        .expect("mode K");

    let common = *addon.endpoint().sent[0].uplink.common();
    assert_eq!(common.ul_bit_rate, UlBitRate::Bps100);
    assert_eq!(common.tx_power_dbm_eirp, RC1.tx_power_dbm_eirp_max);
}

#[test]
fn journal_tracks_the_lifecycle() {
    let signals = RfpSignals::new();
    let mut addon = open_blocking(&signals, &RC1, blocking());

    addon
        .test_mode(TestModeRequest::new(TestModeReference::K))
        .expect("mode K");
    addon.close().expect("close");

    let events: Vec<JournalEvent> = addon
        .journal()
        .oldest_first()
        .map(|record| record.event)
        .collect();
    assert_eq!(
        events,
        vec![
            JournalEvent::Opened,
            JournalEvent::ModeStarted(TestModeReference::K),
            JournalEvent::FrameSubmitted(TestModeReference::K),
            JournalEvent::ModeCompleted(TestModeReference::K),
            JournalEvent::Closed,
        ]
    );
}

#[test]
fn reopening_after_close_starts_fresh() {
    let signals = RfpSignals::new();
    let mut addon = open_callback(&signals, &RC1);
    addon
        .test_mode(TestModeRequest::new(TestModeReference::C))
        .expect("mode C");
    addon.close().expect("close");

    addon.open(&OpenConfig::new(&RC2)).expect("reopen");
    assert_eq!(addon.state(), AddonState::Ready);
    assert_eq!(addon.radio_configuration().map(|rc| rc.name), Some("RC2"));
    assert_eq!(addon.last_mode(), None);
    assert_eq!(addon.progress_status(), ProgressStatus::default());
}
