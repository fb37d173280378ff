#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;

use rfp_core::addon::{OpenConfig, RfpAddon};
use rfp_core::config::{Capabilities, OperatingMode};
use rfp_core::endpoint::{
    EndPoint, EpConfig, McuTimer, NvmTestError, NvmTester, TimerConfig, TimerInstance,
};
use rfp_core::error::{EpApiError, McuApiError};
use rfp_core::message::{
    ApplicationMessage, ControlMessage, DL_PAYLOAD_SIZE_BYTES, DownlinkFrame, MessageStatus,
    TestParameters, Uplink,
};
use rfp_core::regulatory::RadioConfiguration;
use rfp_core::signals::RfpSignals;

pub type Addon<'a> = RfpAddon<'a, MockEndPoint, MockTimer, MockNvm>;

thread_local! {
    static COMPLETIONS: Cell<u32> = const { Cell::new(0) };
    static PROCESS_REQUESTS: Cell<u32> = const { Cell::new(0) };
    static DOWNLINKS: Cell<u32> = const { Cell::new(0) };
    static LAST_DOWNLINK: Cell<Option<([u8; DL_PAYLOAD_SIZE_BYTES], i16)>> = const { Cell::new(None) };
}

pub fn on_completion() {
    COMPLETIONS.with(|count| count.set(count.get() + 1));
}

pub fn on_process_request() {
    PROCESS_REQUESTS.with(|count| count.set(count.get() + 1));
}

pub fn on_downlink(payload: &[u8; DL_PAYLOAD_SIZE_BYTES], rssi_dbm: i16) {
    DOWNLINKS.with(|count| count.set(count.get() + 1));
    LAST_DOWNLINK.with(|last| last.set(Some((*payload, rssi_dbm))));
}

pub fn completions() -> u32 {
    COMPLETIONS.with(Cell::get)
}

pub fn process_requests() -> u32 {
    PROCESS_REQUESTS.with(Cell::get)
}

pub fn downlinks() -> u32 {
    DOWNLINKS.with(Cell::get)
}

pub fn last_downlink() -> Option<([u8; DL_PAYLOAD_SIZE_BYTES], i16)> {
    LAST_DOWNLINK.with(Cell::get)
}

/// Each test runs on its own thread, so resetting the counters is enough.
pub fn reset_counters() {
    COMPLETIONS.with(|count| count.set(0));
    PROCESS_REQUESTS.with(|count| count.set(0));
    DOWNLINKS.with(|count| count.set(0));
    LAST_DOWNLINK.with(|last| last.set(None));
}

/// One recorded submission.
#[derive(Clone, Debug)]
pub struct Sent {
    pub uplink: Uplink,
    pub test: TestParameters,
}

/// End-Point double replaying scripted statuses and downlinks.
#[derive(Debug, Default)]
pub struct MockEndPoint {
    pub opened: Option<&'static str>,
    pub open_calls: usize,
    pub close_calls: usize,
    pub process_calls: usize,
    pub sent: Vec<Sent>,
    /// Status reported for successive messages; uplink-only success once empty.
    pub statuses: VecDeque<MessageStatus>,
    pub downlinks: VecDeque<DownlinkFrame>,
    pub refuse_open: bool,
    /// Refuse every submission after this many were accepted.
    pub accept_limit: Option<usize>,
    current: MessageStatus,
}

impl MockEndPoint {
    pub fn script(&mut self, statuses: &[u8]) {
        self.statuses = statuses
            .iter()
            .copied()
            .map(MessageStatus::from_bits)
            .collect();
    }

    pub fn queue_downlink(&mut self, payload: [u8; DL_PAYLOAD_SIZE_BYTES], rssi_dbm: i16) {
        self.downlinks.push_back(DownlinkFrame { payload, rssi_dbm });
    }

    fn submit(&mut self, uplink: Uplink, test: &TestParameters) -> Result<(), EpApiError> {
        if self.accept_limit.is_some_and(|limit| self.sent.len() >= limit) {
            return Err(EpApiError(0x42));
        }
        self.current = self
            .statuses
            .pop_front()
            .unwrap_or(MessageStatus::from_bits(MessageStatus::UL_FRAME_1));
        self.sent.push(Sent {
            uplink,
            test: *test,
        });
        Ok(())
    }
}

impl EndPoint for MockEndPoint {
    fn open(&mut self, config: &EpConfig<'_>) -> Result<(), EpApiError> {
        self.open_calls += 1;
        if self.refuse_open {
            return Err(EpApiError(0x10));
        }
        self.opened = Some(config.rc.name);
        Ok(())
    }

    fn close(&mut self) -> Result<(), EpApiError> {
        self.close_calls += 1;
        self.opened = None;
        Ok(())
    }

    fn process(&mut self) -> Result<(), EpApiError> {
        self.process_calls += 1;
        Ok(())
    }

    fn send_application_message(
        &mut self,
        message: &ApplicationMessage,
        test: &TestParameters,
    ) -> Result<(), EpApiError> {
        self.submit(Uplink::Application(message.clone()), test)
    }

    fn send_control_message(
        &mut self,
        message: &ControlMessage,
        test: &TestParameters,
    ) -> Result<(), EpApiError> {
        self.submit(Uplink::Control(*message), test)
    }

    fn message_status(&self) -> MessageStatus {
        self.current
    }

    fn downlink_frame(&mut self) -> Result<DownlinkFrame, EpApiError> {
        self.downlinks.pop_front().ok_or(EpApiError(0x30))
    }
}

#[derive(Debug, Default)]
pub struct MockTimer {
    pub started: Vec<u32>,
    pub stops: usize,
    pub waits: usize,
    pub refuse_stop: bool,
}

impl McuTimer for MockTimer {
    fn start(&mut self, timer: &TimerConfig) -> Result<(), McuApiError> {
        self.started.push(timer.duration_ms);
        Ok(())
    }

    fn stop(&mut self, _instance: TimerInstance) -> Result<(), McuApiError> {
        self.stops += 1;
        if self.refuse_stop {
            return Err(McuApiError(0x21));
        }
        Ok(())
    }

    fn wait_complete(&mut self, _instance: TimerInstance) -> Result<(), McuApiError> {
        self.waits += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockNvm {
    pub result: Result<(), NvmTestError>,
    pub runs: usize,
}

impl Default for MockNvm {
    fn default() -> Self {
        Self {
            result: Ok(()),
            runs: 0,
        }
    }
}

impl NvmTester for MockNvm {
    fn run(&mut self) -> Result<(), NvmTestError> {
        self.runs += 1;
        self.result
    }
}

pub fn build(signals: &RfpSignals, capabilities: Capabilities) -> Addon<'_> {
    reset_counters();
    RfpAddon::new(
        signals,
        MockEndPoint::default(),
        MockTimer::default(),
        MockNvm::default(),
        capabilities,
    )
    .expect("capabilities should validate")
}

/// Blocking build opened on `rc`.
pub fn open_blocking<'a>(
    signals: &'a RfpSignals,
    rc: &'a RadioConfiguration,
    capabilities: Capabilities,
) -> Addon<'a> {
    let mut addon = build(signals, capabilities);
    addon.open(&OpenConfig::new(rc)).expect("open");
    addon
}

/// Callback-driven build opened on `rc` with the process hook installed.
pub fn open_callback<'a>(signals: &'a RfpSignals, rc: &'a RadioConfiguration) -> Addon<'a> {
    let mut addon = build(signals, Capabilities::full(OperatingMode::CallbackDriven));
    addon
        .open(&OpenConfig::new(rc).with_process_callback(on_process_request))
        .expect("open");
    addon
}

pub fn application(sent: &Sent) -> &ApplicationMessage {
    match &sent.uplink {
        Uplink::Application(message) => message,
        other => panic!("expected an application message, got {other:?}"),
    }
}
