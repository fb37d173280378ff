use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rfp_core::endpoint::{
    EndPoint, EpConfig, McuTimer, NvmTestError, NvmTester, TimerConfig, TimerInstance,
};
use rfp_core::error::{EpApiError, McuApiError};
use rfp_core::message::{
    ApplicationMessage, ControlMessage, DL_PAYLOAD_SIZE_BYTES, DownlinkFrame, MessageStatus,
    TestFlag, TestParameters, UlBitRate, Uplink,
};
use rfp_core::modes::{DOWNLINK_PATTERN, ROUND_TRIP_PATTERN};
use rfp_core::repl::grammar::{DownlinkScript, FaultInjection};
use rfp_core::signals::RfpSignals;

/// Waiting time between the end of the uplink and the downlink window.
const DL_T_W_MS: u64 = 20_000;
/// Listening window used when the request leaves it to the stack.
const DL_T_RX_DEFAULT_MS: u64 = 25_000;
/// Time to demodulate a received downlink.
const DL_RECEPTION_MS: u64 = 1_100;
const DL_RSSI_DBM: i16 = -92;

const EP_ERROR_CLOSED: u16 = 1;
const EP_ERROR_BUSY: u16 = 2;
const EP_ERROR_NO_DOWNLINK: u16 = 3;
const MCU_ERROR_BAD_INSTANCE: u16 = 1;
const MCU_ERROR_NOT_RUNNING: u16 = 2;

/// Shared handle to the simulated radio.
pub type SharedSimulation = Rc<RefCell<Simulation>>;

/// Airtime of one uplink frame.
#[must_use]
pub fn frame_airtime_ms(bit_rate: UlBitRate) -> u64 {
    match bit_rate {
        UlBitRate::Bps100 => 2_080,
        UlBitRate::Bps600 => 347,
    }
}

/// One submission as seen on air.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    pub at_ms: u64,
    pub summary: String,
    pub tx_frequency_hz: u32,
    pub payload: Vec<u8>,
    pub uplink_enabled: bool,
}

impl fmt::Display for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}ms {}", self.at_ms, self.summary)?;
        if self.tx_frequency_hz == 0 {
            f.write_str(" freq=auto")?;
        } else {
            write!(f, " freq={}Hz", self.tx_frequency_hz)?;
        }
        if !self.uplink_enabled {
            f.write_str(" ul=off")?;
        }
        if !self.payload.is_empty() {
            f.write_str(" payload=")?;
            for byte in &self.payload {
                write!(f, "{byte:02X}")?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    done_at_ms: u64,
    status: MessageStatus,
    downlink: Option<DownlinkFrame>,
}

/// Next thing that happens on the virtual clock.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SimEvent {
    MessageDone,
    TimerExpired,
}

/// Virtual radio, clock and timer behind the bench collaborators.
pub struct Simulation {
    signals: &'static RfpSignals,
    blocking: bool,
    downlinks_enabled: bool,
    now_ms: u64,
    open_rc: Option<&'static str>,
    in_flight: Option<InFlight>,
    completion_pending: bool,
    last_status: MessageStatus,
    last_downlink: Option<DownlinkFrame>,
    timer_deadline_ms: Option<u64>,
    fault: Option<FaultInjection>,
    downlink_script: Option<DownlinkScript>,
    frames: Vec<FrameRecord>,
    nvm_result: Result<(), NvmTestError>,
}

impl Simulation {
    #[must_use]
    pub fn new(signals: &'static RfpSignals, blocking: bool, downlinks_enabled: bool) -> Self {
        Self {
            signals,
            blocking,
            downlinks_enabled,
            now_ms: 0,
            open_rc: None,
            in_flight: None,
            completion_pending: false,
            last_status: MessageStatus::default(),
            last_downlink: None,
            timer_deadline_ms: None,
            fault: None,
            downlink_script: None,
            frames: Vec::new(),
            nvm_result: Ok(()),
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedSimulation {
        Rc::new(RefCell::new(self))
    }

    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.blocking
    }

    #[must_use]
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    #[must_use]
    pub const fn open_rc(&self) -> Option<&'static str> {
        self.open_rc
    }

    /// Fault reported by the next completed message only.
    pub fn inject(&mut self, fault: FaultInjection) {
        self.fault = match fault {
            FaultInjection::Clear => None,
            other => Some(other),
        };
    }

    /// Overrides the payload of every later downlink until cleared with `None`.
    pub fn script_downlink(&mut self, script: Option<DownlinkScript>) {
        self.downlink_script = script;
    }

    pub fn set_nvm_result(&mut self, result: Result<(), NvmTestError>) {
        self.nvm_result = result;
    }

    /// Earliest pending event and when it fires.
    #[must_use]
    pub fn next_event(&self) -> Option<(u64, SimEvent)> {
        let message = self
            .in_flight
            .map(|flight| (flight.done_at_ms, SimEvent::MessageDone));
        let timer = self
            .timer_deadline_ms
            .map(|deadline| (deadline, SimEvent::TimerExpired));
        match (message, timer) {
            (Some(message), Some(timer)) => Some(if timer.0 < message.0 { timer } else { message }),
            (message, timer) => message.or(timer),
        }
    }

    /// Moves the clock to `target_ms`, firing at most one event on the way.
    /// Returns the event fired, if any.
    pub fn step_until(&mut self, target_ms: u64) -> Option<SimEvent> {
        match self.next_event() {
            Some((at_ms, event)) if at_ms <= target_ms => {
                self.now_ms = self.now_ms.max(at_ms);
                self.fire(event);
                Some(event)
            }
            _ => {
                self.now_ms = self.now_ms.max(target_ms);
                None
            }
        }
    }

    fn fire(&mut self, event: SimEvent) {
        match event {
            SimEvent::MessageDone => {
                if let Some(flight) = self.in_flight.take() {
                    self.last_status = flight.status;
                    self.last_downlink = flight.downlink;
                    self.completion_pending = true;
                    // The stack finishes the message from its own process tick.
                    self.signals.notify_ep_api_process();
                }
            }
            SimEvent::TimerExpired => {
                self.timer_deadline_ms = None;
                self.signals.notify_timer_complete();
            }
        }
    }

    fn submit(&mut self, uplink: &Uplink, test: &TestParameters) -> Result<(), EpApiError> {
        if self.open_rc.is_none() {
            return Err(EpApiError(EP_ERROR_CLOSED));
        }
        if self.in_flight.is_some() {
            return Err(EpApiError(EP_ERROR_BUSY));
        }

        let common = uplink.common();
        let frames = u64::from(common.number_of_frames.max(1));
        let uplink_enabled = test.flags.contains(TestFlag::UlEnable);
        let mut duration_ms = if uplink_enabled {
            frames * frame_airtime_ms(common.ul_bit_rate)
                + (frames - 1) * u64::from(common.t_ifu_ms)
        } else {
            0
        };

        let fault = self.fault.take();
        let mut bits = if uplink_enabled {
            [MessageStatus::UL_FRAME_1, MessageStatus::UL_FRAME_2, MessageStatus::UL_FRAME_3]
                .into_iter()
                .take(usize::from(common.number_of_frames.max(1)))
                .fold(0, |bits, frame| bits | frame)
        } else {
            0
        };

        let listening = uplink.is_bidirectional() && test.flags.contains(TestFlag::DlEnable);
        let mut downlink = None;
        if listening {
            let window_ms = if test.dl_t_rx_ms == 0 {
                DL_T_RX_DEFAULT_MS
            } else {
                u64::from(test.dl_t_rx_ms)
            };
            downlink = self.reply_for(uplink_enabled, fault);
            duration_ms += DL_T_W_MS;
            if downlink.is_some() {
                bits |= MessageStatus::DL_FRAME;
                duration_ms += DL_RECEPTION_MS.min(window_ms);
                if test.flags.contains(TestFlag::DlConfEnable) {
                    bits |= MessageStatus::DL_CONF_FRAME;
                    duration_ms += frame_airtime_ms(common.ul_bit_rate);
                }
            } else {
                bits |= MessageStatus::NETWORK_ERROR;
                duration_ms += window_ms;
            }
        }
        match fault {
            Some(FaultInjection::Execution) => bits |= MessageStatus::EXECUTION_ERROR,
            Some(FaultInjection::Network) => bits |= MessageStatus::NETWORK_ERROR,
            Some(FaultInjection::Clear) | None => {}
        }

        self.frames.push(FrameRecord {
            at_ms: self.now_ms,
            summary: uplink.to_string(),
            tx_frequency_hz: test.tx_frequency_hz,
            payload: uplink.payload().to_vec(),
            uplink_enabled,
        });

        let flight = InFlight {
            done_at_ms: self.now_ms + duration_ms,
            status: MessageStatus::from_bits(bits),
            downlink,
        };
        if self.blocking {
            self.now_ms = flight.done_at_ms;
            self.last_status = flight.status;
            self.last_downlink = flight.downlink;
        } else {
            self.in_flight = Some(flight);
        }
        Ok(())
    }

    fn reply_for(&self, uplink_enabled: bool, fault: Option<FaultInjection>) -> Option<DownlinkFrame> {
        if fault == Some(FaultInjection::Network) {
            return None;
        }
        let script = match self.downlink_script {
            Some(script) => script,
            None if !self.downlinks_enabled => return None,
            // Listen-only requests expect the static pattern, round trips the counter.
            None if uplink_enabled => DownlinkScript::Counter,
            None => DownlinkScript::Pattern,
        };
        let payload: [u8; DL_PAYLOAD_SIZE_BYTES] = match script {
            DownlinkScript::Pattern => DOWNLINK_PATTERN,
            DownlinkScript::Counter => ROUND_TRIP_PATTERN,
            DownlinkScript::Corrupt => {
                let mut bytes = DOWNLINK_PATTERN;
                bytes[DL_PAYLOAD_SIZE_BYTES - 1] ^= 0xFF;
                bytes
            }
            DownlinkScript::Silent => return None,
        };
        Some(DownlinkFrame {
            payload,
            rssi_dbm: DL_RSSI_DBM,
        })
    }
}

/// End-Point stack backed by the simulation.
pub struct SimEndPoint {
    sim: SharedSimulation,
}

impl SimEndPoint {
    #[must_use]
    pub fn new(sim: SharedSimulation) -> Self {
        Self { sim }
    }
}

impl EndPoint for SimEndPoint {
    fn open(&mut self, config: &EpConfig<'_>) -> Result<(), EpApiError> {
        let mut sim = self.sim.borrow_mut();
        if sim.open_rc.is_some() {
            return Err(EpApiError(EP_ERROR_BUSY));
        }
        sim.open_rc = Some(config.rc.name);
        Ok(())
    }

    fn close(&mut self) -> Result<(), EpApiError> {
        let mut sim = self.sim.borrow_mut();
        sim.open_rc = None;
        sim.in_flight = None;
        sim.completion_pending = false;
        Ok(())
    }

    fn process(&mut self) -> Result<(), EpApiError> {
        let mut sim = self.sim.borrow_mut();
        if std::mem::take(&mut sim.completion_pending) {
            sim.signals.notify_message_complete();
        }
        Ok(())
    }

    fn send_application_message(
        &mut self,
        message: &ApplicationMessage,
        test: &TestParameters,
    ) -> Result<(), EpApiError> {
        self.sim
            .borrow_mut()
            .submit(&Uplink::Application(message.clone()), test)
    }

    fn send_control_message(
        &mut self,
        message: &ControlMessage,
        test: &TestParameters,
    ) -> Result<(), EpApiError> {
        self.sim.borrow_mut().submit(&Uplink::Control(*message), test)
    }

    fn message_status(&self) -> MessageStatus {
        self.sim.borrow().last_status
    }

    fn downlink_frame(&mut self) -> Result<DownlinkFrame, EpApiError> {
        self.sim
            .borrow()
            .last_downlink
            .ok_or(EpApiError(EP_ERROR_NO_DOWNLINK))
    }
}

/// MCU timer backed by the virtual clock.
pub struct SimTimer {
    sim: SharedSimulation,
}

impl SimTimer {
    #[must_use]
    pub fn new(sim: SharedSimulation) -> Self {
        Self { sim }
    }
}

impl McuTimer for SimTimer {
    fn start(&mut self, timer: &TimerConfig) -> Result<(), McuApiError> {
        if timer.instance != TimerInstance::AddonRfp {
            return Err(McuApiError(MCU_ERROR_BAD_INSTANCE));
        }
        let mut sim = self.sim.borrow_mut();
        sim.timer_deadline_ms = Some(sim.now_ms + u64::from(timer.duration_ms));
        Ok(())
    }

    fn stop(&mut self, _instance: TimerInstance) -> Result<(), McuApiError> {
        self.sim.borrow_mut().timer_deadline_ms = None;
        Ok(())
    }

    fn wait_complete(&mut self, _instance: TimerInstance) -> Result<(), McuApiError> {
        let mut sim = self.sim.borrow_mut();
        let deadline = sim
            .timer_deadline_ms
            .take()
            .ok_or(McuApiError(MCU_ERROR_NOT_RUNNING))?;
        sim.now_ms = sim.now_ms.max(deadline);
        Ok(())
    }
}

/// NVM self test whose outcome the bench chooses.
pub struct SimNvm {
    sim: SharedSimulation,
}

impl SimNvm {
    #[must_use]
    pub fn new(sim: SharedSimulation) -> Self {
        Self { sim }
    }
}

impl NvmTester for SimNvm {
    fn run(&mut self) -> Result<(), NvmTestError> {
        self.sim.borrow().nvm_result
    }
}
