//! Mode E: bidirectional loop with reception flags.
//!
//! Each of the 301 loops transmits a one-frame uplink whose flag tells the
//! tester whether the previous downlink arrived, opens a 4 s listening
//! window, then waits 6 s before the next loop.

use crate::error::RfpError;
use crate::message::{TestFlag, TestParameters, payload_from_fn};
use crate::progress::{PROGRESS_COMPLETE, percent};

use super::{ModeIo, Payload, RunCore, Sequencer, TestModeReference};
use super::{build_uplink, certification_parameters};

const LOOPS: u16 = 301;
const LISTENING_WINDOW_MS: u32 = 4_000;
const WAITING_MS: u32 = 6_000;
const T_CONF_MS: u16 = 1_400;
const T_IFU_MS: u16 = 500;

/// What the next step waits for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Wait,
    /// Timer expiry, then the next flagged uplink.
    UplinkOnly,
    /// Uplink completion, then the listening window.
    DownlinkOnly,
    /// Listening completion, then the inter-loop wait.
    Timer,
    /// Final wait expiry.
    End,
}

#[derive(Clone, Debug)]
pub(crate) struct ModeE {
    core: RunCore,
    state: State,
    index: u16,
    received: bool,
}

impl ModeE {
    pub(crate) const fn new() -> Self {
        Self {
            core: RunCore::new(TestModeReference::E),
            state: State::Wait,
            index: 0,
            received: true,
        }
    }

    fn payload(&self, io: &ModeIo<'_>) -> Payload {
        let size = io.capabilities.max_payload_size();
        if size == 0 {
            return Payload::Bit(self.received);
        }
        let flag = u8::from(self.received);
        Payload::Bytes(payload_from_fn(size, |index| {
            if index == 0 { flag } else { 0x00 }
        }))
    }

    fn send_uplink_only(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        self.index += 1;
        // 100% is reserved for the terminal completion.
        self.core
            .set_progress(percent(self.index, LOOPS).min(PROGRESS_COMPLETE - 1));

        let common = self.core.common(io, 1, T_IFU_MS);
        let uplink = build_uplink(io.capabilities, common, self.payload(io), true, T_CONF_MS);
        let base = certification_parameters(io.capabilities);
        let test = TestParameters {
            flags: base
                .flags
                .with(TestFlag::UlEnable, true)
                .with(TestFlag::DlEnable, false)
                .with(TestFlag::DlDecodingEnable, false)
                .with(TestFlag::DlConfEnable, false),
            ..base
        };
        self.state = State::DownlinkOnly;
        self.core.send(io, &uplink, &test, usize::from(self.index))
    }

    fn send_downlink_only(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        let common = self.core.common(io, 1, T_IFU_MS);
        let uplink = build_uplink(io.capabilities, common, self.payload(io), true, T_CONF_MS);
        let base = certification_parameters(io.capabilities);
        let test = TestParameters {
            dl_t_rx_ms: LISTENING_WINDOW_MS,
            flags: base
                .flags
                .with(TestFlag::UlEnable, false)
                .with(TestFlag::DlEnable, true)
                .with(TestFlag::DlDecodingEnable, true)
                .with(TestFlag::DlConfEnable, false),
            ..base
        };
        self.state = State::Timer;
        self.core.send(io, &uplink, &test, usize::from(self.index))
    }

    fn message_failed(&mut self, io: &mut ModeIo<'_>) -> bool {
        if RunCore::message_status(io).execution_error() {
            self.state = State::Wait;
            self.core.fail(io);
            return true;
        }
        false
    }
}

impl Sequencer for ModeE {
    fn core(&self) -> &RunCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RunCore {
        &mut self.core
    }

    fn rewind(&mut self) {
        self.state = State::UplinkOnly;
        self.index = 0;
        self.received = true;
    }

    fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        self.send_uplink_only(io)
    }

    fn step(&mut self, io: &mut ModeIo<'_>) -> Result<bool, RfpError> {
        match self.state {
            State::Wait => Ok(false),
            State::UplinkOnly => {
                if !self.core.take_timer(io) {
                    return Ok(false);
                }
                self.send_uplink_only(io)?;
                Ok(true)
            }
            State::DownlinkOnly => {
                if !RunCore::take_message(io) {
                    return Ok(false);
                }
                if !self.message_failed(io) {
                    self.send_downlink_only(io)?;
                }
                Ok(true)
            }
            State::Timer => {
                if !RunCore::take_message(io) {
                    return Ok(false);
                }
                if self.message_failed(io) {
                    return Ok(true);
                }
                self.received = RunCore::message_status(io).dl_frame();
                self.core.start_timer(io, WAITING_MS)?;
                self.state = if self.index >= LOOPS {
                    State::End
                } else {
                    State::UplinkOnly
                };
                Ok(true)
            }
            State::End => {
                if !self.core.take_timer(io) {
                    return Ok(false);
                }
                self.core.stop_timer(io)?;
                self.state = State::Wait;
                self.core.finish(io);
                Ok(true)
            }
        }
    }
}
