//! Mode F: downlink content round trip.
//!
//! A bidirectional uplink solicits a downlink from the tester; the follow-up
//! uplink reports in its first byte (or bit) whether every downlink byte
//! matched [`ROUND_TRIP_PATTERN`].

use crate::error::RfpError;
use crate::message::{DL_PAYLOAD_SIZE_BYTES, payload_from_fn};

use super::{ModeIo, Payload, RunCore, Sequencer, TestModeReference};
use super::{build_uplink, certification_parameters};

/// Downlink the tester must echo: `0x30 + byte index`.
pub const ROUND_TRIP_PATTERN: [u8; DL_PAYLOAD_SIZE_BYTES] =
    [0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37];

const T_CONF_MS: u16 = 2_000;
const T_IFU_MS: u16 = 500;
const FILL: u8 = 0xAA;
const CHECKUP_PROGRESS: u8 = 50;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Wait,
    /// Waiting for the solicited downlink.
    Checkup,
    /// Waiting for the report uplink.
    End,
}

#[derive(Clone, Debug)]
pub(crate) struct ModeF {
    core: RunCore,
    state: State,
}

impl ModeF {
    pub(crate) const fn new() -> Self {
        Self {
            core: RunCore::new(TestModeReference::F),
            state: State::Wait,
        }
    }

    fn send_downlink_request(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        let size = io.capabilities.max_payload_size();
        let common = self.core.common(io, 3, T_IFU_MS);
        let payload = Payload::Bytes(payload_from_fn(size, |_| FILL));
        let uplink = build_uplink(io.capabilities, common, payload, true, T_CONF_MS);
        let test = certification_parameters(io.capabilities);
        self.state = State::Checkup;
        self.core.send(io, &uplink, &test, 0)
    }

    fn send_report(&mut self, io: &mut ModeIo<'_>, pass: bool) -> Result<(), RfpError> {
        let size = io.capabilities.max_payload_size();
        let payload = if size == 0 {
            Payload::Bit(pass)
        } else {
            let verdict = u8::from(pass);
            Payload::Bytes(payload_from_fn(size, |index| {
                if index == 0 { verdict } else { 0x00 }
            }))
        };
        let common = self.core.common(io, 1, T_IFU_MS);
        let uplink = build_uplink(io.capabilities, common, payload, false, T_CONF_MS);
        let test = certification_parameters(io.capabilities);
        self.state = State::End;
        self.core.send(io, &uplink, &test, 1)
    }

    fn fail(&mut self, io: &mut ModeIo<'_>) {
        self.state = State::Wait;
        self.core.fail(io);
    }
}

impl Sequencer for ModeF {
    fn core(&self) -> &RunCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RunCore {
        &mut self.core
    }

    fn rewind(&mut self) {
        self.state = State::Wait;
    }

    fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        self.send_downlink_request(io)
    }

    fn step(&mut self, io: &mut ModeIo<'_>) -> Result<bool, RfpError> {
        if self.state == State::Wait || !RunCore::take_message(io) {
            return Ok(false);
        }
        let status = RunCore::message_status(io);
        if status.execution_error() {
            self.fail(io);
            return Ok(true);
        }
        match self.state {
            State::Checkup => {
                self.core.set_progress(CHECKUP_PROGRESS);
                if !status.dl_frame() {
                    self.fail(io);
                    return Ok(true);
                }
                let frame = io.endpoint.downlink_frame()?;
                self.send_report(io, frame.payload == ROUND_TRIP_PATTERN)?;
            }
            State::End => {
                self.state = State::Wait;
                self.core.finish(io);
            }
            State::Wait => return Ok(false),
        }
        Ok(true)
    }
}
