//! Mode C: longest frame repetition.

use crate::error::RfpError;
use crate::message::{TestParameters, payload_from_fn};
use crate::progress::percent;

use super::{ModeIo, Payload, RunCore, Sequencer, TestModeReference};
use super::{build_uplink, certification_parameters};

const WINDOW_MS: u32 = 1_000;
const T_IFU_MS: u16 = 10;
const FILL: u8 = 0xAA;

#[derive(Clone, Debug)]
pub(crate) struct ModeC {
    core: RunCore,
    index: u16,
}

impl ModeC {
    pub(crate) const fn new() -> Self {
        Self {
            core: RunCore::new(TestModeReference::C),
            index: 0,
        }
    }

    fn loops(io: &ModeIo<'_>) -> u16 {
        if io.capabilities.single_frame { 1 } else { 3 }
    }

    fn send_frame(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        let tx_frequency_hz = self.core.rc()?.f_ul_hz;
        let payload = payload_from_fn(io.capabilities.max_payload_size(), |_| FILL);
        let common = self.core.common(io, 1, T_IFU_MS);
        let uplink = build_uplink(io.capabilities, common, Payload::Bytes(payload), false, 0);
        let test = TestParameters {
            tx_frequency_hz,
            ..certification_parameters(io.capabilities)
        };
        self.core.send(io, &uplink, &test, usize::from(self.index))
    }
}

impl Sequencer for ModeC {
    fn core(&self) -> &RunCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RunCore {
        &mut self.core
    }

    fn rewind(&mut self) {
        self.index = 0;
    }

    fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        self.send_frame(io)
    }

    fn step(&mut self, io: &mut ModeIo<'_>) -> Result<bool, RfpError> {
        if RunCore::take_message(io) {
            if RunCore::message_status(io).uplink_failed() {
                self.core.fail(io);
                return Ok(true);
            }
            let loops = Self::loops(io);
            self.index += 1;
            self.core.set_progress(percent(self.index, loops));
            if self.index >= loops {
                self.core.finish(io);
            } else {
                self.core.start_timer(io, WINDOW_MS)?;
            }
            return Ok(true);
        }
        if self.core.take_timer(io) {
            self.send_frame(io)?;
            return Ok(true);
        }
        Ok(false)
    }
}
