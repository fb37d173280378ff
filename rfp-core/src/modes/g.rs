//! Mode G: back-to-back frames through listen before talk.

use crate::error::RfpError;
use crate::message::{TestFlag, TestParameters, payload_from_fn};
use crate::progress::percent;

use super::{ModeIo, Payload, RunCore, Sequencer, TestModeReference};
use super::{build_uplink, certification_parameters};

const FRAMES: u16 = 2;
const T_IFU_MS: u16 = 1_000;
const LBT_CS_MAX_DURATION_FIRST_FRAME_MS: u32 = 12_000;
const FILL: u8 = 0xAA;

#[derive(Clone, Debug)]
pub(crate) struct ModeG {
    core: RunCore,
    index: u16,
}

impl ModeG {
    pub(crate) const fn new() -> Self {
        Self {
            core: RunCore::new(TestModeReference::G),
            index: 0,
        }
    }

    fn send_frame(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        let payload = payload_from_fn(io.capabilities.max_payload_size(), |_| FILL);
        let common = self.core.common(io, 3, T_IFU_MS);
        let uplink = build_uplink(io.capabilities, common, Payload::Bytes(payload), false, 0);
        let base = certification_parameters(io.capabilities);
        let test = TestParameters {
            flags: base.flags.with(TestFlag::TxControlLbtEnable, true),
            lbt_cs_max_duration_first_frame_ms: LBT_CS_MAX_DURATION_FIRST_FRAME_MS,
            ..base
        };
        self.core.send(io, &uplink, &test, usize::from(self.index))
    }
}

impl Sequencer for ModeG {
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
        if !RunCore::take_message(io) {
            return Ok(false);
        }
        if RunCore::message_status(io).execution_error() {
            self.core.fail(io);
            return Ok(true);
        }
        self.index += 1;
        self.core.set_progress(percent(self.index, FRAMES));
        if self.index >= FRAMES {
            self.core.finish(io);
        } else {
            self.send_frame(io)?;
        }
        Ok(true)
    }
}
