//! Mode A: frequency synthesis sweep.
//!
//! Nine single-frame uplinks paced by a 9 s window, the forced carrier moving
//! up by 100 Hz from the RC's central uplink frequency on every frame.

use crate::error::RfpError;
use crate::message::{TestParameters, payload_from_fn};
use crate::progress::percent;

use super::{ModeIo, Payload, RunCore, Sequencer, TestModeReference};
use super::{build_uplink, certification_parameters};

const FRAMES: u16 = 9;
const WINDOW_MS: u32 = 9_000;
const FREQUENCY_STEP_HZ: u32 = 100;
const T_IFU_MS: u16 = 500;

#[derive(Clone, Debug)]
pub(crate) struct ModeA {
    core: RunCore,
    index: u16,
}

impl ModeA {
    pub(crate) const fn new() -> Self {
        Self {
            core: RunCore::new(TestModeReference::A),
            index: 0,
        }
    }

    fn send_frame(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        let base_hz = self.core.rc()?.f_ul_hz;
        let tx_frequency_hz = base_hz + FREQUENCY_STEP_HZ * u32::from(self.index);
        let payload = payload_from_fn(io.capabilities.max_payload_size(), |index| 0x40 + index);
        let common = self.core.common(io, 1, T_IFU_MS);
        let uplink = build_uplink(io.capabilities, common, Payload::Bytes(payload), false, 0);
        let test = TestParameters {
            tx_frequency_hz,
            ..certification_parameters(io.capabilities)
        };

        self.core.start_timer(io, WINDOW_MS)?;
        if let Err(error) = self.core.send(io, &uplink, &test, usize::from(self.index)) {
            // The submission error is the one reported.
            if self.core.stop_timer(io).is_err() {
                warn!("rfp timer stop failed after a refused submission");
            }
            return Err(error);
        }
        Ok(())
    }
}

impl Sequencer for ModeA {
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
        if !self.core.take_message_and_timer(io) {
            return Ok(false);
        }
        self.core.stop_timer(io)?;
        if RunCore::message_status(io).uplink_failed() {
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
