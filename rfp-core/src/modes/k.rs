//! Mode K: one uplink authenticated with the public key.

use crate::error::RfpError;
use crate::message::{KeyType, payload_from_fn};

use super::{ModeIo, Payload, RunCore, Sequencer, TestModeReference};
use super::{build_uplink, certification_parameters};

const T_IFU_MS: u16 = 1_000;
const FILL: u8 = 0xAA;

#[derive(Clone, Debug)]
pub(crate) struct ModeK {
    core: RunCore,
}

impl ModeK {
    pub(crate) const fn new() -> Self {
        Self {
            core: RunCore::new(TestModeReference::K),
        }
    }
}

impl Sequencer for ModeK {
    fn core(&self) -> &RunCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RunCore {
        &mut self.core
    }

    fn rewind(&mut self) {}

    fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        let payload = payload_from_fn(io.capabilities.max_payload_size(), |_| FILL);
        let mut common = self.core.common(io, 3, T_IFU_MS);
        common.ep_key_type = KeyType::Public;
        let uplink = build_uplink(io.capabilities, common, Payload::Bytes(payload), false, 0);
        let test = certification_parameters(io.capabilities);
        self.core.send(io, &uplink, &test, 0)
    }

    fn step(&mut self, io: &mut ModeIo<'_>) -> Result<bool, RfpError> {
        if !RunCore::take_message(io) {
            return Ok(false);
        }
        let status = RunCore::message_status(io);
        if status.uplink_failed() {
            self.core.fail(io);
        } else {
            self.core.finish(io);
        }
        Ok(true)
    }
}
