//! Mode L: delegates to the device's non-volatile memory test.

use crate::endpoint::NvmTestError;
use crate::error::RfpError;

use super::{ModeIo, RunCore, Sequencer, TestModeReference};

#[derive(Clone, Debug)]
pub(crate) struct ModeL {
    core: RunCore,
}

impl ModeL {
    pub(crate) const fn new() -> Self {
        Self {
            core: RunCore::new(TestModeReference::L),
        }
    }
}

impl Sequencer for ModeL {
    fn core(&self) -> &RunCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RunCore {
        &mut self.core
    }

    fn rewind(&mut self) {}

    fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        match io.nvm.run() {
            Ok(()) => self.core.finish(io),
            Err(NvmTestError::Failed) => {
                warn!("nvm test reported a failure");
                self.core.fail(io);
            }
            Err(NvmTestError::Unavailable) => return Err(RfpError::TestModeStart),
        }
        Ok(())
    }

    fn step(&mut self, _io: &mut ModeIo<'_>) -> Result<bool, RfpError> {
        Ok(false)
    }
}
