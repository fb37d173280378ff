//! Mode J: message type catalogue with channel-access controls forced off.

use crate::error::RfpError;

use super::catalogue::CatalogueWalk;
use super::{ModeIo, RunCore, Sequencer, TestModeReference};

#[derive(Clone, Debug)]
pub(crate) struct ModeJ(CatalogueWalk);

impl ModeJ {
    pub(crate) const fn new() -> Self {
        Self(CatalogueWalk::new(TestModeReference::J, false))
    }
}

impl Sequencer for ModeJ {
    fn core(&self) -> &RunCore {
        &self.0.core
    }

    fn core_mut(&mut self) -> &mut RunCore {
        &mut self.0.core
    }

    fn rewind(&mut self) {
        self.0.rewind();
    }

    fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        self.0.start(io)
    }

    fn step(&mut self, io: &mut ModeIo<'_>) -> Result<bool, RfpError> {
        self.0.step(io)
    }
}
