//! Mode B: message type catalogue with the stack's channel access left on.

use crate::error::RfpError;

use super::catalogue::CatalogueWalk;
use super::{ModeIo, RunCore, Sequencer, TestModeReference};

#[derive(Clone, Debug)]
pub(crate) struct ModeB(CatalogueWalk);

impl ModeB {
    pub(crate) const fn new() -> Self {
        Self(CatalogueWalk::new(TestModeReference::B, true))
    }
}

impl Sequencer for ModeB {
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
