//! Message catalogue walked by modes J and B.
//!
//! Both modes send every message type and size the build supports, one per
//! 18 s window. J forces the stack's channel-access controls off; B leaves
//! them on so the stack picks carriers across the band.

use core::fmt;

use heapless::Vec;

use crate::config::Capabilities;
use crate::error::RfpError;
use crate::message::{TestParameters, UL_PAYLOAD_MAX_SIZE_BYTES, payload_from_fn};
use crate::progress::percent;

use super::{ModeIo, Payload, RunCore, TestModeReference};
use super::{build_uplink, certification_parameters, keep_alive};

const WINDOW_MS: u32 = 18_000;
const T_IFU_MS: u16 = 500;

/// Largest catalogue: BIT0, BIT1, twelve byte arrays, EMPTY and keep-alive.
pub const CATALOGUE_CAPACITY: usize = UL_PAYLOAD_MAX_SIZE_BYTES + 4;

/// One catalogue message.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CatalogueEntry {
    Bit0,
    Bit1,
    /// Byte array of the given size.
    Bytes(u8),
    Empty,
    KeepAlive,
}

impl CatalogueEntry {
    pub(crate) fn payload(self) -> Payload {
        match self {
            CatalogueEntry::Bit0 => Payload::Bit(false),
            CatalogueEntry::Bit1 => Payload::Bit(true),
            CatalogueEntry::Bytes(size) => {
                Payload::Bytes(payload_from_fn(usize::from(size), |index| 0x40 + index))
            }
            CatalogueEntry::Empty | CatalogueEntry::KeepAlive => Payload::Empty,
        }
    }
}

impl fmt::Display for CatalogueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogueEntry::Bit0 => f.write_str("bit0"),
            CatalogueEntry::Bit1 => f.write_str("bit1"),
            CatalogueEntry::Bytes(size) => write!(f, "bytes[{size}]"),
            CatalogueEntry::Empty => f.write_str("empty"),
            CatalogueEntry::KeepAlive => f.write_str("keep-alive"),
        }
    }
}

/// Ordered message list for one build.
pub type MessageCatalogue = Vec<CatalogueEntry, CATALOGUE_CAPACITY>;

/// Lists every message type and size the build can emit, in transmission order.
#[must_use]
pub fn message_catalogue(caps: &Capabilities) -> MessageCatalogue {
    let mut list = MessageCatalogue::new();
    let mut push = |entry| {
        let pushed = list.push(entry);
        debug_assert!(pushed.is_ok(), "catalogue capacity covers the largest build");
    };
    if caps.application_messages {
        match caps.ul_payload_size {
            Some(0) => {
                push(CatalogueEntry::Bit0);
                push(CatalogueEntry::Bit1);
                push(CatalogueEntry::Empty);
            }
            Some(size) => push(CatalogueEntry::Bytes(size)),
            None => {
                push(CatalogueEntry::Bit0);
                push(CatalogueEntry::Bit1);
                for size in 1..=12 {
                    push(CatalogueEntry::Bytes(size));
                }
                push(CatalogueEntry::Empty);
            }
        }
    }
    if caps.control_keep_alive {
        push(CatalogueEntry::KeepAlive);
    }
    list
}

/// Shared cursor over the catalogue.
#[derive(Clone, Debug)]
pub(crate) struct CatalogueWalk {
    pub(crate) core: RunCore,
    list: MessageCatalogue,
    index: usize,
    channel_access: bool,
}

impl CatalogueWalk {
    pub(crate) const fn new(reference: TestModeReference, channel_access: bool) -> Self {
        Self {
            core: RunCore::new(reference),
            list: MessageCatalogue::new(),
            index: 0,
            channel_access,
        }
    }

    pub(crate) fn rewind(&mut self) {
        self.list.clear();
        self.index = 0;
    }

    fn test_parameters(&self, caps: &Capabilities) -> TestParameters {
        if self.channel_access {
            TestParameters::DEFAULT
        } else {
            certification_parameters(caps)
        }
    }

    fn send_entry(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        let Some(entry) = self.list.get(self.index).copied() else {
            return Err(RfpError::TestModeProcess);
        };
        let common = self.core.common(io, 3, T_IFU_MS);
        let uplink = match entry {
            CatalogueEntry::KeepAlive => keep_alive(common),
            other => build_uplink(io.capabilities, common, other.payload(), false, 0),
        };
        let test = self.test_parameters(io.capabilities);

        self.core.start_timer(io, WINDOW_MS)?;
        if let Err(error) = self.core.send(io, &uplink, &test, self.index) {
            // The submission error is the one reported.
            if self.core.stop_timer(io).is_err() {
                warn!("rfp timer stop failed after a refused submission");
            }
            return Err(error);
        }
        Ok(())
    }

    pub(crate) fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        self.list = message_catalogue(io.capabilities);
        if self.list.is_empty() {
            return Err(RfpError::TestModeStart);
        }
        self.send_entry(io)
    }

    pub(crate) fn step(&mut self, io: &mut ModeIo<'_>) -> Result<bool, RfpError> {
        if !self.core.take_message_and_timer(io) {
            return Ok(false);
        }
        self.core.stop_timer(io)?;
        if RunCore::message_status(io).uplink_failed() {
            self.core.fail(io);
            return Ok(true);
        }
        self.index += 1;
        let done = u16::try_from(self.index).unwrap_or(u16::MAX);
        let total = u16::try_from(self.list.len()).unwrap_or(u16::MAX);
        self.core.set_progress(percent(done, total));
        if self.index >= self.list.len() {
            self.core.finish(io);
        } else {
            self.send_entry(io)?;
        }
        Ok(true)
    }
}
