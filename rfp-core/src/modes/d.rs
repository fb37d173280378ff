//! Mode D: downlink listening against a static pattern.
//!
//! The device repeatedly opens a 30 s reception window without transmitting.
//! A received frame that matches [`DOWNLINK_PATTERN`] byte for byte is handed
//! to the host's downlink callback; any other frame is ignored and listening
//! resumes. The run ends when the stack reports a network error (no more
//! downlinks scheduled by the tester).

use crate::error::RfpError;
use crate::message::{DL_PAYLOAD_SIZE_BYTES, TestFlag, TestParameters, payload_from_fn};
use crate::telemetry::{JournalEvent, JournalPayload};

use super::{ModeIo, Payload, RunCore, Sequencer, TestModeReference};
use super::{build_uplink, certification_parameters};

/// Payload the tester sends during mode D.
pub const DOWNLINK_PATTERN: [u8; DL_PAYLOAD_SIZE_BYTES] =
    [0x32, 0x68, 0xC5, 0xBA, 0x53, 0xAE, 0x79, 0xE7];

const DL_T_RX_MS: u32 = 30_000;
const T_CONF_MS: u16 = 1_400;
const T_IFU_MS: u16 = 500;
const FILL: u8 = 0xAA;

#[derive(Clone, Debug)]
pub(crate) struct ModeD {
    core: RunCore,
    windows: u16,
}

impl ModeD {
    pub(crate) const fn new() -> Self {
        Self {
            core: RunCore::new(TestModeReference::D),
            windows: 0,
        }
    }

    fn listen(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        let rx_frequency_hz = self.core.rc()?.f_dl_hz;
        let payload = payload_from_fn(io.capabilities.max_payload_size(), |_| FILL);
        let common = self.core.common(io, 3, T_IFU_MS);
        let uplink = build_uplink(
            io.capabilities,
            common,
            Payload::Bytes(payload),
            true,
            T_CONF_MS,
        );
        let base = certification_parameters(io.capabilities);
        let test = TestParameters {
            rx_frequency_hz,
            dl_t_rx_ms: DL_T_RX_MS,
            flags: base
                .flags
                .with(TestFlag::UlEnable, false)
                .with(TestFlag::DlEnable, true)
                .with(TestFlag::DlDecodingEnable, false)
                .with(TestFlag::DlConfEnable, false),
            ..base
        };
        let window = usize::from(self.windows);
        self.windows = self.windows.saturating_add(1);
        self.core.send(io, &uplink, &test, window)
    }
}

impl Sequencer for ModeD {
    fn core(&self) -> &RunCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RunCore {
        &mut self.core
    }

    fn rewind(&mut self) {
        self.windows = 0;
    }

    fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        self.listen(io)
    }

    fn step(&mut self, io: &mut ModeIo<'_>) -> Result<bool, RfpError> {
        if !RunCore::take_message(io) {
            return Ok(false);
        }
        let status = RunCore::message_status(io);
        if status.execution_error() {
            self.core.fail(io);
            return Ok(true);
        }
        if status.network_error() {
            self.core.finish(io);
            return Ok(true);
        }
        if status.dl_frame() {
            let frame = io.endpoint.downlink_frame()?;
            if frame.payload == DOWNLINK_PATTERN {
                io.journal.record(
                    JournalEvent::DownlinkMatched(TestModeReference::D),
                    JournalPayload::Downlink {
                        rssi_dbm: frame.rssi_dbm,
                    },
                );
                if let Some(callback) = self.core.params.downlink_callback {
                    callback(&frame.payload, frame.rssi_dbm);
                }
            }
        }
        self.listen(io)?;
        Ok(true)
    }
}
