//! Capability set describing what the underlying End-Point stack was built with.
//!
//! The stack's feature selection is captured once in [`Capabilities`] and
//! validated when the add-on is constructed. Test modes consult it to decide
//! payload shapes, frame counts and which channel-access controls to disable.

use core::fmt;

use crate::message::{UL_PAYLOAD_MAX_SIZE_BYTES, UlBitRate};
use crate::modes::TestModeReference;

/// Concurrency personality of the stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperatingMode {
    /// Every call blocks until the lower layer finished.
    Blocking,
    /// Lower layers signal completion and the host re-enters `process`.
    CallbackDriven,
}

/// Regulatory channel-access controls compiled into the stack.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SpectrumAccessSet {
    pub fh: bool,
    pub lbt: bool,
    pub ldc: bool,
}

impl SpectrumAccessSet {
    pub const ALL: Self = Self {
        fh: true,
        lbt: true,
        ldc: true,
    };
    pub const NONE: Self = Self {
        fh: false,
        lbt: false,
        ldc: false,
    };
}

/// Build personality of the End-Point stack.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Capabilities {
    pub operating_mode: OperatingMode,
    pub application_messages: bool,
    pub control_keep_alive: bool,
    /// Fixed uplink payload size, `None` when every size is available.
    pub ul_payload_size: Option<u8>,
    pub single_frame: bool,
    pub bidirectional: bool,
    pub public_key_capable: bool,
    pub parameters_check: bool,
    pub spectrum_access: SpectrumAccessSet,
    pub fixed_ul_bit_rate: Option<UlBitRate>,
    pub fixed_tx_power_dbm_eirp: Option<i8>,
    pub fixed_t_ifu_ms: Option<u16>,
}

/// Rejected capability combinations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CapabilityError {
    PayloadTooLarge { size: u8 },
    NoMessageFamily,
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::PayloadTooLarge { size } => write!(
                f,
                "uplink payload size {size} exceeds {UL_PAYLOAD_MAX_SIZE_BYTES} bytes"
            ),
            CapabilityError::NoMessageFamily => {
                f.write_str("neither application nor keep-alive messages are enabled")
            }
        }
    }
}

impl Capabilities {
    /// Every option enabled, payload size selectable per message.
    #[must_use]
    pub const fn full(operating_mode: OperatingMode) -> Self {
        Self {
            operating_mode,
            application_messages: true,
            control_keep_alive: true,
            ul_payload_size: None,
            single_frame: false,
            bidirectional: true,
            public_key_capable: true,
            parameters_check: true,
            spectrum_access: SpectrumAccessSet::ALL,
            fixed_ul_bit_rate: None,
            fixed_tx_power_dbm_eirp: None,
            fixed_t_ifu_ms: None,
        }
    }

    #[must_use]
    pub const fn with_payload_size(mut self, size: Option<u8>) -> Self {
        self.ul_payload_size = size;
        self
    }

    #[must_use]
    pub const fn with_single_frame(mut self, single_frame: bool) -> Self {
        self.single_frame = single_frame;
        self
    }

    #[must_use]
    pub const fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    #[must_use]
    pub const fn with_spectrum_access(mut self, access: SpectrumAccessSet) -> Self {
        self.spectrum_access = access;
        self
    }

    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self.operating_mode, OperatingMode::Blocking)
    }

    /// Largest payload a byte-array message may carry on this build.
    #[must_use]
    pub fn max_payload_size(&self) -> usize {
        self.ul_payload_size
            .map_or(UL_PAYLOAD_MAX_SIZE_BYTES, usize::from)
    }

    /// Checks the combination once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError`] when the payload size exceeds the protocol
    /// maximum or when no message family is available to transmit.
    pub fn validate(self) -> Result<Self, CapabilityError> {
        if let Some(size) = self.ul_payload_size
            && usize::from(size) > UL_PAYLOAD_MAX_SIZE_BYTES
        {
            return Err(CapabilityError::PayloadTooLarge { size });
        }
        if !self.application_messages && !self.control_keep_alive {
            return Err(CapabilityError::NoMessageFamily);
        }
        Ok(self)
    }

    /// Returns `true` when `mode` can run on this build.
    #[must_use]
    pub const fn supports(&self, mode: TestModeReference) -> bool {
        match mode {
            TestModeReference::D | TestModeReference::E | TestModeReference::F => {
                self.bidirectional && self.application_messages
            }
            TestModeReference::G => self.spectrum_access.lbt,
            TestModeReference::K => self.public_key_capable,
            TestModeReference::A
            | TestModeReference::B
            | TestModeReference::C
            | TestModeReference::J
            | TestModeReference::L => true,
        }
    }
}
