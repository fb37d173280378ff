//! Message descriptors handed to the End-Point library.
//!
//! Test modes build one [`Uplink`] per transmission: the common radio
//! parameters, the certification-only [`TestParameters`] that force
//! frequencies and disable channel-access controls, and the payload.

use core::fmt;

use heapless::Vec;

/// Largest uplink payload the protocol carries.
pub const UL_PAYLOAD_MAX_SIZE_BYTES: usize = 12;
/// Fixed downlink payload size.
pub const DL_PAYLOAD_SIZE_BYTES: usize = 8;

/// Bounded uplink payload buffer.
pub type UlPayload = Vec<u8, UL_PAYLOAD_MAX_SIZE_BYTES>;

/// Uplink modulation bit rate.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum UlBitRate {
    #[default]
    Bps100,
    Bps600,
}

impl UlBitRate {
    #[must_use]
    pub const fn bps(self) -> u16 {
        match self {
            UlBitRate::Bps100 => 100,
            UlBitRate::Bps600 => 600,
        }
    }

    #[must_use]
    pub const fn from_bps(bps: u16) -> Option<Self> {
        match bps {
            100 => Some(UlBitRate::Bps100),
            600 => Some(UlBitRate::Bps600),
            _ => None,
        }
    }
}

/// Key selection for the message authentication.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum KeyType {
    #[default]
    Private,
    Public,
}

/// Message counter rollover policy passed through at open.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageCounterRollover {
    Rollover128,
    Rollover256,
    Rollover512,
    Rollover1024,
    Rollover2048,
    Rollover4096,
}

impl MessageCounterRollover {
    #[must_use]
    pub const fn value(self) -> u16 {
        match self {
            MessageCounterRollover::Rollover128 => 128,
            MessageCounterRollover::Rollover256 => 256,
            MessageCounterRollover::Rollover512 => 512,
            MessageCounterRollover::Rollover1024 => 1024,
            MessageCounterRollover::Rollover2048 => 2048,
            MessageCounterRollover::Rollover4096 => 4096,
        }
    }
}

/// Radio parameters shared by application and control messages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommonParameters {
    pub ul_bit_rate: UlBitRate,
    pub tx_power_dbm_eirp: i8,
    pub number_of_frames: u8,
    pub t_ifu_ms: u16,
    pub ep_key_type: KeyType,
}

/// Application message flavours.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ApplicationMessageType {
    Empty,
    Bit0,
    Bit1,
    ByteArray,
}

impl ApplicationMessageType {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationMessageType::Empty => "empty",
            ApplicationMessageType::Bit0 => "bit0",
            ApplicationMessageType::Bit1 => "bit1",
            ApplicationMessageType::ByteArray => "bytes",
        }
    }
}

/// Application uplink descriptor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApplicationMessage {
    pub common: CommonParameters,
    pub kind: ApplicationMessageType,
    pub payload: UlPayload,
    pub bidirectional: bool,
    pub t_conf_ms: u16,
}

/// Control message flavours.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlMessageType {
    KeepAlive,
}

/// Control uplink descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControlMessage {
    pub common: CommonParameters,
    pub kind: ControlMessageType,
}

/// One submission to the End-Point library.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Uplink {
    Application(ApplicationMessage),
    Control(ControlMessage),
}

impl Uplink {
    #[must_use]
    pub const fn common(&self) -> &CommonParameters {
        match self {
            Uplink::Application(message) => &message.common,
            Uplink::Control(message) => &message.common,
        }
    }

    /// Payload bytes, empty for control and single-bit messages.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Uplink::Application(message) => &message.payload,
            Uplink::Control(_) => &[],
        }
    }

    #[must_use]
    pub const fn is_bidirectional(&self) -> bool {
        match self {
            Uplink::Application(message) => message.bidirectional,
            Uplink::Control(_) => false,
        }
    }
}

impl fmt::Display for Uplink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uplink::Application(message) => {
                write!(f, "app {}", message.kind.label())?;
                if message.kind == ApplicationMessageType::ByteArray {
                    write!(f, "[{}]", message.payload.len())?;
                }
                if message.bidirectional {
                    f.write_str(" bidir")?;
                }
            }
            Uplink::Control(_) => f.write_str("ctrl keep-alive")?,
        }
        write!(
            f,
            " frames={} {}bps {}dBm",
            self.common().number_of_frames,
            self.common().ul_bit_rate.bps(),
            self.common().tx_power_dbm_eirp
        )
    }
}

/// Individual certification switches carried in [`TestFlags`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestFlag {
    UlEnable,
    DlEnable,
    DlDecodingEnable,
    DlConfEnable,
    TxControlFhEnable,
    TxControlLbtEnable,
    TxControlLdcEnable,
}

impl TestFlag {
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Bit set of [`TestFlag`] switches, LSB first.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TestFlags(u8);

impl TestFlags {
    /// Every switch on, including the reserved bit.
    pub const ALL: Self = Self(0xFF);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, flag: TestFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Returns a copy with `flag` set to `enabled`.
    #[must_use]
    pub const fn with(self, flag: TestFlag, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | flag.bit())
        } else {
            Self(self.0 & !flag.bit())
        }
    }
}

/// Certification-only overrides applied to one submission.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TestParameters {
    /// Forced uplink frequency, 0 lets the stack pick.
    pub tx_frequency_hz: u32,
    /// Forced downlink frequency, 0 lets the stack pick.
    pub rx_frequency_hz: u32,
    pub dl_t_rx_ms: u32,
    pub dl_t_w_ms: u32,
    pub flags: TestFlags,
    pub lbt_cs_max_duration_first_frame_ms: u32,
}

impl TestParameters {
    /// All switches on, nothing forced.
    pub const DEFAULT: Self = Self {
        tx_frequency_hz: 0,
        rx_frequency_hz: 0,
        dl_t_rx_ms: 0,
        dl_t_w_ms: 0,
        flags: TestFlags::ALL,
        lbt_cs_max_duration_first_frame_ms: 0,
    };
}

/// Outcome bits of the last message, LSB first.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MessageStatus(u8);

impl MessageStatus {
    pub const UL_FRAME_1: u8 = 1 << 0;
    pub const UL_FRAME_2: u8 = 1 << 1;
    pub const UL_FRAME_3: u8 = 1 << 2;
    pub const DL_FRAME: u8 = 1 << 3;
    pub const DL_CONF_FRAME: u8 = 1 << 4;
    pub const NETWORK_ERROR: u8 = 1 << 5;
    pub const EXECUTION_ERROR: u8 = 1 << 6;

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn execution_error(self) -> bool {
        self.0 & Self::EXECUTION_ERROR != 0
    }

    #[must_use]
    pub const fn network_error(self) -> bool {
        self.0 & Self::NETWORK_ERROR != 0
    }

    /// Execution or network error. Uplink-only runs abort on either.
    #[must_use]
    pub const fn uplink_failed(self) -> bool {
        self.0 & (Self::EXECUTION_ERROR | Self::NETWORK_ERROR) != 0
    }

    #[must_use]
    pub const fn dl_frame(self) -> bool {
        self.0 & Self::DL_FRAME != 0
    }

    #[must_use]
    pub const fn dl_conf_frame(self) -> bool {
        self.0 & Self::DL_CONF_FRAME != 0
    }

    /// Number of uplink frames reported as sent.
    #[must_use]
    pub const fn ul_frames(self) -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        {
            (self.0 & (Self::UL_FRAME_1 | Self::UL_FRAME_2 | Self::UL_FRAME_3)).count_ones() as u8
        }
    }
}

/// Decoded downlink payload and its signal strength.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DownlinkFrame {
    pub payload: [u8; DL_PAYLOAD_SIZE_BYTES],
    pub rssi_dbm: i16,
}

/// Builds a payload of `size` bytes (clamped to the protocol maximum) from `byte`.
#[must_use]
pub fn payload_from_fn(size: usize, mut byte: impl FnMut(u8) -> u8) -> UlPayload {
    let mut payload = UlPayload::new();
    for index in 0..size.min(UL_PAYLOAD_MAX_SIZE_BYTES) {
        #[allow(clippy::cast_possible_truncation)]
        let value = byte(index as u8);
        if payload.push(value).is_err() {
            break;
        }
    }
    payload
}
