//! Certification test-mode state machines.
//!
//! Each mode owns a private context (a [`RunCore`] plus its own cursor) and
//! advances through a sequence of submissions, waits and checks. The
//! dispatcher selects one through the enum-keyed [`ModeRun`] table and drives
//! it via the [`TestMode`] interface; lower layers only ever touch the shared
//! [`RfpSignals`].

use core::fmt;

use crate::config::Capabilities;
use crate::endpoint::{EndPoint, McuTimer, NvmTester, TimerConfig, TimerInstance};
use crate::error::RfpError;
use crate::message::{
    ApplicationMessage, ApplicationMessageType, CommonParameters, ControlMessage,
    ControlMessageType, KeyType, MessageStatus, TestFlag, TestParameters, UlBitRate, UlPayload,
    Uplink,
};
use crate::progress::{PROGRESS_COMPLETE, ProgressStatus};
use crate::regulatory::RadioConfiguration;
use crate::signals::{RfpSignals, Signal, SignalSet};
use crate::telemetry::{JournalEvent, JournalPayload, RunJournal};

mod a;
mod b;
mod c;
mod catalogue;
mod d;
mod e;
mod f;
mod g;
mod j;
mod k;
mod l;

pub use catalogue::{CatalogueEntry, MessageCatalogue, message_catalogue};
pub use d::DOWNLINK_PATTERN;
pub use f::ROUND_TRIP_PATTERN;

/// Host callback receiving a validated downlink payload and its RSSI.
pub type DownlinkCallback = fn(&[u8; crate::message::DL_PAYLOAD_SIZE_BYTES], i16);

/// Test mode selector, numbered as on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum TestModeReference {
    C = 0,
    J = 1,
    F = 2,
    D = 3,
    E = 4,
    A = 5,
    B = 6,
    G = 11,
    K = 12,
    L = 13,
}

impl TestModeReference {
    /// Every mode in console order.
    pub const ALL: [Self; 10] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::J,
        Self::K,
        Self::L,
    ];

    #[must_use]
    pub const fn raw(self) -> u8 {
        self as u8
    }

    pub(crate) const fn raw_u16(self) -> u16 {
        self as u16
    }

    /// Upper-case letter naming the mode.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
            Self::G => 'G',
            Self::J => 'J',
            Self::K => 'K',
            Self::L => 'L',
        }
    }

    /// Case-insensitive lookup by letter.
    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        let upper = letter.to_ascii_uppercase();
        Self::ALL.into_iter().find(|mode| mode.letter() == upper)
    }

    /// One-line purpose shown by the console.
    #[must_use]
    pub const fn summary(self) -> &'static str {
        match self {
            Self::A => "frequency synthesis sweep, 9 frames",
            Self::B => "frame type and size sweep with channel access",
            Self::C => "longest frame repetition",
            Self::D => "downlink listening against a static pattern",
            Self::E => "bidirectional loop with reception flags",
            Self::F => "downlink content round trip",
            Self::G => "back-to-back frames through listen before talk",
            Self::J => "message type catalogue with fixed pacing",
            Self::K => "public key transmission",
            Self::L => "non-volatile memory test",
        }
    }
}

impl TryFrom<u8> for TestModeReference {
    type Error = RfpError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.raw() == raw)
            .ok_or(RfpError::TestMode)
    }
}

impl fmt::Display for TestModeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Per-run parameters, resolved by the dispatcher and copied into the mode.
#[derive(Copy, Clone, Debug, Default)]
pub struct ModeParameters {
    pub rc: Option<RadioConfiguration>,
    pub ul_bit_rate: UlBitRate,
    pub tx_power_dbm_eirp: i8,
    pub downlink_callback: Option<DownlinkCallback>,
}

impl ModeParameters {
    /// Applies the resolution order: capability constant, then request
    /// override, then default (100 bps, RC maximum power).
    #[must_use]
    pub fn resolve(
        rc: Option<&RadioConfiguration>,
        ul_bit_rate: Option<UlBitRate>,
        tx_power_dbm_eirp: Option<i8>,
        downlink_callback: Option<DownlinkCallback>,
        capabilities: &Capabilities,
    ) -> Self {
        let ul_bit_rate = capabilities
            .fixed_ul_bit_rate
            .or(ul_bit_rate)
            .unwrap_or_default();
        let tx_power_dbm_eirp = capabilities
            .fixed_tx_power_dbm_eirp
            .or(tx_power_dbm_eirp)
            .or_else(|| rc.map(|rc| rc.tx_power_dbm_eirp_max))
            .unwrap_or_default();
        Self {
            rc: rc.copied(),
            ul_bit_rate,
            tx_power_dbm_eirp,
            downlink_callback,
        }
    }
}

/// Collaborators lent to a mode for the duration of one call.
pub struct ModeIo<'r> {
    pub endpoint: &'r mut dyn EndPoint,
    pub timer: &'r mut dyn McuTimer,
    pub nvm: &'r mut dyn NvmTester,
    pub signals: &'r RfpSignals,
    pub capabilities: &'r Capabilities,
    pub journal: &'r mut RunJournal,
}

/// Capability interface every test mode exposes to the dispatcher.
pub trait TestMode {
    fn reference(&self) -> TestModeReference;

    /// Resets the run context and flags the start request.
    ///
    /// # Errors
    ///
    /// [`RfpError::NullParameter`] when parameter checks are enabled and no
    /// radio configuration was supplied.
    fn init(&mut self, params: ModeParameters, io: &mut ModeIo<'_>) -> Result<(), RfpError>;

    /// Cooperative step; loops to the terminal state in the blocking personality.
    ///
    /// # Errors
    ///
    /// Collaborator failures, or [`RfpError::TestModeProcess`] when a blocking
    /// run stops making progress. The run is marked failed before returning.
    fn process(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError>;

    fn progress_status(&self) -> ProgressStatus;
}

/// Bookkeeping shared by every mode: parameters, progress and lifecycle flags.
#[derive(Clone, Debug)]
pub(crate) struct RunCore {
    reference: TestModeReference,
    pub params: ModeParameters,
    pub progress: ProgressStatus,
    pub start_requested: bool,
    pub finished: bool,
    pub timer_armed: bool,
}

impl RunCore {
    pub const fn new(reference: TestModeReference) -> Self {
        Self {
            reference,
            params: ModeParameters {
                rc: None,
                ul_bit_rate: UlBitRate::Bps100,
                tx_power_dbm_eirp: 0,
                downlink_callback: None,
            },
            progress: ProgressStatus::RESET,
            start_requested: false,
            finished: false,
            timer_armed: false,
        }
    }

    pub const fn reference(&self) -> TestModeReference {
        self.reference
    }

    fn init(&mut self, params: ModeParameters, io: &ModeIo<'_>) -> Result<(), RfpError> {
        if io.capabilities.parameters_check && params.rc.is_none() {
            return Err(RfpError::NullParameter);
        }
        io.signals.clear(SignalSet::MODE);
        self.params = params;
        self.progress = ProgressStatus::RESET;
        self.finished = false;
        self.timer_armed = false;
        self.start_requested = true;
        Ok(())
    }

    pub fn rc(&self) -> Result<&RadioConfiguration, RfpError> {
        self.params.rc.as_ref().ok_or(RfpError::NullParameter)
    }

    /// Raises progress, never lowering it within a run.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress.progress = self.progress.progress.max(progress.min(PROGRESS_COMPLETE));
    }

    /// Successful terminal state.
    pub fn finish(&mut self, io: &mut ModeIo<'_>) {
        self.progress.progress = PROGRESS_COMPLETE;
        self.finished = true;
        io.journal.record_outcome(self.reference, self.progress);
        io.signals.notify_mode_complete();
    }

    /// Protocol failure reported through message status.
    pub fn fail(&mut self, io: &mut ModeIo<'_>) {
        self.progress.error = true;
        self.finished = true;
        io.journal.record_outcome(self.reference, self.progress);
        io.signals.notify_mode_complete();
    }

    /// Collaborator failure; the dispatcher reports completion itself.
    fn abort(&mut self, io: &mut ModeIo<'_>) {
        self.progress.error = true;
        self.finished = true;
        io.journal.record_outcome(self.reference, self.progress);
    }

    /// Common parameters for a submission honouring the build's fixed values.
    pub fn common(&self, io: &ModeIo<'_>, number_of_frames: u8, t_ifu_ms: u16) -> CommonParameters {
        let caps = io.capabilities;
        CommonParameters {
            ul_bit_rate: self.params.ul_bit_rate,
            tx_power_dbm_eirp: self.params.tx_power_dbm_eirp,
            number_of_frames: if caps.single_frame { 1 } else { number_of_frames },
            t_ifu_ms: caps.fixed_t_ifu_ms.unwrap_or(t_ifu_ms),
            ep_key_type: KeyType::Private,
        }
    }

    /// Submits one uplink; blocking builds report completion immediately.
    pub fn send(
        &self,
        io: &mut ModeIo<'_>,
        uplink: &Uplink,
        test: &TestParameters,
        index: usize,
    ) -> Result<(), RfpError> {
        match uplink {
            Uplink::Application(message) => io.endpoint.send_application_message(message, test)?,
            Uplink::Control(message) => io.endpoint.send_control_message(message, test)?,
        }
        io.journal
            .record_frame(self.reference, index, test.tx_frequency_hz);
        if io.capabilities.is_blocking() {
            io.signals.notify_message_complete();
        }
        Ok(())
    }

    /// Arms the add-on pacing timer.
    pub fn start_timer(&mut self, io: &mut ModeIo<'_>, duration_ms: u32) -> Result<(), RfpError> {
        io.timer.start(&TimerConfig::addon(duration_ms))?;
        self.timer_armed = true;
        io.journal.record(
            JournalEvent::TimerStarted(self.reference),
            JournalPayload::Timer { duration_ms },
        );
        Ok(())
    }

    pub fn stop_timer(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        self.timer_armed = false;
        io.timer.stop(TimerInstance::AddonRfp)?;
        Ok(())
    }

    /// Blocking personality: waits for an armed timer and raises its signal.
    fn wait_timer(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        if self.timer_armed && !io.signals.is_pending(Signal::TimerComplete) {
            io.timer.wait_complete(TimerInstance::AddonRfp)?;
            io.signals.notify_timer_complete();
        }
        Ok(())
    }

    pub fn take_message(io: &ModeIo<'_>) -> bool {
        io.signals.take(Signal::MessageComplete)
    }

    pub fn take_timer(&mut self, io: &ModeIo<'_>) -> bool {
        let fired = io.signals.take(Signal::TimerComplete);
        if fired {
            self.timer_armed = false;
        }
        fired
    }

    /// Message and timer completions may land in either order; both are needed.
    pub fn take_message_and_timer(&mut self, io: &ModeIo<'_>) -> bool {
        let both = io
            .signals
            .take_both(Signal::MessageComplete, Signal::TimerComplete);
        if both {
            self.timer_armed = false;
        }
        both
    }

    pub fn message_status(io: &ModeIo<'_>) -> MessageStatus {
        io.endpoint.message_status()
    }
}

/// Step functions implemented by every mode.
pub(crate) trait Sequencer {
    fn core(&self) -> &RunCore;
    fn core_mut(&mut self) -> &mut RunCore;

    /// Resets the mode-specific cursor.
    fn rewind(&mut self);

    /// Handles the start request (usually the first submission).
    fn start(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError>;

    /// Consumes pending signals; returns `false` when nothing was pending.
    fn step(&mut self, io: &mut ModeIo<'_>) -> Result<bool, RfpError>;
}

fn init_sequence<S: Sequencer>(
    mode: &mut S,
    params: ModeParameters,
    io: &mut ModeIo<'_>,
) -> Result<(), RfpError> {
    mode.core_mut().init(params, io)?;
    mode.rewind();
    Ok(())
}

fn process_sequence<S: Sequencer>(mode: &mut S, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
    let result = drive(mode, io);
    if result.is_err() && !mode.core().finished {
        mode.core_mut().abort(io);
    }
    result
}

fn drive<S: Sequencer>(mode: &mut S, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
    let blocking = io.capabilities.is_blocking();
    loop {
        if mode.core().finished {
            return Ok(());
        }
        let advanced = if mode.core().start_requested {
            mode.core_mut().start_requested = false;
            mode.start(io)?;
            true
        } else {
            if blocking {
                mode.core_mut().wait_timer(io)?;
            }
            mode.step(io)?
        };
        if !blocking {
            return Ok(());
        }
        if !advanced {
            return Err(RfpError::TestModeProcess);
        }
    }
}

/// Certification switches shared by most modes: everything on, regulatory
/// channel-access controls compiled into the build switched off.
pub(crate) fn certification_parameters(caps: &Capabilities) -> TestParameters {
    let access = caps.spectrum_access;
    let mut flags = TestParameters::DEFAULT.flags;
    if access.fh {
        flags = flags.with(TestFlag::TxControlFhEnable, false);
    }
    if access.lbt {
        flags = flags.with(TestFlag::TxControlLbtEnable, false);
    }
    if access.ldc {
        flags = flags.with(TestFlag::TxControlLdcEnable, false);
    }
    TestParameters {
        flags,
        ..TestParameters::DEFAULT
    }
}

pub(crate) fn keep_alive(common: CommonParameters) -> Uplink {
    Uplink::Control(ControlMessage {
        common,
        kind: ControlMessageType::KeepAlive,
    })
}

/// Application payload shapes a mode may request.
#[derive(Clone, Debug)]
pub(crate) enum Payload {
    /// Byte array; an empty array becomes an EMPTY message.
    Bytes(UlPayload),
    /// Single-bit message.
    Bit(bool),
    Empty,
}

/// Builds an uplink, falling back to a keep-alive control message on builds
/// without application messages.
pub(crate) fn build_uplink(
    caps: &Capabilities,
    common: CommonParameters,
    payload: Payload,
    bidirectional: bool,
    t_conf_ms: u16,
) -> Uplink {
    if !caps.application_messages {
        return keep_alive(common);
    }
    let (kind, payload) = match payload {
        Payload::Bytes(bytes) if bytes.is_empty() => (ApplicationMessageType::Empty, bytes),
        Payload::Bytes(bytes) => (ApplicationMessageType::ByteArray, bytes),
        Payload::Bit(true) => (ApplicationMessageType::Bit1, UlPayload::new()),
        Payload::Bit(false) => (ApplicationMessageType::Bit0, UlPayload::new()),
        Payload::Empty => (ApplicationMessageType::Empty, UlPayload::new()),
    };
    Uplink::Application(ApplicationMessage {
        common,
        kind,
        payload,
        bidirectional: bidirectional && caps.bidirectional,
        t_conf_ms,
    })
}

/// Enum-keyed table holding the context of the selected mode.
#[derive(Clone, Debug)]
pub struct ModeRun(Slot);

#[derive(Clone, Debug)]
enum Slot {
    A(a::ModeA),
    B(b::ModeB),
    C(c::ModeC),
    D(d::ModeD),
    E(e::ModeE),
    F(f::ModeF),
    G(g::ModeG),
    J(j::ModeJ),
    K(k::ModeK),
    L(l::ModeL),
}

macro_rules! with_mode {
    ($slot:expr, $mode:ident => $body:expr) => {
        match $slot {
            Slot::A($mode) => $body,
            Slot::B($mode) => $body,
            Slot::C($mode) => $body,
            Slot::D($mode) => $body,
            Slot::E($mode) => $body,
            Slot::F($mode) => $body,
            Slot::G($mode) => $body,
            Slot::J($mode) => $body,
            Slot::K($mode) => $body,
            Slot::L($mode) => $body,
        }
    };
}

impl ModeRun {
    /// Fresh, not yet initialised context for `reference`.
    #[must_use]
    pub fn new(reference: TestModeReference) -> Self {
        Self(match reference {
            TestModeReference::A => Slot::A(a::ModeA::new()),
            TestModeReference::B => Slot::B(b::ModeB::new()),
            TestModeReference::C => Slot::C(c::ModeC::new()),
            TestModeReference::D => Slot::D(d::ModeD::new()),
            TestModeReference::E => Slot::E(e::ModeE::new()),
            TestModeReference::F => Slot::F(f::ModeF::new()),
            TestModeReference::G => Slot::G(g::ModeG::new()),
            TestModeReference::J => Slot::J(j::ModeJ::new()),
            TestModeReference::K => Slot::K(k::ModeK::new()),
            TestModeReference::L => Slot::L(l::ModeL::new()),
        })
    }

    /// Returns `true` once the run reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        with_mode!(&self.0, mode => mode.core().finished)
    }
}

impl TestMode for ModeRun {
    fn reference(&self) -> TestModeReference {
        with_mode!(&self.0, mode => mode.core().reference())
    }

    fn init(&mut self, params: ModeParameters, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        with_mode!(&mut self.0, mode => init_sequence(mode, params, io))
    }

    fn process(&mut self, io: &mut ModeIo<'_>) -> Result<(), RfpError> {
        with_mode!(&mut self.0, mode => process_sequence(mode, io))
    }

    fn progress_status(&self) -> ProgressStatus {
        with_mode!(&self.0, mode => mode.core().progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OperatingMode, SpectrumAccessSet};
    use crate::regulatory::{RC1, RC2};

    #[test]
    fn raw_references_follow_wire_numbering() {
        assert_eq!(TestModeReference::try_from(0), Ok(TestModeReference::C));
        assert_eq!(TestModeReference::try_from(5), Ok(TestModeReference::A));
        assert_eq!(TestModeReference::try_from(13), Ok(TestModeReference::L));
        assert_eq!(TestModeReference::try_from(7), Err(RfpError::TestMode));
        assert_eq!(TestModeReference::try_from(200), Err(RfpError::TestMode));
    }

    #[test]
    fn letters_are_case_insensitive() {
        assert_eq!(TestModeReference::from_letter('g'), Some(TestModeReference::G));
        assert_eq!(TestModeReference::from_letter('H'), None);
    }

    #[test]
    fn parameters_resolve_capability_then_request_then_default() {
        let caps = Capabilities::full(OperatingMode::Blocking);
        let defaults = ModeParameters::resolve(Some(&RC2), None, None, None, &caps);
        assert_eq!(defaults.ul_bit_rate, UlBitRate::Bps100);
        assert_eq!(defaults.tx_power_dbm_eirp, RC2.tx_power_dbm_eirp_max);

        let requested =
            ModeParameters::resolve(Some(&RC1), Some(UlBitRate::Bps600), Some(10), None, &caps);
        assert_eq!(requested.ul_bit_rate, UlBitRate::Bps600);
        assert_eq!(requested.tx_power_dbm_eirp, 10);

        let mut fixed = caps;
        fixed.fixed_ul_bit_rate = Some(UlBitRate::Bps100);
        fixed.fixed_tx_power_dbm_eirp = Some(14);
        let forced =
            ModeParameters::resolve(Some(&RC1), Some(UlBitRate::Bps600), Some(10), None, &fixed);
        assert_eq!(forced.ul_bit_rate, UlBitRate::Bps100);
        assert_eq!(forced.tx_power_dbm_eirp, 14);
    }

    #[test]
    fn certification_parameters_disable_compiled_access_controls() {
        let caps = Capabilities::full(OperatingMode::Blocking)
            .with_spectrum_access(SpectrumAccessSet {
                fh: true,
                lbt: false,
                ldc: true,
            });
        let test = certification_parameters(&caps);
        assert!(!test.flags.contains(TestFlag::TxControlFhEnable));
        assert!(test.flags.contains(TestFlag::TxControlLbtEnable));
        assert!(!test.flags.contains(TestFlag::TxControlLdcEnable));
        assert_eq!(test.tx_frequency_hz, 0);
    }

    #[test]
    fn uplink_falls_back_to_keep_alive() {
        let mut caps = Capabilities::full(OperatingMode::Blocking);
        caps.application_messages = false;
        let common = CommonParameters {
            ul_bit_rate: UlBitRate::Bps100,
            tx_power_dbm_eirp: 14,
            number_of_frames: 3,
            t_ifu_ms: 500,
            ep_key_type: KeyType::Private,
        };
        let uplink = build_uplink(&caps, common, Payload::Bit(true), true, 1400);
        assert!(matches!(uplink, Uplink::Control(_)));
        assert!(!uplink.is_bidirectional());
    }

    #[test]
    fn empty_byte_payload_becomes_empty_message() {
        let caps = Capabilities::full(OperatingMode::Blocking);
        let common = CommonParameters {
            ul_bit_rate: UlBitRate::Bps100,
            tx_power_dbm_eirp: 14,
            number_of_frames: 1,
            t_ifu_ms: 500,
            ep_key_type: KeyType::Private,
        };
        match build_uplink(&caps, common, Payload::Bytes(UlPayload::new()), false, 0) {
            Uplink::Application(message) => assert_eq!(message.kind, ApplicationMessageType::Empty),
            other => panic!("unexpected uplink: {other:?}"),
        }
    }
}
