//! Run journal shared by firmware and host targets.
//!
//! Every dispatcher transition and every frame a test mode submits is written
//! to a fixed-size ring so the console and evidence capture tooling can replay
//! what a certification run actually did. Event kinds serialize to compact
//! numeric codes for transport over diagnostics channels.

use core::fmt;

use heapless::HistoryBuf;

use crate::modes::TestModeReference;
use crate::progress::ProgressStatus;

/// Total number of journal entries retained in memory.
pub const JOURNAL_CAPACITY: usize = 64;

/// Identifier assigned to each journal record.
pub type RecordId = u32;

/// Discriminated journal events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JournalEvent {
    Opened,
    Closed,
    ModeStarted(TestModeReference),
    FrameSubmitted(TestModeReference),
    TimerStarted(TestModeReference),
    DownlinkMatched(TestModeReference),
    ModeCompleted(TestModeReference),
    ModeFailed(TestModeReference),
    Custom(u16),
}

impl fmt::Display for JournalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalEvent::Opened => f.write_str("opened"),
            JournalEvent::Closed => f.write_str("closed"),
            JournalEvent::ModeStarted(mode) => write!(f, "mode-started {mode}"),
            JournalEvent::FrameSubmitted(mode) => write!(f, "frame-submitted {mode}"),
            JournalEvent::TimerStarted(mode) => write!(f, "timer-started {mode}"),
            JournalEvent::DownlinkMatched(mode) => write!(f, "downlink-matched {mode}"),
            JournalEvent::ModeCompleted(mode) => write!(f, "mode-completed {mode}"),
            JournalEvent::ModeFailed(mode) => write!(f, "mode-failed {mode}"),
            JournalEvent::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl JournalEvent {
    const OPENED_CODE: u16 = 0x0001;
    const CLOSED_CODE: u16 = 0x0002;
    const MODE_STARTED_BASE: u16 = 0x0100;
    const FRAME_SUBMITTED_BASE: u16 = 0x0200;
    const TIMER_STARTED_BASE: u16 = 0x0300;
    const DOWNLINK_MATCHED_BASE: u16 = 0x0400;
    const MODE_COMPLETED_BASE: u16 = 0x0500;
    const MODE_FAILED_BASE: u16 = 0x0600;

    /// Encodes the event into a compact transport-friendly discriminant.
    ///
    /// Mode-scoped events carry the mode's raw reference in the low byte.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            JournalEvent::Opened => Self::OPENED_CODE,
            JournalEvent::Closed => Self::CLOSED_CODE,
            JournalEvent::ModeStarted(mode) => Self::MODE_STARTED_BASE | mode.raw_u16(),
            JournalEvent::FrameSubmitted(mode) => Self::FRAME_SUBMITTED_BASE | mode.raw_u16(),
            JournalEvent::TimerStarted(mode) => Self::TIMER_STARTED_BASE | mode.raw_u16(),
            JournalEvent::DownlinkMatched(mode) => Self::DOWNLINK_MATCHED_BASE | mode.raw_u16(),
            JournalEvent::ModeCompleted(mode) => Self::MODE_COMPLETED_BASE | mode.raw_u16(),
            JournalEvent::ModeFailed(mode) => Self::MODE_FAILED_BASE | mode.raw_u16(),
            JournalEvent::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`JournalEvent::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::OPENED_CODE => return JournalEvent::Opened,
            Self::CLOSED_CODE => return JournalEvent::Closed,
            _ => {}
        }
        let [base, offset] = code.to_be_bytes();
        let Ok(mode) = TestModeReference::try_from(offset) else {
            return JournalEvent::Custom(code);
        };
        match u16::from(base) << 8 {
            Self::MODE_STARTED_BASE => JournalEvent::ModeStarted(mode),
            Self::FRAME_SUBMITTED_BASE => JournalEvent::FrameSubmitted(mode),
            Self::TIMER_STARTED_BASE => JournalEvent::TimerStarted(mode),
            Self::DOWNLINK_MATCHED_BASE => JournalEvent::DownlinkMatched(mode),
            Self::MODE_COMPLETED_BASE => JournalEvent::ModeCompleted(mode),
            Self::MODE_FAILED_BASE => JournalEvent::ModeFailed(mode),
            _ => JournalEvent::Custom(code),
        }
    }
}

/// Payloads carried alongside journal events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JournalPayload {
    /// No additional metadata accompanies the event.
    None,
    /// A submitted frame and the frequency it was forced to (0 when stack-selected).
    Frame(FrameTelemetry),
    /// Pacing timer duration.
    Timer { duration_ms: u32 },
    /// Signal strength of a validated downlink.
    Downlink { rssi_dbm: i16 },
    /// Progress snapshot at a run boundary.
    Progress(ProgressStatus),
}

/// Details of one submitted frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameTelemetry {
    pub index: u16,
    pub tx_frequency_hz: u32,
}

impl FrameTelemetry {
    #[must_use]
    pub const fn new(index: u16, tx_frequency_hz: u32) -> Self {
        Self {
            index,
            tx_frequency_hz,
        }
    }
}

/// Journal record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct JournalRecord {
    pub id: RecordId,
    pub event: JournalEvent,
    pub details: JournalPayload,
}

impl fmt::Display for JournalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.event)?;
        match self.details {
            JournalPayload::None => Ok(()),
            JournalPayload::Frame(frame) => {
                write!(f, " idx={} f={}Hz", frame.index, frame.tx_frequency_hz)
            }
            JournalPayload::Timer { duration_ms } => write!(f, " {duration_ms}ms"),
            JournalPayload::Downlink { rssi_dbm } => write!(f, " rssi={rssi_dbm}dBm"),
            JournalPayload::Progress(status) => write!(f, " {status}"),
        }
    }
}

/// Records journal events into a fixed-size ring buffer.
pub struct RunJournal<const CAPACITY: usize = JOURNAL_CAPACITY> {
    ring: HistoryBuf<JournalRecord, CAPACITY>,
    next_id: RecordId,
}

impl<const CAPACITY: usize> RunJournal<CAPACITY> {
    /// Creates a journal with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_id: 0,
        }
    }

    /// Iterates over the retained records in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &JournalRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&JournalRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an event with the supplied payload and returns its id.
    pub fn record(&mut self, event: JournalEvent, details: JournalPayload) -> RecordId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.ring.write(JournalRecord { id, event, details });
        id
    }

    /// Records a frame submission.
    pub fn record_frame(
        &mut self,
        mode: TestModeReference,
        index: usize,
        tx_frequency_hz: u32,
    ) -> RecordId {
        let index = u16::try_from(index).unwrap_or(u16::MAX);
        self.record(
            JournalEvent::FrameSubmitted(mode),
            JournalPayload::Frame(FrameTelemetry::new(index, tx_frequency_hz)),
        )
    }

    /// Records the terminal outcome of a run.
    pub fn record_outcome(&mut self, mode: TestModeReference, status: ProgressStatus) -> RecordId {
        let event = if status.error {
            JournalEvent::ModeFailed(mode)
        } else {
            JournalEvent::ModeCompleted(mode)
        };
        self.record(event, JournalPayload::Progress(status))
    }
}

impl<const CAPACITY: usize> Default for RunJournal<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> fmt::Debug for RunJournal<CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunJournal")
            .field("len", &self.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
