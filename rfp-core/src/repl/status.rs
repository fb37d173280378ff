//! Shared status surface for the console.
//!
//! [`StatusSnapshot`] captures what the `status` command reports and
//! [`StatusFormatter`] keeps the textual rendering consistent across
//! front-ends.

use core::fmt;

use crate::addon::{AddonState, RfpAddon};
use crate::endpoint::{EndPoint, McuTimer, NvmTester};
use crate::modes::TestModeReference;
use crate::progress::ProgressStatus;
use crate::signals::SignalSet;

/// Snapshot of the add-on as reported by `status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: AddonState,
    /// Name of the open radio configuration.
    pub rc: Option<&'static str>,
    pub active_mode: Option<TestModeReference>,
    pub last_mode: Option<TestModeReference>,
    pub progress: ProgressStatus,
    pub pending: SignalSet,
    pub journal_records: usize,
}

impl StatusSnapshot {
    /// Snapshot of a closed add-on that never ran.
    #[must_use]
    pub const fn closed() -> Self {
        Self {
            state: AddonState::Closed,
            rc: None,
            active_mode: None,
            last_mode: None,
            progress: ProgressStatus::RESET,
            pending: SignalSet::EMPTY,
            journal_records: 0,
        }
    }

    #[must_use]
    pub fn capture<E, T, N>(addon: &RfpAddon<'_, E, T, N>) -> Self
    where
        E: EndPoint,
        T: McuTimer,
        N: NvmTester,
    {
        Self {
            state: addon.state(),
            rc: addon.radio_configuration().map(|rc| rc.name),
            active_mode: addon.active_mode(),
            last_mode: addon.last_mode(),
            progress: addon.progress_status(),
            pending: addon.signals().pending(),
            journal_records: addon.journal().len(),
        }
    }
}

/// Renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the lifecycle line (e.g. `addon state=ready rc=RC1`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_state_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "addon state={} rc=", self.snapshot.state)?;
        writer.write_str(self.snapshot.rc.unwrap_or("none"))
    }

    /// Writes the mode line (e.g. `mode active=C last=C`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_mode_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("mode active=")?;
        write_mode(writer, self.snapshot.active_mode)?;
        writer.write_str(" last=")?;
        write_mode(writer, self.snapshot.last_mode)
    }

    /// Writes the progress line (e.g. `progress=44% error=no`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_progress_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "{}", self.snapshot.progress)
    }

    /// Writes pending signals and journal depth (e.g. `signals pending=none journal=3`).
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_signals_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "signals pending={} journal={}",
            self.snapshot.pending, self.snapshot.journal_records
        )
    }
}

fn write_mode<W: fmt::Write>(writer: &mut W, mode: Option<TestModeReference>) -> fmt::Result {
    match mode {
        Some(reference) => write!(writer, "{reference}"),
        None => writer.write_str("-"),
    }
}
