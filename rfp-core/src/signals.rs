//! Sticky notification flags shared between interrupt context and the dispatcher.
//!
//! Lower layers only ever set bits and forward a single outer notification;
//! the cooperative dispatcher consumes them on its next `process` tick.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;
use portable_atomic::{AtomicU8, Ordering};

/// Host notification raised whenever a signal becomes pending.
pub type ProcessCallback = fn();

/// Individual pending events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Signal {
    /// The End-Point library asked for a processing tick.
    EpApiProcess,
    /// The active test mode has work to do.
    ModeProcess,
    /// The active test mode finished (success or error).
    ModeComplete,
    /// The last submitted message finished.
    MessageComplete,
    /// The pacing timer expired.
    TimerComplete,
}

impl Signal {
    const fn bit(self) -> u8 {
        match self {
            Signal::EpApiProcess => 1 << 0,
            Signal::ModeProcess => 1 << 1,
            Signal::ModeComplete => 1 << 2,
            Signal::MessageComplete => 1 << 3,
            Signal::TimerComplete => 1 << 4,
        }
    }
}

/// Snapshot of pending signal bits.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SignalSet(u8);

impl SignalSet {
    pub const EMPTY: Self = Self(0);
    /// Signals owned by a test-mode run.
    pub const MODE: Self = Self(
        Signal::ModeProcess.bit()
            | Signal::ModeComplete.bit()
            | Signal::MessageComplete.bit()
            | Signal::TimerComplete.bit(),
    );

    #[must_use]
    pub const fn of(signal: Signal) -> Self {
        Self(signal.bit())
    }

    #[must_use]
    pub const fn with(self, signal: Signal) -> Self {
        Self(self.0 | signal.bit())
    }

    #[must_use]
    pub const fn contains(self, signal: Signal) -> bool {
        self.0 & signal.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Signal, &str); 5] = [
            (Signal::EpApiProcess, "ep-process"),
            (Signal::ModeProcess, "mode-process"),
            (Signal::ModeComplete, "mode-complete"),
            (Signal::MessageComplete, "message-complete"),
            (Signal::TimerComplete, "timer-complete"),
        ];
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (signal, name) in NAMES {
            if self.contains(signal) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Interrupt-safe signal set plus the optional host process callback.
///
/// Usually placed in a `static` so ISRs and the main loop can share it.
pub struct RfpSignals {
    pending: AtomicU8,
    process_callback: Mutex<Cell<Option<ProcessCallback>>>,
}

impl RfpSignals {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: AtomicU8::new(0),
            process_callback: Mutex::new(Cell::new(None)),
        }
    }

    /// Called by the End-Point library when it needs a processing tick.
    pub fn notify_ep_api_process(&self) {
        self.raise(SignalSet::of(Signal::EpApiProcess));
    }

    /// Called by the End-Point library when the submitted message completed.
    pub fn notify_message_complete(&self) {
        self.raise(SignalSet::of(Signal::MessageComplete).with(Signal::ModeProcess));
    }

    /// Called by the MCU timer on expiry.
    pub fn notify_timer_complete(&self) {
        self.raise(SignalSet::of(Signal::TimerComplete).with(Signal::ModeProcess));
    }

    pub(crate) fn notify_mode_complete(&self) {
        self.raise(SignalSet::of(Signal::ModeComplete));
    }

    /// Current pending bits.
    #[must_use]
    pub fn pending(&self) -> SignalSet {
        SignalSet(self.pending.load(Ordering::Acquire))
    }

    /// Returns `true` when the signal is pending.
    #[must_use]
    pub fn is_pending(&self, signal: Signal) -> bool {
        self.pending().contains(signal)
    }

    /// Consumes `signal`, returning whether it was pending.
    pub(crate) fn take(&self, signal: Signal) -> bool {
        let bit = signal.bit();
        self.pending.fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }

    /// Consumes both signals only when both are pending.
    pub(crate) fn take_both(&self, first: Signal, second: Signal) -> bool {
        let mask = first.bit() | second.bit();
        if self.pending.load(Ordering::Acquire) & mask != mask {
            return false;
        }
        self.pending.fetch_and(!mask, Ordering::AcqRel);
        true
    }

    pub(crate) fn clear(&self, set: SignalSet) {
        self.pending.fetch_and(!set.bits(), Ordering::AcqRel);
    }

    pub(crate) fn clear_all(&self) {
        self.pending.store(0, Ordering::Release);
    }

    pub(crate) fn set_process_callback(&self, callback: Option<ProcessCallback>) {
        critical_section::with(|cs| self.process_callback.borrow(cs).set(callback));
    }

    /// Returns `true` when a host process callback is installed.
    #[must_use]
    pub fn has_process_callback(&self) -> bool {
        critical_section::with(|cs| self.process_callback.borrow(cs).get()).is_some()
    }

    fn raise(&self, set: SignalSet) {
        self.pending.fetch_or(set.bits(), Ordering::AcqRel);
        let callback = critical_section::with(|cs| self.process_callback.borrow(cs).get());
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl Default for RfpSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RfpSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RfpSignals")
            .field("pending", &self.pending())
            .field("process_callback", &self.has_process_callback())
            .finish()
    }
}
