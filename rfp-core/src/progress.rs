//! Progress snapshot exposed by every test mode.

use core::fmt;

/// Highest value the progress field can hold.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Run progress as reported to the host: a sticky error bit and a 7-bit percentage.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ProgressStatus {
    pub error: bool,
    pub progress: u8,
}

impl ProgressStatus {
    /// Fresh status used at the start of every run.
    pub const RESET: Self = Self {
        error: false,
        progress: 0,
    };

    #[must_use]
    pub const fn new(error: bool, progress: u8) -> Self {
        Self { error, progress }
    }

    /// Returns `true` once the run reached 100% without error.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        !self.error && self.progress == PROGRESS_COMPLETE
    }

    /// Packs the status into one byte: error in bit 0, progress in bits 1..=7.
    #[must_use]
    pub fn to_raw(self) -> u8 {
        (self.progress << 1) | u8::from(self.error)
    }

    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self {
            error: raw & 0x01 != 0,
            progress: raw >> 1,
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "progress={}% error={}",
            self.progress,
            if self.error { "yes" } else { "no" }
        )
    }
}

/// Integer percentage `100 * done / total`, saturating at 100.
#[must_use]
pub fn percent(done: u16, total: u16) -> u8 {
    if total == 0 || done >= total {
        return PROGRESS_COMPLETE;
    }
    let scaled = u32::from(done) * u32::from(PROGRESS_COMPLETE) / u32::from(total);
    u8::try_from(scaled).unwrap_or(PROGRESS_COMPLETE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_packing_keeps_error_and_progress() {
        let status = ProgressStatus::new(true, 42);
        assert_eq!(ProgressStatus::from_raw(status.to_raw()), status);
        assert_eq!(ProgressStatus::new(false, 100).to_raw(), 200);
    }

    #[test]
    fn percent_truncates_like_integer_division() {
        assert_eq!(percent(1, 9), 11);
        assert_eq!(percent(8, 9), 88);
        assert_eq!(percent(9, 9), 100);
        assert_eq!(percent(150, 301), 49);
        assert_eq!(percent(0, 0), 100);
    }
}
