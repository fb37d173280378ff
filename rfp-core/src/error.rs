//! Status taxonomy shared by the dispatcher and every test mode.

use core::fmt;

/// Errors surfaced by the add-on API.
///
/// Success is represented by `Ok(())`; the numeric codes returned by
/// [`RfpError::code`] therefore start at 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RfpError {
    /// A required parameter was absent while parameter checks are enabled.
    NullParameter,
    /// The End-Point library reported a failure.
    EpApi,
    /// The MCU abstraction reported a failure.
    McuApi,
    /// Operation attempted outside its lifecycle state.
    State,
    /// Unknown or unsupported test mode reference.
    TestMode,
    /// The selected test mode could not start.
    TestModeStart,
    /// The running test mode stalled or could not advance.
    TestModeProcess,
}

impl RfpError {
    /// Returns the numeric status code reported to hosts.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            RfpError::NullParameter => 1,
            RfpError::EpApi => 2,
            RfpError::McuApi => 3,
            RfpError::State => 4,
            RfpError::TestMode => 5,
            RfpError::TestModeStart => 6,
            RfpError::TestModeProcess => 7,
        }
    }

    /// Stable lowercase label used by logs and the console.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            RfpError::NullParameter => "null-parameter",
            RfpError::EpApi => "ep-api",
            RfpError::McuApi => "mcu-api",
            RfpError::State => "state",
            RfpError::TestMode => "test-mode",
            RfpError::TestModeStart => "test-mode-start",
            RfpError::TestModeProcess => "test-mode-process",
        }
    }
}

impl fmt::Display for RfpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RfpError::NullParameter => f.write_str("required parameter missing"),
            RfpError::EpApi => f.write_str("end-point library error"),
            RfpError::McuApi => f.write_str("mcu abstraction error"),
            RfpError::State => f.write_str("operation not allowed in current state"),
            RfpError::TestMode => f.write_str("unknown or unsupported test mode"),
            RfpError::TestModeStart => f.write_str("test mode failed to start"),
            RfpError::TestModeProcess => f.write_str("test mode failed to advance"),
        }
    }
}

/// Raw failure code returned by the End-Point library.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EpApiError(pub u16);

impl fmt::Display for EpApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep-api status {}", self.0)
    }
}

impl From<EpApiError> for RfpError {
    fn from(_: EpApiError) -> Self {
        RfpError::EpApi
    }
}

/// Raw failure code returned by the MCU abstraction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct McuApiError(pub u16);

impl fmt::Display for McuApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mcu-api status {}", self.0)
    }
}

impl From<McuApiError> for RfpError {
    fn from(_: McuApiError) -> Self {
        RfpError::McuApi
    }
}
