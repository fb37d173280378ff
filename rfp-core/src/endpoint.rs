//! Collaborator seams: the End-Point library, the MCU timer and the NVM test.
//!
//! The add-on drives these through trait objects so the same state machines
//! run against real radio stacks, the host emulator, and test doubles.
//! Callback-driven implementations report asynchronous completions through
//! [`RfpSignals`](crate::signals::RfpSignals) rather than function pointers.

use core::fmt;

use crate::error::{EpApiError, McuApiError};
use crate::message::{
    ApplicationMessage, ControlMessage, DownlinkFrame, MessageCounterRollover, MessageStatus,
    TestParameters,
};
use crate::regulatory::RadioConfiguration;

/// Parameters forwarded to the End-Point library at open.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EpConfig<'a> {
    pub rc: &'a RadioConfiguration,
    pub message_counter_rollover: Option<MessageCounterRollover>,
}

/// Message submission and status interface of the End-Point library.
///
/// In the callback-driven personality, implementations call
/// `RfpSignals::notify_message_complete` once a submitted message is fully
/// processed and `RfpSignals::notify_ep_api_process` whenever the library
/// needs its `process` entry point. Blocking implementations return from
/// `send_*` only after the message finished.
pub trait EndPoint {
    /// Opens the library for `config.rc`.
    ///
    /// # Errors
    ///
    /// Returns the library's raw status on failure.
    fn open(&mut self, config: &EpConfig<'_>) -> Result<(), EpApiError>;

    /// Closes the library.
    ///
    /// # Errors
    ///
    /// Returns the library's raw status on failure.
    fn close(&mut self) -> Result<(), EpApiError>;

    /// Runs one processing tick of the library.
    ///
    /// # Errors
    ///
    /// Returns the library's raw status on failure.
    fn process(&mut self) -> Result<(), EpApiError>;

    /// Submits an application message with certification overrides.
    ///
    /// # Errors
    ///
    /// Returns the library's raw status when the submission is refused.
    fn send_application_message(
        &mut self,
        message: &ApplicationMessage,
        test: &TestParameters,
    ) -> Result<(), EpApiError>;

    /// Submits a control message with certification overrides.
    ///
    /// # Errors
    ///
    /// Returns the library's raw status when the submission is refused.
    fn send_control_message(
        &mut self,
        message: &ControlMessage,
        test: &TestParameters,
    ) -> Result<(), EpApiError>;

    /// Status bits of the last completed message.
    fn message_status(&self) -> MessageStatus;

    /// Reads the payload and RSSI of the last received downlink.
    ///
    /// # Errors
    ///
    /// Returns the library's raw status when no downlink is available.
    fn downlink_frame(&mut self) -> Result<DownlinkFrame, EpApiError>;
}

/// Timer slot reserved for the add-on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerInstance {
    AddonRfp,
}

/// Reason tag attached to timer requests.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerReason {
    AddonRfp,
}

/// Timer request descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimerConfig {
    pub duration_ms: u32,
    pub instance: TimerInstance,
    pub reason: TimerReason,
}

impl TimerConfig {
    /// Pacing timer on the add-on slot.
    #[must_use]
    pub const fn addon(duration_ms: u32) -> Self {
        Self {
            duration_ms,
            instance: TimerInstance::AddonRfp,
            reason: TimerReason::AddonRfp,
        }
    }
}

/// Timer primitives of the MCU abstraction layer.
///
/// Callback-driven implementations call `RfpSignals::notify_timer_complete`
/// on expiry.
pub trait McuTimer {
    /// Arms a one-shot timer.
    ///
    /// # Errors
    ///
    /// Returns the abstraction's raw status on failure.
    fn start(&mut self, timer: &TimerConfig) -> Result<(), McuApiError>;

    /// Cancels a timer; stopping an expired timer is not an error.
    ///
    /// # Errors
    ///
    /// Returns the abstraction's raw status on failure.
    fn stop(&mut self, instance: TimerInstance) -> Result<(), McuApiError>;

    /// Blocks until the timer expires (blocking personality only).
    ///
    /// # Errors
    ///
    /// Returns the abstraction's raw status on failure.
    fn wait_complete(&mut self, instance: TimerInstance) -> Result<(), McuApiError>;
}

/// Outcome of an NVM self test that did not pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NvmTestError {
    /// No NVM test is available on this device.
    Unavailable,
    /// The test ran and reported a failure.
    Failed,
}

impl fmt::Display for NvmTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NvmTestError::Unavailable => f.write_str("nvm test unavailable"),
            NvmTestError::Failed => f.write_str("nvm test failed"),
        }
    }
}

/// External non-volatile memory test run by mode L.
pub trait NvmTester {
    /// Runs the test to completion.
    ///
    /// # Errors
    ///
    /// Returns [`NvmTestError`] when the test is missing or fails.
    fn run(&mut self) -> Result<(), NvmTestError>;
}

/// Placeholder used when the device has no NVM test.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNvmTester;

impl NvmTester for NoNvmTester {
    fn run(&mut self) -> Result<(), NvmTestError> {
        Err(NvmTestError::Unavailable)
    }
}
