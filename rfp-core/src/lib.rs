#![no_std]

// Sigfox RFP certification test sequencer.
//
// `RfpAddon` walks a Sigfox End-Point through the RF & protocol test modes
// A to L, one run at a time. The radio stack, the MCU timer and the NVM check
// are reached only through the traits in `endpoint`.

#[macro_use]
mod log;

pub mod addon;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod modes;
pub mod progress;
pub mod regulatory;
pub mod repl;
pub mod signals;
pub mod telemetry;

pub use addon::{AddonState, OpenConfig, RfpAddon, TestModeRequest, VERSION};
pub use config::{Capabilities, OperatingMode};
pub use error::RfpError;
pub use modes::TestModeReference;
pub use progress::ProgressStatus;
pub use signals::RfpSignals;
