//! Console command dispatcher.
//!
//! This module glues parsed console lines to the add-on API. Add-on commands
//! go straight to an [`RfpConsole`] target; bench commands are handed back to
//! the host as [`CommandOutcome::Bench`] because only the host owns the
//! simulated radio and clock.

use core::fmt;

use crate::addon::{AddonState, CompletionCallback, OpenConfig, RfpAddon, TestModeRequest};
use crate::endpoint::{EndPoint, McuTimer, NvmTester};
use crate::error::RfpError;
use crate::message::MessageCounterRollover;
use crate::modes::{DownlinkCallback, TestModeReference};
use crate::regulatory::RadioConfiguration;
use crate::signals::ProcessCallback;

use super::catalog::{self, CommandSpec};
use super::grammar::{self, BenchCommand, Command, ModeCommand};
use super::status::StatusSnapshot;

/// Add-on surface driven by the console.
pub trait RfpConsole {
    /// # Errors
    ///
    /// Errors from [`RfpAddon::open`].
    fn open(&mut self, config: &OpenConfig<'static>) -> Result<(), RfpError>;

    /// # Errors
    ///
    /// Errors from [`RfpAddon::close`].
    fn close(&mut self) -> Result<(), RfpError>;

    /// # Errors
    ///
    /// Errors from [`RfpAddon::test_mode`].
    fn test_mode(&mut self, request: TestModeRequest) -> Result<(), RfpError>;

    /// # Errors
    ///
    /// Errors from [`RfpAddon::process`].
    fn process(&mut self) -> Result<(), RfpError>;

    /// # Errors
    ///
    /// Errors from [`RfpAddon::version`].
    fn version(&self) -> Result<&'static str, RfpError>;

    fn status(&self) -> StatusSnapshot;
}

impl<E, T, N> RfpConsole for RfpAddon<'static, E, T, N>
where
    E: EndPoint,
    T: McuTimer,
    N: NvmTester,
{
    fn open(&mut self, config: &OpenConfig<'static>) -> Result<(), RfpError> {
        RfpAddon::open(self, config)
    }

    fn close(&mut self) -> Result<(), RfpError> {
        RfpAddon::close(self)
    }

    fn test_mode(&mut self, request: TestModeRequest) -> Result<(), RfpError> {
        RfpAddon::test_mode(self, request)
    }

    fn process(&mut self) -> Result<(), RfpError> {
        RfpAddon::process(self)
    }

    fn version(&self) -> Result<&'static str, RfpError> {
        RfpAddon::version(self)
    }

    fn status(&self) -> StatusSnapshot {
        StatusSnapshot::capture(self)
    }
}

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Opened(&'static RadioConfiguration),
    Closed,
    /// The mode was accepted; `status` is taken right after `test_mode`
    /// returned, so blocking builds already show the finished run.
    ModeStarted {
        reference: TestModeReference,
        status: StatusSnapshot,
    },
    Processed(StatusSnapshot),
    Status(StatusSnapshot),
    Version(&'static str),
    /// Command for the host's simulated radio.
    Bench(BenchCommand),
    /// `None` lists every command.
    Help(Option<&'static CommandSpec>),
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    Addon(RfpError),
    UnknownTopic(&'a str),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<RfpError> for CommandError<'_> {
    fn from(error: RfpError) -> Self {
        Self::Addon(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => write!(f, "parse error: {error}"),
            CommandError::Addon(error) => {
                write!(f, "add-on error {} ({}): {error}", error.code(), error.label())
            }
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
        }
    }
}

/// Dispatches console commands into an add-on.
pub struct CommandExecutor<T> {
    target: T,
    process_callback: Option<ProcessCallback>,
    rollover: Option<MessageCounterRollover>,
    completion: Option<CompletionCallback>,
    downlink: Option<DownlinkCallback>,
}

impl<T> CommandExecutor<T> {
    /// Creates an executor that opens without a process hook.
    pub const fn new(target: T) -> Self {
        Self {
            target,
            process_callback: None,
            rollover: None,
            completion: None,
            downlink: None,
        }
    }

    /// Hook installed on every `open`.
    #[must_use]
    pub const fn with_process_callback(mut self, callback: ProcessCallback) -> Self {
        self.process_callback = Some(callback);
        self
    }

    #[must_use]
    pub const fn with_rollover(mut self, rollover: MessageCounterRollover) -> Self {
        self.rollover = Some(rollover);
        self
    }

    /// Completion callback attached to every `mode` request.
    #[must_use]
    pub const fn with_completion(mut self, callback: CompletionCallback) -> Self {
        self.completion = Some(callback);
        self
    }

    /// Downlink callback attached to every `mode` request.
    #[must_use]
    pub const fn with_downlink(mut self, callback: DownlinkCallback) -> Self {
        self.downlink = Some(callback);
        self
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }
}

impl<T> CommandExecutor<T>
where
    T: RfpConsole,
{
    /// Parses and executes a console line.
    ///
    /// # Errors
    ///
    /// [`CommandError::Parse`] for malformed lines, [`CommandError::Addon`]
    /// when the add-on refuses the call.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> Result<CommandOutcome, CommandError<'a>> {
        match command {
            Command::Open(open) => {
                let config = OpenConfig {
                    rc: open.rc,
                    process_callback: self.process_callback,
                    message_counter_rollover: self.rollover,
                };
                self.target.open(&config)?;
                Ok(CommandOutcome::Opened(open.rc))
            }
            Command::Close => {
                self.target.close()?;
                Ok(CommandOutcome::Closed)
            }
            Command::Mode(mode) => self.handle_mode(mode),
            Command::Process => {
                self.target.process()?;
                Ok(CommandOutcome::Processed(self.target.status()))
            }
            Command::Status => Ok(CommandOutcome::Status(self.target.status())),
            Command::Version => Ok(CommandOutcome::Version(self.target.version()?)),
            Command::Bench(bench) => Ok(CommandOutcome::Bench(bench)),
            Command::Help(help) => match help.topic {
                None => Ok(CommandOutcome::Help(None)),
                Some(topic) => catalog::find(topic)
                    .map(|spec| CommandOutcome::Help(Some(spec)))
                    .ok_or(CommandError::UnknownTopic(topic)),
            },
        }
    }

    fn handle_mode<'a>(&mut self, mode: ModeCommand) -> Result<CommandOutcome, CommandError<'a>> {
        let request = TestModeRequest {
            reference: mode.reference,
            ul_bit_rate: mode.bit_rate,
            tx_power_dbm_eirp: mode.tx_power_dbm_eirp,
            completion: self.completion,
            downlink: self.downlink,
        };
        self.target.test_mode(request)?;
        Ok(CommandOutcome::ModeStarted {
            reference: mode.reference,
            status: self.target.status(),
        })
    }

    /// Returns `true` while the target still runs a test mode.
    pub fn is_processing(&self) -> bool {
        self.target.status().state == AddonState::Processing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::TestModeReference;
    use crate::progress::ProgressStatus;
    use crate::regulatory::RC3;
    use crate::signals::SignalSet;

    use heapless::Vec;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Open(&'static str, bool),
        Close,
        TestMode(TestModeReference, Option<i8>),
        Process,
    }

    struct MockConsole {
        state: AddonState,
        calls: Vec<Call, 8>,
        refuse: Option<RfpError>,
    }

    impl MockConsole {
        fn new() -> Self {
            Self {
                state: AddonState::Closed,
                calls: Vec::new(),
                refuse: None,
            }
        }

        fn record(&mut self, call: Call) -> Result<(), RfpError> {
            self.calls.push(call).expect("call log capacity");
            self.refuse.map_or(Ok(()), Err)
        }
    }

    impl RfpConsole for MockConsole {
        fn open(&mut self, config: &OpenConfig<'static>) -> Result<(), RfpError> {
            self.record(Call::Open(config.rc.name, config.process_callback.is_some()))?;
            self.state = AddonState::Ready;
            Ok(())
        }

        fn close(&mut self) -> Result<(), RfpError> {
            self.record(Call::Close)?;
            self.state = AddonState::Closed;
            Ok(())
        }

        fn test_mode(&mut self, request: TestModeRequest) -> Result<(), RfpError> {
            self.record(Call::TestMode(request.reference, request.tx_power_dbm_eirp))?;
            self.state = AddonState::Processing;
            Ok(())
        }

        fn process(&mut self) -> Result<(), RfpError> {
            self.record(Call::Process)
        }

        fn version(&self) -> Result<&'static str, RfpError> {
            Ok("9.9.9")
        }

        fn status(&self) -> StatusSnapshot {
            StatusSnapshot {
                state: self.state,
                rc: None,
                active_mode: None,
                last_mode: None,
                progress: ProgressStatus::RESET,
                pending: SignalSet::EMPTY,
                journal_records: 0,
            }
        }
    }

    fn hook() {}

    #[test]
    fn open_installs_configured_hook() {
        let mut executor = CommandExecutor::new(MockConsole::new()).with_process_callback(hook);
        let outcome = executor.execute("open rc3").expect("open should succeed");
        assert_eq!(outcome, CommandOutcome::Opened(&RC3));
        assert_eq!(executor.target().calls.as_slice(), &[Call::Open("RC3", true)]);
    }

    #[test]
    fn mode_forwards_overrides() {
        let mut executor = CommandExecutor::new(MockConsole::new());
        executor.execute("open").expect("open");
        match executor.execute("mode k power=12").expect("mode should start") {
            CommandOutcome::ModeStarted { reference, status } => {
                assert_eq!(reference, TestModeReference::K);
                assert_eq!(status.state, AddonState::Processing);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(executor.is_processing());
        assert_eq!(
            executor.target().calls.last(),
            Some(&Call::TestMode(TestModeReference::K, Some(12)))
        );
    }

    #[test]
    fn addon_errors_are_reported() {
        let mut console = MockConsole::new();
        console.refuse = Some(RfpError::State);
        let mut executor = CommandExecutor::new(console);
        assert_eq!(
            executor.execute("close"),
            Err(CommandError::Addon(RfpError::State))
        );
    }

    #[test]
    fn bench_commands_are_returned_to_the_host() {
        let mut executor = CommandExecutor::new(MockConsole::new());
        assert_eq!(
            executor.execute("run"),
            Ok(CommandOutcome::Bench(BenchCommand::Run))
        );
        assert!(executor.target().calls.is_empty());
    }

    #[test]
    fn help_resolves_topics() {
        let mut executor = CommandExecutor::new(MockConsole::new());
        match executor.execute("help open") {
            Ok(CommandOutcome::Help(Some(spec))) => assert_eq!(spec.name, "open"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            executor.execute("help reboot"),
            Err(CommandError::UnknownTopic("reboot"))
        );
    }

    #[test]
    fn parse_errors_are_returned() {
        let mut executor = CommandExecutor::new(MockConsole::new());
        assert!(matches!(
            executor.execute("open rc9"),
            Err(CommandError::Parse(_))
        ));
        assert_eq!(executor.execute("version"), Ok(CommandOutcome::Version("9.9.9")));
        assert!(matches!(
            executor.execute("status"),
            Ok(CommandOutcome::Status(_))
        ));
    }
}
