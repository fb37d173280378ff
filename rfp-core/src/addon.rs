//! The RFP add-on dispatcher.
//!
//! `RfpAddon` owns the collaborators and walks the CLOSED -> READY ->
//! PROCESSING lifecycle. It selects the requested test mode, forwards the
//! cooperative `process` tick and reports progress. Lower layers never call
//! into it directly; they raise bits on the shared [`RfpSignals`] and the host
//! re-enters [`RfpAddon::process`].

use core::fmt;

use crate::config::{CapabilityError, Capabilities};
use crate::endpoint::{EndPoint, EpConfig, McuTimer, NoNvmTester, NvmTester, TimerInstance};
use crate::error::RfpError;
use crate::message::{MessageCounterRollover, UlBitRate};
use crate::modes::{DownlinkCallback, ModeIo, ModeParameters, ModeRun, TestMode, TestModeReference};
use crate::progress::ProgressStatus;
use crate::regulatory::RadioConfiguration;
use crate::signals::{ProcessCallback, RfpSignals, Signal, SignalSet};
use crate::telemetry::{JournalEvent, JournalPayload, RunJournal};

/// Add-on version reported by [`RfpAddon::version`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Host callback invoked once when a test-mode run finishes.
pub type CompletionCallback = fn();

/// Lifecycle of the add-on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AddonState {
    Closed,
    Ready,
    Processing,
}

impl AddonState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            AddonState::Closed => "closed",
            AddonState::Ready => "ready",
            AddonState::Processing => "processing",
        }
    }
}

impl fmt::Display for AddonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parameters of [`RfpAddon::open`].
#[derive(Copy, Clone, Debug)]
pub struct OpenConfig<'a> {
    pub rc: &'a RadioConfiguration,
    /// Raised whenever the add-on needs a `process` call. `None` selects the
    /// self-driving behaviour where `test_mode` runs to completion.
    pub process_callback: Option<ProcessCallback>,
    pub message_counter_rollover: Option<MessageCounterRollover>,
}

impl<'a> OpenConfig<'a> {
    #[must_use]
    pub const fn new(rc: &'a RadioConfiguration) -> Self {
        Self {
            rc,
            process_callback: None,
            message_counter_rollover: None,
        }
    }

    #[must_use]
    pub const fn with_process_callback(mut self, callback: ProcessCallback) -> Self {
        self.process_callback = Some(callback);
        self
    }

    #[must_use]
    pub const fn with_rollover(mut self, rollover: MessageCounterRollover) -> Self {
        self.message_counter_rollover = Some(rollover);
        self
    }
}

/// Parameters of [`RfpAddon::test_mode`].
#[derive(Copy, Clone, Debug)]
pub struct TestModeRequest {
    pub reference: TestModeReference,
    pub ul_bit_rate: Option<UlBitRate>,
    pub tx_power_dbm_eirp: Option<i8>,
    pub completion: Option<CompletionCallback>,
    pub downlink: Option<DownlinkCallback>,
}

impl TestModeRequest {
    #[must_use]
    pub const fn new(reference: TestModeReference) -> Self {
        Self {
            reference,
            ul_bit_rate: None,
            tx_power_dbm_eirp: None,
            completion: None,
            downlink: None,
        }
    }

    #[must_use]
    pub const fn with_bit_rate(mut self, bit_rate: UlBitRate) -> Self {
        self.ul_bit_rate = Some(bit_rate);
        self
    }

    #[must_use]
    pub const fn with_power(mut self, tx_power_dbm_eirp: i8) -> Self {
        self.tx_power_dbm_eirp = Some(tx_power_dbm_eirp);
        self
    }

    #[must_use]
    pub const fn with_completion(mut self, callback: CompletionCallback) -> Self {
        self.completion = Some(callback);
        self
    }

    #[must_use]
    pub const fn with_downlink(mut self, callback: DownlinkCallback) -> Self {
        self.downlink = Some(callback);
        self
    }
}

/// Certification test sequencer driving an End-Point stack.
pub struct RfpAddon<'a, E, T, N = NoNvmTester>
where
    E: EndPoint,
    T: McuTimer,
    N: NvmTester,
{
    signals: &'a RfpSignals,
    endpoint: E,
    timer: T,
    nvm: N,
    capabilities: Capabilities,
    rc: Option<&'a RadioConfiguration>,
    state: AddonState,
    run: Option<ModeRun>,
    completion: Option<CompletionCallback>,
    journal: RunJournal,
}

impl<'a, E, T, N> RfpAddon<'a, E, T, N>
where
    E: EndPoint,
    T: McuTimer,
    N: NvmTester,
{
    /// Builds a closed add-on after validating the capability set.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError`] for an inconsistent build personality.
    pub fn new(
        signals: &'a RfpSignals,
        endpoint: E,
        timer: T,
        nvm: N,
        capabilities: Capabilities,
    ) -> Result<Self, CapabilityError> {
        let capabilities = capabilities.validate().inspect_err(|_| {
            error!("rfp capability set rejected");
        })?;
        Ok(Self {
            signals,
            endpoint,
            timer,
            nvm,
            capabilities,
            rc: None,
            state: AddonState::Closed,
            run: None,
            completion: None,
            journal: RunJournal::new(),
        })
    }

    /// Opens the End-Point stack for `config.rc`.
    ///
    /// # Errors
    ///
    /// [`RfpError::State`] unless closed; [`RfpError::EpApi`] when the stack
    /// refuses to open, in which case nothing changes.
    pub fn open(&mut self, config: &OpenConfig<'a>) -> Result<(), RfpError> {
        if self.state != AddonState::Closed {
            return Err(RfpError::State);
        }
        self.endpoint.open(&EpConfig {
            rc: config.rc,
            message_counter_rollover: config.message_counter_rollover,
        })?;
        self.signals.clear_all();
        self.signals.set_process_callback(config.process_callback);
        self.rc = Some(config.rc);
        self.state = AddonState::Ready;
        self.journal.record(JournalEvent::Opened, JournalPayload::None);
        info!("rfp add-on opened, rc {=str}", config.rc.name);
        Ok(())
    }

    /// Closes the stack and forces the add-on back to CLOSED.
    ///
    /// A run in flight is abandoned without invoking its completion callback.
    ///
    /// # Errors
    ///
    /// [`RfpError::EpApi`] when the stack refuses to close; the add-on then
    /// keeps its current state.
    pub fn close(&mut self) -> Result<(), RfpError> {
        self.endpoint.close()?;
        if self.state == AddonState::Processing && self.timer.stop(TimerInstance::AddonRfp).is_err()
        {
            warn!("rfp timer stop failed while abandoning a run");
        }
        self.signals.set_process_callback(None);
        self.signals.clear_all();
        self.rc = None;
        self.run = None;
        self.completion = None;
        self.state = AddonState::Closed;
        self.journal.record(JournalEvent::Closed, JournalPayload::None);
        info!("rfp add-on closed");
        Ok(())
    }

    /// Starts a test mode.
    ///
    /// Without a process callback, or in the blocking personality, the call
    /// returns only once the run finished and its completion callback fired.
    ///
    /// # Errors
    ///
    /// [`RfpError::State`] unless ready, [`RfpError::TestMode`] for modes the
    /// build cannot run, and any error raised while initialising or running
    /// the first step (the add-on then stays READY).
    pub fn test_mode(&mut self, request: TestModeRequest) -> Result<(), RfpError> {
        if self.state != AddonState::Ready {
            return Err(RfpError::State);
        }
        if !self.capabilities.supports(request.reference) {
            warn!("rfp test mode {=u8} not supported by this build", request.reference.raw());
            return Err(RfpError::TestMode);
        }
        let params = ModeParameters::resolve(
            self.rc,
            request.ul_bit_rate,
            request.tx_power_dbm_eirp,
            request.downlink,
            &self.capabilities,
        );
        self.signals.clear(SignalSet::MODE);
        self.completion = request.completion;
        self.journal.record(
            JournalEvent::ModeStarted(request.reference),
            JournalPayload::None,
        );
        info!("rfp test mode {=u8} starting", request.reference.raw());

        let mut run = ModeRun::new(request.reference);
        let started = {
            let mut io = self.io();
            run.init(params, &mut io)
                .and_then(|()| run.process(&mut io))
        };
        self.run = Some(run);
        if let Err(err) = started {
            self.signals.clear(SignalSet::MODE);
            self.completion = None;
            error!("rfp test mode {=u8} failed to start: {=str}", request.reference.raw(), err.label());
            return Err(err);
        }
        self.state = AddonState::Processing;

        if self.capabilities.is_blocking() || !self.signals.has_process_callback() {
            while self.state == AddonState::Processing {
                self.process()?;
            }
        }
        Ok(())
    }

    /// Cooperative tick: forwards pending stack processing, then advances the
    /// active run and reports its completion.
    ///
    /// # Errors
    ///
    /// Collaborator or run failures. During a run the completion callback
    /// still fires once and the add-on returns to READY.
    pub fn process(&mut self) -> Result<(), RfpError> {
        if self.signals.take(Signal::EpApiProcess)
            && let Err(err) = self.endpoint.process()
        {
            let err = RfpError::from(err);
            if self.state == AddonState::Processing {
                return Err(self.abort_run(err));
            }
            return Err(err);
        }
        if self.state != AddonState::Processing {
            return Ok(());
        }
        if self.signals.take(Signal::ModeProcess) {
            let result = match self.run.take() {
                Some(mut run) => {
                    let result = run.process(&mut self.io());
                    self.run = Some(run);
                    result
                }
                None => Err(RfpError::TestModeProcess),
            };
            if let Err(err) = result {
                return Err(self.abort_run(err));
            }
        }
        if self.signals.take(Signal::ModeComplete) {
            self.complete_run();
        }
        Ok(())
    }

    /// Progress of the active or last finished run; the reset value when no
    /// run exists.
    #[must_use]
    pub fn progress_status(&self) -> ProgressStatus {
        self.run
            .as_ref()
            .map_or_else(ProgressStatus::default, TestMode::progress_status)
    }

    /// Add-on version string.
    ///
    /// # Errors
    ///
    /// [`RfpError::State`] while closed.
    pub fn version(&self) -> Result<&'static str, RfpError> {
        if self.state == AddonState::Closed {
            return Err(RfpError::State);
        }
        Ok(VERSION)
    }

    #[must_use]
    pub const fn state(&self) -> AddonState {
        self.state
    }

    /// Mode currently running, `None` outside PROCESSING.
    #[must_use]
    pub fn active_mode(&self) -> Option<TestModeReference> {
        if self.state != AddonState::Processing {
            return None;
        }
        self.run.as_ref().map(TestMode::reference)
    }

    /// Mode of the last run still holding a progress snapshot.
    #[must_use]
    pub fn last_mode(&self) -> Option<TestModeReference> {
        self.run.as_ref().map(TestMode::reference)
    }

    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Radio configuration of the open session.
    #[must_use]
    pub const fn radio_configuration(&self) -> Option<&'a RadioConfiguration> {
        self.rc
    }

    #[must_use]
    pub const fn journal(&self) -> &RunJournal {
        &self.journal
    }

    #[must_use]
    pub const fn signals(&self) -> &'a RfpSignals {
        self.signals
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn nvm_mut(&mut self) -> &mut N {
        &mut self.nvm
    }

    fn io(&mut self) -> ModeIo<'_> {
        ModeIo {
            endpoint: &mut self.endpoint,
            timer: &mut self.timer,
            nvm: &mut self.nvm,
            signals: self.signals,
            capabilities: &self.capabilities,
            journal: &mut self.journal,
        }
    }

    fn complete_run(&mut self) {
        self.state = AddonState::Ready;
        let status = self.progress_status();
        info!(
            "rfp run finished: progress {=u8} error {=bool}",
            status.progress,
            status.error
        );
        if let Some(callback) = self.completion.take() {
            callback();
        }
    }

    fn abort_run(&mut self, err: RfpError) -> RfpError {
        self.signals.clear(SignalSet::of(Signal::ModeComplete));
        self.state = AddonState::Ready;
        error!("rfp run aborted: {=str}", err.label());
        if let Some(callback) = self.completion.take() {
            callback();
        }
        err
    }
}

impl<E, T, N> fmt::Debug for RfpAddon<'_, E, T, N>
where
    E: EndPoint,
    T: McuTimer,
    N: NvmTester,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RfpAddon")
            .field("state", &self.state)
            .field("rc", &self.rc.map(|rc| rc.name))
            .field("run", &self.last_mode())
            .field("progress", &self.progress_status())
            .finish_non_exhaustive()
    }
}
