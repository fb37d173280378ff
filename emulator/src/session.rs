use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};

use rfp_core::addon::RfpAddon;
use rfp_core::config::{Capabilities, OperatingMode};
use rfp_core::message::DL_PAYLOAD_SIZE_BYTES;
use rfp_core::regulatory::RadioConfiguration;
use rfp_core::repl::catalog;
use rfp_core::repl::commands::{CommandExecutor, CommandOutcome};
use rfp_core::repl::grammar::{BenchCommand, DownlinkScript};
use rfp_core::repl::status::{StatusFormatter, StatusSnapshot};
use rfp_core::signals::{RfpSignals, Signal};
use rfp_core::telemetry::RecordId;

use crate::radio::{SharedSimulation, SimEndPoint, SimNvm, SimTimer, Simulation};

/// Longest stretch of virtual time `run` may cover.
const RUN_LIMIT_MS: u64 = 6 * 60 * 60 * 1_000;
/// Guard against a dispatcher that keeps re-raising its own signals.
const MAX_PROCESS_TICKS: usize = 64;

static SIGNALS: RfpSignals = RfpSignals::new();
static PROCESS_REQUESTS: AtomicUsize = AtomicUsize::new(0);
static COMPLETIONS: AtomicUsize = AtomicUsize::new(0);
static DOWNLINKS: AtomicUsize = AtomicUsize::new(0);
static LAST_DOWNLINK_RSSI: AtomicI16 = AtomicI16::new(0);

fn on_process_request() {
    PROCESS_REQUESTS.fetch_add(1, Ordering::Relaxed);
}

fn on_completion() {
    COMPLETIONS.fetch_add(1, Ordering::Relaxed);
}

fn on_downlink(_payload: &[u8; DL_PAYLOAD_SIZE_BYTES], rssi_dbm: i16) {
    DOWNLINKS.fetch_add(1, Ordering::Relaxed);
    LAST_DOWNLINK_RSSI.store(rssi_dbm, Ordering::Relaxed);
}

type BenchAddon = RfpAddon<'static, SimEndPoint, SimTimer, SimNvm>;

/// Bench configuration taken from the command line.
#[derive(Clone, Debug)]
pub struct BenchOptions {
    pub blocking: bool,
    /// Radio configuration opened at startup.
    pub rc: Option<&'static RadioConfiguration>,
    pub payload_size: Option<u8>,
    pub single_frame: bool,
    pub downlinks: bool,
    pub transcript: Option<PathBuf>,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            blocking: false,
            rc: None,
            payload_size: None,
            single_frame: false,
            downlinks: true,
            transcript: None,
        }
    }
}

impl BenchOptions {
    fn personality(&self) -> &'static str {
        if self.blocking { "blocking" } else { "callback" }
    }
}

pub struct Session {
    executor: CommandExecutor<BenchAddon>,
    sim: SharedSimulation,
    transcript: Option<TranscriptLogger>,
    frames_reported: usize,
    last_record: Option<RecordId>,
    completions_seen: usize,
    downlinks_seen: usize,
}

impl Session {
    pub fn new(options: &BenchOptions) -> io::Result<Self> {
        let operating_mode = if options.blocking {
            OperatingMode::Blocking
        } else {
            OperatingMode::CallbackDriven
        };
        let capabilities = Capabilities::full(operating_mode)
            .with_payload_size(options.payload_size)
            .with_single_frame(options.single_frame);

        let sim = Simulation::new(&SIGNALS, options.blocking, options.downlinks).shared();
        let addon = RfpAddon::new(
            &SIGNALS,
            SimEndPoint::new(Rc::clone(&sim)),
            SimTimer::new(Rc::clone(&sim)),
            SimNvm::new(Rc::clone(&sim)),
            capabilities,
        )
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        let mut executor = CommandExecutor::new(addon)
            .with_completion(on_completion)
            .with_downlink(on_downlink);
        if !options.blocking {
            executor = executor.with_process_callback(on_process_request);
        }

        let transcript = options
            .transcript
            .as_deref()
            .map(|path| TranscriptLogger::new(path, options))
            .transpose()?;

        Ok(Self {
            executor,
            sim,
            transcript,
            frames_reported: 0,
            last_record: None,
            completions_seen: COMPLETIONS.load(Ordering::Relaxed),
            downlinks_seen: DOWNLINKS.load(Ordering::Relaxed),
        })
    }

    /// Shared handle on the simulated radio and clock.
    pub fn simulation(&self) -> &SharedSimulation {
        &self.sim
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.log(TranscriptRole::Host, trimmed)?;

        let mut lines = Vec::new();
        match self.executor.execute(trimmed) {
            Ok(CommandOutcome::Opened(rc)) => lines.push(format!("OK open {rc}")),
            Ok(CommandOutcome::Closed) => lines.push("OK close".to_string()),
            Ok(CommandOutcome::ModeStarted { reference, .. }) => {
                lines.push(format!("OK mode {reference}: {}", reference.summary()));
                self.pump(&mut lines);
            }
            Ok(CommandOutcome::Processed(_)) => {
                lines.push("OK process".to_string());
                self.pump(&mut lines);
            }
            Ok(CommandOutcome::Status(snapshot)) => self.describe_status(&snapshot, &mut lines),
            Ok(CommandOutcome::Version(version)) => lines.push(format!("OK version {version}")),
            Ok(CommandOutcome::Bench(command)) => self.apply_bench(command, &mut lines),
            Ok(CommandOutcome::Help(topic)) => describe_help(topic, &mut lines),
            Err(err) => lines.push(format!("ERR {err}")),
        }
        self.narrate(&mut lines);

        for line in &lines {
            self.log(TranscriptRole::Emulator, line)?;
        }
        Ok(lines)
    }

    fn apply_bench(&mut self, command: BenchCommand, lines: &mut Vec<String>) {
        match command {
            BenchCommand::Advance(duration) => {
                let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                let target = self.sim.borrow().now_ms().saturating_add(millis);
                self.advance_to(target, lines);
                lines.push(format!("OK clock +{}ms", self.sim.borrow().now_ms()));
            }
            BenchCommand::Run => self.run_to_completion(lines),
            BenchCommand::Inject(fault) => {
                self.sim.borrow_mut().inject(fault);
                lines.push(format!("OK inject {fault:?}"));
            }
            BenchCommand::Downlink(script) => {
                self.sim.borrow_mut().script_downlink(Some(script));
                let label = match script {
                    DownlinkScript::Pattern => "pattern",
                    DownlinkScript::Counter => "counter",
                    DownlinkScript::Corrupt => "corrupt",
                    DownlinkScript::Silent => "none",
                };
                lines.push(format!("OK downlink {label}"));
            }
        }
    }

    fn advance_to(&mut self, target_ms: u64, lines: &mut Vec<String>) {
        loop {
            let fired = self.sim.borrow_mut().step_until(target_ms);
            self.pump(lines);
            if fired.is_none() {
                break;
            }
        }
    }

    fn run_to_completion(&mut self, lines: &mut Vec<String>) {
        let limit = self.sim.borrow().now_ms().saturating_add(RUN_LIMIT_MS);
        while self.executor.is_processing() {
            let next = self.sim.borrow().next_event();
            match next {
                Some((at_ms, _)) if at_ms <= limit => self.advance_to(at_ms, lines),
                Some(_) => {
                    lines.push("ERR run exceeded the bench time limit".to_string());
                    return;
                }
                None => {
                    lines.push("ERR run stalled with nothing scheduled".to_string());
                    return;
                }
            }
        }
        lines.push(format!("OK run finished at +{}ms", self.sim.borrow().now_ms()));
    }

    /// Calls `process` while the dispatcher has work pending.
    fn pump(&mut self, lines: &mut Vec<String>) {
        for _ in 0..MAX_PROCESS_TICKS {
            let pending = SIGNALS.pending();
            let wants_tick = pending.contains(Signal::EpApiProcess)
                || pending.contains(Signal::ModeProcess)
                || pending.contains(Signal::ModeComplete);
            if !wants_tick {
                return;
            }
            if let Err(err) = self.executor.target_mut().process() {
                lines.push(format!("ERR process {} ({})", err.label(), err));
                return;
            }
        }
        lines.push("ERR dispatcher still busy after repeated ticks".to_string());
    }

    fn describe_status(&self, snapshot: &StatusSnapshot, lines: &mut Vec<String>) {
        let formatter = StatusFormatter::new(snapshot);
        let mut state = String::new();
        let mut mode = String::new();
        let mut progress = String::new();
        let mut signals = String::new();
        let rendered = formatter
            .write_state_line(&mut state)
            .and_then(|()| formatter.write_mode_line(&mut mode))
            .and_then(|()| formatter.write_progress_line(&mut progress))
            .and_then(|()| formatter.write_signals_line(&mut signals));
        if rendered.is_err() {
            lines.push("ERR status rendering failed".to_string());
            return;
        }
        lines.extend([state, mode, progress, signals]);

        let sim = self.sim.borrow();
        lines.push(format!(
            "bench {} clock=+{}ms frames={} radio={} process-requests={} downlinks={}",
            if sim.is_blocking() { "blocking" } else { "callback" },
            sim.now_ms(),
            sim.frames().len(),
            sim.open_rc().unwrap_or("closed"),
            PROCESS_REQUESTS.load(Ordering::Relaxed),
            DOWNLINKS.load(Ordering::Relaxed),
        ));
    }

    /// Appends everything that happened on air and in the journal since the
    /// previous command.
    fn narrate(&mut self, lines: &mut Vec<String>) {
        {
            let sim = self.sim.borrow();
            for frame in sim.frames().iter().skip(self.frames_reported) {
                lines.push(format!("frame {frame}"));
            }
            self.frames_reported = sim.frames().len();
        }

        let journal = self.executor.target().journal();
        for record in journal
            .oldest_first()
            .filter(|record| self.last_record.is_none_or(|last| record.id > last))
        {
            lines.push(format!("journal {record}"));
        }
        self.last_record = journal.latest().map(|record| record.id).or(self.last_record);

        let downlinks = DOWNLINKS.load(Ordering::Relaxed);
        if downlinks != self.downlinks_seen {
            lines.push(format!(
                "callback downlink x{} rssi={}dBm",
                downlinks - self.downlinks_seen,
                LAST_DOWNLINK_RSSI.load(Ordering::Relaxed)
            ));
            self.downlinks_seen = downlinks;
        }

        let completions = COMPLETIONS.load(Ordering::Relaxed);
        if completions != self.completions_seen {
            self.completions_seen = completions;
            let status = self.executor.target().progress_status();
            lines.push(format!("callback completion {status}"));
        }
    }

    fn log(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        let now_ms = self.sim.borrow().now_ms();
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(now_ms, role, line),
            None => Ok(()),
        }
    }
}

fn describe_help(topic: Option<&'static catalog::CommandSpec>, lines: &mut Vec<String>) {
    match topic {
        Some(spec) => lines.push(format!("{} - {}", spec.usage, spec.summary)),
        None => {
            lines.push("Available commands:".to_string());
            for spec in catalog::commands() {
                lines.push(format!("  {:<58} {}", spec.usage, spec.summary));
            }
            lines.push("Type `help <command>` for a specific command.".to_string());
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, options: &BenchOptions) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(options)?;
        Ok(logger)
    }

    fn write_header(&mut self, options: &BenchOptions) -> io::Result<()> {
        writeln!(
            self.writer,
            "# RFP emulator transcript ({} personality)",
            options.personality()
        )?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now_ms: u64, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{now_ms:>9} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
