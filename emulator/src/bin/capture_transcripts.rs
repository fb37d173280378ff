use std::io;
use std::path::PathBuf;

use rfp_core::endpoint::NvmTestError;

#[allow(dead_code)]
#[path = "../radio.rs"]
mod radio;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{BenchOptions, Session};

const TRANSCRIPT_DIR: &str = "transcripts";

fn main() -> io::Result<()> {
    record_blocking()?;
    record_callback()?;
    record_downlink()?;
    Ok(())
}

fn options(name: &str, blocking: bool) -> BenchOptions {
    BenchOptions {
        blocking,
        transcript: Some(PathBuf::from(TRANSCRIPT_DIR).join(format!("{name}.log"))),
        ..BenchOptions::default()
    }
}

fn replay(session: &mut Session, script: &[&str]) -> io::Result<()> {
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

fn record_blocking() -> io::Result<()> {
    let mut session = Session::new(&options("blocking", true))?;
    replay(
        &mut session,
        &[
            "open rc1",
            "version",
            "mode c bitrate=600",
            "status",
            "mode a",
            "mode k",
            "mode l",
            "close",
        ],
    )?;

    session
        .simulation()
        .borrow_mut()
        .set_nvm_result(Err(NvmTestError::Failed));
    replay(&mut session, &["open rc1", "mode l", "status", "close"])
}

fn record_callback() -> io::Result<()> {
    let mut session = Session::new(&options("callback", false))?;
    replay(
        &mut session,
        &[
            "help",
            "open rc2",
            "mode b power=10",
            "status",
            "advance 5s",
            "status",
            "run",
            "mode e",
            "process",
            "close",
            "status",
        ],
    )
}

fn record_downlink() -> io::Result<()> {
    let mut session = Session::new(&options("downlink", false))?;
    replay(
        &mut session,
        &[
            "open rc1",
            "downlink pattern",
            "mode d",
            "run",
            "downlink counter",
            "mode f",
            "run",
            "inject network",
            "mode j",
            "run",
            "downlink corrupt",
            "mode f",
            "run",
            "close",
        ],
    )
}
