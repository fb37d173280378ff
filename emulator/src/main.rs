mod radio;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use rfp_core::regulatory;
use session::{BenchOptions, Session};

const USAGE: &str = "Usage: rfp-emulator [--blocking] [--rc <rc1..rc7>] [--payload-size <0..12>] \
                     [--single-frame] [--no-downlink] [--transcript <path>]";

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(&options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "RFP test bench ready ({}). Type `help` for commands or `exit` to quit.",
        if options.blocking { "blocking" } else { "callback" }
    )?;

    if let Some(rc) = options.rc {
        for response in session.handle_command(&format!("open {}", rc.name))? {
            writeln!(writer, "{response}")?;
        }
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options(args: impl IntoIterator<Item = String>) -> Result<BenchOptions, String> {
    let mut options = BenchOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = |name: &str| {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {name}"))
        };
        match flag.as_str() {
            "--blocking" => options.blocking = true,
            "--single-frame" => options.single_frame = true,
            "--no-downlink" => options.downlinks = false,
            "--rc" => {
                let name = value("--rc")?;
                let rc = regulatory::preset(&name)
                    .ok_or_else(|| format!("Unknown radio configuration `{name}`"))?;
                options.rc = Some(rc);
            }
            "--payload-size" => {
                let raw = value("--payload-size")?;
                let size = raw
                    .parse::<u8>()
                    .map_err(|_| format!("Invalid payload size `{raw}`"))?;
                options.payload_size = Some(size);
            }
            "--transcript" => options.transcript = Some(PathBuf::from(value("--transcript")?)),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }
    Ok(options)
}
