mod command;
mod session;
mod synth;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use ecu_core::decoders::TriggerPattern;
use ecu_core::schedule::sim::SimClock;

use session::Session;

fn main() -> io::Result<()> {
    let pattern = parse_wheel().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: ecu-emulator [--wheel <pattern>]");
        process::exit(2);
    });

    let clock = SimClock::new(0);
    let mut session = Session::new(&clock, pattern).unwrap_or_else(|err| {
        eprintln!("engine: {err}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "ECU Emulator ready on a {} wheel. Type `help` for commands or `exit` to quit.",
        session.config().pattern
    )?;

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

        for response in session.handle_command(trimmed) {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_wheel() -> Result<TriggerPattern, String> {
    let mut args = env::args().skip(1);
    let Some(arg) = args.next() else {
        return Ok(TriggerPattern::MissingTooth);
    };
    let name = if let Some(value) = arg.strip_prefix("--wheel=") {
        value.to_string()
    } else if arg == "--wheel" {
        args.next()
            .ok_or_else(|| "Expected value after --wheel".to_string())?
    } else {
        arg
    };
    TriggerPattern::from_name(&name).ok_or_else(|| format!("Unknown wheel `{name}`"))
}
