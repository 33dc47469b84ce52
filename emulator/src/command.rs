//! REPL grammar.
//!
//! Lines are parsed with `winnow` combinators straight from the input text
//! into a [`Command`]. Keywords are lowercase; the session lowercases input
//! before parsing.

use std::fmt;

use ecu_core::decoders::TriggerPattern;
use ecu_core::schedule::OutputKind;
use winnow::ascii::{dec_int, dec_uint, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded, repeat, terminated};
use winnow::prelude::*;
use winnow::token::take_while;

/// Help lines, one per command keyword.
pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "wheel",
        "wheel <pattern> [teeth] [missing]  - select the trigger wheel and rebuild the engine",
    ),
    ("rpm", "rpm <n>                            - set the wheel speed"),
    (
        "run",
        "run [revolutions] [trace]          - spin the wheel, optionally tracing every edge",
    ),
    (
        "request",
        "request pw=<us> angle=<deg> advance=<deg> dwell=<us>  - update the calibration request",
    ),
    (
        "cut",
        "cut <fuel|spark> <channel>         - drop a pending pulse on one channel",
    ),
    ("stall", "stall                              - stop the wheel until the engine stalls"),
    ("reset", "reset                              - return the engine to power-on state"),
    ("status", "status                             - show decoder and schedule state"),
    ("events", "events                             - list recorded decoder events"),
    ("help", "help [topic]                       - show help for a command"),
];

/// Calibration fields changed by a `request` command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestUpdate {
    pub pulse_width: Option<u32>,
    pub injection_angle: Option<u16>,
    pub advance: Option<i16>,
    pub dwell: Option<u32>,
}

/// Parsed REPL command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Wheel {
        pattern: TriggerPattern,
        teeth: Option<u16>,
        missing: Option<u8>,
    },
    Rpm(u16),
    Run {
        revolutions: u32,
        trace: bool,
    },
    Request(RequestUpdate),
    Cut {
        kind: OutputKind,
        /// One-based channel number.
        channel: usize,
    },
    Stall,
    Reset,
    Status,
    Events,
    Help(Option<String>),
}

/// Syntax error with the byte offset where parsing stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected input at column {}", self.offset + 1)
    }
}

/// Parses one REPL line.
///
/// # Errors
///
/// Returns a [`SyntaxError`] when the line is not a valid command.
pub fn parse(line: &str) -> Result<Command, SyntaxError> {
    command.parse(line).map_err(|error| SyntaxError {
        offset: error.offset(),
    })
}

fn command(input: &mut &str) -> ModalResult<Command> {
    preceded(
        space0,
        terminated(
            alt((
                wheel,
                rpm,
                run,
                request,
                cut,
                "stall".value(Command::Stall),
                "status".value(Command::Status),
                "reset".value(Command::Reset),
                "events".value(Command::Events),
                help,
            )),
            (space0, eof),
        ),
    )
    .parse_next(input)
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_').parse_next(input)
}

fn wheel(input: &mut &str) -> ModalResult<Command> {
    let pattern = preceded(("wheel", space1), word.verify_map(TriggerPattern::from_name))
        .parse_next(input)?;
    let teeth = opt(preceded(space1, dec_uint::<_, u16, _>)).parse_next(input)?;
    let missing = opt(preceded(space1, dec_uint::<_, u8, _>)).parse_next(input)?;
    Ok(Command::Wheel {
        pattern,
        teeth,
        missing,
    })
}

fn rpm(input: &mut &str) -> ModalResult<Command> {
    preceded(("rpm", space1), dec_uint::<_, u16, _>)
        .map(Command::Rpm)
        .parse_next(input)
}

fn run(input: &mut &str) -> ModalResult<Command> {
    let _ = "run".parse_next(input)?;
    let revolutions = opt(preceded(space1, dec_uint::<_, u32, _>)).parse_next(input)?;
    let trace = opt(preceded(space1, "trace")).parse_next(input)?;
    Ok(Command::Run {
        revolutions: revolutions.unwrap_or(1),
        trace: trace.is_some(),
    })
}

fn assignment<'a>(input: &mut &'a str) -> ModalResult<(&'a str, i32)> {
    (word, '=', dec_int::<_, i32, _>)
        .map(|(key, _, value)| (key, value))
        .parse_next(input)
}

fn request_update(assignments: &[(&str, i32)]) -> Option<RequestUpdate> {
    let mut update = RequestUpdate::default();
    for &(key, value) in assignments {
        match key {
            "pw" => update.pulse_width = Some(u32::try_from(value).ok()?),
            "angle" => update.injection_angle = Some(u16::try_from(value).ok()?),
            "advance" => update.advance = Some(i16::try_from(value).ok()?),
            "dwell" => update.dwell = Some(u32::try_from(value).ok()?),
            _ => return None,
        }
    }
    Some(update)
}

fn request(input: &mut &str) -> ModalResult<Command> {
    preceded("request", repeat(1.., preceded(space1, assignment)))
        .verify_map(|assignments: Vec<(&str, i32)>| request_update(&assignments))
        .map(Command::Request)
        .parse_next(input)
}

fn cut(input: &mut &str) -> ModalResult<Command> {
    let kind = preceded(
        ("cut", space1),
        alt((
            "fuel".value(OutputKind::Injector),
            "spark".value(OutputKind::Coil),
        )),
    )
    .parse_next(input)?;
    let channel = preceded(space1, dec_uint::<_, u16, _>)
        .verify(|channel| *channel > 0)
        .parse_next(input)?;
    Ok(Command::Cut {
        kind,
        channel: usize::from(channel),
    })
}

fn help(input: &mut &str) -> ModalResult<Command> {
    preceded("help", opt(preceded(space1, word)))
        .map(|topic| Command::Help(topic.map(str::to_string)))
        .parse_next(input)
}
