//! Console grammar for the charger emulator.
//!
//! Lines are parsed with `winnow` combinators straight over the input `&str`.
//! Keywords are matched case-insensitively; arguments are separated by one or
//! more spaces.

use std::fmt;

use charger_core::fault::FaultKind;
use winnow::ascii::{Caseless, alpha1, dec_uint, float, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::prelude::*;

/// Commands accepted at the emulator prompt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConsoleCommand<'a> {
    /// Feed `count` ticks of the given measurement to the controller.
    Tick { volts: f32, amps: f32, count: u32 },
    /// Advance the simulated battery and controller together.
    Sim { ticks: u32 },
    /// Move the clock forward without updating the controller.
    Skip { ticks: u32 },
    Status,
    Events,
    /// Replace the latched fault; `None` clears it.
    Fault(Option<FaultKind>),
    Help(Option<&'a str>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandError {
    /// Input stopped matching the grammar at `offset` bytes into the line.
    Syntax { offset: usize },
    /// A tick count of zero was supplied to `field`.
    ZeroCount { field: &'static str },
}

impl CommandError {
    /// Short tag used in `ERR <kind> ...` responses.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            CommandError::Syntax { .. } => "syntax",
            CommandError::ZeroCount { .. } => "range",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Syntax { offset } => write!(f, "unexpected input at column {}", offset + 1),
            CommandError::ZeroCount { field } => write!(f, "{field} must be at least 1"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Parses one console line (surrounding whitespace ignored).
pub fn parse(line: &str) -> Result<ConsoleCommand<'_>, CommandError> {
    let trimmed = line.trim();
    let leading = line.len() - line.trim_start().len();
    let parsed = command.parse(trimmed).map_err(|err| CommandError::Syntax {
        offset: leading + err.offset(),
    })?;

    match parsed {
        ConsoleCommand::Tick { count: 0, .. } => Err(CommandError::ZeroCount { field: "count" }),
        ConsoleCommand::Sim { ticks: 0 } | ConsoleCommand::Skip { ticks: 0 } => {
            Err(CommandError::ZeroCount { field: "ticks" })
        }
        command => Ok(command),
    }
}

fn command<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    alt((
        tick,
        sim,
        skip,
        Caseless("status").value(ConsoleCommand::Status),
        Caseless("events").value(ConsoleCommand::Events),
        fault,
        help,
    ))
    .parse_next(input)
}

fn tick<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    (
        preceded((Caseless("tick"), space1), float),
        preceded(space1, float),
        opt(preceded(space1, dec_uint)),
    )
        .map(|(volts, amps, count): (f32, f32, Option<u32>)| ConsoleCommand::Tick {
            volts,
            amps,
            count: count.unwrap_or(1),
        })
        .parse_next(input)
}

fn sim<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    preceded((Caseless("sim"), space1), dec_uint)
        .map(|ticks: u32| ConsoleCommand::Sim { ticks })
        .parse_next(input)
}

fn skip<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    preceded((Caseless("skip"), space1), dec_uint)
        .map(|ticks: u32| ConsoleCommand::Skip { ticks })
        .parse_next(input)
}

fn fault<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    preceded((Caseless("fault"), space1), fault_kind)
        .map(ConsoleCommand::Fault)
        .parse_next(input)
}

fn fault_kind(input: &mut &str) -> ModalResult<Option<FaultKind>> {
    alt((
        Caseless("none").value(None),
        Caseless("overtemp").value(Some(FaultKind::OverTemperature)),
        Caseless("overcurrent").value(Some(FaultKind::OverCurrent)),
        preceded((Caseless("external"), space1), dec_uint)
            .map(|code: u8| Some(FaultKind::External(code))),
    ))
    .parse_next(input)
}

fn help<'a>(input: &mut &'a str) -> ModalResult<ConsoleCommand<'a>> {
    preceded(Caseless("help"), opt(preceded(space1, alpha1)))
        .map(ConsoleCommand::Help)
        .parse_next(input)
}
