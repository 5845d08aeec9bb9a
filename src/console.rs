//! Line commands for the console dashboard.

use thiserror::Error;

use crate::kernel::event::Command;
use crate::kernel::phase::Phase;
use crate::kernel::selection::SelectionError;

pub const HELP: &str = "commands: phase <farm|depot|transport|market> | patch <id> | load | start | stop | reset | overview | reconnect | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(Command),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConsoleError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("patch id '{0}' is not a number")]
    BadPatch(String),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleInput>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let input = match verb {
        "phase" => {
            let name = arg.ok_or(ConsoleError::MissingArgument("phase"))?;
            // Phase names are exact lowercase keys
            let phase: Phase = name.parse()?;
            ConsoleInput::Command(Command::SetPhase(phase))
        }
        "patch" => {
            let raw = arg.ok_or(ConsoleError::MissingArgument("patch"))?;
            let id = raw.parse::<u32>().map_err(|_| ConsoleError::BadPatch(raw.to_string()))?;
            ConsoleInput::Command(Command::SetPatch(id))
        }
        "load" => ConsoleInput::Command(Command::LoadHistory),
        "start" => ConsoleInput::Command(Command::Start),
        "stop" => ConsoleInput::Command(Command::Stop),
        "reset" => ConsoleInput::Command(Command::Reset),
        "overview" => ConsoleInput::Command(Command::RefreshOverview),
        "reconnect" => ConsoleInput::Command(Command::Reconnect),
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" => ConsoleInput::Quit,
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };
    Ok(Some(input))
}
