//! Operator console commands.
//!
//! One command per stdin line. The `sim` commands drive the simulated track
//! and camera and are only accepted when the simulation driver is running.

use cardfeed_hal::drivers::simulation::MarkerPlacement;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Decoded console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Enable,
    Disable,
    Accept,
    Reject,
    /// Injected capture, optionally from an image file.
    Simulate(Option<PathBuf>),
    Status,
    Help,
    Quit,
    Sim(SimCommand),
}

/// Commands for the simulated rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    /// Put a card in the slot.
    Insert,
    /// Take the card out of the transport.
    Remove,
    /// Choose where the camera paints the marker.
    Marker(MarkerPlacement),
    /// Block or free the card.
    Jam(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{command}' expects {expected}")]
    BadArgument {
        command: &'static str,
        expected: &'static str,
    },
}

pub const HELP: &str = "\
commands:
  enable | disable          resume or pause the control loop
  accept | reject           decide on the card under the camera
  simulate [image]          run a capture cycle without a card
  status                    print the supervisor status as JSON
  sim insert | sim remove   place or take the simulated card
  sim marker near|far|none  where the simulated camera sees the marker
  sim jam on|off            block the simulated card
  quit";

impl FromStr for ConsoleCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(CommandError::Empty);
        };
        let arg = words.next();

        let command = match head.to_ascii_lowercase().as_str() {
            "enable" => Self::Enable,
            "disable" => Self::Disable,
            "accept" | "a" => Self::Accept,
            "reject" | "r" => Self::Reject,
            "simulate" => Self::Simulate(arg.map(PathBuf::from)),
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            "sim" => Self::Sim(parse_sim(arg, words.next())?),
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn parse_sim(action: Option<&str>, value: Option<&str>) -> Result<SimCommand, CommandError> {
    match (action, value) {
        (Some("insert"), _) => Ok(SimCommand::Insert),
        (Some("remove"), _) => Ok(SimCommand::Remove),
        (Some("marker"), Some("near")) => Ok(SimCommand::Marker(MarkerPlacement::Near)),
        (Some("marker"), Some("far")) => Ok(SimCommand::Marker(MarkerPlacement::Far)),
        (Some("marker"), Some("none")) => Ok(SimCommand::Marker(MarkerPlacement::Absent)),
        (Some("marker"), _) => Err(CommandError::BadArgument {
            command: "sim marker",
            expected: "near, far or none",
        }),
        (Some("jam"), Some("on")) => Ok(SimCommand::Jam(true)),
        (Some("jam"), Some("off")) => Ok(SimCommand::Jam(false)),
        (Some("jam"), _) => Err(CommandError::BadArgument {
            command: "sim jam",
            expected: "on or off",
        }),
        _ => Err(CommandError::BadArgument {
            command: "sim",
            expected: "insert, remove, marker or jam",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_commands() {
        assert_eq!("enable".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Enable));
        assert_eq!("  Accept ".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Accept));
        assert_eq!("r".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Reject));
        assert_eq!("simulate".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Simulate(None)));
        assert_eq!(
            "simulate /tmp/card.png".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Simulate(Some(PathBuf::from("/tmp/card.png"))))
        );
    }

    #[test]
    fn parses_sim_commands() {
        assert_eq!(
            "sim marker near".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Sim(SimCommand::Marker(MarkerPlacement::Near)))
        );
        assert_eq!(
            "sim jam on".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Sim(SimCommand::Jam(true)))
        );
        assert!(matches!(
            "sim marker left".parse::<ConsoleCommand>(),
            Err(CommandError::BadArgument { .. })
        ));
        assert!(matches!(
            "sim".parse::<ConsoleCommand>(),
            Err(CommandError::BadArgument { command: "sim", .. })
        ));
    }

    #[test]
    fn rejects_unknown_and_empty() {
        assert_eq!("   ".parse::<ConsoleCommand>(), Err(CommandError::Empty));
        assert_eq!(
            "launch".parse::<ConsoleCommand>(),
            Err(CommandError::Unknown("launch".to_string()))
        );
    }
}
