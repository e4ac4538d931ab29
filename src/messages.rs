// Command line protocol and status messages
//
// A command line is a run of sub-commands `<letter><-><digits>|`, e.g. `l50|r-30|s90|`.
// Anything between sub-commands that doesn't match is ignored.

use std::fmt;

use serde::Serialize;

use crate::connection::LinkStatus;

/// Sub-command delimiter
pub const DELIMITER: u8 = b'|';

/// The four motor-driven actuators
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Actuator {
    LeftDrive,
    RightDrive,
    Linear,
    Bucket,
}

impl Actuator {
    pub const ALL: [Actuator; 4] = [
        Actuator::LeftDrive,
        Actuator::RightDrive,
        Actuator::Linear,
        Actuator::Bucket,
    ];

    /// Slot in the controller's actuator table
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Actuator::LeftDrive => "Left",
            Actuator::RightDrive => "Right",
            Actuator::Linear => "Actuator",
            Actuator::Bucket => "Bucket",
        };
        write!(f, "{}", name)
    }
}

/// Where a sub-command goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Motor(Actuator),
    Servo,
}

/// Prefix lookup table
const PREFIXES: [(char, Target); 5] = [
    ('l', Target::Motor(Actuator::LeftDrive)),
    ('r', Target::Motor(Actuator::RightDrive)),
    ('a', Target::Motor(Actuator::Linear)),
    ('b', Target::Motor(Actuator::Bucket)),
    ('s', Target::Servo),
];

impl Target {
    pub fn from_prefix(prefix: char) -> Option<Self> {
        PREFIXES
            .iter()
            .find(|(c, _)| *c == prefix)
            .map(|&(_, target)| target)
    }
}

/// A decoded sub-command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubCommand {
    pub target: Target,
    pub value: i32,
}

/// Sub-commands that matched the pattern but can't be routed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Motor prefix '{0}' unrecognized")]
    UnknownPrefix(char),

    #[error("Value '{text}' for prefix '{prefix}' is not a valid integer")]
    BadValue { prefix: char, text: String },
}

/// One pattern match: prefix letter plus the raw signed-digit text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub prefix: char,
    pub value: &'a str,
}

impl Token<'_> {
    /// Resolve the prefix and parse the value
    pub fn parse(&self) -> Result<SubCommand, CommandError> {
        let target =
            Target::from_prefix(self.prefix).ok_or(CommandError::UnknownPrefix(self.prefix))?;
        let value = self.value.parse::<i32>().map_err(|_| CommandError::BadValue {
            prefix: self.prefix,
            text: self.value.to_string(),
        })?;
        Ok(SubCommand { target, value })
    }
}

/// Scan a line for every non-overlapping `<letter>-*<digits>|` match, in order
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match match_at(bytes, i) {
            Some(end) => {
                tokens.push(Token {
                    prefix: bytes[i] as char,
                    // all matched bytes are ASCII, so these are char boundaries
                    value: &line[i + 1..end],
                });
                i = end + 1; // skip the delimiter
            }
            None => i += 1,
        }
    }

    tokens
}

/// Try to match at `start`; returns the delimiter's index on success
fn match_at(bytes: &[u8], start: usize) -> Option<usize> {
    if !bytes[start].is_ascii_alphabetic() {
        return None;
    }

    let mut j = start + 1;
    while j < bytes.len() && bytes[j] == b'-' {
        j += 1;
    }

    let digits_start = j;
    while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
    }

    if j == digits_start || j >= bytes.len() || bytes[j] != DELIMITER {
        return None;
    }
    Some(j)
}

/// How a dispatch ended
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Every sub-command ran on the first pass
    Completed,
    /// A fault was recovered and the whole line was run again
    Replayed,
    /// A fault could not be recovered; the rest of the line was dropped
    Dropped,
}

/// Result of one dispatch
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    /// Sub-commands applied on the final pass
    pub applied: usize,
    /// Sub-commands skipped as malformed
    pub skipped: usize,
}

/// Status snapshot published by the runtime
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RuntimeStatus {
    pub link: LinkStatus,
    pub left: i32,
    pub right: i32,
    pub actuator: i32,
    pub bucket: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<DispatchReport>,
}
