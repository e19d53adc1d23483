//! Shared pieces of the text command surface.

use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid number '{value}' for {context}: {source}")]
    InvalidFloat {
        value: String,
        context: &'static str,
        source: ParseFloatError,
    },
    #[error("invalid {context} '{value}'")]
    InvalidChoice { value: String, context: &'static str },
}

/// Lower-cased verb plus the remaining whitespace-separated arguments.
pub struct CommandLine<'a> {
    pub verb: String,
    pub args: Vec<&'a str>,
}

impl<'a> CommandLine<'a> {
    pub fn split(input: &'a str) -> Result<Self, CommandParseError> {
        let mut parts = input.split_whitespace();
        let verb = parts
            .next()
            .map(|v| v.to_ascii_lowercase())
            .ok_or(CommandParseError::Empty)?;
        Ok(Self {
            verb,
            args: parts.collect(),
        })
    }

    pub fn arg(&self, index: usize, name: &'static str) -> Result<&'a str, CommandParseError> {
        self.args
            .get(index)
            .copied()
            .ok_or(CommandParseError::MissingArgument(name))
    }

    /// All arguments joined by single spaces.
    pub fn rest(&self) -> String {
        self.args.join(" ")
    }

    pub fn unknown(&self) -> CommandParseError {
        CommandParseError::UnknownCommand(self.verb.clone())
    }
}

pub fn parse_u32(value: &str, context: &'static str) -> Result<u32, CommandParseError> {
    value
        .parse::<u32>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

pub fn parse_f64(value: &str, context: &'static str) -> Result<f64, CommandParseError> {
    value
        .parse::<f64>()
        .map_err(|source| CommandParseError::InvalidFloat {
            value: value.to_string(),
            context,
            source,
        })
}
