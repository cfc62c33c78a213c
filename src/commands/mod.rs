pub mod command;
pub mod executable;
pub mod get;
pub mod hget;
pub mod hgetall;
pub mod hset;
pub mod ping;
pub mod set;

use bytes::Bytes;
use std::collections::HashMap;
use std::str::{self, Utf8Error};
use std::vec;
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;

use command::Command;
use get::Get;
use hget::Hget;
use hgetall::Hgetall;
use hset::Hset;
use ping::Ping;
use set::Set;

/// Runs one command against the store. Argument problems are reported through the returned
/// frame, never as a failure: the protocol has no other channel for them.
pub type Handler = fn(&Store, &[Frame]) -> Frame;

/// One entry of the dispatch table.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    /// Canonical upper-case command name.
    pub name: &'static str,
    pub handler: Handler,
    /// Whether the command mutates the store and has to be written to the append-only file.
    pub write: bool,
}

/// Builds the dispatch table, keyed by upper-case command name.
pub fn table() -> HashMap<&'static str, CommandSpec> {
    [
        spec::<Ping>(false),
        spec::<Command>(false),
        spec::<Set>(true),
        spec::<Get>(false),
        spec::<Hset>(true),
        spec::<Hget>(false),
        spec::<Hgetall>(false),
    ]
    .into_iter()
    .map(|spec| (spec.name, spec))
    .collect()
}

fn spec<C>(write: bool) -> CommandSpec
where
    C: Executable + for<'a> TryFrom<&'a mut CommandParser, Error = CommandParserError>,
{
    CommandSpec {
        name: C::NAME,
        handler: run::<C>,
        write,
    }
}

fn run<C>(store: &Store, args: &[Frame]) -> Frame
where
    C: Executable + for<'a> TryFrom<&'a mut CommandParser, Error = CommandParserError>,
{
    let parser = &mut CommandParser::new(C::NAME, args);

    match C::try_from(parser) {
        Ok(cmd) => cmd.exec(store),
        Err(err) => Frame::Error(err.to_string()),
    }
}

pub struct CommandParser {
    command: &'static str,
    len: usize,
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    pub fn new(command: &'static str, args: &[Frame]) -> CommandParser {
        CommandParser {
            command,
            len: args.len(),
            parts: args.to_vec().into_iter(),
        }
    }

    /// Number of arguments the command was called with.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.parts.len()
    }

    pub fn expect_exactly(&self, count: usize) -> Result<(), CommandParserError> {
        if self.len != count {
            return Err(self.wrong_arity());
        }
        Ok(())
    }

    pub fn expect_at_least(&self, count: usize) -> Result<(), CommandParserError> {
        if self.len < count {
            return Err(self.wrong_arity());
        }
        Ok(())
    }

    pub fn wrong_arity(&self) -> CommandParserError {
        CommandParserError::WrongArity {
            command: self.command,
            got: self.len,
        }
    }

    /// Keys and field names are UTF-8 text. Any frame other than a bulk string reads as an empty
    /// string.
    pub fn next_string(&mut self) -> Result<String, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or(CommandParserError::EndOfStream)?;

        match frame {
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            _ => Ok(String::new()),
        }
    }

    pub fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or(CommandParserError::EndOfStream)?;

        Ok(frame.as_bulk_bytes())
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("ERR wrong number of arguments for '{command}' command, got {got}")]
    WrongArity { command: &'static str, got: usize },
    #[error("ERR syntax error")]
    Syntax,
    #[error("ERR invalid UTF-8 string: {0}")]
    InvalidUTF8String(Utf8Error),
    #[error("ERR protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}
