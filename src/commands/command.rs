use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Introspection stub: clients such as `redis-cli` send `COMMAND DOCS` on connect.
#[derive(Debug, PartialEq)]
pub struct Command {}

impl Executable for Command {
    const NAME: &'static str = "COMMAND";

    fn exec(self, _store: &Store) -> Frame {
        Frame::Simple("OK".to_string())
    }
}

impl TryFrom<&mut CommandParser> for Command {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self {})
    }
}
