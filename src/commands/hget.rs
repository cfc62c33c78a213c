use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Returns the value associated with `field` in the hash stored at `key`, or the simple string
/// `null` when either is missing.
///
/// Ref: <https://redis.io/docs/latest/commands/hget/>
#[derive(Debug, PartialEq)]
pub struct Hget {
    pub key: String,
    pub field: String,
}

impl Executable for Hget {
    const NAME: &'static str = "HGET";

    fn exec(self, store: &Store) -> Frame {
        let hashes = store.read_hashes();

        match hashes.get(&self.key).and_then(|hash| hash.get(&self.field)) {
            Some(value) => Frame::Bulk(value.clone()),
            None => Frame::Simple("null".to_string()),
        }
    }
}

impl TryFrom<&mut CommandParser> for Hget {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.expect_exactly(2)?;

        let key = parser.next_string()?;
        let field = parser.next_string()?;

        Ok(Self { key, field })
    }
}
