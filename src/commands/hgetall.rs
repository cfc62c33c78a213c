use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Returns all fields and values of the hash stored at `key` as a flat array, each field followed
/// by its value. The order is unspecified. A missing hash replies with the simple string `null`.
///
/// Ref: <https://redis.io/docs/latest/commands/hgetall/>
#[derive(Debug, PartialEq)]
pub struct Hgetall {
    pub key: String,
}

impl Executable for Hgetall {
    const NAME: &'static str = "HGETALL";

    fn exec(self, store: &Store) -> Frame {
        let hashes = store.read_hashes();

        let hash = match hashes.get(&self.key) {
            Some(hash) => hash,
            None => return Frame::Simple("null".to_string()),
        };

        let mut res = Frame::array();
        for (field, value) in hash {
            res.push(Frame::bulk(field.clone()));
            res.push(Frame::Bulk(value.clone()));
        }

        res
    }
}

impl TryFrom<&mut CommandParser> for Hgetall {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.expect_exactly(1)?;

        let key = parser.next_string()?;
        Ok(Self { key })
    }
}
