use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Get the value of `key`. If the key does not exist the simple string `null` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: String,
}

impl Executable for Get {
    const NAME: &'static str = "GET";

    fn exec(self, store: &Store) -> Frame {
        let sets = store.read_sets();

        match sets.get(&self.key) {
            Some(value) => Frame::Bulk(value.clone()),
            None => Frame::Simple("null".to_string()),
        }
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.expect_exactly(1)?;

        let key = parser.next_string()?;
        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn existing_key() {
        let store = Store::new();
        store
            .write_sets()
            .insert(String::from("key1"), Bytes::from("1"));

        let result = store.handle("GET", &[Frame::bulk("key1")]).unwrap();

        assert_eq!(result, Frame::Bulk(Bytes::from("1")));
    }

    #[test]
    fn missing_key() {
        let store = Store::new();

        let result = store.handle("GET", &[Frame::bulk("key1")]).unwrap();

        assert_eq!(result, Frame::Simple("null".to_string()));
    }

    #[test]
    fn wrong_arity() {
        let store = Store::new();

        let result = store.handle("GET", &[]).unwrap();

        assert_eq!(
            result,
            Frame::Error("ERR wrong number of arguments for 'GET' command, got 0".to_string())
        );
    }
}
