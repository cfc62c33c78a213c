use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Sets the specified fields to their respective values in the hash stored at `key`, creating the
/// hash if needed. Replies with the number of fields that were added, not counting fields whose
/// value was only updated.
///
/// Ref: <https://redis.io/docs/latest/commands/hset/>
#[derive(Debug, PartialEq)]
pub struct Hset {
    pub key: String,
    pub pairs: Vec<(String, Bytes)>,
}

impl Executable for Hset {
    const NAME: &'static str = "HSET";

    fn exec(self, store: &Store) -> Frame {
        // One lock acquisition for the whole batch.
        let mut hashes = store.write_hashes();
        let hash = hashes.entry(self.key).or_default();

        let mut added = 0;
        for (field, value) in self.pairs {
            if hash.insert(field, value).is_none() {
                added += 1;
            }
        }

        Frame::Integer(added)
    }
}

impl TryFrom<&mut CommandParser> for Hset {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.expect_at_least(3)?;
        if parser.len() % 2 != 1 {
            return Err(parser.wrong_arity());
        }

        let key = parser.next_string()?;

        let mut pairs = Vec::with_capacity(parser.remaining() / 2);
        while parser.remaining() > 0 {
            let field = parser.next_string()?;
            let value = parser.next_bytes()?;
            pairs.push((field, value));
        }

        Ok(Self { key, pairs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hset(store: &Store, args: &[&'static str]) -> Frame {
        let args: Vec<Frame> = args.iter().map(|a| Frame::bulk(*a)).collect();
        store.handle("HSET", &args).unwrap()
    }

    #[test]
    fn counts_new_fields() {
        let store = Store::new();

        assert_eq!(hset(&store, &["h", "f1", "v1", "f2", "v2"]), Frame::Integer(2));
        assert_eq!(hset(&store, &["h", "f1", "v9"]), Frame::Integer(0));
        assert_eq!(hset(&store, &["h", "f1", "v10", "f3", "v3"]), Frame::Integer(1));

        let hashes = store.read_hashes();
        assert_eq!(hashes["h"].get("f1"), Some(&Bytes::from("v10")));
        assert_eq!(hashes["h"].len(), 3);
    }

    #[test]
    fn repeated_field_in_one_call() {
        let store = Store::new();

        assert_eq!(hset(&store, &["h", "f", "a", "f", "b"]), Frame::Integer(1));
        assert_eq!(store.read_hashes()["h"].get("f"), Some(&Bytes::from("b")));
    }

    #[test]
    fn wrong_arity() {
        let store = Store::new();

        assert_eq!(
            hset(&store, &["h", "f"]),
            Frame::Error("ERR wrong number of arguments for 'HSET' command, got 2".to_string())
        );
        assert_eq!(
            hset(&store, &["h", "f1", "v1", "f2"]),
            Frame::Error("ERR wrong number of arguments for 'HSET' command, got 4".to_string())
        );
        assert!(store.read_hashes().is_empty());
    }
}
