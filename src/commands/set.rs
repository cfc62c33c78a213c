use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Set `key` to hold the string `value`, overwriting any previous value.
///
/// Supported options:
/// * `NX` -- only set the key if it does not already exist.
/// * `XX` -- only set the key if it already exists.
/// * `GET` -- reply with the previous value instead of `OK` (an empty bulk if there was none).
///
/// `NX` and `XX` together are rejected with a syntax error.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
    /// Raw trailing arguments, resolved against the store's option table on execution.
    pub options: Vec<String>,
}

#[derive(Debug, Default, PartialEq)]
struct SetOptions {
    nx: bool,
    xx: bool,
    get: bool,
}

impl SetOptions {
    /// `arity` maps an upper-case option to the number of extra arguments it consumes.
    fn parse(
        args: &[String],
        arity: impl Fn(&str) -> Option<usize>,
    ) -> Result<Self, CommandParserError> {
        let mut options = SetOptions::default();

        let mut i = 0;
        while i < args.len() {
            let option = args[i].to_uppercase();
            let extra = arity(&option).ok_or(CommandParserError::Syntax)?;

            match option.as_str() {
                "NX" => options.nx = true,
                "XX" => options.xx = true,
                "GET" => options.get = true,
                _ => {}
            }

            i += 1 + extra;
        }

        // An option asked for more arguments than were given.
        if i > args.len() {
            return Err(CommandParserError::Syntax);
        }

        if options.nx && options.xx {
            return Err(CommandParserError::Syntax);
        }

        Ok(options)
    }
}

impl Executable for Set {
    const NAME: &'static str = "SET";

    fn exec(self, store: &Store) -> Frame {
        let arity = |option: &str| store.set_option_arity(option);
        let options = match SetOptions::parse(&self.options, arity) {
            Ok(options) => options,
            Err(err) => return Frame::Error(err.to_string()),
        };

        // The existence check and the write happen under the same exclusive lock.
        let mut sets = store.write_sets();
        let previous = sets.get(&self.key).cloned();

        let write = if options.nx {
            previous.is_none()
        } else if options.xx {
            previous.is_some()
        } else {
            true
        };

        if write {
            sets.insert(self.key, self.value);
        }

        if options.get {
            Frame::Bulk(previous.unwrap_or_default())
        } else {
            Frame::Simple("OK".to_string())
        }
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.expect_at_least(2)?;

        let key = parser.next_string()?;
        let value = parser.next_bytes()?;

        let mut options = Vec::with_capacity(parser.remaining());
        while parser.remaining() > 0 {
            options.push(parser.next_string()?);
        }

        Ok(Self {
            key,
            value,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(store: &Store, args: &[&'static str]) -> Frame {
        let args: Vec<Frame> = args.iter().map(|a| Frame::bulk(*a)).collect();
        store.handle("SET", &args).unwrap()
    }

    #[test]
    fn parse() {
        let parser = &mut CommandParser::new(
            "SET",
            &[Frame::bulk("key1"), Frame::bulk("1"), Frame::bulk("nx")],
        );

        let cmd = Set::try_from(parser).unwrap();

        assert_eq!(
            cmd,
            Set {
                key: String::from("key1"),
                value: Bytes::from("1"),
                options: vec![String::from("nx")],
            }
        );
    }

    #[test]
    fn unconditional() {
        let store = Store::new();

        assert_eq!(set(&store, &["key1", "1"]), Frame::Simple("OK".to_string()));
        assert_eq!(set(&store, &["key1", "2"]), Frame::Simple("OK".to_string()));

        assert_eq!(store.read_sets().get("key1"), Some(&Bytes::from("2")));
    }

    #[test]
    fn nx_and_xx() {
        let store = Store::new();

        set(&store, &["k", "v1", "NX"]);
        assert_eq!(store.read_sets().get("k"), Some(&Bytes::from("v1")));

        set(&store, &["k", "v2", "NX"]);
        assert_eq!(store.read_sets().get("k"), Some(&Bytes::from("v1")));

        set(&store, &["k", "v3", "XX"]);
        assert_eq!(store.read_sets().get("k"), Some(&Bytes::from("v3")));

        set(&store, &["missing", "v", "xx"]);
        assert!(!store.read_sets().contains_key("missing"));
    }

    #[test]
    fn get_option() {
        let store = Store::new();

        assert_eq!(set(&store, &["k", "v1", "GET"]), Frame::Bulk(Bytes::new()));
        assert_eq!(
            set(&store, &["k", "v2", "get"]),
            Frame::Bulk(Bytes::from("v1"))
        );
        assert_eq!(
            set(&store, &["k", "v3", "NX", "GET"]),
            Frame::Bulk(Bytes::from("v2"))
        );
        assert_eq!(store.read_sets().get("k"), Some(&Bytes::from("v2")));
    }

    #[test]
    fn nx_with_xx_is_rejected() {
        let store = Store::new();

        let res = set(&store, &["k", "v", "NX", "XX"]);

        assert_eq!(res, Frame::Error("ERR syntax error".to_string()));
        assert!(store.read_sets().is_empty());
    }

    #[test]
    fn unknown_option_is_rejected() {
        let store = Store::new();

        let res = set(&store, &["k", "v", "KEEPTTL"]);

        assert_eq!(res, Frame::Error("ERR syntax error".to_string()));
        assert!(store.read_sets().is_empty());
    }

    #[test]
    fn options_skip_their_arguments() {
        let arity = |option: &str| match option {
            "EX" => Some(1),
            "GET" => Some(0),
            _ => None,
        };
        let args = |parts: &[&str]| parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();

        // `GET` is consumed as the argument of `EX`.
        let options = SetOptions::parse(&args(&["ex", "GET"]), arity).unwrap();
        assert_eq!(options, SetOptions::default());

        let options = SetOptions::parse(&args(&["EX", "10", "GET"]), arity).unwrap();
        assert!(options.get);

        assert_eq!(
            SetOptions::parse(&args(&["GET", "EX"]), arity),
            Err(CommandParserError::Syntax)
        );
    }

    #[test]
    fn wrong_arity() {
        let store = Store::new();

        let res = set(&store, &["k"]);

        assert_eq!(
            res,
            Frame::Error("ERR wrong number of arguments for 'SET' command, got 1".to_string())
        );
    }
}
