use crate::frame::Frame;
use crate::store::Store;

pub trait Executable {
    /// Upper-case name the command is registered under.
    const NAME: &'static str;

    fn exec(self, store: &Store) -> Frame;
}
