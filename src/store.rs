use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error as ThisError;

use crate::commands::{self, CommandSpec};
use crate::frame::Frame;

/// Flat string keys.
pub type Sets = HashMap<String, Bytes>;

/// Hash name to field to value.
pub type Hashes = HashMap<String, HashMap<String, Bytes>>;

/// Extra positional arguments consumed by each `SET` option.
const SET_OPTIONS: [(&str, usize); 3] = [("NX", 0), ("XX", 0), ("GET", 0)];

/// The Store owns all keyed state and the command dispatch table. String keys and hashes sit
/// behind two independent reader/writer locks, so string commands never wait on hash commands
/// and vice versa. The store is cheap to clone and every clone shares the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        let inner = Arc::new(InnerStore {
            sets: RwLock::new(HashMap::new()),
            hashes: RwLock::new(HashMap::new()),
            commands: commands::table(),
            set_options: SET_OPTIONS.into_iter().collect(),
        });

        Self { inner }
    }

    /// Runs `command` with `args`. The command name must already be upper-case.
    ///
    /// Only an unknown command is an error. Argument validation problems come back as
    /// [`Frame::Error`] replies and leave the store untouched.
    pub fn handle(&self, command: &str, args: &[Frame]) -> Result<Frame, StoreError> {
        let spec = self
            .commands
            .get(command)
            .ok_or_else(|| StoreError::UnknownCommand(command.to_string()))?;

        Ok((spec.handler)(self, args))
    }

    /// Whether `command` is a known command that mutates the store.
    pub fn is_write(&self, command: &str) -> bool {
        self.commands.get(command).is_some_and(|spec| spec.write)
    }

    /// How many extra arguments the `SET` option `option` consumes, `None` for unknown options.
    pub fn set_option_arity(&self, option: &str) -> Option<usize> {
        self.set_options.get(option).copied()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct InnerStore {
    sets: RwLock<Sets>,
    hashes: RwLock<Hashes>,
    // Built once in `Store::new` and never mutated, so it is read without locking.
    commands: HashMap<&'static str, CommandSpec>,
    set_options: HashMap<&'static str, usize>,
}

impl InnerStore {
    pub fn read_sets(&self) -> RwLockReadGuard<'_, Sets> {
        self.sets.read()
    }

    pub fn write_sets(&self) -> RwLockWriteGuard<'_, Sets> {
        self.sets.write()
    }

    pub fn read_hashes(&self) -> RwLockReadGuard<'_, Hashes> {
        self.hashes.read()
    }

    pub fn write_hashes(&self) -> RwLockWriteGuard<'_, Hashes> {
        self.hashes.write()
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum StoreError {
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
}
