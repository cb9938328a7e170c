use std::{collections::HashMap, sync::Arc};

use log::warn;

use super::{command::Command, command_kind::CommandKind};

/// Outcome of dispatching a single command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// The command was fully processed
    Handled,
    /// Nothing was done, which is not an error (e.g. the target is gone)
    Discard,
    /// A protocol violation. The connection the command came from must be
    /// closed.
    Error,
}

/// Something that can process commands arriving from an origin of type `O`
pub trait Handler<O>: Send + Sync {
    fn dispatch(&self, origin: &O, command: &Command) -> CommandResult;
}

impl<O, F> Handler<O> for F
where
    F: Fn(&O, &Command) -> CommandResult + Send + Sync,
{
    fn dispatch(&self, origin: &O, command: &Command) -> CommandResult {
        self(origin, command)
    }
}

/// Routes commands to the handler registered for their kind
pub struct Dispatcher<O> {
    handlers: HashMap<CommandKind, Arc<dyn Handler<O>>>,
}

impl<O> Dispatcher<O> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `kind`, returning the handler it replaced
    pub fn register<K, H>(&mut self, kind: K, handler: H) -> Option<Arc<dyn Handler<O>>>
    where
        K: Into<CommandKind>,
        H: Handler<O> + 'static,
    {
        self.handlers.insert(kind.into(), Arc::new(handler))
    }

    pub fn unregister<K: Into<CommandKind>>(&mut self, kind: K) -> bool {
        self.handlers.remove(&kind.into()).is_some()
    }

    pub fn is_registered<K: Into<CommandKind>>(&self, kind: K) -> bool {
        self.handlers.contains_key(&kind.into())
    }

    pub fn dispatch(&self, origin: &O, command: &Command) -> CommandResult {
        match self.handlers.get(&command.kind()) {
            Some(handler) => handler.dispatch(origin, command),
            None => {
                warn!("Dispatcher: no handler registered for {}", command.kind());
                CommandResult::Error
            }
        }
    }
}

impl<O> Default for Dispatcher<O> {
    fn default() -> Self {
        Self::new()
    }
}
