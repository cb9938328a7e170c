use lattice_serde::SerdeErr;
use thiserror::Error;

use crate::connection::error::ConnectionError;

use super::command_kind::CommandKind;

/// Errors raised while reading, writing or decoding commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The tag does not name any known node or object command
    #[error("Unknown command tag {tag:#010x}")]
    UnknownCommand { tag: u32 },

    /// The size field is smaller than the header itself
    #[error("Command header declares size {size}, smaller than the header")]
    MalformedHeader { size: u32 },

    /// The command exceeds the maximum size a node will accept
    #[error("Command of {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },

    /// A command payload could not be decoded
    #[error("Malformed payload for {kind}: {source}")]
    MalformedPayload { kind: CommandKind, source: SerdeErr },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
